//! Hover playback state
//!
//! Each hover is a short sequence of synchronous steps separated by the
//! collaborator awaits:
//!
//! ```text
//! pointer_enter ──► NeedSession ──(session_username)──► session_resolved ─┐
//!        │                                                                │
//!        └──────────────────────────► Fetch ◄─────────────────────────────┘
//!                                       │ (resolve_playback_url)
//!                                       ▼
//!                                 url_resolved ──► Playing | LeftEarly | Failed | Stale
//! ```
//!
//! Only the latest fetch may start audio, and only while its tag is hovered.

use crate::audio::{AudioBackend, AudioHandle, AudioSlot, SlotToken};
use crate::error::AmpersoundError;
use crate::scanner::tag::{TagId, TagRegistry};
use crate::session::SessionCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub tag: TagId,
    pub request_id: u64,
    pub username: String,
    pub soundname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverStep {
    /// The tag is contextual and no session is cached.
    NeedSession,
    Fetch(PlaybackRequest),
    /// Nothing more to do (error shown, or pointer already gone).
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverOutcome {
    Playing(SlotToken),
    /// URL arrived after the pointer left.
    LeftEarly,
    /// A newer hover superseded this request.
    Stale,
    Failed,
}

#[derive(Debug)]
pub struct HoverController<H> {
    slot: AudioSlot<H>,
    hovered: Option<TagId>,
    pending: Option<(TagId, u64)>,
    playing: Option<(TagId, SlotToken)>,
    next_request_id: u64,
}

impl<H> Default for HoverController<H> {
    fn default() -> Self {
        Self {
            slot: AudioSlot::default(),
            hovered: None,
            pending: None,
            playing: None,
            next_request_id: 1,
        }
    }
}

impl<H: AudioHandle> HoverController<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<TagId> {
        self.hovered
    }

    pub fn playing(&self) -> Option<TagId> {
        self.playing.map(|(id, _)| id)
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.slot.handle_mut()
    }

    pub fn pointer_enter(
        &mut self,
        id: TagId,
        tags: &mut TagRegistry,
        session: &SessionCache,
    ) -> HoverStep {
        self.hovered = Some(id);
        let Some(tag) = tags.get(id) else {
            return HoverStep::Done;
        };
        match tag.username.clone().or_else(|| session.get().map(str::to_string)) {
            Some(username) => self.begin_fetch(id, username, tags),
            None => HoverStep::NeedSession,
        }
    }

    /// The login-state collaborator answered for a contextual tag.
    pub fn session_resolved(
        &mut self,
        id: TagId,
        username: Option<String>,
        tags: &mut TagRegistry,
        session: &mut SessionCache,
    ) -> HoverStep {
        session.set(username.clone());
        if self.hovered != Some(id) {
            return HoverStep::Done;
        }
        match username.filter(|u| !u.is_empty()) {
            Some(username) => self.begin_fetch(id, username, tags),
            None => {
                if let Some(tag) = tags.get_mut(id) {
                    tag.set_error(&AmpersoundError::MissingSession);
                }
                HoverStep::Done
            }
        }
    }

    fn begin_fetch(&mut self, id: TagId, username: String, tags: &mut TagRegistry) -> HoverStep {
        let Some(tag) = tags.get_mut(id) else {
            return HoverStep::Done;
        };
        if username.is_empty() || tag.soundname.is_empty() {
            tag.set_error(&AmpersoundError::MissingSoundData);
            return HoverStep::Done;
        }

        self.stop_audio();
        tag.set_loading();
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending = Some((id, request_id));
        HoverStep::Fetch(PlaybackRequest {
            tag: id,
            request_id,
            username,
            soundname: tag.soundname.clone(),
        })
    }

    pub fn url_resolved<B>(
        &mut self,
        request_id: u64,
        result: Result<String, AmpersoundError>,
        tags: &mut TagRegistry,
        backend: &B,
    ) -> HoverOutcome
    where
        B: AudioBackend<Handle = H>,
    {
        let id = match self.pending {
            Some((id, rid)) if rid == request_id => id,
            _ => return HoverOutcome::Stale,
        };
        self.pending = None;
        let Some(tag) = tags.get_mut(id) else {
            return HoverOutcome::Stale;
        };

        let url = match result {
            Ok(url) => url,
            Err(e) => {
                tag.set_error(&e);
                return HoverOutcome::Failed;
            }
        };
        if self.hovered != Some(id) {
            tag.pointer_left();
            return HoverOutcome::LeftEarly;
        }

        let handle = match backend.open(&url) {
            Ok(handle) => handle,
            Err(e) => {
                tag.set_error(&e);
                return HoverOutcome::Failed;
            }
        };
        let token = self.slot.acquire(handle);
        if let Err(e) = self.slot.play() {
            tag.set_error(&e);
            return HoverOutcome::Failed;
        }
        tag.set_playing();
        self.playing = Some((id, token));
        HoverOutcome::Playing(token)
    }

    /// Stop audio at once, whatever the fetch state.
    pub fn pointer_leave(&mut self, id: TagId, tags: &mut TagRegistry) {
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        self.stop_audio();
        if let Some(tag) = tags.get_mut(id) {
            tag.pointer_left();
        }
    }

    pub fn playback_ended(&mut self, token: SlotToken, tags: &mut TagRegistry) {
        if let Some(id) = self.finish(token) {
            if let Some(tag) = tags.get_mut(id) {
                tag.set_idle();
            }
        }
    }

    /// The medium reported an error after it started.
    pub fn playback_failed(&mut self, token: SlotToken, message: &str, tags: &mut TagRegistry) {
        if let Some(id) = self.finish(token) {
            if let Some(tag) = tags.get_mut(id) {
                tag.set_error(&AmpersoundError::Playback(message.to_string()));
            }
        }
    }

    fn finish(&mut self, token: SlotToken) -> Option<TagId> {
        match self.playing {
            Some((id, t)) if t == token => {
                self.slot.release_if(token);
                self.playing = None;
                Some(id)
            }
            _ => None,
        }
    }

    fn stop_audio(&mut self) {
        self.slot.release();
        self.playing = None;
    }
}
