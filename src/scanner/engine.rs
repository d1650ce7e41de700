//! Scanner engine
//!
//! One instance per page. Owns everything the tag side of the extension keeps
//! between events: the compiled grammar, the cached session username, the tag
//! registry, hover audio, and the rescan debounce.
//!
//! Like the autocomplete engine it never reads a clock or sets a timer; the
//! host passes `now` in and arms a timer for every deadline handed back.

use std::cell::RefCell;

use crate::api::SoundResolver;
use crate::audio::{AudioBackend, AudioHandle, SlotToken};
use crate::config::AmpersoundConfig;
use crate::debounce::{Debouncer, Millis};
use crate::dom::DomTree;
use crate::error::AmpersoundError;
use crate::scanner::grammar::Grammar;
use crate::scanner::hover::{HoverController, HoverOutcome, HoverStep};
use crate::scanner::observer::{needs_rescan, MutationEvent};
use crate::scanner::tag::{RenderedTag, TagId, TagRegistry};
use crate::scanner::walker::{scan_tree, ScanReport};
use crate::session::{SessionCache, SessionSource};

#[derive(Debug)]
pub struct ScannerEngine<H> {
    grammar: Grammar,
    session: SessionCache,
    tags: TagRegistry,
    hover: HoverController<H>,
    rescan: Debouncer<(), ()>,
    rescan_debounce_ms: Millis,
    scans: u64,
}

impl<H: AudioHandle> Default for ScannerEngine<H> {
    fn default() -> Self {
        Self::new(&AmpersoundConfig::default())
    }
}

impl<H: AudioHandle> ScannerEngine<H> {
    pub fn new(config: &AmpersoundConfig) -> Self {
        Self {
            grammar: Grammar::new(),
            session: SessionCache::new(),
            tags: TagRegistry::new(),
            hover: HoverController::new(),
            rescan: Debouncer::new(),
            rescan_debounce_ms: config.rescan_debounce_ms,
            scans: 0,
        }
    }

    // ===== Session =====

    pub fn session_username(&self) -> Option<&str> {
        self.session.get()
    }

    pub fn set_session_username(&mut self, username: Option<String>) {
        self.session.set(username);
    }

    // ===== Scanning =====

    /// Render every tag under `root` using the cached session.
    pub fn scan<D: DomTree>(
        &mut self,
        dom: &mut D,
        root: &D::Node,
    ) -> Result<ScanReport<D::Node>, AmpersoundError> {
        let report = scan_tree(dom, root, &self.grammar, self.session.get(), &mut self.tags)?;
        self.scans += 1;
        log::debug!(
            "scan #{}: {} text nodes, {} tags in {}us",
            self.scans,
            report.text_nodes_visited,
            report.tags_created,
            report.elapsed_us
        );
        Ok(report)
    }

    /// Feed a batch of mutations. Returns the rescan deadline when one was
    /// (re)scheduled.
    pub fn observe(&mut self, events: &[MutationEvent], now: Millis) -> Option<Millis> {
        if !needs_rescan(events) {
            return None;
        }
        Some(self.schedule_rescan(now))
    }

    /// Trailing-edge: a later call pushes the deadline back.
    pub fn schedule_rescan(&mut self, now: Millis) -> Millis {
        self.rescan.schedule((), (), self.rescan_debounce_ms, now)
    }

    /// True once when the quiet period has elapsed.
    pub fn rescan_due(&mut self, now: Millis) -> bool {
        !self.rescan.take_due(now).is_empty()
    }

    // ===== Tags =====

    pub fn tag(&self, id: TagId) -> Option<&RenderedTag> {
        self.tags.get(id)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Forget tags whose elements are gone. Stops hover audio owned by one.
    pub fn prune_tags(&mut self, mut keep: impl FnMut(TagId) -> bool) -> usize {
        if let Some(id) = self.hover.playing().or(self.hover.hovered()) {
            if !keep(id) {
                self.hover.pointer_leave(id, &mut self.tags);
            }
        }
        self.tags.retain(keep)
    }

    // ===== Hover =====

    pub fn pointer_enter(&mut self, id: TagId) -> HoverStep {
        self.hover.pointer_enter(id, &mut self.tags, &self.session)
    }

    pub fn session_resolved(&mut self, id: TagId, username: Option<String>) -> HoverStep {
        self.hover
            .session_resolved(id, username, &mut self.tags, &mut self.session)
    }

    pub fn url_resolved<B>(
        &mut self,
        request_id: u64,
        result: Result<String, AmpersoundError>,
        backend: &B,
    ) -> HoverOutcome
    where
        B: AudioBackend<Handle = H>,
    {
        self.hover.url_resolved(request_id, result, &mut self.tags, backend)
    }

    pub fn pointer_leave(&mut self, id: TagId) {
        self.hover.pointer_leave(id, &mut self.tags);
    }

    pub fn playback_ended(&mut self, token: SlotToken) {
        self.hover.playback_ended(token, &mut self.tags);
    }

    pub fn playback_failed(&mut self, token: SlotToken, message: &str) {
        self.hover.playback_failed(token, message, &mut self.tags);
    }

    pub fn playing_tag(&self) -> Option<TagId> {
        self.hover.playing()
    }

    /// Handle of the tag currently playing, for wiring host media events.
    pub fn playing_handle_mut(&mut self) -> Option<&mut H> {
        self.hover.handle_mut()
    }
}

/// Refresh the session, then scan `root`.
pub async fn refresh_and_scan<H, S, D>(
    engine: &RefCell<ScannerEngine<H>>,
    session: &S,
    dom: &mut D,
    root: &D::Node,
) -> Result<ScanReport<D::Node>, AmpersoundError>
where
    H: AudioHandle,
    S: SessionSource,
    D: DomTree,
{
    let username = session.session_username().await;
    let mut engine = engine.borrow_mut();
    engine.set_session_username(username);
    engine.scan(dom, root)
}

/// Drive one hover from pointer-enter to playback (or error tooltip).
/// `render` sees the tag after every state change. `None` when the hover
/// ended before a fetch was issued.
pub async fn run_hover<S, R, B, F>(
    engine: &RefCell<ScannerEngine<B::Handle>>,
    session: &S,
    resolver: &R,
    backend: &B,
    id: TagId,
    render: F,
) -> Option<HoverOutcome>
where
    S: SessionSource,
    R: SoundResolver,
    B: AudioBackend,
    F: Fn(&RenderedTag),
{
    let show = |engine: &ScannerEngine<B::Handle>| {
        if let Some(tag) = engine.tag(id) {
            render(tag);
        }
    };

    let mut step = engine.borrow_mut().pointer_enter(id);
    show(&*engine.borrow());
    if step == HoverStep::NeedSession {
        let username = session.session_username().await;
        step = engine.borrow_mut().session_resolved(id, username);
        show(&*engine.borrow());
    }

    let HoverStep::Fetch(request) = step else {
        return None;
    };
    let result = resolver
        .resolve_playback_url(&request.username, &request.soundname)
        .await;
    if let Err(e) = &result {
        log::warn!("playback lookup for {} failed: {}", request.soundname, e);
    }
    let outcome = engine.borrow_mut().url_resolved(request.request_id, result, backend);
    show(&*engine.borrow());
    Some(outcome)
}
