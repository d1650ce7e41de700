//! Preview playback for the hovered suggestion row.
//!
//! Owns its own [`AudioSlot`], independent from tag hover playback.

use std::cell::RefCell;

use crate::api::SoundResolver;
use crate::audio::{AudioBackend, AudioHandle, AudioSlot, SlotToken};
use crate::autocomplete::list::SuggestionItem;
use crate::error::AmpersoundError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub request_id: u64,
    pub username: String,
    pub soundname: String,
}

#[derive(Debug)]
pub struct PreviewPlayer<H> {
    slot: AudioSlot<H>,
    /// Request of the row currently under the pointer.
    hovered: Option<u64>,
    next_request_id: u64,
}

impl<H> Default for PreviewPlayer<H> {
    fn default() -> Self {
        Self {
            slot: AudioSlot::default(),
            hovered: None,
            next_request_id: 1,
        }
    }
}

impl<H: AudioHandle> PreviewPlayer<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer entered a row: stop whatever is playing and ask for its URL.
    pub fn start(&mut self, item: &SuggestionItem) -> PreviewRequest {
        self.slot.release();
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.hovered = Some(request_id);
        PreviewRequest {
            request_id,
            username: item.username.clone(),
            soundname: item.soundname.clone(),
        }
    }

    /// URL for `request_id` arrived. Plays only if that row is still hovered.
    pub fn resolved<B>(
        &mut self,
        request_id: u64,
        result: Result<String, AmpersoundError>,
        backend: &B,
    ) -> Result<Option<SlotToken>, AmpersoundError>
    where
        B: AudioBackend<Handle = H>,
    {
        if self.hovered != Some(request_id) {
            return Ok(None);
        }
        let url = result?;
        let token = self.slot.acquire(backend.open(&url)?);
        self.slot.play()?;
        Ok(Some(token))
    }

    /// Pointer left the row, or the list went away.
    pub fn stop(&mut self) {
        self.hovered = None;
        self.slot.release();
    }

    /// The medium finished on its own.
    pub fn ended(&mut self, token: SlotToken) {
        self.slot.release_if(token);
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.slot.handle_mut()
    }
}

/// Resolve and start a preview. Errors are logged and otherwise dropped;
/// a preview has no surface to report on.
pub async fn run_preview<R, B>(
    player: &RefCell<PreviewPlayer<B::Handle>>,
    resolver: &R,
    backend: &B,
    request: PreviewRequest,
) -> Option<SlotToken>
where
    R: SoundResolver,
    B: AudioBackend,
{
    let result = resolver
        .resolve_playback_url(&request.username, &request.soundname)
        .await;
    match player.borrow_mut().resolved(request.request_id, result, backend) {
        Ok(token) => token,
        Err(e) => {
            log::warn!("preview of &{}.{} failed: {}", request.username, request.soundname, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockAudio;

    fn item(user: &str, sound: &str) -> SuggestionItem {
        SuggestionItem {
            tag: format!("&{}.{}", user, sound),
            username: user.into(),
            soundname: sound.into(),
            display_text: format!("{} by {}", sound, user),
        }
    }

    #[test]
    fn test_preview_plays_while_hovered() {
        let audio = MockAudio::default();
        let mut player = PreviewPlayer::new();
        let req = player.start(&item("alice", "boop"));
        assert_eq!(req.username, "alice");

        let token = player.resolved(req.request_id, Ok("boop.mp3".into()), &audio).unwrap();
        assert!(token.is_some());
        assert_eq!(audio.live(), vec!["boop.mp3".to_string()]);

        player.stop();
        assert!(audio.live().is_empty());
    }

    #[test]
    fn test_preview_ignored_after_pointer_left() {
        let audio = MockAudio::default();
        let mut player = PreviewPlayer::new();
        let req = player.start(&item("alice", "boop"));
        player.stop();

        assert_eq!(player.resolved(req.request_id, Ok("boop.mp3".into()), &audio), Ok(None));
        assert!(audio.events().is_empty());
    }

    #[test]
    fn test_moving_to_next_row_supersedes_previous() {
        let audio = MockAudio::default();
        let mut player = PreviewPlayer::new();
        let first = player.start(&item("alice", "boop"));
        let second = player.start(&item("bob", "honk"));

        assert_eq!(player.resolved(first.request_id, Ok("boop.mp3".into()), &audio), Ok(None));
        player.resolved(second.request_id, Ok("honk.mp3".into()), &audio).unwrap();
        assert_eq!(audio.live(), vec!["honk.mp3".to_string()]);
    }
}
