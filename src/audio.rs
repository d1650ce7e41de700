//! Single-slot audio register
//!
//! Hover playback and suggestion preview each own one [`AudioSlot`]. Acquiring
//! a slot pauses and detaches the previous handle before the new one is
//! stored, so two live handles of the same kind never coexist.

use crate::error::AmpersoundError;

/// A playable medium owned by exactly one slot.
pub trait AudioHandle {
    fn play(&mut self) -> Result<(), AmpersoundError>;
    fn pause(&mut self);
    /// Abort loading and drop any host resources (src, listeners).
    fn detach(&mut self);
}

/// Creates handles from resolved playback URLs.
pub trait AudioBackend {
    type Handle: AudioHandle;

    fn open(&self, url: &str) -> Result<Self::Handle, AmpersoundError>;
}

/// Identifies one occupancy of a slot; stale tokens are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotToken(u64);

#[derive(Debug)]
pub struct AudioSlot<H> {
    current: Option<(SlotToken, H)>,
    next_token: u64,
}

impl<H> Default for AudioSlot<H> {
    fn default() -> Self {
        Self {
            current: None,
            next_token: 0,
        }
    }
}

impl<H: AudioHandle> AudioSlot<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release the previous handle, then store `handle`.
    pub fn acquire(&mut self, handle: H) -> SlotToken {
        self.release();
        let token = SlotToken(self.next_token);
        self.next_token += 1;
        self.current = Some((token, handle));
        token
    }

    /// Pause and detach the current handle, if any.
    pub fn release(&mut self) -> bool {
        match self.current.take() {
            Some((_, mut handle)) => {
                handle.pause();
                handle.detach();
                true
            }
            None => false,
        }
    }

    /// Release only if `token` still owns the slot.
    pub fn release_if(&mut self, token: SlotToken) -> bool {
        if self.token() == Some(token) {
            self.release()
        } else {
            false
        }
    }

    pub fn token(&self) -> Option<SlotToken> {
        self.current.as_ref().map(|(t, _)| *t)
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.current.as_mut().map(|(_, h)| h)
    }

    /// Start playback of the current handle. On failure the handle is released.
    pub fn play(&mut self) -> Result<(), AmpersoundError> {
        let result = match self.handle_mut() {
            Some(handle) => handle.play(),
            None => return Err(AmpersoundError::Playback("no audio loaded".into())),
        };
        if result.is_err() {
            self.release();
        }
        result
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{AudioEvent, MockAudio};
    use super::*;

    #[test]
    fn test_acquire_releases_previous_before_storing() {
        let audio = MockAudio::default();
        let mut slot = AudioSlot::new();

        slot.acquire(audio.open("a.mp3").unwrap());
        slot.acquire(audio.open("b.mp3").unwrap());

        assert_eq!(
            audio.events(),
            vec![
                AudioEvent::Open("a.mp3".into()),
                AudioEvent::Open("b.mp3".into()),
                AudioEvent::Pause("a.mp3".into()),
                AudioEvent::Detach("a.mp3".into()),
            ]
        );
        assert_eq!(audio.live(), vec!["b.mp3".to_string()]);
    }

    #[test]
    fn test_release_if_ignores_stale_token() {
        let audio = MockAudio::default();
        let mut slot = AudioSlot::new();

        let old = slot.acquire(audio.open("a.mp3").unwrap());
        let new = slot.acquire(audio.open("b.mp3").unwrap());

        assert!(!slot.release_if(old));
        assert_eq!(slot.token(), Some(new));
        assert!(slot.release_if(new));
        assert_eq!(slot.token(), None);
    }

    #[test]
    fn test_failed_play_releases_handle() {
        let audio = MockAudio { fail_play: true, ..Default::default() };
        let mut slot = AudioSlot::new();
        slot.acquire(audio.open("a.mp3").unwrap());

        assert!(matches!(slot.play(), Err(AmpersoundError::Playback(_))));
        assert_eq!(slot.token(), None);
        assert!(audio.live().is_empty());
    }
}
