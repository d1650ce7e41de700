//! Rendered tag model and registry
//!
//! The DOM element only mirrors a [`RenderedTag`]: classes, data attributes
//! and the tooltip are derived from it, and every hover transition goes
//! through it first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AmpersoundError;
use crate::scanner::grammar::AmpersoundToken;

pub const TAG_CLASS: &str = "ampersound-tag-ext";
pub const CONTEXTUAL_CLASS: &str = "ampersound-tag-ext-contextual";
pub const TAG_ID_ATTR: &str = "data-ampersound-id";
/// Extension UI the scanner must leave alone.
pub const IGNORE_CLASS: &str = "ampersound-ignore";

pub type TagId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedTag {
    /// Explicit user, or the session user at render time. `None` = contextual.
    pub username: Option<String>,
    pub soundname: String,
    pub original_text: String,
    pub contextual: bool,
    state: PlaybackState,
    tooltip: String,
}

impl RenderedTag {
    pub fn from_token(token: &AmpersoundToken, session_username: Option<&str>) -> Self {
        let username = token
            .username
            .clone()
            .or_else(|| session_username.map(str::to_string));
        let mut tag = Self {
            contextual: username.is_none(),
            username,
            soundname: token.soundname.clone(),
            original_text: token.raw_text.clone(),
            state: PlaybackState::Idle,
            tooltip: String::new(),
        };
        tag.set_idle();
        tag
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    pub fn idle_tooltip(&self) -> String {
        if self.contextual {
            format!("Play {} (context needed, on hover)", self.original_text)
        } else {
            format!("Play {} (on hover)", self.original_text)
        }
    }

    pub fn set_idle(&mut self) {
        self.state = PlaybackState::Idle;
        self.tooltip = self.idle_tooltip();
    }

    pub fn set_loading(&mut self) {
        self.state = PlaybackState::Loading;
        self.tooltip = format!("Loading {}...", self.original_text);
    }

    pub fn set_playing(&mut self) {
        self.state = PlaybackState::Playing;
        self.tooltip = format!("Playing {}", self.original_text);
    }

    pub fn set_error(&mut self, error: &AmpersoundError) {
        self.state = PlaybackState::Error;
        self.tooltip = match error {
            AmpersoundError::MissingSession => "Login required for context".to_string(),
            AmpersoundError::MissingSoundData => "Error: Missing sound data".to_string(),
            AmpersoundError::Collaborator { message, .. } => format!("Error: {}", message),
            AmpersoundError::Transport(msg) | AmpersoundError::Dom(msg) => {
                format!("Client-side error: {}", msg)
            }
            AmpersoundError::Playback(msg) => {
                format!("Error playing {}: {}", self.original_text, msg)
            }
        };
    }

    /// Pointer left: back to idle unless an error is on display.
    pub fn pointer_left(&mut self) {
        if self.state != PlaybackState::Error {
            self.set_idle();
        }
    }

    pub fn classes(&self) -> Vec<&'static str> {
        if self.contextual {
            vec![TAG_CLASS, CONTEXTUAL_CLASS]
        } else {
            vec![TAG_CLASS]
        }
    }

    /// Attributes written on the element, `title` included.
    pub fn attributes(&self, id: TagId) -> Vec<(&'static str, String)> {
        let mut attrs = Vec::with_capacity(5);
        if let Some(username) = &self.username {
            attrs.push(("data-username", username.clone()));
        }
        attrs.push(("data-soundname", self.soundname.clone()));
        attrs.push(("data-originaltext", self.original_text.clone()));
        attrs.push((TAG_ID_ATTR, id.to_string()));
        attrs.push(("title", self.tooltip.clone()));
        attrs
    }
}

/// All tags rendered by one scanner engine.
#[derive(Debug, Default)]
pub struct TagRegistry {
    tags: HashMap<TagId, RenderedTag>,
    next_id: TagId,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id before the element exists; [`TagRegistry::insert`] fills it.
    pub fn reserve_id(&mut self) -> TagId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn insert(&mut self, id: TagId, tag: RenderedTag) {
        self.tags.insert(id, tag);
    }

    pub fn get(&self, id: TagId) -> Option<&RenderedTag> {
        self.tags.get(&id)
    }

    pub fn get_mut(&mut self, id: TagId) -> Option<&mut RenderedTag> {
        self.tags.get_mut(&id)
    }

    /// Drop tags whose elements left the document.
    pub fn retain(&mut self, mut keep: impl FnMut(TagId) -> bool) -> usize {
        let before = self.tags.len();
        self.tags.retain(|id, _| keep(*id));
        before - self.tags.len()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::grammar::tokenize;

    fn tag(text: &str, session: Option<&str>) -> RenderedTag {
        let span = tokenize(text).remove(0);
        RenderedTag::from_token(&span.token, session)
    }

    #[test]
    fn test_explicit_tag() {
        let t = tag("&alice.boop", None);
        assert!(!t.contextual);
        assert_eq!(t.tooltip(), "Play &alice.boop (on hover)");
        assert_eq!(t.classes(), vec![TAG_CLASS]);
    }

    #[test]
    fn test_contextual_without_session() {
        let t = tag("&boop", None);
        assert!(t.contextual);
        assert_eq!(t.username, None);
        assert_eq!(t.tooltip(), "Play &boop (context needed, on hover)");
        assert_eq!(t.classes(), vec![TAG_CLASS, CONTEXTUAL_CLASS]);
        assert!(t.attributes(7).iter().all(|(k, _)| *k != "data-username"));
    }

    #[test]
    fn test_bare_tag_resolved_from_session() {
        let t = tag("&boop", Some("bob"));
        assert!(!t.contextual);
        assert_eq!(t.username.as_deref(), Some("bob"));
        let attrs = t.attributes(3);
        assert!(attrs.contains(&("data-username", "bob".to_string())));
        assert!(attrs.contains(&(TAG_ID_ATTR, "3".to_string())));
    }

    #[test]
    fn test_error_tooltips() {
        let mut t = tag("&alice.boop", None);
        t.set_error(&AmpersoundError::collaborator(404, "Not found"));
        assert_eq!(t.tooltip(), "Error: Not found");
        t.set_error(&AmpersoundError::transport("offline"));
        assert_eq!(t.tooltip(), "Client-side error: offline");
        t.set_error(&AmpersoundError::Playback("decode".into()));
        assert_eq!(t.tooltip(), "Error playing &alice.boop: decode");
        t.set_error(&AmpersoundError::MissingSession);
        assert_eq!(t.tooltip(), "Login required for context");
    }

    #[test]
    fn test_pointer_left_keeps_error() {
        let mut t = tag("&alice.boop", None);
        t.set_loading();
        t.pointer_left();
        assert_eq!(t.state(), PlaybackState::Idle);

        t.set_error(&AmpersoundError::MissingSoundData);
        t.pointer_left();
        assert_eq!(t.state(), PlaybackState::Error);
        assert_eq!(t.tooltip(), "Error: Missing sound data");
    }

    #[test]
    fn test_registry_retain() {
        let mut reg = TagRegistry::new();
        for _ in 0..3 {
            let id = reg.reserve_id();
            reg.insert(id, tag("&ab", None));
        }
        assert_eq!(reg.retain(|id| id != 1), 1);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(1).is_none());
    }
}
