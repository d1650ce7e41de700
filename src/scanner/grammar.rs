//! Ampersound token grammar
//!
//! Two alternatives, dotted form first so `&user.sound` never degrades into
//! `&user` followed by `.sound`:
//! - `&user.sound` - explicit user; sound part at least 1 char
//! - `&sound`      - implicit user (current session); at least 2 chars
//!
//! Token characters are ASCII: a leading alphanumeric or underscore, then
//! alphanumerics, underscores or hyphens.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A complete tag found in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmpersoundToken {
    pub raw_text: String,
    /// `None` for the bare form: resolve from the current session.
    pub username: Option<String>,
    pub soundname: String,
}

/// A token with its byte span in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub token: AmpersoundToken,
    pub start: usize,
    pub end: usize,
}

/// Compiled tag pattern.
#[derive(Debug, Clone)]
pub struct Grammar {
    // Group 1: user, Group 2: sound (dotted form)
    // Group 3: sound (bare form)
    tag_re: Regex,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        let tag_re = Regex::new(
            r"&([A-Za-z0-9_][A-Za-z0-9_-]*)\.([A-Za-z0-9_][A-Za-z0-9_-]*)|&([A-Za-z0-9_][A-Za-z0-9_-]+)",
        )
        .expect("tag pattern is valid");
        Self { tag_re }
    }

    /// All tokens in `text`, in order, non-overlapping.
    pub fn tokenize(&self, text: &str) -> Vec<TokenSpan> {
        if !text.contains('&') {
            return Vec::new();
        }
        self.tag_re
            .captures_iter(text)
            .filter_map(|cap| {
                let full = cap.get(0)?;
                let token = match (cap.get(1), cap.get(2), cap.get(3)) {
                    (Some(user), Some(sound), _) => AmpersoundToken {
                        raw_text: full.as_str().to_string(),
                        username: Some(user.as_str().to_string()),
                        soundname: sound.as_str().to_string(),
                    },
                    (_, _, Some(sound)) => AmpersoundToken {
                        raw_text: full.as_str().to_string(),
                        username: None,
                        soundname: sound.as_str().to_string(),
                    },
                    _ => return None,
                };
                Some(TokenSpan {
                    token,
                    start: full.start(),
                    end: full.end(),
                })
            })
            .collect()
    }
}

/// Tokenize with a shared, lazily compiled grammar.
pub fn tokenize(text: &str) -> Vec<TokenSpan> {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(Grammar::new).tokenize(text)
}
