//! Partial-token detection at the caret, and splitting a raw query into its
//! username filter and soundname query.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// An unterminated `&token` that ends exactly at the caret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialToken {
    /// As typed, leading `&` included.
    pub raw: String,
    /// Byte offset of the `&` in the text before the caret.
    pub start: usize,
}

impl PartialToken {
    pub fn end(&self) -> usize {
        self.start + self.raw.len()
    }
}

/// Finds the trailing partial token in the text preceding the caret.
#[derive(Debug, Clone)]
pub struct PartialTokenMatcher {
    // `&word` or `&word.word`, either half possibly empty, anchored at the caret
    partial_re: Regex,
    min_len: usize,
    max_len: usize,
}

impl PartialTokenMatcher {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        let partial_re = Regex::new(r"&[A-Za-z0-9_]*(?:\.[A-Za-z0-9_]*)?$")
            .expect("partial token pattern is valid");
        Self {
            partial_re,
            min_len,
            max_len,
        }
    }

    /// A lone `&` always counts; anything else must fall within the length bounds.
    pub fn find(&self, text_before_caret: &str) -> Option<PartialToken> {
        let m = self.partial_re.find(text_before_caret)?;
        let raw = m.as_str();
        let accepted = raw == "&" || (self.min_len..=self.max_len).contains(&raw.len());
        accepted.then(|| PartialToken {
            raw: raw.to_string(),
            start: m.start(),
        })
    }
}

impl Default for PartialTokenMatcher {
    fn default() -> Self {
        Self::new(2, 29)
    }
}

/// A raw partial token split on its first `.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundQuery {
    /// Present when the token has a `.`; may be empty (`&.bo`).
    pub username: Option<String>,
    /// May be empty (`&` or `&alice.`).
    pub soundname: String,
}

impl SoundQuery {
    pub fn parse(raw: &str) -> Self {
        let body = raw.strip_prefix('&').unwrap_or(raw);
        match body.split_once('.') {
            Some((username, soundname)) => Self {
                username: Some(username.to_string()),
                soundname: soundname.to_string(),
            },
            None => Self {
                username: None,
                soundname: body.to_string(),
            },
        }
    }
}
