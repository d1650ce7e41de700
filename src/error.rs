//! Error taxonomy
//!
//! Every error here is terminal for the single operation that produced it
//! (one hover, one suggestion query, one commit). None of them reach the page
//! as exceptions: hover errors become tooltip text, suggestion errors close the
//! list, commit errors leave the buffer untouched.

use serde::Serialize;
use thiserror::Error;

/// Failure of a tag resolution, collaborator call, or playback attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AmpersoundError {
    /// No explicit username on the tag and no logged-in session to borrow one from.
    #[error("login required for context")]
    MissingSession,

    /// Username or soundname empty after resolution.
    #[error("missing sound data")]
    MissingSoundData,

    /// The remote API answered with a non-success status.
    #[error("{message}")]
    Collaborator { status: u16, message: String },

    /// Request never completed, or the body could not be decoded.
    #[error("{0}")]
    Transport(String),

    /// The audio medium failed to start or load.
    #[error("{0}")]
    Playback(String),

    /// A DOM call failed inside the browser bindings.
    #[error("dom error: {0}")]
    Dom(String),
}

impl AmpersoundError {
    pub fn collaborator(status: u16, message: impl Into<String>) -> Self {
        Self::Collaborator {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Why a suggestion could not be committed into the editable surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("caret is not inside the editable surface")]
    NoCaret,

    #[error("partial token `{raw}` is no longer at offset {start}")]
    TokenMoved { raw: String, start: usize },

    #[error("nothing to commit: no active token")]
    NoActiveToken,

    #[error("surface rejected edit: {0}")]
    Surface(String),
}
