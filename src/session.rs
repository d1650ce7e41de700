//! Login-state collaborator and the cached session username.

use serde::{Deserialize, Serialize};

/// Answers "who is logged in right now?".
#[allow(async_fn_in_trait)]
pub trait SessionSource {
    async fn session_username(&self) -> Option<String>;
}

/// Persisted login record, as written by the popup into extension storage.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StoredSession {
    #[serde(default, rename = "authToken")]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl StoredSession {
    /// Logged in only when both the flag and the username are present.
    pub fn username(&self) -> Option<String> {
        match (&self.auth_token, &self.username) {
            (Some(token), Some(user)) if !token.is_empty() && !user.is_empty() => Some(user.clone()),
            _ => None,
        }
    }
}

/// Session username cached by the scanner between hovers and rescans.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    username: Option<String>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set(&mut self, username: Option<String>) {
        self.username = username.filter(|u| !u.is_empty());
    }

    pub fn clear(&mut self) {
        self.username = None;
    }
}

/// Fixed answer, for tests and for hosts that already know the user.
#[derive(Debug, Clone, Default)]
pub struct StaticSession(pub Option<String>);

impl SessionSource for StaticSession {
    async fn session_username(&self) -> Option<String> {
        self.0.clone()
    }
}
