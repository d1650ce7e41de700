//! Remote API: endpoints, reply decoding and the resolver client
//!
//! The transport is a trait so the core stays host-agnostic. The browser
//! bindings implement it with `fetch`, tests with canned replies.
//!
//! Endpoints:
//! - `GET {base}/ampersounds/{username}/{soundname}` -> `{ url }` or `{ message }`
//! - `GET {base}/api/v1/ampersounds/search?username=..&q=..` -> `[{ name, description, user: { username } }]`

use serde::{Deserialize, Serialize};
use url::Url;

use crate::autocomplete::{SoundQuery, SuggestionItem};
use crate::error::AmpersoundError;

const PLAYBACK_FALLBACK_MESSAGE: &str = "Failed to fetch ampersound data.";
const MISSING_URL_MESSAGE: &str = "Audio URL not found.";

// =============================================================================
// Collaborator traits
// =============================================================================

/// Playback URL lookup and free-text suggestion search.
#[allow(async_fn_in_trait)]
pub trait SoundResolver {
    async fn resolve_playback_url(&self, username: &str, soundname: &str) -> Result<String, AmpersoundError>;

    /// `raw_query` is the partial token as typed, leading `&` included.
    async fn search_sounds(&self, raw_query: &str) -> Result<Vec<SuggestionItem>, AmpersoundError>;
}

/// A decoded JSON reply. Bodies that are not JSON arrive as `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpReply {
    pub status: u16,
    pub body: serde_json::Value,
}

impl HttpReply {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn message(&self) -> Option<String> {
        self.body
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }
}

/// Single-attempt JSON GET with cookies.
#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    async fn get_json(&self, url: &Url) -> Result<HttpReply, AmpersoundError>;
}

// =============================================================================
// Endpoints
// =============================================================================

#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self, AmpersoundError> {
        let base = Url::parse(base_url)
            .map_err(|e| AmpersoundError::transport(format!("Invalid API base url {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(AmpersoundError::transport(format!("Invalid API base url {}", base_url)));
        }
        Ok(Self { base })
    }

    fn with_segments(&self, segments: &[&str]) -> Result<Url, AmpersoundError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AmpersoundError::transport("API base url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn playback(&self, username: &str, soundname: &str) -> Result<Url, AmpersoundError> {
        self.with_segments(&["ampersounds", username, soundname])
    }

    pub fn search(&self, query: &SoundQuery) -> Result<Url, AmpersoundError> {
        let mut url = self.with_segments(&["api", "v1", "ampersounds", "search"])?;
        let username = query.username.as_deref().filter(|u| !u.is_empty());
        let soundname = Some(query.soundname.as_str()).filter(|s| !s.is_empty());
        if username.is_some() || soundname.is_some() {
            let mut pairs = url.query_pairs_mut();
            if let Some(username) = username {
                pairs.append_pair("username", username);
            }
            if let Some(soundname) = soundname {
                pairs.append_pair("q", soundname);
            }
        }
        Ok(url)
    }
}

// =============================================================================
// Decoding
// =============================================================================

#[derive(Debug, Deserialize)]
struct PlaybackBody {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// One sound as the search endpoint returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub user: SoundOwner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundOwner {
    pub username: String,
}

impl From<SoundRecord> for SuggestionItem {
    fn from(sound: SoundRecord) -> Self {
        let owner = sound.user.username;
        let mut display_text = format!("{} by {}", sound.name, owner);
        if let Some(description) = sound.description.filter(|d| !d.is_empty()) {
            display_text.push_str(&format!(" ({})", description));
        }
        SuggestionItem {
            tag: format!("&{}.{}", owner, sound.name),
            username: owner,
            soundname: sound.name,
            display_text,
        }
    }
}

pub fn decode_playback(reply: HttpReply) -> Result<String, AmpersoundError> {
    if !reply.is_success() {
        let message = reply.message().unwrap_or_else(|| PLAYBACK_FALLBACK_MESSAGE.to_string());
        return Err(AmpersoundError::collaborator(reply.status, message));
    }
    let body: PlaybackBody = serde_json::from_value(reply.body)
        .map_err(|e| AmpersoundError::transport(format!("Malformed playback reply: {}", e)))?;
    match body.url.filter(|u| !u.is_empty()) {
        Some(url) => Ok(url),
        None => Err(AmpersoundError::collaborator(
            reply.status,
            body.message.unwrap_or_else(|| MISSING_URL_MESSAGE.to_string()),
        )),
    }
}

pub fn decode_search(reply: HttpReply, max: usize) -> Result<Vec<SuggestionItem>, AmpersoundError> {
    if !reply.is_success() {
        let message = reply
            .message()
            .unwrap_or_else(|| format!("Suggestion search failed ({})", reply.status));
        return Err(AmpersoundError::collaborator(reply.status, message));
    }
    if !reply.body.is_array() {
        return Err(AmpersoundError::transport("Suggestion reply is not an array"));
    }
    let sounds: Vec<SoundRecord> = serde_json::from_value(reply.body)
        .map_err(|e| AmpersoundError::transport(format!("Malformed suggestion reply: {}", e)))?;
    Ok(sounds.into_iter().take(max).map(SuggestionItem::from).collect())
}

// =============================================================================
// ApiClient
// =============================================================================

/// [`SoundResolver`] over any [`HttpTransport`].
pub struct ApiClient<T> {
    transport: T,
    endpoints: Endpoints,
    max_suggestions: usize,
}

impl<T: HttpTransport> ApiClient<T> {
    pub fn new(transport: T, base_url: &str, max_suggestions: usize) -> Result<Self, AmpersoundError> {
        Ok(Self {
            transport,
            endpoints: Endpoints::new(base_url)?,
            max_suggestions,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

impl<T: HttpTransport> SoundResolver for ApiClient<T> {
    async fn resolve_playback_url(&self, username: &str, soundname: &str) -> Result<String, AmpersoundError> {
        let url = self.endpoints.playback(username, soundname)?;
        log::debug!("resolving playback url: {}", url);
        let reply = self.transport.get_json(&url).await?;
        decode_playback(reply)
    }

    async fn search_sounds(&self, raw_query: &str) -> Result<Vec<SuggestionItem>, AmpersoundError> {
        let query = SoundQuery::parse(raw_query);
        let url = self.endpoints.search(&query)?;
        log::debug!("searching sounds: {}", url);
        let reply = self.transport.get_json(&url).await?;
        decode_search(reply, self.max_suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;
    use std::cell::RefCell;

    /// Replies with a fixed answer and remembers the urls it was asked for.
    struct CannedTransport {
        reply: Result<HttpReply, AmpersoundError>,
        requested: RefCell<Vec<String>>,
    }

    impl CannedTransport {
        fn new(reply: Result<HttpReply, AmpersoundError>) -> Self {
            Self { reply, requested: RefCell::new(Vec::new()) }
        }
    }

    impl HttpTransport for CannedTransport {
        async fn get_json(&self, url: &Url) -> Result<HttpReply, AmpersoundError> {
            self.requested.borrow_mut().push(url.to_string());
            self.reply.clone()
        }
    }

    fn sound(name: &str, user: &str, description: Option<&str>) -> serde_json::Value {
        json!({ "name": name, "description": description, "user": { "username": user } })
    }

    #[test]
    fn test_playback_endpoint_encodes_segments() {
        let endpoints = Endpoints::new("https://socialnetwork.social").unwrap();
        let url = endpoints.playback("alice", "boop").unwrap();
        assert_eq!(url.as_str(), "https://socialnetwork.social/ampersounds/alice/boop");

        let url = endpoints.playback("a b", "x/y").unwrap();
        assert_eq!(url.as_str(), "https://socialnetwork.social/ampersounds/a%20b/x%2Fy");
    }

    #[test]
    fn test_search_endpoint_query_params() {
        let endpoints = Endpoints::new("https://socialnetwork.social/").unwrap();

        let url = endpoints.search(&SoundQuery::parse("&alice.bo")).unwrap();
        assert_eq!(url.as_str(), "https://socialnetwork.social/api/v1/ampersounds/search?username=alice&q=bo");

        let url = endpoints.search(&SoundQuery::parse("&alice.")).unwrap();
        assert_eq!(url.query(), Some("username=alice"));

        let url = endpoints.search(&SoundQuery::parse("&")).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(Endpoints::new("not a url"), Err(AmpersoundError::Transport(_))));
        assert!(Endpoints::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_decode_playback_success() {
        let reply = HttpReply::new(200, json!({ "url": "https://cdn/boop.mp3" }));
        assert_eq!(decode_playback(reply).unwrap(), "https://cdn/boop.mp3");
    }

    #[test]
    fn test_decode_playback_error_messages() {
        let reply = HttpReply::new(404, json!({ "message": "Ampersound not found" }));
        assert_eq!(
            decode_playback(reply),
            Err(AmpersoundError::collaborator(404, "Ampersound not found"))
        );

        let reply = HttpReply::new(502, serde_json::Value::Null);
        assert_eq!(
            decode_playback(reply),
            Err(AmpersoundError::collaborator(502, PLAYBACK_FALLBACK_MESSAGE))
        );

        let reply = HttpReply::new(200, json!({}));
        assert_eq!(
            decode_playback(reply),
            Err(AmpersoundError::collaborator(200, MISSING_URL_MESSAGE))
        );
    }

    #[test]
    fn test_decode_search_maps_and_caps() {
        let body: Vec<serde_json::Value> = (0..15)
            .map(|i| sound(&format!("s{}", i), "alice", None))
            .collect();
        let items = decode_search(HttpReply::new(200, json!(body)), 10).unwrap();
        assert_eq!(items.len(), 10);
        assert_eq!(items[0].tag, "&alice.s0");
    }

    #[test]
    fn test_display_text_format() {
        let body = json!([sound("boop", "alice", Some("a short boop")), sound("honk", "bob", Some(""))]);
        let items = decode_search(HttpReply::new(200, body), 10).unwrap();
        assert_eq!(items[0].display_text, "boop by alice (a short boop)");
        assert_eq!(items[1].display_text, "honk by bob");
        assert_eq!(items[1].username, "bob");
        assert_eq!(items[1].soundname, "honk");
    }

    #[test]
    fn test_decode_search_rejects_non_array() {
        let result = decode_search(HttpReply::new(200, json!({ "results": [] })), 10);
        assert!(matches!(result, Err(AmpersoundError::Transport(_))));

        let result = decode_search(HttpReply::new(500, json!({ "message": "boom" })), 10);
        assert_eq!(result, Err(AmpersoundError::collaborator(500, "boom")));
    }

    #[test]
    fn test_client_splits_raw_query() {
        let transport = CannedTransport::new(Ok(HttpReply::new(200, json!([sound("boop", "alice", None)]))));
        let client = ApiClient::new(transport, "https://socialnetwork.social", 10).unwrap();

        let items = block_on(client.search_sounds("&alice.bo")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            client.transport.requested.borrow().as_slice(),
            ["https://socialnetwork.social/api/v1/ampersounds/search?username=alice&q=bo"]
        );
    }

    #[test]
    fn test_client_passes_transport_errors_through() {
        let transport = CannedTransport::new(Err(AmpersoundError::transport("Failed to fetch")));
        let client = ApiClient::new(transport, "https://socialnetwork.social", 10).unwrap();
        let result = block_on(client.resolve_playback_url("alice", "boop"));
        assert_eq!(result, Err(AmpersoundError::transport("Failed to fetch")));
    }
}
