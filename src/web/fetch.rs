//! `fetch` transport and the extension-storage session source.

use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestCredentials, RequestInit, Response};

use crate::api::{HttpReply, HttpTransport};
use crate::error::AmpersoundError;
use crate::session::{SessionSource, StoredSession};
use crate::web::timers::{js_error, window};

// ============================================================================
// HTTP
// ============================================================================

/// `window.fetch`, cookies included, one attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

impl HttpTransport for FetchTransport {
    async fn get_json(&self, url: &Url) -> Result<HttpReply, AmpersoundError> {
        let init = RequestInit::new();
        init.set_method("GET");
        init.set_credentials(RequestCredentials::Include);
        let request = Request::new_with_str_and_init(url.as_str(), &init)
            .map_err(|e| AmpersoundError::transport(js_error(e)))?;

        let value = JsFuture::from(window()?.fetch_with_request(&request))
            .await
            .map_err(|e| AmpersoundError::transport(js_error(e)))?;
        let response: Response = value
            .dyn_into()
            .map_err(|_| AmpersoundError::transport("fetch did not return a Response"))?;

        let status = response.status();
        // Error pages are often HTML; treat an undecodable body as empty.
        let body = match response.json() {
            Ok(promise) => JsFuture::from(promise)
                .await
                .ok()
                .and_then(|v| serde_wasm_bindgen::from_value::<serde_json::Value>(v).ok())
                .unwrap_or(serde_json::Value::Null),
            Err(_) => serde_json::Value::Null,
        };
        Ok(HttpReply::new(status, body))
    }
}

// ============================================================================
// Session
// ============================================================================

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = "get", catch)]
    async fn storage_local_get(keys: JsValue) -> Result<JsValue, JsValue>;
}

/// Reads the `authToken` / `username` pair the popup writes on login.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeSession;

impl SessionSource for ChromeSession {
    async fn session_username(&self) -> Option<String> {
        let keys = serde_wasm_bindgen::to_value(&["authToken", "username"]).ok()?;
        match storage_local_get(keys).await {
            Ok(value) => serde_wasm_bindgen::from_value::<StoredSession>(value)
                .ok()
                .and_then(|s| s.username()),
            Err(e) => {
                log::warn!("session lookup failed: {}", js_error(e));
                None
            }
        }
    }
}
