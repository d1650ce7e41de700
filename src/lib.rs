//! Ampersound: playable `&user.sound` tags + tag autocomplete
//!
//! A Rust/WASM content script. Text on the page is scanned for ampersound
//! tags, which are rewritten into hoverable elements that play their sound;
//! editable fields get an inline suggestion list while a tag is being typed.
//!
//! # Architecture
//!
//! ## Tag Scanner/Renderer
//! - `scanner/grammar.rs` - Tag grammar and tokenizer
//! - `scanner/tag.rs` - RenderedTag: per-tag playback state and tooltip
//! - `scanner/walker.rs` - Text-node walk and DOM rewrite
//! - `scanner/observer.rs` - Mutation filtering for rescans
//! - `scanner/hover.rs` - Hover playback state machine
//! - `scanner/engine.rs` - ScannerEngine: ties the above together
//!
//! ## Autocomplete Engine
//! - `autocomplete/query.rs` - Partial-token detection at the caret
//! - `autocomplete/list.rs` - Suggestion list and highlight
//! - `autocomplete/caret.rs` - Caret surfaces and span replacement
//! - `autocomplete/engine.rs` - AutocompleteEngine state machine
//! - `autocomplete/preview.rs` - Row-hover preview playback
//!
//! ## Shared
//! - `api.rs` - Playback and search endpoints
//! - `session.rs` - Logged-in username
//! - `audio.rs` - Single-owner audio slot
//! - `debounce.rs` - Deadline-based debouncing
//! - `dom/` - DOM abstraction (+ in-memory tree)
//! - `web/` - Browser bindings
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { ContentScript, tokenize } from 'ampersound';
//!
//! await init();
//!
//! const script = new ContentScript({
//!   api_base_url: 'https://socialnetwork.social',
//!   excluded_domains: ['google.com'],
//! });
//! script.start();
//!
//! console.log(tokenize('say &alice.boop or &boop'));
//! // [{ token: { raw_text: '&alice.boop', ... }, start: 4, end: 15 }, ...]
//!
//! const report = await script.scanNow();
//! console.log(report.tags_created, report.elapsed_us);
//! ```

pub mod api;
pub mod audio;
pub mod autocomplete;
pub mod config;
pub mod debounce;
pub mod dom;
pub mod error;
pub mod logging;
pub mod scanner;
pub mod session;
pub mod web;

pub use api::{ApiClient, HttpReply, HttpTransport, SoundResolver};
pub use audio::{AudioBackend, AudioHandle, AudioSlot, SlotToken};
pub use autocomplete::{AutocompleteEngine, AutocompleteState, SuggestionItem, SuggestionList};
pub use config::AmpersoundConfig;
pub use error::{AmpersoundError, CommitError};
pub use scanner::{tokenize, AmpersoundToken, ScannerEngine, TokenSpan};
pub use session::{SessionCache, SessionSource};
pub use web::ContentScript;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("ampersound v{}", env!("CARGO_PKG_VERSION"))
}
