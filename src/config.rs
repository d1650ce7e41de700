//! Engine configuration
//!
//! Every field has a serde default so the content script can pass a partial
//! object (or nothing at all) from JS.

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "https://socialnetwork.social";

/// General-purpose search engines the autocomplete stays away from.
pub const DEFAULT_EXCLUDED_DOMAINS: &[&str] = &[
    "google.com",
    "bing.com",
    "duckduckgo.com",
    "yahoo.com",
    "baidu.com",
    "yandex.com",
    "yandex.ru",
    "ecosia.org",
    "startpage.com",
    "search.brave.com",
    "ask.com",
    "aol.com",
];

/// Webmail hosts that stay enabled even under an excluded parent domain.
pub const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "mail.google.com",
    "mail.yahoo.com",
    "outlook.live.com",
    "outlook.office.com",
    "outlook.office365.com",
    "mail.aol.com",
    "mail.yandex.ru",
    "mail.yandex.com",
];

/// Configuration shared by the scanner, the autocomplete engine and the bindings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AmpersoundConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Quiet period before a mutation-triggered rescan.
    #[serde(default = "default_rescan_debounce_ms")]
    pub rescan_debounce_ms: u64,
    /// Quiet period between the last keystroke and the suggestion fetch.
    #[serde(default = "default_suggest_debounce_ms")]
    pub suggest_debounce_ms: u64,
    /// Delay before a focus-out closes the suggestion list.
    #[serde(default = "default_blur_grace_ms")]
    pub blur_grace_ms: u64,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    /// Shortest partial token (other than a lone `&`) that triggers a query.
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
    #[serde(default = "default_max_query_len")]
    pub max_query_len: usize,
    #[serde(default = "default_excluded_domains")]
    pub excluded_domains: Vec<String>,
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_autocomplete: bool,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_base_url() -> String { DEFAULT_API_BASE_URL.to_string() }
fn default_rescan_debounce_ms() -> u64 { 300 }
fn default_suggest_debounce_ms() -> u64 { 300 }
fn default_blur_grace_ms() -> u64 { 150 }
fn default_max_suggestions() -> usize { 10 }
fn default_min_query_len() -> usize { 2 }
fn default_max_query_len() -> usize { 29 }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

fn default_excluded_domains() -> Vec<String> {
    DEFAULT_EXCLUDED_DOMAINS.iter().map(|d| d.to_string()).collect()
}

fn default_allowed_domains() -> Vec<String> {
    DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect()
}

impl Default for AmpersoundConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            rescan_debounce_ms: default_rescan_debounce_ms(),
            suggest_debounce_ms: default_suggest_debounce_ms(),
            blur_grace_ms: default_blur_grace_ms(),
            max_suggestions: default_max_suggestions(),
            min_query_len: default_min_query_len(),
            max_query_len: default_max_query_len(),
            excluded_domains: default_excluded_domains(),
            allowed_domains: default_allowed_domains(),
            enable_autocomplete: true,
            log_level: default_log_level(),
        }
    }
}

impl AmpersoundConfig {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AmpersoundConfig::default();
        assert_eq!(config.rescan_debounce_ms, 300);
        assert_eq!(config.suggest_debounce_ms, 300);
        assert_eq!(config.blur_grace_ms, 150);
        assert_eq!(config.max_suggestions, 10);
        assert_eq!((config.min_query_len, config.max_query_len), (2, 29));
        assert!(config.enable_autocomplete);
    }

    #[test]
    fn test_partial_config_parsing() {
        let json = r#"{"api_base_url": "http://localhost:5000", "blur_grace_ms": 50}"#;
        let config: AmpersoundConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.api_base_url, "http://localhost:5000");
        assert_eq!(config.blur_grace_ms, 50);
        assert_eq!(config.suggest_debounce_ms, 300);
        assert!(config.allowed_domains.iter().any(|d| d == "mail.google.com"));
    }

    #[test]
    fn test_log_level_fallback() {
        let mut config = AmpersoundConfig::default();
        config.log_level = "debug".into();
        assert_eq!(config.log_level_filter(), log::LevelFilter::Debug);
        config.log_level = "loud".into();
        assert_eq!(config.log_level_filter(), log::LevelFilter::Info);
    }
}
