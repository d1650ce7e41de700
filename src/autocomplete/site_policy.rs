//! Where the autocomplete may attach.
//!
//! Search engines are excluded (exact host or any subdomain). Webmail hosts
//! on the allowlist win over the exclusion, checked first.

use crate::config::AmpersoundConfig;

#[derive(Debug, Clone, Default)]
pub struct SitePolicy {
    excluded: Vec<String>,
    always_allowed: Vec<String>,
}

fn normalize(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// `host` is `domain` or a subdomain of it.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

impl SitePolicy {
    pub fn new<E, A>(excluded: E, always_allowed: A) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            excluded: excluded.into_iter().map(|d| normalize(d.as_ref())).collect(),
            always_allowed: always_allowed.into_iter().map(|d| normalize(d.as_ref())).collect(),
        }
    }

    pub fn from_config(config: &AmpersoundConfig) -> Self {
        Self::new(&config.excluded_domains, &config.allowed_domains)
    }

    pub fn allows(&self, host: &str) -> bool {
        let host = normalize(host);
        if self.always_allowed.iter().any(|d| domain_matches(&host, d)) {
            return true;
        }
        !self.excluded.iter().any(|d| domain_matches(&host, d))
    }
}
