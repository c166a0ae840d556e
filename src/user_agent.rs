//! Shared User-Agent strings for API and media HTTP clients.
//!
//! Reddit rejects generic agents on its JSON API, so API traffic identifies the
//! tool; media hosts get a browser-like agent instead.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/post-archiver";

/// Browser User-Agent sent to media hosts.
pub const MEDIA_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for content-source API requests.
#[must_use]
pub fn default_api_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("rust:post-archiver:v{version} (+{PROJECT_UA_URL})")
}
