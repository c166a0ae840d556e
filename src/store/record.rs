//! Link store record types and status definitions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Processing status of a discovered post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Discovered, not yet archived.
    #[default]
    New,
    /// Archived to disk.
    Downloaded,
}

impl LinkStatus {
    /// Returns the persisted string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Downloaded => "downloaded",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One discovered post and its processing status.
///
/// The JSON shape is `{"post_id", "title", "url", "status", "first_seen",
/// "last_update", ...}`; any other keys in the file are kept in `extra` and
/// written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Stable post identifier from the source platform.
    #[serde(rename = "post_id", alias = "id")]
    pub id: String,
    /// Post title at discovery time.
    #[serde(default)]
    pub title: String,
    /// Canonical post URL.
    pub url: String,
    /// Processing status.
    #[serde(default)]
    pub status: LinkStatus,
    /// Date the post was first discovered.
    #[serde(default = "today")]
    pub first_seen: NaiveDate,
    /// Date the post was last archived.
    #[serde(default)]
    pub last_update: Option<NaiveDate>,
    /// Subreddit the post was discovered in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
    /// Unrecognised fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LinkRecord {
    /// Creates a freshly discovered record with status `new`.
    #[must_use]
    pub fn discovered(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        first_seen: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            status: LinkStatus::New,
            first_seen,
            last_update: None,
            subreddit: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the subreddit the record was discovered in.
    #[must_use]
    pub fn with_subreddit(mut self, subreddit: impl Into<String>) -> Self {
        self.subreddit = Some(subreddit.into());
        self
    }

    /// Returns true when the record still needs archiving.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.status == LinkStatus::New
    }

    /// Marks the record archived on `date`.
    pub fn mark_downloaded(&mut self, date: NaiveDate) {
        self.status = LinkStatus::Downloaded;
        self.last_update = Some(date);
    }

    /// Unions in metadata from a rediscovery of the same post.
    ///
    /// Status, dates, title and url stay as they are; only fields that were
    /// absent before are filled.
    pub(crate) fn absorb(&mut self, rediscovered: Self) {
        if self.subreddit.is_none() {
            self.subreddit = rediscovered.subreddit;
        }
        for (key, value) in rediscovered.extra {
            self.extra.entry(key).or_insert(value);
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_status_as_str_and_display() {
        assert_eq!(LinkStatus::New.as_str(), "new");
        assert_eq!(LinkStatus::Downloaded.to_string(), "downloaded");
    }

    #[test]
    fn test_record_serializes_in_store_format() {
        let record = LinkRecord::discovered(
            "abc123",
            "Title",
            "https://www.reddit.com/r/memes/comments/abc123/title/",
            date("2024-11-28"),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["post_id"], "abc123");
        assert_eq!(json["status"], "new");
        assert_eq!(json["first_seen"], "2024-11-28");
        assert!(json["last_update"].is_null());
        assert!(json.get("subreddit").is_none());
    }

    #[test]
    fn test_record_reads_legacy_file_with_unknown_fields() {
        let raw = r#"{
            "post_id": "xyz",
            "title": "标题",
            "url": "https://www.reddit.com/r/memes/comments/xyz/t/",
            "status": "downloaded",
            "first_seen": "2024-12-01",
            "last_update": "2024-12-02",
            "note": "keep me"
        }"#;
        let record: LinkRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id, "xyz");
        assert_eq!(record.title, "标题");
        assert_eq!(record.status, LinkStatus::Downloaded);
        assert_eq!(record.last_update, Some(date("2024-12-02")));
        assert_eq!(record.extra["note"], "keep me");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["note"], "keep me");
    }

    #[test]
    fn test_record_accepts_id_alias_and_defaults_status() {
        let raw = r#"{"id": "q1", "url": "https://redd.it/q1", "first_seen": "2025-01-01"}"#;
        let record: LinkRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id, "q1");
        assert!(record.is_new());
        assert_eq!(record.title, "");
    }

    #[test]
    fn test_mark_downloaded_sets_status_and_date() {
        let mut record = LinkRecord::discovered("a", "t", "u", date("2025-01-01"));
        record.mark_downloaded(date("2025-02-03"));
        assert_eq!(record.status, LinkStatus::Downloaded);
        assert_eq!(record.last_update, Some(date("2025-02-03")));
        assert_eq!(record.first_seen, date("2025-01-01"));
    }

    #[test]
    fn test_absorb_only_fills_missing_metadata() {
        let mut existing = LinkRecord::discovered("a", "old", "u1", date("2025-01-01"));
        existing.mark_downloaded(date("2025-01-05"));
        existing
            .extra
            .insert("flair".to_string(), serde_json::json!("kept"));

        let mut again = LinkRecord::discovered("a", "new title", "u2", date("2025-03-01"))
            .with_subreddit("memes");
        again
            .extra
            .insert("flair".to_string(), serde_json::json!("ignored"));
        again
            .extra
            .insert("nsfw".to_string(), serde_json::json!(false));

        existing.absorb(again);

        assert_eq!(existing.title, "old");
        assert_eq!(existing.url, "u1");
        assert_eq!(existing.status, LinkStatus::Downloaded);
        assert_eq!(existing.first_seen, date("2025-01-01"));
        assert_eq!(existing.subreddit.as_deref(), Some("memes"));
        assert_eq!(existing.extra["flair"], "kept");
        assert_eq!(existing.extra["nsfw"], false);
    }
}
