//! Reddit JSON API client.
//!
//! Without credentials the public `www.reddit.com` `.json` endpoints are used.
//! With a client id and secret, an app-only OAuth token is obtained via the
//! `client_credentials` grant, cached until shortly before it expires, and
//! requests go to `oauth.reddit.com`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{ContentSource, PostDetails, PostSummary, SortMode, SourceError};
use crate::comments::CommentNode;

const ANONYMOUS_API_BASE: &str = "https://www.reddit.com";
const OAUTH_API_BASE: &str = "https://oauth.reddit.com";
const AUTH_BASE: &str = "https://www.reddit.com";

/// Largest page the listing endpoints accept.
const MAX_PAGE_SIZE: usize = 100;

/// Tokens are refreshed this long before the server says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// App-only OAuth credentials.
#[derive(Clone)]
pub struct Credentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// Generic `{kind, data}` wrapper used by every Reddit JSON object.
#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    children: Vec<Thing>,
}

/// Reddit implementation of [`ContentSource`].
pub struct RedditClient {
    client: Client,
    api_base: String,
    auth_base: String,
    credentials: Option<Credentials>,
    token: Mutex<Option<AccessToken>>,
}

impl std::fmt::Debug for RedditClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditClient")
            .field("api_base", &self.api_base)
            .field("auth_base", &self.auth_base)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl RedditClient {
    /// Creates a client against the production endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] when the user agent is empty or the
    /// HTTP client cannot be built.
    #[instrument(skip(credentials), fields(authenticated = credentials.is_some()))]
    pub fn new(
        user_agent: &str,
        credentials: Option<Credentials>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        if user_agent.trim().is_empty() {
            return Err(SourceError::config("user agent must not be empty"));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .map_err(|e| SourceError::config(format!("HTTP client construction failed: {e}")))?;

        let api_base = if credentials.is_some() {
            OAUTH_API_BASE
        } else {
            ANONYMOUS_API_BASE
        };

        Ok(Self {
            client,
            api_base: api_base.to_string(),
            auth_base: AUTH_BASE.to_string(),
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Points the client at other endpoints (for testing with wiremock).
    #[must_use]
    pub fn with_base_urls(mut self, api_base: impl Into<String>, auth_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.auth_base = auth_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns a bearer token, fetching a new one when the cached one is stale.
    async fn access_token(&self) -> Result<Option<String>, SourceError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(Some(token.value.clone()));
        }

        let url = format!("{}/api/v1/access_token", self.auth_base);
        debug!(url = %url, "requesting app-only access token");

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| SourceError::network(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::auth(format!("unreadable token response: {e}")))?;

        let Some(value) = body.access_token else {
            let reason = body.error.unwrap_or_else(|| "no access_token".to_string());
            return Err(SourceError::auth(format!("token request rejected: {reason}")));
        };

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);
        info!(expires_in_secs = lifetime.as_secs(), "obtained access token");

        *cached = Some(AccessToken {
            value: value.clone(),
            refresh_at,
        });
        Ok(Some(value))
    }

    /// GETs `path_and_query` relative to the API base and parses JSON.
    async fn get_json(&self, path_and_query: &str) -> Result<Value, SourceError> {
        let url = format!("{}{}", self.api_base, path_and_query);
        let mut request = self.client.get(&url);
        if let Some(token) = self.access_token().await? {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::network(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status(&url, status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::malformed(&url, e.to_string()))
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    #[instrument(skip(self))]
    async fn list_posts(
        &self,
        category: &str,
        sort: SortMode,
        limit: usize,
    ) -> Result<Vec<PostSummary>, SourceError> {
        let (segment, window) = sort.listing();
        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        while posts.len() < limit {
            let page_size = (limit - posts.len()).min(MAX_PAGE_SIZE);
            let mut path = format!(
                "/r/{}/{segment}.json?limit={page_size}&raw_json=1",
                urlencoding::encode(category)
            );
            if let Some(window) = window {
                path.push_str("&t=");
                path.push_str(window);
            }
            if let Some(cursor) = &after {
                path.push_str("&after=");
                path.push_str(&urlencoding::encode(cursor));
            }

            let value = self.get_json(&path).await?;
            let listing = parse_listing(&path, value)?;
            let page_len = listing.children.len();

            posts.extend(
                listing
                    .children
                    .into_iter()
                    .filter_map(|thing| summary_from_thing(thing, category)),
            );
            debug!(page_len, total = posts.len(), "listing page fetched");

            after = listing.after;
            if after.is_none() || page_len == 0 {
                break;
            }
        }

        posts.truncate(limit);
        info!(category, count = posts.len(), "listing complete");
        Ok(posts)
    }

    #[instrument(skip(self))]
    async fn fetch_post(&self, id_or_url: &str) -> Result<PostDetails, SourceError> {
        let id = post_id_from_input(id_or_url);
        if id.is_empty() {
            return Err(SourceError::malformed(id_or_url, "no post id in input"));
        }

        let path = format!("/comments/{}.json?raw_json=1", urlencoding::encode(&id));
        let value = self.get_json(&path).await?;
        parse_post_response(&path, value)
    }
}

/// Extracts a bare post id from an id, a `t3_` fullname, or a post URL.
fn post_id_from_input(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        if let Ok(url) = url::Url::parse(trimmed)
            && let Some(segments) = url.path_segments()
        {
            let segments: Vec<&str> = segments.collect();
            if let Some(pos) = segments.iter().position(|s| *s == "comments")
                && let Some(id) = segments.get(pos + 1)
            {
                return (*id).to_string();
            }
            // redd.it/<id> short links
            if let Some(last) = segments.iter().rev().find(|s| !s.is_empty()) {
                return (*last).to_string();
            }
        }
        return String::new();
    }
    trimmed.strip_prefix("t3_").unwrap_or(trimmed).to_string()
}

fn parse_listing(url: &str, value: Value) -> Result<ListingData, SourceError> {
    let thing: Thing =
        serde_json::from_value(value).map_err(|e| SourceError::malformed(url, e.to_string()))?;
    if thing.kind != "Listing" {
        return Err(SourceError::malformed(
            url,
            format!("expected Listing, got {}", thing.kind),
        ));
    }
    serde_json::from_value(thing.data).map_err(|e| SourceError::malformed(url, e.to_string()))
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn summary_from_thing(thing: Thing, category: &str) -> Option<PostSummary> {
    if thing.kind != "t3" {
        return None;
    }
    let data = &thing.data;
    let id = str_field(data, "id")?;
    let permalink = str_field(data, "permalink").unwrap_or_default();
    let url = if permalink.is_empty() {
        str_field(data, "url").unwrap_or_default()
    } else {
        format!("{}{permalink}", super::CANONICAL_BASE)
    };

    Some(PostSummary {
        id,
        title: str_field(data, "title").unwrap_or_default(),
        url,
        subreddit: str_field(data, "subreddit").unwrap_or_else(|| category.to_string()),
    })
}

fn parse_post_response(url: &str, value: Value) -> Result<PostDetails, SourceError> {
    let Value::Array(listings) = value else {
        return Err(SourceError::malformed(url, "expected [post, comments] array"));
    };
    let mut listings = listings.into_iter();

    let post_listing = match listings.next() {
        Some(value) => parse_listing(url, value)?,
        None => return Err(SourceError::malformed(url, "empty response")),
    };
    let Some(post) = post_listing
        .children
        .into_iter()
        .find(|thing| thing.kind == "t3")
    else {
        return Err(SourceError::malformed(url, "post listing has no t3 entry"));
    };

    let comments = match listings.next() {
        Some(value) => parse_listing(url, value)?
            .children
            .into_iter()
            .filter_map(comment_from_thing)
            .collect(),
        None => {
            warn!("response carried no comment listing");
            Vec::new()
        }
    };

    let data = &post.data;
    let id = str_field(data, "id").ok_or_else(|| SourceError::malformed(url, "post has no id"))?;
    Ok(PostDetails {
        id,
        title: str_field(data, "title").unwrap_or_default(),
        author: str_field(data, "author"),
        score: data.get("score").and_then(Value::as_i64).unwrap_or_default(),
        body: str_field(data, "selftext").unwrap_or_default(),
        url: str_field(data, "url").unwrap_or_default(),
        permalink: str_field(data, "permalink").unwrap_or_default(),
        subreddit: str_field(data, "subreddit").unwrap_or_default(),
        comments,
    })
}

/// Converts a `t1` or `more` thing; unknown kinds are dropped.
///
/// Recursion depth is bounded by `serde_json`'s own nesting limit.
fn comment_from_thing(thing: Thing) -> Option<CommentNode> {
    let Thing { kind, mut data } = thing;
    match kind.as_str() {
        "t1" => {
            let upvotes = data
                .get("ups")
                .or_else(|| data.get("score"))
                .and_then(Value::as_i64)
                .unwrap_or_default();
            // An empty string when there are no replies, a Listing otherwise.
            let replies = match data.get_mut("replies").map(Value::take) {
                Some(replies @ Value::Object(_)) => parse_listing("replies", replies)
                    .map(|listing| {
                        listing
                            .children
                            .into_iter()
                            .filter_map(comment_from_thing)
                            .collect()
                    })
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            Some(CommentNode::Comment {
                author: str_field(&data, "author"),
                body: str_field(&data, "body").unwrap_or_default(),
                upvotes,
                replies,
            })
        }
        "more" => Some(CommentNode::More {
            count: data
                .get("count")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
        }),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_post_id_from_input() {
        assert_eq!(post_id_from_input("abc123"), "abc123");
        assert_eq!(post_id_from_input("t3_abc123"), "abc123");
        assert_eq!(
            post_id_from_input("https://www.reddit.com/r/memes/comments/abc123/some_title/"),
            "abc123"
        );
        assert_eq!(post_id_from_input("https://redd.it/xyz9"), "xyz9");
        assert_eq!(post_id_from_input("https://www.reddit.com/"), "");
    }

    #[test]
    fn test_parse_post_response_builds_tree() {
        let raw = json!([
            {"kind": "Listing", "data": {"children": [
                {"kind": "t3", "data": {
                    "id": "p1", "title": "Hello", "author": "op", "score": 42,
                    "selftext": "body", "url": "https://i.redd.it/x.jpg",
                    "permalink": "/r/memes/comments/p1/hello/", "subreddit": "memes"
                }}
            ]}},
            {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {
                    "author": "A", "body": "top", "ups": 5,
                    "replies": {"kind": "Listing", "data": {"children": [
                        {"kind": "t1", "data": {"author": "B", "body": "reply", "ups": 2, "replies": ""}},
                        {"kind": "more", "data": {"count": 7, "children": ["c9"]}}
                    ]}}
                }},
                {"kind": "more", "data": {"count": 12}}
            ]}}
        ]);

        let post = parse_post_response("test", raw).unwrap();
        assert_eq!(post.id, "p1");
        assert_eq!(post.author.as_deref(), Some("op"));
        assert_eq!(post.score, 42);
        assert_eq!(post.comments.len(), 2);
        assert_eq!(
            post.comments[0],
            CommentNode::Comment {
                author: Some("A".to_string()),
                body: "top".to_string(),
                upvotes: 5,
                replies: vec![
                    CommentNode::comment(Some("B"), "reply", 2, Vec::new()),
                    CommentNode::More { count: 7 },
                ],
            }
        );
        assert_eq!(post.comments[1], CommentNode::More { count: 12 });
    }

    #[test]
    fn test_parse_post_response_rejects_non_array() {
        let err = parse_post_response("u", json!({"kind": "Listing"})).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn test_summary_uses_permalink_and_falls_back_to_category() {
        let thing = Thing {
            kind: "t3".to_string(),
            data: json!({"id": "q", "title": "T", "permalink": "/r/pics/comments/q/t/"}),
        };
        let summary = summary_from_thing(thing, "pics").unwrap();
        assert_eq!(summary.url, "https://www.reddit.com/r/pics/comments/q/t/");
        assert_eq!(summary.subreddit, "pics");

        let comment = Thing {
            kind: "t1".to_string(),
            data: json!({"id": "c"}),
        };
        assert!(summary_from_thing(comment, "pics").is_none());
    }

    #[test]
    fn test_new_rejects_empty_user_agent() {
        let err = RedditClient::new("  ", None, 10, 10).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            client_id: "id".to_string(),
            client_secret: "hunter2".to_string(),
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
    }
}
