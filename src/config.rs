//! Runtime configuration.
//!
//! [`Settings`] is resolved once at startup from layers, lowest first:
//! built-in defaults, the TOML config file, environment variables, then CLI
//! flags. Every layer is a [`ConfigLayer`] of optional values; the highest
//! layer that sets a key wins.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::source::{Credentials, SortMode};
use crate::user_agent::default_api_user_agent;

/// Default link store file.
pub const DEFAULT_STORE_PATH: &str = "links_store.json";
/// Default archive root directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "downloaded_posts";
/// Default category to discover.
pub const DEFAULT_SUBREDDIT: &str = "memes";
/// Default posts listed per category.
pub const DEFAULT_LIMIT: usize = 1000;
/// Default pause between posts of a batch.
pub const DEFAULT_POST_DELAY_MS: u64 = 2000;
/// Default pause between categories during discovery.
pub const DEFAULT_DISCOVER_DELAY_MS: u64 = 5000;
/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default per-read timeout.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;

const MAX_DELAY_MS: u64 = 60_000;
const MAX_LIMIT: usize = 1000;
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Environment variables read into the environment layer.
pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
/// See [`ENV_CLIENT_ID`].
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
/// See [`ENV_CLIENT_ID`].
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

/// Configuration errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A value is out of range or inconsistent.
    #[error("invalid value for `{name}`: {message}")]
    InvalidValue {
        /// Key name.
        name: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// One layer of optional settings, as written in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    /// Link store file.
    pub store_path: Option<PathBuf>,
    /// Archive root directory.
    pub output_root: Option<PathBuf>,
    /// Categories to discover.
    pub subreddits: Option<Vec<String>>,
    /// Listing order for discovery.
    pub sort: Option<SortMode>,
    /// Posts listed per category (1..=1000).
    pub limit: Option<usize>,
    /// Concurrent media downloads (1..=100).
    pub concurrency: Option<usize>,
    /// Pause between posts in milliseconds (0..=60000).
    pub post_delay_ms: Option<u64>,
    /// Pause between categories in milliseconds (0..=60000).
    pub discover_delay_ms: Option<u64>,
    /// Connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Per-read timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// User agent for API requests.
    pub user_agent: Option<String>,
}

impl ConfigLayer {
    /// Parses a layer from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error on bad syntax, wrong types or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Reads and parses the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the environment layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the environment layer from `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            client_id: get(ENV_CLIENT_ID),
            client_secret: get(ENV_CLIENT_SECRET),
            user_agent: get(ENV_USER_AGENT),
            ..Self::default()
        }
    }

    /// Returns `self` with unset keys filled from `lower`.
    #[must_use]
    pub fn over(self, lower: Self) -> Self {
        Self {
            store_path: self.store_path.or(lower.store_path),
            output_root: self.output_root.or(lower.output_root),
            subreddits: self.subreddits.or(lower.subreddits),
            sort: self.sort.or(lower.sort),
            limit: self.limit.or(lower.limit),
            concurrency: self.concurrency.or(lower.concurrency),
            post_delay_ms: self.post_delay_ms.or(lower.post_delay_ms),
            discover_delay_ms: self.discover_delay_ms.or(lower.discover_delay_ms),
            connect_timeout_secs: self.connect_timeout_secs.or(lower.connect_timeout_secs),
            read_timeout_secs: self.read_timeout_secs.or(lower.read_timeout_secs),
            client_id: self.client_id.or(lower.client_id),
            client_secret: self.client_secret.or(lower.client_secret),
            user_agent: self.user_agent.or(lower.user_agent),
        }
    }
}

/// Resolves the default config file path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/post-archiver/config.toml`
/// 2. `$HOME/.config/post-archiver/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("post-archiver")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("post-archiver")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the file layer.
///
/// An explicit path must exist. Without one, the default path is used when a
/// file is present there, and an empty layer otherwise.
///
/// # Errors
///
/// Returns [`ConfigError`] when the chosen file cannot be read or parsed.
pub fn load_file_layer(explicit: Option<&Path>) -> Result<ConfigLayer, ConfigError> {
    if let Some(path) = explicit {
        return ConfigLayer::from_file(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.is_file() => {
            debug!(path = %path.display(), "loading config file");
            ConfigLayer::from_file(&path)
        }
        _ => Ok(ConfigLayer::default()),
    }
}

/// Fully resolved, validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Link store file.
    pub store_path: PathBuf,
    /// Archive root directory.
    pub output_root: PathBuf,
    /// Categories to discover.
    pub subreddits: Vec<String>,
    /// Listing order for discovery.
    pub sort: SortMode,
    /// Posts listed per category.
    pub limit: usize,
    /// Concurrent media downloads.
    pub concurrency: usize,
    /// Pause between posts.
    pub post_delay: Duration,
    /// Pause between categories.
    pub discover_delay: Duration,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-read timeout in seconds.
    pub read_timeout_secs: u64,
    /// App-only OAuth credentials, when configured.
    pub credentials: Option<Credentials>,
    /// User agent for API requests.
    pub user_agent: String,
}

impl Settings {
    /// Applies defaults to `layer` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for out-of-range values, an empty
    /// category list, or a client id without a secret (or the reverse).
    pub fn resolve(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let subreddits: Vec<String> = layer
            .subreddits
            .unwrap_or_else(|| vec![DEFAULT_SUBREDDIT.to_string()])
            .into_iter()
            .map(|name| name.trim().trim_start_matches("r/").to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if subreddits.is_empty() {
            return Err(ConfigError::invalid(
                "subreddits",
                "at least one subreddit is required",
            ));
        }

        let limit = layer.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ConfigError::invalid(
                "limit",
                format!("{limit}. Expected range: 1..={MAX_LIMIT}"),
            ));
        }

        let concurrency = layer.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ConfigError::invalid(
                "concurrency",
                format!("{concurrency}. Expected range: {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"),
            ));
        }

        let post_delay_ms = validate_delay_ms(
            "post_delay_ms",
            layer.post_delay_ms.unwrap_or(DEFAULT_POST_DELAY_MS),
        )?;
        let discover_delay_ms = validate_delay_ms(
            "discover_delay_ms",
            layer.discover_delay_ms.unwrap_or(DEFAULT_DISCOVER_DELAY_MS),
        )?;
        let connect_timeout_secs = validate_timeout_secs(
            "connect_timeout_secs",
            layer
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )?;
        let read_timeout_secs = validate_timeout_secs(
            "read_timeout_secs",
            layer.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
        )?;

        let credentials = match (layer.client_id, layer.client_secret) {
            (Some(client_id), Some(client_secret)) => Some(Credentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::invalid(
                    "client_secret",
                    "client_id is set but client_secret is missing",
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::invalid(
                    "client_id",
                    "client_secret is set but client_id is missing",
                ));
            }
        };

        let user_agent = layer
            .user_agent
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(default_api_user_agent);

        Ok(Self {
            store_path: layer
                .store_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            output_root: layer
                .output_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT)),
            subreddits,
            sort: layer.sort.unwrap_or_default(),
            limit,
            concurrency,
            post_delay: Duration::from_millis(post_delay_ms),
            discover_delay: Duration::from_millis(discover_delay_ms),
            connect_timeout_secs,
            read_timeout_secs,
            credentials,
            user_agent,
        })
    }
}

fn validate_delay_ms(field: &str, value: u64) -> Result<u64, ConfigError> {
    if value > MAX_DELAY_MS {
        return Err(ConfigError::invalid(
            field,
            format!("{value}. Expected range: 0..={MAX_DELAY_MS}"),
        ));
    }
    Ok(value)
}

fn validate_timeout_secs(field: &str, value: u64) -> Result<u64, ConfigError> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{value}. Expected range: 1..={MAX_TIMEOUT_SECS}"),
        ));
    }
    Ok(value)
}
