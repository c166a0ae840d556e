//! Media references and their deterministic fetch-URL/filename resolution.

use std::fmt;

use url::Url;

/// Template for Giphy asset URLs; `{id}` is replaced with the asset id.
const GIPHY_URL_TEMPLATE: &str = "https://media.giphy.com/media/{id}/giphy.gif";

/// Extension given to Giphy asset files.
const GIPHY_EXTENSION: &str = "gif";

/// Looping-video suffix and the playable suffix it is rewritten to.
const GIFV_SUFFIX: &str = ".gifv";
const VIDEO_SUFFIX: &str = ".mp4";

/// Image suffixes recognised on a post's own link.
const IMAGE_SUFFIXES: [&str; 3] = [".jpg", ".png", ".gif"];

/// Filename used when a URL has no usable last path segment.
const FALLBACK_FILENAME: &str = "media";

/// A reference to one downloadable media asset, tagged by its source shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaRef {
    /// Direct image URL on a known image host.
    DirectImage(String),
    /// URL ending in `.gifv`; fetched as `.mp4`.
    GifVideo(String),
    /// Giphy asset id taken from a `giphy|<id>` marker.
    GiphyAsset(String),
}

/// Where a [`MediaRef`] is fetched from and the filename it is saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// URL to request.
    pub fetch_url: String,
    /// Local filename (never empty, never contains a path separator).
    pub filename: String,
}

impl MediaRef {
    /// Classifies a post's own link as main media, if it is one.
    ///
    /// Only image suffixes and `.gifv` are recognised; anything else
    /// (galleries, hosted video, external pages) returns `None`.
    #[must_use]
    pub fn from_post_url(url: &str) -> Option<Self> {
        if IMAGE_SUFFIXES.iter().any(|suffix| url.ends_with(suffix)) {
            Some(Self::DirectImage(url.to_string()))
        } else if url.ends_with(GIFV_SUFFIX) {
            Some(Self::GifVideo(url.to_string()))
        } else {
            None
        }
    }

    /// The text this reference was extracted from (URL or `giphy|<id>`).
    #[must_use]
    pub fn source(&self) -> String {
        match self {
            Self::DirectImage(url) | Self::GifVideo(url) => url.clone(),
            Self::GiphyAsset(id) => format!("giphy|{id}"),
        }
    }

    /// Resolves the fetch URL and local filename for this reference.
    #[must_use]
    pub fn resolve(&self) -> ResolvedMedia {
        match self {
            Self::DirectImage(url) => ResolvedMedia {
                fetch_url: url.clone(),
                filename: filename_from_url(url),
            },
            Self::GifVideo(url) => {
                let fetch_url = match url.strip_suffix(GIFV_SUFFIX) {
                    Some(stem) => format!("{stem}{VIDEO_SUFFIX}"),
                    None => url.replace(GIFV_SUFFIX, VIDEO_SUFFIX),
                };
                let filename = filename_from_url(&fetch_url);
                ResolvedMedia {
                    fetch_url,
                    filename,
                }
            }
            Self::GiphyAsset(id) => ResolvedMedia {
                fetch_url: GIPHY_URL_TEMPLATE.replace("{id}", id),
                filename: sanitize_filename(&format!("{id}.{GIPHY_EXTENSION}")),
            },
        }
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source())
    }
}

/// Derives a filename from the last path segment of `raw`.
fn filename_from_url(raw: &str) -> String {
    let segment = match Url::parse(raw) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(ToString::to_string)
            .unwrap_or_default(),
        // Unparseable URLs still get a name: strip query/fragment by hand.
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string(),
    };

    let decoded = urlencoding::decode(&segment)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or(segment);
    sanitize_filename(&decoded)
}

/// Replaces path separators and falls back to a fixed name when empty.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}
