//! Pattern-based media link extraction from free-form comment text.
//!
//! Each rule runs independently over the whole text and every match is kept,
//! so a URL matched by two rules yields two references.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::MediaRef;

/// Which [`MediaRef`] variant a rule produces.
#[derive(Debug, Clone, Copy)]
enum RuleKind {
    Image,
    LoopingVideo,
    Giphy,
}

/// A single extraction rule: a pattern and the variant its matches become.
struct Rule {
    kind: RuleKind,
    pattern: Regex,
}

impl Rule {
    fn to_media(&self, captured: &str) -> MediaRef {
        match self.kind {
            RuleKind::Image => MediaRef::DirectImage(captured.to_string()),
            RuleKind::LoopingVideo => MediaRef::GifVideo(captured.to_string()),
            RuleKind::Giphy => MediaRef::GiphyAsset(captured.to_string()),
        }
    }
}

/// Extraction rules in priority order. Capture group 1 holds the payload.
#[allow(clippy::expect_used)]
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule {
            kind: RuleKind::Image,
            pattern: Regex::new(
                r"(https?://(?:i\.redd\.it|v\.redd\.it|[\w.]*reddit\.com)/\S+(?:\.jpg|\.png|\.gif))",
            )
            .expect("image regex is valid"), // Static pattern, safe to panic
        },
        Rule {
            kind: RuleKind::LoopingVideo,
            pattern: Regex::new(r"(https?://\S+\.gifv)").expect("gifv regex is valid"),
        },
        Rule {
            kind: RuleKind::Giphy,
            pattern: Regex::new(r"giphy\|([a-zA-Z0-9]+)").expect("giphy regex is valid"),
        },
    ]
});

/// Extracts media references from `text`.
///
/// Results are ordered by where each match starts in the text; two matches
/// starting at the same offset keep rule order. Duplicates are preserved.
///
/// # Examples
///
/// ```
/// use post_archiver::media::{MediaRef, extract};
///
/// let refs = extract("see https://i.redd.it/abc123.jpg and giphy|xyz789");
/// assert_eq!(
///     refs,
///     vec![
///         MediaRef::DirectImage("https://i.redd.it/abc123.jpg".to_string()),
///         MediaRef::GiphyAsset("xyz789".to_string()),
///     ]
/// );
/// ```
#[must_use]
pub fn extract(text: &str) -> Vec<MediaRef> {
    let mut found: Vec<(usize, usize, MediaRef)> = Vec::new();

    for (rule_index, rule) in RULES.iter().enumerate() {
        for captures in rule.pattern.captures_iter(text) {
            let (Some(whole), Some(payload)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            trace!(start = whole.start(), matched = payload.as_str(), "media match");
            found.push((whole.start(), rule_index, rule.to_media(payload.as_str())));
        }
    }

    found.sort_by_key(|(start, rule_index, _)| (*start, *rule_index));
    found.into_iter().map(|(_, _, media)| media).collect()
}
