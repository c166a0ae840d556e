//! Markdown rendering of an archived post.

use std::fmt::Write as _;
use std::path::{Component, Path};

use crate::comments::{CommentEntry, DELETED_AUTHOR};
use crate::download::DownloadResults;
use crate::source::PostDetails;

/// Renders the archive document for `post`.
///
/// `main_media` and every path in `downloads` are embedded relative to
/// `post_dir`, always with `/` separators. Media that failed to download
/// is left out.
#[must_use]
pub fn render_document(
    post: &PostDetails,
    main_media: Option<&Path>,
    entries: &[CommentEntry],
    downloads: &DownloadResults,
    post_dir: &Path,
) -> String {
    let mut doc = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(doc, "# Reddit Post - {}\n", post.title);
    let _ = writeln!(doc, "- **Subreddit**: r/{}", post.subreddit);
    let _ = writeln!(
        doc,
        "- **Author**: {}",
        post.author.as_deref().unwrap_or(DELETED_AUTHOR)
    );
    let _ = writeln!(doc, "- **Ups**: {}", post.score);
    let _ = writeln!(doc, "- **URL**: {}\n", post.canonical_url());

    if !post.body.is_empty() {
        let _ = writeln!(doc, "**Body**:\n{}\n", post.body);
    }

    if let Some(path) = main_media {
        let _ = writeln!(
            doc,
            "**Main Media**:\n![main_media]({})\n",
            relative_link(path, post_dir)
        );
    }

    doc.push_str("---\n\n## Comments:\n\n");

    for entry in entries {
        let indent = "  ".repeat(entry.depth);
        match &entry.parent_author {
            Some(parent) => {
                let _ = writeln!(
                    doc,
                    "{indent}↳ **{}** replying to {parent} (👍 {}): {}",
                    entry.author, entry.upvotes, entry.body
                );
            }
            None => {
                let _ = writeln!(
                    doc,
                    "{indent}**{}** (👍 {}): {}",
                    entry.author, entry.upvotes, entry.body
                );
            }
        }
        for media in &entry.media_refs {
            if let Some(path) = downloads.path_for(media) {
                let _ = writeln!(doc, "{indent}  ![media]({})", relative_link(path, post_dir));
            }
        }
        doc.push('\n');
    }

    doc
}

/// `path` relative to `base` when it lies under it, joined with `/`.
fn relative_link(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
