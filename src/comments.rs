//! Comment-tree flattening.
//!
//! [`walk`] turns a nested reply structure into depth-annotated entries in
//! depth-first pre-order. "Load more" placeholders are skipped, so only replies
//! already present in the fetched tree are included.

use crate::media::{self, MediaRef};

/// Author shown for comments whose author is gone.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// One node of a fetched reply tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentNode {
    /// A materialized comment.
    Comment {
        /// Author name, `None` when the account was deleted.
        author: Option<String>,
        /// Comment text.
        body: String,
        /// Net upvotes.
        upvotes: i64,
        /// Direct replies in source order.
        replies: Vec<CommentNode>,
    },
    /// Placeholder for replies that were not materialized.
    More {
        /// Number of hidden replies reported by the source.
        count: u64,
    },
}

impl CommentNode {
    /// Convenience constructor for a comment node.
    #[must_use]
    pub fn comment(
        author: Option<&str>,
        body: &str,
        upvotes: i64,
        replies: Vec<CommentNode>,
    ) -> Self {
        Self::Comment {
            author: author.map(ToString::to_string),
            body: body.to_string(),
            upvotes,
            replies,
        }
    }
}

impl Drop for CommentNode {
    // Flattens the subtree first so dropping a deep reply chain cannot
    // overflow the stack.
    fn drop(&mut self) {
        let Self::Comment { replies, .. } = self else {
            return;
        };
        let mut pending = std::mem::take(replies);
        while let Some(mut node) = pending.pop() {
            if let Self::Comment { replies, .. } = &mut node {
                pending.append(replies);
            }
        }
    }
}

/// A flattened comment ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEntry {
    /// Nesting level; top-level comments are 0.
    pub depth: usize,
    /// Resolved author, [`DELETED_AUTHOR`] when absent.
    pub author: String,
    /// Net upvotes.
    pub upvotes: i64,
    /// Comment text.
    pub body: String,
    /// Resolved author of the immediate parent; `None` for top-level comments.
    pub parent_author: Option<String>,
    /// Media references found in `body`.
    pub media_refs: Vec<MediaRef>,
}

/// Flattens `roots` depth-first, pre-order, children in source order.
///
/// Uses an explicit stack, so arbitrarily deep trees cannot overflow.
#[must_use]
pub fn walk(roots: &[CommentNode]) -> Vec<CommentEntry> {
    let mut entries = Vec::new();
    // (node, depth, parent author); pushed in reverse to pop in source order.
    let mut stack: Vec<(&CommentNode, usize, Option<String>)> =
        roots.iter().rev().map(|node| (node, 0, None)).collect();

    while let Some((node, depth, parent_author)) = stack.pop() {
        let CommentNode::Comment {
            author,
            body,
            upvotes,
            replies,
        } = node
        else {
            continue;
        };

        let author = author
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DELETED_AUTHOR.to_string());

        for reply in replies.iter().rev() {
            stack.push((reply, depth + 1, Some(author.clone())));
        }

        entries.push(CommentEntry {
            depth,
            author,
            upvotes: *upvotes,
            body: body.clone(),
            parent_author,
            media_refs: media::extract(body),
        });
    }

    entries
}

/// Distinct media references across `entries`, in first-seen order.
#[must_use]
pub fn collect_media(entries: &[CommentEntry]) -> Vec<MediaRef> {
    let mut seen = std::collections::HashSet::new();
    entries
        .iter()
        .flat_map(|entry| entry.media_refs.iter())
        .filter(|media| seen.insert(*media))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(author: &str) -> CommentNode {
        CommentNode::comment(Some(author), &format!("{author} says hi"), 1, Vec::new())
    }

    #[test]
    fn test_walk_pre_order_with_depth_and_parent() {
        // A -> [B, C -> [D]]
        let tree = vec![CommentNode::comment(
            Some("A"),
            "root",
            10,
            vec![
                leaf("B"),
                CommentNode::comment(Some("C"), "mid", 3, vec![leaf("D")]),
            ],
        )];

        let entries = walk(&tree);
        let summary: Vec<(&str, usize, Option<&str>)> = entries
            .iter()
            .map(|e| (e.author.as_str(), e.depth, e.parent_author.as_deref()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("A", 0, None),
                ("B", 1, Some("A")),
                ("C", 1, Some("A")),
                ("D", 2, Some("C")),
            ]
        );
    }

    #[test]
    fn test_walk_multiple_roots_keep_source_order() {
        let entries = walk(&[leaf("first"), leaf("second")]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].author, "first");
        assert_eq!(entries[1].author, "second");
        assert!(entries.iter().all(|e| e.depth == 0 && e.parent_author.is_none()));
    }

    #[test]
    fn test_walk_skips_more_sentinels_at_every_level() {
        let tree = vec![
            CommentNode::More { count: 40 },
            CommentNode::comment(
                Some("A"),
                "root",
                1,
                vec![CommentNode::More { count: 3 }, leaf("B")],
            ),
        ];

        let authors: Vec<String> = walk(&tree).into_iter().map(|e| e.author).collect();
        assert_eq!(authors, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_deleted_author_propagates_to_children() {
        let tree = vec![CommentNode::comment(None, "gone", 0, vec![leaf("kid")])];

        let entries = walk(&tree);
        assert_eq!(entries[0].author, DELETED_AUTHOR);
        assert_eq!(entries[1].parent_author.as_deref(), Some(DELETED_AUTHOR));
    }

    #[test]
    fn test_walk_extracts_media_per_entry() {
        let tree = vec![CommentNode::comment(
            Some("A"),
            "look https://i.redd.it/cat.png",
            5,
            vec![CommentNode::comment(Some("B"), "giphy|abc", 2, Vec::new())],
        )];

        let entries = walk(&tree);
        assert_eq!(
            entries[0].media_refs,
            vec![MediaRef::DirectImage("https://i.redd.it/cat.png".to_string())]
        );
        assert_eq!(
            entries[1].media_refs,
            vec![MediaRef::GiphyAsset("abc".to_string())]
        );
    }

    #[test]
    fn test_walk_deep_chain_does_not_overflow() {
        let mut node = leaf("bottom");
        for i in 0..50_000 {
            node = CommentNode::comment(Some(&format!("u{i}")), "x", 0, vec![node]);
        }
        let entries = walk(std::slice::from_ref(&node));
        assert_eq!(entries.len(), 50_001);
        assert_eq!(entries.last().map(|e| e.depth), Some(50_000));
    }

    #[test]
    fn test_drop_deep_chain_does_not_overflow() {
        let mut node = leaf("bottom");
        for i in 0..200_000 {
            node = CommentNode::comment(Some(&format!("u{i}")), "x", 0, vec![node]);
        }
        drop(node);
    }

    #[test]
    fn test_drop_wide_tree_with_placeholders() {
        let replies = (0..1_000)
            .map(|i| {
                if i % 2 == 0 {
                    CommentNode::More { count: i }
                } else {
                    CommentNode::comment(Some("r"), "y", 0, vec![leaf("z")])
                }
            })
            .collect();
        let tree = CommentNode::comment(Some("root"), "x", 0, replies);
        assert_eq!(walk(std::slice::from_ref(&tree)).len(), 1 + 500 * 2);
    }

    #[test]
    fn test_collect_media_dedups_in_first_seen_order() {
        let tree = vec![
            CommentNode::comment(Some("A"), "giphy|one giphy|two", 1, Vec::new()),
            CommentNode::comment(Some("B"), "giphy|two giphy|one giphy|three", 1, Vec::new()),
        ];

        let media = collect_media(&walk(&tree));
        assert_eq!(
            media,
            vec![
                MediaRef::GiphyAsset("one".to_string()),
                MediaRef::GiphyAsset("two".to_string()),
                MediaRef::GiphyAsset("three".to_string()),
            ]
        );
    }

    #[test]
    fn test_walk_empty() {
        assert!(walk(&[]).is_empty());
    }
}
