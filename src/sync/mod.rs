//! Matching of old blocks (from `structure.json`) to new blocks (from edited
//! `content.md`).
//!
//! Two passes run in order:
//!
//! 1. **Exact**: each old block takes the first unused new block with the
//!    same content hash. Hash buckets keep this linear.
//! 2. **Positional**: each still-unmatched old block looks at the new block
//!    at the same index and takes it if it is unused, of a compatible kind and
//!    at least [`SIMILARITY_THRESHOLD`] similar.
//!
//! Anything left over is a deletion (old side) or an addition (new side).
//! Heading levels are not compared, but a heading never matches a paragraph.

mod diff;

pub use diff::{diff, preview, DiffReport, ModifiedBlock, CONTENT_PREVIEW_LENGTH};

use std::collections::{HashMap, VecDeque};

use crate::hash::similarity;
use crate::model::{Block, BlockKind, Style, StyleSheet};

/// Minimum similarity for a same-position edit to count as a match.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Tuning for [`match_blocks_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    /// Minimum similarity for the positional pass
    pub threshold: f64,
    /// Whether the positional pass runs at all
    pub positional: bool,
}

impl MatchOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the similarity threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Only match identical content.
    pub fn exact_only(mut self) -> Self {
        self.positional = false;
        self
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: SIMILARITY_THRESHOLD,
            positional: true,
        }
    }
}

/// How a pair was matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    /// Identical content hash
    Exact,
    /// Same position, similar content
    Fuzzy {
        /// Similarity score in `0.0..=1.0`
        similarity: f64,
    },
}

/// One old block mapped onto a new block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMatch {
    /// Id of the old block
    pub old_id: String,
    /// Position of the old block
    pub old_index: usize,
    /// Position of the new block
    pub new_index: usize,
    /// The new block
    pub new_block: Block,
    /// Match kind
    pub kind: MatchKind,
}

/// Result of matching: old id to new block, plus what was left over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockMatches {
    matches: Vec<BlockMatch>,
    old_ids: Vec<String>,
    new_count: usize,
}

impl BlockMatches {
    /// Number of matched pairs.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Matched pairs in old-block order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockMatch> {
        self.matches.iter()
    }

    /// Match for an old block id.
    pub fn get(&self, old_id: &str) -> Option<&BlockMatch> {
        self.matches.iter().find(|m| m.old_id == old_id)
    }

    /// Old id matched to the new block at `new_index`.
    pub fn old_id_for(&self, new_index: usize) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| m.new_index == new_index)
            .map(|m| m.old_id.as_str())
    }

    /// Map from new block id to old block id.
    pub fn reverse(&self) -> HashMap<String, String> {
        self.matches
            .iter()
            .map(|m| (m.new_block.id.clone(), m.old_id.clone()))
            .collect()
    }

    /// Indices of new blocks that matched nothing.
    pub fn added(&self) -> Vec<usize> {
        let mut used = vec![false; self.new_count];
        for m in &self.matches {
            used[m.new_index] = true;
        }
        (0..self.new_count).filter(|&i| !used[i]).collect()
    }

    /// Ids of old blocks that matched nothing.
    pub fn removed(&self) -> Vec<&str> {
        self.old_ids
            .iter()
            .filter(|id| self.get(id).is_none())
            .map(String::as_str)
            .collect()
    }
}

impl<'a> IntoIterator for &'a BlockMatches {
    type Item = &'a BlockMatch;
    type IntoIter = std::slice::Iter<'a, BlockMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Whether an old block may be matched by hash to a new block of the given
/// kind.
///
/// Re-parsed markdown never yields list items, so an old list item is
/// compatible with a new paragraph. Otherwise kinds must be the same variant.
/// The positional pass always requires the same variant.
pub fn kinds_compatible(old: &BlockKind, new: &BlockKind) -> bool {
    old.same_type(new) || matches!((old, new), (BlockKind::ListItem, BlockKind::Paragraph))
}

/// Match with default options.
pub fn match_blocks(old: &[Block], new: &[Block]) -> BlockMatches {
    match_blocks_with(old, new, &MatchOptions::default())
}

/// Match old blocks to new blocks.
pub fn match_blocks_with(old: &[Block], new: &[Block], options: &MatchOptions) -> BlockMatches {
    let mut used = vec![false; new.len()];
    let mut matched: Vec<Option<BlockMatch>> = vec![None; old.len()];

    let mut buckets: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (i, block) in new.iter().enumerate() {
        buckets.entry(block.content_hash.as_str()).or_default().push_back(i);
    }

    for (i, old_block) in old.iter().enumerate() {
        let Some(bucket) = buckets.get_mut(old_block.content_hash.as_str()) else {
            continue;
        };
        let Some(pos) = bucket
            .iter()
            .position(|&j| kinds_compatible(&old_block.kind, &new[j].kind))
        else {
            continue;
        };
        let Some(j) = bucket.remove(pos) else {
            continue;
        };
        used[j] = true;
        matched[i] = Some(BlockMatch {
            old_id: old_block.id.clone(),
            old_index: i,
            new_index: j,
            new_block: new[j].clone(),
            kind: MatchKind::Exact,
        });
    }

    if options.positional {
        for (i, old_block) in old.iter().enumerate() {
            if matched[i].is_some() || i >= new.len() || used[i] {
                continue;
            }
            let candidate = &new[i];
            if !old_block.kind.same_type(&candidate.kind) {
                continue;
            }
            let score = similarity(&old_block.content, &candidate.content);
            if score < options.threshold {
                log::debug!(
                    "{} vs {}: similarity {:.2} below threshold",
                    old_block.id,
                    candidate.id,
                    score
                );
                continue;
            }
            used[i] = true;
            matched[i] = Some(BlockMatch {
                old_id: old_block.id.clone(),
                old_index: i,
                new_index: i,
                new_block: candidate.clone(),
                kind: MatchKind::Fuzzy { similarity: score },
            });
        }
    }

    let matches: Vec<BlockMatch> = matched.into_iter().flatten().collect();
    log::debug!(
        "matched {} of {} old blocks against {} new blocks",
        matches.len(),
        old.len(),
        new.len()
    );

    BlockMatches {
        matches,
        old_ids: old.iter().map(|b| b.id.clone()).collect(),
        new_count: new.len(),
    }
}

/// Style sheet for the new blocks.
///
/// Matched blocks get a copy of their old block's style re-keyed to the new
/// id; unmatched blocks get document defaults. Image blocks carry no style.
pub fn sync_styles(old_styles: &StyleSheet, matches: &BlockMatches, new_blocks: &[Block]) -> StyleSheet {
    let defaults = &old_styles.document_defaults;
    let styles = new_blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| !matches!(block.kind, BlockKind::Image { .. }))
        .map(|(i, block)| {
            matches
                .old_id_for(i)
                .and_then(|old_id| old_styles.get(old_id))
                .map(|style| style.rekeyed(block.id.clone()))
                .unwrap_or_else(|| Style::new(block.id.clone(), defaults))
        });

    StyleSheet::from_styles(styles, defaults.clone())
}

/// Give exactly matched new blocks the kind and inline spans of their old
/// block.
///
/// Re-parsed markdown loses list kinds and underline/hyperlink spans; for
/// verbatim-unchanged content the old values are still valid.
pub fn carry_forward(old: &[Block], new: &mut [Block], matches: &BlockMatches) {
    for m in matches {
        if m.kind != MatchKind::Exact {
            continue;
        }
        let (Some(old_block), Some(new_block)) = (old.get(m.old_index), new.get_mut(m.new_index)) else {
            continue;
        };
        new_block.kind = old_block.kind.clone();
        new_block.inline_formatting = old_block.inline_formatting.clone();
    }
}
