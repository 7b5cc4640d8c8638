//! Read-only change report between two block sequences.

use serde::Serialize;

use super::{match_blocks_with, MatchKind, MatchOptions};
use crate::model::Block;

/// Characters of block content shown in change listings.
pub const CONTENT_PREVIEW_LENGTH: usize = 50;

/// A matched pair whose content changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedBlock {
    /// Old block
    pub old: Block,
    /// New block
    pub new: Block,
    /// Similarity of old and new content
    pub similarity: f64,
}

/// Blocks added, removed and modified between two versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffReport {
    /// New blocks that matched nothing
    pub added: Vec<Block>,
    /// Old blocks that matched nothing
    pub removed: Vec<Block>,
    /// Matched blocks whose hash changed
    pub modified: Vec<ModifiedBlock>,
    /// Matched blocks with identical content
    pub unchanged: usize,
}

impl DiffReport {
    /// Whether anything changed.
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty())
    }

    /// One-line summary, e.g. `2 added, 1 removed, 0 modified, 5 unchanged`.
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} removed, {} modified, {} unchanged",
            self.added.len(),
            self.removed.len(),
            self.modified.len(),
            self.unchanged
        )
    }
}

/// Compare old blocks against new blocks.
pub fn diff(old: &[Block], new: &[Block], options: &MatchOptions) -> DiffReport {
    let matches = match_blocks_with(old, new, options);
    let mut report = DiffReport::default();

    for m in &matches {
        let old_block = &old[m.old_index];
        if old_block.content_hash == m.new_block.content_hash {
            report.unchanged += 1;
            continue;
        }
        let similarity = match m.kind {
            MatchKind::Fuzzy { similarity } => similarity,
            MatchKind::Exact => 1.0,
        };
        report.modified.push(ModifiedBlock {
            old: old_block.clone(),
            new: m.new_block.clone(),
            similarity,
        });
    }

    report.removed = matches
        .removed()
        .into_iter()
        .filter_map(|id| old.iter().find(|b| b.id == id).cloned())
        .collect();
    report.added = matches.added().into_iter().map(|i| new[i].clone()).collect();

    report
}

/// Shorten content for display, appending `...` when cut.
pub fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let cut: String = content.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown;

    #[test]
    fn test_diff_classifies_changes() {
        let old = markdown::parse(
            "# Title\nThe quick brown fox jumps over the lazy dog today.\nGone paragraph entirely.",
        );
        let new = markdown::parse(
            "# Title\nThe quick brown fox jumps over the lazy cat today.\n0123456789 + 9876543210 !!",
        );

        let report = diff(&old, &new, &MatchOptions::default());
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.modified.len(), 1);
        assert!(report.modified[0].similarity >= 0.7);
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].content, "Gone paragraph entirely.");
        assert_eq!(report.added.len(), 1);
        assert!(report.has_changes());
        assert_eq!(report.summary(), "1 added, 1 removed, 1 modified, 1 unchanged");
    }

    #[test]
    fn test_diff_no_changes() {
        let blocks = markdown::parse("# A\nB");
        let report = diff(&blocks, &blocks, &MatchOptions::default());
        assert!(!report.has_changes());
        assert_eq!(report.unchanged, 2);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
    }
}
