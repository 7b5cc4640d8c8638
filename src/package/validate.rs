//! Consistency checks beyond what opening an archive already enforces.

use std::collections::HashSet;

use serde::Serialize;

use super::{Archive, ASSETS_PREFIX};
use crate::model::{BlockKind, FORMAT_VERSION};

/// Outcome of [`validate`]. Structural failures surface as errors when the
/// archive is opened; everything here is advisory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Number of stored blocks
    pub blocks: usize,
    /// Number of block styles
    pub styles: usize,
    /// Number of assets
    pub assets: usize,
    /// Whether `content.md` was edited since the last write
    pub content_modified: bool,
    /// Non-fatal findings
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Whether no warnings were raised.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Check an opened archive for internal inconsistencies.
pub fn validate(archive: &Archive) -> ValidationReport {
    let mut report = ValidationReport {
        blocks: archive.blocks.len(),
        styles: archive.styles.len(),
        assets: archive.assets.len(),
        content_modified: archive.is_content_modified(),
        warnings: Vec::new(),
    };

    if archive.manifest.version != FORMAT_VERSION {
        report.warnings.push(format!(
            "archive format version {} differs from {}",
            archive.manifest.version, FORMAT_VERSION
        ));
    }

    let mut ids = HashSet::new();
    let mut previous_end: Option<usize> = None;
    for block in &archive.blocks {
        if !ids.insert(block.id.as_str()) {
            report.warnings.push(format!("duplicate block id {}", block.id));
        }
        if block.content_end < block.content_start {
            report
                .warnings
                .push(format!("{} has an inverted content range", block.id));
        }
        if let Some(end) = previous_end {
            if block.content_start <= end {
                report
                    .warnings
                    .push(format!("{} overlaps the previous block", block.id));
            }
        }
        previous_end = Some(block.content_end);

        if let BlockKind::Image { path } = &block.kind {
            let name = path.strip_prefix(ASSETS_PREFIX).unwrap_or(path);
            if !archive.assets.contains_key(name) {
                report
                    .warnings
                    .push(format!("{} references missing asset {}", block.id, path));
            }
        }
    }

    for id in archive.styles.block_styles.keys() {
        if !ids.contains(id.as_str()) {
            report
                .warnings
                .push(format!("style for unknown block {}", id));
        }
    }

    for warning in &report.warnings {
        log::warn!("{}", warning);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::sample_archive;

    #[test]
    fn test_clean_archive() {
        let report = validate(&sample_archive());
        assert!(report.is_clean(), "{:?}", report.warnings);
        assert_eq!(report.blocks, 3);
        assert_eq!(report.styles, 2);
        assert_eq!(report.assets, 1);
        assert!(!report.content_modified);
    }

    #[test]
    fn test_missing_asset_and_orphan_style() {
        let mut archive = sample_archive();
        archive.assets.clear();
        archive.styles.block_styles.insert(
            "block-99".to_string(),
            crate::model::Style::new("block-99", &archive.styles.document_defaults),
        );
        archive.content.push_str("\nmore");

        let report = validate(&archive);
        assert!(report.content_modified);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("missing asset assets/image1.png"));
        assert!(report.warnings[1].contains("block-99"));
    }
}
