//! Style pass: one [`Style`] per non-image block.

use crate::docx::SourceParagraph;
use crate::model::{Block, BlockKind, DocumentDefaults, Style, StyleSheet};

/// Build the style sheet for extracted blocks.
///
/// Each block is matched back to its source paragraph by
/// `source_paragraph_index`. Missing fonts fall back to `defaults`, missing
/// alignment to left.
pub fn extract_styles(
    blocks: &[Block],
    paragraphs: &[SourceParagraph],
    defaults: &DocumentDefaults,
) -> StyleSheet {
    let styles = blocks
        .iter()
        .filter(|block| !matches!(block.kind, BlockKind::Image { .. }))
        .map(|block| match paragraphs.get(block.source_paragraph_index) {
            Some(paragraph) => style_for(block, paragraph, defaults),
            None => Style::new(block.id.clone(), defaults),
        });

    StyleSheet::from_styles(styles, defaults.clone())
}

fn style_for(block: &Block, paragraph: &SourceParagraph, defaults: &DocumentDefaults) -> Style {
    let mut style = Style::new(block.id.clone(), defaults);
    if !paragraph.style_name.is_empty() {
        style.source_style_name = paragraph.style_name.clone();
    }
    if let Some(font_name) = paragraph.font_name.as_ref().filter(|f| !f.is_empty()) {
        style.font_name = font_name.clone();
    }
    if let Some(size) = paragraph.font_size.filter(|&s| s > 0) {
        style.font_size = size;
    }
    style.alignment = paragraph.alignment.unwrap_or_default();
    style
}
