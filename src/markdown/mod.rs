//! Markdown rendering and re-parsing of block sequences.
//!
//! Rendering joins block contents with newlines. Parsing is deliberately
//! lossy: every non-blank line becomes one block, classified only as image,
//! heading or paragraph, which is all the matcher needs.

pub mod inline;

use crate::model::{Block, BlockKind};

/// Render blocks as the archive's `content.md`.
pub fn render(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|b| b.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse markdown back into blocks.
///
/// Lines are trimmed and blank lines skipped. Ids are `block-N` in order,
/// offsets are recomputed cumulatively and each block is hashed.
pub fn parse(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut offset = 0;

    for line in markdown.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let index = blocks.len();
        let kind = classify(line);
        let block = Block::new(format!("block-{}", index), kind, line, index, offset);
        offset = block.next_offset();
        blocks.push(block);
    }

    log::debug!("parsed {} blocks from markdown", blocks.len());
    blocks
}

fn classify(line: &str) -> BlockKind {
    if let Some(path) = image_path(line) {
        return BlockKind::image(path);
    }
    if line.starts_with('#') {
        let hashes = line.chars().take_while(|&c| c == '#').count();
        return BlockKind::heading(hashes.min(6) as u8);
    }
    BlockKind::Paragraph
}

/// Path inside `![alt](path)`, taken between the first `](` and the last `)`.
pub fn image_path(line: &str) -> Option<&str> {
    if !line.starts_with("![") || !line.ends_with(')') {
        return None;
    }
    let start = line.find("](")? + 2;
    let end = line.rfind(')')?;
    line.get(start..end)
}

/// Markdown line for an extracted image.
pub fn image_markdown(number: usize, path: &str) -> String {
    format!("![Image {}]({})", number, path)
}
