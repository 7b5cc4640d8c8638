//! Extraction engine: source document to blocks, styles and image assets.
//!
//! Paragraphs are folded left to right through an [`ExtractState`] that
//! carries the running image and list counters and the markdown offset, so
//! extraction is a pure function of the document and the options.

pub mod image;
pub mod inline;
pub mod styles;

use std::collections::BTreeMap;

use crate::docx::{DocumentSource, SourceImage, SourceParagraph};
use crate::error::Result;
use crate::markdown;
use crate::markdown::inline::escape_heading_marker;
use crate::model::{
    Block, BlockKind, DocumentDefaults, InlineFormat, StyleSheet, DEFAULT_FONT_NAME,
    DEFAULT_FONT_SIZE,
};

pub use image::{ImageFormat, ImageInfo, ImageRejection, MAX_IMAGE_SIZE};
pub use inline::{render_children, RenderedInline};
pub use styles::extract_styles;

/// Options for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Largest image accepted, in bytes
    pub max_image_size: u64,

    /// Font recorded when the document declares none
    pub default_font_name: String,

    /// Font size (points) recorded when the document declares none
    pub default_font_size: u32,
}

impl ExtractOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image size limit.
    pub fn with_max_image_size(mut self, bytes: u64) -> Self {
        self.max_image_size = bytes;
        self
    }

    /// Set the fallback font.
    pub fn with_default_font(mut self, name: impl Into<String>, size: u32) -> Self {
        self.default_font_name = name.into();
        self.default_font_size = size;
        self
    }

    fn defaults(&self) -> DocumentDefaults {
        DocumentDefaults {
            font_name: self.default_font_name.clone(),
            font_size: self.default_font_size,
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_image_size: MAX_IMAGE_SIZE,
            default_font_name: DEFAULT_FONT_NAME.to_string(),
            default_font_size: DEFAULT_FONT_SIZE,
        }
    }
}

/// Output of an extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractResult {
    /// Blocks in document order
    pub blocks: Vec<Block>,
    /// One style per non-image block
    pub styles: StyleSheet,
    /// Accepted image bytes keyed by file name (`image1.png`)
    pub images: BTreeMap<String, Vec<u8>>,
}

impl ExtractResult {
    /// Rendered `content.md`.
    pub fn markdown(&self) -> String {
        markdown::render(&self.blocks)
    }

    /// Number of image placeholders emitted for rejected images.
    pub fn rejected_images(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Paragraph && is_image_placeholder(&b.content))
            .count()
    }
}

fn is_image_placeholder(content: &str) -> bool {
    content.starts_with("[Image ") && content.ends_with(']') && content.contains(": ")
}

/// Accumulator threaded through the paragraph walk.
#[derive(Debug, Default)]
pub struct ExtractState {
    blocks: Vec<Block>,
    images: BTreeMap<String, Vec<u8>>,
    image_counter: usize,
    list_counter: usize,
    offset: usize,
}

impl ExtractState {
    fn push(
        &mut self,
        kind: BlockKind,
        content: String,
        paragraph_index: usize,
        formatting: Vec<InlineFormat>,
    ) {
        let id = format!("block-{}", self.blocks.len());
        let block = Block::new(id, kind, content, paragraph_index, self.offset).with_formatting(formatting);
        log::debug!(
            "{} {} [{}..{}]",
            block.id,
            block.kind,
            block.content_start,
            block.content_end
        );
        self.offset = block.next_offset();
        self.blocks.push(block);
    }
}

/// Extraction engine.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    /// Create an extractor.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Extract blocks, styles and images from a source document.
    pub fn extract<S: DocumentSource + ?Sized>(&self, source: &S) -> Result<ExtractResult> {
        let paragraphs = source.paragraphs()?;
        log::debug!("extracting {} paragraphs", paragraphs.len());

        let state = paragraphs
            .iter()
            .enumerate()
            .fold(ExtractState::default(), |state, (index, paragraph)| {
                self.step(state, index, paragraph)
            });

        let defaults = source
            .document_defaults()
            .unwrap_or_else(|| self.options.defaults());
        let styles = extract_styles(&state.blocks, &paragraphs, &defaults);

        log::info!(
            "extracted {} blocks, {} images",
            state.blocks.len(),
            state.images.len()
        );

        Ok(ExtractResult {
            blocks: state.blocks,
            styles,
            images: state.images,
        })
    }

    fn step(&self, mut state: ExtractState, index: usize, paragraph: &SourceParagraph) -> ExtractState {
        if !paragraph.images.is_empty() {
            for image in &paragraph.images {
                self.image_block(&mut state, index, image);
            }
            state.list_counter = 0;
            return state;
        }

        let rendered = render_children(&paragraph.children);
        if rendered.is_empty() {
            return state;
        }

        let style = paragraph.style_name.as_str();
        let (kind, content) = if style.starts_with("Heading") {
            let level = heading_level(style);
            state.list_counter = 0;
            (
                BlockKind::heading(level),
                format!("{} {}", "#".repeat(usize::from(level)), rendered.markdown),
            )
        } else if style.starts_with("List Bullet") {
            state.list_counter = 0;
            (BlockKind::ListItem, format!("- {}", rendered.markdown))
        } else if style.starts_with("List Number") {
            state.list_counter += 1;
            (
                BlockKind::ListItem,
                format!("{}. {}", state.list_counter, rendered.markdown),
            )
        } else {
            state.list_counter = 0;
            (BlockKind::Paragraph, escape_heading_marker(rendered.markdown))
        };

        state.push(kind, content, index, rendered.formatting);
        state
    }

    fn image_block(&self, state: &mut ExtractState, index: usize, image: &SourceImage) {
        state.image_counter += 1;
        let number = state.image_counter;

        match image::validate(&image.data, image.size, &image.extension, self.options.max_image_size) {
            Ok(info) => {
                let file_name = format!("image{}.{}", number, image.extension.to_lowercase());
                let path = format!("assets/{}", file_name);
                log::debug!(
                    "image {}: {} {}x{} -> {}",
                    number,
                    info.format,
                    info.width,
                    info.height,
                    path
                );
                state.images.insert(file_name, image.data.clone());
                state.push(
                    BlockKind::image(path.clone()),
                    markdown::image_markdown(number, &path),
                    index,
                    Vec::new(),
                );
            }
            Err(reason) => {
                log::warn!("image {} rejected: {}", number, reason);
                state.push(
                    BlockKind::Paragraph,
                    format!("[Image {}: {}]", number, reason),
                    index,
                    Vec::new(),
                );
            }
        }
    }
}

/// Level from the trailing number of a heading style name, default 1.
fn heading_level(style_name: &str) -> u8 {
    style_name
        .split_whitespace()
        .last()
        .and_then(|word| word.parse::<u8>().ok())
        .unwrap_or(1)
        .clamp(1, 6)
}
