//! Reconstruction engine: blocks plus old styles back into a document.
//!
//! Each new block becomes one paragraph. The style of the old block it was
//! matched to (if any) supplies the paragraph style, font and alignment.
//! A bad style never aborts the build; it is logged and skipped.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::docx::{DocumentSink, OutInline, OutParagraph, Run, EMU_PER_INCH};
use crate::error::{Error, Result};
use crate::extract::image;
use crate::markdown::inline::{
    parse_emphasis, parse_link_text_formatting, percent_decode, split_links, LinkSegment,
};
use crate::model::{Block, BlockKind, InlineFormat, Style, StyleSheet};
use crate::sync::BlockMatches;

/// Display width of embedded images, in inches.
pub const DEFAULT_IMAGE_WIDTH_INCHES: u64 = 3;

/// Largest font size a word processor accepts, in points.
const MAX_FONT_SIZE: u32 = 1638;

static NUMBERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+").expect("static list marker pattern"));

/// Options for building a document.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory searched for images missing from the archive
    pub assets_dir: Option<PathBuf>,

    /// Image display width in EMU
    pub image_width_emu: u64,
}

impl BuildOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for images in a directory as well as in the archive.
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = Some(dir.into());
        self
    }

    /// Set image display width in inches.
    pub fn with_image_width_inches(mut self, inches: f64) -> Self {
        self.image_width_emu = (inches.max(0.1) * EMU_PER_INCH as f64) as u64;
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            assets_dir: None,
            image_width_emu: DEFAULT_IMAGE_WIDTH_INCHES * EMU_PER_INCH,
        }
    }
}

/// What a build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Paragraphs written
    pub paragraphs: usize,
    /// Images embedded
    pub images: usize,
    /// Image paths that could not be embedded
    pub missing_images: Vec<String>,
    /// Blocks whose style could not be applied
    pub style_failures: usize,
}

/// Writes blocks into a [`DocumentSink`].
#[derive(Debug, Clone)]
pub struct Reconstructor<'a> {
    styles: &'a StyleSheet,
    assets: &'a BTreeMap<String, Vec<u8>>,
    options: BuildOptions,
}

impl<'a> Reconstructor<'a> {
    /// Create a reconstructor over old styles and archive assets.
    pub fn new(styles: &'a StyleSheet, assets: &'a BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            styles,
            assets,
            options: BuildOptions::default(),
        }
    }

    /// Set build options.
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Write every block, in order, into `sink`.
    pub fn build<S: DocumentSink>(&self, blocks: &[Block], matches: &BlockMatches, sink: &mut S) -> Result<BuildReport> {
        let reverse = matches.reverse();
        let mut report = BuildReport::default();

        for block in blocks {
            let style = self.resolve_style(block, &reverse);
            let mut paragraph = self.paragraph(block, style, &mut report);

            if let Some(style) = style {
                if let Err(e) = apply_style(&mut paragraph, style) {
                    log::warn!("{}: style not applied: {}", block.id, e);
                    report.style_failures += 1;
                }
            }

            sink.add_paragraph(paragraph)?;
            report.paragraphs += 1;
        }

        log::info!(
            "built {} paragraphs ({} images, {} missing)",
            report.paragraphs,
            report.images,
            report.missing_images.len()
        );
        Ok(report)
    }

    fn resolve_style(&self, block: &Block, reverse: &HashMap<String, String>) -> Option<&'a Style> {
        let styles: &'a StyleSheet = self.styles;
        reverse.get(&block.id).and_then(|old_id| styles.get(old_id))
    }

    fn paragraph(&self, block: &Block, style: Option<&Style>, report: &mut BuildReport) -> OutParagraph {
        let underlines = underline_spans(&block.inline_formatting);
        match &block.kind {
            BlockKind::Heading { level } => {
                let text = block.content.trim_start_matches('#').trim();
                let mut paragraph = OutParagraph::styled(format!("Heading {}", level));
                push_inline(&mut paragraph, text);
                paragraph.content = apply_underlines(paragraph.content, &underlines);
                paragraph
            }
            BlockKind::Image { path } => self.image_paragraph(path, report),
            BlockKind::Paragraph | BlockKind::ListItem => {
                let (style_name, text) = list_style(&block.content, style);
                let mut paragraph = OutParagraph {
                    style: style_name,
                    ..Default::default()
                };
                push_inline(&mut paragraph, text);
                paragraph.content = apply_underlines(paragraph.content, &underlines);
                paragraph
            }
        }
    }

    fn image_paragraph(&self, path: &str, report: &mut BuildReport) -> OutParagraph {
        let file_name = path.rsplit('/').next().unwrap_or(path);

        let Some(data) = self.load_asset(file_name) else {
            log::warn!("image {} not found", path);
            report.missing_images.push(path.to_string());
            return OutParagraph::text(format!("[Missing image: {}]", path));
        };

        match image::inspect(&data) {
            Ok(info) => {
                let width = self.options.image_width_emu;
                let extension = file_name
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_lowercase())
                    .unwrap_or_else(|| info.format.name().to_lowercase());
                report.images += 1;
                OutParagraph {
                    content: vec![OutInline::Image {
                        data,
                        extension,
                        width_emu: width,
                        height_emu: info.scaled_height(width),
                    }],
                    ..Default::default()
                }
            }
            Err(reason) => {
                log::warn!("image {} not embedded: {}", path, reason);
                report.missing_images.push(path.to_string());
                OutParagraph::text(format!("[Invalid image: {} ({})]", path, reason))
            }
        }
    }

    fn load_asset(&self, file_name: &str) -> Option<Vec<u8>> {
        if let Some(data) = self.assets.get(file_name) {
            return Some(data.clone());
        }
        let dir = self.options.assets_dir.as_ref()?;
        std::fs::read(dir.join(file_name)).ok()
    }
}

/// Paragraph style and text for a paragraph or list item.
///
/// A list style from the old block wins and its marker is stripped. Without
/// a style, a leading `- ` or `N. ` marker selects a list style.
fn list_style<'c>(content: &'c str, style: Option<&Style>) -> (Option<String>, &'c str) {
    match style {
        Some(style) if style.is_bullet_list() => (
            Some(style.source_style_name.clone()),
            content.strip_prefix("- ").unwrap_or(content),
        ),
        Some(style) if style.is_numbered_list() => (
            Some(style.source_style_name.clone()),
            strip_numbered_marker(content),
        ),
        Some(style) => (Some(style.source_style_name.clone()), content),
        None => {
            if let Some(rest) = content.strip_prefix("- ") {
                (Some("List Bullet".to_string()), rest)
            } else if NUMBERED_MARKER.is_match(content) {
                (Some("List Number".to_string()), strip_numbered_marker(content))
            } else {
                (None, content)
            }
        }
    }
}

fn strip_numbered_marker(content: &str) -> &str {
    match NUMBERED_MARKER.find(content) {
        Some(m) => &content[m.end()..],
        None => content,
    }
}

/// Append runs and hyperlinks parsed from inline markdown.
fn push_inline(paragraph: &mut OutParagraph, text: &str) {
    for segment in split_links(text) {
        match segment {
            LinkSegment::Text(text) => {
                for run in parse_emphasis(text) {
                    paragraph.push_run(run);
                }
            }
            LinkSegment::Link { text, url } => {
                let (plain, bold, italic) = parse_link_text_formatting(text);
                paragraph.push_hyperlink(
                    percent_decode(url),
                    Run {
                        text: plain,
                        bold,
                        italic,
                        underline: false,
                    },
                );
            }
        }
    }
}

fn underline_spans(formatting: &[InlineFormat]) -> Vec<(usize, usize)> {
    formatting
        .iter()
        .filter_map(|f| match f {
            InlineFormat::Underline { start, end } => Some((*start, *end)),
            InlineFormat::Hyperlink { .. } => None,
        })
        .collect()
}

/// Split runs at underline span boundaries (plain-text offsets) and mark the
/// covered pieces underlined.
fn apply_underlines(content: Vec<OutInline>, spans: &[(usize, usize)]) -> Vec<OutInline> {
    if spans.is_empty() {
        return content;
    }

    let mut out = Vec::with_capacity(content.len());
    let mut position = 0;
    for inline in content {
        match inline {
            OutInline::Run(run) => {
                let chars: Vec<char> = run.text.chars().collect();
                let len = chars.len();
                let mut cuts = vec![0, len];
                for &(start, end) in spans {
                    for bound in [start, end] {
                        if bound > position && bound < position + len {
                            cuts.push(bound - position);
                        }
                    }
                }
                cuts.sort_unstable();
                cuts.dedup();

                for window in cuts.windows(2) {
                    let (a, b) = (window[0], window[1]);
                    let covered = spans
                        .iter()
                        .any(|&(start, end)| start <= position + a && position + b <= end);
                    out.push(OutInline::Run(Run {
                        text: chars[a..b].iter().collect(),
                        underline: run.underline || covered,
                        ..run.clone()
                    }));
                }
                position += len;
            }
            OutInline::Hyperlink { url, run } => {
                position += run.text.chars().count();
                out.push(OutInline::Hyperlink { url, run });
            }
            image @ OutInline::Image { .. } => out.push(image),
        }
    }
    out
}

/// Apply font and alignment from a style.
///
/// Alignment is always applied; an unusable font name or size is an error.
pub fn apply_style(paragraph: &mut OutParagraph, style: &Style) -> Result<()> {
    paragraph.alignment = Some(style.alignment);

    if style.font_name.trim().is_empty() {
        return Err(Error::Other(format!("empty font name in style for {}", style.block_id)));
    }
    if style.font_size == 0 || style.font_size > MAX_FONT_SIZE {
        return Err(Error::Other(format!(
            "font size {} out of range in style for {}",
            style.font_size, style.block_id
        )));
    }

    paragraph.font_name = Some(style.font_name.clone());
    paragraph.font_size = Some(style.font_size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::image::fixtures;
    use crate::markdown;
    use crate::model::{Alignment, DocumentDefaults};
    use crate::sync::match_blocks;
    use pretty_assertions::assert_eq;

    /// Collects paragraphs instead of writing a package.
    #[derive(Default)]
    struct Recorder {
        paragraphs: Vec<OutParagraph>,
    }

    impl DocumentSink for Recorder {
        fn add_paragraph(&mut self, paragraph: OutParagraph) -> Result<()> {
            self.paragraphs.push(paragraph);
            Ok(())
        }

        fn finish(self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn style(id: &str, name: &str) -> Style {
        let mut style = Style::new(id, &DocumentDefaults::default());
        style.source_style_name = name.to_string();
        style
    }

    fn build(markdown_text: &str, old: &[Block], sheet: &StyleSheet, assets: &BTreeMap<String, Vec<u8>>) -> (Vec<OutParagraph>, BuildReport) {
        let new = markdown::parse(markdown_text);
        let matches = match_blocks(old, &new);
        let mut recorder = Recorder::default();
        let report = Reconstructor::new(sheet, assets)
            .build(&new, &matches, &mut recorder)
            .unwrap();
        (recorder.paragraphs, report)
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let (paragraphs, report) = build(
            "# Title\n## Sub\nPlain **bold** text",
            &[],
            &StyleSheet::default(),
            &BTreeMap::new(),
        );
        assert_eq!(report.paragraphs, 3);
        assert_eq!(paragraphs[0].style.as_deref(), Some("Heading 1"));
        assert_eq!(paragraphs[0].plain_text(), "Title");
        assert_eq!(paragraphs[1].style.as_deref(), Some("Heading 2"));
        assert_eq!(paragraphs[2].style, None);
        assert_eq!(
            paragraphs[2].content,
            vec![
                OutInline::Run(Run::new("Plain ")),
                OutInline::Run(Run::bold("bold")),
                OutInline::Run(Run::new(" text")),
            ]
        );
    }

    #[test]
    fn test_hyperlinks_are_decoded() {
        let (paragraphs, _) = build(
            "Visit [**Docs**](https://example.com/my%20docs) now",
            &[],
            &StyleSheet::default(),
            &BTreeMap::new(),
        );
        assert_eq!(
            paragraphs[0].content[1],
            OutInline::Hyperlink {
                url: "https://example.com/my docs".into(),
                run: Run::bold("Docs"),
            }
        );
        assert_eq!(paragraphs[0].plain_text(), "Visit Docs now");
    }

    #[test]
    fn test_matched_style_is_applied() {
        let old = markdown::parse("Centered text here");
        let mut centered = style("block-0", "Quote");
        centered.alignment = Alignment::Center;
        centered.font_name = "Georgia".into();
        centered.font_size = 14;
        let sheet = StyleSheet::from_styles([centered], DocumentDefaults::default());

        let (paragraphs, _) = build("New intro\nCentered text here", &old, &sheet, &BTreeMap::new());
        assert_eq!(paragraphs[0].style, None);
        assert_eq!(paragraphs[0].alignment, None);
        assert_eq!(paragraphs[1].style.as_deref(), Some("Quote"));
        assert_eq!(paragraphs[1].alignment, Some(Alignment::Center));
        assert_eq!(paragraphs[1].font_name.as_deref(), Some("Georgia"));
        assert_eq!(paragraphs[1].font_size, Some(14));
    }

    #[test]
    fn test_list_markers_are_stripped() {
        let old = vec![
            Block::new("block-0", BlockKind::ListItem, "- apples", 0, 0),
            Block::new("block-1", BlockKind::ListItem, "1. first", 1, 9),
        ];
        let sheet = StyleSheet::from_styles(
            [style("block-0", "List Bullet"), style("block-1", "List Number")],
            DocumentDefaults::default(),
        );
        let (paragraphs, _) = build("- apples\n1. first\n- unstyled\n2. inferred", &old, &sheet, &BTreeMap::new());

        let summary: Vec<_> = paragraphs
            .iter()
            .map(|p| (p.style.clone().unwrap_or_default(), p.plain_text()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("List Bullet".to_string(), "apples".to_string()),
                ("List Number".to_string(), "first".to_string()),
                ("List Bullet".to_string(), "unstyled".to_string()),
                ("List Number".to_string(), "inferred".to_string()),
            ]
        );
    }

    #[test]
    fn test_bad_style_does_not_abort() {
        let old = markdown::parse("One\nTwo");
        let mut broken = style("block-0", "Normal");
        broken.font_size = 0;
        broken.alignment = Alignment::Right;
        let sheet = StyleSheet::from_styles([broken, style("block-1", "Normal")], DocumentDefaults::default());

        let (paragraphs, report) = build("One\nTwo", &old, &sheet, &BTreeMap::new());
        assert_eq!(report.paragraphs, 2);
        assert_eq!(report.style_failures, 1);
        assert_eq!(paragraphs[0].alignment, Some(Alignment::Right));
        assert_eq!(paragraphs[0].font_size, None);
        assert_eq!(paragraphs[1].font_size, Some(11));
    }

    #[test]
    fn test_images_embedded_or_placeholder() {
        let mut assets = BTreeMap::new();
        assets.insert("image1.png".to_string(), fixtures::png(200, 100));
        let (paragraphs, report) = build(
            "![Image 1](assets/image1.png)\n![Image 2](assets/image2.png)",
            &[],
            &StyleSheet::default(),
            &assets,
        );

        match &paragraphs[0].content[0] {
            OutInline::Image {
                width_emu,
                height_emu,
                extension,
                ..
            } => {
                assert_eq!(*width_emu, 3 * EMU_PER_INCH);
                assert_eq!(*height_emu, 3 * EMU_PER_INCH / 2);
                assert_eq!(extension, "png");
            }
            other => panic!("unexpected inline {:?}", other),
        }
        assert_eq!(paragraphs[1].plain_text(), "[Missing image: assets/image2.png]");
        assert_eq!(report.images, 1);
        assert_eq!(report.missing_images, vec!["assets/image2.png".to_string()]);
    }

    #[test]
    fn test_underline_spans_are_reapplied() {
        let block = Block::new("block-0", BlockKind::Paragraph, "**Bold** under", 0, 0)
            .with_formatting(vec![InlineFormat::Underline { start: 5, end: 10 }]);
        let mut recorder = Recorder::default();
        Reconstructor::new(&StyleSheet::default(), &BTreeMap::new())
            .build(&[block], &BlockMatches::default(), &mut recorder)
            .unwrap();

        assert_eq!(
            recorder.paragraphs[0].content,
            vec![
                OutInline::Run(Run::bold("Bold")),
                OutInline::Run(Run::new(" ")),
                OutInline::Run(Run::underlined("under")),
            ]
        );
    }

    #[test]
    fn test_unbalanced_markers_degrade() {
        let (paragraphs, _) = build("**never closed", &[], &StyleSheet::default(), &BTreeMap::new());
        assert_eq!(paragraphs[0].plain_text(), "**never closed");
    }
}
