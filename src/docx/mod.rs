//! Word document backend abstraction layer.
//!
//! Extraction and reconstruction only need a narrow view of a word-processing
//! document: ordered paragraphs with their style name, alignment, runs,
//! hyperlinks and embedded images. [`DocumentSource`] and [`DocumentSink`]
//! describe that view so the engines never touch package internals. The
//! OOXML implementations ([`DocxReader`], [`DocxWriter`]) sit behind them.

mod reader;
mod writer;

pub use reader::DocxReader;
pub use writer::DocxWriter;

use crate::error::Result;
use crate::model::{Alignment, DocumentDefaults};

/// English Metric Units per inch.
pub const EMU_PER_INCH: u64 = 914_400;

/// A run of text with its character formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    /// Text content
    pub text: String,
    /// Bold
    pub bold: bool,
    /// Italic
    pub italic: bool,
    /// Underlined
    pub underline: bool,
}

impl Run {
    /// Create a plain run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Create a bold run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::new(text)
        }
    }

    /// Create an italic run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            italic: true,
            ..Self::new(text)
        }
    }

    /// Create an underlined run.
    pub fn underlined(text: impl Into<String>) -> Self {
        Self {
            underline: true,
            ..Self::new(text)
        }
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A direct child of a source paragraph, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParagraphChild {
    /// A plain run
    Run(Run),
    /// A hyperlink element wrapping one or more runs
    Hyperlink {
        /// Resolved target, `None` when the relationship is missing
        url: Option<String>,
        /// Runs inside the hyperlink
        runs: Vec<Run>,
    },
}

/// An image embedded in a source paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Image bytes; empty when the part is missing or was too large to load
    pub data: Vec<u8>,
    /// Size declared by the package, in bytes
    pub size: u64,
    /// Lowercase file extension of the image part (without the dot)
    pub extension: String,
}

impl SourceImage {
    /// Create an image from bytes and an extension.
    pub fn new(data: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            size: data.len() as u64,
            data,
            extension: extension.into().to_lowercase(),
        }
    }
}

/// A paragraph as read from a source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceParagraph {
    /// Paragraph style name (e.g. "Normal", "Heading 2", "List Bullet")
    pub style_name: String,
    /// Effective alignment, if declared
    pub alignment: Option<Alignment>,
    /// Effective font name, if declared
    pub font_name: Option<String>,
    /// Effective font size in points, if declared
    pub font_size: Option<u32>,
    /// Runs and hyperlinks in order
    pub children: Vec<ParagraphChild>,
    /// Embedded images in order
    pub images: Vec<SourceImage>,
}

impl SourceParagraph {
    /// Create an empty paragraph with the given style.
    pub fn new(style_name: impl Into<String>) -> Self {
        Self {
            style_name: style_name.into(),
            ..Default::default()
        }
    }

    /// Append a run.
    pub fn with_run(mut self, run: Run) -> Self {
        self.children.push(ParagraphChild::Run(run));
        self
    }

    /// Append a hyperlink.
    pub fn with_hyperlink(mut self, url: impl Into<String>, runs: Vec<Run>) -> Self {
        self.children.push(ParagraphChild::Hyperlink {
            url: Some(url.into()),
            runs,
        });
        self
    }

    /// Append an image.
    pub fn with_image(mut self, image: SourceImage) -> Self {
        self.images.push(image);
        self
    }

    /// Plain text of all runs, hyperlink text included.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                ParagraphChild::Run(run) => text.push_str(&run.text),
                ParagraphChild::Hyperlink { runs, .. } => {
                    runs.iter().for_each(|r| text.push_str(&r.text))
                }
            }
        }
        text
    }
}

/// Read access to a word-processing document.
pub trait DocumentSource {
    /// All body paragraphs in document order.
    fn paragraphs(&self) -> Result<Vec<SourceParagraph>>;

    /// Document-wide font defaults, when the source declares them.
    fn document_defaults(&self) -> Option<DocumentDefaults> {
        None
    }
}

impl DocumentSource for Vec<SourceParagraph> {
    fn paragraphs(&self) -> Result<Vec<SourceParagraph>> {
        Ok(self.clone())
    }
}

/// Inline content of a paragraph being written.
#[derive(Debug, Clone, PartialEq)]
pub enum OutInline {
    /// A formatted run
    Run(Run),
    /// An external hyperlink
    Hyperlink {
        /// Target URL (already percent-decoded)
        url: String,
        /// Display run
        run: Run,
    },
    /// An inline picture
    Image {
        /// Image bytes
        data: Vec<u8>,
        /// File extension (without the dot)
        extension: String,
        /// Display width in EMU
        width_emu: u64,
        /// Display height in EMU
        height_emu: u64,
    },
}

/// A paragraph to be written into a new document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutParagraph {
    /// Paragraph style name; `None` means the default paragraph style
    pub style: Option<String>,
    /// Alignment override
    pub alignment: Option<Alignment>,
    /// Font name override, applied to every run
    pub font_name: Option<String>,
    /// Font size override in points, applied to every run
    pub font_size: Option<u32>,
    /// Inline content
    pub content: Vec<OutInline>,
}

impl OutParagraph {
    /// Create a paragraph with the given style.
    pub fn styled(style: impl Into<String>) -> Self {
        Self {
            style: Some(style.into()),
            ..Default::default()
        }
    }

    /// Create an unstyled paragraph holding one plain run.
    pub fn text(text: impl Into<String>) -> Self {
        let mut p = Self::default();
        p.push_run(Run::new(text));
        p
    }

    /// Append a run.
    pub fn push_run(&mut self, run: Run) {
        self.content.push(OutInline::Run(run));
    }

    /// Append a hyperlink.
    pub fn push_hyperlink(&mut self, url: impl Into<String>, run: Run) {
        self.content.push(OutInline::Hyperlink {
            url: url.into(),
            run,
        });
    }

    /// Plain text of the paragraph.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                OutInline::Run(run) | OutInline::Hyperlink { run, .. } => run.text.as_str(),
                OutInline::Image { .. } => "",
            })
            .collect()
    }
}

/// Write access to a new word-processing document.
pub trait DocumentSink {
    /// Append a paragraph to the document body.
    fn add_paragraph(&mut self, paragraph: OutParagraph) -> Result<()>;

    /// Serialize the document.
    fn finish(self) -> Result<Vec<u8>>
    where
        Self: Sized;
}

/// Map a paragraph style name to the style id used in the package.
pub(crate) fn style_id(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
