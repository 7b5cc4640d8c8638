//! Block-level content units.

use serde::{Deserialize, Serialize};

use crate::hash::content_hash;

/// Kind of a block, with the payload that only some kinds carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Heading with level 1-6
    Heading {
        /// Heading level (1-6)
        level: u8,
    },
    /// Normal paragraph
    Paragraph,
    /// Bulleted or numbered list item
    ListItem,
    /// Embedded image
    Image {
        /// Relative path inside the archive (`assets/<file>`)
        path: String,
    },
}

impl BlockKind {
    /// Create a heading kind, clamping the level into 1-6.
    pub fn heading(level: u8) -> Self {
        BlockKind::Heading {
            level: level.clamp(1, 6),
        }
    }

    /// Create an image kind.
    pub fn image(path: impl Into<String>) -> Self {
        BlockKind::Image { path: path.into() }
    }

    /// Name used in `structure.json`.
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::Heading { .. } => "heading",
            BlockKind::Paragraph => "paragraph",
            BlockKind::ListItem => "list",
            BlockKind::Image { .. } => "image",
        }
    }

    /// Whether two kinds are the same variant, ignoring payload.
    pub fn same_type(&self, other: &BlockKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A formatting span over the plain text of a block (markdown markers excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InlineFormat {
    /// Underlined range
    Underline {
        /// Start offset (inclusive)
        start: usize,
        /// End offset (exclusive)
        end: usize,
    },
    /// Hyperlinked range
    Hyperlink {
        /// Start offset (inclusive)
        start: usize,
        /// End offset (exclusive)
        end: usize,
        /// Link target
        url: String,
    },
}

impl InlineFormat {
    /// Span covered by this format as `(start, end)`.
    pub fn range(&self) -> (usize, usize) {
        match self {
            InlineFormat::Underline { start, end } | InlineFormat::Hyperlink { start, end, .. } => {
                (*start, *end)
            }
        }
    }
}

/// One structural unit of document content.
///
/// Offsets (`content_start`, `content_end`) count Unicode scalar values in
/// the rendered markdown of the whole document. Blocks are separated by a
/// single newline, so a block starts one past the previous block's end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BlockRecord", try_from = "BlockRecord")]
pub struct Block {
    /// Identifier, unique within one document version
    pub id: String,

    /// Block kind
    pub kind: BlockKind,

    /// Rendered markdown for this block
    pub content: String,

    /// Index of the originating paragraph in the source document
    pub source_paragraph_index: usize,

    /// Start offset in the rendered markdown
    pub content_start: usize,

    /// End offset (exclusive) in the rendered markdown
    pub content_end: usize,

    /// SHA-256 of `content`
    pub content_hash: String,

    /// Underline and hyperlink spans over the plain text
    pub inline_formatting: Vec<InlineFormat>,
}

impl Block {
    /// Create a block, deriving the hash and end offset from `content`.
    pub fn new(
        id: impl Into<String>,
        kind: BlockKind,
        content: impl Into<String>,
        source_paragraph_index: usize,
        content_start: usize,
    ) -> Self {
        let content = content.into();
        let content_end = content_start + content.chars().count();
        Self {
            id: id.into(),
            content_hash: content_hash(&content),
            kind,
            content,
            source_paragraph_index,
            content_start,
            content_end,
            inline_formatting: Vec::new(),
        }
    }

    /// Attach inline formatting spans.
    pub fn with_formatting(mut self, formatting: Vec<InlineFormat>) -> Self {
        self.inline_formatting = formatting;
        self
    }

    /// Heading level, if this is a heading.
    pub fn level(&self) -> Option<u8> {
        match self.kind {
            BlockKind::Heading { level } => Some(level),
            _ => None,
        }
    }

    /// Archive-relative image path, if this is an image.
    pub fn image_path(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Image { path } => Some(path),
            _ => None,
        }
    }

    /// Offset at which the next block would start.
    pub fn next_offset(&self) -> usize {
        self.content_end + 1
    }

    /// Replace `content` and refresh the hash and end offset.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.content_hash = content_hash(&self.content);
        self.content_end = self.content_start + self.content.chars().count();
    }
}

/// Serialized form of a block in `structure.json`. Raw content is not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlockRecord {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(alias = "docx_paragraph_index")]
    source_paragraph_index: usize,
    content_start: usize,
    content_end: usize,
    content_hash: String,
    #[serde(default)]
    level: Option<u8>,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    inline_formatting: Option<Vec<InlineFormat>>,
}

impl From<Block> for BlockRecord {
    fn from(block: Block) -> Self {
        let level = block.level();
        let image_path = block.image_path().map(str::to_string);
        Self {
            id: block.id,
            kind: block.kind.type_name().to_string(),
            source_paragraph_index: block.source_paragraph_index,
            content_start: block.content_start,
            content_end: block.content_end,
            content_hash: block.content_hash,
            level,
            image_path,
            inline_formatting: if block.inline_formatting.is_empty() {
                None
            } else {
                Some(block.inline_formatting)
            },
        }
    }
}

impl TryFrom<BlockRecord> for Block {
    type Error = String;

    fn try_from(record: BlockRecord) -> std::result::Result<Self, Self::Error> {
        let kind = match record.kind.as_str() {
            "heading" => BlockKind::heading(record.level.unwrap_or(1)),
            "paragraph" => BlockKind::Paragraph,
            "list" => BlockKind::ListItem,
            "image" => match record.image_path {
                Some(path) => BlockKind::Image { path },
                None => return Err(format!("image block {} has no image_path", record.id)),
            },
            other => return Err(format!("unknown block type '{}' for {}", other, record.id)),
        };

        Ok(Self {
            id: record.id,
            kind,
            content: String::new(),
            source_paragraph_index: record.source_paragraph_index,
            content_start: record.content_start,
            content_end: record.content_end,
            content_hash: record.content_hash,
            inline_formatting: record.inline_formatting.unwrap_or_default(),
        })
    }
}
