//! Per-block formatting captured at extraction time.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Font used when neither the document nor its styles declare one.
pub const DEFAULT_FONT_NAME: &str = "Calibri";

/// Font size (points) used when neither the document nor its styles declare one.
pub const DEFAULT_FONT_SIZE: u32 = 11;

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left alignment (default)
    #[default]
    Left,
    /// Center alignment
    Center,
    /// Right alignment
    Right,
    /// Justified alignment
    Justify,
}

impl Alignment {
    /// Map a WordprocessingML `w:jc` value.
    pub fn from_ooxml(value: &str) -> Option<Self> {
        match value {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" | "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }

    /// WordprocessingML `w:jc` value.
    pub fn to_ooxml(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }
}

/// Formatting for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    /// Block this style belongs to (the key in `styles.json`)
    #[serde(skip)]
    pub block_id: String,

    /// Paragraph style name in the source document (e.g. "Heading 1")
    #[serde(rename = "docx_style")]
    pub source_style_name: String,

    /// Font name
    pub font_name: String,

    /// Font size in points
    pub font_size: u32,

    /// Paragraph alignment
    #[serde(default)]
    pub alignment: Alignment,

    /// Paragraph-wide bold default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,

    /// Paragraph-wide italic default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,

    /// Paragraph-wide underline default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
}

impl Style {
    /// Create a style with document defaults for the given block.
    pub fn new(block_id: impl Into<String>, defaults: &DocumentDefaults) -> Self {
        Self {
            block_id: block_id.into(),
            source_style_name: "Normal".to_string(),
            font_name: defaults.font_name.clone(),
            font_size: defaults.font_size,
            alignment: Alignment::Left,
            bold: None,
            italic: None,
            underline: None,
        }
    }

    /// Copy this style onto another block id.
    pub fn rekeyed(&self, block_id: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            ..self.clone()
        }
    }

    /// Whether the source paragraph style is a bulleted list style.
    pub fn is_bullet_list(&self) -> bool {
        self.source_style_name.starts_with("List Bullet")
    }

    /// Whether the source paragraph style is a numbered list style.
    pub fn is_numbered_list(&self) -> bool {
        self.source_style_name.starts_with("List Number")
    }
}

/// Document-level font defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDefaults {
    /// Default font name
    pub font_name: String,
    /// Default font size in points
    pub font_size: u32,
}

impl Default for DocumentDefaults {
    fn default() -> Self {
        Self {
            font_name: DEFAULT_FONT_NAME.to_string(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

/// Contents of `styles.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleSheet {
    /// Styles keyed by block id
    pub block_styles: BTreeMap<String, Style>,
    /// Document-level defaults
    pub document_defaults: DocumentDefaults,
}

impl StyleSheet {
    /// Build a style sheet from a list of styles.
    pub fn from_styles(styles: impl IntoIterator<Item = Style>, defaults: DocumentDefaults) -> Self {
        Self {
            block_styles: styles
                .into_iter()
                .map(|s| (s.block_id.clone(), s))
                .collect(),
            document_defaults: defaults,
        }
    }

    /// Look up the style of a block.
    pub fn get(&self, block_id: &str) -> Option<&Style> {
        self.block_styles.get(block_id)
    }

    /// Number of block styles.
    pub fn len(&self) -> usize {
        self.block_styles.len()
    }

    /// Whether the sheet has no block styles.
    pub fn is_empty(&self) -> bool {
        self.block_styles.is_empty()
    }
}

impl<'de> Deserialize<'de> for StyleSheet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            block_styles: BTreeMap<String, Style>,
            #[serde(default)]
            document_defaults: DocumentDefaults,
        }

        let raw = Raw::deserialize(deserializer)?;
        let block_styles = raw
            .block_styles
            .into_iter()
            .map(|(id, mut style)| {
                style.block_id = id.clone();
                (id, style)
            })
            .collect();

        Ok(Self {
            block_styles,
            document_defaults: raw.document_defaults,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_mapping() {
        assert_eq!(Alignment::from_ooxml("both"), Some(Alignment::Justify));
        assert_eq!(Alignment::from_ooxml("center"), Some(Alignment::Center));
        assert_eq!(Alignment::from_ooxml("bogus"), None);
        assert_eq!(Alignment::Justify.to_ooxml(), "both");
    }

    #[test]
    fn test_style_sheet_json_shape() {
        let mut style = Style::new("block-0", &DocumentDefaults::default());
        style.source_style_name = "Heading 1".into();
        style.alignment = Alignment::Center;
        let sheet = StyleSheet::from_styles([style], DocumentDefaults::default());

        let json = serde_json::to_value(&sheet).unwrap();
        let entry = &json["block_styles"]["block-0"];
        assert_eq!(entry["docx_style"], "Heading 1");
        assert_eq!(entry["alignment"], "center");
        assert_eq!(entry["font_size"], 11);
        assert!(entry.get("bold").is_none());
        assert_eq!(json["document_defaults"]["font_name"], "Calibri");
    }

    #[test]
    fn test_style_sheet_restores_block_ids() {
        let json = r#"{"block_styles":{"block-3":{"docx_style":"Normal","font_name":"Arial",
            "font_size":12,"alignment":"right","bold":null}},
            "document_defaults":{"font_name":"Calibri","font_size":11}}"#;
        let sheet: StyleSheet = serde_json::from_str(json).unwrap();
        let style = sheet.get("block-3").unwrap();
        assert_eq!(style.block_id, "block-3");
        assert_eq!(style.alignment, Alignment::Right);
        assert_eq!(style.bold, None);
    }

    #[test]
    fn test_list_style_detection() {
        let mut style = Style::new("b", &DocumentDefaults::default());
        style.source_style_name = "List Number 2".into();
        assert!(style.is_numbered_list());
        assert!(!style.is_bullet_list());
    }
}
