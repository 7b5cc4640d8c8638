//! OOXML (`.docx`) writer.
//!
//! Produces a minimal but complete WordprocessingML package: content types,
//! package and document relationships, a style table with the built-in
//! heading and list styles, list numbering, and any media embedded inline.

use quick_xml::escape::escape;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{style_id, DocumentSink, OutInline, OutParagraph, Run};
use crate::error::{Error, Result};
use crate::model::{DEFAULT_FONT_NAME, DEFAULT_FONT_SIZE};

const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Hyperlink text color.
const HYPERLINK_COLOR: &str = "0563C1";

/// Paragraph styles always present in the generated style table.
const BUILTIN_STYLES: &[&str] = &[
    "Normal",
    "Heading1",
    "Heading2",
    "Heading3",
    "Heading4",
    "Heading5",
    "Heading6",
    "Title",
    "ListBullet",
    "ListNumber",
];

#[derive(Debug, Clone)]
struct Relationship {
    id: String,
    kind: &'static str,
    target: String,
    external: bool,
}

/// Builds a new `.docx` package paragraph by paragraph.
#[derive(Debug, Clone)]
pub struct DocxWriter {
    body: String,
    relationships: Vec<Relationship>,
    media: Vec<(String, Vec<u8>)>,
    custom_styles: BTreeSet<String>,
    drawing_count: usize,
}

impl Default for DocxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxWriter {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            body: String::new(),
            relationships: vec![
                Relationship {
                    id: "rId1".to_string(),
                    kind: REL_STYLES,
                    target: "styles.xml".to_string(),
                    external: false,
                },
                Relationship {
                    id: "rId2".to_string(),
                    kind: REL_NUMBERING,
                    target: "numbering.xml".to_string(),
                    external: false,
                },
            ],
            media: Vec::new(),
            custom_styles: BTreeSet::new(),
            drawing_count: 0,
        }
    }

    /// Number of paragraphs written so far.
    pub fn paragraph_count(&self) -> usize {
        self.body.matches("<w:p>").count()
    }

    fn add_relationship(&mut self, kind: &'static str, target: String, external: bool) -> String {
        let id = format!("rId{}", self.relationships.len() + 1);
        self.relationships.push(Relationship {
            id: id.clone(),
            kind,
            target,
            external,
        });
        id
    }

    fn write_run(&mut self, run: &Run, paragraph: &OutParagraph, hyperlink: bool) {
        let mut props = String::new();
        let font = paragraph.font_name.as_deref();
        if let Some(font) = font {
            let font = escape(font);
            let _ = write!(
                props,
                r#"<w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:cs="{0}"/>"#,
                font
            );
        }
        if run.bold {
            props.push_str("<w:b/>");
        }
        if run.italic {
            props.push_str("<w:i/>");
        }
        if hyperlink {
            let _ = write!(props, r#"<w:color w:val="{}"/>"#, HYPERLINK_COLOR);
        }
        if let Some(size) = paragraph.font_size {
            let _ = write!(props, r#"<w:sz w:val="{}"/>"#, size * 2);
        }
        if run.underline || hyperlink {
            props.push_str(r#"<w:u w:val="single"/>"#);
        }

        self.body.push_str("<w:r>");
        if !props.is_empty() {
            let _ = write!(self.body, "<w:rPr>{}</w:rPr>", props);
        }
        for (i, piece) in run.text.split('\t').enumerate() {
            if i > 0 {
                self.body.push_str("<w:tab/>");
            }
            if !piece.is_empty() {
                let _ = write!(
                    self.body,
                    r#"<w:t xml:space="preserve">{}</w:t>"#,
                    escape(piece)
                );
            }
        }
        self.body.push_str("</w:r>");
    }

    fn write_image(&mut self, data: &[u8], extension: &str, width: u64, height: u64) {
        self.drawing_count += 1;
        let n = self.drawing_count;
        let extension = extension.to_lowercase();
        let file_name = format!("image{}.{}", n, extension);
        let rel = self.add_relationship(REL_IMAGE, format!("media/{}", file_name), false);
        self.media.push((format!("word/media/{}", file_name), data.to_vec()));

        let _ = write!(
            self.body,
            concat!(
                r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{w}" cy="{h}"/><wp:docPr id="{n}" name="Picture {n}"/>"#,
                r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{n}" name="{file}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{w}" cy="{h}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
                r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
            ),
            w = width,
            h = height,
            n = n,
            file = file_name,
            rel = rel
        );
    }

    fn content_types(&self) -> String {
        let mut defaults = BTreeSet::new();
        for (name, _) in &self.media {
            if let Some((_, ext)) = name.rsplit_once('.') {
                defaults.insert(ext.to_string());
            }
        }

        let mut xml = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#
        ));
        for ext in defaults {
            let _ = write!(
                xml,
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(&ext),
                media_content_type(&ext)
            );
        }
        xml.push_str(concat!(
            r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
            r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
            r#"<Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/>"#,
            r#"</Types>"#
        ));
        xml
    }

    fn document_relationships(&self) -> String {
        let mut xml = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
        ));
        for rel in &self.relationships {
            let _ = write!(
                xml,
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                rel.id,
                rel.kind,
                escape(&rel.target),
                if rel.external {
                    r#" TargetMode="External""#
                } else {
                    ""
                }
            );
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn document(&self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
                r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
                r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<w:body>{}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
                r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#,
                r#"</w:sectPr></w:body></w:document>"#
            ),
            self.body
        )
    }

    fn styles(&self) -> String {
        let mut xml = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                r#"<w:docDefaults><w:rPrDefault><w:rPr>"#,
                r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:cs="{font}"/><w:sz w:val="{size}"/>"#,
                r#"</w:rPr></w:rPrDefault></w:docDefaults>"#,
                r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#
            ),
            font = DEFAULT_FONT_NAME,
            size = DEFAULT_FONT_SIZE * 2
        );

        const HEADING_SIZES: [u32; 6] = [32, 26, 24, 22, 22, 22];
        for (i, size) in HEADING_SIZES.iter().enumerate() {
            let level = i + 1;
            let _ = write!(
                xml,
                concat!(
                    r#"<w:style w:type="paragraph" w:styleId="Heading{0}"><w:name w:val="heading {0}"/>"#,
                    r#"<w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:uiPriority w:val="9"/><w:qFormat/>"#,
                    r#"<w:pPr><w:keepNext/><w:spacing w:before="240" w:after="60"/><w:outlineLvl w:val="{1}"/></w:pPr>"#,
                    r#"<w:rPr><w:b/><w:sz w:val="{2}"/></w:rPr></w:style>"#
                ),
                level,
                i,
                size
            );
        }

        xml.push_str(concat!(
            r#"<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:qFormat/>"#,
            r#"<w:rPr><w:sz w:val="56"/></w:rPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/>"#,
            r#"<w:pPr><w:numPr><w:numId w:val="1"/></w:numPr></w:pPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="ListNumber"><w:name w:val="List Number"/><w:basedOn w:val="Normal"/>"#,
            r#"<w:pPr><w:numPr><w:numId w:val="2"/></w:numPr></w:pPr></w:style>"#,
            r#"<w:style w:type="character" w:styleId="Hyperlink"><w:name w:val="Hyperlink"/>"#,
            r#"<w:rPr><w:color w:val="0563C1"/><w:u w:val="single"/></w:rPr></w:style>"#
        ));

        for name in &self.custom_styles {
            let _ = write!(
                xml,
                concat!(
                    r#"<w:style w:type="paragraph" w:customStyle="1" w:styleId="{}"><w:name w:val="{}"/>"#,
                    r#"<w:basedOn w:val="Normal"/><w:qFormat/></w:style>"#
                ),
                style_id(name),
                escape(name)
            );
        }

        xml.push_str("</w:styles>");
        xml
    }
}

impl DocumentSink for DocxWriter {
    fn add_paragraph(&mut self, paragraph: OutParagraph) -> Result<()> {
        self.body.push_str("<w:p>");

        let style = paragraph
            .style
            .as_deref()
            .map(|name| (name, style_id(name)))
            .filter(|(_, id)| !id.is_empty());
        if style.is_some() || paragraph.alignment.is_some() {
            self.body.push_str("<w:pPr>");
            if let Some((name, id)) = &style {
                if !BUILTIN_STYLES.contains(&id.as_str()) {
                    self.custom_styles.insert(name.to_string());
                }
                let _ = write!(self.body, r#"<w:pStyle w:val="{}"/>"#, id);
            }
            if let Some(alignment) = paragraph.alignment {
                let _ = write!(self.body, r#"<w:jc w:val="{}"/>"#, alignment.to_ooxml());
            }
            self.body.push_str("</w:pPr>");
        }

        for inline in &paragraph.content {
            match inline {
                OutInline::Run(run) => self.write_run(run, &paragraph, false),
                OutInline::Hyperlink { url, run } => {
                    let rel = self.add_relationship(REL_HYPERLINK, url.clone(), true);
                    let _ = write!(self.body, r#"<w:hyperlink r:id="{}">"#, rel);
                    self.write_run(run, &paragraph, true);
                    self.body.push_str("</w:hyperlink>");
                }
                OutInline::Image {
                    data,
                    extension,
                    width_emu,
                    height_emu,
                } => self.write_image(data, extension, *width_emu, *height_emu),
            }
        }

        self.body.push_str("</w:p>");
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts = [
            ("[Content_Types].xml", self.content_types()),
            ("_rels/.rels", PACKAGE_RELS.to_string()),
            ("word/document.xml", self.document()),
            ("word/styles.xml", self.styles()),
            ("word/numbering.xml", NUMBERING_XML.to_string()),
            ("word/_rels/document.xml.rels", self.document_relationships()),
        ];
        for (name, xml) in parts {
            zip.start_file(name, options)?;
            zip.write_all(xml.as_bytes())?;
        }
        for (name, data) in &self.media {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| Error::Docx(format!("failed to finalize document: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

fn media_content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

const NUMBERING_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="singleLevel"/>"#,
    r#"<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/>"#,
    r#"<w:lvlJc w:val="left"/><w:pPr><w:ind w:left="360" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>"#,
    r#"<w:abstractNum w:abstractNumId="1"><w:multiLevelType w:val="singleLevel"/>"#,
    r#"<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/>"#,
    r#"<w:lvlJc w:val="left"/><w:pPr><w:ind w:left="360" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>"#,
    r#"<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#,
    r#"<w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num>"#,
    r#"</w:numbering>"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::{DocumentSource, DocxReader, ParagraphChild, EMU_PER_INCH};
    use crate::model::Alignment;

    fn round_trip(paragraphs: Vec<OutParagraph>) -> DocxReader {
        let mut writer = DocxWriter::new();
        for p in paragraphs {
            writer.add_paragraph(p).unwrap();
        }
        DocxReader::from_bytes(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_styles_and_alignment_survive() {
        let mut heading = OutParagraph::styled("Heading 2");
        heading.push_run(Run::new("Results"));
        let mut body = OutParagraph::text("Body <text> & more");
        body.alignment = Some(Alignment::Justify);
        body.font_name = Some("Arial".into());
        body.font_size = Some(14);
        let mut quote = OutParagraph::styled("Intense Quote");
        quote.push_run(Run::italic("Quoted"));

        let reader = round_trip(vec![heading, body, quote]);
        let paragraphs = reader.paragraphs().unwrap();
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0].style_name, "Heading 2");
        assert_eq!(paragraphs[0].text(), "Results");
        assert_eq!(paragraphs[1].style_name, "Normal");
        assert_eq!(paragraphs[1].text(), "Body <text> & more");
        assert_eq!(paragraphs[1].alignment, Some(Alignment::Justify));
        assert_eq!(paragraphs[1].font_name.as_deref(), Some("Arial"));
        assert_eq!(paragraphs[1].font_size, Some(14));
        assert_eq!(paragraphs[2].style_name, "Intense Quote");
    }

    #[test]
    fn test_hyperlinks_survive() {
        let mut p = OutParagraph::text("Visit ");
        p.push_hyperlink("https://example.com/a b?q=1&r=2", Run::bold("Example"));
        let reader = round_trip(vec![p]);
        let paragraphs = reader.paragraphs().unwrap();

        match &paragraphs[0].children[1] {
            ParagraphChild::Hyperlink { url, runs } => {
                assert_eq!(url.as_deref(), Some("https://example.com/a b?q=1&r=2"));
                assert!(runs[0].bold);
            }
            other => panic!("unexpected child {:?}", other),
        }
    }

    #[test]
    fn test_tabs_become_tab_elements() {
        let reader = round_trip(vec![OutParagraph::text("a\tb")]);
        assert_eq!(reader.paragraphs().unwrap()[0].text(), "a\tb");
    }

    #[test]
    fn test_images_are_embedded() {
        let mut p = OutParagraph::default();
        p.content.push(OutInline::Image {
            data: vec![1, 2, 3, 4],
            extension: "PNG".into(),
            width_emu: 3 * EMU_PER_INCH,
            height_emu: 2 * EMU_PER_INCH,
        });
        let mut writer = DocxWriter::new();
        writer.add_paragraph(p).unwrap();
        assert_eq!(writer.paragraph_count(), 1);
        let bytes = writer.finish().unwrap();

        let reader = DocxReader::from_bytes(bytes).unwrap();
        let paragraphs = reader.paragraphs().unwrap();
        assert_eq!(paragraphs[0].images.len(), 1);
        assert_eq!(paragraphs[0].images[0].data, vec![1, 2, 3, 4]);
        assert_eq!(paragraphs[0].images[0].extension, "png");
    }
}
