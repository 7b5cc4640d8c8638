//! OOXML (`.docx`) reader.
//!
//! Reads the main document part, the style table and the document
//! relationships, resolving each body paragraph into a [`SourceParagraph`].
//! Tables, text boxes and `mc:Fallback` content are skipped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{DocumentSource, ParagraphChild, Run, SourceImage, SourceParagraph};
use crate::error::{Error, Result};
use crate::model::{Alignment, DocumentDefaults, DEFAULT_FONT_NAME, DEFAULT_FONT_SIZE};
use crate::package::MAX_ASSET_SIZE;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

/// Longest `basedOn` chain followed when resolving inherited style properties.
const MAX_STYLE_DEPTH: usize = 16;

/// A `.docx` package opened for reading.
#[derive(Debug, Clone)]
pub struct DocxReader {
    document: String,
    styles: StyleTable,
    hyperlinks: HashMap<String, String>,
    images: HashMap<String, SourceImage>,
}

impl DocxReader {
    /// Open a `.docx` file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Read a `.docx` package from memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::Docx(format!("not a Word document: {}", e)))?;

        let document = read_part(&mut zip, DOCUMENT_PART)?
            .ok_or_else(|| Error::Docx(format!("missing part {}", DOCUMENT_PART)))?;

        let styles = match read_part(&mut zip, STYLES_PART)? {
            Some(xml) => StyleTable::parse(&xml)?,
            None => StyleTable::default(),
        };

        let relationships = match read_part(&mut zip, DOCUMENT_RELS_PART)? {
            Some(xml) => parse_relationships(&xml)?,
            None => Vec::new(),
        };

        let mut hyperlinks = HashMap::new();
        let mut images = HashMap::new();
        for rel in relationships {
            if rel.kind.ends_with("/hyperlink") {
                hyperlinks.insert(rel.id, rel.target);
            } else if rel.kind.ends_with("/image") && !rel.external {
                let part = resolve_part("word", &rel.target);
                match load_media(&mut zip, &part)? {
                    Some(image) => {
                        images.insert(rel.id, image);
                    }
                    None => log::warn!("image part {} referenced by {} is missing", part, rel.id),
                }
            }
        }

        log::debug!(
            "opened document: {} styles, {} hyperlinks, {} images",
            styles.styles.len(),
            hyperlinks.len(),
            images.len()
        );

        Ok(Self {
            document,
            styles,
            hyperlinks,
            images,
        })
    }

    fn parse_document(&self) -> Result<Vec<SourceParagraph>> {
        let mut reader = Reader::from_str(&self.document);
        reader.config_mut().trim_text(false);

        let mut walk = Walk::default();
        let mut paragraphs = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => self.open_element(&e, &mut walk)?,
                Event::Empty(e) => {
                    self.open_element(&e, &mut walk)?;
                    self.close_element(e.name().as_ref(), &mut walk, &mut paragraphs);
                }
                Event::End(e) => self.close_element(e.name().as_ref(), &mut walk, &mut paragraphs),
                Event::Text(t) => {
                    if walk.in_text && walk.collecting() {
                        let text = t.unescape()?;
                        if let Some(run) = walk.run.as_mut() {
                            run.run.text.push_str(&text);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(paragraphs)
    }

    fn open_element(&self, e: &BytesStart<'_>, walk: &mut Walk) -> Result<()> {
        let name = e.name();
        let name = name.as_ref();

        if walk.fallback_depth > 0 {
            if name == b"mc:Fallback" {
                walk.fallback_depth += 1;
            }
            return Ok(());
        }

        match name {
            b"mc:Fallback" => walk.fallback_depth += 1,
            b"w:tbl" => walk.table_depth += 1,
            b"w:p" => {
                walk.paragraph_depth += 1;
                if walk.paragraph_depth == 1 && walk.table_depth == 0 {
                    walk.paragraph = Some(ParagraphBuilder::default());
                }
            }
            _ if !walk.collecting() => {}
            b"w:pPr" => walk.in_paragraph_props = true,
            b"w:rPr" => walk.in_run_props = true,
            b"w:pStyle" if walk.in_paragraph_props => {
                if let Some(p) = walk.paragraph.as_mut() {
                    p.style_id = attr(e, b"w:val")?;
                }
            }
            b"w:jc" if walk.in_paragraph_props => {
                if let Some(p) = walk.paragraph.as_mut() {
                    p.alignment = attr(e, b"w:val")?.as_deref().and_then(Alignment::from_ooxml);
                }
            }
            b"w:hyperlink" => {
                let url = match attr(e, b"r:id")? {
                    Some(id) => self.hyperlinks.get(&id).cloned(),
                    None => None,
                };
                walk.hyperlink = Some((url, Vec::new()));
            }
            b"w:r" => walk.run = Some(RunBuilder::default()),
            b"w:t" => walk.in_text = walk.run.is_some(),
            _ => {
                if let Some(run) = walk.run.as_mut() {
                    if walk.in_run_props {
                        run.apply_property(name, e)?;
                    } else {
                        match name {
                            b"w:tab" => run.run.text.push('\t'),
                            b"w:br" | b"w:cr" => run.run.text.push(' '),
                            _ => {}
                        }
                    }
                }
                let image_rel = match name {
                    b"a:blip" => attr(e, b"r:embed")?,
                    b"v:imagedata" => attr(e, b"r:id")?,
                    _ => None,
                };
                if let (Some(rel), Some(p)) = (image_rel, walk.paragraph.as_mut()) {
                    p.images.push(self.image(&rel));
                }
            }
        }
        Ok(())
    }

    fn close_element(&self, name: &[u8], walk: &mut Walk, out: &mut Vec<SourceParagraph>) {
        if walk.fallback_depth > 0 {
            if name == b"mc:Fallback" {
                walk.fallback_depth -= 1;
            }
            return;
        }

        match name {
            b"w:tbl" => walk.table_depth = walk.table_depth.saturating_sub(1),
            b"w:p" => {
                if walk.paragraph_depth == 1 {
                    if let Some(builder) = walk.paragraph.take() {
                        out.push(self.finish_paragraph(builder, out.len()));
                    }
                }
                walk.paragraph_depth = walk.paragraph_depth.saturating_sub(1);
            }
            _ if !walk.collecting() => {}
            b"w:pPr" => walk.in_paragraph_props = false,
            b"w:rPr" => walk.in_run_props = false,
            b"w:t" => walk.in_text = false,
            b"w:r" => {
                if let Some(run) = walk.run.take() {
                    walk.finish_run(run);
                }
            }
            b"w:hyperlink" => {
                if let (Some((url, runs)), Some(p)) = (walk.hyperlink.take(), walk.paragraph.as_mut())
                {
                    p.children.push(ParagraphChild::Hyperlink { url, runs });
                }
            }
            _ => {}
        }
    }

    fn finish_paragraph(&self, builder: ParagraphBuilder, index: usize) -> SourceParagraph {
        let style_id = builder
            .style_id
            .or_else(|| self.styles.default_paragraph.clone());
        let style_name = style_id
            .as_deref()
            .map(|id| self.styles.name_of(id))
            .unwrap_or_else(|| "Normal".to_string());

        let alignment = builder
            .alignment
            .or_else(|| self.styles.resolve(style_id.as_deref(), |s| s.alignment));
        let font_name = builder
            .font_name
            .or_else(|| self.styles.resolve(style_id.as_deref(), |s| s.font_name.clone()))
            .or_else(|| self.styles.default_font_name.clone());
        let font_size = builder
            .font_size
            .or_else(|| self.styles.resolve(style_id.as_deref(), |s| s.font_size))
            .or(self.styles.default_font_size);

        log::trace!("paragraph {} style={:?}", index, style_name);

        SourceParagraph {
            style_name,
            alignment,
            font_name,
            font_size,
            children: builder.children,
            images: builder.images,
        }
    }

    fn image(&self, rel_id: &str) -> SourceImage {
        match self.images.get(rel_id) {
            Some(image) => image.clone(),
            None => {
                log::warn!("no image part for relationship {}", rel_id);
                SourceImage::new(Vec::new(), "")
            }
        }
    }

    /// Document-level font defaults declared in the style table.
    pub fn defaults(&self) -> DocumentDefaults {
        DocumentDefaults {
            font_name: self
                .styles
                .default_font_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FONT_NAME.to_string()),
            font_size: self.styles.default_font_size.unwrap_or(DEFAULT_FONT_SIZE),
        }
    }
}

impl DocumentSource for DocxReader {
    fn paragraphs(&self) -> Result<Vec<SourceParagraph>> {
        self.parse_document()
    }

    fn document_defaults(&self) -> Option<DocumentDefaults> {
        Some(self.defaults())
    }
}

/// Traversal state while walking `document.xml`.
#[derive(Debug, Default)]
struct Walk {
    table_depth: usize,
    paragraph_depth: usize,
    fallback_depth: usize,
    in_paragraph_props: bool,
    in_run_props: bool,
    in_text: bool,
    paragraph: Option<ParagraphBuilder>,
    hyperlink: Option<(Option<String>, Vec<Run>)>,
    run: Option<RunBuilder>,
}

impl Walk {
    /// Whether content belongs to a top-level body paragraph.
    fn collecting(&self) -> bool {
        self.paragraph.is_some() && self.paragraph_depth == 1 && self.fallback_depth == 0
    }

    fn finish_run(&mut self, builder: RunBuilder) {
        let Some(paragraph) = self.paragraph.as_mut() else {
            return;
        };

        if !builder.run.text.is_empty() && !paragraph.saw_text {
            paragraph.saw_text = true;
            paragraph.font_name = builder.font_name;
            paragraph.font_size = builder.font_size;
        }

        match self.hyperlink.as_mut() {
            Some((_, runs)) => runs.push(builder.run),
            None => paragraph.children.push(ParagraphChild::Run(builder.run)),
        }
    }
}

#[derive(Debug, Default)]
struct ParagraphBuilder {
    style_id: Option<String>,
    alignment: Option<Alignment>,
    font_name: Option<String>,
    font_size: Option<u32>,
    saw_text: bool,
    children: Vec<ParagraphChild>,
    images: Vec<SourceImage>,
}

#[derive(Debug, Default)]
struct RunBuilder {
    run: Run,
    font_name: Option<String>,
    font_size: Option<u32>,
}

impl RunBuilder {
    fn apply_property(&mut self, name: &[u8], e: &BytesStart<'_>) -> Result<()> {
        match name {
            b"w:b" => self.run.bold = on_off(e)?,
            b"w:i" => self.run.italic = on_off(e)?,
            b"w:u" => self.run.underline = on_off(e)?,
            b"w:rFonts" => self.font_name = font_attr(e)?,
            b"w:sz" => self.font_size = half_points(e)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct StyleDef {
    name: String,
    based_on: Option<String>,
    alignment: Option<Alignment>,
    font_name: Option<String>,
    font_size: Option<u32>,
}

/// Parsed `word/styles.xml`.
#[derive(Debug, Clone, Default)]
struct StyleTable {
    styles: HashMap<String, StyleDef>,
    default_paragraph: Option<String>,
    default_font_name: Option<String>,
    default_font_size: Option<u32>,
}

impl StyleTable {
    fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut table = StyleTable::default();
        let mut current: Option<(String, StyleDef)> = None;
        let mut in_doc_defaults = false;

        loop {
            let (e, empty) = match reader.read_event()? {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(e) => {
                    match e.name().as_ref() {
                        b"w:style" => {
                            if let Some((id, def)) = current.take() {
                                table.styles.insert(id, def);
                            }
                        }
                        b"w:docDefaults" => in_doc_defaults = false,
                        _ => {}
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            match e.name().as_ref() {
                b"w:docDefaults" => in_doc_defaults = !empty,
                b"w:style" => {
                    let id = attr(&e, b"w:styleId")?.unwrap_or_default();
                    let is_paragraph = attr(&e, b"w:type")?.as_deref() == Some("paragraph");
                    let is_default = matches!(attr(&e, b"w:default")?.as_deref(), Some("1" | "true"));
                    if is_paragraph && is_default {
                        table.default_paragraph = Some(id.clone());
                    }
                    let def = StyleDef {
                        name: id.clone(),
                        ..Default::default()
                    };
                    if empty {
                        table.styles.insert(id, def);
                    } else {
                        current = Some((id, def));
                    }
                }
                b"w:name" => {
                    if let (Some((_, def)), Some(name)) = (current.as_mut(), attr(&e, b"w:val")?) {
                        def.name = display_style_name(&name);
                    }
                }
                b"w:basedOn" => {
                    if let Some((_, def)) = current.as_mut() {
                        def.based_on = attr(&e, b"w:val")?;
                    }
                }
                b"w:jc" => {
                    if let Some((_, def)) = current.as_mut() {
                        def.alignment = attr(&e, b"w:val")?.as_deref().and_then(Alignment::from_ooxml);
                    }
                }
                b"w:rFonts" => {
                    let font = font_attr(&e)?;
                    if let Some((_, def)) = current.as_mut() {
                        def.font_name = font;
                    } else if in_doc_defaults {
                        table.default_font_name = font;
                    }
                }
                b"w:sz" => {
                    let size = half_points(&e)?;
                    if let Some((_, def)) = current.as_mut() {
                        def.font_size = size;
                    } else if in_doc_defaults {
                        table.default_font_size = size;
                    }
                }
                _ => {}
            }
        }

        Ok(table)
    }

    fn name_of(&self, id: &str) -> String {
        match self.styles.get(id) {
            Some(def) if !def.name.is_empty() => def.name.clone(),
            _ => id.to_string(),
        }
    }

    /// Walk the `basedOn` chain from `id` and return the first value `pick` yields.
    fn resolve<T>(&self, id: Option<&str>, pick: impl Fn(&StyleDef) -> Option<T>) -> Option<T> {
        let mut next = id;
        for _ in 0..MAX_STYLE_DEPTH {
            let def = self.styles.get(next?)?;
            if let Some(value) = pick(def) {
                return Some(value);
            }
            next = def.based_on.as_deref();
        }
        None
    }
}

/// Built-in style names are stored in lowercase ("heading 1"); present them
/// the way word processors show them ("Heading 1").
fn display_style_name(name: &str) -> String {
    if name.chars().any(char::is_uppercase) {
        return name.to_string();
    }
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
struct Relationship {
    id: String,
    kind: String,
    target: String,
    external: bool,
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) else {
                    continue;
                };
                rels.push(Relationship {
                    id,
                    kind: attr(&e, b"Type")?.unwrap_or_default(),
                    target,
                    external: attr(&e, b"TargetMode")?.as_deref() == Some("External"),
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

/// Resolve a relationship target relative to the directory of its source part.
fn resolve_part(base: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}/{}", base, target),
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn read_part<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match zip.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Error::Docx(format!("cannot read {}: {}", name, e))),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn load_media<R: Read + Seek>(zip: &mut ZipArchive<R>, part: &str) -> Result<Option<SourceImage>> {
    let mut file = match zip.by_name(part) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Error::Docx(format!("cannot read {}: {}", part, e))),
    };

    let extension = part
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    let declared = file.size();

    // Oversized parts are reported by size only; extraction rejects them.
    if declared > MAX_ASSET_SIZE {
        return Ok(Some(SourceImage {
            data: Vec::new(),
            size: declared,
            extension,
        }));
    }

    let mut data = Vec::new();
    (&mut file).take(MAX_ASSET_SIZE + 1).read_to_end(&mut data)?;
    Ok(Some(SourceImage {
        size: declared.max(data.len() as u64),
        data,
        extension,
    }))
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    match e.try_get_attribute(key).map_err(quick_xml::Error::from)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// OOXML toggle property: absent `w:val` means on.
fn on_off(e: &BytesStart<'_>) -> Result<bool> {
    Ok(match attr(e, b"w:val")? {
        None => true,
        Some(v) => !matches!(v.as_str(), "0" | "false" | "off" | "none"),
    })
}

fn font_attr(e: &BytesStart<'_>) -> Result<Option<String>> {
    Ok(attr(e, b"w:ascii")?.or(attr(e, b"w:hAnsi")?))
}

/// `w:sz` is measured in half-points.
fn half_points(e: &BytesStart<'_>) -> Result<Option<u32>> {
    Ok(attr(e, b"w:val")?
        .and_then(|v| v.parse::<u32>().ok())
        .map(|half| half / 2))
}
