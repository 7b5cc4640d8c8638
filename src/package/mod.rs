//! The `.sidedoc` archive: a ZIP container holding the markdown, block
//! structure, styles, manifest and image assets of one document.
//!
//! Reading validates the container as it goes: all four metadata entries
//! must be present and parse, the entry count is bounded, and no asset may
//! exceed [`MAX_ASSET_SIZE`]. Writing always goes through a temporary file
//! in the destination directory so a failed write never touches the
//! original archive.

mod unpack;
mod validate;

pub use unpack::{pack, sanitize_entry_name, unpack};
pub use validate::{validate, ValidationReport};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::hash::content_hash;
use crate::markdown;
use crate::model::{Block, Manifest, StyleSheet};

/// Largest asset accepted in an archive (50 MiB).
pub const MAX_ASSET_SIZE: u64 = 50 * 1024 * 1024;

/// Largest number of entries accepted in an archive.
pub const MAX_ENTRY_COUNT: usize = 10_000;

/// Markdown content entry.
pub const CONTENT_ENTRY: &str = "content.md";
/// Block structure entry.
pub const STRUCTURE_ENTRY: &str = "structure.json";
/// Style sheet entry.
pub const STYLES_ENTRY: &str = "styles.json";
/// Manifest entry.
pub const MANIFEST_ENTRY: &str = "manifest.json";
/// Markdown that `structure.json` was computed from.
pub const SNAPSHOT_ENTRY: &str = "snapshot.md";
/// Directory prefix of image assets.
pub const ASSETS_PREFIX: &str = "assets/";

/// Entries every archive must contain.
pub const REQUIRED_ENTRIES: [&str; 4] = [CONTENT_ENTRY, STRUCTURE_ENTRY, STYLES_ENTRY, MANIFEST_ENTRY];

/// Archive file extension.
pub const EXTENSION: &str = "sidedoc";

/// Contents of `structure.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Structure {
    blocks: Vec<Block>,
}

/// An archive loaded into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    /// Current `content.md`, possibly edited by hand
    pub content: String,
    /// Blocks from `structure.json`; `content` fields are empty
    pub blocks: Vec<Block>,
    /// Styles keyed by block id
    pub styles: StyleSheet,
    /// Archive metadata
    pub manifest: Manifest,
    /// Asset bytes keyed by file name
    pub assets: BTreeMap<String, Vec<u8>>,
    /// Markdown the stored block offsets refer to
    pub snapshot: Option<String>,
}

impl Archive {
    /// Assemble a fresh archive whose structure describes `content`.
    ///
    /// The snapshot is rendered from `blocks`, which must still carry their
    /// content.
    pub fn new(
        content: String,
        blocks: Vec<Block>,
        styles: StyleSheet,
        manifest: Manifest,
        assets: BTreeMap<String, Vec<u8>>,
    ) -> Self {
        Self {
            snapshot: Some(markdown::render(&blocks)),
            content,
            blocks,
            styles,
            manifest,
            assets,
        }
    }

    /// Open and validate an archive file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Read an archive from memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }

    /// Read an archive from any seekable reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut zip = open_zip(reader)?;

        for name in REQUIRED_ENTRIES {
            if zip.index_for_name(name).is_none() {
                return Err(Error::MissingEntry(name.to_string()));
            }
        }

        let content = read_text(&mut zip, CONTENT_ENTRY)?;
        let structure: Structure = read_json(&mut zip, STRUCTURE_ENTRY)?;
        let styles: StyleSheet = read_json(&mut zip, STYLES_ENTRY)?;
        let manifest: Manifest = read_json(&mut zip, MANIFEST_ENTRY)?;
        let snapshot = match zip.index_for_name(SNAPSHOT_ENTRY) {
            Some(_) => Some(read_text(&mut zip, SNAPSHOT_ENTRY)?),
            None => None,
        };
        let assets = read_assets(&mut zip)?;

        log::debug!(
            "opened archive: {} blocks, {} styles, {} assets",
            structure.blocks.len(),
            styles.len(),
            assets.len()
        );

        Ok(Self {
            content,
            blocks: structure.blocks,
            styles,
            manifest,
            assets,
            snapshot,
        })
    }

    /// Serialize the archive to ZIP bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        check_assets(&self.assets)?;

        let mut writer = ArchiveWriter::new();
        writer.add_text(CONTENT_ENTRY, &self.content)?;
        writer.add_json(
            STRUCTURE_ENTRY,
            &Structure {
                blocks: self.blocks.clone(),
            },
        )?;
        writer.add_json(STYLES_ENTRY, &self.styles)?;
        writer.add_json(MANIFEST_ENTRY, &self.manifest)?;
        if let Some(snapshot) = &self.snapshot {
            writer.add_text(SNAPSHOT_ENTRY, snapshot)?;
        }
        for (name, data) in &self.assets {
            writer.add_bytes(&format!("{}{}", ASSETS_PREFIX, name), data)?;
        }
        writer.finish()
    }

    /// Write the archive to `path`, replacing any existing file atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)
    }

    /// Blocks parsed from the current `content.md`.
    pub fn current_blocks(&self) -> Vec<Block> {
        markdown::parse(&self.content)
    }

    /// Stored blocks with their content restored.
    ///
    /// Content is sliced out of the snapshot by the stored offsets, or out of
    /// `content.md` when it is still the text the manifest hashed. A slice is
    /// only kept when its hash matches the block's; otherwise the content
    /// stays empty and only exact matching can pair the block.
    pub fn old_blocks(&self) -> Vec<Block> {
        let source = self.snapshot.as_deref().or_else(|| {
            (content_hash(&self.content) == self.manifest.content_hash)
                .then_some(self.content.as_str())
        });
        let chars: Vec<char> = source.map(|s| s.chars().collect()).unwrap_or_default();

        self.blocks
            .iter()
            .cloned()
            .map(|mut block| {
                if let Some(slice) = chars.get(block.content_start..block.content_end) {
                    let text: String = slice.iter().collect();
                    if content_hash(&text) == block.content_hash {
                        block.content = text;
                    } else {
                        log::debug!("{}: stored content does not match its hash", block.id);
                    }
                }
                block
            })
            .collect()
    }

    /// Whether `content.md` changed since the archive was last written.
    pub fn is_content_modified(&self) -> bool {
        content_hash(&self.content) != self.manifest.content_hash
    }

    /// Total size of all assets in bytes.
    pub fn asset_bytes(&self) -> u64 {
        self.assets.values().map(|data| data.len() as u64).sum()
    }
}

/// Streams named entries into an in-memory ZIP.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl ArchiveWriter {
    /// Start an empty archive.
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    /// Add raw bytes.
    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(data)?;
        Ok(())
    }

    /// Add UTF-8 text.
    pub fn add_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.add_bytes(name, text.as_bytes())
    }

    /// Add a value as pretty-printed JSON.
    pub fn add_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| Error::Other(format!("failed to serialize {}: {}", name, e)))?;
        self.add_text(name, &json)
    }

    /// Finish the archive and return its bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self.zip.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `data` to `path` through a temporary file in the same directory.
///
/// The temporary file is removed if anything fails before the final rename.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    log::debug!("wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Default archive path for a source document: same stem, `.sidedoc` extension.
pub fn archive_path_for<P: AsRef<Path>>(source: P) -> PathBuf {
    source.as_ref().with_extension(EXTENSION)
}

/// Reject any asset larger than [`MAX_ASSET_SIZE`].
pub fn check_assets(assets: &BTreeMap<String, Vec<u8>>) -> Result<()> {
    for (name, data) in assets {
        check_asset_size(name, data.len() as u64)?;
    }
    Ok(())
}

pub(crate) fn check_asset_size(name: &str, size: u64) -> Result<()> {
    if size > MAX_ASSET_SIZE {
        return Err(Error::ValidationFailed(format!(
            "asset {} is {} bytes, exceeding the maximum of {} bytes",
            name, size, MAX_ASSET_SIZE
        )));
    }
    Ok(())
}

pub(crate) fn open_zip<R: Read + Seek>(reader: R) -> Result<ZipArchive<R>> {
    let zip = ZipArchive::new(reader)?;
    if zip.len() > MAX_ENTRY_COUNT {
        return Err(Error::InvalidFormat(format!(
            "archive has {} entries, more than the maximum of {}",
            zip.len(),
            MAX_ENTRY_COUNT
        )));
    }
    Ok(zip)
}

fn read_text<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut file = match zip.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Err(Error::MissingEntry(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::new();
    (&mut file).take(MAX_ASSET_SIZE + 1).read_to_end(&mut data)?;
    if data.len() as u64 > MAX_ASSET_SIZE {
        return Err(Error::ValidationFailed(format!(
            "{} exceeds the maximum of {} bytes",
            name, MAX_ASSET_SIZE
        )));
    }
    String::from_utf8(data)
        .map_err(|_| Error::InvalidFormat(format!("{} is not valid UTF-8", name)))
}

fn read_json<R, T>(zip: &mut ZipArchive<R>, name: &str) -> Result<T>
where
    R: Read + Seek,
    T: for<'de> Deserialize<'de>,
{
    let text = read_text(zip, name)?;
    serde_json::from_str(&text).map_err(|e| Error::InvalidJson {
        file: name.to_string(),
        message: e.to_string(),
    })
}

fn read_assets<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut assets = BTreeMap::new();

    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let Some(name) = file.name().strip_prefix(ASSETS_PREFIX).map(str::to_string) else {
            continue;
        };
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(Error::UnsafePath {
                entry: file.name().to_string(),
            });
        }

        check_asset_size(&name, file.size())?;
        let mut data = Vec::new();
        (&mut file).take(MAX_ASSET_SIZE + 1).read_to_end(&mut data)?;
        check_asset_size(&name, data.len() as u64)?;
        assets.insert(name, data);
    }

    Ok(assets)
}
