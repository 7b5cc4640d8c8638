//! # sidedoc
//!
//! Editable, content-addressed archives for Word documents.
//!
//! A `.docx` file is extracted into a `.sidedoc` archive holding plain
//! Markdown (`content.md`) next to the block structure, per-block styles and
//! image assets needed to rebuild it. Edit the Markdown with any tool, then
//! `sync` the archive to re-match blocks and carry their formatting forward,
//! or `build` a new Word document directly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sidedoc::{build_file, extract_file, BuildOptions, ExtractOptions};
//!
//! fn main() -> sidedoc::Result<()> {
//!     // Word document -> archive
//!     let report = extract_file("report.docx", None::<&str>, &ExtractOptions::default())?;
//!     println!("{} blocks in {}", report.blocks, report.output.display());
//!
//!     // ... edit content.md inside the archive ...
//!
//!     // Archive -> Word document
//!     build_file(&report.output, Some("report-edited.docx"), &BuildOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Markdown content**: headings, paragraphs, bullet and numbered lists,
//!   bold/italic runs, hyperlinks and images
//! - **Style preservation**: fonts, sizes, alignment and paragraph styles
//!   follow each block through edits
//! - **Two-pass matching**: exact hash matches first, then same-position
//!   edits above a similarity threshold
//! - **Defensive I/O**: image size and format checks, path-traversal safe
//!   unpacking, atomic archive writes

pub mod docx;
pub mod error;
pub mod extract;
pub mod hash;
pub mod markdown;
pub mod model;
pub mod package;
pub mod reconstruct;
pub mod sync;

// Re-export commonly used types
pub use docx::{DocumentSink, DocumentSource, DocxReader, DocxWriter};
pub use error::{Error, ErrorKind, Result};
pub use extract::{ExtractOptions, ExtractResult, Extractor};
pub use model::{
    Alignment, Block, BlockKind, DocumentDefaults, InlineFormat, Manifest, Style, StyleSheet,
};
pub use package::{Archive, ValidationReport};
pub use reconstruct::{BuildOptions, BuildReport, Reconstructor};
pub use sync::{DiffReport, MatchOptions};

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Summary of an extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    /// Archive written
    pub output: PathBuf,
    /// Blocks extracted
    pub blocks: usize,
    /// Images stored as assets
    pub images: usize,
    /// Images replaced by a placeholder
    pub rejected_images: usize,
}

/// Options for [`sync_file`].
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Write the synced archive here instead of in place
    pub output: Option<PathBuf>,
    /// Matching parameters
    pub matching: MatchOptions,
}

impl SyncOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write to a different path.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Set matching parameters.
    pub fn with_matching(mut self, matching: MatchOptions) -> Self {
        self.matching = matching;
        self
    }
}

/// Summary of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Archive written
    pub output: PathBuf,
    /// Blocks matched by identical content
    pub exact: usize,
    /// Blocks matched as same-position edits
    pub edited: usize,
    /// New blocks with no old counterpart
    pub added: usize,
    /// Old blocks with no new counterpart
    pub removed: usize,
    /// Whether `content.md` had changed since the last write
    pub content_changed: bool,
}

/// Overview of an archive for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveInfo {
    /// Archive metadata
    pub manifest: Manifest,
    /// Stored blocks
    pub blocks: usize,
    /// Heading blocks
    pub headings: usize,
    /// Paragraph blocks
    pub paragraphs: usize,
    /// List item blocks
    pub list_items: usize,
    /// Image blocks
    pub images: usize,
    /// Stored assets
    pub assets: usize,
    /// Total asset size in bytes
    pub asset_bytes: u64,
    /// Whether `content.md` was edited since the last write
    pub content_modified: bool,
}

/// Extract a Word document into a `.sidedoc` archive.
///
/// The archive goes to `output`, or next to the input with a `.sidedoc`
/// extension.
///
/// # Example
///
/// ```no_run
/// use sidedoc::{extract_file, ExtractOptions};
///
/// let report = extract_file("report.docx", Some("report.sidedoc"), &ExtractOptions::default()).unwrap();
/// println!("{} blocks, {} images", report.blocks, report.images);
/// ```
pub fn extract_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Option<Q>,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let input = input.as_ref();
    let output = output
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(|| package::archive_path_for(input));

    let reader = DocxReader::open(input)?;
    let source_hash = hash::file_hash(input)?;
    let result = Extractor::new(options.clone()).extract(&reader)?;

    let content = result.markdown();
    let source_file = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let manifest = Manifest::new(source_file, source_hash, hash::content_hash(&content));

    let report = ExtractReport {
        output: output.clone(),
        blocks: result.blocks.len(),
        images: result.images.len(),
        rejected_images: result.rejected_images(),
    };

    Archive::new(content, result.blocks, result.styles, manifest, result.images).save(&output)?;
    log::info!("extracted {} into {}", input.display(), output.display());
    Ok(report)
}

/// Build a Word document from an archive.
///
/// The current `content.md` is matched against the stored structure so
/// edited blocks keep their styles. The document goes to `output`, or next to
/// the archive with a `.docx` extension.
///
/// # Example
///
/// ```no_run
/// use sidedoc::{build_file, BuildOptions};
///
/// let report = build_file("report.sidedoc", None::<&str>, &BuildOptions::default()).unwrap();
/// println!("{} paragraphs", report.paragraphs);
/// ```
pub fn build_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Option<Q>,
    options: &BuildOptions,
) -> Result<BuildReport> {
    let input = input.as_ref();
    let output = output
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(|| input.with_extension("docx"));

    let archive = Archive::open(input)?;
    let old = archive.old_blocks();
    let mut new = archive.current_blocks();
    let matches = sync::match_blocks(&old, &new);
    sync::carry_forward(&old, &mut new, &matches);

    let mut writer = DocxWriter::new();
    let report = Reconstructor::new(&archive.styles, &archive.assets)
        .with_options(options.clone())
        .build(&new, &matches, &mut writer)?;
    let bytes = writer.finish()?;
    package::write_atomic(&output, &bytes)?;

    log::info!("built {} from {}", output.display(), input.display());
    Ok(report)
}

/// Re-match edited content against the stored structure and rewrite the
/// archive metadata.
///
/// Matched blocks keep their old styles; new blocks get document defaults.
/// The manifest's `modified_at` and `content_hash` are updated. Any oversized
/// asset aborts the sync before anything is written.
///
/// # Example
///
/// ```no_run
/// use sidedoc::{sync_file, SyncOptions};
///
/// let report = sync_file("report.sidedoc", &SyncOptions::default()).unwrap();
/// println!("{} added, {} removed", report.added, report.removed);
/// ```
pub fn sync_file<P: AsRef<Path>>(path: P, options: &SyncOptions) -> Result<SyncReport> {
    let path = path.as_ref();
    let mut archive = Archive::open(path)?;
    package::check_assets(&archive.assets)?;

    let content_changed = archive.is_content_modified();
    let old = archive.old_blocks();
    let mut new = archive.current_blocks();
    let matches = sync::match_blocks_with(&old, &new, &options.matching);
    sync::carry_forward(&old, &mut new, &matches);

    let exact = matches
        .iter()
        .filter(|m| m.kind == sync::MatchKind::Exact)
        .count();
    let output = options.output.clone().unwrap_or_else(|| path.to_path_buf());
    let report = SyncReport {
        output: output.clone(),
        exact,
        edited: matches.len() - exact,
        added: matches.added().len(),
        removed: matches.removed().len(),
        content_changed,
    };

    archive.styles = sync::sync_styles(&archive.styles, &matches, &new);
    // Offsets describe the normalized text, not the raw content.md.
    archive.snapshot = Some(markdown::render(&new));
    archive.blocks = new;
    archive.manifest.touch(hash::content_hash(&archive.content));
    archive.save(&output)?;

    log::info!(
        "synced {}: {} exact, {} edited, {} added, {} removed",
        output.display(),
        report.exact,
        report.edited,
        report.added,
        report.removed
    );
    Ok(report)
}

/// Compare the stored structure with the current `content.md`. Never writes.
///
/// # Example
///
/// ```no_run
/// use sidedoc::{diff_file, MatchOptions};
///
/// let report = diff_file("report.sidedoc", &MatchOptions::default()).unwrap();
/// println!("{}", report.summary());
/// ```
pub fn diff_file<P: AsRef<Path>>(path: P, options: &MatchOptions) -> Result<DiffReport> {
    let archive = Archive::open(path)?;
    Ok(sync::diff(&archive.old_blocks(), &archive.current_blocks(), options))
}

/// Open an archive and check it for inconsistencies.
pub fn validate_file<P: AsRef<Path>>(path: P) -> Result<ValidationReport> {
    let archive = Archive::open(path)?;
    Ok(package::validate(&archive))
}

/// Summarize an archive.
pub fn archive_info<P: AsRef<Path>>(path: P) -> Result<ArchiveInfo> {
    let archive = Archive::open(path)?;
    let count = |pred: fn(&BlockKind) -> bool| archive.blocks.iter().filter(|b| pred(&b.kind)).count();

    Ok(ArchiveInfo {
        blocks: archive.blocks.len(),
        headings: count(|k| matches!(k, BlockKind::Heading { .. })),
        paragraphs: count(|k| matches!(k, BlockKind::Paragraph)),
        list_items: count(|k| matches!(k, BlockKind::ListItem)),
        images: count(|k| matches!(k, BlockKind::Image { .. })),
        assets: archive.assets.len(),
        asset_bytes: archive.asset_bytes(),
        content_modified: archive.is_content_modified(),
        manifest: archive.manifest,
    })
}

/// Extract every archive entry into a directory.
///
/// Fails without writing anything if any entry would land outside `dest`.
pub fn unpack_file<P: AsRef<Path>, Q: AsRef<Path>>(path: P, dest: Q) -> Result<Vec<PathBuf>> {
    package::unpack(path, dest)
}

/// Pack a directory produced by [`unpack_file`] back into an archive.
pub fn pack_dir<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, output: Q) -> Result<usize> {
    package::pack(dir, output)
}
