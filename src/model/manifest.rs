//! Archive-level metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the archive layout written by this crate.
pub const FORMAT_VERSION: &str = "1.0.0";

/// Generator identifier recorded in new manifests.
pub const GENERATOR: &str = concat!("sidedoc/", env!("CARGO_PKG_VERSION"));

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Archive format version
    #[serde(alias = "sidedoc_version")]
    pub version: String,

    /// Time of the first extraction; never rewritten
    pub created_at: DateTime<Utc>,

    /// Time of the last write
    pub modified_at: DateTime<Utc>,

    /// File name of the source document
    pub source_file: String,

    /// SHA-256 of the source document bytes
    pub source_hash: String,

    /// SHA-256 of `content.md`
    pub content_hash: String,

    /// Tool that wrote the archive
    pub generator: String,
}

impl Manifest {
    /// Create a manifest for a fresh extraction.
    pub fn new(
        source_file: impl Into<String>,
        source_hash: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            version: FORMAT_VERSION.to_string(),
            created_at: now,
            modified_at: now,
            source_file: source_file.into(),
            source_hash: source_hash.into(),
            content_hash: content_hash.into(),
            generator: GENERATOR.to_string(),
        }
    }

    /// Record a rewrite of the content: updates `modified_at` and `content_hash` only.
    pub fn touch(&mut self, content_hash: impl Into<String>) {
        self.modified_at = Utc::now();
        self.content_hash = content_hash.into();
    }
}
