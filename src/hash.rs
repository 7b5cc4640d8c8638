//! Content hashing and text similarity.

use sha2::{Digest, Sha256};
use similar::{Algorithm, TextDiff};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Buffer size used when hashing files and streams.
pub const FILE_READ_CHUNK_SIZE: usize = 4096;

/// SHA-256 hex digest of a string.
pub fn content_hash(content: &str) -> String {
    bytes_hash(content.as_bytes())
}

/// SHA-256 hex digest of a byte slice.
pub fn bytes_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 hex digest of everything a reader yields, read in fixed-size chunks.
pub fn reader_hash<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; FILE_READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 hex digest of a file, streamed so memory stays constant.
pub fn file_hash<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    Ok(reader_hash(file)?)
}

/// Similarity ratio between two strings in `0.0..=1.0`.
///
/// Computed as `2·M / (|a| + |b|)` where `M` is the number of characters in
/// the matching blocks of a character-level diff. Identical strings score
/// 1.0; strings with no characters in common score 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b);
    f64::from(diff.ratio())
}
