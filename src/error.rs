//! Error types for the sidedoc library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sidedoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting, syncing or rebuilding documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An input path does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The archive container is not a readable ZIP file.
    #[error("Invalid sidedoc archive: {0}")]
    InvalidFormat(String),

    /// A required archive entry is missing.
    #[error("Invalid sidedoc archive: missing required file {0}")]
    MissingEntry(String),

    /// A metadata file failed to parse.
    #[error("Invalid sidedoc archive: {file} is not valid JSON: {message}")]
    InvalidJson {
        /// Archive entry name
        file: String,
        /// Underlying parser message
        message: String,
    },

    /// An archive entry would be written outside the destination directory.
    #[error("Unsafe path in archive: {entry}")]
    UnsafePath {
        /// Raw entry name as stored in the archive
        entry: String,
    },

    /// An image or asset failed a size or format check.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The source document could not be read as a Word document.
    #[error("Document error: {0}")]
    Docx(String),

    /// Malformed XML inside a document package.
    #[error("XML error: {0}")]
    Xml(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`], used by front ends to pick exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input path missing
    NotFound,
    /// Corrupt container, missing entry, malformed metadata, unsafe entry path
    InvalidFormat,
    /// Oversized, corrupt or mismatched image/asset
    ValidationFailed,
    /// Everything else (I/O, permissions, document library failures)
    Generic,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::InvalidFormat(_)
            | Error::MissingEntry(_)
            | Error::InvalidJson { .. }
            | Error::UnsafePath { .. } => ErrorKind::InvalidFormat,
            Error::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Error::Io(_) | Error::Docx(_) | Error::Xml(_) | Error::Other(_) => ErrorKind::Generic,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            _ => Error::InvalidFormat(format!("corrupt ZIP container: {}", err)),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}
