//! Data model shared by extraction, sync and reconstruction.
//!
//! A document version is an ordered list of [`Block`]s, a [`StyleSheet`]
//! holding one [`Style`] per block, and a [`Manifest`] describing the
//! archive as a whole.

mod block;
mod manifest;
mod style;

pub use block::{Block, BlockKind, InlineFormat};
pub use manifest::{Manifest, FORMAT_VERSION, GENERATOR};
pub use style::{
    Alignment, DocumentDefaults, Style, StyleSheet, DEFAULT_FONT_NAME, DEFAULT_FONT_SIZE,
};
