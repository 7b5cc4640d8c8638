//! Image validation for embedded pictures.
//!
//! Every image pulled out of a source document is checked before it is
//! stored: size limit, a supported extension, a structurally well-formed
//! payload, and agreement between the extension and the actual format.

use thiserror::Error;

/// Largest image accepted during extraction (10 MiB).
pub const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

/// Raster formats accepted as assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Webp,
}

impl ImageFormat {
    /// Format implied by a file extension (case-insensitive, no dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" | "jpe" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Detect the format from magic bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            Some(ImageFormat::Tiff)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Webp => "WEBP",
        }
    }

    /// MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded image metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// Height for a given display width, preserving the aspect ratio.
    pub fn scaled_height(&self, width: u64) -> u64 {
        if self.width == 0 {
            return width;
        }
        width * u64::from(self.height) / u64::from(self.width)
    }
}

/// Why an image was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    #[error("image size {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("unsupported image extension '.{extension}'")]
    Unsupported { extension: String },

    #[error("format mismatch: extension suggests {expected} but content is {actual}")]
    FormatMismatch {
        expected: ImageFormat,
        actual: ImageFormat,
    },

    #[error("corrupted or invalid image data ({0})")]
    Corrupt(String),
}

/// Validate an image payload against its claimed extension.
pub fn validate(data: &[u8], size: u64, extension: &str, max_size: u64) -> Result<ImageInfo, ImageRejection> {
    if size > max_size || data.len() as u64 > max_size {
        return Err(ImageRejection::TooLarge {
            size: size.max(data.len() as u64),
            max: max_size,
        });
    }

    let expected = ImageFormat::from_extension(extension).ok_or_else(|| ImageRejection::Unsupported {
        extension: extension.to_string(),
    })?;

    let info = inspect(data)?;
    if info.format != expected {
        return Err(ImageRejection::FormatMismatch {
            expected,
            actual: info.format,
        });
    }

    Ok(info)
}

/// Decode enough of an image to confirm it is well formed and read its dimensions.
pub fn inspect(data: &[u8]) -> Result<ImageInfo, ImageRejection> {
    let format = ImageFormat::detect(data)
        .ok_or_else(|| ImageRejection::Corrupt("unrecognized image data".to_string()))?;

    let dims = match format {
        ImageFormat::Png => png_dimensions(data),
        ImageFormat::Jpeg => jpeg_dimensions(data),
        ImageFormat::Gif => gif_dimensions(data),
        ImageFormat::Bmp => bmp_dimensions(data),
        ImageFormat::Tiff => tiff_dimensions(data),
        ImageFormat::Webp => webp_dimensions(data),
    };

    match dims {
        Some((width, height)) if width > 0 && height > 0 => Ok(ImageInfo {
            format,
            width,
            height,
        }),
        _ => Err(ImageRejection::Corrupt(format!("malformed {} data", format))),
    }
}

fn be16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn le16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn be32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le24(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 3)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if be32(data, 8)? != 13 || data.get(12..16)? != b"IHDR" {
        return None;
    }
    let n = data.len();
    // signature + IHDR chunk + IEND chunk
    if n < 45 || &data[n - 8..n - 4] != b"IEND" {
        return None;
    }
    Some((be32(data, 16)?, be32(data, 20)?))
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let tail_start = data.len().saturating_sub(1024);
    if !data[tail_start..].windows(2).any(|w| w == [0xFF, 0xD9]) {
        return None;
    }

    let mut i = 2;
    while i < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        while data.get(i) == Some(&0xFF) {
            i += 1;
        }
        let marker = *data.get(i)?;
        match marker {
            0xD9 | 0xDA => return None,
            0x01 | 0xD0..=0xD7 => {
                i += 1;
                continue;
            }
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be16(data, i + 4)?;
                let width = be16(data, i + 6)?;
                return Some((u32::from(width), u32::from(height)));
            }
            _ => {}
        }
        let len = usize::from(be16(data, i + 1)?);
        if len < 2 {
            return None;
        }
        i += 1 + len;
    }
    None
}

fn gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 14 || data.last() != Some(&0x3B) {
        return None;
    }
    Some((u32::from(le16(data, 6)?), u32::from(le16(data, 8)?)))
}

fn bmp_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let pixel_offset = le32(data, 10)? as usize;
    if pixel_offset >= data.len() {
        return None;
    }
    match le32(data, 14)? {
        12 => Some((u32::from(le16(data, 18)?), u32::from(le16(data, 20)?))),
        40 | 52 | 56 | 64 | 108 | 124 => {
            let width = le32(data, 18)? as i32;
            let height = le32(data, 22)? as i32;
            Some((width.unsigned_abs(), height.unsigned_abs()))
        }
        _ => None,
    }
}

fn tiff_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let little = data.starts_with(b"II");
    let read16 = |at: usize| if little { le16(data, at) } else { be16(data, at) };
    let read32 = |at: usize| if little { le32(data, at) } else { be32(data, at) };

    let ifd = read32(4)? as usize;
    let count = usize::from(read16(ifd)?);
    let (mut width, mut height) = (None, None);
    for entry in 0..count {
        let at = ifd + 2 + entry * 12;
        let tag = read16(at)?;
        let value = match read16(at + 2)? {
            3 => u32::from(read16(at + 8)?),
            4 => read32(at + 8)?,
            _ => continue,
        };
        match tag {
            256 => width = Some(value),
            257 => height = Some(value),
            _ => {}
        }
    }
    Some((width?, height?))
}

fn webp_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let riff_size = le32(data, 4)? as usize;
    if riff_size + 8 > data.len() {
        return None;
    }
    match data.get(12..16)? {
        b"VP8 " => {
            if data.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            let width = u32::from(le16(data, 26)? & 0x3FFF);
            let height = u32::from(le16(data, 28)? & 0x3FFF);
            Some((width, height))
        }
        b"VP8L" => {
            if *data.get(20)? != 0x2F {
                return None;
            }
            let bits = le32(data, 21)?;
            Some((1 + (bits & 0x3FFF), 1 + ((bits >> 14) & 0x3FFF)))
        }
        b"VP8X" => Some((1 + le24(data, 24)?, 1 + le24(data, 27)?)),
        _ => None,
    }
}
