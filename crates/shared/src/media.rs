//! Content sniffing for uploaded images.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
        }
    }

    /// Base name of `file_name` with an extension that agrees with the sniffed content.
    pub fn normalize_file_name(self, file_name: &str) -> String {
        let base = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name)
            .trim();
        let (stem, extension) = match base.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, extension),
            _ => (base, ""),
        };
        let agrees = match self {
            ImageKind::Png => extension.eq_ignore_ascii_case("png"),
            ImageKind::Jpeg => {
                extension.eq_ignore_ascii_case("jpg") || extension.eq_ignore_ascii_case("jpeg")
            }
        };
        if agrees {
            base.to_string()
        } else if stem.is_empty() {
            format!("file.{}", self.extension())
        } else {
            format!("{stem}.{}", self.extension())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("only PNG and JPEG images are accepted")]
    UnsupportedFormat,
    #[error("image could not be decoded: {0}")]
    Undecodable(String),
}

/// Reads format and dimensions from the image header without decoding pixels.
pub fn inspect_image(bytes: &[u8]) -> Result<ImageInfo, MediaError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| MediaError::Undecodable(e.to_string()))?;
    let kind = match reader.format() {
        Some(ImageFormat::Png) => ImageKind::Png,
        Some(ImageFormat::Jpeg) => ImageKind::Jpeg,
        _ => return Err(MediaError::UnsupportedFormat),
    };
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| MediaError::Undecodable(e.to_string()))?;
    Ok(ImageInfo {
        kind,
        width,
        height,
    })
}
