//! Reading picked image files and turning them into previewable assets.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use shared::{
    media::{inspect_image, ImageInfo},
    protocol::AssetUpload,
    validation::{max_size_message, LOGO_MAX_BYTES, SCREENSHOT_MAX_BYTES},
};

use crate::error::ClientError;

/// A picked image file held in memory, with a data URL for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub info: ImageInfo,
    pub preview: String,
}

impl AssetFile {
    /// Fails with a user-facing message when the bytes are not a PNG or JPEG image.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, String> {
        let file_name = file_name.into();
        let info = inspect_image(&bytes).map_err(|e| format!("{file_name}: {e}"))?;
        let preview = data_url(info.kind.mime_type(), &bytes);
        Ok(Self {
            file_name,
            bytes,
            info,
            preview,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_upload(&self) -> AssetUpload {
        AssetUpload {
            file_name: self.file_name.clone(),
            content_type: self.info.kind.mime_type().to_string(),
            data_b64: STANDARD.encode(&self.bytes),
        }
    }
}

pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Outcome of picking screenshots: the accepted files plus one message covering
/// any that were dropped.
#[derive(Debug, Default)]
pub struct ScreenshotSelection {
    pub files: Vec<AssetFile>,
    pub error: Option<String>,
}

pub async fn read_file(path: &Path) -> Result<(String, Vec<u8>), ClientError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    Ok((file_name, bytes))
}

pub async fn pick_logo(path: &Path) -> Result<AssetFile, String> {
    let (file_name, bytes) = read_file(path).await.map_err(|e| e.to_string())?;
    if bytes.len() > LOGO_MAX_BYTES {
        return Err(max_size_message(LOGO_MAX_BYTES, false));
    }
    AssetFile::from_bytes(file_name, bytes)
}

/// Reads every path concurrently; results are reported together and keep selection order.
pub async fn pick_screenshots(paths: &[PathBuf]) -> ScreenshotSelection {
    let reads = join_all(paths.iter().map(|path| read_file(path))).await;

    let mut selection = ScreenshotSelection::default();
    let mut oversized = false;
    let mut rejected = Vec::new();
    for read in reads {
        match read {
            Ok((_, bytes)) if bytes.len() > SCREENSHOT_MAX_BYTES => oversized = true,
            Ok((file_name, bytes)) => match AssetFile::from_bytes(file_name, bytes) {
                Ok(file) => selection.files.push(file),
                Err(message) => rejected.push(message),
            },
            Err(err) => rejected.push(err.to_string()),
        }
    }

    if oversized {
        rejected.insert(0, max_size_message(SCREENSHOT_MAX_BYTES, true));
    }
    if !rejected.is_empty() {
        selection.error = Some(rejected.join("; "));
    }
    if selection.error.is_some() {
        tracing::debug!(
            accepted = selection.files.len(),
            dropped = paths.len() - selection.files.len(),
            "screenshot selection trimmed"
        );
    }
    selection
}

#[cfg(test)]
#[path = "tests/preview_tests.rs"]
mod tests;
