use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Transient reference to one captured still image.
///
/// Owned by the active scan session and discarded when the session resets;
/// the bytes behind the URI are only read when the image is encoded for
/// transmission.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    uri: PathBuf,
}

impl CapturedImage {
    pub fn new(uri: impl Into<PathBuf>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn uri(&self) -> &Path {
        &self.uri
    }
}

/// Abstraction over whatever produces still images on request.
///
/// The physical device camera sits behind this seam; `FileImageSource` stands
/// in for it wherever a capture is just a file on disk.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Produce a reference to a freshly captured image.
    async fn capture(&self) -> Result<CapturedImage>;
}

/// Image source backed by a single file path.
pub struct FileImageSource {
    path: PathBuf,
}

impl FileImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    async fn capture(&self) -> Result<CapturedImage> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .with_context(|| format!("image source unavailable at {}", self.path.display()))?;
        if !metadata.is_file() {
            bail!("image source at {} is not a regular file", self.path.display());
        }
        Ok(CapturedImage::new(&self.path))
    }
}

/// Read a captured image and encode it as base64 for the wire.
///
/// The request declares `image/jpeg`, so bytes already carrying the JPEG SOI
/// marker pass through untouched; any other decodable raster format is
/// re-encoded to JPEG first.
pub async fn encode_jpeg_base64(image: &CapturedImage) -> Result<String> {
    let bytes = tokio::fs::read(image.uri())
        .await
        .with_context(|| format!("failed to read captured image at {}", image.uri().display()))?;
    debug!(bytes = bytes.len(), uri = %image.uri().display(), "encoding captured image");
    let jpeg = into_jpeg(bytes)?;
    Ok(BASE64.encode(jpeg))
}

fn into_jpeg(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.starts_with(&JPEG_SOI) {
        return Ok(bytes);
    }
    let decoded = image::load_from_memory(&bytes)
        .context("captured image is neither JPEG nor a decodable raster format")?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(decoded.to_rgb8())
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg)
        .context("failed to re-encode captured image as JPEG")?;
    Ok(out)
}
