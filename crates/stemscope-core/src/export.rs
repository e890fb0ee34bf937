//! Composite export and upload
//!
//! Encodes finished composites to JPEG/PNG on disk and posts them to an
//! image sharing service. Neither path retries on failure; the user
//! re-triggers manually.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compose::CompositeImage;

/// JPEG quality for exported composites
const JPEG_QUALITY: u8 = 100;

/// Export and upload failures
#[derive(Debug, Error)]
pub enum ExportError {
    /// Bitmap encoding failed
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// Could not write the output file
    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Upload requested without a configured client id
    #[error("upload service not configured (missing client id)")]
    UploadNotConfigured,

    /// The upload service refused the request
    #[error("upload rejected with HTTP {status}: {body}")]
    UploadRejected { status: u16, body: String },

    /// Network-level upload failure
    #[error("upload failed: {0}")]
    UploadTransport(String),

    /// The service reply carried no usable image link
    #[error("upload response had no image link: {0}")]
    BadUploadResponse(String),
}

/// Encode a composite as JPEG bytes
pub fn encode_jpeg(composite: &CompositeImage) -> Result<Vec<u8>, ExportError> {
    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgba8(composite.image.clone()).into_rgb8();
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(bytes)
}

/// Save a composite as a JPEG file
pub fn save_jpeg(composite: &CompositeImage, path: &Path) -> Result<(), ExportError> {
    let bytes = encode_jpeg(composite)?;
    std::fs::write(path, bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("saved composite to {:?}", path);
    Ok(())
}

/// Save a composite as a PNG file (alpha preserved)
pub fn save_png(composite: &CompositeImage, path: &Path) -> Result<(), ExportError> {
    composite.image.save(path)?;
    log::info!("saved composite to {:?}", path);
    Ok(())
}

/// Strip characters that don't belong in a file name
pub fn clean_file_stem(stem: &str) -> String {
    stem.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')'))
        .collect()
}

/// Default export path for an input: a JPEG next to the source file
pub fn default_export_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("composite");
    let file_name = format!("{}.jpg", clean_file_stem(stem));
    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Upload service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Image endpoint accepting a base64 form upload
    pub endpoint: String,
    /// Client id sent in the Authorization header
    pub client_id: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("https://api.imgur.com/3/image"),
            client_id: String::new(),
        }
    }
}

/// Posts composites to the configured sharing service
#[derive(Debug, Clone)]
pub struct Uploader {
    config: UploadConfig,
}

impl Uploader {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Upload JPEG bytes, returning the shared image URL
    pub fn upload(&self, jpeg: &[u8]) -> Result<String, ExportError> {
        if self.config.client_id.is_empty() {
            return Err(ExportError::UploadNotConfigured);
        }

        log::info!(
            "uploading {} bytes to {}",
            jpeg.len(),
            self.config.endpoint
        );

        let encoded = BASE64.encode(jpeg);
        let response = ureq::post(&self.config.endpoint)
            .set(
                "Authorization",
                &format!("Client-ID {}", self.config.client_id),
            )
            .send_form(&[("image", encoded.as_str()), ("type", "base64")])
            .map_err(|e| match e {
                ureq::Error::Status(status, response) => ExportError::UploadRejected {
                    status,
                    body: response.into_string().unwrap_or_default(),
                },
                other => ExportError::UploadTransport(other.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|e| ExportError::UploadTransport(e.to_string()))?;
        parse_upload_response(&body)
    }
}

/// Extract the image link from a service reply.
///
/// Accepts the JSON `data.link` shape; a bare URL body is taken as-is.
fn parse_upload_response(body: &str) -> Result<String, ExportError> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(link) = value
            .get("data")
            .and_then(|d| d.get("link"))
            .and_then(|l| l.as_str())
        {
            return Ok(link.to_string());
        }
    }
    let trimmed = body.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(trimmed.to_string());
    }
    Err(ExportError::BadUploadResponse(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::CompositeBuilder;
    use crate::types::TrackSpec;
    use image::RgbaImage;

    fn test_composite() -> CompositeImage {
        let mut builder = CompositeBuilder::new(32);
        builder.push_track(
            TrackSpec::mono("Vocals"),
            RgbaImage::from_pixel(32, 16, image::Rgba([192, 192, 192, 255])),
        );
        builder.finish(None)
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let bytes = encode_jpeg(&test_composite()).unwrap();
        assert!(bytes.len() > 2);
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]); // JPEG SOI
    }

    #[test]
    fn test_save_jpeg_writes_file() {
        let dir = std::env::temp_dir().join("stemscope-export-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.jpg");
        save_jpeg(&test_composite(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_clean_file_stem() {
        assert_eq!(clean_file_stem("Take Five (live)"), "Take Five (live)");
        assert_eq!(clean_file_stem("a/b\\c:d*e?"), "abcde");
    }

    #[test]
    fn test_default_export_path() {
        let path = default_export_path(Path::new("/songs/take:five.ogg"));
        assert_eq!(path, Path::new("/songs/takefive.jpg"));
    }

    #[test]
    fn test_upload_requires_client_id() {
        let uploader = Uploader::new(UploadConfig::default());
        assert!(matches!(
            uploader.upload(&[0xFF, 0xD8]),
            Err(ExportError::UploadNotConfigured)
        ));
    }

    #[test]
    fn test_parse_upload_response_json() {
        let body = r#"{"data":{"link":"https://i.example.com/abc.jpg"},"success":true}"#;
        assert_eq!(
            parse_upload_response(body).unwrap(),
            "https://i.example.com/abc.jpg"
        );
    }

    #[test]
    fn test_parse_upload_response_bare_url() {
        assert_eq!(
            parse_upload_response("https://i.example.com/xyz.jpg\n").unwrap(),
            "https://i.example.com/xyz.jpg"
        );
    }

    #[test]
    fn test_parse_upload_response_garbage() {
        assert!(matches!(
            parse_upload_response("oops"),
            Err(ExportError::BadUploadResponse(_))
        ));
    }
}
