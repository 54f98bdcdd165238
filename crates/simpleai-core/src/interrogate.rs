//! Image interrogation: turning user-supplied images into prompts.
//!
//! Images arrive either as remote URLs or as `data:image/...` URIs. Local
//! files are encoded into data URIs before being sent for captioning.

use crate::remote::{ImageCaptioning, RemoteError};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterrogateError {
    /// Not an http(s) URL or an image data URI.
    #[error("Unsupported image reference: {0}")]
    UnsupportedImage(String),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Whether `image` is something the captioning endpoint accepts.
pub fn is_supported_image_ref(image: &str) -> bool {
    let image = image.trim();
    image.starts_with("http://")
        || image.starts_with("https://")
        || (image.starts_with("data:image/") && image.contains(";base64,"))
}

/// Caption one image.
pub async fn interrogate(
    captioner: &dyn ImageCaptioning,
    image: &str,
) -> Result<String, InterrogateError> {
    if !is_supported_image_ref(image) {
        return Err(InterrogateError::UnsupportedImage(abbreviate(image)));
    }
    let caption = captioner.interrogate(image.trim()).await?;
    log::debug!("Captioned {}: {}", abbreviate(image), caption);
    Ok(caption)
}

/// Read a local image file into a base64 data URI.
///
/// The MIME type is guessed from the file extension; anything that does
/// not look like an image is rejected.
pub fn image_ref_from_path(path: &Path) -> Result<String, InterrogateError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(InterrogateError::UnsupportedImage(format!(
            "{} ({})",
            path.display(),
            mime
        )));
    }

    let bytes = std::fs::read(path)?;
    Ok(format!(
        "data:{};base64,{}",
        mime.essence_str(),
        BASE64_STANDARD.encode(bytes)
    ))
}

/// Shorten long references (data URIs mostly) for logs and display.
pub fn abbreviate(image: &str) -> String {
    const MAX: usize = 48;
    let image = image.trim();
    if image.chars().count() <= MAX {
        return image.to_string();
    }
    let head: String = image.chars().take(MAX).collect();
    format!("{head}...")
}
