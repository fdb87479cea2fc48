//! # Frame Encoding
//!
//! Turns captured frames into the payload the verifier expects: a lossy JPEG
//! wrapped in a base64 data URL.
//!
//! ```text
//! data:image/jpeg;base64,/9j/4AAQSkZJRgABAQAAAQABAAD...
//! ```

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use crate::capture::Frame;

/// Prefix of every encoded frame payload.
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encode a frame as JPEG bytes.
///
/// # Arguments
/// - `frame`: Captured RGB frame; must have non-zero dimensions
/// - `quality`: JPEG quality, clamped to 1-100
///
/// # Errors
/// - The frame has no pixels
/// - The JPEG encoder fails
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    if frame.is_empty() {
        return Err(anyhow!(
            "cannot encode empty frame ({}x{})",
            frame.width(),
            frame.height()
        ));
    }

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    let image = frame.image();
    encoder.encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)?;
    Ok(bytes)
}

/// Encode a frame as a `data:image/jpeg;base64,...` URL.
///
/// # Example
/// ```ignore
/// let url = encode_data_url(&frame, 80)?;
/// let message = ClientMessage::ProcessFrame { frame: url };
/// ```
pub fn encode_data_url(frame: &Frame, quality: u8) -> Result<String> {
    let jpeg = encode_jpeg(frame, quality)?;
    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    url.push_str(DATA_URL_PREFIX);
    general_purpose::STANDARD.encode_string(&jpeg, &mut url);
    Ok(url)
}

/// Decode the JPEG bytes back out of a data URL produced by [`encode_data_url`].
#[cfg(test)]
fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| anyhow!("not a JPEG data URL"))?;
    Ok(general_purpose::STANDARD.decode(payload)?)
}
