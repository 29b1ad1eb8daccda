//! Image handling: uploaded bytes → `DynamicImage` → base64 PNG `ImageData`.
//!
//! Uploads arrive as PNG, JPEG or WebP straight from a phone camera or a
//! scanner. Decoding first rejects files that are not images before any
//! tokens are spent, and re-encoding as PNG gives every provider the same
//! lossless input regardless of what the client sent.

use crate::error::Doc2JsonError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Decode uploaded bytes, sniffing the format from the content.
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, Doc2JsonError> {
    let img = image::load_from_memory(bytes).map_err(|e| Doc2JsonError::ImageDecodeFailed {
        detail: e.to_string(),
    })?;
    debug!("Decoded upload: {}x{} px", img.width(), img.height());
    Ok(img)
}

/// Encode a decoded document image as a base64 PNG ready for the VLM API.
///
/// `detail: "high"` keeps small print (ID numbers, dates) legible to
/// tiling models; `low` forces a single overview tile.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, Doc2JsonError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| Doc2JsonError::ImageEncodeFailed {
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
