//! Frame payload decoding

use bytes::Bytes;
use tracing::trace;

use crate::types::{DecodedImage, ImageFormat};
use crate::{Result, SyncError};

/// Decode an encoded frame into RGBA8.
///
/// With no negotiated format the encoding is guessed from the payload's magic
/// bytes.
pub fn decode_image(bytes: &[u8], format: Option<ImageFormat>) -> Result<DecodedImage> {
    if bytes.is_empty() {
        return Err(SyncError::decode_failed(format, "empty payload"));
    }

    let image = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format.into()),
        None => image::load_from_memory(bytes),
    }
    .map_err(|e| SyncError::decode_failed(format, e.to_string()))?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    trace!(width, height, encoded_len = bytes.len(), "Decoded frame");

    Ok(DecodedImage::new(width, height, rgba.into_raw()))
}

/// Decode on the blocking pool so the drive loop keeps ticking.
pub async fn decode_off_thread(bytes: Bytes, format: Option<ImageFormat>) -> Result<DecodedImage> {
    tokio::task::spawn_blocking(move || decode_image(&bytes, format))
        .await
        .map_err(|e| SyncError::decode_failed(format, format!("decode task failed: {e}")))?
}
