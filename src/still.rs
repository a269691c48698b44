//! Still-image export: one JPEG plus data URL per successful capture.

use crate::source::VideoFrame;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};

/// JPEG quality for captured frames (matches a 0.92 canvas export).
pub const JPEG_QUALITY: u8 = 92;

/// Encoded capture result handed to the embedding caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillImage {
    pub jpeg: Vec<u8>,
    pub data_url: String,
}

/// Encode a raw RGB frame as JPEG and wrap it in a `data:` URL.
///
/// # Errors
///
/// Returns an error if the frame's byte length does not match its declared
/// dimensions or if JPEG encoding fails.
pub fn encode_frame(frame: &VideoFrame) -> Result<StillImage> {
    let expected = (frame.width as usize) * (frame.height as usize) * 3;
    if frame.rgb.len() != expected {
        bail!(
            "frame byte length {} does not match {}x{} rgb",
            frame.rgb.len(),
            frame.width,
            frame.height
        );
    }
    let buffer: ImageBuffer<Rgb<u8>, _> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.rgb.as_slice())
            .context("frame dimensions rejected by image buffer")?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&buffer)
        .context("jpeg encoding failed")?;

    let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg));
    Ok(StillImage { jpeg, data_url })
}
