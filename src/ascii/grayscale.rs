//! Luminance conversion using the ITU-R BT.601 weights.

use crate::camera::{Frame, FrameFormat};

/// Y = 0.299 R + 0.587 G + 0.114 B, in integer math scaled by 1000.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Convert a frame to one luminance byte per pixel.
///
/// Honors the frame's channel order, so BGR frames straight from a capture
/// backend produce the same values as their RGB equivalents.
pub fn to_grayscale(frame: &Frame) -> Vec<u8> {
    let pixels = frame.data.chunks_exact(3);
    match frame.format {
        FrameFormat::Rgb => pixels.map(|p| luminance(p[0], p[1], p[2])).collect(),
        FrameFormat::Bgr => pixels.map(|p| luminance(p[2], p[1], p[0])).collect(),
    }
}
