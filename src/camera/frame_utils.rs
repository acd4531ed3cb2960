//! Frame conversion and image file I/O.

use nokhwa::pixel_format::RgbFormat;
use std::path::Path;

use super::types::{CameraError, Frame, FrameFormat};

/// Convert a nokhwa buffer to an RGB Frame.
///
/// nokhwa's `decode_image` handles the camera's native format (MJPEG, YUYV,
/// NV12, ...) and always yields RGB.
pub fn convert_to_rgb(buffer: &nokhwa::Buffer) -> Result<Frame, CameraError> {
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::ReadFailed(format!("decode failed: {}", e)))?;
    let resolution = buffer.resolution();

    Ok(Frame {
        data: decoded.into_raw(),
        width: resolution.width(),
        height: resolution.height(),
        format: FrameFormat::Rgb,
    })
}

/// Write a frame to disk. The image format follows the file extension.
pub fn save_frame(frame: &Frame, path: &Path) -> Result<(), CameraError> {
    let rgb = frame.to_rgb();
    let expected = rgb.width as usize * rgb.height as usize * 3;
    let actual = rgb.data.len();

    let image = image::RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
        .ok_or(CameraError::InvalidFrame { expected, actual })?;

    image.save(path).map_err(|source| CameraError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an image file into an RGB frame.
pub fn load_frame(path: &Path) -> Result<Frame, CameraError> {
    let image = image::open(path)
        .map_err(|source| CameraError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    let (width, height) = image.dimensions();
    Frame::from_rgb(image.into_raw(), width, height)
}
