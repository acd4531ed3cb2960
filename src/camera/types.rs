//! Camera types and data structures.

use std::fmt;
use std::path::PathBuf;

/// Information about an available camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index for selection
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.description)
    }
}

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Low resolution (320x240), the microscope's secondary mode
    pub const LOW: Resolution = Resolution {
        width: 320,
        height: 240,
    };

    /// Medium resolution (640x480), the microscope's native mode
    pub const MEDIUM: Resolution = Resolution {
        width: 640,
        height: 480,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::MEDIUM
    }
}

/// Channel order of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Red, green, blue (display order)
    Rgb,
    /// Blue, green, red
    Bgr,
}

/// A captured camera frame: 3 bytes per pixel, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data in the order given by `format`
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Channel order
    pub format: FrameFormat,
}

impl Frame {
    /// Create an RGB frame, checking that the buffer matches the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
        })
    }

    /// Get the number of bytes per pixel (always 3).
    pub fn bytes_per_pixel(&self) -> usize {
        3
    }

    /// Copy of this frame in RGB channel order.
    pub fn to_rgb(&self) -> Frame {
        match self.format {
            FrameFormat::Rgb => self.clone(),
            FrameFormat::Bgr => {
                let mut data = self.data.clone();
                for px in data.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                Frame {
                    data,
                    width: self.width,
                    height: self.height,
                    format: FrameFormat::Rgb,
                }
            }
        }
    }

    /// Smallest and largest channel value in the frame.
    pub fn pixel_range(&self) -> Option<(u8, u8)> {
        let min = self.data.iter().copied().min()?;
        let max = self.data.iter().copied().max()?;
        Some((min, max))
    }
}

/// Numeric properties exposed by a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureProperty {
    FrameWidth,
    FrameHeight,
    Fps,
    /// Number of frames the backend may queue internally
    BufferSize,
    /// Normalized to 0.0-1.0
    Brightness,
}

impl fmt::Display for CaptureProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureProperty::FrameWidth => "frame width",
            CaptureProperty::FrameHeight => "frame height",
            CaptureProperty::Fps => "frame rate",
            CaptureProperty::BufferSize => "buffer size",
            CaptureProperty::Brightness => "brightness",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during camera operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Failed to query cameras: {0}")]
    QueryFailed(String),

    #[error("Failed to open camera: {0}")]
    OpenFailed(String),

    #[error("Camera permission denied. Add your user to the 'video' group or grant camera access")]
    PermissionDenied,

    #[error("Failed to start camera stream: {0}")]
    StreamFailed(String),

    #[error("Failed to read frame: {0}")]
    ReadFailed(String),

    #[error("Frame buffer has {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },

    #[error("Image file '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
