//! Traits the session uses to reach the video capture subsystem.

use super::types::{CameraError, CaptureProperty, Frame};

/// Opens capture sources by index.
pub trait CaptureBackend {
    type Source: CaptureSource;

    /// Open the video source at `index` and start streaming from it.
    fn open(&mut self, index: u32) -> Result<Self::Source, CameraError>;
}

/// An open capture resource.
pub trait CaptureSource {
    /// Set a numeric property. Returns whatever the backend reports;
    /// `false` means the backend rejected the request.
    fn set(&mut self, property: CaptureProperty, value: f64) -> bool;

    /// Current value of a property, or `None` if the backend does not expose it.
    fn get(&self, property: CaptureProperty) -> Option<f64>;

    /// Block until the next frame is available.
    fn read(&mut self) -> Result<Frame, CameraError>;

    /// Stop streaming and free the underlying device.
    fn release(&mut self);
}
