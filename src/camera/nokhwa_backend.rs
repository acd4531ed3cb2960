//! Capture backend built on nokhwa's native camera APIs.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, ControlValueDescription, ControlValueSetter,
    FrameFormat as NokhwaFrameFormat, KnownCameraControl, RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera;

use super::backend::{CaptureBackend, CaptureSource};
use super::frame_utils::convert_to_rgb;
use super::types::{CameraError, CaptureProperty, Frame, Resolution};

/// Opens cameras through nokhwa, requesting a format close to `resolution` and `fps`.
#[derive(Debug, Clone)]
pub struct NokhwaBackend {
    resolution: Resolution,
    fps: u32,
}

impl NokhwaBackend {
    pub fn new(resolution: Resolution, fps: u32) -> Self {
        Self { resolution, fps }
    }
}

impl Default for NokhwaBackend {
    fn default() -> Self {
        Self::new(Resolution::default(), 30)
    }
}

impl CaptureBackend for NokhwaBackend {
    type Source = NokhwaSource;

    fn open(&mut self, index: u32) -> Result<NokhwaSource, CameraError> {
        let camera_index = CameraIndex::Index(index);
        let mut camera = open_camera_with_fallback(&camera_index, self.resolution, self.fps)?;

        camera
            .open_stream()
            .map_err(|e| CameraError::StreamFailed(e.to_string()))?;

        let res = camera.resolution();
        log::info!(
            "Opened video device {} at {}x{} @ {} fps",
            index,
            res.width(),
            res.height(),
            camera.frame_rate()
        );

        Ok(NokhwaSource {
            camera,
            buffer_size: None,
        })
    }
}

/// Try to open a camera with multiple format fallback strategies.
fn open_camera_with_fallback(
    index: &CameraIndex,
    resolution: Resolution,
    fps: u32,
) -> Result<Camera, CameraError> {
    let target = nokhwa::utils::Resolution::new(resolution.width, resolution.height);

    // Order of preference:
    // 1. Closest match with MJPEG (what most UVC microscopes stream)
    // 2. Closest match with YUYV (uncompressed fallback)
    // 3. Highest resolution available (let the camera decide format)
    let format_attempts = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            target,
            NokhwaFrameFormat::MJPEG,
            fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            target,
            NokhwaFrameFormat::YUYV,
            fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;

    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => {
                log::debug!("Format request failed for {:?}: {}", index, e);
                last_error = Some(e);
            }
        }
    }

    let msg = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no format accepted".to_string());
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") {
        Err(CameraError::PermissionDenied)
    } else {
        Err(CameraError::OpenFailed(msg))
    }
}

/// Whether `width` x `height` is already the active resolution, in which
/// case the stream is left running.
fn is_current_resolution(current: nokhwa::utils::Resolution, width: u32, height: u32) -> bool {
    current.width() == width && current.height() == height
}

/// An open nokhwa camera with its stream running.
pub struct NokhwaSource {
    camera: Camera,
    /// Last requested queue depth; nokhwa sizes its own buffers
    buffer_size: Option<u32>,
}

impl std::fmt::Debug for NokhwaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NokhwaSource")
            .field("resolution", &self.camera.resolution())
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

impl NokhwaSource {
    /// Apply a new resolution, restarting the stream around the change.
    fn apply_resolution(&mut self, width: u32, height: u32) -> bool {
        if is_current_resolution(self.camera.resolution(), width, height) {
            return true;
        }

        let was_streaming = self.camera.is_stream_open();
        if was_streaming {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("Failed to stop stream for resolution change: {}", e);
            }
        }

        let result = self
            .camera
            .set_resolution(nokhwa::utils::Resolution::new(width, height));
        if let Err(e) = &result {
            log::debug!("Resolution {}x{} rejected: {}", width, height, e);
        }

        if was_streaming {
            if let Err(e) = self.camera.open_stream() {
                log::warn!("Failed to restart stream after resolution change: {}", e);
                return false;
            }
        }

        result.is_ok()
    }

    /// Set an integer-range control from a normalized 0.0-1.0 value.
    fn set_normalized_control(&mut self, control: KnownCameraControl, value: f64) -> bool {
        let description = match self.camera.camera_control(control) {
            Ok(c) => c.description().clone(),
            Err(e) => {
                log::debug!("Control {:?} unavailable: {}", control, e);
                return false;
            }
        };

        let target = match description {
            ControlValueDescription::IntegerRange { min, max, .. } => {
                min + ((max - min) as f64 * value.clamp(0.0, 1.0)).round() as i64
            }
            other => {
                log::debug!("Control {:?} is not an integer range: {:?}", control, other);
                return false;
            }
        };

        match self
            .camera
            .set_camera_control(control, ControlValueSetter::Integer(target))
        {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Setting {:?} to {} failed: {}", control, target, e);
                false
            }
        }
    }

    fn normalized_control(&self, control: KnownCameraControl) -> Option<f64> {
        let control = self.camera.camera_control(control).ok()?;
        match control.description() {
            ControlValueDescription::IntegerRange {
                min, max, value, ..
            } if max > min => Some((*value - *min) as f64 / (*max - *min) as f64),
            _ => None,
        }
    }
}

impl CaptureSource for NokhwaSource {
    fn set(&mut self, property: CaptureProperty, value: f64) -> bool {
        match property {
            CaptureProperty::FrameWidth => {
                let height = self.camera.resolution().height();
                self.apply_resolution(value as u32, height)
            }
            CaptureProperty::FrameHeight => {
                let width = self.camera.resolution().width();
                self.apply_resolution(width, value as u32)
            }
            CaptureProperty::Fps => self.camera.set_frame_rate(value as u32).is_ok(),
            CaptureProperty::BufferSize => {
                // nokhwa does not expose the driver queue depth
                self.buffer_size = Some(value as u32);
                log::debug!("Buffer size {} requested but not supported by nokhwa", value);
                false
            }
            CaptureProperty::Brightness => {
                self.set_normalized_control(KnownCameraControl::Brightness, value)
            }
        }
    }

    fn get(&self, property: CaptureProperty) -> Option<f64> {
        match property {
            CaptureProperty::FrameWidth => Some(self.camera.resolution().width() as f64),
            CaptureProperty::FrameHeight => Some(self.camera.resolution().height() as f64),
            CaptureProperty::Fps => Some(self.camera.frame_rate() as f64),
            CaptureProperty::BufferSize => None,
            CaptureProperty::Brightness => self.normalized_control(KnownCameraControl::Brightness),
        }
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::ReadFailed(e.to_string()))?;
        convert_to_rgb(&buffer)
    }

    fn release(&mut self) {
        if self.camera.is_stream_open() {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {}", e);
            }
        }
    }
}
