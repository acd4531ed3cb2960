//! The microscope device session.
//!
//! A [`Microscope`] owns one USB device handle and one capture source while
//! connected and nothing while disconnected. Every operation attempts its
//! backend call exactly once and reports failure through [`MicroscopeError`].

use std::collections::BTreeMap;

use crate::camera::{CaptureBackend, CaptureProperty, CaptureSource, Frame, NokhwaBackend, Resolution};
use crate::error::MicroscopeError;
use crate::usb::{DeviceIdentity, RusbBackend, UsbBackend, UsbDevice, UsbError};

/// Genesys Logic
pub const DEFAULT_VENDOR_ID: u16 = 0x05e3;
/// Digital Microscope
pub const DEFAULT_PRODUCT_ID: u16 = 0xf12a;
/// Video device index the microscope enumerates at
pub const DEFAULT_VIDEO_INDEX: u32 = 4;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_BUFFER_SIZE: u32 = 1;

/// Size of the scratch buffer for device-to-host control transfers.
pub const CONTROL_READ_LENGTH: usize = 64;

/// Fixed parameters of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct MicroscopeSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    pub video_index: u32,
    pub resolution: Resolution,
    pub fps: u32,
    pub buffer_size: u32,
}

impl Default for MicroscopeSettings {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            video_index: DEFAULT_VIDEO_INDEX,
            resolution: Resolution::default(),
            fps: DEFAULT_FPS,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Map a 0-255 brightness level onto the backend's 0.0-1.0 range.
pub fn normalize_brightness(level: u8) -> f64 {
    level as f64 / 255.0
}

/// Accept a brightness level only if it lies in 0-255.
pub fn validate_brightness(level: i32) -> Result<u8, MicroscopeError> {
    u8::try_from(level).map_err(|_| MicroscopeError::InvalidParameter {
        name: "brightness",
        value: level as i64,
        range: "0-255",
    })
}

/// Resources held while connected. Both are present or neither is.
struct Connection<D, S> {
    device: D,
    identity: DeviceIdentity,
    source: S,
}

/// A session with one USB microscope.
pub struct Microscope<U: UsbBackend = RusbBackend, C: CaptureBackend = NokhwaBackend> {
    usb: U,
    capture: C,
    settings: MicroscopeSettings,
    connection: Option<Connection<U::Device, C::Source>>,
    brightness: Option<u8>,
}

impl Microscope {
    /// Session using libusb for device access and nokhwa for capture.
    pub fn new(settings: MicroscopeSettings) -> Self {
        let capture = NokhwaBackend::new(settings.resolution, settings.fps);
        Self::with_backends(settings, RusbBackend::default(), capture)
    }
}

impl<U: UsbBackend, C: CaptureBackend> std::fmt::Debug for Microscope<U, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Microscope")
            .field("settings", &self.settings)
            .field("identity", &self.identity())
            .field("brightness", &self.brightness)
            .finish_non_exhaustive()
    }
}

impl<U: UsbBackend, C: CaptureBackend> Microscope<U, C> {
    /// Session using the given backends. Nothing is opened until [`connect`](Self::connect).
    pub fn with_backends(settings: MicroscopeSettings, usb: U, capture: C) -> Self {
        Self {
            usb,
            capture,
            settings,
            connection: None,
            brightness: None,
        }
    }

    pub fn settings(&self) -> &MicroscopeSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Descriptor data read at connect time.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.connection.as_ref().map(|c| &c.identity)
    }

    /// Last brightness level the backend accepted during this connection.
    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    /// Locate the microscope, open its video source and configure it.
    ///
    /// Connecting while already connected releases the current resources
    /// first and opens them again.
    ///
    /// # Errors
    /// * `MicroscopeError::DeviceNotFound` - no USB device with the configured ids
    /// * `MicroscopeError::PermissionDenied` - USB enumeration was refused
    /// * `MicroscopeError::CaptureUnavailable` - the video source could not be opened
    pub fn connect(&mut self) -> Result<&DeviceIdentity, MicroscopeError> {
        if self.is_connected() {
            log::info!("Already connected, reopening microscope");
            self.disconnect();
        }

        let MicroscopeSettings {
            vendor_id,
            product_id,
            video_index,
            ..
        } = self.settings;

        let device = match self.usb.find(vendor_id, product_id) {
            Ok(Some(device)) => device,
            Ok(None) => {
                log::warn!("Microscope not found ({:04x}:{:04x})", vendor_id, product_id);
                return Err(MicroscopeError::DeviceNotFound {
                    vendor_id,
                    product_id,
                });
            }
            Err(UsbError::PermissionDenied) => return Err(MicroscopeError::PermissionDenied),
            Err(e) => {
                log::warn!("USB lookup failed: {}", e);
                return Err(MicroscopeError::BackendOperationFailed(e.to_string()));
            }
        };

        let identity = device.identity();
        log::info!("Connected device: {}", identity);

        let mut source = match self.capture.open(video_index) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("Cannot open video device {}: {}", video_index, e);
                if let Err(release_err) = device.release() {
                    log::warn!("Error releasing USB resources: {}", release_err);
                }
                return Err(MicroscopeError::CaptureUnavailable {
                    index: video_index,
                    reason: e.to_string(),
                });
            }
        };

        self.configure(&mut source);

        log::info!("Microscope connected successfully");
        let connection = self.connection.insert(Connection {
            device,
            identity,
            source,
        });
        Ok(&connection.identity)
    }

    /// Apply frame size, rate and a one-frame buffer so reads return the newest frame.
    fn configure(&self, source: &mut C::Source) {
        let requests = [
            (CaptureProperty::FrameWidth, self.settings.resolution.width as f64),
            (CaptureProperty::FrameHeight, self.settings.resolution.height as f64),
            (CaptureProperty::Fps, self.settings.fps as f64),
            (CaptureProperty::BufferSize, self.settings.buffer_size as f64),
        ];

        for (property, value) in requests {
            if !source.set(property, value) {
                log::debug!("Capture backend ignored {} = {}", property, value);
            }
        }
    }

    /// Release the capture source, then the USB handle.
    ///
    /// Always leaves the session disconnected. USB release failures are logged.
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.source.release();
            if let Err(e) = connection.device.release() {
                log::warn!("Error releasing USB resources: {}", e);
            }
            log::info!("Microscope disconnected");
        }
        self.brightness = None;
    }

    /// Device information as named fields, empty when disconnected.
    pub fn device_info(&self) -> BTreeMap<&'static str, String> {
        self.identity()
            .map(DeviceIdentity::to_info_map)
            .unwrap_or_default()
    }

    /// Set the illumination/brightness level (0-255).
    ///
    /// Out-of-range levels and disconnected sessions are rejected without
    /// contacting any backend. Otherwise the backend's own verdict is returned;
    /// some microscopes accept the request but need a manual adjustment.
    pub fn set_brightness(&mut self, level: i32) -> Result<(), MicroscopeError> {
        let level = validate_brightness(level)?;
        let connection = self.connection.as_mut().ok_or(MicroscopeError::NotConnected)?;

        if connection
            .source
            .set(CaptureProperty::Brightness, normalize_brightness(level))
        {
            log::info!("Brightness set: {}", level);
            self.brightness = Some(level);
            Ok(())
        } else {
            log::warn!("Brightness setting failed - manual adjustment may be required");
            Err(MicroscopeError::BackendOperationFailed(
                "brightness rejected by capture backend".to_string(),
            ))
        }
    }

    /// Read one frame exactly as the backend decoded it.
    pub fn capture_frame(&mut self) -> Result<Frame, MicroscopeError> {
        let connection = self.connection.as_mut().ok_or(MicroscopeError::NotConnected)?;

        connection.source.read().map_err(|e| {
            log::warn!("Frame capture failed: {}", e);
            MicroscopeError::BackendOperationFailed(e.to_string())
        })
    }

    /// Issue one vendor control transfer.
    ///
    /// With a non-empty payload the transfer goes host-to-device; otherwise
    /// 64 bytes are requested device-to-host and discarded. Only the success
    /// of the transfer is reported.
    pub fn send_control_command(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: Option<&[u8]>,
    ) -> Result<(), MicroscopeError> {
        let connection = self.connection.as_mut().ok_or(MicroscopeError::NotConnected)?;

        let result = match data {
            Some(payload) if !payload.is_empty() => {
                connection.device.write_control(request, value, index, payload)
            }
            _ => {
                let mut response = [0u8; CONTROL_READ_LENGTH];
                connection
                    .device
                    .read_control(request, value, index, &mut response)
            }
        };

        match result {
            Ok(transferred) => {
                log::debug!(
                    "Control request 0x{:02x} transferred {} bytes",
                    request,
                    transferred
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("Control command failed: {}", e);
                Err(MicroscopeError::TransferFailed(e.to_string()))
            }
        }
    }

    /// Current frame size, or 640x480 when no source is open.
    pub fn frame_size(&self) -> (u32, u32) {
        let default = Resolution::default();
        match &self.connection {
            Some(connection) => {
                let width = connection.source.get(CaptureProperty::FrameWidth);
                let height = connection.source.get(CaptureProperty::FrameHeight);
                (
                    width.map_or(default.width, |w| w as u32),
                    height.map_or(default.height, |h| h as u32),
                )
            }
            None => (default.width, default.height),
        }
    }

    /// Request a new frame size from the backend.
    pub fn set_frame_size(&mut self, width: u32, height: u32) -> Result<(), MicroscopeError> {
        let connection = self.connection.as_mut().ok_or(MicroscopeError::NotConnected)?;

        let width_ok = connection
            .source
            .set(CaptureProperty::FrameWidth, width as f64);
        let height_ok = connection
            .source
            .set(CaptureProperty::FrameHeight, height as f64);

        if width_ok && height_ok {
            Ok(())
        } else {
            Err(MicroscopeError::BackendOperationFailed(format!(
                "frame size {}x{} rejected by capture backend",
                width, height
            )))
        }
    }
}

impl<U: UsbBackend, C: CaptureBackend> Drop for Microscope<U, C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
