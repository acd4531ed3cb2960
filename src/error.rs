//! Error kinds reported by the microscope session.

/// Errors returned by [`crate::session::Microscope`] operations.
#[derive(Debug, thiserror::Error)]
pub enum MicroscopeError {
    #[error("Microscope not found (looked for {vendor_id:04x}:{product_id:04x})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Cannot open video device {index}: {reason}")]
    CaptureUnavailable { index: u32, reason: String },

    #[error("Microscope not connected")]
    NotConnected,

    #[error("Invalid {name} {value}: must be in range {range}")]
    InvalidParameter {
        name: &'static str,
        value: i64,
        range: &'static str,
    },

    #[error("Capture backend operation failed: {0}")]
    BackendOperationFailed(String),

    #[error("Control command failed: {0}")]
    TransferFailed(String),

    #[error("No permission to access USB devices. Run with sudo or add a udev rule for the device")]
    PermissionDenied,
}
