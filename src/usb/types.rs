//! USB device identity and error types.

use std::collections::BTreeMap;
use std::fmt;

/// Placeholder used when a descriptor string cannot be read.
pub const UNKNOWN: &str = "Unknown";

/// USB device class code for interface-specific devices.
pub const CLASS_PER_INTERFACE: u8 = 0x00;
/// USB device class code for video devices.
pub const CLASS_VIDEO: u8 = 0x0e;
/// USB device class code for vendor-specific devices.
pub const CLASS_VENDOR_SPECIFIC: u8 = 0xff;

/// Descriptor data read from a USB device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: u8,
    pub address: u8,
    pub class: u8,
    /// Manufacturer string, if the device could be opened and reports one
    pub manufacturer: Option<String>,
    /// Product string, if the device could be opened and reports one
    pub product: Option<String>,
}

impl DeviceIdentity {
    /// `vvvv:pppp` identifier in lowercase hex.
    pub fn id_string(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor_id, self.product_id)
    }

    /// Manufacturer string or the "Unknown" placeholder.
    pub fn manufacturer_or_unknown(&self) -> &str {
        self.manufacturer.as_deref().unwrap_or(UNKNOWN)
    }

    /// Product string or the "Unknown" placeholder.
    pub fn product_or_unknown(&self) -> &str {
        self.product.as_deref().unwrap_or(UNKNOWN)
    }

    /// Info mapping as shown by `microscope info`.
    ///
    /// Both descriptor strings fall back to "Unknown" together when either
    /// one is missing.
    pub fn to_info_map(&self) -> BTreeMap<&'static str, String> {
        let mut info = BTreeMap::new();
        info.insert("vendor_id", format!("0x{:04x}", self.vendor_id));
        info.insert("product_id", format!("0x{:04x}", self.product_id));
        info.insert("bus", self.bus.to_string());
        info.insert("address", self.address.to_string());
        info.insert("class", self.class.to_string());

        match (&self.manufacturer, &self.product) {
            (Some(manufacturer), Some(product)) => {
                info.insert("manufacturer", manufacturer.clone());
                info.insert("product", product.clone());
            }
            _ => {
                info.insert("manufacturer", UNKNOWN.to_string());
                info.insert("product", UNKNOWN.to_string());
            }
        }

        info
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.manufacturer, &self.product) {
            (Some(manufacturer), Some(product)) => write!(f, "{} - {}", manufacturer, product),
            _ => f.write_str(&self.id_string()),
        }
    }
}

/// Errors raised by a USB backend.
#[derive(Debug, thiserror::Error)]
pub enum UsbError {
    #[error("permission denied while accessing USB devices")]
    PermissionDenied,

    #[error("USB device is not open")]
    NotOpen,

    #[error("USB enumeration failed: {0}")]
    Enumeration(String),

    #[error("USB transfer failed: {0}")]
    Transfer(String),

    #[error("failed to release USB device: {0}")]
    Release(String),
}

impl From<rusb::Error> for UsbError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Access => UsbError::PermissionDenied,
            other => UsbError::Transfer(other.to_string()),
        }
    }
}
