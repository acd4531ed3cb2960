//! USB device discovery, descriptor metadata and vendor control transfers.
//!
//! - Backend abstraction via [`UsbBackend`] and [`UsbDevice`]
//! - libusb implementation via [`RusbBackend`]
//! - Microscope heuristics for the scanner in [`scanner`]

mod backend;
mod rusb_backend;
pub mod scanner;
mod types;

pub use backend::{UsbBackend, UsbDevice};
pub use rusb_backend::{RusbBackend, RusbDevice, DEFAULT_CONTROL_TIMEOUT};
pub use types::{
    DeviceIdentity, UsbError, CLASS_PER_INTERFACE, CLASS_VENDOR_SPECIFIC, CLASS_VIDEO, UNKNOWN,
};
