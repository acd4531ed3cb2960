//! Traits the session uses to reach USB hardware.

use super::types::{DeviceIdentity, UsbError};

/// Enumerates and opens USB devices.
pub trait UsbBackend {
    type Device: UsbDevice;

    /// Find the first device matching `vendor_id:product_id`.
    ///
    /// Returns `Ok(None)` when no such device is attached.
    fn find(&mut self, vendor_id: u16, product_id: u16) -> Result<Option<Self::Device>, UsbError>;

    /// Identities of every attached device.
    fn enumerate(&mut self) -> Result<Vec<DeviceIdentity>, UsbError>;
}

/// A located USB device, exclusively owned by one session.
pub trait UsbDevice {
    /// Descriptor data. String lookups that fail are reported as `None`.
    fn identity(&self) -> DeviceIdentity;

    /// Vendor-class host-to-device control transfer.
    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, UsbError>;

    /// Vendor-class device-to-host control transfer.
    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbError>;

    /// Release the device handle and any resources held for it.
    fn release(self) -> Result<(), UsbError>;
}
