//! libusb-backed implementation of the USB traits.

use std::time::Duration;

use rusb::{
    Device, DeviceDescriptor, DeviceHandle, Direction, GlobalContext, Recipient, RequestType,
};

use super::backend::{UsbBackend, UsbDevice};
use super::types::{DeviceIdentity, UsbError};

/// Default timeout for vendor control transfers.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

/// USB backend using the global libusb context.
#[derive(Debug, Clone)]
pub struct RusbBackend {
    control_timeout: Duration,
}

impl RusbBackend {
    pub fn new(control_timeout: Duration) -> Self {
        Self { control_timeout }
    }
}

impl Default for RusbBackend {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_TIMEOUT)
    }
}

impl UsbBackend for RusbBackend {
    type Device = RusbDevice;

    fn find(&mut self, vendor_id: u16, product_id: u16) -> Result<Option<RusbDevice>, UsbError> {
        let devices = rusb::devices().map_err(enumeration_error)?;

        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };

            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                // Without a handle the identity lacks strings and transfers fail,
                // but the device is still reported as present.
                let handle = match device.open() {
                    Ok(h) => Some(h),
                    Err(e) => {
                        log::warn!(
                            "Found {:04x}:{:04x} but could not open it: {}",
                            vendor_id,
                            product_id,
                            e
                        );
                        None
                    }
                };

                return Ok(Some(RusbDevice {
                    device,
                    descriptor,
                    handle,
                    control_timeout: self.control_timeout,
                }));
            }
        }

        Ok(None)
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceIdentity>, UsbError> {
        let devices = rusb::devices().map_err(enumeration_error)?;
        let mut identities = Vec::new();

        for device in devices.iter() {
            match device.device_descriptor() {
                Ok(descriptor) => {
                    let handle = device.open().ok();
                    identities.push(read_identity(&device, &descriptor, handle.as_ref()));
                }
                Err(e) => {
                    log::warn!(
                        "Failed to read descriptor for device on bus {} address {}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                }
            }
        }

        Ok(identities)
    }
}

fn enumeration_error(e: rusb::Error) -> UsbError {
    match e {
        rusb::Error::Access => UsbError::PermissionDenied,
        other => UsbError::Enumeration(other.to_string()),
    }
}

fn read_identity(
    device: &Device<GlobalContext>,
    descriptor: &DeviceDescriptor,
    handle: Option<&DeviceHandle<GlobalContext>>,
) -> DeviceIdentity {
    let manufacturer = handle.and_then(|h| h.read_manufacturer_string_ascii(descriptor).ok());
    let product = handle.and_then(|h| h.read_product_string_ascii(descriptor).ok());

    DeviceIdentity {
        vendor_id: descriptor.vendor_id(),
        product_id: descriptor.product_id(),
        bus: device.bus_number(),
        address: device.address(),
        class: descriptor.class_code(),
        manufacturer,
        product,
    }
}

/// A located device and, when permitted, an open handle to it.
pub struct RusbDevice {
    device: Device<GlobalContext>,
    descriptor: DeviceDescriptor,
    handle: Option<DeviceHandle<GlobalContext>>,
    control_timeout: Duration,
}

impl std::fmt::Debug for RusbDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusbDevice")
            .field("bus", &self.device.bus_number())
            .field("address", &self.device.address())
            .field("open", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl RusbDevice {
    fn handle(&self) -> Result<&DeviceHandle<GlobalContext>, UsbError> {
        self.handle.as_ref().ok_or(UsbError::NotOpen)
    }
}

impl UsbDevice for RusbDevice {
    fn identity(&self) -> DeviceIdentity {
        read_identity(&self.device, &self.descriptor, self.handle.as_ref())
    }

    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, UsbError> {
        let request_type = rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);
        Ok(self.handle()?.write_control(
            request_type,
            request,
            value,
            index,
            data,
            self.control_timeout,
        )?)
    }

    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbError> {
        let request_type = rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device);
        Ok(self.handle()?.read_control(
            request_type,
            request,
            value,
            index,
            buf,
            self.control_timeout,
        )?)
    }

    fn release(mut self) -> Result<(), UsbError> {
        // libusb closes the handle on drop
        drop(self.handle.take());
        Ok(())
    }
}
