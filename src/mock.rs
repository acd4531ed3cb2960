//! In-memory USB and capture backends for unit tests.
//!
//! Every mock shares a [`Recorder`] so tests can observe which backend calls a
//! session made and in what order.

use std::cell::RefCell;
use std::rc::Rc;

use crate::camera::{CameraError, CaptureBackend, CaptureProperty, CaptureSource, Frame, FrameFormat};
use crate::usb::{DeviceIdentity, UsbBackend, UsbDevice, UsbError};

#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub direction: &'static str,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: usize,
}

#[derive(Debug, Default)]
struct Calls {
    opened_indices: Vec<u32>,
    property_sets: Vec<(CaptureProperty, f64)>,
    reads: usize,
    transfers: Vec<Transfer>,
    release_order: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<Calls>>);

impl Recorder {
    pub fn opened_indices(&self) -> Vec<u32> {
        self.0.borrow().opened_indices.clone()
    }

    pub fn property_sets(&self) -> Vec<(CaptureProperty, f64)> {
        self.0.borrow().property_sets.clone()
    }

    pub fn reads(&self) -> usize {
        self.0.borrow().reads
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.0.borrow().transfers.clone()
    }

    pub fn release_order(&self) -> Vec<String> {
        self.0.borrow().release_order.clone()
    }

    pub fn usb_releases(&self) -> usize {
        self.count_releases("usb")
    }

    pub fn source_releases(&self) -> usize {
        self.count_releases("capture")
    }

    fn count_releases(&self, what: &str) -> usize {
        self.0
            .borrow()
            .release_order
            .iter()
            .filter(|r| r.as_str() == what)
            .count()
    }
}

pub fn microscope_identity() -> DeviceIdentity {
    DeviceIdentity {
        vendor_id: 0x05e3,
        product_id: 0xf12a,
        bus: 1,
        address: 7,
        class: 0xef,
        manufacturer: Some("Genesys Logic".to_string()),
        product: Some("USB2.0 Digital Microscope".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Presence {
    Present,
    Absent,
    Denied,
}

#[derive(Debug)]
pub struct MockUsb {
    recorder: Recorder,
    presence: Presence,
    identity: DeviceIdentity,
    fail_release: bool,
    fail_transfers: bool,
}

impl MockUsb {
    fn with(recorder: Recorder, presence: Presence) -> Self {
        Self {
            recorder,
            presence,
            identity: microscope_identity(),
            fail_release: false,
            fail_transfers: false,
        }
    }

    pub fn present(recorder: Recorder) -> Self {
        Self::with(recorder, Presence::Present)
    }

    pub fn present_without_strings(recorder: Recorder) -> Self {
        let mut usb = Self::with(recorder, Presence::Present);
        usb.identity.manufacturer = None;
        usb.identity.product = None;
        usb
    }

    pub fn absent(recorder: Recorder) -> Self {
        Self::with(recorder, Presence::Absent)
    }

    pub fn denied(recorder: Recorder) -> Self {
        Self::with(recorder, Presence::Denied)
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn failing_transfers(mut self) -> Self {
        self.fail_transfers = true;
        self
    }
}

impl UsbBackend for MockUsb {
    type Device = MockDevice;

    fn find(&mut self, vendor_id: u16, product_id: u16) -> Result<Option<MockDevice>, UsbError> {
        match self.presence {
            Presence::Denied => Err(UsbError::PermissionDenied),
            Presence::Absent => Ok(None),
            Presence::Present
                if self.identity.vendor_id == vendor_id
                    && self.identity.product_id == product_id =>
            {
                Ok(Some(MockDevice {
                    recorder: self.recorder.clone(),
                    identity: self.identity.clone(),
                    fail_release: self.fail_release,
                    fail_transfers: self.fail_transfers,
                }))
            }
            Presence::Present => Ok(None),
        }
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceIdentity>, UsbError> {
        match self.presence {
            Presence::Denied => Err(UsbError::PermissionDenied),
            Presence::Absent => Ok(Vec::new()),
            Presence::Present => Ok(vec![self.identity.clone()]),
        }
    }
}

#[derive(Debug)]
pub struct MockDevice {
    recorder: Recorder,
    identity: DeviceIdentity,
    fail_release: bool,
    fail_transfers: bool,
}

impl MockDevice {
    fn record(&self, direction: &'static str, request: u8, value: u16, index: u16, length: usize) {
        self.recorder.0.borrow_mut().transfers.push(Transfer {
            direction,
            request,
            value,
            index,
            length,
        });
    }
}

impl UsbDevice for MockDevice {
    fn identity(&self) -> DeviceIdentity {
        self.identity.clone()
    }

    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, UsbError> {
        self.record("out", request, value, index, data.len());
        if self.fail_transfers {
            return Err(UsbError::Transfer("Pipe error".to_string()));
        }
        Ok(data.len())
    }

    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbError> {
        self.record("in", request, value, index, buf.len());
        if self.fail_transfers {
            return Err(UsbError::Transfer("Pipe error".to_string()));
        }
        Ok(0)
    }

    fn release(self) -> Result<(), UsbError> {
        self.recorder
            .0
            .borrow_mut()
            .release_order
            .push("usb".to_string());
        if self.fail_release {
            return Err(UsbError::Release("Resource busy".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockCapture {
    recorder: Recorder,
    available: bool,
    accept_brightness: bool,
    produce_frames: bool,
}

impl MockCapture {
    pub fn working(recorder: Recorder) -> Self {
        Self {
            recorder,
            available: true,
            accept_brightness: true,
            produce_frames: true,
        }
    }

    pub fn unavailable(recorder: Recorder) -> Self {
        Self {
            available: false,
            ..Self::working(recorder)
        }
    }

    pub fn rejecting_brightness(mut self) -> Self {
        self.accept_brightness = false;
        self
    }

    pub fn without_frames(mut self) -> Self {
        self.produce_frames = false;
        self
    }
}

impl CaptureBackend for MockCapture {
    type Source = MockSource;

    fn open(&mut self, index: u32) -> Result<MockSource, CameraError> {
        self.recorder.0.borrow_mut().opened_indices.push(index);
        if !self.available {
            return Err(CameraError::OpenFailed(format!(
                "no video device at index {}",
                index
            )));
        }
        Ok(MockSource {
            recorder: self.recorder.clone(),
            width: 640,
            height: 480,
            fps: 30.0,
            brightness: None,
            accept_brightness: self.accept_brightness,
            produce_frames: self.produce_frames,
        })
    }
}

#[derive(Debug)]
pub struct MockSource {
    recorder: Recorder,
    width: u32,
    height: u32,
    fps: f64,
    brightness: Option<f64>,
    accept_brightness: bool,
    produce_frames: bool,
}

impl CaptureSource for MockSource {
    fn set(&mut self, property: CaptureProperty, value: f64) -> bool {
        self.recorder
            .0
            .borrow_mut()
            .property_sets
            .push((property, value));
        match property {
            CaptureProperty::FrameWidth => {
                self.width = value as u32;
                true
            }
            CaptureProperty::FrameHeight => {
                self.height = value as u32;
                true
            }
            CaptureProperty::Fps => {
                self.fps = value;
                true
            }
            CaptureProperty::BufferSize => true,
            CaptureProperty::Brightness => {
                if self.accept_brightness {
                    self.brightness = Some(value);
                }
                self.accept_brightness
            }
        }
    }

    fn get(&self, property: CaptureProperty) -> Option<f64> {
        match property {
            CaptureProperty::FrameWidth => Some(self.width as f64),
            CaptureProperty::FrameHeight => Some(self.height as f64),
            CaptureProperty::Fps => Some(self.fps),
            CaptureProperty::BufferSize => None,
            CaptureProperty::Brightness => self.brightness,
        }
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        self.recorder.0.borrow_mut().reads += 1;
        if !self.produce_frames {
            return Err(CameraError::ReadFailed("no frame available".to_string()));
        }
        Ok(Frame {
            data: vec![96; (self.width * self.height * 3) as usize],
            width: self.width,
            height: self.height,
            format: FrameFormat::Bgr,
        })
    }

    fn release(&mut self) {
        self.recorder
            .0
            .borrow_mut()
            .release_order
            .push("capture".to_string());
    }
}
