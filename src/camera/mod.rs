//! Video capture for the microscope's camera interface.
//!
//! This module provides:
//! - Backend abstraction via [`CaptureBackend`] and [`CaptureSource`]
//! - nokhwa implementation via [`NokhwaBackend`]
//! - Device enumeration via [`list_devices`]
//! - Image file I/O via [`save_frame`] and [`load_frame`]

mod backend;
mod device;
mod frame_utils;
mod nokhwa_backend;
mod types;

pub use backend::{CaptureBackend, CaptureSource};
pub use device::{format_device_list, list_devices};
pub use frame_utils::{load_frame, save_frame};
pub use nokhwa_backend::{NokhwaBackend, NokhwaSource};
pub use types::{CameraError, CameraInfo, CaptureProperty, Frame, FrameFormat, Resolution};
