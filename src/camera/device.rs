//! Capture device enumeration.

use nokhwa::query;
use nokhwa::utils::ApiBackend;

use super::types::{CameraError, CameraInfo};

/// List every capture device the OS camera API reports.
///
/// An empty list is not an error: the microscope may simply be unplugged.
pub fn list_devices() -> Result<Vec<CameraInfo>, CameraError> {
    let devices = query(ApiBackend::Auto).map_err(|e| {
        let msg = e.to_string();
        if msg.to_lowercase().contains("permission") {
            CameraError::PermissionDenied
        } else {
            CameraError::QueryFailed(msg)
        }
    })?;

    Ok(devices
        .into_iter()
        .filter_map(|d| {
            // Devices addressed by path rather than index cannot be opened by index
            let index = d.index().as_index().ok()?;
            Some(CameraInfo {
                index,
                name: d.human_name(),
                description: d.description().to_string(),
            })
        })
        .collect())
}

/// One line per device, marking the index the session is configured to open.
pub fn format_device_list(devices: &[CameraInfo], configured_index: u32) -> Vec<String> {
    devices
        .iter()
        .map(|d| {
            let marker = if d.index == configured_index { '*' } else { ' ' };
            format!("{} {}", marker, d)
        })
        .collect()
}
