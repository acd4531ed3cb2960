//! Heuristics for spotting microscopes among attached USB devices.

use super::types::{DeviceIdentity, CLASS_PER_INTERFACE, CLASS_VENDOR_SPECIFIC, CLASS_VIDEO, UNKNOWN};

/// Keywords that suggest a device is a microscope or camera.
pub const KEYWORDS: &[&str] = &["microscope", "camera", "video", "usb", "digital"];

/// Check whether descriptor strings contain a microscope keyword.
///
/// Missing strings are treated as "Unknown". Matching is a case-insensitive
/// substring search over manufacturer followed by product.
pub fn matches_keywords(manufacturer: Option<&str>, product: Option<&str>) -> bool {
    let haystack = format!(
        "{}{}",
        manufacturer.unwrap_or(UNKNOWN),
        product.unwrap_or(UNKNOWN)
    )
    .to_lowercase();

    KEYWORDS.iter().any(|keyword| haystack.contains(keyword))
}

/// Device classes a microscope may report: interface-specific, video or vendor-specific.
pub fn is_candidate_class(class: u8) -> bool {
    matches!(class, CLASS_PER_INTERFACE | CLASS_VIDEO | CLASS_VENDOR_SPECIFIC)
}

/// Full candidate check used by the scanner.
pub fn is_microscope_candidate(identity: &DeviceIdentity) -> bool {
    is_candidate_class(identity.class)
        && matches_keywords(identity.manufacturer.as_deref(), identity.product.as_deref())
}

/// Filter an enumeration down to likely microscopes, preserving order.
pub fn find_candidates(devices: &[DeviceIdentity]) -> Vec<&DeviceIdentity> {
    devices.iter().filter(|d| is_microscope_candidate(d)).collect()
}

/// Multi-line description of one device for the scan report.
pub fn format_device(device: &DeviceIdentity) -> String {
    let (manufacturer, product) = match (&device.manufacturer, &device.product) {
        (Some(m), Some(p)) => (m.as_str(), p.as_str()),
        _ => ("(Unknown)", "(Unknown)"),
    };

    format!(
        "Device found:\n  Vendor ID:  0x{:04x}\n  Product ID: 0x{:04x}\n  Manufacturer: {}\n  Product:      {}\n  Bus:        {}\n  Address:    {}\n  Class:      {}",
        device.vendor_id,
        device.product_id,
        manufacturer,
        product,
        device.bus,
        device.address,
        device.class
    )
}

/// Numbered candidate listing, one entry per device.
pub fn format_candidate(position: usize, device: &DeviceIdentity) -> String {
    format!(
        "{}. {} - {}\n   ID: {}",
        position,
        device.manufacturer_or_unknown(),
        device.product_or_unknown(),
        device.id_string()
    )
}
