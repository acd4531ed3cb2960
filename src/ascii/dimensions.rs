//! Fitting an image into a character grid.

/// Terminal cells are roughly twice as tall as they are wide.
pub const DEFAULT_CHAR_ASPECT_RATIO: f32 = 2.0;

/// Largest grid within `max_width` x `max_height` cells that keeps the image's
/// aspect ratio once rendered with 2:1 cells.
///
/// A 640x480 frame in a 100x75 box yields 100x38.
pub fn fit_dimensions(img_width: u32, img_height: u32, max_width: u16, max_height: u16) -> (u16, u16) {
    fit_dimensions_with_aspect(
        img_width,
        img_height,
        max_width,
        max_height,
        DEFAULT_CHAR_ASPECT_RATIO,
    )
}

pub fn fit_dimensions_with_aspect(
    img_width: u32,
    img_height: u32,
    max_width: u16,
    max_height: u16,
    char_aspect: f32,
) -> (u16, u16) {
    if img_width == 0 || img_height == 0 || max_width == 0 || max_height == 0 {
        return (0, 0);
    }

    // Rows that keep the image undistorted at full width
    let width_scale = img_width as f64 * char_aspect as f64;
    let rows = (max_width as f64 * img_height as f64 / width_scale).round() as u16;
    if rows == 0 {
        // Very wide images still get one full-width row
        return (max_width, 1);
    }
    if rows <= max_height {
        return (max_width, rows);
    }

    let cols = (max_height as f64 * width_scale / img_height as f64).round() as u16;
    (cols.clamp(1, max_width), max_height)
}
