//! Block-average downsampling from pixels to character cells.

/// Average the luminance of every pixel that falls inside each character cell.
///
/// Returns `char_width * char_height` values in row-major order, or an empty
/// vector when any dimension is zero. Cells that cover no pixels (when the
/// grid is larger than the image) take the nearest pixel.
pub fn downsample(
    gray: &[u8],
    img_width: u32,
    img_height: u32,
    char_width: u16,
    char_height: u16,
) -> Vec<u8> {
    if char_width == 0 || char_height == 0 || img_width == 0 || img_height == 0 {
        return Vec::new();
    }
    if gray.len() < img_width as usize * img_height as usize {
        return Vec::new();
    }

    let cell_w = img_width as f32 / char_width as f32;
    let cell_h = img_height as f32 / char_height as f32;
    let mut cells = Vec::with_capacity(char_width as usize * char_height as usize);

    for cy in 0..char_height as u32 {
        let y0 = (cy as f32 * cell_h) as u32;
        let y1 = (((cy + 1) as f32 * cell_h) as u32).clamp(y0 + 1, img_height);

        for cx in 0..char_width as u32 {
            let x0 = (cx as f32 * cell_w) as u32;
            let x1 = (((cx + 1) as f32 * cell_w) as u32).clamp(x0 + 1, img_width);

            let mut sum = 0u32;
            let mut count = 0u32;
            for py in y0..y1 {
                let row = (py * img_width) as usize;
                for px in x0..x1 {
                    sum += gray[row + px as usize] as u32;
                    count += 1;
                }
            }
            cells.push(if count > 0 { (sum / count) as u8 } else { 0 });
        }
    }

    cells
}
