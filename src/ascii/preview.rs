//! Text previews and luminance statistics for captured frames.

use std::fmt;

use super::charset::CharSet;
use super::dimensions::fit_dimensions;
use super::downsample::downsample;
use super::grayscale::to_grayscale;
use super::mapping::map_to_chars;
use crate::camera::Frame;

/// How a frame is turned into text.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOptions {
    /// Maximum columns
    pub width: u16,
    /// Maximum rows
    pub height: u16,
    pub charset: CharSet,
    pub invert: bool,
    pub gamma: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            width: 80,
            height: 30,
            charset: CharSet::Standard,
            invert: false,
            gamma: false,
        }
    }
}

/// Render a frame as lines of text that fit within the options' box.
///
/// Returns no lines for an empty frame.
pub fn render_preview(frame: &Frame, options: &PreviewOptions) -> Vec<String> {
    let (cols, rows) = fit_dimensions(frame.width, frame.height, options.width, options.height);
    if cols == 0 || rows == 0 {
        return Vec::new();
    }

    let gray = to_grayscale(frame);
    let cells = downsample(&gray, frame.width, frame.height, cols, rows);
    let chars = map_to_chars(&cells, options.charset.chars(), options.invert, options.gamma);

    chars
        .chunks(cols as usize)
        .map(|row| row.iter().collect())
        .collect()
}

/// Luminance statistics over a whole frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: u8,
    pub max: u8,
}

impl ImageStats {
    pub fn from_gray(gray: &[u8]) -> Option<Self> {
        let min = *gray.iter().min()?;
        let max = *gray.iter().max()?;

        let n = gray.len() as f64;
        let mean = gray.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = gray
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }

    pub fn from_frame(frame: &Frame) -> Option<Self> {
        Self::from_gray(&to_grayscale(frame))
    }
}

impl fmt::Display for ImageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Average brightness: {:.1}", self.mean)?;
        writeln!(f, "Standard deviation: {:.1}", self.std_dev)?;
        writeln!(f, "Minimum value: {}", self.min)?;
        write!(f, "Maximum value: {}", self.max)
    }
}
