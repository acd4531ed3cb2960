//! Terminal previews of microscope frames.
//!
//! Frames go through grayscale conversion (BT.601), block-average
//! downsampling to a character grid and a brightness-to-character ramp.

mod charset;
mod dimensions;
mod downsample;
mod grayscale;
mod mapping;
mod preview;

pub use charset::{CharSet, BLOCKS_CHARSET, MINIMAL_CHARSET, STANDARD_CHARSET};
pub use dimensions::{fit_dimensions, fit_dimensions_with_aspect, DEFAULT_CHAR_ASPECT_RATIO};
pub use downsample::downsample;
pub use grayscale::{luminance, to_grayscale};
pub use mapping::{gamma_correct, map_to_chars, GAMMA};
pub use preview::{render_preview, ImageStats, PreviewOptions};
