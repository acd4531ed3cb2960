//! Character ramps for text previews, ordered from darkest to brightest.

/// Ten-level ramp used by the capture and viewer previews.
pub const STANDARD_CHARSET: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Unicode shade blocks.
pub const BLOCKS_CHARSET: &[char] = &[' ', '░', '▒', '▓', '█'];

pub const MINIMAL_CHARSET: &[char] = &[' ', '.', ':', '#'];

/// Selectable preview ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSet {
    #[default]
    Standard,
    Blocks,
    Minimal,
}

impl CharSet {
    pub fn chars(&self) -> &'static [char] {
        match self {
            CharSet::Standard => STANDARD_CHARSET,
            CharSet::Blocks => BLOCKS_CHARSET,
            CharSet::Minimal => MINIMAL_CHARSET,
        }
    }

    /// Name used in the config file and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            CharSet::Standard => "standard",
            CharSet::Blocks => "blocks",
            CharSet::Minimal => "minimal",
        }
    }

    /// Parse a config/CLI name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "standard" => Some(CharSet::Standard),
            "blocks" => Some(CharSet::Blocks),
            "minimal" => Some(CharSet::Minimal),
            _ => None,
        }
    }
}
