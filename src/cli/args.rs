//! CLI argument parsing with clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use super::enums::CharacterSet;
use crate::config::DEFAULT_CAPTURE_FILE;

/// Driver and tools for USB digital microscopes
#[derive(Parser, Debug)]
#[command(name = "microscope")]
#[command(version, about = "Control and capture from a USB digital microscope", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// USB vendor id in hex (default 05e3)
    #[arg(long, global = true, value_parser = parse_usb_id)]
    pub vendor_id: Option<u16>,

    /// USB product id in hex (default f12a)
    #[arg(long, global = true, value_parser = parse_usb_id)]
    pub product_id: Option<u16>,

    /// Video device index (from `cameras`)
    #[arg(long, global = true)]
    pub video_index: Option<u32>,

    /// Preview character set
    #[arg(long, global = true)]
    pub charset: Option<CharacterSet>,

    /// Invert preview brightness (for light terminals)
    #[arg(long, global = true)]
    pub invert: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and print device information
    Info {
        /// Print the information as JSON
        #[arg(long)]
        json: bool,
        /// Set the illumination level (0-255) after connecting
        #[arg(long, value_parser = parse_brightness)]
        brightness: Option<u8>,
    },
    /// List USB devices and flag likely microscopes
    Scan,
    /// List video capture devices
    Cameras,
    /// Capture one frame and save it
    Capture {
        /// Output image; the format follows the extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip the text preview
        #[arg(long)]
        no_preview: bool,
    },
    /// Interactive capture session driven by single-letter commands
    Live,
    /// Show a saved image as text with statistics
    View {
        /// Image file to display
        #[arg(default_value = DEFAULT_CAPTURE_FILE)]
        image: PathBuf,
        /// Preview width in characters
        #[arg(long, default_value = "100")]
        width: u16,
        /// Preview height in characters
        #[arg(long, default_value = "75")]
        height: u16,
    },
    /// Connect, sweep the brightness and capture a frame
    Demo,
    /// Continuously refresh a text preview until Ctrl+C
    Watch {
        /// Refresh interval in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Illumination level (0-255) to set after connecting
        #[arg(long, value_parser = parse_brightness)]
        brightness: Option<u8>,
        /// Save the last frame here on exit
        #[arg(long)]
        save_last: Option<PathBuf>,
    },
    /// Send one vendor control transfer
    Control {
        /// bRequest (decimal or 0x-prefixed hex)
        #[arg(value_parser = parse_u8_number)]
        request: u8,
        /// wValue
        #[arg(long, default_value = "0", value_parser = parse_u16_number)]
        value: u16,
        /// wIndex
        #[arg(long, default_value = "0", value_parser = parse_u16_number)]
        index: u16,
        /// Payload as hex bytes; omit to read from the device instead
        #[arg(long, value_parser = parse_payload)]
        data: Option<Payload>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Command {
    /// Commands whose loops stop cleanly on Ctrl+C. The rest keep the
    /// default signal behavior so an interrupt ends them immediately.
    pub fn handles_interrupt(&self) -> bool {
        matches!(self, Command::Live | Command::Demo | Command::Watch { .. })
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

/// Host-to-device control payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(pub Vec<u8>);

/// Parse a USB id, always hexadecimal, with or without `0x`
fn parse_usb_id(s: &str) -> Result<u16, String> {
    let digits = strip_hex_prefix(s).unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|_| format!("'{}' is not a 16-bit hex id", s))
}

/// Parse and validate brightness (0-255)
fn parse_brightness(s: &str) -> Result<u8, String> {
    let level: i64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    u8::try_from(level).map_err(|_| format!("Brightness must be between 0 and 255, got {}", level))
}

fn parse_u8_number(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("{} does not fit in 8 bits", s))
}

fn parse_u16_number(s: &str) -> Result<u16, String> {
    let n = parse_number(s)?;
    u16::try_from(n).map_err(|_| format!("{} does not fit in 16 bits", s))
}

/// Decimal, or hex with a `0x` prefix
fn parse_number(s: &str) -> Result<u32, String> {
    match strip_hex_prefix(s) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => s.parse(),
    }
    .map_err(|_| format!("'{}' is not a valid number", s))
}

fn parse_payload(s: &str) -> Result<Payload, String> {
    let digits: String = strip_hex_prefix(s)
        .unwrap_or(s)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits)
        .map(Payload)
        .map_err(|e| format!("Invalid hex payload '{}': {}", s, e))
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["microscope", "scan"]);
        assert!(args.config.is_none());
        assert!(args.vendor_id.is_none());
        assert!(args.product_id.is_none());
        assert!(args.video_index.is_none());
        assert!(args.charset.is_none());
        assert!(!args.invert);
        assert_eq!(args.verbose, 0);
        assert!(matches!(args.command, Command::Scan));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["microscope"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::parse_from([
            "microscope",
            "info",
            "--vendor-id",
            "0x1234",
            "--product-id",
            "abcd",
            "--video-index",
            "0",
            "-vv",
        ]);
        assert_eq!(args.vendor_id, Some(0x1234));
        assert_eq!(args.product_id, Some(0xabcd));
        assert_eq!(args.video_index, Some(0));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_usb_id_rejects_garbage() {
        assert!(Args::try_parse_from(["microscope", "scan", "--vendor-id", "zzzz"]).is_err());
        assert!(Args::try_parse_from(["microscope", "scan", "--vendor-id", "123456"]).is_err());
    }

    #[test]
    fn test_info_options() {
        let args = Args::parse_from(["microscope", "info", "--json", "--brightness", "200"]);
        match args.command {
            Command::Info { json, brightness } => {
                assert!(json);
                assert_eq!(brightness, Some(200));
            }
            other => panic!("Expected Info, got {:?}", other),
        }
    }

    #[test]
    fn test_brightness_validated_at_parse_time() {
        for bad in ["256", "-1", "bright"] {
            assert!(
                Args::try_parse_from(["microscope", "info", "--brightness", bad]).is_err(),
                "{} should be rejected",
                bad
            );
        }
        assert!(Args::try_parse_from(["microscope", "watch", "--brightness", "255"]).is_ok());
    }

    #[test]
    fn test_capture_options() {
        let args = Args::parse_from(["microscope", "capture", "-o", "slide.png", "--no-preview"]);
        match args.command {
            Command::Capture { output, no_preview } => {
                assert_eq!(output, Some(PathBuf::from("slide.png")));
                assert!(no_preview);
            }
            other => panic!("Expected Capture, got {:?}", other),
        }
    }

    #[test]
    fn test_view_defaults() {
        let args = Args::parse_from(["microscope", "view"]);
        match args.command {
            Command::View {
                image,
                width,
                height,
            } => {
                assert_eq!(image, PathBuf::from("microscope_capture.jpg"));
                assert_eq!(width, 100);
                assert_eq!(height, 75);
            }
            other => panic!("Expected View, got {:?}", other),
        }
    }

    #[test]
    fn test_watch_options() {
        let args = Args::parse_from([
            "microscope",
            "watch",
            "--interval",
            "250",
            "--save-last",
            "last.jpg",
        ]);
        match args.command {
            Command::Watch {
                interval,
                brightness,
                save_last,
            } => {
                assert_eq!(interval, Some(250));
                assert!(brightness.is_none());
                assert_eq!(save_last, Some(PathBuf::from("last.jpg")));
            }
            other => panic!("Expected Watch, got {:?}", other),
        }
        assert!(Args::try_parse_from(["microscope", "watch", "--interval", "0"]).is_err());
    }

    #[test]
    fn test_control_arguments() {
        let args = Args::parse_from([
            "microscope",
            "control",
            "0x01",
            "--value",
            "128",
            "--index",
            "0x0002",
            "--data",
            "aa:bb cc",
        ]);
        match args.command {
            Command::Control {
                request,
                value,
                index,
                data,
            } => {
                assert_eq!(request, 1);
                assert_eq!(value, 128);
                assert_eq!(index, 2);
                assert_eq!(data, Some(Payload(vec![0xaa, 0xbb, 0xcc])));
            }
            other => panic!("Expected Control, got {:?}", other),
        }
    }

    #[test]
    fn test_control_defaults_to_read() {
        let args = Args::parse_from(["microscope", "control", "5"]);
        match args.command {
            Command::Control {
                request,
                value,
                index,
                data,
            } => {
                assert_eq!((request, value, index), (5, 0, 0));
                assert!(data.is_none());
            }
            other => panic!("Expected Control, got {:?}", other),
        }
    }

    #[test]
    fn test_control_rejects_bad_values() {
        assert!(Args::try_parse_from(["microscope", "control", "256"]).is_err());
        assert!(Args::try_parse_from(["microscope", "control", "1", "--value", "70000"]).is_err());
        assert!(Args::try_parse_from(["microscope", "control", "1", "--data", "abc"]).is_err());
    }

    #[test]
    fn test_charset_values() {
        let args = Args::parse_from(["microscope", "view", "--charset", "blocks", "--invert"]);
        assert_eq!(args.charset, Some(CharacterSet::Blocks));
        assert!(args.invert);
        assert!(Args::try_parse_from(["microscope", "view", "--charset", "braille"]).is_err());
    }

    #[test]
    fn test_only_looping_commands_handle_interrupt() {
        for argv in [["microscope", "live"], ["microscope", "demo"], ["microscope", "watch"]] {
            assert!(Args::parse_from(argv).command.handles_interrupt(), "{:?}", argv);
        }
        for argv in [["microscope", "scan"], ["microscope", "info"], ["microscope", "capture"], ["microscope", "cameras"]] {
            assert!(!Args::parse_from(argv).command.handles_interrupt(), "{:?}", argv);
        }
        let args = Args::parse_from(["microscope", "control", "1"]);
        assert!(!args.command.handles_interrupt());
    }

    #[test]
    fn test_config_subcommands() {
        let args = Args::parse_from(["microscope", "config", "show"]);
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));

        let args = Args::parse_from(["microscope", "-c", "/tmp/m.toml", "config", "init"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/m.toml")));
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Init
            }
        ));
    }
}
