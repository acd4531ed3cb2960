//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;
mod live;

pub use args::{Args, Command, ConfigAction, Payload};
pub use commands::{handle_config_action, list_cameras, run, CommandResult, Context, DEMO_BRIGHTNESS_STEPS};
pub use enums::CharacterSet;
pub use live::{run_live, timestamped_filename, LiveCommand};
