//! usb-microscope library crate.
//!
//! Session management for Genesys-based USB digital microscopes
//! ([`session::Microscope`]), plus the USB, capture and preview layers the
//! `microscope` command-line tool is built from.

pub mod ascii;
pub mod camera;
pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod session;
pub mod usb;
pub mod viewer;

#[cfg(test)]
mod mock;

pub use error::MicroscopeError;
pub use session::{Microscope, MicroscopeSettings};
