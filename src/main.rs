use clap::Parser;

use usb_microscope::cli::{self, Args};
use usb_microscope::interrupt::setup_ctrlc_handler;

/// Default filter per `-v` count; `RUST_LOG` takes precedence.
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(args.verbose)))
        .format_timestamp(None)
        .init();

    if args.command.handles_interrupt() {
        if let Err(e) = setup_ctrlc_handler() {
            log::warn!("Failed to set up Ctrl+C handler: {}", e);
        }
    }

    if let Err(e) = cli::run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
