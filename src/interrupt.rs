//! Process-wide Ctrl+C flag shared by the interactive commands.

use std::sync::atomic::{AtomicBool, Ordering};

static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Whether Ctrl+C has been pressed since startup.
pub fn ctrlc_received() -> bool {
    CTRLC_RECEIVED.load(Ordering::SeqCst)
}

/// Set up the Ctrl+C handler.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
        eprintln!("\nInterrupted by user");
    })
}
