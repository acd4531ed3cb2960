//! The interactive `live` session.
//!
//! A background thread forwards stdin lines over a channel so the main loop
//! can notice Ctrl+C while waiting for input.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::ascii::{render_preview, ImageStats, PreviewOptions};
use crate::camera::{save_frame, CaptureBackend};
use crate::interrupt::ctrlc_received;
use crate::session::Microscope;
use crate::usb::UsbBackend;

/// Grid used for the per-frame preview.
pub const LIVE_PREVIEW_WIDTH: u16 = 60;
pub const LIVE_PREVIEW_HEIGHT: u16 = 23;

const INPUT_POLL: Duration = Duration::from_millis(100);

/// One line typed at the live prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveCommand {
    Save,
    Brightness,
    Quit,
    /// Anything else, including an empty line
    Capture,
}

impl LiveCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "s" => LiveCommand::Save,
            "b" => LiveCommand::Brightness,
            "q" => LiveCommand::Quit,
            _ => LiveCommand::Capture,
        }
    }
}

/// `microscope_YYYYmmdd_HHMMSS.jpg` for the given moment.
pub fn timestamped_filename(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(now.format("microscope_%Y%m%d_%H%M%S.jpg").to_string())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Wait for the next line. `None` on end of input or Ctrl+C.
fn next_line(lines: &Receiver<String>) -> Option<String> {
    loop {
        if ctrlc_received() {
            return None;
        }
        match lines.recv_timeout(INPUT_POLL) {
            Ok(line) => return Some(line),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

fn prompt<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    write!(out, "{}", text)?;
    out.flush()
}

/// Run the command loop on a connected session until quit, end of input or Ctrl+C.
///
/// Commands come from stdin. Screenshots are saved under `save_dir`.
pub fn run_live<U: UsbBackend, C: CaptureBackend>(
    scope: &mut Microscope<U, C>,
    options: &PreviewOptions,
    save_dir: &Path,
) -> io::Result<()> {
    let preview = PreviewOptions {
        width: LIVE_PREVIEW_WIDTH,
        height: LIVE_PREVIEW_HEIGHT,
        ..options.clone()
    };
    let lines = spawn_stdin_reader();
    let stdout = io::stdout();
    live_loop(scope, &preview, &lines, &mut stdout.lock(), save_dir)?;
    Ok(())
}

/// The command loop itself. Returns the number of commands handled.
fn live_loop<U, C, W>(
    scope: &mut Microscope<U, C>,
    preview: &PreviewOptions,
    lines: &Receiver<String>,
    out: &mut W,
    save_dir: &Path,
) -> io::Result<u64>
where
    U: UsbBackend,
    C: CaptureBackend,
    W: Write,
{
    writeln!(out, "Commands:")?;
    writeln!(out, "  's'   - Save screenshot")?;
    writeln!(out, "  'b'   - Adjust brightness")?;
    writeln!(out, "  'q'   - Quit")?;
    writeln!(out, "  Enter - Capture frame and show preview")?;

    let mut frame_count = 0u64;

    loop {
        prompt(out, &format!("\n[Frame {}] Enter command (Enter/s/b/q): ", frame_count))?;
        let Some(line) = next_line(lines) else {
            break;
        };

        match LiveCommand::parse(&line) {
            LiveCommand::Quit => break,
            LiveCommand::Save => {
                let path = save_dir.join(timestamped_filename(Local::now()));
                save_screenshot(scope, &path, out)?;
            }
            LiveCommand::Brightness => {
                prompt(out, "Enter brightness value (0-255): ")?;
                let Some(value) = next_line(lines) else {
                    break;
                };
                adjust_brightness(scope, &value, out)?;
            }
            LiveCommand::Capture => show_frame(scope, preview, out)?,
        }

        frame_count += 1;
    }

    Ok(frame_count)
}

fn save_screenshot<U, C, W>(scope: &mut Microscope<U, C>, path: &Path, out: &mut W) -> io::Result<()>
where
    U: UsbBackend,
    C: CaptureBackend,
    W: Write,
{
    let frame = match scope.capture_frame() {
        Ok(frame) => frame,
        Err(e) => return writeln!(out, "Frame capture failed: {}", e),
    };

    match save_frame(&frame, path) {
        Ok(()) => writeln!(out, "Screenshot saved: {}", path.display()),
        Err(e) => writeln!(out, "Failed to save screenshot: {}", e),
    }
}

fn adjust_brightness<U, C, W>(scope: &mut Microscope<U, C>, input: &str, out: &mut W) -> io::Result<()>
where
    U: UsbBackend,
    C: CaptureBackend,
    W: Write,
{
    let Ok(level) = input.trim().parse::<i32>() else {
        return writeln!(out, "Invalid value");
    };
    match scope.set_brightness(level) {
        Ok(()) => writeln!(out, "Brightness set: {}", level),
        Err(e) => writeln!(out, "Brightness setting failed: {}", e),
    }
}

fn show_frame<U, C, W>(scope: &mut Microscope<U, C>, preview: &PreviewOptions, out: &mut W) -> io::Result<()>
where
    U: UsbBackend,
    C: CaptureBackend,
    W: Write,
{
    let frame = match scope.capture_frame() {
        Ok(frame) => frame,
        Err(e) => return writeln!(out, "Frame capture failed: {}", e),
    };

    writeln!(out, "Frame capture successful! Size: {}x{}", frame.width, frame.height)?;
    let rule = "-".repeat(preview.width as usize);
    writeln!(out, "\nMicroscope real-time preview:")?;
    writeln!(out, "{}", rule)?;
    for line in render_preview(&frame, preview) {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "{}", rule)?;

    if let Some(stats) = ImageStats::from_frame(&frame) {
        writeln!(out, "Average brightness: {:.1}", stats.mean)?;
    }
    if let Some((min, max)) = frame.pixel_range() {
        writeln!(out, "Pixel range: {} ~ {}", min, max)?;
    }
    Ok(())
}
