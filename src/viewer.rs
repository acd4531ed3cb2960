//! Polling viewer: a connection panel, brightness control and a text preview
//! refreshed at a fixed interval.
//!
//! All state lives in [`ViewerState`] and changes only through
//! [`ViewerEvent`]s, so the same logic drives `microscope watch` and tests.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::ascii::{render_preview, PreviewOptions};
use crate::camera::{save_frame, CameraError, CaptureBackend, Frame};
use crate::error::MicroscopeError;
use crate::session::{validate_brightness, Microscope};
use crate::usb::UsbBackend;

/// Brightness the slider starts at.
pub const INITIAL_BRIGHTNESS: u8 = 128;

/// Longest sleep between stop checks in the watch loop.
const STOP_POLL: Duration = Duration::from_millis(50);

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Connect,
    Disconnect,
    /// Slider moved to a new level
    Brightness(i32),
    StartStream,
    StopStream,
    /// Periodic refresh
    Tick,
    TakePhoto(PathBuf),
}

/// What the video area shows.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoPane {
    NoVideo,
    Stopped,
    /// Connected and streaming but the last read produced nothing
    NoFrame,
    Preview(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Session(#[from] MicroscopeError),
    #[error("No frame captured yet")]
    NoFrame,
    #[error("Failed to save photo: {0}")]
    Save(#[from] CameraError),
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct ViewerState {
    connected: bool,
    streaming: bool,
    brightness: u8,
    info: BTreeMap<&'static str, String>,
    pane: VideoPane,
    last_frame: Option<Frame>,
    message: Option<String>,
    preview: PreviewOptions,
}

impl ViewerState {
    pub fn new(preview: PreviewOptions) -> Self {
        Self {
            connected: false,
            streaming: false,
            brightness: INITIAL_BRIGHTNESS,
            info: BTreeMap::new(),
            pane: VideoPane::NoVideo,
            last_frame: None,
            message: None,
            preview,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn info(&self) -> &BTreeMap<&'static str, String> {
        &self.info
    }

    pub fn pane(&self) -> &VideoPane {
        &self.pane
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn has_frame(&self) -> bool {
        self.last_frame.is_some()
    }

    /// Apply one event to the viewer and the session behind it.
    ///
    /// The error is also recorded as the viewer's status message.
    pub fn handle<U: UsbBackend, C: CaptureBackend>(
        &mut self,
        scope: &mut Microscope<U, C>,
        event: ViewerEvent,
    ) -> Result<(), ViewerError> {
        log::debug!("Viewer event: {:?}", event);
        let result = self.apply(scope, event);
        if let Err(e) = &result {
            self.message = Some(e.to_string());
        }
        result
    }

    fn apply<U: UsbBackend, C: CaptureBackend>(
        &mut self,
        scope: &mut Microscope<U, C>,
        event: ViewerEvent,
    ) -> Result<(), ViewerError> {
        match event {
            ViewerEvent::Connect => {
                scope.connect()?;
                self.connected = true;
                self.info = scope.device_info();
                self.message = Some("Connected".to_string());
            }
            ViewerEvent::Disconnect => {
                self.streaming = false;
                scope.disconnect();
                self.connected = false;
                self.info.clear();
                self.pane = VideoPane::NoVideo;
                self.message = Some("Not connected".to_string());
            }
            ViewerEvent::Brightness(level) => {
                let level = validate_brightness(level)?;
                // The slider moves freely while disconnected
                if self.connected {
                    scope.set_brightness(level as i32)?;
                    self.message = Some(format!("Brightness set: {}", level));
                }
                self.brightness = level;
            }
            ViewerEvent::StartStream => {
                if !self.connected {
                    return Err(MicroscopeError::NotConnected.into());
                }
                if !self.streaming {
                    self.streaming = true;
                    self.refresh(scope);
                }
            }
            ViewerEvent::StopStream => {
                if self.streaming {
                    self.streaming = false;
                    self.pane = VideoPane::Stopped;
                }
            }
            ViewerEvent::Tick => {
                if self.streaming && self.connected {
                    self.refresh(scope);
                }
            }
            ViewerEvent::TakePhoto(path) => {
                let frame = self.last_frame.as_ref().ok_or(ViewerError::NoFrame)?;
                save_frame(frame, &path)?;
                self.message = Some(format!("Image saved: {}", path.display()));
            }
        }
        Ok(())
    }

    fn refresh<U: UsbBackend, C: CaptureBackend>(&mut self, scope: &mut Microscope<U, C>) {
        match scope.capture_frame() {
            Ok(frame) => {
                self.pane = VideoPane::Preview(render_preview(&frame, &self.preview));
                self.last_frame = Some(frame);
            }
            Err(e) => {
                log::debug!("No frame this tick: {}", e);
                self.pane = VideoPane::NoFrame;
            }
        }
    }

    /// The whole screen as lines of text.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();

        let status = if self.connected { "Connected" } else { "Not connected" };
        let stream = if self.streaming { "streaming" } else { "idle" };
        lines.push(format!(
            "{} | {} | Brightness: {}",
            status, stream, self.brightness
        ));
        for (key, value) in &self.info {
            lines.push(format!("{}: {}", key, value));
        }

        let rule = "-".repeat(self.preview.width as usize);
        lines.push(rule.clone());
        match &self.pane {
            VideoPane::NoVideo => lines.push("No video".to_string()),
            VideoPane::Stopped => lines.push("Video stopped".to_string()),
            VideoPane::NoFrame => lines.push("No frame (check lighting)".to_string()),
            VideoPane::Preview(preview) => lines.extend(preview.iter().cloned()),
        }
        lines.push(rule);

        if let Some(message) = &self.message {
            lines.push(message.clone());
        }
        lines
    }
}

/// Settings for [`run_watch`].
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub interval: Duration,
    pub brightness: Option<u8>,
    /// Save the last displayed frame here on exit
    pub save_last: Option<PathBuf>,
    pub preview: PreviewOptions,
}

/// Connect, then redraw the viewer every `interval` until `should_stop` returns true.
///
/// The session is always disconnected before returning. A rejected brightness
/// only produces a warning.
pub fn run_watch<U, C, W, F>(
    scope: &mut Microscope<U, C>,
    options: &WatchOptions,
    out: &mut W,
    mut should_stop: F,
) -> Result<ViewerState, ViewerError>
where
    U: UsbBackend,
    C: CaptureBackend,
    W: Write,
    F: FnMut() -> bool,
{
    let mut state = ViewerState::new(options.preview.clone());
    state.handle(scope, ViewerEvent::Connect)?;

    if let Some(level) = options.brightness {
        if let Err(e) = state.handle(scope, ViewerEvent::Brightness(level as i32)) {
            log::warn!("{}", e);
        }
    }

    let result = watch_loop(scope, &mut state, options, out, &mut should_stop);

    if let Some(path) = &options.save_last {
        if let Err(e) = state.handle(scope, ViewerEvent::TakePhoto(path.clone())) {
            log::warn!("{}", e);
        }
    }
    state.handle(scope, ViewerEvent::StopStream)?;
    state.handle(scope, ViewerEvent::Disconnect)?;

    result.map(|()| state)
}

fn watch_loop<U, C, W, F>(
    scope: &mut Microscope<U, C>,
    state: &mut ViewerState,
    options: &WatchOptions,
    out: &mut W,
    should_stop: &mut F,
) -> Result<(), ViewerError>
where
    U: UsbBackend,
    C: CaptureBackend,
    W: Write,
    F: FnMut() -> bool,
{
    state.handle(scope, ViewerEvent::StartStream)?;

    loop {
        write!(out, "{}", CLEAR_SCREEN)?;
        for line in state.render() {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;

        let deadline = Instant::now() + options.interval;
        loop {
            if should_stop() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_POLL));
        }

        state.handle(scope, ViewerEvent::Tick)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCapture, MockUsb, Recorder};
    use crate::session::MicroscopeSettings;

    fn scope(recorder: &Recorder) -> Microscope<MockUsb, MockCapture> {
        Microscope::with_backends(
            MicroscopeSettings::default(),
            MockUsb::present(recorder.clone()),
            MockCapture::working(recorder.clone()),
        )
    }

    fn small_preview() -> PreviewOptions {
        PreviewOptions {
            width: 16,
            height: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_state() {
        let state = ViewerState::new(small_preview());
        assert!(!state.is_connected());
        assert!(!state.is_streaming());
        assert_eq!(state.brightness(), 128);
        assert_eq!(state.pane(), &VideoPane::NoVideo);
        assert!(state.render()[0].starts_with("Not connected"));
    }

    #[test]
    fn test_connect_populates_info() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());

        state.handle(&mut scope, ViewerEvent::Connect).unwrap();
        assert!(state.is_connected());
        assert_eq!(state.info()["vendor_id"], "0x05e3");
        assert!(state.render().iter().any(|l| l == "product_id: 0xf12a"));
    }

    #[test]
    fn test_connect_failure_sets_message() {
        let recorder = Recorder::default();
        let mut scope = Microscope::with_backends(
            MicroscopeSettings::default(),
            MockUsb::absent(recorder.clone()),
            MockCapture::working(recorder.clone()),
        );
        let mut state = ViewerState::new(small_preview());

        assert!(state.handle(&mut scope, ViewerEvent::Connect).is_err());
        assert!(!state.is_connected());
        assert!(state.message().unwrap().contains("Microscope not found"));
    }

    #[test]
    fn test_brightness_while_disconnected_only_moves_slider() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());

        state.handle(&mut scope, ViewerEvent::Brightness(40)).unwrap();
        assert_eq!(state.brightness(), 40);
        assert!(recorder.property_sets().is_empty());
    }

    #[test]
    fn test_brightness_while_connected_reaches_session() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());
        state.handle(&mut scope, ViewerEvent::Connect).unwrap();

        state.handle(&mut scope, ViewerEvent::Brightness(200)).unwrap();
        assert_eq!(scope.brightness(), Some(200));
        assert!(matches!(
            state.handle(&mut scope, ViewerEvent::Brightness(999)),
            Err(ViewerError::Session(MicroscopeError::InvalidParameter { .. }))
        ));
        assert_eq!(state.brightness(), 200);
        assert!(state.render()[0].ends_with("Brightness: 200"));
        assert_eq!(scope.brightness(), Some(200));
    }

    #[test]
    fn test_out_of_range_brightness_rejected_while_disconnected() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());

        assert!(matches!(
            state.handle(&mut scope, ViewerEvent::Brightness(-40)),
            Err(ViewerError::Session(MicroscopeError::InvalidParameter { .. }))
        ));
        assert_eq!(state.brightness(), INITIAL_BRIGHTNESS);
        assert!(recorder.property_sets().is_empty());
    }

    #[test]
    fn test_backend_rejection_keeps_previous_level() {
        let recorder = Recorder::default();
        let mut scope = Microscope::with_backends(
            MicroscopeSettings::default(),
            MockUsb::present(recorder.clone()),
            MockCapture::working(recorder.clone()).rejecting_brightness(),
        );
        let mut state = ViewerState::new(small_preview());
        state.handle(&mut scope, ViewerEvent::Connect).unwrap();

        assert!(state.handle(&mut scope, ViewerEvent::Brightness(10)).is_err());
        assert_eq!(state.brightness(), INITIAL_BRIGHTNESS);
    }

    #[test]
    fn test_stream_requires_connection() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());

        let result = state.handle(&mut scope, ViewerEvent::StartStream);
        assert!(matches!(
            result,
            Err(ViewerError::Session(MicroscopeError::NotConnected))
        ));
        assert!(!state.is_streaming());
    }

    #[test]
    fn test_stream_shows_preview_and_stops() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());
        state.handle(&mut scope, ViewerEvent::Connect).unwrap();

        state.handle(&mut scope, ViewerEvent::StartStream).unwrap();
        assert!(matches!(state.pane(), VideoPane::Preview(_)));
        assert_eq!(recorder.reads(), 1);

        state.handle(&mut scope, ViewerEvent::Tick).unwrap();
        assert_eq!(recorder.reads(), 2);

        state.handle(&mut scope, ViewerEvent::StopStream).unwrap();
        assert_eq!(state.pane(), &VideoPane::Stopped);
        state.handle(&mut scope, ViewerEvent::Tick).unwrap();
        assert_eq!(recorder.reads(), 2);
    }

    #[test]
    fn test_tick_without_frame_shows_hint() {
        let recorder = Recorder::default();
        let mut scope = Microscope::with_backends(
            MicroscopeSettings::default(),
            MockUsb::present(recorder.clone()),
            MockCapture::working(recorder.clone()).without_frames(),
        );
        let mut state = ViewerState::new(small_preview());
        state.handle(&mut scope, ViewerEvent::Connect).unwrap();
        state.handle(&mut scope, ViewerEvent::StartStream).unwrap();

        assert_eq!(state.pane(), &VideoPane::NoFrame);
        assert!(!state.has_frame());
    }

    #[test]
    fn test_take_photo_without_frame_is_an_error() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");

        let result = state.handle(&mut scope, ViewerEvent::TakePhoto(path.clone()));
        assert!(matches!(result, Err(ViewerError::NoFrame)));
        assert!(!path.exists());
    }

    #[test]
    fn test_take_photo_saves_last_frame() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");

        state.handle(&mut scope, ViewerEvent::Connect).unwrap();
        state.handle(&mut scope, ViewerEvent::StartStream).unwrap();
        state
            .handle(&mut scope, ViewerEvent::TakePhoto(path.clone()))
            .unwrap();

        assert!(path.exists());
        assert!(state.message().unwrap().starts_with("Image saved"));
    }

    #[test]
    fn test_disconnect_resets_panel() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let mut state = ViewerState::new(small_preview());
        state.handle(&mut scope, ViewerEvent::Connect).unwrap();
        state.handle(&mut scope, ViewerEvent::StartStream).unwrap();

        state.handle(&mut scope, ViewerEvent::Disconnect).unwrap();
        assert!(!state.is_connected());
        assert!(!state.is_streaming());
        assert!(state.info().is_empty());
        assert_eq!(state.pane(), &VideoPane::NoVideo);
        assert!(!scope.is_connected());
    }

    #[test]
    fn test_run_watch_polls_until_stopped() {
        let recorder = Recorder::default();
        let mut scope = scope(&recorder);
        let dir = tempfile::tempdir().unwrap();
        let save_path = dir.path().join("last.png");
        let options = WatchOptions {
            interval: Duration::from_millis(1),
            brightness: Some(64),
            save_last: Some(save_path.clone()),
            preview: small_preview(),
        };

        let mut checks = 0;
        let mut out = Vec::new();
        let state = run_watch(&mut scope, &options, &mut out, || {
            checks += 1;
            checks > 3
        })
        .unwrap();

        assert!(!state.is_connected());
        assert!(!scope.is_connected());
        assert!(recorder.reads() >= 1);
        assert!(save_path.exists());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Connected | streaming | Brightness: 64"));
    }

    #[test]
    fn test_run_watch_without_device() {
        let recorder = Recorder::default();
        let mut scope = Microscope::with_backends(
            MicroscopeSettings::default(),
            MockUsb::absent(recorder.clone()),
            MockCapture::working(recorder.clone()),
        );
        let options = WatchOptions {
            interval: Duration::from_millis(1),
            brightness: None,
            save_last: None,
            preview: small_preview(),
        };

        let mut out = Vec::new();
        let result = run_watch(&mut scope, &options, &mut out, || true);
        assert!(matches!(
            result,
            Err(ViewerError::Session(MicroscopeError::DeviceNotFound { .. }))
        ));
        assert!(out.is_empty());
    }
}
