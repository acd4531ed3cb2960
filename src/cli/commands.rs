//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::args::{Args, Command, ConfigAction, Payload};
use super::live::run_live;
use crate::ascii::{render_preview, ImageStats, PreviewOptions};
use crate::camera::{self, load_frame, save_frame, Frame, NokhwaBackend};
use crate::config::{default_path, Config, DEFAULT_CONFIG};
use crate::error::MicroscopeError;
use crate::interrupt::ctrlc_received;
use crate::session::{Microscope, MicroscopeSettings};
use crate::usb::{scanner, RusbBackend, UsbBackend, UsbError};
use crate::viewer::{run_watch, WatchOptions};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Levels visited by `demo`, one second apart.
pub const DEMO_BRIGHTNESS_STEPS: [i32; 5] = [0, 64, 128, 192, 255];

const RULE_WIDTH: usize = 60;

/// Effective settings: config file values with command-line overrides applied.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub settings: MicroscopeSettings,
    pub preview: PreviewOptions,
}

impl Context {
    pub fn from_args(args: &Args) -> Result<Self, crate::config::ConfigError> {
        let config_path = args.config.clone().unwrap_or_else(default_path);
        let config = Config::load(Some(config_path.as_path()))?;
        Ok(Self::with_overrides(config, config_path, args))
    }

    fn with_overrides(config: Config, config_path: PathBuf, args: &Args) -> Self {
        let mut settings = config.microscope_settings();
        if let Some(vendor_id) = args.vendor_id {
            settings.vendor_id = vendor_id;
        }
        if let Some(product_id) = args.product_id {
            settings.product_id = product_id;
        }
        if let Some(index) = args.video_index {
            settings.video_index = index;
        }

        let mut preview = config.preview_options();
        if let Some(charset) = args.charset {
            preview.charset = charset.into();
        }
        preview.invert |= args.invert;

        Self {
            config,
            config_path,
            settings,
            preview,
        }
    }

    fn microscope(&self) -> Microscope {
        let usb = RusbBackend::new(self.config.control_timeout());
        let capture = NokhwaBackend::new(self.settings.resolution, self.settings.fps);
        Microscope::with_backends(self.settings.clone(), usb, capture)
    }

    /// Open a session, printing the outcome the way every connecting command does.
    fn connect(&self) -> Result<Microscope, MicroscopeError> {
        let mut scope = self.microscope();
        match scope.connect() {
            Ok(identity) => println!("Microscope connected: {}", identity),
            Err(e) => {
                if matches!(e, MicroscopeError::DeviceNotFound { .. }) {
                    eprintln!("Make sure the USB microscope is plugged in, or run `microscope scan`.");
                }
                return Err(e);
            }
        }
        Ok(scope)
    }
}

/// Dispatch a parsed command line.
pub fn run(args: Args) -> CommandResult {
    let ctx = Context::from_args(&args)?;

    match args.command {
        Command::Info { json, brightness } => info(&ctx, json, brightness),
        Command::Scan => scan(),
        Command::Cameras => list_cameras(&ctx),
        Command::Capture { output, no_preview } => capture(&ctx, output, no_preview),
        Command::Live => live(&ctx),
        Command::View {
            image,
            width,
            height,
        } => view(&ctx, &image, width, height),
        Command::Demo => demo(&ctx),
        Command::Watch {
            interval,
            brightness,
            save_last,
        } => watch(&ctx, interval, brightness, save_last),
        Command::Control {
            request,
            value,
            index,
            data,
        } => control(&ctx, request, value, index, data),
        Command::Config { action } => handle_config_action(&ctx, action),
    }
}

fn info(ctx: &Context, json: bool, brightness: Option<u8>) -> CommandResult {
    let mut scope = ctx.connect()?;

    if let Some(level) = brightness {
        scope.set_brightness(level as i32)?;
        println!("Brightness set: {}", level);
    }

    let info = scope.device_info();
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Device Information:");
        for (key, value) in &info {
            println!("  {}: {}", key, value);
        }
    }

    scope.disconnect();
    Ok(())
}

/// List every USB device, then the ones that look like microscopes.
fn scan() -> CommandResult {
    println!("Scanning connected USB devices...");
    println!("{}", "-".repeat(RULE_WIDTH));

    let devices = match RusbBackend::default().enumerate() {
        Ok(devices) => devices,
        Err(UsbError::PermissionDenied) => return Err(MicroscopeError::PermissionDenied.into()),
        Err(e) => return Err(e.into()),
    };

    for device in &devices {
        println!("{}", scanner::format_device(device));
        println!("{}", "-".repeat(RULE_WIDTH));
    }

    println!("\nSearching for microscope candidate devices...");
    let candidates = scanner::find_candidates(&devices);
    if candidates.is_empty() {
        println!("No microscope candidates found.");
        println!("Please check devices manually.");
    } else {
        println!("Microscope candidate devices:");
        for (i, device) in candidates.iter().enumerate() {
            println!("{}", scanner::format_candidate(i + 1, device));
        }
    }
    Ok(())
}

/// List available capture devices and print them to stdout.
pub fn list_cameras(ctx: &Context) -> CommandResult {
    let devices = camera::list_devices()?;
    if devices.is_empty() {
        println!("No video devices found.");
        println!();
        println!("Make sure the microscope is connected and camera access is granted.");
        return Ok(());
    }

    println!("Available video devices:");
    for line in camera::format_device_list(&devices, ctx.settings.video_index) {
        println!("{}", line);
    }
    println!();
    println!(
        "* marks the configured index ({}). Use --video-index <index> to select another.",
        ctx.settings.video_index
    );
    Ok(())
}

fn capture(ctx: &Context, output: Option<PathBuf>, no_preview: bool) -> CommandResult {
    let mut scope = ctx.connect()?;
    println!("Capturing image...");
    let frame = scope.capture_frame()?;
    scope.disconnect();

    let path = output.unwrap_or_else(|| ctx.config.capture.output.clone());
    save_frame(&frame, &path)?;

    println!("Capture successful! Image size: {}x{}", frame.width, frame.height);
    println!("Image saved: {}", path.display());
    if let Some((min, max)) = frame.pixel_range() {
        println!("Image range: {} ~ {}", min, max);
    }

    if !no_preview {
        println!("\nMicroscope image preview:");
        print_preview(&frame, &ctx.preview);
    }
    Ok(())
}

fn live(ctx: &Context) -> CommandResult {
    let mut scope = ctx.connect()?;
    let result = run_live(&mut scope, &ctx.preview, Path::new(""));
    scope.disconnect();
    println!("Microscope disconnected");
    result?;
    Ok(())
}

fn view(ctx: &Context, image: &Path, width: u16, height: u16) -> CommandResult {
    let frame = load_frame(image)?;

    println!("Original image size: {}x{}", frame.width, frame.height);
    if let Some((min, max)) = frame.pixel_range() {
        println!("Pixel value range: {} ~ {}", min, max);
    }

    let options = PreviewOptions {
        width,
        height,
        ..ctx.preview.clone()
    };
    println!("\nMicroscope image preview (up to {}x{}):", width, height);
    print_preview(&frame, &options);

    if let Some(stats) = ImageStats::from_frame(&frame) {
        println!("\nImage statistics:");
        println!("{}", stats);
    }
    println!("\nOriginal image file: {}", image.display());
    Ok(())
}

/// Walk through connect, info, a brightness sweep and one capture.
fn demo(ctx: &Context) -> CommandResult {
    println!("=== USB Microscope Demo ===");
    let mut scope = ctx.connect()?;

    println!("\nDevice Information:");
    for (key, value) in scope.device_info() {
        println!("  {}: {}", key, value);
    }

    println!("\nBrightness control test...");
    for level in DEMO_BRIGHTNESS_STEPS {
        if ctrlc_received() {
            println!("Interrupted by user");
            return Ok(());
        }
        print!("  Setting brightness to {}... ", level);
        match scope.set_brightness(level) {
            Ok(()) => println!("ok"),
            Err(e) => println!("failed ({})", e),
        }
        thread::sleep(Duration::from_secs(1));
    }

    println!("\nFrame capture test...");
    match scope.capture_frame() {
        Ok(frame) => println!("  Frame capture successful! {}x{}", frame.width, frame.height),
        Err(e) => println!("  Frame capture failed: {}", e),
    }

    scope.disconnect();
    println!("\nComplete!");
    Ok(())
}

fn watch(
    ctx: &Context,
    interval: Option<u64>,
    brightness: Option<u8>,
    save_last: Option<PathBuf>,
) -> CommandResult {
    let options = WatchOptions {
        interval: interval
            .map(Duration::from_millis)
            .unwrap_or_else(|| ctx.config.watch_interval()),
        brightness,
        save_last,
        preview: ctx.preview.clone(),
    };

    let mut scope = ctx.microscope();
    let mut stdout = std::io::stdout();
    let state = run_watch(&mut scope, &options, &mut stdout, ctrlc_received)?;
    if let Some(message) = state.message() {
        println!("{}", message);
    }
    Ok(())
}

fn control(
    ctx: &Context,
    request: u8,
    value: u16,
    index: u16,
    data: Option<Payload>,
) -> CommandResult {
    let mut scope = ctx.connect()?;
    let payload = data.as_ref().map(|p| p.0.as_slice());
    scope.send_control_command(request, value, index, payload)?;

    match payload {
        Some(bytes) if !bytes.is_empty() => println!(
            "Control request 0x{:02x} sent with {} byte(s): {}",
            request,
            bytes.len(),
            hex::encode(bytes)
        ),
        _ => println!("Control request 0x{:02x} completed", request),
    }
    scope.disconnect();
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(ctx: &Context, action: ConfigAction) -> CommandResult {
    let config_path = &ctx.config_path;
    match action {
        ConfigAction::Show => {
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found, using defaults)", config_path.display());
            }
            println!();
            println!("Current configuration:");
            print!("{}", ctx.config.to_toml()?);
        }
        ConfigAction::Init => {
            if config_path.exists() {
                eprintln!("Config file already exists: {}", config_path.display());
                eprintln!("Use 'microscope config show' to view current settings.");
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(config_path, DEFAULT_CONFIG)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

fn print_preview(frame: &Frame, options: &PreviewOptions) {
    let lines = render_preview(frame, options);
    let rule = "=".repeat(lines.first().map_or(0, |l| l.chars().count()));
    println!("{}", rule);
    for line in lines {
        println!("{}", line);
    }
    println!("{}", rule);
}
