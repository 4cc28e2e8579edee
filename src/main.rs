//! Mask compliance monitor: real-time face mask detection with compliance statistics.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use mask_compliance_monitor::{
    app::{AppConfig, MaskWatchApp, VideoSource},
    config::Config,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long, default_value = "0")]
    cam: i32,

    /// Video file to process instead of a camera
    #[arg(short, long)]
    video: Option<String>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Initial mask sensitivity (0.01 to 0.99)
    #[arg(short, long)]
    sensitivity: Option<f32>,

    /// Folder for reports and recordings
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    if args.print_config {
        print!("{}", mask_compliance_monitor::config::EXAMPLE_CONFIG);
        return Ok(());
    }

    info!("Mask Compliance Monitor v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };

    // Command line overrides the file
    if let Some(sensitivity) = args.sensitivity {
        settings.classifier.sensitivity = sensitivity;
    }
    if let Some(output) = args.output {
        settings.output.folder = output;
    }
    settings.validate().context("Invalid configuration")?;

    let config = AppConfig {
        video_source: match args.video {
            Some(path) => VideoSource::File(path),
            None => VideoSource::Camera(args.cam),
        },
        settings,
        headless: args.headless,
        max_frames: args.max_frames,
    };

    let mut app = MaskWatchApp::new(config).context("Failed to start monitor")?;
    app.run()?;

    Ok(())
}
