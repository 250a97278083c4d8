use anyhow::ensure;
use clap::Parser;
use quakemap::config::{FigureConfig, ServiceConfig, DEFAULT_RASTER};
use quakemap::service::{self, QuakeMapService};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Render earthquake epicenter maps over a GeoTIFF basemap.
///
/// With EVENT_FILE and OUTPUT renders once. Without them reads
/// `<latitude> <longitude> <magnitude> <event_id> <output_file_path>`
/// requests from stdin, one per line.
#[derive(Parser, Debug)]
#[command(name = "quakemap", version)]
struct Args {
    /// Basemap GeoTIFF in geographic coordinates
    #[arg(long, env = "QUAKEMAP_RASTER", default_value = DEFAULT_RASTER)]
    raster: PathBuf,

    /// Directory of land/ocean/coastline/borders/lakes/rivers GeoJSON layers
    #[arg(long, env = "QUAKEMAP_FEATURES_DIR")]
    features_dir: Option<PathBuf>,

    /// TrueType font for labels
    #[arg(long, env = "QUAKEMAP_FONT")]
    font: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    width: u32,

    #[arg(long, default_value_t = 1000)]
    height: u32,

    #[arg(long, default_value_t = 100.0)]
    dpi: f32,

    /// Degrees shown on each side of the epicenter
    #[arg(long, default_value_t = 5.0)]
    half_extent: f64,

    /// JSON early-warning event
    #[arg(requires = "output")]
    event_file: Option<PathBuf>,

    output: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> anyhow::Result<ServiceConfig> {
        ensure!(self.width > 0 && self.height > 0, "figure size must be non-zero");
        ensure!(self.dpi > 0.0, "dpi must be positive");
        ensure!(
            self.half_extent.is_finite() && self.half_extent > 0.0,
            "half extent must be a positive number of degrees"
        );
        Ok(ServiceConfig {
            raster: self.raster.clone(),
            features_dir: self.features_dir.clone(),
            font: self.font.clone(),
            figure: FigureConfig {
                width_px: self.width,
                height_px: self.height,
                dpi: self.dpi,
                half_extent: self.half_extent,
            },
        })
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Stdout carries the protocol, logs go to stderr
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = args.config()?;
    let (stdout, stderr) = (io::stdout(), io::stderr());
    let status = match (&args.event_file, &args.output) {
        (Some(event_file), Some(output)) => service::run_single_shot(
            config,
            event_file,
            output,
            &mut stdout.lock(),
            &mut stderr.lock(),
        ),
        _ => {
            info!("Streaming requests from stdin");
            let mut service = QuakeMapService::start_lenient(config);
            service::run_streaming(
                &mut service,
                &mut io::stdin().lock(),
                &mut stdout.lock(),
                &mut stderr.lock(),
            )
        }
    };
    Ok(ExitCode::from(status as u8))
}
