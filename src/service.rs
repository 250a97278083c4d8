//! Request handling shared by the single-shot and streaming entry points.

use crate::config::ServiceConfig;
use crate::error::{GeoRangeError, QuakeMapError, QuakeMapResult, RenderError, USAGE};
use crate::event::EarthquakeEvent;
use crate::raster::RasterResource;
use crate::render::basemap::Basemap;
use crate::render::text::TextRenderer;
use crate::render::MapRenderer;
use crate::request::{self, RenderRequest};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub const BANNER: &str = "Service started. Waiting for input:";

/// Owns the raster and drawing resources for the life of the process.
#[derive(Debug)]
pub struct QuakeMapService {
    config: ServiceConfig,
    raster: Option<RasterResource>,
    renderer: MapRenderer,
}

impl QuakeMapService {
    /// Fails if the raster cannot be opened.
    pub fn start(config: ServiceConfig) -> QuakeMapResult<Self> {
        let raster = RasterResource::open(&config.raster).map_err(QuakeMapError::Startup)?;
        Ok(Self::with_raster(config, Some(raster)))
    }

    /// Opens the raster if possible, otherwise retries on each request.
    pub fn start_lenient(config: ServiceConfig) -> Self {
        let raster = match RasterResource::open(&config.raster) {
            Ok(raster) => Some(raster),
            Err(e) => {
                warn!("Raster {} unavailable at startup: {e}", config.raster.display());
                None
            }
        };
        Self::with_raster(config, raster)
    }

    fn with_raster(config: ServiceConfig, raster: Option<RasterResource>) -> Self {
        let basemap = Basemap::load_configured(config.features_dir.as_deref());
        let text = TextRenderer::load(config.font.as_deref());
        let renderer = MapRenderer::new(config.figure.clone(), basemap, text);
        Self {
            config,
            raster,
            renderer,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn renderer(&self) -> &MapRenderer {
        &self.renderer
    }

    fn raster(&mut self) -> Result<&RasterResource, GeoRangeError> {
        if self.raster.is_none() {
            let raster = RasterResource::open(&self.config.raster)
                .map_err(|e| GeoRangeError::RasterUnavailable(e.to_string()))?;
            info!("Raster {} opened on retry", self.config.raster.display());
            self.raster = Some(raster);
        }
        self.raster
            .as_ref()
            .ok_or_else(|| GeoRangeError::RasterUnavailable(self.config.raster.display().to_string()))
    }

    /// Render one event to `output`, returning the absolute output path.
    pub fn render_event(&mut self, event: &EarthquakeEvent, output: &Path) -> QuakeMapResult<PathBuf> {
        let extent = event.extent(self.config.figure.half_extent);
        let raster = self.raster()?;
        let (pixels, window_extent) = raster
            .extract_window(&extent)
            .map_err(GeoRangeError::Raster)?;
        if !window_extent.contains(event.longitude, event.latitude) {
            return Err(GeoRangeError::EpicenterOutside {
                longitude: event.longitude,
                latitude: event.latitude,
                coverage: raster.extent(),
            }
            .into());
        }
        debug!(
            "Window {}x{} covering {window_extent}",
            pixels.width, pixels.height
        );
        self.renderer.render(event, &pixels, &window_extent, output)?;
        absolute(output)
    }

    pub fn process(&mut self, request: &RenderRequest) -> QuakeMapResult<PathBuf> {
        self.render_event(&request.event, &request.output)
    }
}

fn absolute(path: &Path) -> QuakeMapResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(RenderError::Write)?;
    Ok(cwd.join(path))
}

/// Render one event file. Returns the process exit status.
pub fn run_single_shot<O: Write, E: Write>(
    config: ServiceConfig,
    event_file: &Path,
    output: &Path,
    out: &mut O,
    err: &mut E,
) -> i32 {
    let result = QuakeMapService::start(config).and_then(|mut service| {
        let event = EarthquakeEvent::from_event_file(event_file)?;
        info!("Rendering {event}");
        service.render_event(&event, output)
    });
    match result {
        Ok(path) => {
            let _ = writeln!(out, "Earthquake map saved to: {}", path.display());
            let _ = out.flush();
            0
        }
        Err(e) => {
            let _ = writeln!(err, "Error: {e}");
            let _ = err.flush();
            1
        }
    }
}

/// Serve requests line by line until end of input. Returns the process exit status.
pub fn run_streaming<R: BufRead, O: Write, E: Write>(
    service: &mut QuakeMapService,
    input: &mut R,
    out: &mut O,
    err: &mut E,
) -> i32 {
    let _ = writeln!(out, "{BANNER} {USAGE}");
    let _ = out.flush();

    let mut buffer = vec![];
    loop {
        buffer.clear();
        match input.read_until(b'\n', &mut buffer) {
            Ok(0) => {
                info!("End of input");
                return 0;
            }
            Ok(_) => {}
            Err(e) => {
                let _ = writeln!(err, "Error: failed to read input: {e}");
                let _ = err.flush();
                return 1;
            }
        }

        let line = String::from_utf8_lossy(&buffer);
        let start = Instant::now();
        let result = request::parse(&line).and_then(|request| match request {
            Some(request) => service.process(&request).map(Some),
            None => Ok(None),
        });
        match result {
            Ok(Some(path)) => {
                let _ = writeln!(out, "Success: {}", path.display());
                let _ = writeln!(
                    out,
                    "Processing time: {:.2} seconds",
                    start.elapsed().as_secs_f64()
                );
            }
            Ok(None) => debug!("Skipping blank line"),
            Err(e) => {
                warn!("Request failed: {e}");
                let _ = writeln!(err, "Error: {e}");
            }
        }
        let _ = out.flush();
        let _ = err.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    fn missing_raster_config() -> ServiceConfig {
        ServiceConfig {
            raster: PathBuf::from("/nonexistent/basemap.tif"),
            ..ServiceConfig::default()
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "broken pipe"))
        }
    }

    #[test]
    fn single_shot_needs_the_raster() {
        let (mut out, mut err) = (vec![], vec![]);
        let status = run_single_shot(
            missing_raster_config(),
            Path::new("event.json"),
            Path::new("out.png"),
            &mut out,
            &mut err,
        );
        assert_eq!(status, 1);
        assert!(out.is_empty());
        assert!(String::from_utf8(err).unwrap().starts_with("Error: cannot open raster"));
    }

    #[test]
    fn streaming_reports_missing_raster_per_request() {
        let mut service = QuakeMapService::start_lenient(missing_raster_config());
        let mut input = Cursor::new("35.5 139.5 3.2 a a.png\n\n35.5 139.5 3.2 b b.png\n");
        let (mut out, mut err) = (vec![], vec![]);
        let status = run_streaming(&mut service, &mut input, &mut out, &mut err);
        assert_eq!(status, 0);

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().collect::<Vec<_>>(), vec![format!("{BANNER} {USAGE}")]);
        let err = String::from_utf8(err).unwrap();
        assert_eq!(err.matches("Error: raster unavailable").count(), 2);
    }

    #[test]
    fn streaming_exits_on_read_failure() {
        let mut service = QuakeMapService::start_lenient(missing_raster_config());
        let mut input = io::BufReader::new(FailingReader);
        let (mut out, mut err) = (vec![], vec![]);
        assert_eq!(run_streaming(&mut service, &mut input, &mut out, &mut err), 1);
        assert!(String::from_utf8(err).unwrap().contains("failed to read input"));
    }

    #[test]
    fn relative_outputs_are_made_absolute() {
        let path = absolute(Path::new("maps/out.png")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("maps/out.png"));
        assert_eq!(absolute(Path::new("/tmp/x.png")).unwrap(), PathBuf::from("/tmp/x.png"));
    }
}
