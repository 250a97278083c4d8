use crate::error::{GeoRangeError, ParseError, QuakeMapResult};
use crate::raster::Extent;
use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::path::Path;

/// One earthquake as far as the map cares: where, how big, and a label.
#[derive(Clone, Debug, PartialEq)]
pub struct EarthquakeEvent {
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    pub event_id: Option<String>,
}

impl EarthquakeEvent {
    pub fn new(
        latitude: f64,
        longitude: f64,
        magnitude: f64,
        event_id: Option<String>,
    ) -> Result<Self, GeoRangeError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoRangeError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoRangeError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            magnitude,
            event_id,
        })
    }

    /// Decode an early-warning JSON document.
    pub fn from_event_file<P: AsRef<Path>>(path: P) -> QuakeMapResult<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| ParseError::EventFile {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let doc: EventDocument = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::new(
            doc.latitude,
            doc.longitude,
            doc.magnitude,
            doc.event_id.and_then(event_id_string),
        )?)
    }

    /// Square view of `half_width` degrees around the epicenter.
    pub fn extent(&self, half_width: f64) -> Extent {
        Extent::around(self.longitude, self.latitude, half_width)
    }

    pub fn title(&self) -> String {
        match &self.event_id {
            Some(id) => format!("Earthquake - {id}"),
            None => "Earthquake".to_string(),
        }
    }
}

impl Display for EarthquakeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "M{} at ({}, {}) [{}]",
            self.magnitude,
            self.latitude,
            self.longitude,
            self.event_id.as_deref().unwrap_or("-")
        )
    }
}

// JMA feeds spell it "Magunitude", CENC feeds "Magnitude"
#[derive(Deserialize)]
struct EventDocument {
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Magunitude", alias = "Magnitude")]
    magnitude: f64,
    #[serde(rename = "EventID", default)]
    event_id: Option<serde_json::Value>,
}

fn event_id_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
