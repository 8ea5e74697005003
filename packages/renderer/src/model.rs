//! Render payloads handed to a [`MapBackend`](crate::backend::MapBackend).
//!
//! These are plain owned values so they can cross into the render worker
//! task without borrowing from the session.

use serde::{Serialize, Serializer};
use traffic_map_config::MapStyleConfig;
use traffic_map_incident_models::IncidentRow;
use traffic_map_spatial::Region;

/// Positions, colors and hover labels of the incident point layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointLayer {
    /// Longitudes, one per point.
    pub lon: Vec<f64>,
    /// Latitudes, one per point.
    pub lat: Vec<f64>,
    /// Marker colors, one per point.
    pub color: Vec<&'static str>,
    /// Hover labels, one per point.
    pub text: Vec<String>,
}

impl PointLayer {
    /// Builds the layer from rows, coloring each by its year.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a IncidentRow>) -> Self {
        let mut layer = Self::default();
        for row in rows {
            layer.lon.push(row.longitude);
            layer.lat.push(row.latitude);
            layer.color.push(row.color());
            layer.text.push(hover_text(row));
        }
        layer
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lon.len()
    }

    /// Whether the layer has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }
}

fn hover_text(row: &IncidentRow) -> String {
    let year = row
        .year
        .map_or_else(|| "unknown year".to_string(), |y| y.to_string());
    match (row.severity.is_empty(), row.vehicle_mass.is_empty()) {
        (true, true) => format!("{} ({year})", row.id),
        (false, true) => format!("{} ({year}): {}", row.id, row.severity),
        (true, false) => format!("{} ({year}), {}", row.id, row.vehicle_mass),
        (false, false) => format!(
            "{} ({year}): {}, {}",
            row.id, row.severity, row.vehicle_mass
        ),
    }
}

/// One region outline overlay: the exterior ring of a single polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineTrace {
    /// Name of the region the polygon belongs to.
    pub name: String,
    /// Ring longitudes.
    pub lon: Vec<f64>,
    /// Ring latitudes.
    pub lat: Vec<f64>,
}

impl OutlineTrace {
    /// One trace per polygon of `region`.
    #[must_use]
    pub fn from_region(region: &Region) -> Vec<Self> {
        region
            .outline_paths()
            .into_iter()
            .map(|path| {
                let (lon, lat) = path.into_iter().unzip();
                Self {
                    name: region.name.clone(),
                    lon,
                    lat,
                }
            })
            .collect()
    }
}

/// Visibility of an overlay trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceVisibility {
    /// Drawn.
    Visible,
    /// Not drawn, but still listed in the legend.
    LegendOnly,
    /// Not drawn and not listed.
    Hidden,
}

impl Serialize for TraceVisibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Visible => serializer.serialize_bool(true),
            Self::LegendOnly => serializer.serialize_str("legendonly"),
            Self::Hidden => serializer.serialize_bool(false),
        }
    }
}

/// Fixed styling applied by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    /// Base map style name.
    pub map_style: String,
    /// Incident marker size in pixels.
    pub marker_size: f64,
    /// Incident marker opacity.
    pub marker_opacity: f64,
    /// Outline line color.
    pub outline_color: String,
    /// Outline line width in pixels.
    pub outline_width: f64,
}

impl From<&MapStyleConfig> for RenderStyle {
    fn from(config: &MapStyleConfig) -> Self {
        Self {
            map_style: config.style.clone(),
            marker_size: config.marker_size,
            marker_opacity: config.marker_opacity,
            outline_color: config.outline_color.clone(),
            outline_width: config.outline_width,
        }
    }
}
