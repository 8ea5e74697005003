#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region bounding box, camera framing, and selector option types.
//!
//! These types carry no geometry of their own; the polygon data lives in
//! the spatial crate. They are shared by the filter engine, the renderer
//! and the interactive controls.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle enclosing a geometry, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its four edges.
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Midpoint of the box as `(lon, lat)`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::midpoint(self.min_lon, self.max_lon),
            f64::midpoint(self.min_lat, self.max_lat),
        )
    }

    /// Whether `(lon, lat)` lies inside or on the edge of the box.
    #[must_use]
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Map framing: a center point and a zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Center longitude.
    pub lon: f64,
    /// Center latitude.
    pub lat: f64,
    /// Zoom level in web-mercator tile units.
    pub zoom: f64,
}

impl Camera {
    /// Creates a camera centered on `(lon, lat)`.
    #[must_use]
    pub const fn new(lon: f64, lat: f64, zoom: f64) -> Self {
        Self { lon, lat, zoom }
    }
}

/// Label of the leading "no region constraint" selector option.
pub const ALL_REGIONS_LABEL: &str = "All regions";

/// One entry of the region selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegionOption {
    /// No region constraint.
    All,
    /// A single region.
    Region {
        /// Region identifier.
        id: String,
        /// Display name.
        name: String,
    },
}

impl RegionOption {
    /// Text shown in the selector.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_REGIONS_LABEL,
            Self::Region { name, .. } => name,
        }
    }

    /// Region id to filter by, or `None` for [`RegionOption::All`].
    #[must_use]
    pub fn region_id(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Region { id, .. } => Some(id),
        }
    }
}
