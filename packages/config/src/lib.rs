#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Layered configuration for the traffic map.
//!
//! Three layers, lowest precedence first:
//!
//! 1. `config/default.toml`, embedded at compile time via [`include_str!`].
//! 2. An optional user TOML file. Only the keys it sets are overridden;
//!    tables are merged recursively.
//! 3. Environment variables for the values most often changed per run
//!    ([`ENV_INCIDENTS_URL`], [`ENV_BOUNDARIES_URL`], [`ENV_OUTPUT`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use traffic_map_region_models::Camera;

/// Embedded default configuration.
const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Overrides [`SourcesConfig::incidents_url`].
pub const ENV_INCIDENTS_URL: &str = "TRAFFIC_MAP_INCIDENTS_URL";
/// Overrides [`SourcesConfig::boundaries_url`].
pub const ENV_BOUNDARIES_URL: &str = "TRAFFIC_MAP_BOUNDARIES_URL";
/// Overrides [`OutputConfig::figure_path`].
pub const ENV_OUTPUT: &str = "TRAFFIC_MAP_OUTPUT";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML text is malformed or does not match the schema.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("Invalid config value for `{key}`: {message}")]
    Invalid {
        /// Dotted key of the offending value.
        key: &'static str,
        /// Description of what went wrong.
        message: String,
    },
}

/// Complete traffic map configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Remote data sources.
    pub sources: SourcesConfig,
    /// Map framing and styling.
    pub map: MapStyleConfig,
    /// Where rendered figures are written.
    pub output: OutputConfig,
}

/// Remote data source locations and fetch policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// URL of the incident CSV.
    pub incidents_url: String,
    /// URL of the region boundary `GeoJSON` `FeatureCollection`.
    pub boundaries_url: String,
    /// Retries per resource for transient HTTP failures.
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// A `(lon, lat)` pair as written in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
}

/// Map framing and styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStyleConfig {
    /// Base map style name passed to the rendering engine.
    pub style: String,
    /// Center of the national overview.
    pub national_center: LonLat,
    /// Zoom of the national overview.
    pub national_zoom: f64,
    /// Zoom used when a single region is selected.
    pub region_zoom: f64,
    /// Incident marker size in pixels.
    pub marker_size: f64,
    /// Incident marker opacity (0-1).
    pub marker_opacity: f64,
    /// Line color forced onto region outlines when toggled.
    pub outline_color: String,
    /// Region outline width in pixels.
    pub outline_width: f64,
}

impl MapStyleConfig {
    /// Camera for the national overview.
    #[must_use]
    pub const fn national_camera(&self) -> Camera {
        Camera::new(
            self.national_center.lon,
            self.national_center.lat,
            self.national_zoom,
        )
    }
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the figure JSON rewritten after every render.
    pub figure_path: PathBuf,
}

impl Default for MapConfig {
    fn default() -> Self {
        // The embedded file is covered by `embedded_default_parses`.
        Self::from_toml_str(DEFAULT_TOML).expect("embedded default config must parse")
    }
}

impl MapConfig {
    /// Parses a complete configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed, incomplete, or
    /// contains out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from the embedded defaults, an optional
    /// override file, and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the override file cannot be read or the
    /// merged result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let overrides = match path {
            Some(path) => {
                log::info!("Loading config overrides from {}", path.display());
                Some(
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?,
                )
            }
            None => None,
        };

        Self::layered(overrides.as_deref(), |key| std::env::var(key).ok())
    }

    /// Merges `overrides` over the embedded defaults, then applies
    /// environment overrides resolved through `env`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if either TOML text is malformed or the
    /// merged result is invalid.
    pub fn layered(
        overrides: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut table: toml::Table = DEFAULT_TOML.parse()?;
        if let Some(text) = overrides {
            let user: toml::Table = text.parse()?;
            merge_tables(&mut table, user);
        }

        let mut config: Self = toml::Value::Table(table).try_into()?;
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env(ENV_INCIDENTS_URL) {
            log::debug!("{ENV_INCIDENTS_URL} overrides incidents URL");
            self.sources.incidents_url = url;
        }
        if let Some(url) = env(ENV_BOUNDARIES_URL) {
            log::debug!("{ENV_BOUNDARIES_URL} overrides boundaries URL");
            self.sources.boundaries_url = url;
        }
        if let Some(path) = env(ENV_OUTPUT) {
            log::debug!("{ENV_OUTPUT} overrides figure path");
            self.output.figure_path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.incidents_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "sources.incidents_url",
                message: "must not be empty".to_string(),
            });
        }
        if self.sources.boundaries_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "sources.boundaries_url",
                message: "must not be empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.map.marker_opacity) {
            return Err(ConfigError::Invalid {
                key: "map.marker_opacity",
                message: format!("{} is outside 0-1", self.map.marker_opacity),
            });
        }
        for (key, zoom) in [
            ("map.national_zoom", self.map.national_zoom),
            ("map.region_zoom", self.map.region_zoom),
        ] {
            if !zoom.is_finite() || zoom < 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("{zoom} is not a valid zoom level"),
                });
            }
        }
        Ok(())
    }
}

/// Recursively merges `overlay` into `base`. Non-table values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn embedded_default_parses() {
        let config = MapConfig::from_toml_str(DEFAULT_TOML).unwrap();
        assert!((config.map.region_zoom - 6.0).abs() < f64::EPSILON);
        assert_eq!(config.map.outline_color, "#444444");
    }

    #[test]
    fn national_camera_uses_configured_center() {
        let config = MapConfig::default();
        let camera = config.map.national_camera();
        assert!((camera.lon - config.map.national_center.lon).abs() < f64::EPSILON);
        assert!((camera.lat - config.map.national_center.lat).abs() < f64::EPSILON);
        assert!((camera.zoom - config.map.national_zoom).abs() < f64::EPSILON);
    }

    #[test]
    fn override_file_merges_single_keys() {
        let config = MapConfig::layered(
            Some(
                r#"
                [map]
                region_zoom = 7.5

                [sources]
                incidents_url = "https://data.example/incidents.csv"
                "#,
            ),
            no_env,
        )
        .unwrap();

        assert!((config.map.region_zoom - 7.5).abs() < f64::EPSILON);
        assert_eq!(
            config.sources.incidents_url,
            "https://data.example/incidents.csv"
        );
        // Untouched keys keep their defaults.
        assert_eq!(config.map, MapStyleConfig {
            region_zoom: 7.5,
            ..MapConfig::default().map
        });
        assert_eq!(
            config.sources.boundaries_url,
            MapConfig::default().sources.boundaries_url
        );
    }

    #[test]
    fn env_overrides_win_over_files() {
        let config = MapConfig::layered(
            Some("[output]\nfigure_path = \"from-file.json\"\n"),
            |key| match key {
                ENV_OUTPUT => Some("from-env.json".to_string()),
                ENV_BOUNDARIES_URL => Some("https://data.example/regions.geojson".to_string()),
                _ => None,
            },
        )
        .unwrap();

        assert_eq!(config.output.figure_path, PathBuf::from("from-env.json"));
        assert_eq!(
            config.sources.boundaries_url,
            "https://data.example/regions.geojson"
        );
    }

    #[test]
    fn rejects_out_of_range_opacity() {
        let err = MapConfig::layered(Some("[map]\nmarker_opacity = 1.5\n"), no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "map.marker_opacity",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = MapConfig::layered(Some("[map\n"), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
