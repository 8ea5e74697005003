#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic incident row types and the fixed year color table.
//!
//! Every incident shown on the map is an [`IncidentRow`]. Raw CSV records
//! arrive as [`RawIncidentRecord`] and are normalized by the loader; rows
//! whose coordinates do not parse never become an [`IncidentRow`].

use serde::{Deserialize, Serialize};

/// Marker color used for years outside [`YEAR_COLORS`].
pub const NEUTRAL_COLOR: &str = "#bcbd22";

/// Fixed year → marker color table.
///
/// Colors follow the Plotly "D3" qualitative palette so the legend matches
/// what the charting engine would pick on its own.
pub const YEAR_COLORS: &[(i32, &str)] = &[
    (2014, "#1f77b4"),
    (2015, "#ff7f0e"),
    (2016, "#2ca02c"),
    (2017, "#d62728"),
    (2018, "#9467bd"),
    (2019, "#8c564b"),
    (2020, "#e377c2"),
    (2021, "#7f7f7f"),
];

/// Returns the marker color for `year`, falling back to [`NEUTRAL_COLOR`].
#[must_use]
pub fn color_for_year(year: i32) -> &'static str {
    YEAR_COLORS
        .iter()
        .find(|(y, _)| *y == year)
        .map_or(NEUTRAL_COLOR, |(_, color)| color)
}

/// One entry of the static year legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    /// Year label.
    pub year: i32,
    /// Marker color for the year.
    pub color: &'static str,
}

/// Returns the legend entries in ascending year order.
#[must_use]
pub fn legend_entries() -> Vec<LegendEntry> {
    YEAR_COLORS
        .iter()
        .map(|&(year, color)| LegendEntry { year, color })
        .collect()
}

/// A single CSV record exactly as it appears in the incident dataset.
///
/// Every field is kept as a string; numeric conversion happens during
/// normalization so that malformed values can be dropped instead of
/// failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawIncidentRecord {
    /// Incident identifier.
    #[serde(default)]
    pub id: String,
    /// Year the incident happened.
    #[serde(default)]
    pub year: String,
    /// Longitude (WGS84).
    #[serde(default)]
    pub lon: String,
    /// Latitude (WGS84).
    #[serde(default)]
    pub lat: String,
    /// Severity label.
    #[serde(default, rename = "Seriousness")]
    pub seriousness: String,
    /// Vehicle mass class.
    #[serde(default)]
    pub vehicle_mass: String,
}

/// A validated incident in the working set.
///
/// `longitude` and `latitude` are always finite. `year` is `None` when the
/// source value was not a number; such rows stay in the working set but
/// never match a year selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRow {
    /// Incident identifier.
    pub id: String,
    /// Year the incident happened.
    pub year: Option<i32>,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Severity label.
    pub severity: String,
    /// Vehicle mass class.
    pub vehicle_mass: String,
}

impl IncidentRow {
    /// Marker color for this row's year.
    #[must_use]
    pub fn color(&self) -> &'static str {
        self.year.map_or(NEUTRAL_COLOR, color_for_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_years_have_palette_colors() {
        assert_eq!(color_for_year(2014), "#1f77b4");
        assert_eq!(color_for_year(2021), "#7f7f7f");
    }

    #[test]
    fn unknown_years_fall_back_to_neutral() {
        assert_eq!(color_for_year(2013), NEUTRAL_COLOR);
        assert_eq!(color_for_year(2022), NEUTRAL_COLOR);
    }

    #[test]
    fn row_without_year_is_neutral() {
        let row = IncidentRow {
            id: "1".to_string(),
            year: None,
            longitude: 25.0,
            latitude: 64.0,
            severity: String::new(),
            vehicle_mass: String::new(),
        };
        assert_eq!(row.color(), NEUTRAL_COLOR);
        assert_eq!(
            IncidentRow {
                year: Some(2014),
                ..row
            }
            .color(),
            "#1f77b4"
        );
    }

    #[test]
    fn legend_is_sorted_and_complete() {
        let legend = legend_entries();
        assert_eq!(legend.len(), YEAR_COLORS.len());
        assert!(legend.windows(2).all(|w| w[0].year < w[1].year));
        for entry in &legend {
            assert_eq!(entry.color, color_for_year(entry.year));
        }
    }
}
