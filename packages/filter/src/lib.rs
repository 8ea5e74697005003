#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Year and region filtering of incidents plus camera framing.
//!
//! [`FilterState`] is the user's selection. [`filter_rows`] and
//! [`camera_for`] are pure functions of that state; every change to the
//! years or the region re-runs both, while outline toggles never do.

use std::collections::BTreeSet;

use serde::Serialize;
use traffic_map_config::MapStyleConfig;
use traffic_map_incident_models::IncidentRow;
use traffic_map_region_models::Camera;
use traffic_map_spatial::RegionIndex;

/// The user-controlled selection driving what the map shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Years whose incidents are shown. Empty shows nothing.
    pub selected_years: BTreeSet<i32>,
    /// Region constraint, by region id.
    pub selected_region: Option<String>,
    /// Whether region outlines are drawn.
    pub outlines_visible: bool,
}

/// Which part of a [`FilterState`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChange {
    /// Years or region changed; points and camera must be re-derived.
    Selection,
    /// Only outline visibility changed.
    Outlines,
    /// Nothing changed.
    None,
}

impl FilterState {
    /// Default state: every known year, no region, outlines hidden.
    #[must_use]
    pub fn new(all_years: &BTreeSet<i32>) -> Self {
        Self {
            selected_years: all_years.clone(),
            selected_region: None,
            outlines_visible: false,
        }
    }

    /// Restores the default year selection and clears the region.
    ///
    /// Outline visibility is a display toggle, not a filter, and is kept.
    pub fn reset(&mut self, all_years: &BTreeSet<i32>) {
        self.selected_years.clone_from(all_years);
        self.selected_region = None;
    }

    /// Classifies the difference between `self` and `previous`.
    #[must_use]
    pub fn change_from(&self, previous: &Self) -> FilterChange {
        if self.selected_years != previous.selected_years
            || self.selected_region != previous.selected_region
        {
            FilterChange::Selection
        } else if self.outlines_visible == previous.outlines_visible {
            FilterChange::None
        } else {
            FilterChange::Outlines
        }
    }
}

/// Camera constants used by [`camera_for`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    /// Camera when no region is selected.
    pub national: Camera,
    /// Zoom when a region is selected.
    pub region_zoom: f64,
}

impl From<&MapStyleConfig> for Framing {
    fn from(config: &MapStyleConfig) -> Self {
        Self {
            national: config.national_camera(),
            region_zoom: config.region_zoom,
        }
    }
}

/// Rows matching `state`, in input order.
///
/// A row passes when its year is selected and, if a known region is
/// selected, its position lies inside that region. An unknown region id
/// imposes no spatial constraint.
#[must_use]
pub fn filter_rows<'a>(
    rows: &'a [IncidentRow],
    state: &FilterState,
    index: &RegionIndex,
) -> Vec<&'a IncidentRow> {
    if state.selected_years.is_empty() {
        return Vec::new();
    }

    let region = state.selected_region.as_deref().and_then(|id| {
        let region = index.get(id);
        if region.is_none() {
            log::warn!("Unknown region {id:?}; not filtering by region");
        }
        region
    });

    rows.iter()
        .filter(|row| {
            row.year
                .is_some_and(|year| state.selected_years.contains(&year))
        })
        .filter(|row| region.is_none_or(|r| r.contains(row.longitude, row.latitude)))
        .collect()
}

/// Camera for `state`: the selected region's bounding box midpoint at the
/// region zoom, or the national overview.
#[must_use]
pub fn camera_for(state: &FilterState, index: &RegionIndex, framing: &Framing) -> Camera {
    state
        .selected_region
        .as_deref()
        .and_then(|id| index.get(id))
        .map_or(framing.national, |region| {
            let (lon, lat) = region.bounding_box.center();
            Camera::new(lon, lat, framing.region_zoom)
        })
}
