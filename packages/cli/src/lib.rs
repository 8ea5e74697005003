#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive traffic incident map.
//!
//! [`MapSession`] owns everything a running map needs: the loaded rows,
//! the region index, the current [`FilterState`] and the renderer. Every
//! setter re-derives the displayed rows and camera from scratch and
//! dispatches the result; outline toggles only touch the overlays.

pub mod interactive;
pub mod progress;

use std::collections::{BTreeSet, HashMap};

use traffic_map_config::{ConfigError, MapConfig};
use traffic_map_filter::{FilterChange, FilterState, Framing, camera_for, filter_rows};
use traffic_map_incident_models::IncidentRow;
use traffic_map_loader::{LoadedData, LoaderError};
use traffic_map_region_models::{Camera, RegionOption};
use traffic_map_renderer::backend::MapBackend;
use traffic_map_renderer::model::{OutlineTrace, PointLayer, RenderStyle};
use traffic_map_renderer::{MapRenderer, RendererError};
use traffic_map_spatial::RegionIndex;

/// Errors surfaced by the traffic map application.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Incident or boundary data could not be loaded.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// The renderer rejected an operation.
    #[error(transparent)]
    Renderer(#[from] RendererError),

    /// A region name given on the command line does not exist.
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

/// Displayed incidents counted per region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSummary {
    /// Regions holding at least one displayed incident, in display order.
    pub counts: Vec<(String, usize)>,
    /// Displayed incidents outside every region.
    pub unassigned: usize,
}

/// A running map: data, selection and renderer.
#[derive(Debug)]
pub struct MapSession {
    rows: Vec<IncidentRow>,
    index: RegionIndex,
    all_years: BTreeSet<i32>,
    state: FilterState,
    framing: Framing,
    renderer: MapRenderer,
}

impl MapSession {
    /// Builds the region index, spawns the renderer on `backend` and draws
    /// the initial map: every year, no region, outlines hidden.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renderer`] if the backend cannot create the
    /// plot.
    pub async fn start(
        data: LoadedData,
        config: &MapConfig,
        backend: impl MapBackend + 'static,
    ) -> Result<Self, SessionError> {
        let LoadedData {
            rows,
            boundaries,
            years,
        } = data;

        let index = RegionIndex::from_feature_collection(&boundaries);
        let state = FilterState::new(&years);
        let framing = Framing::from(&config.map);
        let mut renderer = MapRenderer::spawn(backend, RenderStyle::from(&config.map));

        let points = PointLayer::from_rows(filter_rows(&rows, &state, &index));
        let outlines = index
            .regions()
            .iter()
            .flat_map(OutlineTrace::from_region)
            .collect();
        renderer
            .initialize(points, outlines, camera_for(&state, &index, &framing))
            .await?;

        log::info!(
            "Session started with {} incidents, {} years and {} regions",
            rows.len(),
            years.len(),
            index.len()
        );

        Ok(Self {
            rows,
            index,
            all_years: years,
            state,
            framing,
            renderer,
        })
    }

    /// The current selection.
    #[must_use]
    pub const fn state(&self) -> &FilterState {
        &self.state
    }

    /// Every year present in the data.
    #[must_use]
    pub const fn years(&self) -> &BTreeSet<i32> {
        &self.all_years
    }

    /// The region index.
    #[must_use]
    pub const fn regions(&self) -> &RegionIndex {
        &self.index
    }

    /// Region selector options, "All regions" first.
    #[must_use]
    pub fn region_options(&self) -> Vec<RegionOption> {
        self.index.display_list()
    }

    /// Number of valid incidents loaded.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// The renderer driving the map.
    #[must_use]
    pub const fn renderer(&self) -> &MapRenderer {
        &self.renderer
    }

    /// Rows matching the current selection.
    #[must_use]
    pub fn displayed_rows(&self) -> Vec<&IncidentRow> {
        filter_rows(&self.rows, &self.state, &self.index)
    }

    /// Camera for the current selection.
    #[must_use]
    pub fn camera(&self) -> Camera {
        camera_for(&self.state, &self.index, &self.framing)
    }

    /// Shows only incidents from `years`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renderer`] if the update cannot be dispatched.
    pub fn set_years(&mut self, years: BTreeSet<i32>) -> Result<(), SessionError> {
        self.update(|state| state.selected_years = years)
    }

    /// Restricts the map to one region, or lifts the restriction.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renderer`] if the update cannot be dispatched.
    pub fn set_region(&mut self, region: Option<String>) -> Result<(), SessionError> {
        self.update(|state| state.selected_region = region)
    }

    /// Shows or hides region outlines.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renderer`] if the update cannot be dispatched.
    pub fn set_outlines(&mut self, visible: bool) -> Result<(), SessionError> {
        self.update(|state| state.outlines_visible = visible)
    }

    /// Selects every year and clears the region.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renderer`] if the update cannot be dispatched.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        let all_years = self.all_years.clone();
        self.update(|state| state.reset(&all_years))
    }

    /// Counts the displayed incidents per containing region.
    #[must_use]
    pub fn region_summary(&self) -> RegionSummary {
        let mut by_id: HashMap<&str, usize> = HashMap::new();
        let mut unassigned = 0;

        for row in self.displayed_rows() {
            match self.index.locate(row.longitude, row.latitude) {
                Some(region) => *by_id.entry(region.id.as_str()).or_default() += 1,
                None => unassigned += 1,
            }
        }

        let counts = self
            .index
            .regions()
            .iter()
            .filter_map(|region| {
                by_id
                    .get(region.id.as_str())
                    .map(|&count| (region.name.clone(), count))
            })
            .collect();

        RegionSummary { counts, unassigned }
    }

    /// Waits until the map reflects every change made so far.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renderer`] if the render worker has stopped.
    pub async fn flush(&self) -> Result<(), SessionError> {
        Ok(self.renderer.flush().await?)
    }

    /// Applies outstanding updates and stops the renderer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renderer`] if the render worker had stopped
    /// abnormally.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        Ok(self.renderer.shutdown().await?)
    }

    fn update(&mut self, change: impl FnOnce(&mut FilterState)) -> Result<(), SessionError> {
        let previous = self.state.clone();
        change(&mut self.state);

        let dispatched = match self.state.change_from(&previous) {
            FilterChange::Selection => {
                let points = PointLayer::from_rows(self.displayed_rows());
                let camera = self.camera();
                log::debug!(
                    "Selection changed: {} years, region {:?}, {} incidents shown",
                    self.state.selected_years.len(),
                    self.state.selected_region,
                    points.len()
                );
                self.renderer.apply_filter(points, camera).map(|_| ())
            }
            FilterChange::Outlines => self.renderer.toggle_outlines(self.state.outlines_visible),
            FilterChange::None => {
                log::trace!("Selection unchanged; nothing to render");
                Ok(())
            }
        };

        // The state must keep describing what the map shows.
        if let Err(e) = dispatched {
            log::error!("Could not dispatch map update: {e}");
            self.state = previous;
            return Err(e.into());
        }

        Ok(())
    }
}
