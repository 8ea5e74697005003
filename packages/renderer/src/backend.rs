//! The plotting engine seam.
//!
//! A [`MapBackend`] is the black-box charting engine: it can create a plot,
//! add overlay traces, restyle points or traces, and re-center the camera.
//! It is driven only from the render worker, one instruction at a time.

use async_trait::async_trait;
use traffic_map_region_models::Camera;

use crate::model::{OutlineTrace, PointLayer, RenderStyle, TraceVisibility};

/// Errors reported by a [`MapBackend`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Writing the rendered output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the figure failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An instruction arrived before the plot was created.
    #[error("No plot has been created")]
    NoPlot,

    /// A restyle referenced a trace that does not exist.
    #[error("Trace index {0} is out of range")]
    InvalidTraceIndex(usize),
}

/// A charting engine able to show points and line overlays on a map.
#[async_trait]
pub trait MapBackend: Send {
    /// Creates the plot with its point layer and initial camera.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the plot cannot be created.
    async fn create_plot(
        &mut self,
        points: &PointLayer,
        camera: &Camera,
        style: &RenderStyle,
    ) -> Result<(), BackendError>;

    /// Appends overlay traces with the given initial visibility and returns
    /// their trace indices, in order.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if no plot exists or the traces cannot be
    /// added.
    async fn add_traces(
        &mut self,
        traces: &[OutlineTrace],
        visibility: TraceVisibility,
        style: &RenderStyle,
    ) -> Result<Vec<usize>, BackendError>;

    /// Replaces the point layer's positions and colors.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if no plot exists or the update fails.
    async fn restyle_points(&mut self, points: &PointLayer) -> Result<(), BackendError>;

    /// Sets visibility and line color of the traces at `indices`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if an index is out of range or the update
    /// fails.
    async fn restyle_traces(
        &mut self,
        indices: &[usize],
        visibility: TraceVisibility,
        line_color: &str,
    ) -> Result<(), BackendError>;

    /// Moves the camera.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if no plot exists or the update fails.
    async fn relayout(&mut self, camera: &Camera) -> Result<(), BackendError>;
}
