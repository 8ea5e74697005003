#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map renderer state machine over an asynchronous plotting backend.
//!
//! [`MapRenderer`] owns the map's lifecycle. It starts `Uninitialized`,
//! becomes `Ready` after [`MapRenderer::initialize`], and from then on
//! dispatches point, camera and outline updates to a single render worker
//! task over an unbounded [`tokio::sync::mpsc`] channel. Dispatch never
//! blocks the caller.
//!
//! The worker applies instructions in dispatch order. Every
//! [`MapRenderer::apply_filter`] call gets a new generation number; point
//! and camera instructions whose generation has been superseded by a
//! later dispatch are dropped unapplied, so the last filter dispatched is
//! always what ends up on screen.

pub mod backend;
pub mod figure;
pub mod model;
pub mod recording;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use traffic_map_region_models::Camera;

use crate::backend::{BackendError, MapBackend};
use crate::model::{OutlineTrace, PointLayer, RenderStyle, TraceVisibility};

/// Errors returned by [`MapRenderer`].
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// An update was requested before [`MapRenderer::initialize`].
    #[error("Renderer is not initialized")]
    NotInitialized,

    /// [`MapRenderer::initialize`] was called twice.
    #[error("Renderer is already initialized")]
    AlreadyInitialized,

    /// The render worker has stopped.
    #[error("Render worker is no longer running")]
    WorkerGone,

    /// The backend failed while initializing.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Lifecycle state of a [`MapRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererState {
    /// No plot exists yet.
    Uninitialized,
    /// Plot and overlays exist.
    Ready {
        /// Trace indices of the region outlines, in creation order.
        outline_indices: Vec<usize>,
    },
}

/// Counters kept by the render worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Instructions handed to the backend successfully.
    pub applied: u64,
    /// Point/camera instructions dropped as superseded.
    pub superseded: u64,
    /// Instructions the backend rejected.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Shared {
    latest_generation: AtomicU64,
    applied: AtomicU64,
    superseded: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn is_superseded(&self, generation: u64) -> bool {
        generation < self.latest_generation.load(Ordering::Acquire)
    }
}

enum Instruction {
    Initialize {
        points: PointLayer,
        outlines: Vec<OutlineTrace>,
        camera: Camera,
        reply: oneshot::Sender<Result<Vec<usize>, BackendError>>,
    },
    RestylePoints {
        generation: u64,
        points: PointLayer,
    },
    Relayout {
        generation: u64,
        camera: Camera,
    },
    RestyleOutlines {
        indices: Arc<[usize]>,
        visibility: TraceVisibility,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the map and its render worker.
pub struct MapRenderer {
    state: RendererState,
    outline_indices: Arc<[usize]>,
    tx: mpsc::UnboundedSender<Instruction>,
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for MapRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapRenderer")
            .field("state", &self.state)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl MapRenderer {
    /// Spawns the render worker around `backend`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(backend: impl MapBackend + 'static, style: RenderStyle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let worker = tokio::spawn(run_worker(
            Box::new(backend),
            style,
            rx,
            Arc::clone(&shared),
        ));

        Self {
            state: RendererState::Uninitialized,
            outline_indices: Arc::from(Vec::new()),
            tx,
            shared,
            worker,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &RendererState {
        &self.state
    }

    /// Whether [`MapRenderer::initialize`] has completed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, RendererState::Ready { .. })
    }

    /// Worker counters.
    #[must_use]
    pub fn stats(&self) -> RenderStats {
        RenderStats {
            applied: self.shared.applied.load(Ordering::Relaxed),
            superseded: self.shared.superseded.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Creates the point layer and one hidden overlay per outline, then
    /// records the overlay indices. Runs once per renderer.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::AlreadyInitialized`] on a second call,
    /// [`RendererError::Backend`] if the backend fails, or
    /// [`RendererError::WorkerGone`] if the worker has stopped. The
    /// renderer stays `Uninitialized` on error.
    pub async fn initialize(
        &mut self,
        points: PointLayer,
        outlines: Vec<OutlineTrace>,
        camera: Camera,
    ) -> Result<(), RendererError> {
        if self.is_ready() {
            return Err(RendererError::AlreadyInitialized);
        }

        let (reply, response) = oneshot::channel();
        self.send(Instruction::Initialize {
            points,
            outlines,
            camera,
            reply,
        })?;
        let outline_indices = response.await.map_err(|_| RendererError::WorkerGone)??;

        log::info!(
            "Map initialized with {} region outline traces",
            outline_indices.len()
        );
        self.outline_indices = Arc::from(outline_indices.as_slice());
        self.state = RendererState::Ready { outline_indices };
        Ok(())
    }

    /// Replaces the displayed points and moves the camera.
    ///
    /// Returns immediately with the generation number assigned to this
    /// update; the worker applies it later unless a newer update
    /// supersedes it first.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::NotInitialized`] before initialization or
    /// [`RendererError::WorkerGone`] if the worker has stopped.
    pub fn apply_filter(&self, points: PointLayer, camera: Camera) -> Result<u64, RendererError> {
        self.ensure_ready()?;

        let generation = self.shared.latest_generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!(
            "Dispatching filter generation {generation}: {} points, center ({:.3}, {:.3}) zoom {}",
            points.len(),
            camera.lon,
            camera.lat,
            camera.zoom
        );

        self.send(Instruction::RestylePoints { generation, points })?;
        self.send(Instruction::Relayout { generation, camera })?;
        Ok(generation)
    }

    /// Shows or hides every region outline and forces the outline color.
    ///
    /// Hidden outlines stay listed in the legend. Point data and camera are
    /// never touched.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::NotInitialized`] before initialization or
    /// [`RendererError::WorkerGone`] if the worker has stopped.
    pub fn toggle_outlines(&self, visible: bool) -> Result<(), RendererError> {
        self.ensure_ready()?;

        let visibility = if visible {
            TraceVisibility::Visible
        } else {
            TraceVisibility::LegendOnly
        };
        log::debug!(
            "Setting {} outline traces to {visibility:?}",
            self.outline_indices.len()
        );

        self.send(Instruction::RestyleOutlines {
            indices: Arc::clone(&self.outline_indices),
            visibility,
        })
    }

    /// Waits until every instruction dispatched so far has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::WorkerGone`] if the worker has stopped.
    pub async fn flush(&self) -> Result<(), RendererError> {
        let (reply, done) = oneshot::channel();
        self.send(Instruction::Flush(reply))?;
        done.await.map_err(|_| RendererError::WorkerGone)
    }

    /// Drains outstanding instructions and stops the worker.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::WorkerGone`] if the worker had already
    /// stopped abnormally.
    pub async fn shutdown(self) -> Result<(), RendererError> {
        drop(self.tx);
        self.worker.await.map_err(|e| {
            log::error!("Render worker ended abnormally: {e}");
            RendererError::WorkerGone
        })
    }

    const fn ensure_ready(&self) -> Result<(), RendererError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(RendererError::NotInitialized)
        }
    }

    fn send(&self, instruction: Instruction) -> Result<(), RendererError> {
        self.tx
            .send(instruction)
            .map_err(|_| RendererError::WorkerGone)
    }
}

async fn run_worker(
    mut backend: Box<dyn MapBackend>,
    style: RenderStyle,
    mut rx: mpsc::UnboundedReceiver<Instruction>,
    shared: Arc<Shared>,
) {
    log::debug!("Render worker started");

    while let Some(instruction) = rx.recv().await {
        match instruction {
            Instruction::Initialize {
                points,
                outlines,
                camera,
                reply,
            } => {
                let result =
                    initialize_backend(backend.as_mut(), &points, &outlines, &camera, &style)
                        .await;
                record(&shared, "initialize", &result);
                reply.send(result).ok();
            }
            Instruction::RestylePoints { generation, points } => {
                if shared.is_superseded(generation) {
                    log::trace!("Skipping superseded point update {generation}");
                    shared.superseded.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let result = backend.restyle_points(&points).await;
                record(&shared, "restyle points", &result);
            }
            Instruction::Relayout { generation, camera } => {
                if shared.is_superseded(generation) {
                    log::trace!("Skipping superseded camera update {generation}");
                    shared.superseded.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let result = backend.relayout(&camera).await;
                record(&shared, "relayout", &result);
            }
            Instruction::RestyleOutlines {
                indices,
                visibility,
            } => {
                let result = backend
                    .restyle_traces(&indices, visibility, &style.outline_color)
                    .await;
                record(&shared, "restyle outlines", &result);
            }
            Instruction::Flush(reply) => {
                reply.send(()).ok();
            }
        }
    }

    log::debug!("Render worker stopped");
}

async fn initialize_backend(
    backend: &mut dyn MapBackend,
    points: &PointLayer,
    outlines: &[OutlineTrace],
    camera: &Camera,
    style: &RenderStyle,
) -> Result<Vec<usize>, BackendError> {
    backend.create_plot(points, camera, style).await?;
    backend
        .add_traces(outlines, TraceVisibility::Hidden, style)
        .await
}

fn record<T>(shared: &Shared, what: &str, result: &Result<T, BackendError>) {
    match result {
        Ok(_) => {
            shared.applied.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            log::error!("Backend failed to {what}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use geojson::GeoJson;
    use traffic_map_incident_models::IncidentRow;
    use traffic_map_spatial::RegionIndex;

    use super::*;
    use crate::recording::{BackendCall, RecordingBackend};

    const NATIONAL: Camera = Camera::new(25.7, 65.0, 4.0);

    fn style() -> RenderStyle {
        RenderStyle {
            map_style: "open-street-map".to_string(),
            marker_size: 5.0,
            marker_opacity: 0.7,
            outline_color: "#444444".to_string(),
            outline_width: 1.5,
        }
    }

    fn rows(n: usize, year: i32) -> Vec<IncidentRow> {
        (0..n)
            .map(|i| IncidentRow {
                id: format!("r{i}"),
                year: Some(year),
                longitude: 25.0,
                latitude: 60.5,
                severity: String::new(),
                vehicle_mass: String::new(),
            })
            .collect()
    }

    fn outlines() -> Vec<OutlineTrace> {
        let GeoJson::FeatureCollection(fc) = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "name": "Uusimaa" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[24, 60], [26, 60], [26, 61], [24, 61], [24, 60]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "name": "Åland" },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[19, 60], [20, 60], [20, 60.5], [19, 60.5], [19, 60]]],
                            [[[20.5, 59.8], [21, 59.8], [21, 60.1], [20.5, 60.1], [20.5, 59.8]]]
                        ]
                    }
                }
            ]
        }"#
        .parse::<GeoJson>()
        .unwrap() else {
            panic!("expected FeatureCollection");
        };
        let index = RegionIndex::from_feature_collection(&fc);
        index
            .regions()
            .iter()
            .flat_map(OutlineTrace::from_region)
            .collect()
    }

    async fn ready(backend: &RecordingBackend) -> MapRenderer {
        let mut renderer = MapRenderer::spawn(backend.clone(), style());
        renderer
            .initialize(PointLayer::from_rows(&rows(3, 2014)), outlines(), NATIONAL)
            .await
            .unwrap();
        renderer
    }

    #[tokio::test]
    async fn updates_before_initialize_are_rejected() {
        let renderer = MapRenderer::spawn(RecordingBackend::new(), style());
        assert_eq!(renderer.state(), &RendererState::Uninitialized);
        assert!(matches!(
            renderer.apply_filter(PointLayer::default(), NATIONAL),
            Err(RendererError::NotInitialized)
        ));
        assert!(matches!(
            renderer.toggle_outlines(true),
            Err(RendererError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn initialize_creates_one_hidden_overlay_per_polygon() {
        let backend = RecordingBackend::new();
        let renderer = ready(&backend).await;

        assert_eq!(renderer.state(), &RendererState::Ready {
            outline_indices: vec![1, 2, 3]
        });
        assert_eq!(backend.calls(), vec![
            BackendCall::CreatePlot {
                points: 3,
                camera: NATIONAL
            },
            BackendCall::AddTraces {
                count: 3,
                visibility: TraceVisibility::Hidden
            },
        ]);

        let figure = backend.figure().unwrap();
        assert!(
            figure
                .outlines()
                .iter()
                .all(|t| t.visible == TraceVisibility::Hidden)
        );
    }

    #[tokio::test]
    async fn second_initialize_is_rejected() {
        let backend = RecordingBackend::new();
        let mut renderer = ready(&backend).await;
        assert!(matches!(
            renderer
                .initialize(PointLayer::default(), Vec::new(), NATIONAL)
                .await,
            Err(RendererError::AlreadyInitialized)
        ));
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn failed_initialize_stays_uninitialized() {
        let backend = RecordingBackend::new();
        backend.set_failing(true);
        let mut renderer = MapRenderer::spawn(backend.clone(), style());
        assert!(matches!(
            renderer
                .initialize(PointLayer::default(), outlines(), NATIONAL)
                .await,
            Err(RendererError::Backend(_))
        ));
        assert!(!renderer.is_ready());
    }

    #[tokio::test]
    async fn apply_filter_restyles_points_and_moves_camera() {
        let backend = RecordingBackend::new();
        let renderer = ready(&backend).await;
        let camera = Camera::new(25.0, 60.5, 6.0);

        renderer
            .apply_filter(PointLayer::from_rows(&rows(1, 2020)), camera)
            .unwrap();
        renderer.flush().await.unwrap();

        let figure = backend.figure().unwrap();
        assert_eq!(figure.camera(), camera);
        assert_eq!(figure.points().lon.len(), 1);
        assert_eq!(
            figure.points().marker.as_ref().unwrap().color,
            vec!["#e377c2"]
        );
    }

    #[tokio::test]
    async fn last_dispatched_filter_wins() {
        let backend = RecordingBackend::new().with_latency(Duration::from_millis(5));
        let renderer = ready(&backend).await;
        let before = backend.calls().len();

        let mut last = 0;
        for n in 1..=10 {
            let camera = Camera::new(20.0 + f64::from(u8::try_from(n).unwrap()), 60.0, 6.0);
            last = renderer
                .apply_filter(PointLayer::from_rows(&rows(n, 2014)), camera)
                .unwrap();
        }
        renderer.flush().await.unwrap();

        assert_eq!(last, 10);
        let figure = backend.figure().unwrap();
        assert_eq!(figure.points().lon.len(), 10);
        assert_eq!(figure.camera(), Camera::new(30.0, 60.0, 6.0));

        let stats = renderer.stats();
        assert_eq!(stats.superseded, 18);
        assert_eq!(backend.calls().len() - before, 2);
    }

    #[tokio::test]
    async fn toggle_outlines_only_touches_overlays() {
        let backend = RecordingBackend::new();
        let renderer = ready(&backend).await;
        let before = backend.figure().unwrap();

        renderer.toggle_outlines(true).unwrap();
        renderer.flush().await.unwrap();
        let shown = backend.figure().unwrap();
        assert!(
            shown
                .outlines()
                .iter()
                .all(|t| t.visible == TraceVisibility::Visible)
        );
        assert_eq!(shown.points(), before.points());
        assert_eq!(shown.camera(), before.camera());

        renderer.toggle_outlines(false).unwrap();
        renderer.flush().await.unwrap();
        let hidden = backend.figure().unwrap();
        assert!(hidden.outlines().iter().all(|t| {
            t.visible == TraceVisibility::LegendOnly
                && t.line.as_ref().is_some_and(|l| l.color == "#444444")
        }));

        assert!(matches!(
            backend.calls().last(),
            Some(BackendCall::RestyleTraces { indices, .. }) if indices == &vec![1, 2, 3]
        ));
    }

    #[tokio::test]
    async fn backend_failure_does_not_stop_worker() {
        let backend = RecordingBackend::new();
        let renderer = ready(&backend).await;

        backend.set_failing(true);
        renderer.toggle_outlines(true).unwrap();
        renderer.flush().await.unwrap();
        backend.set_failing(false);

        renderer
            .apply_filter(PointLayer::from_rows(&rows(2, 2014)), NATIONAL)
            .unwrap();
        renderer.flush().await.unwrap();

        let stats = renderer.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(backend.figure().unwrap().points().lon.len(), 2);
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let backend = RecordingBackend::new();
        let renderer = ready(&backend).await;
        renderer.toggle_outlines(true).unwrap();
        renderer.shutdown().await.unwrap();
        assert!(matches!(
            backend.calls().last(),
            Some(BackendCall::RestyleTraces { .. })
        ));
    }
}
