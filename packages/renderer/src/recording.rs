//! In-memory backend that records every instruction it receives.
//!
//! Clones share the same recording, so a test (or a headless run) can keep
//! one handle while the render worker owns the other.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use traffic_map_region_models::Camera;

use crate::backend::{BackendError, MapBackend};
use crate::figure::Figure;
use crate::model::{OutlineTrace, PointLayer, RenderStyle, TraceVisibility};

/// One instruction as seen by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `create_plot` with this many points.
    CreatePlot {
        /// Point count.
        points: usize,
        /// Initial camera.
        camera: Camera,
    },
    /// `add_traces` with this many traces.
    AddTraces {
        /// Trace count.
        count: usize,
        /// Initial visibility.
        visibility: TraceVisibility,
    },
    /// `restyle_points` with this many points.
    RestylePoints {
        /// Point count.
        points: usize,
    },
    /// `restyle_traces`.
    RestyleTraces {
        /// Affected trace indices.
        indices: Vec<usize>,
        /// New visibility.
        visibility: TraceVisibility,
        /// New line color.
        line_color: String,
    },
    /// `relayout`.
    Relayout {
        /// New camera.
        camera: Camera,
    },
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<BackendCall>,
    figure: Option<Figure>,
    failing: bool,
}

/// Backend that records calls and maintains a [`Figure`] without any I/O.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Mutex<Recording>>,
    latency: Option<Duration>,
}

impl RecordingBackend {
    /// Creates an empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every instruction by `latency`, like a real engine would.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every subsequent instruction fail (or succeed again).
    ///
    /// # Panics
    ///
    /// Panics if the recording mutex is poisoned.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Calls recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the recording mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Current figure, if a plot was created.
    ///
    /// # Panics
    ///
    /// Panics if the recording mutex is poisoned.
    #[must_use]
    pub fn figure(&self) -> Option<Figure> {
        self.lock().figure.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().expect("recording mutex poisoned")
    }

    async fn record<T>(
        &self,
        call: BackendCall,
        apply: impl FnOnce(&mut Option<Figure>) -> Result<T, BackendError> + Send,
    ) -> Result<T, BackendError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut recording = self.lock();
        if recording.failing {
            return Err(BackendError::Io(std::io::Error::other(
                "recording backend set to fail",
            )));
        }
        recording.calls.push(call);
        apply(&mut recording.figure)
    }
}

#[async_trait]
impl MapBackend for RecordingBackend {
    async fn create_plot(
        &mut self,
        points: &PointLayer,
        camera: &Camera,
        style: &RenderStyle,
    ) -> Result<(), BackendError> {
        let call = BackendCall::CreatePlot {
            points: points.len(),
            camera: *camera,
        };
        self.record(call, |figure| {
            *figure = Some(Figure::new(points, camera, style));
            Ok(())
        })
        .await
    }

    async fn add_traces(
        &mut self,
        traces: &[OutlineTrace],
        visibility: TraceVisibility,
        style: &RenderStyle,
    ) -> Result<Vec<usize>, BackendError> {
        let call = BackendCall::AddTraces {
            count: traces.len(),
            visibility,
        };
        self.record(call, |figure| {
            let figure = figure.as_mut().ok_or(BackendError::NoPlot)?;
            Ok(figure.add_traces(traces, visibility, style))
        })
        .await
    }

    async fn restyle_points(&mut self, points: &PointLayer) -> Result<(), BackendError> {
        let call = BackendCall::RestylePoints {
            points: points.len(),
        };
        self.record(call, |figure| {
            figure
                .as_mut()
                .ok_or(BackendError::NoPlot)?
                .restyle_points(points);
            Ok(())
        })
        .await
    }

    async fn restyle_traces(
        &mut self,
        indices: &[usize],
        visibility: TraceVisibility,
        line_color: &str,
    ) -> Result<(), BackendError> {
        let call = BackendCall::RestyleTraces {
            indices: indices.to_vec(),
            visibility,
            line_color: line_color.to_string(),
        };
        self.record(call, |figure| {
            figure
                .as_mut()
                .ok_or(BackendError::NoPlot)?
                .restyle_traces(indices, visibility, line_color)
        })
        .await
    }

    async fn relayout(&mut self, camera: &Camera) -> Result<(), BackendError> {
        let call = BackendCall::Relayout { camera: *camera };
        self.record(call, |figure| {
            figure
                .as_mut()
                .ok_or(BackendError::NoPlot)?
                .relayout(camera);
            Ok(())
        })
        .await
    }
}
