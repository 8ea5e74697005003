//! Plotly-compatible figure model and the file-writing backend.
//!
//! The [`Figure`] mirrors the JSON a Plotly `scattermapbox` chart takes:
//! trace 0 is the incident point layer, every later trace is a region
//! outline. [`FigureBackend`] keeps one in memory and rewrites it to disk
//! after every instruction so an external viewer can follow along.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use traffic_map_region_models::Camera;

use crate::backend::{BackendError, MapBackend};
use crate::model::{OutlineTrace, PointLayer, RenderStyle, TraceVisibility};

/// Index of the incident point layer within [`Figure::data`].
pub const POINT_TRACE: usize = 0;

/// A complete map figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    /// Traces; see [`POINT_TRACE`].
    pub data: Vec<Trace>,
    /// Map framing and style.
    pub layout: Layout,
}

/// One `scattermapbox` trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    kind: &'static str,
    /// `"markers"` for points, `"lines"` for outlines.
    pub mode: &'static str,
    /// Legend label.
    pub name: String,
    /// Longitudes.
    pub lon: Vec<f64>,
    /// Latitudes.
    pub lat: Vec<f64>,
    /// Hover labels (points only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    /// Marker styling (points only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    /// Line styling (outlines only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    /// Visibility state.
    pub visible: TraceVisibility,
    /// Whether the trace appears in the legend.
    pub showlegend: bool,
}

/// Marker styling of the point layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Size in pixels.
    pub size: f64,
    /// Opacity (0-1).
    pub opacity: f64,
    /// Per-point colors.
    pub color: Vec<&'static str>,
}

/// Line styling of an outline trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    /// Line color.
    pub color: String,
    /// Width in pixels.
    pub width: f64,
}

/// Figure layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    /// Map settings.
    pub mapbox: Mapbox,
    /// Plot margins, all zero.
    pub margin: Margin,
    /// Whether the legend is shown.
    pub showlegend: bool,
}

/// Map style and camera.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mapbox {
    /// Base map style.
    pub style: String,
    /// Camera center.
    pub center: Center,
    /// Camera zoom.
    pub zoom: f64,
}

/// A `(lon, lat)` center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Center {
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
}

/// Plot margins in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Margin {
    /// Left.
    pub l: u32,
    /// Right.
    pub r: u32,
    /// Top.
    pub t: u32,
    /// Bottom.
    pub b: u32,
}

impl Figure {
    /// Creates a figure holding only the point layer.
    #[must_use]
    pub fn new(points: &PointLayer, camera: &Camera, style: &RenderStyle) -> Self {
        Self {
            data: vec![Trace {
                kind: "scattermapbox",
                mode: "markers",
                name: "Incidents".to_string(),
                lon: points.lon.clone(),
                lat: points.lat.clone(),
                text: Some(points.text.clone()),
                marker: Some(Marker {
                    size: style.marker_size,
                    opacity: style.marker_opacity,
                    color: points.color.clone(),
                }),
                line: None,
                visible: TraceVisibility::Visible,
                showlegend: false,
            }],
            layout: Layout {
                mapbox: Mapbox {
                    style: style.map_style.clone(),
                    center: Center {
                        lon: camera.lon,
                        lat: camera.lat,
                    },
                    zoom: camera.zoom,
                },
                margin: Margin {
                    l: 0,
                    r: 0,
                    t: 0,
                    b: 0,
                },
                showlegend: true,
            },
        }
    }

    /// Appends outline traces and returns their indices.
    pub fn add_traces(
        &mut self,
        traces: &[OutlineTrace],
        visibility: TraceVisibility,
        style: &RenderStyle,
    ) -> Vec<usize> {
        let first = self.data.len();
        self.data.extend(traces.iter().map(|trace| Trace {
            kind: "scattermapbox",
            mode: "lines",
            name: trace.name.clone(),
            lon: trace.lon.clone(),
            lat: trace.lat.clone(),
            text: None,
            marker: None,
            line: Some(Line {
                color: style.outline_color.clone(),
                width: style.outline_width,
            }),
            visible: visibility,
            showlegend: true,
        }));
        (first..self.data.len()).collect()
    }

    /// Replaces the point layer.
    pub fn restyle_points(&mut self, points: &PointLayer) {
        let trace = &mut self.data[POINT_TRACE];
        trace.lon.clone_from(&points.lon);
        trace.lat.clone_from(&points.lat);
        trace.text = Some(points.text.clone());
        if let Some(marker) = &mut trace.marker {
            marker.color.clone_from(&points.color);
        }
    }

    /// Sets visibility and line color of outline traces.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidTraceIndex`] if an index does not name
    /// an outline trace. No trace is modified in that case.
    pub fn restyle_traces(
        &mut self,
        indices: &[usize],
        visibility: TraceVisibility,
        line_color: &str,
    ) -> Result<(), BackendError> {
        if let Some(&bad) = indices
            .iter()
            .find(|&&i| i == POINT_TRACE || i >= self.data.len())
        {
            return Err(BackendError::InvalidTraceIndex(bad));
        }
        for &i in indices {
            let trace = &mut self.data[i];
            trace.visible = visibility;
            if let Some(line) = &mut trace.line {
                line.color = line_color.to_string();
            }
        }
        Ok(())
    }

    /// Moves the camera.
    pub fn relayout(&mut self, camera: &Camera) {
        self.layout.mapbox.center = Center {
            lon: camera.lon,
            lat: camera.lat,
        };
        self.layout.mapbox.zoom = camera.zoom;
    }

    /// Current camera.
    #[must_use]
    pub const fn camera(&self) -> Camera {
        Camera::new(
            self.layout.mapbox.center.lon,
            self.layout.mapbox.center.lat,
            self.layout.mapbox.zoom,
        )
    }

    /// The incident point layer.
    #[must_use]
    pub fn points(&self) -> &Trace {
        &self.data[POINT_TRACE]
    }

    /// Outline traces, in index order.
    #[must_use]
    pub fn outlines(&self) -> &[Trace] {
        &self.data[POINT_TRACE + 1..]
    }
}

/// Backend that keeps a [`Figure`] in memory and optionally mirrors it to
/// a JSON file.
#[derive(Debug, Default)]
pub struct FigureBackend {
    figure: Option<Figure>,
    output: Option<PathBuf>,
}

impl FigureBackend {
    /// Creates a backend that writes the figure to `path` after every
    /// change.
    #[must_use]
    pub fn with_output(path: impl Into<PathBuf>) -> Self {
        Self {
            figure: None,
            output: Some(path.into()),
        }
    }

    /// The current figure, if a plot was created.
    #[must_use]
    pub const fn figure(&self) -> Option<&Figure> {
        self.figure.as_ref()
    }

    fn figure_mut(&mut self) -> Result<&mut Figure, BackendError> {
        self.figure.as_mut().ok_or(BackendError::NoPlot)
    }

    async fn persist(&self) -> Result<(), BackendError> {
        let (Some(path), Some(figure)) = (&self.output, &self.figure) else {
            return Ok(());
        };
        write_figure(path, figure).await
    }
}

/// Writes `figure` as JSON, replacing `path` atomically.
async fn write_figure(path: &Path, figure: &Figure) -> Result<(), BackendError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec(figure)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;

    log::trace!("Wrote {} bytes of figure JSON to {}", json.len(), path.display());
    Ok(())
}

#[async_trait]
impl MapBackend for FigureBackend {
    async fn create_plot(
        &mut self,
        points: &PointLayer,
        camera: &Camera,
        style: &RenderStyle,
    ) -> Result<(), BackendError> {
        self.figure = Some(Figure::new(points, camera, style));
        self.persist().await
    }

    async fn add_traces(
        &mut self,
        traces: &[OutlineTrace],
        visibility: TraceVisibility,
        style: &RenderStyle,
    ) -> Result<Vec<usize>, BackendError> {
        let indices = self.figure_mut()?.add_traces(traces, visibility, style);
        self.persist().await?;
        Ok(indices)
    }

    async fn restyle_points(&mut self, points: &PointLayer) -> Result<(), BackendError> {
        self.figure_mut()?.restyle_points(points);
        self.persist().await
    }

    async fn restyle_traces(
        &mut self,
        indices: &[usize],
        visibility: TraceVisibility,
        line_color: &str,
    ) -> Result<(), BackendError> {
        self.figure_mut()?
            .restyle_traces(indices, visibility, line_color)?;
        self.persist().await
    }

    async fn relayout(&mut self, camera: &Camera) -> Result<(), BackendError> {
        self.figure_mut()?.relayout(camera);
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> RenderStyle {
        RenderStyle {
            map_style: "open-street-map".to_string(),
            marker_size: 5.0,
            marker_opacity: 0.7,
            outline_color: "#444444".to_string(),
            outline_width: 1.5,
        }
    }

    fn points(n: usize) -> PointLayer {
        PointLayer {
            lon: vec![25.0; n],
            lat: vec![64.0; n],
            color: vec!["#1f77b4"; n],
            text: vec!["x".to_string(); n],
        }
    }

    fn outline(name: &str) -> OutlineTrace {
        OutlineTrace {
            name: name.to_string(),
            lon: vec![24.0, 26.0, 26.0, 24.0],
            lat: vec![60.0, 60.0, 61.0, 60.0],
        }
    }

    #[test]
    fn outline_indices_follow_point_layer() {
        let mut figure = Figure::new(&points(3), &Camera::new(25.7, 65.0, 4.0), &style());
        let first = figure.add_traces(&[outline("a"), outline("b")], TraceVisibility::Hidden, &style());
        let second = figure.add_traces(&[outline("c")], TraceVisibility::Hidden, &style());
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3]);
        assert_eq!(figure.outlines().len(), 3);
    }

    #[test]
    fn restyle_traces_rejects_point_layer_and_out_of_range() {
        let mut figure = Figure::new(&points(1), &Camera::new(0.0, 0.0, 1.0), &style());
        figure.add_traces(&[outline("a")], TraceVisibility::Hidden, &style());

        assert!(matches!(
            figure.restyle_traces(&[POINT_TRACE], TraceVisibility::Visible, "red"),
            Err(BackendError::InvalidTraceIndex(0))
        ));
        assert!(matches!(
            figure.restyle_traces(&[1, 5], TraceVisibility::Visible, "red"),
            Err(BackendError::InvalidTraceIndex(5))
        ));
        assert_eq!(figure.outlines()[0].visible, TraceVisibility::Hidden);
    }

    #[test]
    fn serializes_plotly_shape() {
        let mut figure = Figure::new(&points(1), &Camera::new(25.0, 60.5, 6.0), &style());
        figure.add_traces(&[outline("Uusimaa")], TraceVisibility::LegendOnly, &style());

        let json = serde_json::to_value(&figure).unwrap();
        assert_eq!(json["data"][0]["type"], "scattermapbox");
        assert_eq!(json["data"][0]["mode"], "markers");
        assert_eq!(json["data"][0]["marker"]["color"][0], "#1f77b4");
        assert_eq!(json["data"][1]["mode"], "lines");
        assert_eq!(json["data"][1]["visible"], "legendonly");
        assert_eq!(json["data"][1]["line"]["color"], "#444444");
        assert!(json["data"][1].get("marker").is_none());
        assert_eq!(json["layout"]["mapbox"]["center"]["lat"], 60.5);
        assert_eq!(json["layout"]["mapbox"]["zoom"], 6.0);
    }

    #[tokio::test]
    async fn backend_writes_figure_file() {
        let dir = std::env::temp_dir().join(format!("traffic_map_figure_{}", std::process::id()));
        let path = dir.join("map.json");
        let mut backend = FigureBackend::with_output(&path);

        backend
            .create_plot(&points(2), &Camera::new(25.7, 65.0, 4.0), &style())
            .await
            .unwrap();
        backend.relayout(&Camera::new(25.0, 60.5, 6.0)).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["layout"]["mapbox"]["zoom"], 6.0);
        assert_eq!(written["data"][0]["lon"].as_array().unwrap().len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn instructions_before_create_plot_fail() {
        let mut backend = FigureBackend::default();
        assert!(matches!(
            backend.relayout(&Camera::new(0.0, 0.0, 1.0)).await,
            Err(BackendError::NoPlot)
        ));
    }
}
