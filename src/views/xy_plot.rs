//! X-Y correlation plot of signal pairs, with reference geometry overlays.

use egui::Color32;
use thiserror::Error;
use tracing::warn;

use super::{View, ViewState};
use crate::data::correlate::{correlate_in_region, fade_segments, CorrelatedIndices, FadeSegment};
use crate::data::model::ScopeModel;
use crate::data::refgeo::RefGeoOutcome;
use crate::data::signals::Samples;
use crate::events::{ChangeKind, ModelEvent};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum XyError {
    #[error("select exactly two signals for an X-Y plot, got {0}")]
    SelectionCount(usize),
}

/// One correlated (x, y) pairing.
#[derive(Debug, Clone)]
pub struct XyCurve {
    pub x_name: String,
    pub y_name: String,
    pub color: Color32,
    pub x: Samples<f64>,
    pub y: Samples<f64>,
    pub indices: CorrelatedIndices,
    /// Opacity ramp toward the newest samples.
    pub segments: Vec<FadeSegment>,
}

#[derive(Debug, Clone, Default)]
pub struct XyFrame {
    pub curves: Vec<XyCurve>,
    pub ref_geo: Vec<RefGeoOutcome>,
    /// Transient messages about pairings that could not be drawn.
    pub diagnostics: Vec<String>,
}

#[derive(Debug)]
pub struct XyPlotView {
    state: ViewState,
    fade_segments: usize,
    frame: XyFrame,
    correlations: usize,
}

impl XyPlotView {
    pub fn new(fade_segments: usize) -> Self {
        Self {
            state: ViewState::default(),
            fade_segments,
            frame: XyFrame::default(),
            correlations: 0,
        }
    }

    pub fn frame(&self) -> &XyFrame {
        &self.frame
    }

    /// How many times pairings were re-correlated.
    pub fn correlation_count(&self) -> usize {
        self.correlations
    }

    fn curve_color(model: &ScopeModel, y_name: &str) -> Color32 {
        model.items().get(y_name).map(|i| i.color).unwrap_or(Color32::GRAY)
    }

    fn correlate(&mut self, model: &ScopeModel) {
        self.correlations += 1;
        let region = model.region();
        let mut curves = Vec::new();
        let mut diagnostics = Vec::new();
        for (x_name, y_name) in model.xy_pairings() {
            let (Some((x_ts, x)), Some((y_ts, y))) = (numeric_view(model, x_name), numeric_view(model, y_name)) else {
                continue;
            };
            let Some(indices) = correlate_in_region(&x_ts, &y_ts, region) else {
                let msg = format!("X/Y indices of {x_name}, {y_name} empty or do not match");
                warn!("{msg}");
                diagnostics.push(msg);
                continue;
            };
            curves.push(XyCurve {
                x_name: x_name.clone(),
                y_name: y_name.clone(),
                color: Self::curve_color(model, y_name),
                x,
                y,
                indices,
                segments: fade_segments(indices, self.fade_segments),
            });
        }
        self.frame.curves = curves;
        self.frame.diagnostics = diagnostics;
        self.frame.ref_geo = model.ref_geo().evaluate(model.derived().as_ref(), region);
    }

    fn restyle(&mut self, model: &ScopeModel) {
        for curve in &mut self.frame.curves {
            curve.color = Self::curve_color(model, &curve.y_name);
        }
    }
}

/// Shifted timestamps and transformed values of a numeric signal.
fn numeric_view(model: &ScopeModel, name: &str) -> Option<(Samples<f64>, Samples<f64>)> {
    let view = model.view(name)?;
    let values = view.values.as_numeric()?.clone();
    Some((view.timestamps, values))
}

impl View for XyPlotView {
    fn name(&self) -> &str {
        "X-Y plot"
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::DATA
            | ChangeKind::REGION
            | ChangeKind::TRANSFORMS
            | ChangeKind::XY_PAIRINGS
            | ChangeKind::REF_GEO
            | ChangeKind::COLOR
    }

    fn state(&self) -> ViewState {
        self.state
    }

    fn on_change(&mut self, event: &ModelEvent, model: &ScopeModel) {
        if event.kinds.intersects(!ChangeKind::COLOR & self.interests()) {
            self.correlate(model);
        } else if event.kinds.intersects(ChangeKind::COLOR) {
            self.restyle(model);
        }
        self.state = match ViewState::of_model(model) {
            ViewState::HasData => ViewState::Rendering,
            other => other,
        };
    }
}
