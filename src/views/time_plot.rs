//! Stacked time-series plot of every signal.

use egui::Color32;
use tracing::debug;

use super::{View, ViewState};
use crate::data::model::ScopeModel;
use crate::data::signals::{PlotKind, Samples, SignalValues};
use crate::events::{ChangeKind, ModelEvent};

/// One drawn signal.
#[derive(Debug, Clone)]
pub struct Trace {
    pub name: String,
    pub color: Color32,
    pub kind: PlotKind,
    pub visible: bool,
    pub timestamps: Samples<f64>,
    pub values: SignalValues,
}

#[derive(Debug, Clone, Default)]
pub struct TimePlotFrame {
    pub traces: Vec<Trace>,
    /// Region overlay, `None` when the whole range is selected.
    pub region: Option<(f64, f64)>,
}

#[derive(Debug, Default)]
pub struct TimePlotView {
    state: ViewState,
    frame: TimePlotFrame,
    rebuilds: usize,
    restyles: usize,
    region_updates: usize,
}

impl TimePlotView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> &TimePlotFrame {
        &self.frame
    }

    pub fn trace(&self, name: &str) -> Option<&Trace> {
        self.frame.traces.iter().find(|t| t.name == name)
    }

    /// Counts of full rebuilds, restyles and region overlay updates.
    pub fn update_counts(&self) -> (usize, usize, usize) {
        (self.rebuilds, self.restyles, self.region_updates)
    }

    fn rebuild(&mut self, model: &ScopeModel) {
        self.rebuilds += 1;
        self.frame.traces = model
            .items()
            .iter()
            .filter_map(|item| {
                let view = model.view(&item.name)?;
                Some(Trace {
                    name: item.name.clone(),
                    color: item.color,
                    kind: item.kind,
                    visible: !model.is_hidden(&item.name),
                    timestamps: view.timestamps,
                    values: view.values,
                })
            })
            .collect();
        debug!(traces = self.frame.traces.len(), "time plot rebuilt");
    }

    fn restyle(&mut self, signals: &[String], model: &ScopeModel) {
        self.restyles += 1;
        for trace in &mut self.frame.traces {
            if !signals.is_empty() && !signals.contains(&trace.name) {
                continue;
            }
            if let Some(item) = model.items().get(&trace.name) {
                trace.color = item.color;
            }
            trace.visible = !model.is_hidden(&trace.name);
        }
    }
}

impl View for TimePlotView {
    fn name(&self) -> &str {
        "Time plot"
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::DATA | ChangeKind::METADATA | ChangeKind::REGION | ChangeKind::TRANSFORMS
    }

    fn state(&self) -> ViewState {
        self.state
    }

    fn on_change(&mut self, event: &ModelEvent, model: &ScopeModel) {
        let kinds = event.kinds;
        if kinds.intersects(ChangeKind::DATA | ChangeKind::TRANSFORMS | ChangeKind::DATA_ITEMS) {
            self.rebuild(model);
        } else if kinds.intersects(ChangeKind::COLOR | ChangeKind::VISIBILITY) {
            self.restyle(&event.signals, model);
        }
        if kinds.intersects(ChangeKind::REGION) {
            self.region_updates += 1;
            self.frame.region = model.region().as_option();
        }
        self.state = match ViewState::of_model(model) {
            ViewState::HasData => ViewState::Rendering,
            other => other,
        };
    }
}
