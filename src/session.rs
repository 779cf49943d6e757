//! Scope session: owns the model and its views and routes model events to
//! the views interested in them.

use std::path::Path;
use std::sync::mpsc::Receiver;

use egui::Color32;
use tracing::debug;

use crate::config::ScopeConfig;
use crate::data::model::ScopeModel;
use crate::data::signals::{DataItem, DataSet};
use crate::events::{ChangeKind, ModelEvent};
use crate::expr::ParseError;
use crate::persistence::{
    apply_state, capture_state, load_state_from_path, save_state_to_path, state_to_json, LoadReport,
    PersistError, ScopeStateSerde,
};
use crate::views::{SignalsTable, TimePlotView, View, XyError, XyPlotView};

// Per-event delivery tracing; enable with the `propagation_debug` feature.
#[cfg(feature = "propagation_debug")]
#[allow(unused_macros)]
macro_rules! propagation_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*); };
}

#[cfg(not(feature = "propagation_debug"))]
#[allow(unused_macros)]
macro_rules! propagation_debug {
    ($($arg:tt)*) => {{ /* no-op */ }};
}

fn deliver(view: &mut dyn View, event: &ModelEvent, model: &ScopeModel) {
    if !event.kinds.intersects(view.interests()) {
        return;
    }
    propagation_debug!(view = view.name(), kinds = %event.kinds, "delivering event");
    view.on_change(event, model);
}

/// One scope window: model, time plot, signals table and an optional X-Y
/// plot, plus any extra views registered by the caller.
///
/// Every mutating method updates the model and then calls
/// [`propagate`](Self::propagate), so views are current when it returns.
pub struct ScopeSession {
    config: ScopeConfig,
    model: ScopeModel,
    events: Receiver<ModelEvent>,
    plot: TimePlotView,
    xy: Option<XyPlotView>,
    table: SignalsTable,
    extra: Vec<Box<dyn View>>,
}

impl ScopeSession {
    pub fn new(config: ScopeConfig) -> Self {
        let model = ScopeModel::new(config.ref_geo_color);
        let events = model.events().subscribe_all();
        let table = SignalsTable::new(config.stats_precision, config.stats_worker);
        Self {
            config,
            model,
            events,
            plot: TimePlotView::new(),
            xy: None,
            table,
            extra: Vec::new(),
        }
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn model(&self) -> &ScopeModel {
        &self.model
    }

    pub fn time_plot(&self) -> &TimePlotView {
        &self.plot
    }

    pub fn xy_plot(&self) -> Option<&XyPlotView> {
        self.xy.as_ref()
    }

    pub fn table(&self) -> &SignalsTable {
        &self.table
    }

    pub fn views(&self) -> impl Iterator<Item = &dyn View> {
        let fixed: [Option<&dyn View>; 3] = [
            Some(&self.plot),
            self.xy.as_ref().map(|v| v as &dyn View),
            Some(&self.table),
        ];
        fixed
            .into_iter()
            .flatten()
            .chain(self.extra.iter().map(|v| v.as_ref()))
    }

    // ── Propagation ──────────────────────────────────────────────────────

    /// Refresh derived data once, then deliver every queued event to the
    /// views interested in it. Returns the number of events delivered.
    pub fn propagate(&mut self) -> usize {
        let events: Vec<ModelEvent> = self.events.try_iter().collect();
        if events.is_empty() {
            return 0;
        }
        self.model.refresh();
        for event in &events {
            deliver(&mut self.plot, event, &self.model);
            if let Some(xy) = self.xy.as_mut() {
                deliver(xy, event, &self.model);
            }
            deliver(&mut self.table, event, &self.model);
            for view in &mut self.extra {
                deliver(view.as_mut(), event, &self.model);
            }
        }
        debug!(events = events.len(), "propagated model events");
        events.len()
    }

    /// Pick up statistics finished by the background worker. Returns whether
    /// the table changed.
    pub fn poll_background(&mut self) -> bool {
        self.table.poll_stats(&self.model)
    }

    /// Register a view and render it against the current model.
    pub fn add_view(&mut self, mut view: Box<dyn View>) {
        self.propagate();
        view.on_change(&ModelEvent::new(ChangeKind::ALL), &self.model);
        self.extra.push(view);
    }

    // ── Data ─────────────────────────────────────────────────────────────

    pub fn set_data(&mut self, data: DataSet) {
        self.model.set_data(data);
        self.propagate();
    }

    pub fn set_data_items(&mut self, items: Vec<DataItem>) {
        self.model.set_data_items(items);
        self.propagate();
    }

    /// Remove signals everywhere except X-Y pairings; see
    /// [`prune_xy_pairings`](Self::prune_xy_pairings).
    pub fn remove_signals(&mut self, names: &[String]) {
        self.model.remove_signals(names);
        self.propagate();
    }

    // ── Metadata ─────────────────────────────────────────────────────────

    pub fn set_color(&mut self, names: &[String], color: Color32) {
        self.model.set_color(names, color);
        self.propagate();
    }

    pub fn set_hidden(&mut self, names: &[String], hidden: bool) {
        self.model.set_hidden(names, hidden);
        self.propagate();
    }

    // ── Selection and transforms ─────────────────────────────────────────

    pub fn set_region(&mut self, region: Option<(f64, f64)>) -> bool {
        let changed = self.model.set_region(region);
        self.propagate();
        changed
    }

    pub fn set_timeshift(&mut self, names: &[String], offset: f64) {
        self.model.set_timeshift(names, offset);
        self.propagate();
    }

    pub fn set_transform(&mut self, name: &str, expr: &str) -> Result<(), ParseError> {
        self.model.set_transform(name, expr)?;
        self.propagate();
        Ok(())
    }

    // ── X-Y ──────────────────────────────────────────────────────────────

    /// Create an X-Y plot of the two selected signals, first as X. Opens the
    /// X-Y view if there is none yet.
    pub fn create_xy(&mut self, selection: &[String]) -> Result<(), XyError> {
        let [x, y] = selection else {
            return Err(XyError::SelectionCount(selection.len()));
        };
        self.model.add_xy_pairing(x, y);
        if self.xy.is_none() {
            self.propagate();
            let mut view = XyPlotView::new(self.config.xy_fade_segments);
            view.on_change(&ModelEvent::new(ChangeKind::ALL), &self.model);
            self.xy = Some(view);
        } else {
            self.propagate();
        }
        Ok(())
    }

    pub fn close_xy(&mut self) {
        self.xy = None;
    }

    pub fn add_xy_pairing(&mut self, x: &str, y: &str) -> bool {
        let added = self.model.add_xy_pairing(x, y);
        self.propagate();
        added
    }

    pub fn remove_xy_pairing(&mut self, x: &str, y: &str) -> bool {
        let removed = self.model.remove_xy_pairing(x, y);
        self.propagate();
        removed
    }

    pub fn prune_xy_pairings(&mut self, name: &str) -> usize {
        let removed = self.model.prune_xy_pairings(name);
        self.propagate();
        removed
    }

    pub fn set_ref_geometry(
        &mut self,
        index: Option<usize>,
        expr: &str,
        color: Option<Color32>,
        hidden: Option<bool>,
    ) -> Result<(), ParseError> {
        self.model.set_ref_geometry(index, expr, color, hidden)?;
        self.propagate();
        Ok(())
    }

    pub fn clear_ref_geometry(&mut self) {
        self.model.clear_ref_geometry();
        self.propagate();
    }

    // ── Persistence ──────────────────────────────────────────────────────

    pub fn save_state(&self) -> ScopeStateSerde {
        capture_state(&self.model)
    }

    pub fn save_state_json(&self) -> Result<String, PersistError> {
        state_to_json(&self.save_state())
    }

    pub fn load_state(&mut self, state: &serde_json::Value) -> Result<LoadReport, PersistError> {
        let report = apply_state(&mut self.model, state)?;
        self.propagate();
        Ok(report)
    }

    pub fn save_state_to_path(&self, path: &Path) -> Result<(), PersistError> {
        save_state_to_path(&self.save_state(), path)
    }

    pub fn load_state_from_path(&mut self, path: &Path) -> Result<LoadReport, PersistError> {
        let state = load_state_from_path(path)?;
        self.load_state(&state)
    }
}
