//! The scope model: raw data, display metadata, selection and per-signal
//! transform state, plus the derived (shifted, transformed) view of the data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use egui::Color32;
use tracing::{debug, info};

use super::refgeo::{RefGeoSet, SignalSource};
use super::region::Region;
use super::signals::{ArrayId, DataItem, DataItems, DataSet, PlotKind, Samples, SignalValues};
use super::timeshift::Timeshifts;
use super::transform::{TransformError, Transforms};
use crate::events::{ChangeKind, EventBus, ModelEvent};
use crate::expr::ParseError;

/// One signal after timeshift and transform.
#[derive(Debug, Clone)]
pub struct DerivedSignal {
    pub name: String,
    pub timestamps: Samples<f64>,
    pub values: Result<SignalValues, TransformError>,
}

/// Derived view of the whole data set, in data set order.
#[derive(Debug, Clone, Default)]
pub struct DerivedData {
    signals: Vec<DerivedSignal>,
    index: HashMap<String, usize>,
}

impl DerivedData {
    fn push(&mut self, signal: DerivedSignal) {
        self.index.insert(signal.name.clone(), self.signals.len());
        self.signals.push(signal);
    }

    pub fn get(&self, name: &str) -> Option<&DerivedSignal> {
        self.index.get(name).map(|&i| &self.signals[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedSignal> {
        self.signals.iter()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl SignalSource for DerivedData {
    fn numeric(&self, name: &str) -> Option<(&[f64], &[f64])> {
        let signal = self.get(name)?;
        match &signal.values {
            Ok(SignalValues::Numeric(v)) => Some((signal.timestamps.as_slice(), v.as_slice())),
            _ => None,
        }
    }
}

/// What a plot draws for one signal.
#[derive(Debug, Clone)]
pub struct SignalView {
    pub timestamps: Samples<f64>,
    pub values: SignalValues,
    /// Index range inside the current region, `None` when it holds no samples.
    pub range: Option<(usize, usize)>,
}

/// Color and visibility restored for a signal before its display item exists.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PendingStyle {
    color: Option<Color32>,
    hidden: Option<bool>,
}

/// Shared state of one scope window.
///
/// Every mutator emits a [`ModelEvent`] on [`events`](Self::events).
/// Mutations that affect derived data only mark it stale; call
/// [`refresh`](Self::refresh) before reading [`derived`](Self::derived).
#[derive(Debug)]
pub struct ScopeModel {
    data: Arc<DataSet>,
    generation: u64,
    items: DataItems,
    hidden: HashSet<String>,
    pending_styles: HashMap<String, PendingStyle>,
    region: Region,
    timeshifts: Timeshifts,
    transforms: Transforms,
    xy_pairings: Vec<(String, String)>,
    ref_geo: RefGeoSet,
    ref_geo_color: Color32,
    derived: Arc<DerivedData>,
    stale: bool,
    bus: EventBus,
}

impl Default for ScopeModel {
    fn default() -> Self {
        Self::new(Color32::DARK_GRAY)
    }
}

impl ScopeModel {
    pub fn new(ref_geo_color: Color32) -> Self {
        Self {
            data: Arc::new(DataSet::new()),
            generation: 0,
            items: DataItems::default(),
            hidden: HashSet::new(),
            pending_styles: HashMap::new(),
            region: Region::Unbounded,
            timeshifts: Timeshifts::new(),
            transforms: Transforms::new(),
            xy_pairings: Vec::new(),
            ref_geo: RefGeoSet::new(),
            ref_geo_color,
            derived: Arc::new(DerivedData::default()),
            stale: false,
            bus: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    fn emit(&self, kinds: ChangeKind, signals: Vec<String>) {
        self.bus.emit(ModelEvent::new(kinds).with_signals(signals));
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn data(&self) -> &Arc<DataSet> {
        &self.data
    }

    /// Incremented on every data set replacement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn items(&self) -> &DataItems {
        &self.items
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn timeshift(&self, name: &str) -> f64 {
        self.timeshifts.offset(name)
    }

    pub fn transform_source(&self, name: &str) -> Option<&str> {
        self.transforms.transform(name).map(|e| e.source())
    }

    pub fn xy_pairings(&self) -> &[(String, String)] {
        &self.xy_pairings
    }

    pub fn ref_geo(&self) -> &RefGeoSet {
        &self.ref_geo
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Derived data as of the last [`refresh`](Self::refresh).
    pub fn derived(&self) -> &Arc<DerivedData> {
        &self.derived
    }

    /// The transform failure of `name`, if its transform failed.
    pub fn transform_error(&self, name: &str) -> Option<&TransformError> {
        self.derived.get(name)?.values.as_ref().err()
    }

    /// Shifted timestamps, transformed values and the index range in the
    /// current region. `None` for unknown signals and failed transforms.
    pub fn view(&self, name: &str) -> Option<SignalView> {
        let signal = self.derived.get(name)?;
        let values = signal.values.as_ref().ok()?.clone();
        Some(SignalView {
            range: self.region.indices(&signal.timestamps),
            timestamps: signal.timestamps.clone(),
            values,
        })
    }

    // ── Data ─────────────────────────────────────────────────────────────

    /// Replace the data set. Transform state and metadata carry over by name.
    pub fn set_data(&mut self, data: DataSet) {
        self.generation += 1;
        info!(signals = data.len(), generation = self.generation, "data set replaced");
        let names = data.names().to_vec();
        self.data = Arc::new(data);
        self.stale = true;
        self.emit(ChangeKind::DATA_VALUES, names);
    }

    pub fn set_data_items(&mut self, items: Vec<DataItem>) {
        self.items = DataItems::from_items(items);
        for (name, style) in std::mem::take(&mut self.pending_styles) {
            let Some(item) = self.items.get_mut(&name) else {
                self.pending_styles.insert(name, style);
                continue;
            };
            if let Some(color) = style.color {
                item.color = color;
            }
            match style.hidden {
                Some(true) if item.kind == PlotKind::Default => {
                    self.hidden.insert(name);
                }
                Some(false) => {
                    self.hidden.remove(&name);
                }
                _ => {}
            }
        }
        let items = &self.items;
        self.hidden
            .retain(|n| items.get(n).is_some_and(|i| i.kind == PlotKind::Default));
        let names = self.items.iter().map(|i| i.name.clone()).collect();
        self.emit(ChangeKind::DATA_ITEMS, names);
    }

    /// Remove signals from data, metadata and transform state. X-Y pairings
    /// that mention them are left for the caller to prune.
    pub fn remove_signals(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        self.generation += 1;
        self.data = Arc::new(self.data.without(names));
        self.items = self.items.without(names);
        for name in names {
            self.hidden.remove(name);
            self.timeshifts.clear(name);
            self.transforms.clear(name);
        }
        self.stale = true;
        self.emit(
            ChangeKind::DATA_VALUES | ChangeKind::DATA_ITEMS | ChangeKind::TRANSFORMS,
            names.to_vec(),
        );
    }

    // ── Metadata ─────────────────────────────────────────────────────────

    pub fn set_color(&mut self, names: &[String], color: Color32) {
        let mut changed = Vec::new();
        for name in names {
            if let Some(item) = self.items.get_mut(name) {
                if item.color != color {
                    item.color = color;
                    changed.push(name.clone());
                }
            }
        }
        if !changed.is_empty() {
            self.emit(ChangeKind::COLOR, changed);
        }
    }

    /// Show or hide signals. Only numeric (default kind) signals can be hidden.
    pub fn set_hidden(&mut self, names: &[String], hidden: bool) {
        let mut changed = Vec::new();
        for name in names {
            if self.items.get(name).map(|i| i.kind) != Some(PlotKind::Default) {
                continue;
            }
            let was = if hidden {
                !self.hidden.insert(name.clone())
            } else {
                self.hidden.remove(name)
            };
            if was != hidden {
                changed.push(name.clone());
            }
        }
        if !changed.is_empty() {
            self.emit(ChangeKind::VISIBILITY, changed);
        }
    }

    /// Apply a restored color and visibility to `name`, or keep them until a
    /// display item of that name arrives. Returns false when kept.
    pub fn restore_style(&mut self, name: &str, color: Option<Color32>, hidden: Option<bool>) -> bool {
        if self.items.get(name).is_none() {
            let pending = self.pending_styles.entry(name.to_string()).or_default();
            if color.is_some() {
                pending.color = color;
            }
            if hidden.is_some() {
                pending.hidden = hidden;
            }
            return false;
        }
        let names = [name.to_string()];
        if let Some(color) = color {
            self.set_color(&names, color);
        }
        if let Some(hidden) = hidden {
            self.set_hidden(&names, hidden);
        }
        true
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Select a region, or the whole range with `None`. Returns whether the
    /// region changed.
    pub fn set_region(&mut self, region: Option<(f64, f64)>) -> bool {
        let region = Region::from_option(region);
        if region == self.region {
            return false;
        }
        self.region = region;
        self.emit(ChangeKind::REGION, Vec::new());
        true
    }

    // ── Transforms ───────────────────────────────────────────────────────

    pub fn set_timeshift(&mut self, names: &[String], offset: f64) {
        self.timeshifts.set_timeshift(names, offset);
        self.stale = true;
        self.emit(ChangeKind::TIMESHIFT, names.to_vec());
    }

    /// Set or, with a blank expression, clear the transform of `name`.
    pub fn set_transform(&mut self, name: &str, expr: &str) -> Result<(), ParseError> {
        self.transforms.set_transform(name, expr)?;
        self.stale = true;
        self.emit(ChangeKind::TRANSFORM, vec![name.to_string()]);
        Ok(())
    }

    // ── X-Y ──────────────────────────────────────────────────────────────

    /// Add an (x, y) pairing. Returns false if it already exists.
    pub fn add_xy_pairing(&mut self, x: &str, y: &str) -> bool {
        if self.xy_pairings.iter().any(|(a, b)| a == x && b == y) {
            return false;
        }
        self.xy_pairings.push((x.to_string(), y.to_string()));
        self.emit(ChangeKind::XY_PAIRINGS, vec![x.to_string(), y.to_string()]);
        true
    }

    pub fn remove_xy_pairing(&mut self, x: &str, y: &str) -> bool {
        let before = self.xy_pairings.len();
        self.xy_pairings.retain(|(a, b)| !(a == x && b == y));
        if self.xy_pairings.len() == before {
            return false;
        }
        self.emit(ChangeKind::XY_PAIRINGS, vec![x.to_string(), y.to_string()]);
        true
    }

    /// Remove every pairing that mentions `name`.
    pub fn prune_xy_pairings(&mut self, name: &str) -> usize {
        let before = self.xy_pairings.len();
        self.xy_pairings.retain(|(a, b)| a != name && b != name);
        let removed = before - self.xy_pairings.len();
        if removed > 0 {
            self.emit(ChangeKind::XY_PAIRINGS, vec![name.to_string()]);
        }
        removed
    }

    pub fn set_xy_pairings(&mut self, pairings: Vec<(String, String)>) {
        let mut deduped: Vec<(String, String)> = Vec::with_capacity(pairings.len());
        for pair in pairings {
            if !deduped.contains(&pair) {
                deduped.push(pair);
            }
        }
        if deduped != self.xy_pairings {
            self.xy_pairings = deduped;
            self.emit(ChangeKind::XY_PAIRINGS, Vec::new());
        }
    }

    /// Add, replace or delete a reference geometry entry; see
    /// [`RefGeoSet::set`].
    pub fn set_ref_geometry(
        &mut self,
        index: Option<usize>,
        expr: &str,
        color: Option<Color32>,
        hidden: Option<bool>,
    ) -> Result<(), ParseError> {
        self.ref_geo.set(index, expr, color, hidden, self.ref_geo_color)?;
        self.emit(ChangeKind::REF_GEO, Vec::new());
        Ok(())
    }

    pub fn clear_ref_geometry(&mut self) {
        if !self.ref_geo.is_empty() {
            self.ref_geo.clear();
            self.emit(ChangeKind::REF_GEO, Vec::new());
        }
    }

    // ── Derived data ─────────────────────────────────────────────────────

    /// Recompute derived data if anything it depends on changed. Returns
    /// whether it was recomputed.
    pub fn refresh(&mut self) -> bool {
        if !self.stale {
            return false;
        }
        let mut derived = DerivedData::default();
        for name in self.data.names() {
            let Some(timestamps) = self.timeshifts.apply_timeshift(name, &self.data) else {
                continue;
            };
            let values = self.transforms.apply_transform(name, &self.data, &timestamps);
            if let Err(e) = &values {
                debug!(signal = name.as_str(), error = %e, "transform failed");
            }
            derived.push(DerivedSignal {
                name: name.clone(),
                timestamps,
                values,
            });
        }

        let live: HashSet<ArrayId> = self
            .data
            .iter()
            .flat_map(|(_, s)| [s.timestamps.id(), s.values.id()])
            .collect();
        self.timeshifts.retain_sources(&live);
        self.transforms.retain_sources(&live);

        self.derived = Arc::new(derived);
        self.stale = false;
        true
    }
}
