//! Signals, data sets and display metadata.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use egui::Color32;
use thiserror::Error;

/// Identity of an immutable sample array, assigned once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(pub u64);

impl ArrayId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A shared, immutable array tagged with its identity.
///
/// Clones share both storage and id. Two arrays built separately never compare
/// as the same array, even when their contents are equal.
pub struct Samples<T = f64> {
    id: ArrayId,
    data: Arc<[T]>,
}

impl<T> Samples<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            id: ArrayId::next(),
            data: data.into(),
        }
    }

    #[inline]
    pub fn id(&self) -> ArrayId {
        self.id
    }

    #[inline]
    pub fn same_array(&self, other: &Samples<T>) -> bool {
        self.id == other.id
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn shared(&self) -> Arc<[T]> {
        self.data.clone()
    }
}

impl<T> Clone for Samples<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            data: self.data.clone(),
        }
    }
}

impl<T> Deref for Samples<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> From<Vec<T>> for Samples<T> {
    fn from(v: Vec<T>) -> Self {
        Self::new(v)
    }
}

impl<T> fmt::Debug for Samples<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Samples(#{}, len={})", self.id.0, self.data.len())
    }
}

/// Values of a signal. A signal's values are homogeneously typed.
#[derive(Debug, Clone)]
pub enum SignalValues {
    Numeric(Samples<f64>),
    Categorical(Samples<String>),
}

impl SignalValues {
    pub fn id(&self) -> ArrayId {
        match self {
            SignalValues::Numeric(s) => s.id(),
            SignalValues::Categorical(s) => s.id(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SignalValues::Numeric(s) => s.len(),
            SignalValues::Categorical(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&Samples<f64>> {
        match self {
            SignalValues::Numeric(s) => Some(s),
            SignalValues::Categorical(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("signal '{name}' has {timestamps} timestamps but {values} values")]
    LengthMismatch {
        name: String,
        timestamps: usize,
        values: usize,
    },
}

/// A named time series: ascending timestamps and same-length values.
#[derive(Debug, Clone)]
pub struct Signal {
    pub timestamps: Samples<f64>,
    pub values: SignalValues,
}

impl Signal {
    pub fn new(name: &str, timestamps: Samples<f64>, values: SignalValues) -> Result<Self, DataError> {
        if timestamps.len() != values.len() {
            return Err(DataError::LengthMismatch {
                name: name.to_string(),
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        Ok(Self { timestamps, values })
    }

    pub fn numeric(name: &str, timestamps: Vec<f64>, values: Vec<f64>) -> Result<Self, DataError> {
        Self::new(name, Samples::new(timestamps), SignalValues::Numeric(Samples::new(values)))
    }

    pub fn categorical(name: &str, timestamps: Vec<f64>, values: Vec<String>) -> Result<Self, DataError> {
        Self::new(name, Samples::new(timestamps), SignalValues::Categorical(Samples::new(values)))
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Insertion-ordered mapping from signal name to [`Signal`].
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    signals: HashMap<String, Signal>,
    order: Vec<String>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a signal. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, signal: Signal) {
        let name = name.into();
        if !self.signals.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.signals.insert(name, signal);
    }

    pub fn with(mut self, name: impl Into<String>, signal: Signal) -> Self {
        self.insert(name, signal);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Signal)> {
        self.order
            .iter()
            .filter_map(|n| self.signals.get(n).map(|s| (n.as_str(), s)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// A copy of this data set without the named signals. Arrays are shared.
    pub fn without(&self, names: &[String]) -> DataSet {
        let mut out = DataSet::new();
        for (name, signal) in self.iter() {
            if !names.iter().any(|n| n == name) {
                out.insert(name, signal.clone());
            }
        }
        out
    }
}

/// How a signal is plotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotKind {
    /// Numeric line plot.
    #[default]
    Default,
    /// Categorical waveform.
    Enum,
}

/// Display metadata of one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub name: String,
    pub color: Color32,
    pub kind: PlotKind,
}

impl DataItem {
    pub fn new(name: impl Into<String>, color: Color32, kind: PlotKind) -> Self {
        Self {
            name: name.into(),
            color,
            kind,
        }
    }
}

/// Ordered display metadata, independent of the data set's lifecycle.
#[derive(Debug, Clone, Default)]
pub struct DataItems {
    items: Vec<DataItem>,
    index: HashMap<String, usize>,
}

impl DataItems {
    pub fn from_items(items: Vec<DataItem>) -> Self {
        let mut out = DataItems::default();
        for item in items {
            match out.index.get(&item.name) {
                Some(&i) => out.items[i] = item,
                None => {
                    out.index.insert(item.name.clone(), out.items.len());
                    out.items.push(item);
                }
            }
        }
        out
    }

    /// Metadata for every signal of `data`, colored from the palette by position.
    pub fn for_data(data: &DataSet) -> Self {
        let items = data
            .iter()
            .enumerate()
            .map(|(i, (name, signal))| {
                let kind = match signal.values {
                    SignalValues::Numeric(_) => PlotKind::Default,
                    SignalValues::Categorical(_) => PlotKind::Enum,
                };
                DataItem::new(name, palette_color(i), kind)
            })
            .collect();
        Self::from_items(items)
    }

    pub fn get(&self, name: &str) -> Option<&DataItem> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut DataItem> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn without(&self, names: &[String]) -> DataItems {
        DataItems::from_items(
            self.items
                .iter()
                .filter(|i| !names.iter().any(|n| n == &i.name))
                .cloned()
                .collect(),
        )
    }
}

/// Allocate a distinct color for the given signal index.
pub fn palette_color(index: usize) -> Color32 {
    const PALETTE: [Color32; 10] = [
        Color32::from_rgb(31, 119, 180),
        Color32::from_rgb(255, 127, 14),
        Color32::from_rgb(44, 160, 44),
        Color32::from_rgb(214, 39, 40),
        Color32::from_rgb(148, 103, 189),
        Color32::from_rgb(140, 86, 75),
        Color32::from_rgb(227, 119, 194),
        Color32::from_rgb(127, 127, 127),
        Color32::from_rgb(188, 189, 34),
        Color32::from_rgb(23, 190, 207),
    ];
    PALETTE[index % PALETTE.len()]
}

/// Parse a color given as `#rrggbb`, `#rrggbbaa`, `#rgb` or a basic color name.
pub fn parse_color(text: &str) -> Option<Color32> {
    let t = text.trim();
    if t.starts_with('#') {
        return Color32::from_hex(t).ok();
    }
    let c = match t.to_ascii_lowercase().as_str() {
        "white" => Color32::WHITE,
        "black" => Color32::BLACK,
        "red" => Color32::RED,
        "green" => Color32::GREEN,
        "blue" => Color32::BLUE,
        "yellow" => Color32::YELLOW,
        "orange" => Color32::ORANGE,
        "gray" | "grey" => Color32::GRAY,
        "darkgray" | "darkgrey" => Color32::DARK_GRAY,
        "lightgray" | "lightgrey" => Color32::LIGHT_GRAY,
        _ => return None,
    };
    Some(c)
}
