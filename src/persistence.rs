//! State persistence: save and load scope state to/from JSON.
//!
//! Mirror types here hold what cannot derive serde traits directly (colors,
//! parsed expressions). Loading is forgiving: every entry is decoded on its
//! own, and a malformed entry is logged and skipped while the rest apply.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::model::ScopeModel;
use crate::data::signals::parse_color;
use crate::expr::Expression;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state must be a JSON object")]
    NotAnObject,
}

// ---------- Serializable mirror types ----------

/// Per-signal state. `None` leaves the current value unchanged on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStateSerde {
    pub timeshift: Option<f64>,
    pub transform: Option<String>,
    /// `#rrggbb`, `#rrggbbaa` or a basic color name.
    pub color: Option<String>,
    pub hidden: Option<bool>,
}

/// `[lo, hi]`, or `"auto"` for the whole range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionSerde {
    Range([f64; 2]),
    Named(String),
}

/// A reference geometry entry; the bare-string form is the expression alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefGeoSerde {
    Expr(String),
    Full {
        expr: String,
        color: Option<String>,
        hidden: Option<bool>,
    },
}

/// Full scope state (for save/load).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeStateSerde {
    pub signals: BTreeMap<String, SignalStateSerde>,
    pub region: Option<RegionSerde>,
    pub xy_pairings: Option<Vec<[String; 2]>>,
    pub ref_geo: Option<Vec<RefGeoSerde>>,
}

/// Outcome of a load: how many entries applied and how many were skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub applied: usize,
    pub skipped: usize,
    /// Applied signal entries whose color or visibility waits for a display
    /// item of that name.
    pub deferred: usize,
}

impl LoadReport {
    fn record<T, E: std::fmt::Display>(&mut self, what: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(v) => {
                self.applied += 1;
                Some(v)
            }
            Err(e) => {
                warn!("Skipping malformed {what}: {e}");
                self.skipped += 1;
                None
            }
        }
    }
}

// ---------- Capture ----------

/// Snapshot the persistent state of `model`, with concrete values for every
/// field.
pub fn capture_state(model: &ScopeModel) -> ScopeStateSerde {
    let mut signals = BTreeMap::new();
    for item in model.items().iter() {
        signals.insert(
            item.name.clone(),
            SignalStateSerde {
                timeshift: Some(model.timeshift(&item.name)),
                transform: Some(model.transform_source(&item.name).unwrap_or("").to_string()),
                color: Some(item.color.to_hex()),
                hidden: Some(model.is_hidden(&item.name)),
            },
        );
    }
    let region = match model.region().as_option() {
        Some((lo, hi)) => RegionSerde::Range([lo, hi]),
        None => RegionSerde::Named("auto".into()),
    };
    let ref_geo = model
        .ref_geo()
        .entries()
        .iter()
        .map(|e| RefGeoSerde::Full {
            expr: e.expr.source().to_string(),
            color: Some(e.color.to_hex()),
            hidden: Some(e.hidden),
        })
        .collect();
    ScopeStateSerde {
        signals,
        region: Some(region),
        xy_pairings: Some(
            model
                .xy_pairings()
                .iter()
                .map(|(x, y)| [x.clone(), y.clone()])
                .collect(),
        ),
        ref_geo: Some(ref_geo),
    }
}

// ---------- Apply ----------

/// Apply a state blob to `model`, entry by entry.
pub fn apply_state(model: &mut ScopeModel, state: &Value) -> Result<LoadReport, PersistError> {
    let obj = state.as_object().ok_or(PersistError::NotAnObject)?;
    let mut report = LoadReport::default();

    match obj.get("signals") {
        None | Some(Value::Null) => {}
        Some(Value::Object(signals)) => {
            for (name, entry) in signals {
                let decoded = decode_signal(entry).map_err(|e| format!("state of '{name}': {e}"));
                if let Some((state, color)) = report.record("signal", decoded) {
                    if !apply_signal(model, name, state, color) {
                        report.deferred += 1;
                    }
                }
            }
        }
        Some(other) => {
            report.record::<(), _>("signals", Err(format!("expected an object, got {other}")));
        }
    }

    match obj.get("region") {
        None | Some(Value::Null) => {}
        Some(v) => {
            let region = serde_json::from_value::<RegionSerde>(v.clone())
                .map_err(|e| e.to_string())
                .and_then(decode_region);
            if let Some(region) = report.record("region", region) {
                model.set_region(region);
            }
        }
    }

    match obj.get("xy_pairings") {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            let mut pairings = Vec::new();
            for entry in entries {
                let pair = serde_json::from_value::<[String; 2]>(entry.clone());
                if let Some([x, y]) = report.record("xy pairing", pair) {
                    pairings.push((x, y));
                }
            }
            model.set_xy_pairings(pairings);
        }
        Some(other) => {
            report.record::<(), _>("xy_pairings", Err(format!("expected a list, got {other}")));
        }
    }

    match obj.get("ref_geo") {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            model.clear_ref_geometry();
            for entry in entries {
                let decoded = serde_json::from_value::<RefGeoSerde>(entry.clone())
                    .map_err(|e| e.to_string())
                    .and_then(|g| {
                        let (expr, color, hidden) = match g {
                            RefGeoSerde::Expr(expr) => (expr, None, None),
                            RefGeoSerde::Full { expr, color, hidden } => (expr, color, hidden),
                        };
                        let color = color.map(|c| parse_color(&c).ok_or(format!("invalid color '{c}'"))).transpose()?;
                        Ok((expr, color, hidden))
                    });
                let Some((expr, color, hidden)) = report.record("reference geometry", decoded) else {
                    continue;
                };
                if let Err(e) = model.set_ref_geometry(None, &expr, color, hidden) {
                    warn!("Skipping reference geometry '{expr}': {e}");
                    report.applied -= 1;
                    report.skipped += 1;
                }
            }
        }
        Some(other) => {
            report.record::<(), _>("ref_geo", Err(format!("expected a list, got {other}")));
        }
    }

    Ok(report)
}

/// Decode and validate a signal entry before anything is applied, so an entry
/// applies entirely or not at all.
fn decode_signal(entry: &Value) -> Result<(SignalStateSerde, Option<egui::Color32>), String> {
    let state: SignalStateSerde = serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;
    let color = match &state.color {
        Some(c) => Some(parse_color(c).ok_or(format!("invalid color '{c}'"))?),
        None => None,
    };
    if let Some(expr) = state.transform.as_deref().filter(|e| !e.trim().is_empty()) {
        Expression::parse(expr).map_err(|e| e.to_string())?;
    }
    Ok((state, color))
}

/// Returns false when the style was kept for a display item not present yet.
fn apply_signal(model: &mut ScopeModel, name: &str, state: SignalStateSerde, color: Option<egui::Color32>) -> bool {
    let names = [name.to_string()];
    if let Some(offset) = state.timeshift {
        if offset != model.timeshift(name) {
            model.set_timeshift(&names, offset);
        }
    }
    if let Some(expr) = state.transform {
        if model.transform_source(name).unwrap_or("") != expr {
            // validated in decode_signal
            if let Err(e) = model.set_transform(name, &expr) {
                warn!("Skipping transform of '{name}': {e}");
            }
        }
    }
    if (color.is_some() || state.hidden.is_some()) && !model.restore_style(name, color, state.hidden) {
        debug!("No display item '{name}' yet, keeping its color and visibility");
        return false;
    }
    true
}

fn decode_region(region: RegionSerde) -> Result<Option<(f64, f64)>, String> {
    match region {
        RegionSerde::Range([lo, hi]) if lo.is_finite() && hi.is_finite() => Ok(Some((lo, hi))),
        RegionSerde::Range(r) => Err(format!("non-finite bounds {r:?}")),
        RegionSerde::Named(n) if n == "auto" => Ok(None),
        RegionSerde::Named(n) => Err(format!("unknown region '{n}'")),
    }
}

// ---------- Public API ----------

/// Serialize the scope state as pretty JSON.
pub fn state_to_json(state: &ScopeStateSerde) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Parse a state blob. Only the top level is checked here; entries are
/// validated by [`apply_state`].
pub fn state_from_json(json: &str) -> Result<Value, PersistError> {
    let value: Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(PersistError::NotAnObject);
    }
    Ok(value)
}

/// Save the scope state to a JSON file at the given path.
pub fn save_state_to_path(state: &ScopeStateSerde, path: &Path) -> Result<(), PersistError> {
    let txt = state_to_json(state)?;
    std::fs::write(path, txt)?;
    Ok(())
}

/// Load a state blob from a JSON file at the given path.
pub fn load_state_from_path(path: &Path) -> Result<Value, PersistError> {
    let txt = std::fs::read_to_string(path)?;
    state_from_json(&txt)
}
