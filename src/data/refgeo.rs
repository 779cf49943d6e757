//! Reference geometry: user expressions drawn as overlays on X-Y plots.

use egui::Color32;

use super::region::Region;
use super::signals::{DataSet, SignalValues};
use crate::expr::{EvalError, Expression, ParseError, Scope, Shape, Value};

/// Numeric signals by name, as `(timestamps, values)`.
pub trait SignalSource {
    fn numeric(&self, name: &str) -> Option<(&[f64], &[f64])>;
}

impl SignalSource for DataSet {
    fn numeric(&self, name: &str) -> Option<(&[f64], &[f64])> {
        let signal = self.get(name)?;
        match &signal.values {
            SignalValues::Numeric(v) => Some((signal.timestamps.as_slice(), v.as_slice())),
            SignalValues::Categorical(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefGeoDef {
    pub expr: Expression,
    pub color: Color32,
    pub hidden: bool,
}

/// Result of evaluating one visible entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RefGeoOutcome {
    pub index: usize,
    pub label: String,
    pub color: Color32,
    pub shapes: Result<Vec<Shape>, EvalError>,
}

impl RefGeoOutcome {
    /// Inline error text, `"{kind}: {message}: {label}"`.
    pub fn error_text(&self) -> Option<String> {
        self.shapes
            .as_ref()
            .err()
            .map(|e| format!("{}: {}: {}", e.kind(), e, self.label))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefGeoSet {
    entries: Vec<RefGeoDef>,
}

impl RefGeoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RefGeoDef] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add, replace or delete an entry.
    ///
    /// `index` of `None` (or past the end) appends. A blank `expr` deletes the
    /// entry at `index`. `color` and `hidden` keep the previous value when
    /// `None`, defaulting to `default_color` and visible for a new entry.
    pub fn set(
        &mut self,
        index: Option<usize>,
        expr: &str,
        color: Option<Color32>,
        hidden: Option<bool>,
        default_color: Color32,
    ) -> Result<(), ParseError> {
        let existing = index.filter(|&i| i < self.entries.len());
        if expr.trim().is_empty() {
            if let Some(i) = existing {
                self.entries.remove(i);
            }
            return Ok(());
        }
        let expr = Expression::parse(expr)?;
        match existing {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.expr = expr;
                if let Some(c) = color {
                    entry.color = c;
                }
                if let Some(h) = hidden {
                    entry.hidden = h;
                }
            }
            None => self.entries.push(RefGeoDef {
                expr,
                color: color.unwrap_or(default_color),
                hidden: hidden.unwrap_or(false),
            }),
        }
        Ok(())
    }

    pub fn set_hidden(&mut self, index: usize, hidden: bool) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.hidden = hidden;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Evaluate every visible entry against `data` bounded to `region`.
    pub fn evaluate(&self, data: &dyn SignalSource, region: Region) -> Vec<RefGeoOutcome> {
        let scope = RefGeoScope { data, region };
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.hidden)
            .map(|(index, entry)| RefGeoOutcome {
                index,
                label: entry.expr.label().to_string(),
                color: entry.color,
                shapes: entry.expr.eval(&scope).and_then(into_shapes),
            })
            .collect()
    }
}

fn into_shapes(value: Value) -> Result<Vec<Shape>, EvalError> {
    match value {
        Value::Shape(s) => Ok(vec![s]),
        Value::List(items) => items
            .into_iter()
            .map(|v| match v {
                Value::Shape(s) => Ok(s),
                other => Err(EvalError::Type(format!(
                    "expected a list of shapes, found a {}",
                    other.type_name()
                ))),
            })
            .collect(),
        other => Err(EvalError::Type(format!(
            "expected a shape or list of shapes, got a {}",
            other.type_name()
        ))),
    }
}

struct RefGeoScope<'a> {
    data: &'a dyn SignalSource,
    region: Region,
}

impl Scope for RefGeoScope<'_> {
    fn variable(&self, _name: &str) -> Option<Value> {
        None
    }

    fn signal(&self, name: &str) -> Result<Value, EvalError> {
        let (ts, values) = self
            .data
            .numeric(name)
            .ok_or_else(|| EvalError::NoData(name.to_string()))?;
        let sliced = self.region.slice(ts, values);
        if sliced.is_empty() {
            return Err(EvalError::NoData(name.to_string()));
        }
        Ok(Value::array(sliced.to_vec()))
    }

    fn call(&self, name: &str, args: &[Value], kwargs: &[(String, Value)]) -> Option<Result<Value, EvalError>> {
        let shape = match name {
            "axvline" => single(name, "x", args, kwargs).map(Shape::VLine),
            "axhline" => single(name, "y", args, kwargs).map(Shape::HLine),
            "plot" => points(name, args, kwargs).map(|(x, y)| Shape::Polyline { x, y }),
            "scatter" => points(name, args, kwargs).map(|(x, y)| Shape::Scatter { x, y }),
            _ => return None,
        };
        Some(shape.map(Value::Shape))
    }
}

fn kwarg<'a>(kwargs: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    kwargs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn arity(name: &str, message: &str) -> EvalError {
    EvalError::Arity {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn single(name: &str, key: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<f64, EvalError> {
    match (args, kwarg(kwargs, key)) {
        ([v], None) if kwargs.is_empty() => v.as_number(),
        ([], Some(v)) if kwargs.len() == 1 => v.as_number(),
        _ => Err(arity(name, &format!("takes exactly one argument '{key}'"))),
    }
}

fn points(name: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<(Vec<f64>, Vec<f64>), EvalError> {
    let (x, y) = match (args, kwarg(kwargs, "x"), kwarg(kwargs, "y"), kwarg(kwargs, "pts")) {
        ([x, y], None, None, None) | ([], Some(x), Some(y), None) => (x.to_vec()?, y.to_vec()?),
        ([pts], None, None, None) | ([], None, None, Some(pts)) => pairs(pts)?,
        _ => return Err(arity(name, "takes x and y arrays, or pts as a list of [x, y] pairs")),
    };
    if x.len() != y.len() {
        return Err(EvalError::LengthMismatch(x.len(), y.len()));
    }
    Ok((x, y))
}

fn pairs(pts: &Value) -> Result<(Vec<f64>, Vec<f64>), EvalError> {
    let Value::List(items) = pts else {
        return Err(EvalError::Type(format!("pts must be a list, got a {}", pts.type_name())));
    };
    let mut xs = Vec::with_capacity(items.len());
    let mut ys = Vec::with_capacity(items.len());
    for item in items {
        match item.to_vec()?.as_slice() {
            [x, y] => {
                xs.push(*x);
                ys.push(*y);
            }
            other => {
                return Err(EvalError::Type(format!("each point needs 2 coordinates, got {}", other.len())));
            }
        }
    }
    Ok((xs, ys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::signals::Signal;

    fn data() -> DataSet {
        DataSet::new()
            .with("a", Signal::numeric("a", vec![0.0, 1.0, 2.0, 3.0], vec![5.0, 1.0, 9.0, 4.0]).unwrap())
            .with("e", Signal::categorical("e", vec![0.0], vec!["x".into()]).unwrap())
    }

    fn set_one(expr: &str) -> RefGeoSet {
        let mut set = RefGeoSet::new();
        set.set(None, expr, None, None, Color32::DARK_GRAY).unwrap();
        set
    }

    #[test]
    fn lines_use_region_bounded_data() {
        let set = set_one("axhline(max(data['a']))  # peak");
        let out = set.evaluate(&data(), Region::bounded(0.5, 1.5));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "peak");
        assert_eq!(out[0].color, Color32::DARK_GRAY);
        assert_eq!(out[0].shapes, Ok(vec![Shape::HLine(1.0)]));
        let out = set.evaluate(&data(), Region::Unbounded);
        assert_eq!(out[0].shapes, Ok(vec![Shape::HLine(9.0)]));
    }

    #[test]
    fn polyline_and_scatter_forms() {
        let set = set_one("[plot(x=[0, 1], y=[2, 3]), scatter(pts=[[0, 1], [2, 3]]), axvline(x=4)]");
        let out = set.evaluate(&data(), Region::Unbounded);
        assert_eq!(
            out[0].shapes,
            Ok(vec![
                Shape::Polyline { x: vec![0.0, 1.0], y: vec![2.0, 3.0] },
                Shape::Scatter { x: vec![0.0, 2.0], y: vec![1.0, 3.0] },
                Shape::VLine(4.0),
            ])
        );
    }

    #[test]
    fn errors_are_kept_per_entry() {
        let mut set = set_one("42");
        set.set(None, "axvline(data['missing'][0])", None, None, Color32::DARK_GRAY).unwrap();
        set.set(None, "axvline(1)", Some(Color32::RED), None, Color32::DARK_GRAY).unwrap();
        let out = set.evaluate(&data(), Region::Unbounded);
        assert_eq!(out.len(), 3);
        assert_eq!(
            out[0].error_text().unwrap(),
            "TypeError: expected a shape or list of shapes, got a number: 42"
        );
        assert!(matches!(out[1].shapes, Err(EvalError::NoData(_))));
        assert_eq!(out[2].shapes, Ok(vec![Shape::VLine(1.0)]));
        assert_eq!(out[2].color, Color32::RED);
    }

    #[test]
    fn set_replaces_deletes_and_keeps_style() {
        let mut set = set_one("axvline(1)");
        set.set(Some(0), "axvline(2)", None, Some(true), Color32::BLUE).unwrap();
        assert_eq!(set.entries()[0].color, Color32::DARK_GRAY);
        assert!(set.entries()[0].hidden);
        assert!(set.evaluate(&data(), Region::Unbounded).is_empty());
        assert!(set.set(Some(0), "axvline(", None, None, Color32::BLUE).is_err());
        assert_eq!(set.entries()[0].expr.source(), "axvline(2)");
        set.set(Some(0), "", None, None, Color32::BLUE).unwrap();
        assert!(set.is_empty());
    }
}
