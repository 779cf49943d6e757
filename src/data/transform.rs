//! Per-signal value transforms written in the expression language.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use super::cache::IdentityCache;
use super::signals::{ArrayId, DataSet, Samples, SignalValues};
use crate::expr::{EvalError, Expression, ParseError, Scope, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("{source}")]
    Eval {
        signal: String,
        #[source]
        source: EvalError,
    },
    #[error("values of '{signal}' are not numeric")]
    NotNumeric { signal: String },
    #[error("no data for '{missing}'")]
    NoData { signal: String, missing: String },
    #[error("returned {got} values for {expected} samples")]
    LengthMismatch { signal: String, expected: usize, got: usize },
    #[error("returned a {got}, expected a number or array")]
    ResultType { signal: String, got: &'static str },
}

impl TransformError {
    pub fn signal(&self) -> &str {
        match self {
            TransformError::Eval { signal, .. }
            | TransformError::NotNumeric { signal }
            | TransformError::NoData { signal, .. }
            | TransformError::LengthMismatch { signal, .. }
            | TransformError::ResultType { signal, .. } => signal,
        }
    }
}

/// Everything a cached transform result depends on besides the source values.
#[derive(Debug, Clone, PartialEq)]
struct TransformKey {
    expr: String,
    timestamps: ArrayId,
    deps: Vec<Option<ArrayId>>,
}

#[derive(Debug, Default)]
pub struct Transforms {
    exprs: HashMap<String, Expression>,
    cache: IdentityCache<TransformKey, Result<SignalValues, TransformError>>,
}

impl Transforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transform of `name`. A blank expression clears it. On a parse
    /// error nothing changes.
    pub fn set_transform(&mut self, name: &str, expr: &str) -> Result<(), ParseError> {
        if expr.trim().is_empty() {
            self.exprs.remove(name);
            return Ok(());
        }
        let parsed = Expression::parse(expr)?;
        self.exprs.insert(name.to_string(), parsed);
        Ok(())
    }

    pub fn transform(&self, name: &str) -> Option<&Expression> {
        self.exprs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.exprs.iter().map(|(n, e)| (n.as_str(), e))
    }

    /// Values of `name` after its transform, evaluated against
    /// `timestamps` (already timeshifted).
    ///
    /// Without a transform the source values come back unchanged. Results,
    /// errors included, are cached against the source values and reused while
    /// the expression, timestamps and referenced signals are the same arrays.
    pub fn apply_transform(
        &mut self,
        name: &str,
        data: &DataSet,
        timestamps: &Samples<f64>,
    ) -> Result<SignalValues, TransformError> {
        let signal = data.get(name).ok_or_else(|| TransformError::NoData {
            signal: name.to_string(),
            missing: name.to_string(),
        })?;
        let Some(expr) = self.exprs.get(name) else {
            return Ok(signal.values.clone());
        };
        let key = TransformKey {
            expr: expr.source().to_string(),
            timestamps: timestamps.id(),
            deps: expr
                .referenced_signals()
                .iter()
                .map(|dep| data.get(dep).map(|s| s.values.id()))
                .collect(),
        };
        let result = self.cache.get_or_insert_with(signal.values.id(), key, || {
            debug!(signal = name, expr = expr.source(), "transform cache miss");
            evaluate(name, expr, &signal.values, timestamps, data)
        });
        result.clone()
    }

    /// Forget the transform of a removed signal.
    pub fn clear(&mut self, name: &str) {
        self.exprs.remove(name);
    }

    pub fn retain_sources(&mut self, live: &HashSet<ArrayId>) {
        self.cache.retain_sources(live);
    }
}

struct TransformScope<'a> {
    x: &'a Samples<f64>,
    t: &'a Samples<f64>,
    data: &'a DataSet,
}

impl Scope for TransformScope<'_> {
    fn variable(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::Array(self.x.shared())),
            "t" => Some(Value::Array(self.t.shared())),
            _ => None,
        }
    }

    fn signal(&self, name: &str) -> Result<Value, EvalError> {
        match self.data.get(name).map(|s| &s.values) {
            Some(SignalValues::Numeric(v)) if !v.is_empty() => Ok(Value::Array(v.shared())),
            Some(SignalValues::Categorical(_)) => Err(EvalError::Type(format!("signal '{name}' is not numeric"))),
            _ => Err(EvalError::NoData(name.to_string())),
        }
    }
}

fn evaluate(
    name: &str,
    expr: &Expression,
    values: &SignalValues,
    timestamps: &Samples<f64>,
    data: &DataSet,
) -> Result<SignalValues, TransformError> {
    let signal = name.to_string();
    let SignalValues::Numeric(x) = values else {
        return Err(TransformError::NotNumeric { signal });
    };
    let scope = TransformScope {
        x,
        t: timestamps,
        data,
    };
    let out = match expr.eval(&scope) {
        Ok(v) => v,
        Err(EvalError::NoData(missing)) => return Err(TransformError::NoData { signal, missing }),
        Err(source) => return Err(TransformError::Eval { signal, source }),
    };
    let expected = x.len();
    match out {
        Value::Number(v) => Ok(SignalValues::Numeric(Samples::new(vec![v; expected]))),
        Value::Array(a) if a.len() == expected => Ok(SignalValues::Numeric(Samples::new(a.to_vec()))),
        Value::Array(a) => Err(TransformError::LengthMismatch {
            signal,
            expected,
            got: a.len(),
        }),
        other => Err(TransformError::ResultType {
            signal,
            got: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::signals::Signal;

    fn data() -> DataSet {
        DataSet::new()
            .with("a", Signal::numeric("a", vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]).unwrap())
            .with("b", Signal::numeric("b", vec![0.0, 1.0, 2.0], vec![10.0, 20.0, 30.0]).unwrap())
            .with("e", Signal::categorical("e", vec![0.0], vec!["on".into()]).unwrap())
            .with("empty", Signal::numeric("empty", vec![], vec![]).unwrap())
    }

    fn numeric(v: &SignalValues) -> Vec<f64> {
        v.as_numeric().unwrap().to_vec()
    }

    #[test]
    fn no_transform_returns_source_values() {
        let ds = data();
        let mut tf = Transforms::new();
        let ts = ds.get("a").unwrap().timestamps.clone();
        let out = tf.apply_transform("a", &ds, &ts).unwrap();
        assert_eq!(out.id(), ds.get("a").unwrap().values.id());
    }

    #[test]
    fn transform_uses_x_t_and_other_signals() {
        let ds = data();
        let mut tf = Transforms::new();
        let ts = ds.get("a").unwrap().timestamps.clone();
        tf.set_transform("a", "x * 2 + t + data['b']").unwrap();
        let out = tf.apply_transform("a", &ds, &ts).unwrap();
        assert_eq!(numeric(&out), vec![12.0, 25.0, 38.0]);
        let again = tf.apply_transform("a", &ds, &ts).unwrap();
        assert_eq!(out.id(), again.id());
    }

    #[test]
    fn scalar_result_broadcasts() {
        let ds = data();
        let mut tf = Transforms::new();
        let ts = ds.get("a").unwrap().timestamps.clone();
        tf.set_transform("a", "mean(x)").unwrap();
        assert_eq!(numeric(&tf.apply_transform("a", &ds, &ts).unwrap()), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn parse_error_keeps_previous_transform() {
        let mut tf = Transforms::new();
        tf.set_transform("a", "x + 1").unwrap();
        assert!(tf.set_transform("a", "x +").is_err());
        assert_eq!(tf.transform("a").unwrap().source(), "x + 1");
        tf.set_transform("a", "  ").unwrap();
        assert!(tf.transform("a").is_none());
    }

    #[test]
    fn missing_and_empty_references_are_no_data() {
        let ds = data();
        let mut tf = Transforms::new();
        let ts = ds.get("a").unwrap().timestamps.clone();
        tf.set_transform("a", "x + data['gone']").unwrap();
        assert!(matches!(
            tf.apply_transform("a", &ds, &ts),
            Err(TransformError::NoData { missing, .. }) if missing == "gone"
        ));
        tf.set_transform("a", "x + data['empty']").unwrap();
        assert!(matches!(
            tf.apply_transform("a", &ds, &ts),
            Err(TransformError::NoData { missing, .. }) if missing == "empty"
        ));
    }

    #[test]
    fn errors_are_per_signal() {
        let ds = data();
        let mut tf = Transforms::new();
        tf.set_transform("a", "x + [1, 2]").unwrap();
        tf.set_transform("b", "x / 10").unwrap();
        let ts_a = ds.get("a").unwrap().timestamps.clone();
        let ts_b = ds.get("b").unwrap().timestamps.clone();
        assert!(matches!(tf.apply_transform("a", &ds, &ts_a), Err(TransformError::Eval { .. })));
        assert_eq!(numeric(&tf.apply_transform("b", &ds, &ts_b).unwrap()), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn categorical_values_cannot_be_transformed() {
        let ds = data();
        let mut tf = Transforms::new();
        tf.set_transform("e", "x").unwrap();
        let ts = ds.get("e").unwrap().timestamps.clone();
        assert!(matches!(tf.apply_transform("e", &ds, &ts), Err(TransformError::NotNumeric { .. })));
    }
}
