//! Tree-walking evaluator over numbers and sample arrays.

use std::sync::Arc;

use thiserror::Error;

use super::ast::{BinOp, Expr};

/// A reference-geometry primitive produced by an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Vertical line at the given x.
    VLine(f64),
    /// Horizontal line at the given y.
    HLine(f64),
    Polyline { x: Vec<f64>, y: Vec<f64> },
    Scatter { x: Vec<f64>, y: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Array(Arc<[f64]>),
    Str(String),
    List(Vec<Value>),
    Shape(Shape),
    /// The `data` namespace; indexing it with a name yields that signal.
    Data,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Array(_) => "array",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Shape(_) => "shape",
            Value::Data => "data",
        }
    }

    pub fn array(values: Vec<f64>) -> Self {
        Value::Array(values.into())
    }

    /// Numeric view of this value: numbers, arrays and flat lists of numbers.
    pub fn to_numeric(&self) -> Result<Numeric, EvalError> {
        match self {
            Value::Number(v) => Ok(Numeric::Scalar(*v)),
            Value::Array(a) => Ok(Numeric::Array(a.clone())),
            Value::List(items) => items
                .iter()
                .map(|v| match v {
                    Value::Number(n) => Ok(*n),
                    other => Err(EvalError::Type(format!("expected a number in list, got {}", other.type_name()))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|v| Numeric::Array(v.into())),
            other => Err(EvalError::Type(format!("expected a number or array, got {}", other.type_name()))),
        }
    }

    /// Flatten to a vector of numbers; a scalar becomes a single element.
    pub fn to_vec(&self) -> Result<Vec<f64>, EvalError> {
        Ok(match self.to_numeric()? {
            Numeric::Scalar(v) => vec![v],
            Numeric::Array(a) => a.to_vec(),
        })
    }

    pub fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Number(v) => Ok(*v),
            other => Err(EvalError::Type(format!("expected a number, got {}", other.type_name()))),
        }
    }
}

/// Operand of arithmetic after list coercion.
#[derive(Debug, Clone)]
pub enum Numeric {
    Scalar(f64),
    Array(Arc<[f64]>),
}

impl Numeric {
    fn into_value(self) -> Value {
        match self {
            Numeric::Scalar(v) => Value::Number(v),
            Numeric::Array(a) => Value::Array(a),
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Numeric {
        match self {
            Numeric::Scalar(v) => Numeric::Scalar(f(*v)),
            Numeric::Array(a) => Numeric::Array(a.iter().map(|&v| f(v)).collect()),
        }
    }

    fn zip(&self, other: &Numeric, f: impl Fn(f64, f64) -> f64) -> Result<Numeric, EvalError> {
        Ok(match (self, other) {
            (Numeric::Scalar(a), Numeric::Scalar(b)) => Numeric::Scalar(f(*a, *b)),
            (Numeric::Scalar(a), Numeric::Array(b)) => Numeric::Array(b.iter().map(|&v| f(*a, v)).collect()),
            (Numeric::Array(a), Numeric::Scalar(b)) => Numeric::Array(a.iter().map(|&v| f(v, *b)).collect()),
            (Numeric::Array(a), Numeric::Array(b)) => {
                if a.len() != b.len() {
                    return Err(EvalError::LengthMismatch(a.len(), b.len()));
                }
                Numeric::Array(a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect())
            }
        })
    }

    fn values(&self) -> &[f64] {
        match self {
            Numeric::Scalar(v) => std::slice::from_ref(v),
            Numeric::Array(a) => &a[..],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("operands could not be broadcast together with lengths {0} and {1}")]
    LengthMismatch(usize, usize),
    #[error("{0}")]
    Type(String),
    #[error("{name}() {message}")]
    Arity { name: String, message: String },
    #[error("no data for signal '{0}'")]
    NoData(String),
    #[error("index {index} out of range for length {len}")]
    Index { index: i64, len: usize },
}

impl EvalError {
    /// Short category name, shown ahead of the message in inline errors.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::UnknownName(_) => "UnknownName",
            EvalError::UnknownFunction(_) => "UnknownFunction",
            EvalError::LengthMismatch(..) => "LengthMismatch",
            EvalError::Type(_) => "TypeError",
            EvalError::Arity { .. } => "ArityError",
            EvalError::NoData(_) => "NoData",
            EvalError::Index { .. } => "IndexError",
        }
    }

    fn arity(name: &str, message: impl Into<String>) -> Self {
        EvalError::Arity {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Names and extension functions visible to an expression.
pub trait Scope {
    /// Value bound to a bare identifier, if any.
    fn variable(&self, name: &str) -> Option<Value>;

    /// Values of the signal `data[name]`.
    fn signal(&self, name: &str) -> Result<Value, EvalError>;

    /// Functions beyond the built-ins. `None` means the name is not handled.
    fn call(&self, _name: &str, _args: &[Value], _kwargs: &[(String, Value)]) -> Option<Result<Value, EvalError>> {
        None
    }
}

pub fn eval(expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(v) => Ok(Value::Number(*v)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => match scope.variable(name) {
            Some(v) => Ok(v),
            None if name == "data" => Ok(Value::Data),
            None => Err(EvalError::UnknownName(name.clone())),
        },
        Expr::List(items) => items.iter().map(|e| eval(e, scope)).collect::<Result<_, _>>().map(Value::List),
        Expr::Neg(inner) => Ok(eval(inner, scope)?.to_numeric()?.map(|v| -v).into_value()),
        Expr::Binary(op, lhs, rhs) => binary(*op, &eval(lhs, scope)?, &eval(rhs, scope)?),
        Expr::Index(target, key) => index(eval(target, scope)?, eval(key, scope)?, scope),
        Expr::Call { name, args, kwargs } => {
            let args = args.iter().map(|e| eval(e, scope)).collect::<Result<Vec<_>, _>>()?;
            let kwargs = kwargs
                .iter()
                .map(|(k, e)| Ok((k.clone(), eval(e, scope)?)))
                .collect::<Result<Vec<_>, EvalError>>()?;
            if let Some(result) = scope.call(name, &args, &kwargs) {
                return result;
            }
            builtin(name, &args, &kwargs)
        }
    }
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (a, b) = (lhs.to_numeric(), rhs.to_numeric());
    match (a, b) {
        (Ok(a), Ok(b)) => Ok(a.zip(&b, |x, y| op.apply(x, y))?.into_value()),
        _ => Err(EvalError::Type(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn index(target: Value, key: Value, scope: &dyn Scope) -> Result<Value, EvalError> {
    match (target, key) {
        (Value::Data, Value::Str(name)) => scope.signal(&name),
        (Value::Array(a), Value::Number(i)) => {
            let at = position(i, a.len())?;
            Ok(Value::Number(a[at]))
        }
        (Value::List(items), Value::Number(i)) => {
            let at = position(i, items.len())?;
            Ok(items[at].clone())
        }
        (target, key) => Err(EvalError::Type(format!(
            "{} cannot be indexed by {}",
            target.type_name(),
            key.type_name()
        ))),
    }
}

/// Resolve a possibly negative integer index.
fn position(i: f64, len: usize) -> Result<usize, EvalError> {
    if i.fract() != 0.0 || !i.is_finite() {
        return Err(EvalError::Type(format!("index must be an integer, got {i}")));
    }
    let index = i as i64;
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::Index { index, len });
    }
    Ok(resolved as usize)
}

fn builtin(name: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, EvalError> {
    let unary: Option<fn(f64) -> f64> = match name {
        "abs" => Some(f64::abs),
        "sqrt" => Some(f64::sqrt),
        "exp" => Some(f64::exp),
        "log" => Some(f64::ln),
        "log10" => Some(f64::log10),
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "floor" => Some(f64::floor),
        "ceil" => Some(f64::ceil),
        "round" => Some(f64::round),
        _ => None,
    };
    let known = unary.is_some() || matches!(name, "min" | "max" | "mean" | "sum" | "len");
    if !known {
        return Err(EvalError::UnknownFunction(name.to_string()));
    }
    if !kwargs.is_empty() {
        return Err(EvalError::arity(name, "takes no keyword arguments"));
    }

    if let Some(f) = unary {
        let [arg] = args else {
            return Err(EvalError::arity(name, format!("takes 1 argument, got {}", args.len())));
        };
        return Ok(arg.to_numeric()?.map(f).into_value());
    }

    match (name, args) {
        ("min" | "max", [a, b]) => {
            let f = if name == "min" { f64::min } else { f64::max };
            Ok(a.to_numeric()?.zip(&b.to_numeric()?, f)?.into_value())
        }
        ("min" | "max", [a]) => {
            let n = a.to_numeric()?;
            let values = n.values();
            if values.is_empty() {
                return Err(EvalError::Type(format!("{name}() of an empty array")));
            }
            let init = values[0];
            let out = if name == "min" {
                values.iter().copied().fold(init, f64::min)
            } else {
                values.iter().copied().fold(init, f64::max)
            };
            Ok(Value::Number(out))
        }
        ("min" | "max", _) => Err(EvalError::arity(name, format!("takes 1 or 2 arguments, got {}", args.len()))),
        ("sum", [a]) => Ok(Value::Number(a.to_numeric()?.values().iter().sum())),
        ("mean", [a]) => {
            let n = a.to_numeric()?;
            let values = n.values();
            if values.is_empty() {
                return Err(EvalError::Type("mean() of an empty array".to_string()));
            }
            Ok(Value::Number(values.iter().sum::<f64>() / values.len() as f64))
        }
        ("len", [a]) => match a {
            Value::Array(v) => Ok(Value::Number(v.len() as f64)),
            Value::List(v) => Ok(Value::Number(v.len() as f64)),
            Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
            other => Err(EvalError::Type(format!("{} has no length", other.type_name()))),
        },
        _ => Err(EvalError::arity(name, format!("takes 1 argument, got {}", args.len()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;

    struct TestScope;

    impl Scope for TestScope {
        fn variable(&self, name: &str) -> Option<Value> {
            match name {
                "x" => Some(Value::array(vec![1.0, 2.0, 3.0])),
                "k" => Some(Value::Number(2.0)),
                _ => None,
            }
        }

        fn signal(&self, name: &str) -> Result<Value, EvalError> {
            match name {
                "short" => Ok(Value::array(vec![1.0, 2.0])),
                other => Err(EvalError::NoData(other.to_string())),
            }
        }
    }

    fn run(src: &str) -> Result<Value, EvalError> {
        eval(&parse(src).unwrap(), &TestScope)
    }

    #[test]
    fn scalar_broadcasts_over_array() {
        assert_eq!(run("x * k + 1").unwrap(), Value::array(vec![3.0, 5.0, 7.0]));
        assert_eq!(run("-x").unwrap(), Value::array(vec![-1.0, -2.0, -3.0]));
        assert_eq!(run("2 ** 3").unwrap(), Value::Number(8.0));
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert_eq!(run("x + data['short']"), Err(EvalError::LengthMismatch(3, 2)));
        assert_eq!(run("x + data['gone']"), Err(EvalError::NoData("gone".into())));
    }

    #[test]
    fn builtins_reduce_and_map() {
        assert_eq!(run("max(x)").unwrap(), Value::Number(3.0));
        assert_eq!(run("min(x, 2)").unwrap(), Value::array(vec![1.0, 2.0, 2.0]));
        assert_eq!(run("mean(x)").unwrap(), Value::Number(2.0));
        assert_eq!(run("len(x)").unwrap(), Value::Number(3.0));
        assert_eq!(run("abs(-2)").unwrap(), Value::Number(2.0));
        assert_eq!(run("sum([1, 2, 3.5])").unwrap(), Value::Number(6.5));
    }

    #[test]
    fn indexing_supports_negative_positions() {
        assert_eq!(run("x[-1]").unwrap(), Value::Number(3.0));
        assert_eq!(run("x[3]"), Err(EvalError::Index { index: 3, len: 3 }));
        assert!(matches!(run("x[0.5]"), Err(EvalError::Type(_))));
    }

    #[test]
    fn unknown_names_and_functions() {
        assert_eq!(run("y"), Err(EvalError::UnknownName("y".into())));
        assert_eq!(run("nope(1)"), Err(EvalError::UnknownFunction("nope".into())));
        assert!(matches!(run("sqrt(1, 2)"), Err(EvalError::Arity { .. })));
        assert!(matches!(run("'a' + 1"), Err(EvalError::Type(_))));
    }
}
