//! Expression language used by signal transforms and reference geometry.
//!
//! An expression is a single arithmetic formula over numbers and sample
//! arrays, for example `x * 2 + data["offset"]  # scaled`. Text after `#` is a
//! comment, which doubles as the expression's display label.

pub mod ast;
pub mod eval;
pub mod parser;

use thiserror::Error;

pub use ast::{BinOp, Expr};
pub use eval::{eval, EvalError, Scope, Shape, Value};
pub use parser::ParseError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let ast = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// The comment text if there is one, else the whole source.
    pub fn label(&self) -> &str {
        comment_of(&self.source).unwrap_or_else(|| self.source.trim())
    }

    /// Names used as `data["name"]` with a literal name, in order of first use.
    pub fn referenced_signals(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        self.ast.walk(&mut |node| {
            if let Expr::Index(target, key) = node {
                if let (Expr::Ident(ns), Expr::Str(name)) = (target.as_ref(), key.as_ref()) {
                    if ns == "data" && !out.contains(name) {
                        out.push(name.clone());
                    }
                }
            }
        });
        out
    }

    pub fn eval(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
        eval::eval(&self.ast, scope)
    }
}

/// Text after the first `#` outside string literals, trimmed; `None` if absent
/// or blank.
fn comment_of(source: &str) -> Option<&str> {
    let mut quote: Option<char> = None;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => {
                let text = source[i + 1..].trim();
                return (!text.is_empty()).then_some(text);
            }
            (None, _) => {}
        }
    }
    None
}
