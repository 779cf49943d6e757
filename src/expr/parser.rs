//! pest grammar and Pratt parser producing [`Expr`] trees.

use once_cell::sync::Lazy;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use super::ast::{BinOp, Expr};

#[derive(Parser)]
#[grammar = "expr/grammar.pest"]
struct ExprParser;

/// Operator precedence, loosest first. Unary minus binds looser than `**`, so
/// `-x**2` is `-(x**2)`.
static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left))
        .op(Op::prefix(Rule::neg))
        .op(Op::infix(Rule::pow, Assoc::Right))
        .op(Op::postfix(Rule::index))
});

#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn at(pair: &Pair<'_, Rule>, message: impl Into<String>) -> Self {
        let (line, column) = pair.as_span().start_pos().line_col();
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        Self {
            message: e.variant.message().into_owned(),
            line,
            column,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse one complete expression.
pub fn parse(input: &str) -> ParseResult<Expr> {
    let mut pairs = ExprParser::parse(Rule::program, input)?;
    let program = pairs.next().ok_or_else(|| ParseError {
        message: "empty expression".to_string(),
        line: 1,
        column: 1,
    })?;
    match program.into_inner().next() {
        Some(expr) if expr.as_rule() == Rule::expr => build_expr(expr),
        _ => Err(ParseError {
            message: "empty expression".to_string(),
            line: 1,
            column: 1,
        }),
    }
}

fn build_expr(pair: Pair<'_, Rule>) -> ParseResult<Expr> {
    parse_ops(pair.into_inner())
}

fn parse_ops(pairs: Pairs<'_, Rule>) -> ParseResult<Expr> {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::neg => Ok(Expr::Neg(Box::new(rhs?))),
            rule => Err(ParseError::at(&op, format!("unexpected prefix {rule:?}"))),
        })
        .map_postfix(|lhs, op| match op.as_rule() {
            Rule::index => {
                let key = op
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::at(&op, "expected index expression"))?;
                Ok(Expr::Index(Box::new(lhs?), Box::new(build_expr(key)?)))
            }
            rule => Err(ParseError::at(&op, format!("unexpected postfix {rule:?}"))),
        })
        .map_infix(|lhs, op, rhs| {
            let bin = match op.as_rule() {
                Rule::add => BinOp::Add,
                Rule::sub => BinOp::Sub,
                Rule::mul => BinOp::Mul,
                Rule::div => BinOp::Div,
                Rule::pow => BinOp::Pow,
                rule => return Err(ParseError::at(&op, format!("unexpected operator {rule:?}"))),
            };
            Ok(Expr::Binary(bin, Box::new(lhs?), Box::new(rhs?)))
        })
        .parse(pairs)
}

fn build_primary(pair: Pair<'_, Rule>) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(Expr::Number)
            .map_err(|e| ParseError::at(&pair, format!("invalid number: {e}"))),
        Rule::string => {
            let text = pair.clone().into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Expr::Str(text.to_string()))
        }
        Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
        Rule::list => pair.into_inner().map(build_expr).collect::<ParseResult<Vec<_>>>().map(Expr::List),
        Rule::expr => build_expr(pair),
        Rule::call => build_call(pair),
        rule => Err(ParseError::at(&pair, format!("unexpected {rule:?}"))),
    }
}

fn build_call(pair: Pair<'_, Rule>) -> ParseResult<Expr> {
    let mut inner = pair.clone().into_inner();
    let name = inner
        .next()
        .ok_or_else(|| ParseError::at(&pair, "expected function name"))?
        .as_str()
        .to_string();
    let mut args = Vec::new();
    let mut kwargs: Vec<(String, Expr)> = Vec::new();
    for arg in inner {
        match arg.as_rule() {
            Rule::kwarg => {
                let mut kv = arg.clone().into_inner();
                let key = kv
                    .next()
                    .ok_or_else(|| ParseError::at(&arg, "expected keyword"))?
                    .as_str()
                    .to_string();
                if kwargs.iter().any(|(k, _)| *k == key) {
                    return Err(ParseError::at(&arg, format!("repeated keyword argument '{key}'")));
                }
                let value = kv
                    .next()
                    .ok_or_else(|| ParseError::at(&arg, "expected keyword value"))?;
                kwargs.push((key, build_expr(value)?));
            }
            _ if !kwargs.is_empty() => {
                return Err(ParseError::at(&arg, "positional argument follows keyword argument"));
            }
            _ => args.push(build_expr(arg)?),
        }
    }
    Ok(Expr::Call { name, args, kwargs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: f64) -> Box<Expr> {
        Box::new(Expr::Number(v))
    }

    fn ident(n: &str) -> Box<Expr> {
        Box::new(Expr::Ident(n.into()))
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary(BinOp::Add, num(1.0), Box::new(Expr::Binary(BinOp::Mul, num(2.0), num(3.0))))
        );
        assert_eq!(
            parse("2 ** 3 ^ 2").unwrap(),
            Expr::Binary(BinOp::Pow, num(2.0), Box::new(Expr::Binary(BinOp::Pow, num(3.0), num(2.0))))
        );
        assert_eq!(
            parse("8 - 2 - 1").unwrap(),
            Expr::Binary(BinOp::Sub, Box::new(Expr::Binary(BinOp::Sub, num(8.0), num(2.0))), num(1.0))
        );
    }

    #[test]
    fn unary_minus_binds_looser_than_pow() {
        assert_eq!(
            parse("-x ** 2").unwrap(),
            Expr::Neg(Box::new(Expr::Binary(BinOp::Pow, ident("x"), num(2.0))))
        );
        assert_eq!(
            parse("x - -1").unwrap(),
            Expr::Binary(BinOp::Sub, ident("x"), Box::new(Expr::Neg(num(1.0))))
        );
    }

    #[test]
    fn indexing_calls_and_comments() {
        assert_eq!(
            parse("data['a b'] * 2  # scaled").unwrap(),
            Expr::Binary(
                BinOp::Mul,
                Box::new(Expr::Index(ident("data"), Box::new(Expr::Str("a b".into())))),
                num(2.0)
            )
        );
        assert_eq!(
            parse("plot(x=[1, 2.5], y=[.5, 1e3])").unwrap(),
            Expr::Call {
                name: "plot".into(),
                args: vec![],
                kwargs: vec![
                    ("x".into(), Expr::List(vec![Expr::Number(1.0), Expr::Number(2.5)])),
                    ("y".into(), Expr::List(vec![Expr::Number(0.5), Expr::Number(1000.0)])),
                ],
            }
        );
    }

    #[test]
    fn errors_carry_position() {
        let err = parse("x +\n  * 2").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
        assert!(parse("").is_err());
        assert!(parse("f(a=1, 2)").is_err());
        assert!(parse("f(a=1, a=2)").is_err());
    }
}
