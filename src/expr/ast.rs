//! Syntax tree of the expression language.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "**",
        }
    }

    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Ident(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// Visit this node and all of its descendants, parents first.
    pub fn walk<'a, F: FnMut(&'a Expr)>(&'a self, f: &mut F) {
        f(self);
        match self {
            Expr::Number(_) | Expr::Str(_) | Expr::Ident(_) => {}
            Expr::List(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            Expr::Neg(inner) => inner.walk(f),
            Expr::Binary(_, lhs, rhs) | Expr::Index(lhs, rhs) => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Call { args, kwargs, .. } => {
                for arg in args {
                    arg.walk(f);
                }
                for (_, value) in kwargs {
                    value.walk(f);
                }
            }
        }
    }
}
