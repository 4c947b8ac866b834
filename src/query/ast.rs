//! Filter syntax tree

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

/// Object construction key
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    Name(String),
    /// `(f): g`
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `.`
    Identity,
    Literal(Value),
    /// `t[i]`, `t.name`; the index is evaluated against the original input
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `t[from:to]`
    Slice {
        target: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
    },
    /// `t[]`
    Iterate(Box<Expr>),
    /// `t?`
    Optional(Box<Expr>),
    Pipe(Box<Expr>, Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),
    /// `a // b`
    Alternative(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Neg(Box<Expr>),
    /// `[f]`, `[]`
    Array(Option<Box<Expr>>),
    /// `{k: v, ...}`; a missing value means `.k`
    Object(Vec<(ObjectKey, Option<Expr>)>),
    If {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// Builtin functions and the arities they accept
pub const BUILTINS: &[(&str, usize)] = &[
    ("empty", 0),
    ("error", 0),
    ("error", 1),
    ("not", 0),
    ("length", 0),
    ("keys", 0),
    ("values", 0),
    ("has", 1),
    ("type", 0),
    ("tostring", 0),
    ("tonumber", 0),
    ("contains", 1),
    ("startswith", 1),
    ("endswith", 1),
    ("ascii_downcase", 0),
    ("ascii_upcase", 0),
    ("test", 1),
    ("test", 2),
    ("select", 1),
    ("map", 1),
    ("add", 0),
    ("any", 0),
    ("any", 1),
    ("any", 2),
    ("all", 0),
    ("all", 1),
    ("all", 2),
    ("first", 0),
    ("first", 1),
    ("last", 0),
    ("last", 1),
    ("reverse", 0),
    ("sort", 0),
    ("sort_by", 1),
    ("min", 0),
    ("max", 0),
    ("to_entries", 0),
    ("from_entries", 0),
    ("with_entries", 1),
    ("join", 1),
];

pub fn is_builtin(name: &str, arity: usize) -> bool {
    BUILTINS.iter().any(|&(n, a)| n == name && a == arity)
}

impl Expr {
    pub fn field(target: Expr, name: impl Into<String>) -> Expr {
        Expr::Index {
            target: Box::new(target),
            index: Box::new(Expr::Literal(Value::String(name.into()))),
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Direct subexpressions
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Identity | Expr::Literal(_) => Vec::new(),
            Expr::Index { target, index } => vec![target.as_ref(), index.as_ref()],
            Expr::Slice { target, from, to } => {
                let mut out = vec![target.as_ref()];
                out.extend(from.as_deref());
                out.extend(to.as_deref());
                out
            }
            Expr::Iterate(e) | Expr::Optional(e) | Expr::Neg(e) => vec![e.as_ref()],
            Expr::Pipe(a, b)
            | Expr::Comma(a, b)
            | Expr::Alternative(a, b)
            | Expr::And(a, b)
            | Expr::Or(a, b) => vec![a.as_ref(), b.as_ref()],
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Array(inner) => inner.as_deref().into_iter().collect(),
            Expr::Object(entries) => entries
                .iter()
                .flat_map(|(key, value)| {
                    let key = match key {
                        ObjectKey::Computed(e) => Some(e),
                        ObjectKey::Name(_) => None,
                    };
                    key.into_iter().chain(value.as_ref())
                })
                .collect(),
            Expr::If {
                branches,
                otherwise,
            } => branches
                .iter()
                .flat_map(|(cond, body)| [cond, body])
                .chain(otherwise.as_deref())
                .collect(),
            Expr::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Height of the tree, walked with an explicit stack
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(expr.children().into_iter().map(|child| (child, level + 1)));
        }
        deepest
    }
}
