//! Recursive-descent filter parser
//!
//! Precedence, loosest first:
//!
//! | level        | operators                 |
//! |--------------|---------------------------|
//! | pipe         | `\|` (right assoc)        |
//! | comma        | `,`                       |
//! | alternative  | `//` (right assoc)        |
//! | or           | `or`                      |
//! | and          | `and`                     |
//! | comparison   | `== != < <= > >=` (none)  |
//! | additive     | `+ -`                     |
//! | multiplicative | `* / %`                 |
//! | postfix      | `.a`, `[..]`, `?`         |

use serde_json::Value;

use super::ast::{is_builtin, BinOp, Expr, ObjectKey};
use super::errors::{QueryError, QueryResult};
use super::eval::number;
use super::lexer::{tokenize, Spanned, Token};

const KEYWORDS: &[&str] = &["and", "or", "if", "then", "elif", "else", "end"];

/// Longest accepted filter, in tokens
pub const MAX_TOKENS: usize = 4096;

/// Deepest accepted `(`, `[`, `{`, `if` or call nesting
pub const MAX_NESTING: usize = 256;

/// Deepest accepted syntax tree; evaluation recursion follows it
pub const MAX_DEPTH: usize = 512;

/// Parse a complete filter
pub fn parse(src: &str) -> QueryResult<Expr> {
    let tokens = tokenize(src)?;
    if tokens.len() > MAX_TOKENS {
        return Err(QueryError::parse(0, "filter too long"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        len: src.len(),
        nesting: 0,
    };
    if parser.tokens.is_empty() {
        return Ok(Expr::Identity);
    }
    let expr = parser.parse_pipe()?;
    if let Some(t) = parser.peek() {
        return Err(parser.unexpected(t));
    }
    if expr.depth() > MAX_DEPTH {
        return Err(QueryError::parse(0, "nesting too deep"));
    }
    Ok(expr)
}

/// Join `first, rest..` right-associatively without recursing
fn fold_right(first: Expr, rest: Vec<Expr>, join: fn(Box<Expr>, Box<Expr>) -> Expr) -> Expr {
    let mut tail: Option<Expr> = None;
    for expr in rest.into_iter().rev() {
        tail = Some(match tail {
            None => expr,
            Some(rhs) => join(Box::new(expr), Box::new(rhs)),
        });
    }
    match tail {
        None => first,
        Some(rhs) => join(Box::new(first), Box::new(rhs)),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Source length, for end-of-input errors
    len: usize,
    /// Open `(`, `[`, `{`, `if` and call argument lists
    nesting: usize,
}

impl Parser {
    /// Parse `f` one nesting level deeper
    fn nested<T>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> QueryResult<T>,
    ) -> QueryResult<T> {
        if self.nesting >= MAX_NESTING {
            return Err(QueryError::parse(offset, "nesting too deep"));
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.len, |s| s.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> QueryResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", token)))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> QueryResult<()> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", word)))
        }
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        let message = message.into();
        match self.peek() {
            Some(t) => QueryError::parse(self.offset(), format!("{}, found {:?}", message, t)),
            None => QueryError::parse(self.offset(), format!("{}, found end of input", message)),
        }
    }

    fn unexpected(&self, token: &Token) -> QueryError {
        QueryError::parse(self.offset(), format!("unexpected token {:?}", token))
    }

    // ==================
    // Binary levels
    // ==================

    fn parse_pipe(&mut self) -> QueryResult<Expr> {
        let first = self.parse_comma()?;
        let mut rest = Vec::new();
        while self.eat(&Token::Pipe) {
            rest.push(self.parse_comma()?);
        }
        Ok(fold_right(first, rest, Expr::Pipe))
    }

    fn parse_comma(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.parse_alternative()?;
        while self.eat(&Token::Comma) {
            let rhs = self.parse_alternative()?;
            lhs = Expr::Comma(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_alternative(&mut self) -> QueryResult<Expr> {
        let first = self.parse_or()?;
        let mut rest = Vec::new();
        while self.eat(&Token::Alt) {
            rest.push(self.parse_or()?);
        }
        Ok(fold_right(first, rest, Expr::Alternative))
    }

    fn parse_or(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> QueryResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        if matches!(
            self.peek(),
            Some(Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge)
        ) {
            return Err(self.error("comparison operators do not chain"));
        }
        Ok(Expr::binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> QueryResult<Expr> {
        let mut negations = 0;
        while self.eat(&Token::Minus) {
            negations += 1;
        }
        let mut expr = self.parse_postfix()?;
        for _ in 0..negations {
            expr = match expr {
                Expr::Literal(Value::Number(n)) => {
                    Expr::Literal(number(-n.as_f64().unwrap_or_default()))
                }
                other => Expr::Neg(Box::new(other)),
            };
        }
        Ok(expr)
    }

    // ==================
    // Postfix and terms
    // ==================

    fn parse_postfix(&mut self) -> QueryResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Field(name)) => {
                    let name = name.clone();
                    self.pos += 1;
                    expr = Expr::field(expr, name);
                }
                Some(Token::Dot) if matches!(self.peek_at(1), Some(Token::Str(_))) => {
                    self.pos += 1;
                    if let Some(Token::Str(name)) = self.advance() {
                        expr = Expr::field(expr, name);
                    }
                }
                Some(Token::Dot) if self.peek_at(1) == Some(&Token::LBracket) => {
                    self.pos += 1;
                }
                Some(Token::LBracket) => {
                    let offset = self.offset();
                    self.pos += 1;
                    expr = self.nested(offset, |p| p.parse_bracket(expr))?;
                }
                Some(Token::Question) => {
                    self.pos += 1;
                    expr = Expr::Optional(Box::new(expr));
                }
                _ => return Ok(expr),
            }
        }
    }

    /// After `[`: `]`, `f]`, `f:g]`, `:g]`, `f:]`
    fn parse_bracket(&mut self, target: Expr) -> QueryResult<Expr> {
        let target = Box::new(target);
        if self.eat(&Token::RBracket) {
            return Ok(Expr::Iterate(target));
        }
        if self.eat(&Token::Colon) {
            let to = self.parse_pipe()?;
            self.expect(Token::RBracket)?;
            return Ok(Expr::Slice {
                target,
                from: None,
                to: Some(Box::new(to)),
            });
        }

        let index = self.parse_pipe()?;
        if self.eat(&Token::Colon) {
            let to = if self.peek() == Some(&Token::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_pipe()?))
            };
            self.expect(Token::RBracket)?;
            return Ok(Expr::Slice {
                target,
                from: Some(Box::new(index)),
                to,
            });
        }
        self.expect(Token::RBracket)?;
        Ok(Expr::Index {
            target,
            index: Box::new(index),
        })
    }

    fn parse_primary(&mut self) -> QueryResult<Expr> {
        let offset = self.offset();
        let token = match self.advance() {
            Some(t) => t,
            None => return Err(QueryError::parse(offset, "unexpected end of input")),
        };

        match token {
            Token::Dot => match self.peek() {
                Some(Token::Str(_)) => match self.advance() {
                    Some(Token::Str(name)) => Ok(Expr::field(Expr::Identity, name)),
                    _ => Ok(Expr::Identity),
                },
                _ => Ok(Expr::Identity),
            },
            Token::Field(name) => Ok(Expr::field(Expr::Identity, name)),
            Token::Number(n) => Ok(Expr::Literal(number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::LParen => self.nested(offset, |p| {
                let inner = p.parse_pipe()?;
                p.expect(Token::RParen)?;
                Ok(inner)
            }),
            Token::LBracket => self.nested(offset, |p| {
                if p.eat(&Token::RBracket) {
                    return Ok(Expr::Array(None));
                }
                let inner = p.parse_pipe()?;
                p.expect(Token::RBracket)?;
                Ok(Expr::Array(Some(Box::new(inner))))
            }),
            Token::LBrace => self.nested(offset, |p| p.parse_object()),
            Token::Ident(word) => self.parse_word(word, offset),
            other => Err(QueryError::parse(offset, format!("unexpected token {:?}", other))),
        }
    }

    fn parse_word(&mut self, word: String, offset: usize) -> QueryResult<Expr> {
        match word.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            "if" => return self.nested(offset, |p| p.parse_if()),
            w if KEYWORDS.contains(&w) => {
                return Err(QueryError::parse(offset, format!("unexpected keyword '{}'", w)))
            }
            _ => {}
        }

        let args = if self.eat(&Token::LParen) {
            self.nested(offset, |p| {
                let mut args = Vec::new();
                loop {
                    args.push(p.parse_pipe()?);
                    if p.eat(&Token::Semicolon) {
                        continue;
                    }
                    p.expect(Token::RParen)?;
                    return Ok(args);
                }
            })?
        } else {
            Vec::new()
        };

        if !is_builtin(&word, args.len()) {
            return Err(QueryError::parse(
                offset,
                format!("{}/{} is not defined", word, args.len()),
            ));
        }
        Ok(Expr::Call { name: word, args })
    }

    fn parse_if(&mut self) -> QueryResult<Expr> {
        let mut branches = Vec::new();
        let cond = self.parse_pipe()?;
        self.expect_keyword("then")?;
        let body = self.parse_pipe()?;
        branches.push((cond, body));

        loop {
            if self.eat_keyword("elif") {
                let cond = self.parse_pipe()?;
                self.expect_keyword("then")?;
                let body = self.parse_pipe()?;
                branches.push((cond, body));
            } else if self.eat_keyword("else") {
                let otherwise = self.parse_pipe()?;
                self.expect_keyword("end")?;
                return Ok(Expr::If {
                    branches,
                    otherwise: Some(Box::new(otherwise)),
                });
            } else {
                self.expect_keyword("end")?;
                return Ok(Expr::If {
                    branches,
                    otherwise: None,
                });
            }
        }
    }

    fn parse_object(&mut self) -> QueryResult<Expr> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Expr::Object(entries));
        }

        loop {
            let offset = self.offset();
            let key = match self.advance() {
                Some(Token::Ident(name)) => ObjectKey::Name(name),
                Some(Token::Str(name)) => ObjectKey::Name(name),
                Some(Token::LParen) => {
                    let key = self.parse_pipe()?;
                    self.expect(Token::RParen)?;
                    ObjectKey::Computed(key)
                }
                Some(other) => {
                    return Err(QueryError::parse(
                        offset,
                        format!("unexpected token {:?} in object key", other),
                    ))
                }
                None => return Err(QueryError::parse(offset, "unterminated object")),
            };

            let value = if self.eat(&Token::Colon) {
                Some(self.parse_object_value()?)
            } else if matches!(key, ObjectKey::Computed(_)) {
                return Err(self.error("expected ':' after computed key"));
            } else {
                None
            };
            entries.push((key, value));

            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RBrace)?;
            return Ok(Expr::Object(entries));
        }
    }

    /// Object values may pipe but not use `,`, which separates entries
    fn parse_object_value(&mut self) -> QueryResult<Expr> {
        let first = self.parse_alternative()?;
        let mut rest = Vec::new();
        while self.eat(&Token::Pipe) {
            rest.push(self.parse_alternative()?);
        }
        Ok(fold_right(first, rest, Expr::Pipe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_shape() {
        let expr = parse(r#"select(.name == "john")"#).unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "select".into(),
                args: vec![Expr::binary(
                    BinOp::Eq,
                    Expr::field(Expr::Identity, "name"),
                    Expr::Literal(json!("john")),
                )],
            }
        );
    }

    #[test]
    fn test_precedence() {
        // `,` binds tighter than `|`
        match parse(".a, .b | .c").unwrap() {
            Expr::Pipe(lhs, _) => assert!(matches!(*lhs, Expr::Comma(_, _))),
            other => panic!("unexpected {:?}", other),
        }
        // `*` binds tighter than `+`
        match parse("1 + 2 * 3").unwrap() {
            Expr::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
        // `and` binds tighter than `or`
        assert!(matches!(parse("true or false and false").unwrap(), Expr::Or(_, _)));
    }

    #[test]
    fn test_postfix_forms() {
        assert!(parse(r#".a."b"[0][1:2][]?"#).is_ok());
        assert!(parse(r#".["key"]"#).is_ok());
        assert!(parse(".[-1]").is_ok());
        assert!(parse(".[:2]").is_ok());
        assert_eq!(parse("").unwrap(), Expr::Identity);
    }

    #[test]
    fn test_constructors() {
        assert!(parse(r#"{a, "b": .c, (.k): 1, d: .x | .y}"#).is_ok());
        assert!(parse("[.[] | .a]").is_ok());
        assert!(parse("if . then 1 elif false then 2 else 3 end").is_ok());
        assert!(parse("if . then 1 end").is_ok());
    }

    #[test]
    fn test_rejects_bad_filters() {
        assert!(parse("select(").is_err());
        assert!(parse(".a ==").is_err());
        assert!(parse("nosuchfn").is_err());
        assert!(parse("select(.a; .b)").is_err());
        assert!(parse("1 < 2 < 3").is_err());
        assert!(parse(".a )").is_err());
        assert!(parse("{(.a)}").is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let deep = format!("{}1{}", "[".repeat(20000), "]".repeat(20000));
        assert!(parse(&deep).is_err());

        let nested = format!("{}1{}", "[".repeat(MAX_NESTING + 1), "]".repeat(MAX_NESTING + 1));
        let err = parse(&nested).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"));

        let ok = format!("{}1{}", "[".repeat(100), "]".repeat(100));
        assert!(parse(&ok).is_ok());

        let calls = format!("{}.{}", "select(".repeat(300), ")".repeat(300));
        assert!(parse(&calls).is_err());
        let index = format!("{}0{}", ".[".repeat(300), "]".repeat(300));
        assert!(parse(&index).is_err());
    }

    #[test]
    fn test_long_chains_rejected() {
        let pipes = vec!["."; MAX_DEPTH + 10].join(" | ");
        assert!(parse(&pipes).is_err());
        let sums = vec!["1"; MAX_DEPTH + 10].join(" + ");
        assert!(parse(&sums).is_err());
        let negations = format!("{}.a", "-".repeat(MAX_DEPTH + 10));
        assert!(parse(&negations).is_err());
        assert!(parse(&".a".repeat(MAX_TOKENS + 1)).is_err());

        let pipeline = vec![".a"; 50].join(" | ");
        assert_eq!(parse(&pipeline).unwrap().depth(), 51);
    }

    #[test]
    fn test_pipe_stays_right_associative() {
        assert_eq!(
            parse(". | .a | .b").unwrap(),
            Expr::Pipe(
                Box::new(Expr::Identity),
                Box::new(Expr::Pipe(
                    Box::new(Expr::field(Expr::Identity, "a")),
                    Box::new(Expr::field(Expr::Identity, "b")),
                )),
            )
        );
    }
}
