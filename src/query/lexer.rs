//! Filter tokenizer

use super::errors::{QueryError, QueryResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Lone `.`
    Dot,
    /// `.name`
    Field(String),
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Pipe,
    Comma,
    Colon,
    Semicolon,
    Question,
    /// `//`
    Alt,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn tokenize(src: &str) -> QueryResult<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            // Comment to end of line
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }

        let (token, width) = match c {
            '.' => match next {
                Some(n) if is_ident_start(n) => {
                    let mut end = i + 1;
                    while end < chars.len() && is_ident_char(chars[end].1) {
                        end += 1;
                    }
                    let name: String = chars[i + 1..end].iter().map(|&(_, c)| c).collect();
                    (Token::Field(name), end - i)
                }
                Some('.') => return Err(QueryError::parse(pos, "recursive descent is not supported")),
                _ => (Token::Dot, 1),
            },
            '"' => {
                let (s, width) = lex_string(&chars, i)?;
                (Token::Str(s), width)
            }
            '0'..='9' => {
                let mut end = i;
                while end < chars.len() && (chars[end].1.is_ascii_digit() || chars[end].1 == '.') {
                    end += 1;
                }
                if end < chars.len() && matches!(chars[end].1, 'e' | 'E') {
                    end += 1;
                    if end < chars.len() && matches!(chars[end].1, '+' | '-') {
                        end += 1;
                    }
                    while end < chars.len() && chars[end].1.is_ascii_digit() {
                        end += 1;
                    }
                }
                let text: String = chars[i..end].iter().map(|&(_, c)| c).collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| QueryError::parse(pos, format!("invalid number '{}'", text)))?;
                (Token::Number(n), end - i)
            }
            c if is_ident_start(c) => {
                let mut end = i;
                while end < chars.len() && is_ident_char(chars[end].1) {
                    end += 1;
                }
                let name: String = chars[i..end].iter().map(|&(_, c)| c).collect();
                (Token::Ident(name), end - i)
            }
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '{' => (Token::LBrace, 1),
            '}' => (Token::RBrace, 1),
            '|' => (Token::Pipe, 1),
            ',' => (Token::Comma, 1),
            ':' => (Token::Colon, 1),
            ';' => (Token::Semicolon, 1),
            '?' => (Token::Question, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '%' => (Token::Percent, 1),
            '/' if next == Some('/') => (Token::Alt, 2),
            '/' => (Token::Slash, 1),
            '=' if next == Some('=') => (Token::Eq, 2),
            '!' if next == Some('=') => (Token::Ne, 2),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '=' => return Err(QueryError::parse(pos, "assignment is not supported")),
            '$' => return Err(QueryError::parse(pos, "variables are not supported")),
            other => return Err(QueryError::parse(pos, format!("unexpected character '{}'", other))),
        };

        tokens.push(Spanned { token, pos });
        i += width;
    }

    Ok(tokens)
}

/// Lex a string literal starting at the opening quote. Returns the decoded
/// text and the number of chars consumed.
fn lex_string(chars: &[(usize, char)], start: usize) -> QueryResult<(String, usize)> {
    let pos = chars[start].0;
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i].1 {
            '"' => return Ok((out, i + 1 - start)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .map(|&(_, c)| c)
                    .ok_or_else(|| QueryError::parse(pos, "unterminated string"))?;
                match escaped {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'u' => {
                        let hex: String = chars
                            .iter()
                            .skip(i + 2)
                            .take(4)
                            .map(|&(_, c)| c)
                            .collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                QueryError::parse(chars[i].0, "invalid \\u escape")
                            })?;
                        out.push(code);
                        i += 4;
                    }
                    '(' => {
                        return Err(QueryError::parse(
                            chars[i].0,
                            "string interpolation is not supported",
                        ))
                    }
                    other => {
                        return Err(QueryError::parse(
                            chars[i].0,
                            format!("invalid escape '\\{}'", other),
                        ))
                    }
                }
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(QueryError::parse(pos, "unterminated string"))
}
