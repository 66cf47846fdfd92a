//! Quote- and keyword-aware tokenizer.
//!
//! Words inside string literals, quoted identifiers and comments never
//! produce keyword tokens, so `'DELETE FROM x'` is a single string token.

use crate::error::{QueryError, QueryResult};

/// Punctuation and operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    Comma,
    LParen,
    RParen,
    Star,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `->`
    Arrow,
    /// `->>`
    LongArrow,
    Dot,
    Semicolon,
    Plus,
    Minus,
    Slash,
    Percent,
    /// `||`
    Concat,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A bare identifier or keyword, in its original case.
    Word(String),
    /// A `"quoted"` or `` `quoted` `` identifier.
    Quoted(String),
    /// A `'string'` literal with `''` escapes resolved.
    Str(String),
    Number(String),
    /// `?` (`None`) or `?N` (1-based).
    Param(Option<usize>),
    Symbol(Symbol),
}

impl Token {
    /// Whether this is the bare word `keyword`, compared case-insensitively.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    /// The identifier text of a bare or quoted word.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Quoted(w) => Some(w),
            _ => None,
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split `sql` into tokens, dropping whitespace and comments.
pub fn tokenize(sql: &str) -> QueryResult<Vec<Spanned>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = sql[i + 2..].find("*/").ok_or_else(|| QueryError::Tokenize {
                    offset: start,
                    message: "unterminated comment".into(),
                })?;
                i += end + 4;
                continue;
            }
            b'\'' => {
                let (text, next) = quoted(sql, i, b'\'')?;
                out.push(Spanned {
                    token: Token::Str(text),
                    offset: start,
                });
                i = next;
                continue;
            }
            b'"' | b'`' => {
                let (text, next) = quoted(sql, i, c)?;
                out.push(Spanned {
                    token: Token::Quoted(text),
                    offset: start,
                });
                i = next;
                continue;
            }
            b'?' => {
                i += 1;
                let digits_start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let index = if i > digits_start {
                    let n: usize = sql[digits_start..i].parse().map_err(|_| QueryError::Tokenize {
                        offset: start,
                        message: "parameter index out of range".into(),
                    })?;
                    if n == 0 {
                        return Err(QueryError::Tokenize {
                            offset: start,
                            message: "parameter indexes start at 1".into(),
                        });
                    }
                    Some(n)
                } else {
                    None
                };
                out.push(Spanned {
                    token: Token::Param(index),
                    offset: start,
                });
                continue;
            }
            _ => {}
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            out.push(Spanned {
                token: Token::Word(sql[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            let mut seen_dot = false;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || (bytes[i] == b'.' && !seen_dot)) {
                seen_dot |= bytes[i] == b'.';
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            out.push(Spanned {
                token: Token::Number(sql[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        let two = bytes.get(i + 1).copied();
        let (symbol, width) = match (c, two) {
            (b'-', Some(b'>')) if bytes.get(i + 2) == Some(&b'>') => (Symbol::LongArrow, 3),
            (b'-', Some(b'>')) => (Symbol::Arrow, 2),
            (b'!', Some(b'=')) | (b'<', Some(b'>')) => (Symbol::NotEq, 2),
            (b'<', Some(b'=')) => (Symbol::LtEq, 2),
            (b'>', Some(b'=')) => (Symbol::GtEq, 2),
            (b'=', Some(b'=')) => (Symbol::Eq, 2),
            (b'|', Some(b'|')) => (Symbol::Concat, 2),
            (b',', _) => (Symbol::Comma, 1),
            (b'(', _) => (Symbol::LParen, 1),
            (b')', _) => (Symbol::RParen, 1),
            (b'*', _) => (Symbol::Star, 1),
            (b'=', _) => (Symbol::Eq, 1),
            (b'<', _) => (Symbol::Lt, 1),
            (b'>', _) => (Symbol::Gt, 1),
            (b'.', _) => (Symbol::Dot, 1),
            (b';', _) => (Symbol::Semicolon, 1),
            (b'+', _) => (Symbol::Plus, 1),
            (b'-', _) => (Symbol::Minus, 1),
            (b'/', _) => (Symbol::Slash, 1),
            (b'%', _) => (Symbol::Percent, 1),
            _ => {
                let ch = sql[i..].chars().next().unwrap_or('?');
                return Err(QueryError::Tokenize {
                    offset: start,
                    message: format!("unexpected character {ch:?}"),
                });
            }
        };
        out.push(Spanned {
            token: Token::Symbol(symbol),
            offset: start,
        });
        i += width;
    }
    Ok(out)
}

/// Read a quoted run starting at `start`, where a doubled quote escapes it.
fn quoted(sql: &str, start: usize, quote: u8) -> QueryResult<(String, usize)> {
    let bytes = sql.as_bytes();
    let mut text = String::new();
    let mut i = start + 1;
    let mut run = i;
    loop {
        match bytes.get(i) {
            None => {
                return Err(QueryError::Tokenize {
                    offset: start,
                    message: "unterminated quoted text".into(),
                })
            }
            Some(&b) if b == quote => {
                text.push_str(&sql[run..i]);
                if bytes.get(i + 1) == Some(&quote) {
                    text.push(quote as char);
                    i += 2;
                    run = i;
                } else {
                    return Ok((text, i + 1));
                }
            }
            Some(_) => i += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tokens(sql: &str) -> Vec<Token> {
        tokenize(sql).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn keywords_inside_strings_stay_strings() {
        let t = tokens("SELECT 'DELETE FROM x' FROM note");
        assert_eq!(t[1], Token::Str("DELETE FROM x".into()));
        assert!(t[2].is_keyword("from"));
    }

    #[test]
    fn doubled_quotes_escape() {
        assert_eq!(tokens("'it''s'"), vec![Token::Str("it's".into())]);
        assert_eq!(tokens("\"a\"\"b\""), vec![Token::Quoted("a\"b".into())]);
    }

    #[test]
    fn operators() {
        let t = tokens("a ->> 'x' -> 'y' <> 1 || b >= 2");
        assert!(t.contains(&Token::Symbol(Symbol::LongArrow)));
        assert!(t.contains(&Token::Symbol(Symbol::Arrow)));
        assert!(t.contains(&Token::Symbol(Symbol::NotEq)));
        assert!(t.contains(&Token::Symbol(Symbol::Concat)));
        assert!(t.contains(&Token::Symbol(Symbol::GtEq)));
    }

    #[test]
    fn comments_are_skipped() {
        let t = tokens("SELECT -- trailing DELETE\n 1 /* UPDATE */");
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn parameters() {
        assert_eq!(
            tokens("? ?2"),
            vec![Token::Param(None), Token::Param(Some(2))]
        );
        assert!(tokenize("?0").is_err());
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(matches!(
            tokenize("SELECT 'oops"),
            Err(QueryError::Tokenize { offset: 7, .. })
        ));
    }

    proptest! {
        #[test]
        fn string_literals_roundtrip(text in "[^\u{0}]{0,40}") {
            let sql = format!("'{}'", text.replace('\'', "''"));
            prop_assert_eq!(tokens(&sql), vec![Token::Str(text)]);
        }

        #[test]
        fn tokenizer_never_panics(sql in "\\PC{0,60}") {
            let _ = tokenize(&sql);
        }
    }
}
