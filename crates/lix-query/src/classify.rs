use crate::token::{tokenize, Symbol, Token};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

/// Kind of a statement and the table it reads or writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    pub kind: StatementKind,
    pub target: Option<String>,
}

impl Classified {
    fn other() -> Self {
        Self {
            kind: StatementKind::Other,
            target: None,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }
}

/// Classify `sql` without parsing it fully.
///
/// Only tokens outside quotes and comments count, so keywords inside string
/// literals never change the result. Text that does not tokenize is
/// [`StatementKind::Other`].
pub fn classify(sql: &str) -> Classified {
    let Ok(tokens) = tokenize(sql) else {
        return Classified::other();
    };
    let tokens: Vec<Token> = tokens.into_iter().map(|s| s.token).collect();
    let Some(first) = tokens.first() else {
        return Classified::other();
    };

    let ident_at = |i: usize| tokens.get(i).and_then(Token::ident).map(str::to_string);

    if first.is_keyword("insert") {
        // INSERT [OR REPLACE|IGNORE] INTO <target>
        let into = tokens.iter().position(|t| t.is_keyword("into"));
        return Classified {
            kind: StatementKind::Insert,
            target: into.and_then(|i| ident_at(i + 1)),
        };
    }
    if first.is_keyword("update") {
        return Classified {
            kind: StatementKind::Update,
            target: ident_at(1),
        };
    }
    if first.is_keyword("delete") {
        let target = if tokens.get(1).is_some_and(|t| t.is_keyword("from")) {
            ident_at(2)
        } else {
            None
        };
        return Classified {
            kind: StatementKind::Delete,
            target,
        };
    }
    if first.is_keyword("select") {
        // First FROM at parenthesis depth zero.
        let mut depth = 0usize;
        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Symbol(Symbol::LParen) => depth += 1,
                Token::Symbol(Symbol::RParen) => depth = depth.saturating_sub(1),
                t if depth == 0 && t.is_keyword("from") => {
                    return Classified {
                        kind: StatementKind::Select,
                        target: ident_at(i + 1),
                    };
                }
                _ => {}
            }
        }
        return Classified {
            kind: StatementKind::Select,
            target: None,
        };
    }
    Classified::other()
}
