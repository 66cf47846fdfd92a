//! Recursive-descent parser for the statement subset the engine serves:
//! single-table `SELECT`, `INSERT ... VALUES`, `UPDATE` and `DELETE`.

use serde_json::{Number, Value};

use crate::ast::{
    BinaryOp, Delete, Expr, Insert, OrderBy, Select, SelectItem, Statement, TableRef, UnaryOp,
    Update,
};
use crate::error::{QueryError, QueryResult};
use crate::token::{tokenize, Spanned, Symbol, Token};

/// Words that cannot be used as bare identifiers.
const RESERVED: &[&str] = &[
    "select", "from", "where", "order", "by", "limit", "offset", "and", "or", "not", "is",
    "null", "in", "like", "as", "true", "false", "set", "values", "into", "insert", "update",
    "delete", "distinct", "asc", "desc",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

/// Parse one statement. A trailing `;` is allowed.
pub fn parse(sql: &str) -> QueryResult<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        max_param: 0,
    };
    let statement = parser.statement()?;
    parser.eat_symbol(Symbol::Semicolon);
    if let Some(rest) = parser.peek() {
        return Err(QueryError::parse(format!(
            "unexpected {:?} at offset {}",
            rest.token, rest.offset
        )));
    }
    Ok(statement)
}

/// Parse a standalone expression.
pub fn parse_expr(sql: &str) -> QueryResult<Expr> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
        max_param: 0,
    };
    let expr = parser.expr()?;
    if parser.peek().is_some() {
        return Err(QueryError::parse("trailing input after expression"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Highest placeholder index seen; a bare `?` takes the next one.
    max_param: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn next(&mut self) -> QueryResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|s| s.token.clone())
            .ok_or_else(|| QueryError::parse("unexpected end of statement"))?;
        self.pos += 1;
        Ok(token)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek_token().is_some_and(|t| t.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> QueryResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {}", keyword.to_ascii_uppercase())))
        }
    }

    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        if self.peek_token() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> QueryResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {symbol:?}")))
        }
    }

    fn unexpected(&self, what: &str) -> QueryError {
        match self.peek() {
            Some(s) => QueryError::parse(format!("{what}, found {:?} at offset {}", s.token, s.offset)),
            None => QueryError::parse(format!("{what}, found end of statement")),
        }
    }

    fn identifier(&mut self) -> QueryResult<String> {
        match self.peek_token() {
            Some(Token::Word(w)) if !is_reserved(w) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            Some(Token::Quoted(q)) => {
                let q = q.clone();
                self.pos += 1;
                Ok(q)
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    /// An identifier, dropping any `qualifier.` prefix.
    fn column_name(&mut self) -> QueryResult<String> {
        let mut name = self.identifier()?;
        while self.eat_symbol(Symbol::Dot) {
            name = self.identifier()?;
        }
        Ok(name)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn statement(&mut self) -> QueryResult<Statement> {
        if self.at_keyword("select") {
            Ok(Statement::Select(self.select()?))
        } else if self.eat_keyword("insert") {
            Ok(Statement::Insert(self.insert()?))
        } else if self.eat_keyword("update") {
            Ok(Statement::Update(self.update()?))
        } else if self.eat_keyword("delete") {
            Ok(Statement::Delete(self.delete()?))
        } else {
            Err(self.unexpected("expected SELECT, INSERT, UPDATE or DELETE"))
        }
    }

    fn select(&mut self) -> QueryResult<Select> {
        self.expect_keyword("select")?;
        let distinct = self.eat_keyword("distinct");
        let mut projection = vec![self.select_item()?];
        while self.eat_symbol(Symbol::Comma) {
            projection.push(self.select_item()?);
        }

        let from = if self.eat_keyword("from") {
            let name = self.identifier()?;
            let alias = if self.eat_keyword("as") {
                Some(self.identifier()?)
            } else {
                match self.peek_token() {
                    Some(Token::Word(w)) if !is_reserved(w) => Some(self.identifier()?),
                    _ => None,
                }
            };
            Some(TableRef { name, alias })
        } else {
            None
        };

        let selection = if self.eat_keyword("where") {
            Some(self.expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            loop {
                let expr = self.expr()?;
                let descending = if self.eat_keyword("desc") {
                    true
                } else {
                    self.eat_keyword("asc");
                    false
                };
                order_by.push(OrderBy { expr, descending });
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
        }

        let limit = if self.eat_keyword("limit") {
            Some(self.expr()?)
        } else {
            None
        };
        let offset = if self.eat_keyword("offset") {
            Some(self.expr()?)
        } else {
            None
        };

        Ok(Select {
            distinct,
            projection,
            from,
            selection,
            order_by,
            limit,
            offset,
        })
    }

    fn select_item(&mut self) -> QueryResult<SelectItem> {
        if self.eat_symbol(Symbol::Star) {
            return Ok(SelectItem::Wildcard);
        }
        // `alias.*`
        if let (Some(Token::Word(_)), Some(Token::Symbol(Symbol::Dot)), Some(Token::Symbol(Symbol::Star))) = (
            self.tokens.get(self.pos).map(|s| &s.token),
            self.tokens.get(self.pos + 1).map(|s| &s.token),
            self.tokens.get(self.pos + 2).map(|s| &s.token),
        ) {
            self.pos += 3;
            return Ok(SelectItem::Wildcard);
        }
        let expr = self.expr()?;
        let alias = if self.eat_keyword("as") {
            Some(self.identifier()?)
        } else {
            match self.peek_token() {
                Some(Token::Word(w)) if !is_reserved(w) => Some(self.identifier()?),
                Some(Token::Quoted(_)) => Some(self.identifier()?),
                _ => None,
            }
        };
        Ok(SelectItem::Expr { expr, alias })
    }

    fn insert(&mut self) -> QueryResult<Insert> {
        self.expect_keyword("into")?;
        let table = self.identifier()?;
        self.expect_symbol(Symbol::LParen)?;
        let mut columns = vec![self.identifier()?];
        while self.eat_symbol(Symbol::Comma) {
            columns.push(self.identifier()?);
        }
        self.expect_symbol(Symbol::RParen)?;
        self.expect_keyword("values")?;
        let mut rows = Vec::new();
        loop {
            self.expect_symbol(Symbol::LParen)?;
            let mut row = vec![self.expr()?];
            while self.eat_symbol(Symbol::Comma) {
                row.push(self.expr()?);
            }
            self.expect_symbol(Symbol::RParen)?;
            if row.len() != columns.len() {
                return Err(QueryError::parse(format!(
                    "{} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            rows.push(row);
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        Ok(Insert {
            table,
            columns,
            rows,
        })
    }

    fn update(&mut self) -> QueryResult<Update> {
        let table = self.identifier()?;
        self.expect_keyword("set")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.column_name()?;
            self.expect_symbol(Symbol::Eq)?;
            assignments.push((column, self.expr()?));
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        let selection = if self.eat_keyword("where") {
            Some(self.expr()?)
        } else {
            None
        };
        Ok(Update {
            table,
            assignments,
            selection,
        })
    }

    fn delete(&mut self) -> QueryResult<Delete> {
        self.expect_keyword("from")?;
        let table = self.identifier()?;
        let selection = if self.eat_keyword("where") {
            Some(self.expr()?)
        } else {
            None
        };
        Ok(Delete { table, selection })
    }

    // -----------------------------------------------------------------------
    // Expressions, lowest precedence first
    // -----------------------------------------------------------------------

    fn expr(&mut self) -> QueryResult<Expr> {
        self.or()
    }

    fn or(&mut self) -> QueryResult<Expr> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            left = Expr::binary(left, BinaryOp::Or, self.and()?);
        }
        Ok(left)
    }

    fn and(&mut self) -> QueryResult<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            left = Expr::binary(left, BinaryOp::And, self.not()?);
        }
        Ok(left)
    }

    fn not(&mut self) -> QueryResult<Expr> {
        if self.eat_keyword("not") {
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(self.not()?),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> QueryResult<Expr> {
        let left = self.concat()?;

        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            self.expect_keyword("null")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.at_keyword("not")
            && self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|s| s.token.is_keyword("in") || s.token.is_keyword("like"));
        if negated {
            self.pos += 1;
        }
        if self.eat_keyword("in") {
            self.expect_symbol(Symbol::LParen)?;
            let mut list = vec![self.expr()?];
            while self.eat_symbol(Symbol::Comma) {
                list.push(self.expr()?);
            }
            self.expect_symbol(Symbol::RParen)?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }
        if self.eat_keyword("like") {
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(self.concat()?),
                negated,
            });
        }

        let op = match self.peek_token() {
            Some(Token::Symbol(Symbol::Eq)) => BinaryOp::Eq,
            Some(Token::Symbol(Symbol::NotEq)) => BinaryOp::NotEq,
            Some(Token::Symbol(Symbol::Lt)) => BinaryOp::Lt,
            Some(Token::Symbol(Symbol::LtEq)) => BinaryOp::LtEq,
            Some(Token::Symbol(Symbol::Gt)) => BinaryOp::Gt,
            Some(Token::Symbol(Symbol::GtEq)) => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.pos += 1;
        Ok(Expr::binary(left, op, self.concat()?))
    }

    fn concat(&mut self) -> QueryResult<Expr> {
        let mut left = self.additive()?;
        while self.eat_symbol(Symbol::Concat) {
            left = Expr::binary(left, BinaryOp::Concat, self.additive()?);
        }
        Ok(left)
    }

    fn additive(&mut self) -> QueryResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat_symbol(Symbol::Plus) {
                BinaryOp::Plus
            } else if self.eat_symbol(Symbol::Minus) {
                BinaryOp::Minus
            } else {
                return Ok(left);
            };
            left = Expr::binary(left, op, self.multiplicative()?);
        }
    }

    fn multiplicative(&mut self) -> QueryResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_symbol(Symbol::Star) {
                BinaryOp::Multiply
            } else if self.eat_symbol(Symbol::Slash) {
                BinaryOp::Divide
            } else if self.eat_symbol(Symbol::Percent) {
                BinaryOp::Modulo
            } else {
                return Ok(left);
            };
            left = Expr::binary(left, op, self.unary()?);
        }
    }

    fn unary(&mut self) -> QueryResult<Expr> {
        if self.eat_symbol(Symbol::Minus) {
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(self.unary()?),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> QueryResult<Expr> {
        let mut expr = self.primary()?;
        while self.eat_symbol(Symbol::LongArrow) || self.eat_symbol(Symbol::Arrow) {
            let path = match self.next()? {
                Token::Str(path) => path,
                Token::Number(n) => n,
                other => return Err(QueryError::parse(format!("expected JSON path, found {other:?}"))),
            };
            expr = Expr::json_extract(expr, path);
        }
        Ok(expr)
    }

    fn primary(&mut self) -> QueryResult<Expr> {
        let token = self.next()?;
        match token {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Number(n) => number(&n).map(Expr::Literal),
            Token::Param(index) => {
                let index = index.unwrap_or(self.max_param + 1);
                self.max_param = self.max_param.max(index);
                Ok(Expr::Param(index))
            }
            Token::Symbol(Symbol::LParen) => {
                let inner = self.expr()?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(inner)
            }
            Token::Word(w) if w.eq_ignore_ascii_case("null") => Ok(Expr::Literal(Value::Null)),
            Token::Word(w) if w.eq_ignore_ascii_case("true") => Ok(Expr::Literal(Value::Bool(true))),
            Token::Word(w) if w.eq_ignore_ascii_case("false") => {
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Word(w) if is_reserved(&w) => {
                self.pos -= 1;
                Err(self.unexpected("expected expression"))
            }
            Token::Word(w) if self.peek_token() == Some(&Token::Symbol(Symbol::LParen)) => {
                self.pos += 1;
                self.function(w)
            }
            Token::Word(w) | Token::Quoted(w) => {
                let mut name = w;
                while self.eat_symbol(Symbol::Dot) {
                    name = self.identifier()?;
                }
                Ok(Expr::Column(name))
            }
            other => {
                self.pos -= 1;
                Err(self.unexpected(&format!("expected expression, not {other:?}")))
            }
        }
    }

    fn function(&mut self, name: String) -> QueryResult<Expr> {
        let name = name.to_ascii_lowercase();
        if self.eat_symbol(Symbol::Star) {
            self.expect_symbol(Symbol::RParen)?;
            return Ok(Expr::Function {
                name,
                args: Vec::new(),
                star: true,
            });
        }
        let mut args = Vec::new();
        if !self.eat_symbol(Symbol::RParen) {
            args.push(self.expr()?);
            while self.eat_symbol(Symbol::Comma) {
                args.push(self.expr()?);
            }
            self.expect_symbol(Symbol::RParen)?;
        }
        Ok(Expr::Function {
            name,
            args,
            star: false,
        })
    }
}

fn number(text: &str) -> QueryResult<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| QueryError::parse(format!("invalid number {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn select(sql: &str) -> Select {
        match parse(sql).unwrap() {
            Statement::Select(s) => s,
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn select_with_everything() {
        let s = select(
            "SELECT DISTINCT id, text AS t FROM note n WHERE n.text LIKE 'a%' AND id IN ('x', ?) \
             ORDER BY id DESC LIMIT 5 OFFSET 1;",
        );
        assert!(s.distinct);
        assert_eq!(s.projection.len(), 2);
        assert_eq!(s.from, Some(TableRef { name: "note".into(), alias: Some("n".into()) }));
        assert_eq!(s.selection.as_ref().unwrap().conjuncts().len(), 2);
        assert!(s.order_by[0].descending);
        assert_eq!(s.limit, Some(Expr::Literal(json!(5))));
    }

    #[test]
    fn precedence() {
        let e = parse_expr("a = 1 OR b = 2 AND NOT c = 3").unwrap();
        match e {
            Expr::Binary { op: BinaryOp::Or, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn json_extract_and_is_null() {
        let e = parse_expr("snapshot_content ->> 'text' IS NOT NULL").unwrap();
        assert_eq!(
            e,
            Expr::IsNull {
                expr: Box::new(Expr::json_extract(Expr::column("snapshot_content"), "text")),
                negated: true,
            }
        );
    }

    #[test]
    fn placeholders_number_after_explicit_ones() {
        let e = parse_expr("a = ?2 AND b = ? AND c = ?").unwrap();
        assert_eq!(e.to_string(), "(((a = ?2) AND (b = ?3)) AND (c = ?4))");
    }

    #[test]
    fn insert_update_delete() {
        let Statement::Insert(i) =
            parse("INSERT INTO note (id, text) VALUES ('a', 'x'), ('b', 'y')").unwrap()
        else {
            panic!("expected insert")
        };
        assert_eq!(i.rows.len(), 2);

        let Statement::Update(u) = parse("UPDATE note SET text = 'z' WHERE id = 'a'").unwrap() else {
            panic!("expected update")
        };
        assert_eq!(u.assignments[0].0, "text");

        let Statement::Delete(d) = parse("DELETE FROM note").unwrap() else {
            panic!("expected delete")
        };
        assert!(d.selection.is_none());
    }

    #[test]
    fn value_count_must_match_columns() {
        assert!(parse("INSERT INTO note (id, text) VALUES ('a')").is_err());
    }

    #[test]
    fn display_reparses_to_same_tree() {
        for sql in [
            "SELECT count(*) FROM state WHERE schema_key = 'note' AND untracked = FALSE",
            "SELECT \"order\", -x + 2 * 3 FROM t WHERE NOT (a IS NULL) AND b NOT IN (1, 2.5)",
            "UPDATE note SET text = 'it''s' WHERE id NOT LIKE '%x'",
            "DELETE FROM note WHERE (a ->> 'b') = json('{\"c\":1}')",
        ] {
            let first = parse(sql).unwrap();
            let second = parse(&first.to_string()).unwrap();
            assert_eq!(first, second, "{sql}");
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("CREATE TABLE x (a)").is_err());
        assert!(parse("SELECT FROM").is_err());
        assert!(parse("SELECT 1 2").is_err());
    }
}
