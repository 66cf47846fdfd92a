use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ast::{BinaryOp, Delete, Expr, Insert, Select, SelectItem, Statement, Update};
use crate::error::QueryError;
use crate::eval::{eval, is_truthy, total_order, Row};
use crate::parser::parse;
use crate::preprocess::Preprocessor;
use crate::stage::RewriteContext;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The tables a statement can read and write.
///
/// Writes receive whole rows in the shape of the target table: an UPDATE
/// passes every matched row before and after the assignments, a DELETE
/// passes every matched row.
pub trait Catalog {
    type Error: From<QueryError>;

    /// Context for the rewrite pipeline. Only called when rewriting is on.
    fn rewrite_context(&mut self) -> Result<RewriteContext, Self::Error>;

    /// Column names of `table`, in output order.
    fn columns(&mut self, table: &str) -> Result<Vec<String>, Self::Error>;

    /// Rows of `table`. A catalog may use `filter` to skip rows the WHERE
    /// clause would drop; every returned row is still filtered.
    fn scan(&mut self, table: &str, filter: &ScanFilter) -> Result<Vec<Row>, Self::Error>;

    fn insert(&mut self, table: &str, rows: Vec<Row>) -> Result<usize, Self::Error>;

    fn update(&mut self, table: &str, rows: Vec<(Row, Row)>) -> Result<usize, Self::Error>;

    fn delete(&mut self, table: &str, rows: Vec<Row>) -> Result<usize, Self::Error>;
}

/// Column equalities every row of a result must satisfy, taken from the
/// top-level `AND` conjuncts of a WHERE clause that compare a column with a
/// literal or a bound parameter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanFilter {
    equalities: BTreeMap<String, Value>,
}

impl ScanFilter {
    pub fn from_selection(selection: Option<&Expr>, params: &[Value]) -> Self {
        let mut filter = Self::default();
        if let Some(expr) = selection {
            filter.collect(expr, params);
        }
        filter
    }

    /// The value `column` is pinned to, if any.
    pub fn equals(&self, column: &str) -> Option<&Value> {
        self.equalities.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.equalities.is_empty()
    }

    fn collect(&mut self, expr: &Expr, params: &[Value]) {
        let Expr::Binary { left, op, right } = expr else {
            return;
        };
        match op {
            BinaryOp::And => {
                self.collect(left, params);
                self.collect(right, params);
            }
            BinaryOp::Eq => {
                let pinned = match (left.as_ref(), right.as_ref()) {
                    (Expr::Column(column), value) | (value, Expr::Column(column)) => {
                        constant(value, params).map(|v| (column, v))
                    }
                    _ => None,
                };
                // `col = NULL` never matches; leave it to the WHERE clause.
                if let Some((column, value)) = pinned.filter(|(_, v)| !v.is_null()) {
                    self.equalities.entry(column.clone()).or_insert(value);
                }
            }
            _ => {}
        }
    }
}

fn constant(expr: &Expr, params: &[Value]) -> Option<Value> {
    match expr {
        Expr::Literal(value) => Some(value.clone()),
        Expr::Param(index) => params.get(index.checked_sub(1)?).cloned(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Rows returned by a SELECT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// Rows keyed by column name.
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|values| self.columns.iter().cloned().zip(values.iter().cloned()).collect())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutput {
    Rows(ResultSet),
    /// Number of rows an INSERT, UPDATE or DELETE touched.
    Affected(usize),
}

impl QueryOutput {
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryOutput::Rows(rows) => Some(rows),
            QueryOutput::Affected(_) => None,
        }
    }

    pub fn into_rows(self) -> ResultSet {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Affected(_) => ResultSet::default(),
        }
    }

    pub fn affected(&self) -> usize {
        match self {
            QueryOutput::Rows(rows) => rows.len(),
            QueryOutput::Affected(n) => *n,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryEngine
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// `false` bypasses the preprocessor entirely; logical views are then
    /// served straight from history.
    pub rewrite_enabled: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            rewrite_enabled: true,
        }
    }
}

/// Parses statements, runs reads through the preprocessor and routes writes
/// to the catalog.
pub struct QueryEngine {
    config: QueryConfig,
    preprocessor: Preprocessor,
}

impl QueryEngine {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            config,
            preprocessor: Preprocessor::with_default_stages(),
        }
    }

    pub fn config(&self) -> QueryConfig {
        self.config
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn execute<C: Catalog>(
        &self,
        catalog: &mut C,
        sql: &str,
        params: &[Value],
    ) -> Result<QueryOutput, C::Error> {
        let statement = parse(sql)?;
        self.execute_statement(catalog, statement, params)
    }

    pub fn execute_statement<C: Catalog>(
        &self,
        catalog: &mut C,
        statement: Statement,
        params: &[Value],
    ) -> Result<QueryOutput, C::Error> {
        match statement {
            Statement::Select(select) => self.select(catalog, select, params).map(QueryOutput::Rows),
            Statement::Insert(insert) => self.insert(catalog, insert, params),
            Statement::Update(update) => self.update(catalog, update, params),
            Statement::Delete(delete) => self.delete(catalog, delete, params),
        }
    }

    /// The SQL a read would actually run.
    pub fn explain<C: Catalog>(&self, catalog: &mut C, sql: &str) -> Result<String, C::Error> {
        if !self.config.rewrite_enabled {
            return Ok(sql.to_string());
        }
        let context = catalog.rewrite_context()?;
        Ok(self.preprocessor.rewrite_sql(sql, &context))
    }

    pub fn select<C: Catalog>(
        &self,
        catalog: &mut C,
        select: Select,
        params: &[Value],
    ) -> Result<ResultSet, C::Error> {
        let select = if self.config.rewrite_enabled && select.from.is_some() {
            let context = catalog.rewrite_context()?;
            let rewritten = self.preprocessor.rewrite(select, &context)?;
            if !rewritten.applied.is_empty() {
                debug!(sql = %rewritten.select, stages = ?rewritten.applied, "rewrote read");
            }
            rewritten.select
        } else {
            select
        };
        run_select(catalog, &select, params)
    }

    fn insert<C: Catalog>(
        &self,
        catalog: &mut C,
        insert: Insert,
        params: &[Value],
    ) -> Result<QueryOutput, C::Error> {
        let empty = Row::new();
        let mut rows = Vec::with_capacity(insert.rows.len());
        for values in &insert.rows {
            let mut row = Row::new();
            for (column, expr) in insert.columns.iter().zip(values) {
                row.insert(column.clone(), eval(expr, &empty, params)?);
            }
            rows.push(row);
        }
        let n = catalog.insert(&insert.table, rows)?;
        Ok(QueryOutput::Affected(n))
    }

    fn update<C: Catalog>(
        &self,
        catalog: &mut C,
        update: Update,
        params: &[Value],
    ) -> Result<QueryOutput, C::Error> {
        let matched = self.matching_rows(catalog, &update.table, update.selection, params)?;
        let mut pairs = Vec::with_capacity(matched.len());
        for old in matched {
            let mut new = old.clone();
            for (column, expr) in &update.assignments {
                new.insert(column.clone(), eval(expr, &old, params)?);
            }
            pairs.push((old, new));
        }
        if pairs.is_empty() {
            return Ok(QueryOutput::Affected(0));
        }
        let n = catalog.update(&update.table, pairs)?;
        Ok(QueryOutput::Affected(n))
    }

    fn delete<C: Catalog>(
        &self,
        catalog: &mut C,
        delete: Delete,
        params: &[Value],
    ) -> Result<QueryOutput, C::Error> {
        let matched = self.matching_rows(catalog, &delete.table, delete.selection, params)?;
        if matched.is_empty() {
            return Ok(QueryOutput::Affected(0));
        }
        let n = catalog.delete(&delete.table, matched)?;
        Ok(QueryOutput::Affected(n))
    }

    /// Rows of `table` a write's WHERE clause selects, read the same way a
    /// SELECT would.
    fn matching_rows<C: Catalog>(
        &self,
        catalog: &mut C,
        table: &str,
        selection: Option<Expr>,
        params: &[Value],
    ) -> Result<Vec<Row>, C::Error> {
        let select = Select::star(table, selection);
        Ok(self.select(catalog, select, params)?.to_rows())
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

fn run_select<C: Catalog>(
    catalog: &mut C,
    select: &Select,
    params: &[Value],
) -> Result<ResultSet, C::Error> {
    let (source, table_columns) = match &select.from {
        Some(from) => {
            let filter = ScanFilter::from_selection(select.selection.as_ref(), params);
            (catalog.scan(&from.name, &filter)?, catalog.columns(&from.name)?)
        }
        None => (vec![Row::new()], Vec::new()),
    };

    let mut filtered = Vec::with_capacity(source.len());
    for row in source {
        let keep = match &select.selection {
            Some(predicate) => is_truthy(&eval(predicate, &row, params)?),
            None => true,
        };
        if keep {
            filtered.push(row);
        }
    }

    let mut columns = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard => columns.extend(table_columns.iter().cloned()),
            other => columns.extend(other.output_name()),
        }
    }

    if select
        .projection
        .iter()
        .any(|item| matches!(item, SelectItem::Expr { expr, .. } if expr.is_aggregate()))
    {
        let row = aggregate(&select.projection, &filtered, &table_columns, params)?;
        return Ok(ResultSet {
            columns,
            rows: vec![row],
        });
    }

    let mut projected: Vec<(Row, Vec<Value>)> = Vec::with_capacity(filtered.len());
    for row in filtered {
        let values = project(&select.projection, &row, &table_columns, params)?;
        projected.push((row, values));
    }

    if !select.order_by.is_empty() {
        let mut keyed = Vec::with_capacity(projected.len());
        for (row, values) in projected {
            // ORDER BY sees source columns and, where not shadowed, output aliases.
            let mut scope = row.clone();
            for (name, value) in columns.iter().zip(&values) {
                scope.entry(name.clone()).or_insert_with(|| value.clone());
            }
            let keys = select
                .order_by
                .iter()
                .map(|o| eval(&o.expr, &scope, params))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((keys, row, values));
        }
        keyed.sort_by(|(a, _, _), (b, _, _)| {
            for ((x, y), order) in a.iter().zip(b).zip(&select.order_by) {
                let o = total_order(x, y);
                let o = if order.descending { o.reverse() } else { o };
                if o.is_ne() {
                    return o;
                }
            }
            std::cmp::Ordering::Equal
        });
        projected = keyed.into_iter().map(|(_, row, values)| (row, values)).collect();
    }

    let mut rows: Vec<Vec<Value>> = projected.into_iter().map(|(_, values)| values).collect();
    if select.distinct {
        let mut seen: Vec<Vec<Value>> = Vec::new();
        rows.retain(|r| {
            if seen.contains(r) {
                false
            } else {
                seen.push(r.clone());
                true
            }
        });
    }

    let offset = bound(select.offset.as_ref(), params)?.unwrap_or(0);
    let rows: Vec<Vec<Value>> = match bound(select.limit.as_ref(), params)? {
        Some(limit) => rows.into_iter().skip(offset).take(limit).collect(),
        None => rows.into_iter().skip(offset).collect(),
    };
    Ok(ResultSet { columns, rows })
}

fn project(
    projection: &[SelectItem],
    row: &Row,
    table_columns: &[String],
    params: &[Value],
) -> Result<Vec<Value>, QueryError> {
    let mut values = Vec::new();
    for item in projection {
        match item {
            SelectItem::Wildcard => {
                values.extend(table_columns.iter().map(|c| row.get(c).cloned().unwrap_or(Value::Null)))
            }
            SelectItem::Expr { expr, .. } => values.push(eval(expr, row, params)?),
        }
    }
    Ok(values)
}

fn aggregate(
    projection: &[SelectItem],
    rows: &[Row],
    table_columns: &[String],
    params: &[Value],
) -> Result<Vec<Value>, QueryError> {
    let mut out = Vec::new();
    for item in projection {
        match item {
            SelectItem::Expr {
                expr: Expr::Function { name, args, star },
                ..
            } if name.eq_ignore_ascii_case("count") => {
                let n = if *star {
                    rows.len()
                } else {
                    let arg = args
                        .first()
                        .ok_or_else(|| QueryError::parse("count() takes one argument"))?;
                    let mut n = 0;
                    for row in rows {
                        if !eval(arg, row, params)?.is_null() {
                            n += 1;
                        }
                    }
                    n
                };
                out.push(Value::from(n));
            }
            // A bare column next to an aggregate takes its value from the
            // first row.
            other => match rows.first() {
                Some(row) => out.extend(project(std::slice::from_ref(other), row, table_columns, params)?),
                None => out.push(Value::Null),
            },
        }
    }
    Ok(out)
}

fn bound(expr: Option<&Expr>, params: &[Value]) -> Result<Option<usize>, QueryError> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match eval(expr, &Row::new(), params)? {
        Value::Number(n) => match n.as_i64() {
            Some(i) if i < 0 => Ok(None),
            Some(i) => Ok(usize::try_from(i).ok()),
            None => Err(QueryError::parse("LIMIT and OFFSET take integers")),
        },
        Value::Null => Ok(None),
        other => Err(QueryError::parse(format!("LIMIT and OFFSET take integers, not {other}"))),
    }
}
