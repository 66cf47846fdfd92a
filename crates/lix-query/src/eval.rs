//! Expression evaluation over JSON-valued rows.
//!
//! Comparison follows SQL three-valued logic: any comparison with NULL is
//! NULL, and a NULL predicate does not select a row. Booleans compare as
//! the integers 0 and 1.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{QueryError, QueryResult};

/// One row keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Evaluate `expr` against `row`.
pub fn eval(expr: &Expr, row: &Row, params: &[Value]) -> QueryResult<Value> {
    match expr {
        Expr::Column(name) => row
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownColumn(name.clone())),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Param(index) => index
            .checked_sub(1)
            .and_then(|i| params.get(i))
            .cloned()
            .ok_or(QueryError::MissingParameter {
                index: *index,
                bound: params.len(),
            }),
        Expr::Binary { left, op, right } => {
            let l = eval(left, row, params)?;
            match op {
                // Short-circuit where the left side decides.
                BinaryOp::And if !l.is_null() && !is_truthy(&l) => {
                    Ok(Value::Bool(false))
                }
                BinaryOp::Or if is_truthy(&l) => Ok(Value::Bool(true)),
                _ => binary(*op, l, eval(right, row, params)?),
            }
        }
        Expr::Unary { op, expr } => {
            let v = eval(expr, row, params)?;
            match (op, v) {
                (_, Value::Null) => Ok(Value::Null),
                (UnaryOp::Not, v) => Ok(Value::Bool(!is_truthy(&v))),
                (UnaryOp::Neg, v) => arithmetic(BinaryOp::Minus, &Value::from(0), &v),
            }
        }
        Expr::IsNull { expr, negated } => {
            let v = eval(expr, row, params)?;
            Ok(Value::Bool(v.is_null() != *negated))
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let v = eval(expr, row, params)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let candidate = eval(item, row, params)?;
                match sql_compare(&v, &candidate) {
                    Some(Ordering::Equal) => return Ok(Value::Bool(!negated)),
                    None => saw_null = true,
                    _ => {}
                }
            }
            Ok(if saw_null {
                Value::Null
            } else {
                Value::Bool(*negated)
            })
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let v = eval(expr, row, params)?;
            let p = eval(pattern, row, params)?;
            if v.is_null() || p.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::Bool(like(&to_text(&v), &to_text(&p)) != *negated))
        }
        Expr::JsonExtract { expr, path } => {
            let v = eval(expr, row, params)?;
            Ok(json_extract(&v, path))
        }
        Expr::Function { name, args, star } => {
            if *star || name == "count" {
                return Err(QueryError::Unsupported(format!(
                    "aggregate {name}() outside a projection"
                )));
            }
            let values = args
                .iter()
                .map(|a| eval(a, row, params))
                .collect::<QueryResult<Vec<_>>>()?;
            scalar_function(name, values)
        }
    }
}

/// Whether a value selects a row.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => s.parse::<f64>().is_ok_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// SQL comparison; `None` when either side is NULL.
pub fn sql_compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    Some(total_order(a, b))
}

/// Total order used for sorting: NULL < numbers < text < JSON values.
pub fn total_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) | Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) | Value::Object(_) => 3,
        }
    }
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => match rank(a).cmp(&rank(b)) {
            Ordering::Equal => match (a, b) {
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => a.to_string().cmp(&b.to_string()),
            },
            other => other,
        },
    }
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> QueryResult<Value> {
    let cmp = |want: fn(Ordering) -> bool| -> Value {
        sql_compare(&l, &r).map_or(Value::Null, |o| Value::Bool(want(o)))
    };
    Ok(match op {
        BinaryOp::And => match (l.is_null(), r.is_null()) {
            (_, false) if !is_truthy(&r) => Value::Bool(false),
            (false, false) => Value::Bool(true),
            _ => Value::Null,
        },
        BinaryOp::Or => {
            if is_truthy(&r) {
                Value::Bool(true)
            } else if l.is_null() || r.is_null() {
                Value::Null
            } else {
                Value::Bool(false)
            }
        }
        BinaryOp::Eq => cmp(Ordering::is_eq),
        BinaryOp::NotEq => cmp(Ordering::is_ne),
        BinaryOp::Lt => cmp(Ordering::is_lt),
        BinaryOp::LtEq => cmp(Ordering::is_le),
        BinaryOp::Gt => cmp(Ordering::is_gt),
        BinaryOp::GtEq => cmp(Ordering::is_ge),
        BinaryOp::Concat => {
            if l.is_null() || r.is_null() {
                Value::Null
            } else {
                Value::String(format!("{}{}", to_text(&l), to_text(&r)))
            }
        }
        BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
            arithmetic(op, &l, &r)?
        }
    })
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> QueryResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let as_int = |v: &Value| match v {
        Value::Number(n) => n.as_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    if let (Some(a), Some(b)) = (as_int(l), as_int(r)) {
        let result = match op {
            BinaryOp::Plus => a.checked_add(b),
            BinaryOp::Minus => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Divide if b == 0 => return Ok(Value::Null),
            BinaryOp::Divide => a.checked_div(b),
            BinaryOp::Modulo if b == 0 => return Ok(Value::Null),
            BinaryOp::Modulo => a.checked_rem(b),
            _ => None,
        };
        if let Some(n) = result {
            return Ok(Value::from(n));
        }
    }
    let to_f = |v: &Value| numeric(v).or_else(|| v.as_str().and_then(|s| s.parse().ok()));
    let (Some(a), Some(b)) = (to_f(l), to_f(r)) else {
        return Err(QueryError::Unsupported(format!("arithmetic on {l} and {r}")));
    };
    let result = match op {
        BinaryOp::Plus => a + b,
        BinaryOp::Minus => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide if b == 0.0 => return Ok(Value::Null),
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo if b == 0.0 => return Ok(Value::Null),
        BinaryOp::Modulo => a % b,
        _ => return Err(QueryError::Unsupported(format!("{op:?} is not arithmetic"))),
    };
    Ok(Number::from_f64(result).map_or(Value::Null, Value::Number))
}

/// Text form of a value, as `||` and `LIKE` see it.
pub fn to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => u8::from(*b).to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Case-insensitive `LIKE` with `%` and `_` wildcards.
pub fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.to_lowercase().chars().collect();
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((bp, bt)) = backtrack {
            pi = bp + 1;
            ti = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}

/// Extract `path` (`$.a.b[0]` or a bare member name) from a JSON value.
/// Text holding JSON is parsed first; a missing member is NULL.
pub fn json_extract(value: &Value, path: &str) -> Value {
    let parsed;
    let mut current = match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(_) => return Value::Null,
        },
        Value::Null => return Value::Null,
        other => other,
    };

    let Some(rest) = path.strip_prefix('$') else {
        return current.get(path).cloned().unwrap_or(Value::Null);
    };
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                let mut key = String::new();
                while let Some(&n) = chars.peek() {
                    if n == '.' || n == '[' {
                        break;
                    }
                    key.push(n);
                    chars.next();
                }
                match current.get(&key) {
                    Some(v) => current = v,
                    None => return Value::Null,
                }
            }
            '[' => {
                let mut index = String::new();
                for n in chars.by_ref() {
                    if n == ']' {
                        break;
                    }
                    index.push(n);
                }
                match index.parse::<usize>().ok().and_then(|i| current.get(i)) {
                    Some(v) => current = v,
                    None => return Value::Null,
                }
            }
            _ => return Value::Null,
        }
    }
    current.clone()
}

fn scalar_function(name: &str, args: Vec<Value>) -> QueryResult<Value> {
    let arity = |n: usize| -> QueryResult<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(QueryError::parse(format!("{name}() takes {n} argument(s)")))
        }
    };
    match name {
        "lower" | "upper" => {
            arity(1)?;
            Ok(match &args[0] {
                Value::Null => Value::Null,
                v if name == "lower" => Value::String(to_text(v).to_lowercase()),
                v => Value::String(to_text(v).to_uppercase()),
            })
        }
        "length" => {
            arity(1)?;
            Ok(match &args[0] {
                Value::Null => Value::Null,
                v => Value::from(to_text(v).chars().count()),
            })
        }
        "coalesce" | "ifnull" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        "nullif" => {
            arity(2)?;
            Ok(if sql_compare(&args[0], &args[1]) == Some(Ordering::Equal) {
                Value::Null
            } else {
                args[0].clone()
            })
        }
        "json" => {
            arity(1)?;
            match &args[0] {
                Value::String(s) => serde_json::from_str(s)
                    .map_err(|e| QueryError::parse(format!("malformed JSON: {e}"))),
                other => Ok(other.clone()),
            }
        }
        "json_extract" => {
            arity(2)?;
            Ok(json_extract(&args[0], &to_text(&args[1])))
        }
        other => Err(QueryError::Unsupported(format!("function {other}()"))),
    }
}
