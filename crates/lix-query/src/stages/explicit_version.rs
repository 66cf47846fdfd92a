use lix_state::cache_table_name;
use serde_json::Value;

use crate::ast::{BinaryOp, Expr, Select};
use crate::error::QueryResult;
use crate::stage::{RewriteContext, RewriteStage, StageOutcome, STATE_ALL_VIEW};

/// Routes `state_all` reads with a literal schema key to that schema's
/// cache table.
pub struct ExplicitVersionStage;

/// The schema key pinned by a top-level `schema_key = '<literal>'`.
pub fn static_schema_key(select: &Select) -> Option<String> {
    let selection = select.selection.as_ref()?;
    selection.conjuncts().into_iter().find_map(|c| match c {
        Expr::Binary {
            left,
            op: BinaryOp::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expr::Column(col), Expr::Literal(Value::String(key)))
            | (Expr::Literal(Value::String(key)), Expr::Column(col))
                if col == "schema_key" =>
            {
                Some(key.clone())
            }
            _ => None,
        },
        _ => None,
    })
}

impl RewriteStage for ExplicitVersionStage {
    fn name(&self) -> &str {
        "explicit-version"
    }

    fn rewrite(&self, mut select: Select, context: &RewriteContext) -> QueryResult<StageOutcome> {
        if select.table() != Some(STATE_ALL_VIEW) {
            return Ok(StageOutcome::Skipped(select));
        }
        let Some(key) = static_schema_key(&select).filter(|k| context.schema_keys.contains(k)) else {
            return Ok(StageOutcome::Skipped(select));
        };
        if let Some(from) = select.from.as_mut() {
            from.name = cache_table_name(&key);
        }
        Ok(StageOutcome::Rewritten(select))
    }
}
