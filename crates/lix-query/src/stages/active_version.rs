use crate::ast::{Expr, Select};
use crate::error::QueryResult;
use crate::stage::{RewriteContext, RewriteStage, StageOutcome, STATE_ALL_VIEW, STATE_VIEW};

/// Turns `state` into `state_all` filtered to the active version.
pub struct ActiveVersionStage;

impl RewriteStage for ActiveVersionStage {
    fn name(&self) -> &str {
        "active-version"
    }

    fn rewrite(&self, mut select: Select, context: &RewriteContext) -> QueryResult<StageOutcome> {
        match select.from.as_mut() {
            Some(from) if from.name == STATE_VIEW => from.name = STATE_ALL_VIEW.to_string(),
            _ => return Ok(StageOutcome::Skipped(select)),
        }
        select.and_where(Expr::eq(
            Expr::column("version_id"),
            Expr::text(context.active_version_id.clone()),
        ));
        Ok(StageOutcome::Rewritten(select))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_active_version() {
        let ctx = RewriteContext {
            active_version_id: "v1".into(),
            ..Default::default()
        };
        let out = ActiveVersionStage
            .rewrite(Select::star("state", None), &ctx)
            .unwrap()
            .into_select();
        assert_eq!(out.to_string(), "SELECT * FROM state_all WHERE (version_id = 'v1')");
    }
}
