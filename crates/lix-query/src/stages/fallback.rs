use lix_state::CACHE_TABLE_PREFIX;

use crate::ast::Select;
use crate::error::QueryResult;
use crate::stage::{RewriteContext, RewriteStage, StageOutcome, STATE_ALL_VIEW};

/// Scans every cache table when no schema key could be pinned.
pub struct FallbackScanStage;

impl RewriteStage for FallbackScanStage {
    fn name(&self) -> &str {
        "fallback-scan"
    }

    fn rewrite(&self, mut select: Select, _context: &RewriteContext) -> QueryResult<StageOutcome> {
        match select.from.as_mut() {
            Some(from) if from.name == STATE_ALL_VIEW => {
                from.name = CACHE_TABLE_PREFIX.to_string();
                Ok(StageOutcome::Rewritten(select))
            }
            _ => Ok(StageOutcome::Skipped(select)),
        }
    }
}
