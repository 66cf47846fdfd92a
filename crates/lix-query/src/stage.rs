use std::collections::BTreeSet;

use lix_schema::EntityViewDef;

use crate::ast::Select;
use crate::error::QueryResult;

/// Logical view over the active version's state.
pub const STATE_VIEW: &str = "state";
/// Logical view over every version's state.
pub const STATE_ALL_VIEW: &str = "state_all";

// ---------------------------------------------------------------------------
// RewriteContext
// ---------------------------------------------------------------------------

/// What the rewrite stages may know about the database.
#[derive(Clone, Debug, Default)]
pub struct RewriteContext {
    /// Version the `state` view and `<entity>` views read from.
    pub active_version_id: String,
    /// One entry per registered schema.
    pub views: Vec<EntityViewDef>,
    /// Schema keys that have a physical cache table.
    pub schema_keys: BTreeSet<String>,
}

impl RewriteContext {
    pub fn view_named(&self, name: &str) -> Option<&EntityViewDef> {
        self.views.iter().find(|v| v.matches(name))
    }
}

// ---------------------------------------------------------------------------
// StageOutcome
// ---------------------------------------------------------------------------

/// Result of running one stage.
#[derive(Clone, Debug, PartialEq)]
pub enum StageOutcome {
    /// The stage applied and produced a new statement.
    Rewritten(Select),
    /// The stage did not apply; the statement is handed on unchanged.
    Skipped(Select),
}

impl StageOutcome {
    pub fn into_select(self) -> Select {
        match self {
            StageOutcome::Rewritten(s) | StageOutcome::Skipped(s) => s,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, StageOutcome::Rewritten(_))
    }
}

// ---------------------------------------------------------------------------
// RewriteStage trait
// ---------------------------------------------------------------------------

/// One step of the rewrite pipeline.
///
/// Stages run in order and each sees the output of the previous one. A
/// stage must produce a statement that returns exactly the rows the input
/// statement would; stages change where rows come from, never which rows.
pub trait RewriteStage: Send + Sync {
    fn name(&self) -> &str;

    fn rewrite(&self, select: Select, context: &RewriteContext) -> QueryResult<StageOutcome>;
}
