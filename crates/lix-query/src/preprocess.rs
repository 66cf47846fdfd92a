use tracing::{debug, trace};

use crate::ast::{Select, Statement};
use crate::error::QueryResult;
use crate::parser::parse;
use crate::stage::{RewriteContext, RewriteStage};
use crate::stages::{ActiveVersionStage, EntityViewStage, ExplicitVersionStage, FallbackScanStage};

/// A statement after the pipeline ran, with the stages that applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Rewritten {
    pub select: Select,
    pub applied: Vec<String>,
}

/// The query preprocessor: an ordered pipeline of [`RewriteStage`]s.
///
/// Rewriting is an optimisation only. A statement produces the same rows
/// whether or not it went through the pipeline.
pub struct Preprocessor {
    stages: Vec<Box<dyn RewriteStage>>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::with_default_stages()
    }
}

impl Preprocessor {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// entity view -> active version -> explicit version -> fallback scan
    pub fn with_default_stages() -> Self {
        let mut pre = Self::new();
        pre.add_stage(Box::new(EntityViewStage));
        pre.add_stage(Box::new(ActiveVersionStage));
        pre.add_stage(Box::new(ExplicitVersionStage));
        pre.add_stage(Box::new(FallbackScanStage));
        pre
    }

    pub fn add_stage(&mut self, stage: Box<dyn RewriteStage>) {
        self.stages.push(stage);
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run `select` through every stage in order.
    pub fn rewrite(&self, select: Select, context: &RewriteContext) -> QueryResult<Rewritten> {
        let mut current = select;
        let mut applied = Vec::new();
        for stage in &self.stages {
            let outcome = stage.rewrite(current, context)?;
            if outcome.is_rewritten() {
                trace!(stage = stage.name(), "rewrite stage applied");
                applied.push(stage.name().to_string());
            }
            current = outcome.into_select();
        }
        Ok(Rewritten {
            select: current,
            applied,
        })
    }

    /// Rewrite SQL text. Statements the pipeline does not understand, and
    /// writes, come back unchanged.
    pub fn rewrite_sql(&self, sql: &str, context: &RewriteContext) -> String {
        let Ok(Statement::Select(select)) = parse(sql) else {
            return sql.to_string();
        };
        match self.rewrite(select, context) {
            Ok(rewritten) if !rewritten.applied.is_empty() => {
                let out = rewritten.select.to_string();
                debug!(%sql, rewritten = %out, "preprocessed query");
                out
            }
            Ok(_) => sql.to_string(),
            Err(err) => {
                debug!(%sql, error = %err, "rewrite failed, passing statement through");
                sql.to_string()
            }
        }
    }
}
