//! Query layer for lix.
//!
//! SQL arrives as text, is tokenized and parsed into a small statement
//! tree, and reads pass through a pipeline of rewrite stages before they
//! run. The stages turn reads of entity views and of the generic `state`
//! views into reads of the per-schema cache tables, without changing what
//! the statement returns.
//!
//! # Quick Start
//!
//! ```rust
//! use lix_query::{Preprocessor, RewriteContext};
//!
//! let context = RewriteContext {
//!     active_version_id: "main".into(),
//!     ..RewriteContext::default()
//! };
//! let sql = Preprocessor::with_default_stages().rewrite_sql("SELECT * FROM state", &context);
//! assert_eq!(sql, "SELECT * FROM internal_state_cache WHERE (version_id = 'main')");
//! ```

pub mod ast;
pub mod classify;
pub mod error;
pub mod eval;
pub mod exec;
pub mod parser;
pub mod preprocess;
pub mod stage;
pub mod stages;
pub mod token;

// Re-exports for convenience.
pub use ast::{Delete, Expr, Insert, Select, SelectItem, Statement, TableRef, Update};
pub use classify::{classify, Classified, StatementKind};
pub use error::{QueryError, QueryResult};
pub use eval::Row;
pub use exec::{Catalog, QueryConfig, QueryEngine, QueryOutput, ResultSet, ScanFilter};
pub use parser::{parse, parse_expr};
pub use preprocess::{Preprocessor, Rewritten};
pub use stage::{RewriteContext, RewriteStage, StageOutcome, STATE_ALL_VIEW, STATE_VIEW};
pub use stages::{ActiveVersionStage, EntityViewStage, ExplicitVersionStage, FallbackScanStage};
