//! State resolution and cache.
//!
//! The current value of an entity in a version is determined in layers:
//!
//! 1. a row staged in the open transaction,
//! 2. an untracked row,
//! 3. the version's *local* committed value: the leaf change reachable from
//!    the version's commit (a tombstone counts and hides everything below),
//! 4. otherwise the value visible in the version it inherits from.
//!
//! Layer 3 has two interchangeable sources implementing [`LocalSource`]:
//! [`HistoryResolver`] walks the commit graph on every call, while
//! [`StateCache`] materialises the result per schema and rebuilds itself
//! from history once after each invalidating write. [`visible_rows`] applies
//! the layering on top of either source, so both paths produce identical
//! rows.

pub mod cache;
pub mod error;
pub mod layer;
pub mod resolve;
pub mod row;
pub mod untracked;

pub use cache::{cache_table_name, CacheStats, StateCache, CACHE_TABLE_PREFIX};
pub use error::{StateError, StateResult};
pub use layer::{visible_row, visible_rows, Layers, StateFilter, UNTRACKED_CHANGE_ID};
pub use resolve::{History, HistoryResolver, LocalSource};
pub use row::{LocalEntry, StateRow, STATE_COLUMNS};
pub use untracked::{UntrackedRow, UntrackedStore};
