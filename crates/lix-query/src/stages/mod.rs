//! Built-in rewrite stages, in pipeline order.

pub mod active_version;
pub mod entity_view;
pub mod explicit_version;
pub mod fallback;

pub use active_version::ActiveVersionStage;
pub use entity_view::EntityViewStage;
pub use explicit_version::ExplicitVersionStage;
pub use fallback::FallbackScanStage;
