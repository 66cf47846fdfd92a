//! Schema registry and entity view definitions.
//!
//! Entity authors describe their entities as JSON schema documents extended
//! with `x-lix-*` keywords. This crate:
//!
//! - parses and checks schema documents against the fixed meta-schema
//!   ([`LixSchema::from_value`]),
//! - validates snapshot content against a registered schema
//!   ([`validate_content`]),
//! - keeps the set of registered schemas ([`SchemaRegistry`]),
//! - derives the logical view pair for every schema ([`EntityViewDef`]),
//! - binds Rust types to registered schemas ([`LixEntity`], [`EntityAccessor`]).
//!
//! The built-in schemas every database starts with live in [`builtin`].

pub mod builtin;
pub mod definition;
pub mod error;
pub mod registry;
pub mod typed;
pub mod validate;
pub mod view;

pub use definition::{ForeignKey, Generator, JsonType, LixSchema, PropertySchema};
pub use error::{SchemaError, SchemaResult, SchemaValidationError};
pub use registry::{RegisterOutcome, SchemaRegistry};
pub use typed::{EntityAccessor, LixEntity};
pub use validate::validate_content;
pub use view::{lixcol_name, EntityViewDef, LIXCOL_COLUMNS, LIXCOL_PREFIX, RESERVED_VIEW_NAMES};
