//! Deterministic function provider.
//!
//! Every writer in the engine obtains timestamps and ids from a
//! [`FunctionProvider`] rather than from the platform directly. In live mode
//! the provider reads the wall clock and a CSPRNG; in deterministic mode it
//! derives everything from a seed and a call sequence number, so the same
//! operation sequence yields byte-identical ids and timestamps across runs.

pub mod error;
pub mod mode;
pub mod provider;

pub use error::{DeterministicError, DeterministicResult};
pub use mode::{DeterministicConfig, Mode};
pub use provider::{FunctionProvider, ProviderState, NANO_ID_LENGTH};
