//! # pkat-core
//!
//! Shared error and data types for the pkat post-simulation analysis engine.
//!
//! Higher-level crates (`pkat-analyze`) depend on these types only; nothing
//! here performs I/O or numeric work.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{OutputVariable, RunId, POPULATION_KEYWORD};
