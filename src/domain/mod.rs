//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - computation settings (`Statistics`, `PrecisionMode`, `BasisConfig`)
//! - the JSON summary of a computed basis (`BasisSummary`)

pub mod types;

pub use types::*;
