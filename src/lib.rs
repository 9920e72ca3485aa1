//! `ir-basis` library crate.
//!
//! The binary (`irb`) is a thin wrapper around this library so that:
//!
//! - the SVE and basis code is testable without spawning processes
//! - bases can be computed and loaded from other Rust code

pub mod app;
pub mod basis;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod kernel;
pub mod logging;
pub mod math;
pub mod plot;
pub mod poly;
pub mod report;

pub use basis::{IrBasis, compute_basis};
pub use domain::{BasisConfig, PrecisionMode, Statistics};
pub use io::{loadtxt, savetxt};
