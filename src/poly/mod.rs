//! Piecewise polynomial representation of basis functions.

pub mod piecewise;

pub use piecewise::*;
