//! Input/output helpers.
//!
//! - basis text files (`text`)
//! - JSON summaries (`summary`)

pub mod summary;
pub mod text;

pub use summary::*;
pub use text::*;
