//! Data Models
//!
//! Plans, steps, planning context and execution outcomes.

pub mod context;
pub mod execution;
pub mod plan;

pub use context::*;
pub use execution::*;
pub use plan::*;
