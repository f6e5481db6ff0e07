//! Services
//!
//! Business logic services for the engine.

pub mod planning;

pub use planning::{PlanExecution, PlanExecutor, PlanningService, ValidationIssue, ValidationReport};
