//! Action Engine
//!
//! Planning and execution engine for agent actions. It provides:
//! - Data models for plans, steps, planning context and execution results
//! - A lenient parser from generated plan text to structured plans
//! - Plan validation, scheduling (sequential, parallel, dag) and retry
//! - Replanning of a failed plan's remainder
//! - `PlanningService`, the facade tying these together
//!
//! Capabilities and the capability registry live in `action-engine-core`;
//! the text-generation interface lives in `action-engine-llm`.

pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{PlanningConfig, PlanningConfigUpdate};
pub use models::*;
pub use services::planning::{
    adapt_plan, parse_plan, validate_plan, PlanExecution, PlanExecutor, PlanningService,
    ValidationIssue, ValidationReport,
};
pub use utils::error::{EngineError, EngineResult};

// Re-export the workspace crates so callers need a single dependency
pub use action_engine_core;
pub use action_engine_llm;
