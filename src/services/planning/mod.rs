//! Planning Service
//!
//! Turns goals into executable action plans and runs them:
//! - Prompt construction for plan generation and adaptation
//! - Lenient parsing of XML step blocks into plans
//! - Structural validation, including DAG cycle detection
//! - Sequential, parallel and DAG execution with per-step retry
//! - Replanning of the unexecuted remainder after a failure

pub mod executor;
pub mod parser;
pub mod prompts;
pub mod replanner;
pub mod retry;
pub mod service;
pub mod validator;

pub use executor::{PlanExecution, PlanExecutor};
pub use parser::{parse_plan, parse_plan_text, simple_plan, ParsedPlanText};
pub use replanner::adapt_plan;
pub use retry::execute_with_retry;
pub use service::PlanningService;
pub use validator::{validate_plan, ValidationIssue, ValidationReport};
