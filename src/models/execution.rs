//! Execution Result Models
//!
//! Outcome types produced by the execution engine: per-step results and
//! errors, the aggregated `PlanExecutionResult`, and the status snapshot
//! exposed while an execution is in flight.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::PlanStatus;

/// Output of one successfully executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub action_name: String,
    pub output: Value,
    /// Invocations it took, including the successful one
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Why a step (or the schedule itself) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// No capability registered under the step's action name
    CapabilityNotFound,
    /// The capability returned an error on its last attempt
    HandlerFailed,
    /// DAG scheduling found pending steps with no ready candidate
    SchedulingDeadlock,
    /// The spawned step task panicked or was aborted
    TaskPanicked,
}

impl fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepErrorKind::CapabilityNotFound => write!(f, "capability_not_found"),
            StepErrorKind::HandlerFailed => write!(f, "handler_failed"),
            StepErrorKind::SchedulingDeadlock => write!(f, "scheduling_deadlock"),
            StepErrorKind::TaskPanicked => write!(f, "task_panicked"),
        }
    }
}

/// A failure recorded during an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    /// `None` for schedule-level failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    pub kind: StepErrorKind,
    pub message: String,
    #[serde(default)]
    pub attempts: u32,
}

impl StepError {
    pub fn for_step(
        step_id: impl Into<String>,
        action_name: impl Into<String>,
        kind: StepErrorKind,
        message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            step_id: Some(step_id.into()),
            action_name: Some(action_name.into()),
            kind,
            message: message.into(),
            attempts,
        }
    }

    pub fn deadlock(pending: &[String]) -> Self {
        Self {
            step_id: None,
            action_name: None,
            kind: StepErrorKind::SchedulingDeadlock,
            message: format!(
                "No runnable steps; pending steps have unsatisfiable dependencies: {}",
                pending.join(", ")
            ),
            attempts: 0,
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.step_id, &self.action_name) {
            (Some(id), Some(action)) => {
                write!(f, "[{}] step {} ({}): {}", self.kind, id, action, self.message)
            }
            (Some(id), None) => write!(f, "[{}] step {}: {}", self.kind, id, self.message),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Aggregated outcome of executing one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanExecutionResult {
    pub plan_id: String,
    /// No errors recorded and not cancelled
    pub success: bool,
    pub completed_steps: usize,
    pub total_steps: usize,
    /// Successful step outputs in completion order; declared order for
    /// sequential and parallel plans
    pub results: Vec<StepResult>,
    #[serde(default)]
    pub errors: Vec<StepError>,
    pub duration_ms: u64,
    pub status: PlanStatus,
}

impl PlanExecutionResult {
    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }

    pub fn error_for(&self, step_id: &str) -> Option<&StepError> {
        self.errors
            .iter()
            .find(|e| e.step_id.as_deref() == Some(step_id))
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == PlanStatus::Cancelled
    }
}

/// Read-only view of an in-flight execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatusSnapshot {
    pub plan_id: String,
    pub status: PlanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_steps: usize,
    pub total_steps: usize,
}
