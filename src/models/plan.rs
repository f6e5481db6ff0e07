//! Plan & Step Models
//!
//! Value types for action plans: the plan itself, its steps, the execution
//! model used to schedule them, and per-step retry policy.
//!
//! Plans are immutable value graphs. Adapting a plan produces a new plan with
//! a new id; steps are compared and hashed by id only.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Enums
// ============================================================================

/// Scheduling strategy for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModel {
    /// Declared order, one step at a time.
    #[default]
    Sequential,
    /// Every step at once; declared dependencies are ignored.
    Parallel,
    /// Topological batches; a step starts once all its dependencies finished.
    Dag,
}

impl ExecutionModel {
    /// Lenient parse used for generated text ("DAG", " parallel ", ...).
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "serial" | "linear" => Some(ExecutionModel::Sequential),
            "parallel" | "concurrent" => Some(ExecutionModel::Parallel),
            "dag" | "graph" => Some(ExecutionModel::Dag),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionModel::Sequential => write!(f, "sequential"),
            ExecutionModel::Parallel => write!(f, "parallel"),
            ExecutionModel::Dag => write!(f, "dag"),
        }
    }
}

/// Lifecycle status shared by plans and plan executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "pending"),
            PlanStatus::Running => write!(f, "running"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Failed => write!(f, "failed"),
            PlanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a sequential execution does after a step fails for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the execution and mark it failed.
    #[default]
    Abort,
    /// Record the failure and move on to the next step.
    Continue,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Abort => write!(f, "abort"),
            ErrorPolicy::Continue => write!(f, "continue"),
        }
    }
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Per-step retry policy with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = run once).
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub backoff_ms: u64,
    /// Factor applied to the delay for each further retry (>= 1).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            backoff_ms,
            backoff_multiplier,
            on_error: ErrorPolicy::Abort,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, 0, 1.0)
    }

    pub fn with_on_error(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    /// Sleep before retry number `attempt` (1-based):
    /// `backoff_ms * backoff_multiplier^(attempt - 1)`.
    ///
    /// Multipliers below 1 are treated as 1.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.max(1.0);
        let exponent = attempt.saturating_sub(1) as i32;
        let ms = self.backoff_ms as f64 * multiplier.powi(exponent);
        if !ms.is_finite() || ms >= u64::MAX as f64 {
            return Duration::from_millis(u64::MAX);
        }
        Duration::from_millis(ms.round() as u64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoff_multiplier must be >= 1, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, 1000, 2.0)
    }
}

// ============================================================================
// ActionStep
// ============================================================================

/// One unit of work naming an external capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStep {
    /// Unique within the plan
    pub id: String,
    /// Capability name, resolved only at execution time
    pub action_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Ids of steps in the same plan that must finish first
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<ErrorPolicy>,
}

impl ActionStep {
    /// New step with a fresh UUID id.
    pub fn new(action_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_name: action_name.into(),
            parameters: Map::new(),
            dependencies: Vec::new(),
            retry_policy: None,
            on_error: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Add a dependency; duplicates are ignored.
    pub fn with_dependency(mut self, step_id: impl Into<String>) -> Self {
        let step_id = step_id.into();
        if !self.dependencies.contains(&step_id) {
            self.dependencies.push(step_id);
        }
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_on_error(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = Some(on_error);
        self
    }

    /// `on_error` of the step, else of its retry policy, else `default`.
    pub fn effective_on_error(&self, default: ErrorPolicy) -> ErrorPolicy {
        self.on_error
            .or_else(|| self.retry_policy.as_ref().map(|p| p.on_error))
            .unwrap_or(default)
    }
}

impl PartialEq for ActionStep {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActionStep {}

impl Hash for ActionStep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ============================================================================
// ActionPlan
// ============================================================================

/// Descriptive metadata attached to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    /// One note per adaptation that produced this plan's lineage
    #[serde(default)]
    pub adaptations: Vec<String>,
    /// Plan this one was adapted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_plan_id: Option<String>,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            priority: 0,
            tags: Vec::new(),
            adaptations: Vec::new(),
            parent_plan_id: None,
        }
    }
}

/// A goal plus a graph of steps plus the execution model used to run them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub id: String,
    pub goal: String,
    pub steps: Vec<ActionStep>,
    pub execution_model: ExecutionModel,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub metadata: PlanMetadata,
}

/// Tag carried by plans synthesized because the planning text was unusable.
pub const FALLBACK_TAG: &str = "fallback";

impl ActionPlan {
    /// New empty plan with a fresh UUID id.
    pub fn new(goal: impl Into<String>, execution_model: ExecutionModel) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            steps: Vec::new(),
            execution_model,
            status: PlanStatus::Pending,
            metadata: PlanMetadata::default(),
        }
    }

    pub fn with_steps(mut self, steps: Vec<ActionStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_step(mut self, step: ActionStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.metadata.tags.contains(&tag) {
            self.metadata.tags.push(tag);
        }
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.metadata.priority = priority;
        self
    }

    pub fn step(&self, id: &str) -> Option<&ActionStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_ids(&self) -> HashSet<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }

    pub fn is_fallback(&self) -> bool {
        self.has_tag(FALLBACK_TAG)
    }

    /// Human-readable numbered step list.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Plan {} ({}, {})\nGoal: {}\n",
            self.id, self.execution_model, self.status, self.goal
        );
        if self.steps.is_empty() {
            out.push_str("  (no steps)\n");
            return out;
        }
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("  {}. [{}] {}", i + 1, step.id, step.action_name));
            if !step.parameters.is_empty() {
                out.push_str(&format!(" {}", Value::Object(step.parameters.clone())));
            }
            if !step.dependencies.is_empty() {
                out.push_str(&format!(" (after: {})", step.dependencies.join(", ")));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for ActionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl PartialEq for ActionPlan {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActionPlan {}

impl Hash for ActionPlan {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
