//! Planning Context
//!
//! Input to plan creation: the goal, the constraints the plan must respect,
//! the capability names the planner may use, and caller preferences.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::ExecutionModel;

/// A restriction the generated plan should honor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConstraint {
    /// e.g. "time", "resource", "custom"
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PlanningConstraint {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Caller preferences; anything unset falls back to configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_model: Option<ExecutionModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    /// Advisory; enforcement is up to the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Everything the planner needs to turn a goal into a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningContext {
    pub goal: String,
    #[serde(default)]
    pub constraints: Vec<PlanningConstraint>,
    #[serde(default)]
    pub available_actions: Vec<String>,
    #[serde(default)]
    pub preferences: PlanningPreferences,
    /// Originating user message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PlanningContext {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Default::default()
        }
    }

    pub fn with_constraint(mut self, constraint: PlanningConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_available_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_execution_model(mut self, model: ExecutionModel) -> Self {
        self.preferences.execution_model = Some(model);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.preferences.max_steps = Some(max_steps);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.preferences.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Structural checks performed before any planning work starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.goal.trim().is_empty() {
            return Err("goal must not be empty".to_string());
        }

        for (i, constraint) in self.constraints.iter().enumerate() {
            if constraint.kind.trim().is_empty() {
                return Err(format!("constraint {} has an empty kind", i));
            }
            if constraint.description.trim().is_empty() {
                return Err(format!("constraint {} has an empty description", i));
            }
        }

        let mut seen = HashSet::new();
        for action in &self.available_actions {
            if action.trim().is_empty() {
                return Err("available actions must be non-empty names".to_string());
            }
            if !seen.insert(action.as_str()) {
                return Err(format!("duplicate available action: {}", action));
            }
        }

        if self.preferences.max_steps == Some(0) {
            return Err("max_steps must be at least 1".to_string());
        }

        Ok(())
    }
}
