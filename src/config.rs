//! Planning Configuration
//!
//! Tunables for plan creation, adaptation and execution, persisted as a
//! pretty-printed JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use action_engine_llm::GenerateOptions;

use crate::models::plan::{ErrorPolicy, ExecutionModel, RetryPolicy};
use crate::utils::error::{EngineError, EngineResult};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Execution model when neither the context nor the text picks one
    #[serde(default)]
    pub default_execution_model: ExecutionModel,
    /// Upper bound on steps kept from a parsed plan
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_planning_temperature")]
    pub planning_temperature: f32,
    #[serde(default = "default_planning_max_tokens")]
    pub planning_max_tokens: u32,
    #[serde(default = "default_adaptation_temperature")]
    pub adaptation_temperature: f32,
    #[serde(default = "default_adaptation_max_tokens")]
    pub adaptation_max_tokens: u32,
    /// Applied to steps that carry no retry policy of their own
    #[serde(default)]
    pub default_retry_policy: Option<RetryPolicy>,
    /// Applied when neither the step nor its retry policy sets one
    #[serde(default)]
    pub default_on_error: ErrorPolicy,
}

fn default_max_steps() -> usize {
    20
}

fn default_planning_temperature() -> f32 {
    0.3
}

fn default_planning_max_tokens() -> u32 {
    2000
}

fn default_adaptation_temperature() -> f32 {
    0.4
}

fn default_adaptation_max_tokens() -> u32 {
    1500
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            default_execution_model: ExecutionModel::default(),
            max_steps: default_max_steps(),
            planning_temperature: default_planning_temperature(),
            planning_max_tokens: default_planning_max_tokens(),
            adaptation_temperature: default_adaptation_temperature(),
            adaptation_max_tokens: default_adaptation_max_tokens(),
            default_retry_policy: None,
            default_on_error: ErrorPolicy::default(),
        }
    }
}

/// Partial configuration update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningConfigUpdate {
    pub default_execution_model: Option<ExecutionModel>,
    pub max_steps: Option<usize>,
    pub planning_temperature: Option<f32>,
    pub planning_max_tokens: Option<u32>,
    pub adaptation_temperature: Option<f32>,
    pub adaptation_max_tokens: Option<u32>,
    /// `Some(None)` clears the default policy
    pub default_retry_policy: Option<Option<RetryPolicy>>,
    pub default_on_error: Option<ErrorPolicy>,
}

impl PlanningConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: PlanningConfig = serde_json::from_str(&content)?;
        config.validate().map_err(EngineError::config)?;
        Ok(config)
    }

    /// Save configuration to a JSON file with pretty formatting
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        self.validate().map_err(EngineError::config)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Apply a partial update
    pub fn apply_update(&mut self, update: PlanningConfigUpdate) {
        if let Some(model) = update.default_execution_model {
            self.default_execution_model = model;
        }
        if let Some(max_steps) = update.max_steps {
            self.max_steps = max_steps;
        }
        if let Some(temperature) = update.planning_temperature {
            self.planning_temperature = temperature;
        }
        if let Some(max_tokens) = update.planning_max_tokens {
            self.planning_max_tokens = max_tokens;
        }
        if let Some(temperature) = update.adaptation_temperature {
            self.adaptation_temperature = temperature;
        }
        if let Some(max_tokens) = update.adaptation_max_tokens {
            self.adaptation_max_tokens = max_tokens;
        }
        if let Some(policy) = update.default_retry_policy {
            self.default_retry_policy = policy;
        }
        if let Some(on_error) = update.default_on_error {
            self.default_on_error = on_error;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("max_steps must be at least 1".to_string());
        }

        for (name, temperature) in [
            ("planning_temperature", self.planning_temperature),
            ("adaptation_temperature", self.adaptation_temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!(
                    "{} must be between 0.0 and 2.0, got {}",
                    name, temperature
                ));
            }
        }

        if self.planning_max_tokens == 0 || self.adaptation_max_tokens == 0 {
            return Err("max token limits must be at least 1".to_string());
        }

        if let Some(policy) = &self.default_retry_policy {
            policy.validate()?;
        }

        Ok(())
    }

    pub fn planning_options(&self) -> GenerateOptions {
        GenerateOptions::new(self.planning_temperature, self.planning_max_tokens)
    }

    pub fn adaptation_options(&self) -> GenerateOptions {
        GenerateOptions::new(self.adaptation_temperature, self.adaptation_max_tokens)
    }
}
