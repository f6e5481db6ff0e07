//! Planning Service
//!
//! Facade over the planner, validator, executor and replanner. One instance
//! per agent or session; it owns the plans it created and the executions
//! currently in flight.
//!
//! Each execution runs on its own tokio task that also performs the registry
//! cleanup, so an execution still reaches a terminal status and leaves the
//! registry when the caller stops awaiting `execute_plan` (for example under
//! `tokio::time::timeout`) and cancels it with `cancel_plan`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use action_engine_core::CapabilityRegistry;
use action_engine_llm::TextGenerator;

use crate::config::PlanningConfig;
use crate::models::context::PlanningContext;
use crate::models::execution::{ExecutionStatusSnapshot, PlanExecutionResult, StepResult};
use crate::models::plan::{ActionPlan, PlanStatus};
use crate::utils::error::{EngineError, EngineResult};

use super::executor::{PlanExecution, PlanExecutor};
use super::parser::{fallback_plan, parse_plan, simple_plan};
use super::prompts::build_planning_prompt;
use super::replanner;
use super::validator::{validate_plan, ValidationReport};

type PlanMap = Arc<RwLock<HashMap<String, ActionPlan>>>;
type ExecutionMap = Arc<RwLock<HashMap<String, Arc<PlanExecution>>>>;

/// Plan lifecycle facade.
pub struct PlanningService {
    config: PlanningConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    registry: Option<Arc<CapabilityRegistry>>,
    running: AtomicBool,
    active_plans: PlanMap,
    executions: ExecutionMap,
}

impl PlanningService {
    /// Create a stopped service.
    pub fn new(config: PlanningConfig) -> Self {
        Self {
            config,
            generator: None,
            registry: None,
            running: AtomicBool::new(false),
            active_plans: Arc::new(RwLock::new(HashMap::new())),
            executions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_registry(mut self, registry: Arc<CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    pub fn registry(&self) -> Option<&Arc<CapabilityRegistry>> {
        self.registry.as_ref()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Validate configuration and start accepting work.
    pub fn start(&self) -> EngineResult<()> {
        self.config.validate().map_err(EngineError::config)?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "[PlanningService] Started (generator: {}, capabilities: {})",
            self.generator.as_ref().map(|g| g.name()).unwrap_or("none"),
            self.registry.as_ref().map(|r| r.len()).unwrap_or(0)
        );
        Ok(())
    }

    /// Cancel every running execution and drop all plans.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        let executions: Vec<Arc<PlanExecution>> = {
            let mut map = self.executions.write().await;
            map.drain().map(|(_, e)| e).collect()
        };
        for execution in &executions {
            execution.abort().await;
        }

        let plan_count = {
            let mut plans = self.active_plans.write().await;
            let n = plans.len();
            plans.clear();
            n
        };

        tracing::info!(
            "[PlanningService] Stopped ({} executions cancelled, {} plans dropped)",
            executions.len(),
            plan_count
        );
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(EngineError::NotRunning)
        }
    }

    fn generator(&self) -> EngineResult<&Arc<dyn TextGenerator>> {
        self.generator.as_ref().ok_or(EngineError::MissingGenerator)
    }

    fn available_actions(&self) -> Vec<String> {
        self.registry
            .as_ref()
            .map(|r| r.names())
            .unwrap_or_default()
    }

    async fn register(&self, plan: ActionPlan) -> ActionPlan {
        self.active_plans
            .write()
            .await
            .insert(plan.id.clone(), plan.clone());
        plan
    }

    // ========================================================================
    // Plan creation
    // ========================================================================

    /// Generate a plan for `ctx` with the configured text generator.
    ///
    /// A generator failure degrades to a fallback plan instead of an error.
    pub async fn create_plan(&self, ctx: &PlanningContext) -> EngineResult<ActionPlan> {
        self.ensure_running()?;
        ctx.validate().map_err(EngineError::context)?;
        let generator = self.generator()?;

        let prompt = build_planning_prompt(ctx);
        let plan = match generator
            .generate(&prompt, self.config.planning_options())
            .await
        {
            Ok(text) => parse_plan(&text, ctx, &self.config),
            Err(e) => fallback_plan(ctx, &self.config, &format!("generation failed: {}", e)),
        };

        tracing::info!(
            "[PlanningService] Created plan {} for goal '{}' ({} steps)",
            plan.id,
            plan.goal,
            plan.steps.len()
        );
        Ok(self.register(plan).await)
    }

    /// Build a plan from already generated planning text.
    pub async fn create_plan_from_text(
        &self,
        ctx: &PlanningContext,
        text: &str,
    ) -> EngineResult<ActionPlan> {
        self.ensure_running()?;
        ctx.validate().map_err(EngineError::context)?;
        Ok(self.register(parse_plan(text, ctx, &self.config)).await)
    }

    /// Keyword-heuristic plan for a free-text message.
    pub async fn create_simple_plan(&self, message: &str) -> EngineResult<ActionPlan> {
        self.ensure_running()?;
        let plan = simple_plan(message, &self.available_actions());
        Ok(self.register(plan).await)
    }

    /// Check a plan against the service's capability registry.
    pub fn validate_plan(&self, plan: &ActionPlan) -> ValidationReport {
        validate_plan(plan, self.registry.as_deref())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute a plan to completion.
    ///
    /// Step failures are reported in the result, not as `Err`. The run
    /// continues in the background if this future is dropped; use
    /// `cancel_plan` to stop it.
    pub async fn execute_plan(&self, plan: &ActionPlan) -> EngineResult<PlanExecutionResult> {
        self.ensure_running()?;
        let registry = self.registry.clone().ok_or(EngineError::MissingRegistry)?;

        {
            let mut plans = self.active_plans.write().await;
            plans
                .entry(plan.id.clone())
                .or_insert_with(|| plan.clone())
                .status = PlanStatus::Running;
        }

        let execution = Arc::new(PlanExecution::new(plan));
        self.executions
            .write()
            .await
            .insert(plan.id.clone(), execution.clone());

        let executor = PlanExecutor::from_config(registry, &self.config);
        let plan = plan.clone();
        let active_plans = self.active_plans.clone();
        let executions = self.executions.clone();

        let handle = tokio::spawn(async move {
            let result = executor.execute(&plan, execution.clone()).await;

            // Not reinserted when stop() dropped the plan meanwhile
            if let Some(stored) = active_plans.write().await.get_mut(&plan.id) {
                stored.status = result.status;
            }

            let mut executions = executions.write().await;
            if executions
                .get(&plan.id)
                .is_some_and(|current| Arc::ptr_eq(current, &execution))
            {
                executions.remove(&plan.id);
            }
            drop(executions);

            result
        });

        Ok(handle.await?)
    }

    /// Replace the unexecuted remainder of `plan` with newly generated steps.
    pub async fn adapt_plan(
        &self,
        plan: &ActionPlan,
        current_step_index: usize,
        results: &[StepResult],
        error: Option<&str>,
    ) -> EngineResult<ActionPlan> {
        self.ensure_running()?;
        let generator = self.generator()?;

        let adapted = replanner::adapt_plan(
            plan,
            current_step_index,
            results,
            error,
            generator.as_ref(),
            &self.config,
        )
        .await;
        Ok(self.register(adapted).await)
    }

    /// Request cancellation of a running execution.
    ///
    /// Returns `false` when no execution is registered for `plan_id`.
    pub async fn cancel_plan(&self, plan_id: &str) -> bool {
        match self.executions.read().await.get(plan_id) {
            Some(execution) => {
                tracing::info!("[PlanningService] Cancelling execution of plan {}", plan_id);
                execution.cancel();
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_plan(&self, plan_id: &str) -> Option<ActionPlan> {
        self.active_plans.read().await.get(plan_id).cloned()
    }

    /// All registered plans, oldest first.
    pub async fn list_plans(&self) -> Vec<ActionPlan> {
        let mut plans: Vec<ActionPlan> = self.active_plans.read().await.values().cloned().collect();
        plans.sort_by(|a, b| a.metadata.created_at.cmp(&b.metadata.created_at));
        plans
    }

    pub async fn remove_plan(&self, plan_id: &str) -> Option<ActionPlan> {
        self.active_plans.write().await.remove(plan_id)
    }

    /// Status of an in-flight execution; `None` once it has finished.
    pub async fn get_status(&self, plan_id: &str) -> Option<ExecutionStatusSnapshot> {
        let execution = self.executions.read().await.get(plan_id).cloned()?;
        Some(execution.snapshot().await)
    }

    pub async fn active_execution_count(&self) -> usize {
        self.executions.read().await.len()
    }
}
