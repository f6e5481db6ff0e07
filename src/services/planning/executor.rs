//! Plan Executor
//!
//! Runs the steps of an `ActionPlan` against a `CapabilityRegistry` under the
//! plan's execution model:
//!
//! - `sequential` - declared order, honoring each step's error policy
//! - `parallel` - every step at once, dependencies ignored
//! - `dag` - topological batches; a step starts once all its dependencies
//!   finished, whether they succeeded or not
//!
//! Steps run as tokio tasks. Cancellation is cooperative and only observed
//! between sequential steps and between DAG rounds.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use action_engine_core::{
    Capability, CapabilityContext, CapabilityRegistry, PriorResult, WorkingMemory,
};

use crate::config::PlanningConfig;
use crate::models::execution::{
    ExecutionStatusSnapshot, PlanExecutionResult, StepError, StepErrorKind, StepResult,
};
use crate::models::plan::{ActionPlan, ActionStep, ErrorPolicy, ExecutionModel, PlanStatus, RetryPolicy};

use super::retry::execute_with_retry;

// ============================================================================
// PlanExecution
// ============================================================================

#[derive(Debug)]
struct ExecutionState {
    status: PlanStatus,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    results: Vec<StepResult>,
    errors: Vec<StepError>,
}

/// Live state of one plan execution.
///
/// Owns the working memory shared by the execution's steps and the token
/// used to cancel it.
#[derive(Debug)]
pub struct PlanExecution {
    plan_id: String,
    total_steps: usize,
    state: RwLock<ExecutionState>,
    working_memory: WorkingMemory,
    cancel_token: CancellationToken,
}

impl PlanExecution {
    pub fn new(plan: &ActionPlan) -> Self {
        Self {
            plan_id: plan.id.clone(),
            total_steps: plan.steps.len(),
            state: RwLock::new(ExecutionState {
                status: PlanStatus::Pending,
                started_at: Utc::now(),
                finished_at: None,
                results: Vec::new(),
                errors: Vec::new(),
            }),
            working_memory: WorkingMemory::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working_memory
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub async fn status(&self) -> PlanStatus {
        self.state.read().await.status
    }

    pub async fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.finished_at
    }

    pub async fn snapshot(&self) -> ExecutionStatusSnapshot {
        let state = self.state.read().await;
        ExecutionStatusSnapshot {
            plan_id: self.plan_id.clone(),
            status: state.status,
            started_at: state.started_at,
            completed_steps: state.results.len(),
            total_steps: self.total_steps,
        }
    }

    /// Cancel and mark cancelled right away, without waiting for the
    /// running step to notice.
    pub async fn abort(&self) {
        self.cancel_token.cancel();
        let mut state = self.state.write().await;
        if !state.status.is_terminal() {
            state.status = PlanStatus::Cancelled;
            state.finished_at = Some(Utc::now());
        }
    }

    async fn mark_running(&self) {
        let mut state = self.state.write().await;
        if state.status == PlanStatus::Pending {
            state.status = PlanStatus::Running;
            state.started_at = Utc::now();
        }
    }

    /// Move to `status` unless a terminal status was already set, returning
    /// the status the execution ends with.
    async fn finish(&self, status: PlanStatus) -> PlanStatus {
        let mut state = self.state.write().await;
        if !state.status.is_terminal() {
            state.status = status;
            state.finished_at = Some(Utc::now());
        }
        state.status
    }

    async fn record(&self, outcome: Result<StepResult, StepError>) -> bool {
        let mut state = self.state.write().await;
        match outcome {
            Ok(result) => {
                state.results.push(result);
                true
            }
            Err(error) => {
                tracing::warn!("[PlanExecutor] Plan {}: {}", self.plan_id, error);
                state.errors.push(error);
                false
            }
        }
    }

    async fn prior_results(&self) -> Vec<PriorResult> {
        let state = self.state.read().await;
        state
            .results
            .iter()
            .map(|r| PriorResult {
                step_id: r.step_id.clone(),
                action_name: r.action_name.clone(),
                output: r.output.clone(),
            })
            .collect()
    }
}

// ============================================================================
// StepJob
// ============================================================================

/// Everything a spawned step task needs, owned.
struct StepJob {
    plan_id: String,
    step: ActionStep,
    capability: Option<Arc<dyn Capability>>,
    retry_policy: Option<RetryPolicy>,
    working_memory: WorkingMemory,
    previous_results: Vec<PriorResult>,
}

impl StepJob {
    async fn run(self) -> Result<StepResult, StepError> {
        let StepJob {
            plan_id,
            step,
            capability,
            retry_policy,
            working_memory,
            previous_results,
        } = self;

        let Some(capability) = capability else {
            return Err(StepError::for_step(
                &step.id,
                &step.action_name,
                StepErrorKind::CapabilityNotFound,
                format!("Capability not found: {}", step.action_name),
                0,
            ));
        };

        let start = Instant::now();
        let args = Value::Object(step.parameters.clone());
        let label = format!("step {} ({})", step.id, step.action_name);

        let (outcome, attempts) = execute_with_retry(retry_policy.as_ref(), &label, |attempt| {
            let ctx = CapabilityContext::new(&plan_id, &step.id, &step.action_name)
                .with_attempt(attempt)
                .with_working_memory(working_memory.clone())
                .with_previous_results(previous_results.clone());
            let capability = capability.clone();
            let args = args.clone();
            async move { capability.execute(&ctx, args).await }
        })
        .await;

        match outcome {
            Ok(output) => Ok(StepResult {
                step_id: step.id,
                action_name: step.action_name,
                output,
                attempts,
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(e) => Err(StepError::for_step(
                step.id,
                step.action_name,
                StepErrorKind::HandlerFailed,
                e.to_string(),
                attempts,
            )),
        }
    }
}

/// How a strategy run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Finished,
    Aborted,
    Cancelled,
}

// ============================================================================
// PlanExecutor
// ============================================================================

/// Executes plans against a capability registry.
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    registry: Arc<CapabilityRegistry>,
    default_retry_policy: Option<RetryPolicy>,
    default_on_error: ErrorPolicy,
}

impl PlanExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            default_retry_policy: None,
            default_on_error: ErrorPolicy::Abort,
        }
    }

    pub fn from_config(registry: Arc<CapabilityRegistry>, config: &PlanningConfig) -> Self {
        Self::new(registry)
            .with_default_retry_policy(config.default_retry_policy.clone())
            .with_default_on_error(config.default_on_error)
    }

    /// Policy for steps that declare none.
    pub fn with_default_retry_policy(mut self, policy: Option<RetryPolicy>) -> Self {
        self.default_retry_policy = policy;
        self
    }

    /// Error policy when neither the step nor its retry policy sets one.
    pub fn with_default_on_error(mut self, on_error: ErrorPolicy) -> Self {
        self.default_on_error = on_error;
        self
    }

    /// Run `plan` to a terminal status, recording into `execution`.
    pub async fn execute(
        &self,
        plan: &ActionPlan,
        execution: Arc<PlanExecution>,
    ) -> PlanExecutionResult {
        let start = Instant::now();
        execution.mark_running().await;

        tracing::info!(
            "[PlanExecutor] Executing plan {} ({} steps, {})",
            plan.id,
            plan.steps.len(),
            plan.execution_model
        );

        let outcome = match plan.execution_model {
            ExecutionModel::Sequential => self.run_sequential(plan, &execution).await,
            ExecutionModel::Parallel => self.run_parallel(plan, &execution).await,
            ExecutionModel::Dag => self.run_dag(plan, &execution).await,
        };

        let has_errors = !execution.state.read().await.errors.is_empty();
        let status = match outcome {
            RunOutcome::Cancelled => PlanStatus::Cancelled,
            RunOutcome::Aborted => PlanStatus::Failed,
            RunOutcome::Finished if has_errors => PlanStatus::Failed,
            RunOutcome::Finished => PlanStatus::Completed,
        };
        let status = execution.finish(status).await;

        let state = execution.state.read().await;
        let result = PlanExecutionResult {
            plan_id: plan.id.clone(),
            success: state.errors.is_empty() && status != PlanStatus::Cancelled,
            completed_steps: state.results.len(),
            total_steps: plan.steps.len(),
            results: state.results.clone(),
            errors: state.errors.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            status,
        };

        tracing::info!(
            "[PlanExecutor] Plan {} {} ({}/{} steps, {} errors, {}ms)",
            plan.id,
            result.status,
            result.completed_steps,
            result.total_steps,
            result.errors.len(),
            result.duration_ms
        );

        result
    }

    async fn job(&self, plan: &ActionPlan, step: &ActionStep, execution: &PlanExecution) -> StepJob {
        StepJob {
            plan_id: plan.id.clone(),
            step: step.clone(),
            capability: self.registry.get(&step.action_name),
            retry_policy: step
                .retry_policy
                .clone()
                .or_else(|| self.default_retry_policy.clone()),
            working_memory: execution.working_memory.clone(),
            previous_results: execution.prior_results().await,
        }
    }

    /// Await a spawned step, mapping a panicked task to a step error.
    async fn join(
        step: &ActionStep,
        handle: JoinHandle<Result<StepResult, StepError>>,
    ) -> Result<StepResult, StepError> {
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(StepError::for_step(
                &step.id,
                &step.action_name,
                StepErrorKind::TaskPanicked,
                format!("Step task failed: {}", e),
                0,
            )),
        }
    }

    async fn run_sequential(&self, plan: &ActionPlan, execution: &PlanExecution) -> RunOutcome {
        for (index, step) in plan.steps.iter().enumerate() {
            if execution.is_cancelled() {
                tracing::info!(
                    "[PlanExecutor] Plan {} cancelled before step {}",
                    plan.id,
                    index + 1
                );
                return RunOutcome::Cancelled;
            }

            let job = self.job(plan, step, execution).await;
            let handle = tokio::spawn(job.run());
            let ok = execution.record(Self::join(step, handle).await).await;

            if !ok && step.effective_on_error(self.default_on_error) == ErrorPolicy::Abort {
                tracing::info!(
                    "[PlanExecutor] Aborting plan {} after step {} failed",
                    plan.id,
                    step.id
                );
                return RunOutcome::Aborted;
            }
        }
        RunOutcome::Finished
    }

    async fn run_parallel(&self, plan: &ActionPlan, execution: &PlanExecution) -> RunOutcome {
        if execution.is_cancelled() {
            return RunOutcome::Cancelled;
        }

        tracing::debug!(
            "[PlanExecutor] Dispatching {} steps of plan {} in parallel",
            plan.steps.len(),
            plan.id
        );

        let mut handles = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let job = self.job(plan, step, execution).await;
            handles.push(tokio::spawn(job.run()));
        }

        // Join in declared order so results keep it
        for (step, handle) in plan.steps.iter().zip(handles) {
            execution.record(Self::join(step, handle).await).await;
        }
        RunOutcome::Finished
    }

    async fn run_dag(&self, plan: &ActionPlan, execution: &PlanExecution) -> RunOutcome {
        let mut completed: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&ActionStep> = plan.steps.iter().collect();
        let mut round = 0usize;

        while !pending.is_empty() {
            if execution.is_cancelled() {
                tracing::info!(
                    "[PlanExecutor] Plan {} cancelled before round {}",
                    plan.id,
                    round + 1
                );
                return RunOutcome::Cancelled;
            }

            let (ready, rest): (Vec<&ActionStep>, Vec<&ActionStep>) = pending
                .into_iter()
                .partition(|s| s.dependencies.iter().all(|d| completed.contains(d.as_str())));

            if ready.is_empty() {
                let stuck: Vec<String> = rest.iter().map(|s| s.id.clone()).collect();
                execution.record(Err(StepError::deadlock(&stuck))).await;
                return RunOutcome::Aborted;
            }

            round += 1;
            tracing::debug!(
                "[PlanExecutor] Plan {} round {}: dispatching {} step(s)",
                plan.id,
                round,
                ready.len()
            );

            let mut handles = Vec::with_capacity(ready.len());
            for step in &ready {
                let job = self.job(plan, step, execution).await;
                handles.push(tokio::spawn(job.run()));
            }

            for (step, handle) in ready.iter().zip(handles) {
                execution.record(Self::join(step, handle).await).await;
                completed.insert(step.id.as_str());
            }

            pending = rest;
        }
        RunOutcome::Finished
    }
}
