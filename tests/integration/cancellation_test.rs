//! Cancellation Integration Tests
//!
//! Cancel running executions through the service facade and check that
//! they stop at the next step boundary.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;

use action_engine::action_engine_core::{CapabilityRegistry, FnCapability};
use action_engine::{
    ActionPlan, ActionStep, ExecutionModel, PlanStatus, PlanningConfig, PlanningService,
};

/// Capability that signals when it starts and waits for a release.
struct Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
    ran: Arc<Mutex<Vec<String>>>,
}

impl Gate {
    fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            ran: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn capability(&self) -> FnCapability {
        let (started, release, ran) = (
            self.started.clone(),
            self.release.clone(),
            self.ran.clone(),
        );
        FnCapability::new("wait", move |ctx, _args| {
            let (started, release, ran) = (started.clone(), release.clone(), ran.clone());
            async move {
                ran.lock().unwrap().push(ctx.step_id().to_string());
                started.notify_one();
                release.notified().await;
                Ok(Value::Null)
            }
        })
    }

    fn ran(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

fn service(gate: &Gate) -> Arc<PlanningService> {
    let registry = CapabilityRegistry::new().with(Arc::new(gate.capability()));
    let service = PlanningService::new(PlanningConfig::default()).with_registry(Arc::new(registry));
    service.start().unwrap();
    Arc::new(service)
}

fn three_steps(model: ExecutionModel) -> ActionPlan {
    ActionPlan::new("wait three times", model)
        .with_step(ActionStep::new("wait").with_id("s1"))
        .with_step(ActionStep::new("wait").with_id("s2").with_dependency("s1"))
        .with_step(ActionStep::new("wait").with_id("s3").with_dependency("s2"))
}

#[tokio::test]
async fn test_cancel_sequential_stops_before_next_step() {
    let gate = Gate::new();
    let service = service(&gate);
    let plan = three_steps(ExecutionModel::Sequential);

    let task = {
        let service = service.clone();
        let plan = plan.clone();
        tokio::spawn(async move { service.execute_plan(&plan).await })
    };

    gate.started.notified().await;
    let status = service.get_status(&plan.id).await.unwrap();
    assert_eq!(status.status, PlanStatus::Running);
    assert_eq!(status.total_steps, 3);
    assert_eq!(service.active_execution_count().await, 1);

    assert!(service.cancel_plan(&plan.id).await);
    gate.release.notify_one();

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.status, PlanStatus::Cancelled);
    assert!(!result.success);
    assert!(result.errors.is_empty());
    assert_eq!(result.completed_steps, 1);
    assert_eq!(gate.ran(), vec!["s1"]);

    assert_eq!(service.active_execution_count().await, 0);
    assert!(!service.cancel_plan(&plan.id).await);
    assert_eq!(
        service.get_plan(&plan.id).await.map(|p| p.status),
        Some(PlanStatus::Cancelled)
    );
}

#[tokio::test]
async fn test_cancel_dag_stops_between_rounds() {
    let gate = Gate::new();
    let service = service(&gate);
    let plan = three_steps(ExecutionModel::Dag);

    let task = {
        let service = service.clone();
        let plan = plan.clone();
        tokio::spawn(async move { service.execute_plan(&plan).await })
    };

    gate.started.notified().await;
    assert!(service.cancel_plan(&plan.id).await);
    gate.release.notify_one();

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.status, PlanStatus::Cancelled);
    assert_eq!(gate.ran(), vec!["s1"]);
}

#[tokio::test]
async fn test_stop_cancels_running_executions() {
    let gate = Gate::new();
    let service = service(&gate);
    let plan = three_steps(ExecutionModel::Sequential);

    let task = {
        let service = service.clone();
        let plan = plan.clone();
        tokio::spawn(async move { service.execute_plan(&plan).await })
    };

    gate.started.notified().await;
    service.stop().await;
    assert!(!service.is_running());
    assert_eq!(service.active_execution_count().await, 0);
    gate.release.notify_one();

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.status, PlanStatus::Cancelled);
    assert_eq!(result.completed_steps, 1);

    // The plan is gone and is not re-registered by the finishing execution
    assert!(service.get_plan(&plan.id).await.is_none());
    assert!(service.list_plans().await.is_empty());
}

#[tokio::test]
async fn test_cancel_after_caller_timeout_clears_execution() {
    let gate = Gate::new();
    let service = service(&gate);
    let plan = three_steps(ExecutionModel::Sequential);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(50), service.execute_plan(&plan)).await;
    assert!(timed_out.is_err());

    gate.started.notified().await;
    assert!(service.cancel_plan(&plan.id).await);
    gate.release.notify_one();

    for _ in 0..100 {
        if service.active_execution_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(service.active_execution_count().await, 0);
    assert!(service.get_status(&plan.id).await.is_none());
    assert_eq!(
        service.get_plan(&plan.id).await.map(|p| p.status),
        Some(PlanStatus::Cancelled)
    );
    assert_eq!(gate.ran(), vec!["s1"]);
}
