//! Scheduling Integration Tests
//!
//! Ordering guarantees of the three execution models and the validator's
//! cycle handling, exercised through the public API.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use action_engine::action_engine_core::{CapabilityRegistry, CoreError, FnCapability};
use action_engine::{
    validate_plan, ActionPlan, ActionStep, ErrorPolicy, ExecutionModel, PlanExecution,
    PlanExecutor, PlanStatus, RetryPolicy, ValidationIssue,
};

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(name: &'static str, log: Log, fail: bool) -> FnCapability {
    FnCapability::new(name, move |ctx, _args| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(format!("start:{}", ctx.step_id()));
            tokio::time::sleep(Duration::from_millis(15)).await;
            log.lock().unwrap().push(format!("end:{}", ctx.step_id()));
            if fail {
                Err(CoreError::capability(format!("{} failed", ctx.step_id())))
            } else {
                Ok(json!(ctx.step_id()))
            }
        }
    })
}

fn executor(log: &Log) -> PlanExecutor {
    let registry = CapabilityRegistry::new()
        .with(Arc::new(recorder("work", log.clone(), false)))
        .with(Arc::new(recorder("fail", log.clone(), true)));
    PlanExecutor::new(Arc::new(registry))
}

fn at(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{entry} not in {log:?}"))
}

#[tokio::test]
async fn test_diamond_dag_ordering() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let exec = executor(&log);
    let plan = ActionPlan::new("diamond", ExecutionModel::Dag)
        .with_step(ActionStep::new("work").with_id("A"))
        .with_step(ActionStep::new("work").with_id("B").with_dependency("A"))
        .with_step(ActionStep::new("fail").with_id("C").with_dependency("A"))
        .with_step(
            ActionStep::new("work")
                .with_id("D")
                .with_dependency("B")
                .with_dependency("C"),
        );

    assert!(validate_plan(&plan, None).ok);
    let result = exec.execute(&plan, Arc::new(PlanExecution::new(&plan))).await;

    let log = log.lock().unwrap();
    // B and C run concurrently once A is done
    assert!(at(&log, "end:A") < at(&log, "start:B"));
    assert!(at(&log, "start:C") < at(&log, "end:B"));
    // D waits for both, even though C failed
    assert!(at(&log, "end:B") < at(&log, "start:D"));
    assert!(at(&log, "end:C") < at(&log, "start:D"));

    assert_eq!(result.completed_steps, 3);
    assert_eq!(result.errors.len(), 1);
    assert!(!result.success);
}

#[tokio::test]
async fn test_sequential_abort_prevents_later_steps() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let exec = executor(&log);
    let plan = ActionPlan::new("abort", ExecutionModel::Sequential)
        .with_step(ActionStep::new("work").with_id("one"))
        .with_step(
            ActionStep::new("fail")
                .with_id("two")
                .with_on_error(ErrorPolicy::Abort),
        )
        .with_step(ActionStep::new("work").with_id("three"));

    let result = exec.execute(&plan, Arc::new(PlanExecution::new(&plan))).await;

    assert!(!result.success);
    assert_eq!(result.status, PlanStatus::Failed);
    assert!(!log.lock().unwrap().iter().any(|e| e.ends_with(":three")));
}

#[tokio::test]
async fn test_retry_timing_through_executor() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let exec = executor(&log);
    let plan = ActionPlan::new("retry", ExecutionModel::Sequential).with_step(
        ActionStep::new("fail")
            .with_id("r")
            .with_retry_policy(RetryPolicy::new(2, 10, 2.0)),
    );

    let started = Instant::now();
    let result = exec.execute(&plan, Arc::new(PlanExecution::new(&plan))).await;

    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(result.errors[0].attempts, 3);
    let starts = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.as_str() == "start:r")
        .count();
    assert_eq!(starts, 3);
}

#[tokio::test]
async fn test_cycle_only_rejected_for_dag() {
    let steps = vec![
        ActionStep::new("work").with_id("A").with_dependency("B"),
        ActionStep::new("work").with_id("B").with_dependency("A"),
    ];

    let dag = ActionPlan::new("cycle", ExecutionModel::Dag).with_steps(steps.clone());
    let report = validate_plan(&dag, None);
    assert!(!report.ok);
    assert!(report
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::CircularDependency(_))));

    let sequential = ActionPlan::new("cycle", ExecutionModel::Sequential).with_steps(steps);
    assert!(validate_plan(&sequential, None).ok);

    // Executing the cyclic DAG anyway ends in a scheduling deadlock
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let result = executor(&log)
        .execute(&dag, Arc::new(PlanExecution::new(&dag)))
        .await;
    assert_eq!(result.status, PlanStatus::Failed);
    assert!(log.lock().unwrap().is_empty());
}
