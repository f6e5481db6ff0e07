//! End-to-End Planning Tests
//!
//! Drive the full pipeline through `PlanningService`: generate a plan from
//! scripted text, validate it, execute it against real capabilities, then
//! adapt and re-run after a failure.

use std::sync::Arc;

use serde_json::{json, Value};

use action_engine::action_engine_core::{CapabilityRegistry, CoreError, FnCapability};
use action_engine::action_engine_llm::ScriptedGenerator;
use action_engine::{
    ExecutionModel, PlanStatus, PlanningConfig, PlanningContext, PlanningService, StepErrorKind,
};

const SUM_THEN_LOG: &str = r#"
Here is the plan:
<plan>
<goal>Add two numbers and take the natural log of the sum</goal>
<execution_model>dag</execution_model>
<step>
<id>sum</id>
<action>sum_two_elements</action>
<parameters>{"a": 2, "b": 3}</parameters>
<dependencies>[]</dependencies>
</step>
<step>
<id>log</id>
<action>compute_log</action>
<parameters>{}</parameters>
<dependencies>["sum"]</dependencies>
</step>
</plan>
"#;

fn math_registry() -> Arc<CapabilityRegistry> {
    let sum = FnCapability::new("sum_two_elements", |_ctx, args| async move {
        let a = args["a"]
            .as_f64()
            .ok_or_else(|| CoreError::invalid_parameters("missing 'a'"))?;
        let b = args["b"]
            .as_f64()
            .ok_or_else(|| CoreError::invalid_parameters("missing 'b'"))?;
        Ok::<_, CoreError>(json!(a + b))
    })
    .with_description("Add two numbers");

    let log = FnCapability::new("compute_log", |ctx, args| async move {
        let value = match args.get("value").and_then(Value::as_f64) {
            Some(v) => v,
            None => ctx
                .previous_results()
                .last()
                .and_then(|r| r.output.as_f64())
                .ok_or_else(|| CoreError::invalid_parameters("no input value"))?,
        };
        if value <= 0.0 {
            return Err(CoreError::capability(format!("log of non-positive {}", value)));
        }
        Ok::<_, CoreError>(json!(value.ln()))
    })
    .with_description("Natural logarithm of a value");

    Arc::new(
        CapabilityRegistry::new()
            .with(Arc::new(sum))
            .with(Arc::new(log)),
    )
}

fn started(generator: ScriptedGenerator) -> PlanningService {
    let service = PlanningService::new(PlanningConfig::default())
        .with_generator(Arc::new(generator))
        .with_registry(math_registry());
    service.start().unwrap();
    service
}

#[tokio::test]
async fn test_sum_then_log() {
    let service = started(ScriptedGenerator::new().with_response(SUM_THEN_LOG));
    let ctx = PlanningContext::new("sum 2 and 3, then take the log")
        .with_available_actions(["sum_two_elements", "compute_log"]);

    let plan = service.create_plan(&ctx).await.unwrap();
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.execution_model, ExecutionModel::Dag);

    let report = service.validate_plan(&plan);
    assert!(report.ok, "{}", report);

    let result = service.execute_plan(&plan).await.unwrap();
    assert!(result.success);
    assert_eq!(result.completed_steps, 2);
    assert_eq!(result.total_steps, 2);
    assert_eq!(result.status, PlanStatus::Completed);

    let log_output = result.results[1].output.as_f64().unwrap();
    assert!((log_output - 5f64.ln()).abs() < 1e-9);
}

#[tokio::test]
async fn test_echo_handlers_complete_generated_plan() {
    let echo_registry = Arc::new(
        CapabilityRegistry::new()
            .with(Arc::new(FnCapability::new(
                "sum_two_elements",
                |_ctx, args| async move { Ok(args) },
            )))
            .with(Arc::new(FnCapability::new(
                "compute_log",
                |_ctx, args| async move { Ok(args) },
            ))),
    );
    let service = PlanningService::new(PlanningConfig::default())
        .with_generator(Arc::new(ScriptedGenerator::always(SUM_THEN_LOG)))
        .with_registry(echo_registry);
    service.start().unwrap();

    let plan = service
        .create_plan(&PlanningContext::new("sum then log"))
        .await
        .unwrap();
    let result = service.execute_plan(&plan).await.unwrap();

    assert!(result.success);
    assert_eq!(result.completed_steps, 2);
    assert_eq!(result.results[0].output, json!({ "a": 2, "b": 3 }));
}

#[tokio::test]
async fn test_failure_then_adapt_and_rerun() {
    let failing_plan = r#"
<step><id>1</id><action>sum_two_elements</action><parameters>{"a": -4, "b": 1}</parameters></step>
<step><id>2</id><action>compute_log</action><dependencies>["1"]</dependencies></step>
"#;
    let repair = r#"
<step><id>fix</id><action>compute_log</action><parameters>{"value": 3}</parameters></step>
"#;
    let service = started(
        ScriptedGenerator::new()
            .with_response(failing_plan)
            .with_response(repair),
    );

    let ctx = PlanningContext::new("log of a sum").with_execution_model(ExecutionModel::Sequential);
    let plan = service.create_plan(&ctx).await.unwrap();

    let first = service.execute_plan(&plan).await.unwrap();
    assert!(!first.success);
    assert_eq!(first.status, PlanStatus::Failed);
    assert_eq!(first.completed_steps, 1);
    let error = &first.errors[0];
    assert_eq!(error.kind, StepErrorKind::HandlerFailed);
    assert!(error.message.contains("non-positive"));

    let adapted = service
        .adapt_plan(&plan, first.completed_steps, &first.results, Some(&error.message))
        .await
        .unwrap();
    assert_eq!(adapted.steps.len(), 2);
    assert_eq!(adapted.steps[0].id, plan.steps[0].id);
    assert_eq!(adapted.metadata.parent_plan_id.as_deref(), Some(plan.id.as_str()));

    let second = service.execute_plan(&adapted).await.unwrap();
    assert!(second.success, "{:?}", second.errors);
    assert!((second.results[1].output.as_f64().unwrap() - 3f64.ln()).abs() < 1e-9);

    // Original plan keeps its failed status, adapted one completed
    assert_eq!(
        service.get_plan(&plan.id).await.map(|p| p.status),
        Some(PlanStatus::Failed)
    );
    assert_eq!(
        service.get_plan(&adapted.id).await.map(|p| p.status),
        Some(PlanStatus::Completed)
    );
}

#[tokio::test]
async fn test_five_step_adaptation_keeps_prefix() {
    let five = (1..=5)
        .map(|i| {
            format!(
                "<step><id>{i}</id><action>sum_two_elements</action>\
                 <parameters>{{\"a\": {i}, \"b\": 1}}</parameters></step>"
            )
        })
        .collect::<String>();
    let two = "<step><id>x</id><action>compute_log</action></step>\
               <step><id>y</id><action>compute_log</action></step>";
    let service = started(ScriptedGenerator::new().with_response(five).with_response(two));

    let plan = service
        .create_plan(&PlanningContext::new("five sums"))
        .await
        .unwrap();
    assert_eq!(plan.steps.len(), 5);

    let adapted = service.adapt_plan(&plan, 2, &[], None).await.unwrap();
    assert_eq!(adapted.steps.len(), 4);
    assert_eq!(adapted.steps[0].id, plan.steps[0].id);
    assert_eq!(adapted.steps[1].id, plan.steps[1].id);
    assert_eq!(plan.steps.len(), 5);
}

#[tokio::test]
async fn test_garbage_generation_still_yields_plan() {
    let service = started(ScriptedGenerator::always("I'm not sure what you mean."));
    let plan = service
        .create_plan(&PlanningContext::new("do something"))
        .await
        .unwrap();

    assert!(!plan.steps.is_empty());
    assert!(plan.is_fallback());
    assert_eq!(service.list_plans().await.len(), 1);
}
