//! Replanner
//!
//! Produces an adapted plan after a failure: the steps before the failure
//! point are kept, the remainder is replaced by newly generated steps.
//! The original plan is never modified.

use action_engine_llm::TextGenerator;

use crate::config::PlanningConfig;
use crate::models::context::PlanningContext;
use crate::models::execution::StepResult;
use crate::models::plan::{ActionPlan, FALLBACK_TAG};

use super::parser::{fallback_step, parse_plan_text, truncate_steps};
use super::prompts::build_adaptation_prompt;

/// Build an adapted copy of `original`.
///
/// `current_step_index` is clamped to the step count. A generator failure or
/// a response without steps yields a single acknowledgment step as the new
/// tail and tags the plan `fallback`.
pub async fn adapt_plan(
    original: &ActionPlan,
    current_step_index: usize,
    results: &[StepResult],
    error: Option<&str>,
    generator: &dyn TextGenerator,
    config: &PlanningConfig,
) -> ActionPlan {
    let index = current_step_index.min(original.steps.len());

    let mut actions_in_use: Vec<String> = Vec::new();
    for step in &original.steps {
        if !actions_in_use.contains(&step.action_name) {
            actions_in_use.push(step.action_name.clone());
        }
    }
    let ctx = PlanningContext::new(original.goal.clone())
        .with_available_actions(actions_in_use)
        .with_execution_model(original.execution_model);

    let prompt = build_adaptation_prompt(original, index, results, error);
    let tail = match generator
        .generate(&prompt, config.adaptation_options())
        .await
    {
        Ok(text) => {
            let mut steps = parse_plan_text(&text).steps;
            truncate_steps(&mut steps, config.max_steps.saturating_sub(index).max(1));
            steps
        }
        Err(e) => {
            tracing::warn!(
                "[Replanner] Generator '{}' failed for plan {}: {}",
                generator.name(),
                original.id,
                e
            );
            Vec::new()
        }
    };

    let mut adapted = ActionPlan::new(original.goal.clone(), original.execution_model)
        .with_steps(original.steps[..index].to_vec())
        .with_priority(original.metadata.priority);
    adapted.metadata.tags = original.metadata.tags.clone();
    adapted.metadata.adaptations = original.metadata.adaptations.clone();
    adapted.metadata.parent_plan_id = Some(original.id.clone());

    let note = match error {
        Some(error) => format!("Adapted at step {} after error: {}", index, error),
        None => format!("Adapted at step {}", index),
    };

    if tail.is_empty() {
        adapted
            .steps
            .push(fallback_step(&ctx.goal, &ctx.available_actions));
        adapted = adapted.with_tag(FALLBACK_TAG);
        adapted.metadata.adaptations.push(format!("{} (fallback)", note));
    } else {
        adapted.steps.extend(tail);
        adapted.metadata.adaptations.push(note);
    }

    tracing::info!(
        "[Replanner] Adapted plan {} -> {} ({} kept, {} new)",
        original.id,
        adapted.id,
        index,
        adapted.steps.len() - index
    );

    adapted
}
