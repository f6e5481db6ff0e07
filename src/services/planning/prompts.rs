//! Planning Prompts
//!
//! Prompt builders for initial plan generation and plan adaptation. Both
//! prompts ask for the XML step-block format understood by the parser.

use crate::models::context::PlanningContext;
use crate::models::execution::StepResult;
use crate::models::plan::ActionPlan;

/// Max characters of a single step output quoted back into a prompt.
pub const MAX_RESULT_CHARS: usize = 500;

const FORMAT_INSTRUCTIONS: &str = "\
## Output Format
Respond with one <step> block per step, in execution order:

<plan>
<goal>restated goal</goal>
<execution_model>sequential | parallel | dag</execution_model>
<step>
<id>step_1</id>
<action>ACTION_NAME</action>
<parameters>{\"key\": \"value\"}</parameters>
<dependencies>[]</dependencies>
</step>
<step>
<id>step_2</id>
<action>ANOTHER_ACTION</action>
<parameters>{}</parameters>
<dependencies>[\"step_1\"]</dependencies>
</step>
</plan>

Use only the listed actions. <parameters> must be a JSON object and
<dependencies> a JSON array of ids of earlier steps.";

/// Prompt asking for an initial plan.
pub fn build_planning_prompt(ctx: &PlanningContext) -> String {
    let mut prompt = String::from(
        "You are an expert planner. Decompose the goal below into a short \
         sequence of concrete actions.\n\n",
    );

    prompt.push_str(&format!("## Goal\n{}\n\n", ctx.goal));

    if let Some(message) = ctx.message.as_deref().filter(|m| !m.trim().is_empty()) {
        prompt.push_str(&format!("## Request\n{}\n\n", message));
    }

    prompt.push_str("## Available Actions\n");
    if ctx.available_actions.is_empty() {
        prompt.push_str("- REPLY\n");
    } else {
        for action in &ctx.available_actions {
            prompt.push_str(&format!("- {}\n", action));
        }
    }
    prompt.push('\n');

    if !ctx.constraints.is_empty() {
        prompt.push_str("## Constraints\n");
        for constraint in &ctx.constraints {
            match &constraint.value {
                Some(value) => prompt.push_str(&format!(
                    "- [{}] {} ({})\n",
                    constraint.kind, constraint.description, value
                )),
                None => prompt.push_str(&format!(
                    "- [{}] {}\n",
                    constraint.kind, constraint.description
                )),
            }
        }
        prompt.push('\n');
    }

    let prefs = &ctx.preferences;
    if prefs.execution_model.is_some() || prefs.max_steps.is_some() || prefs.timeout_ms.is_some() {
        prompt.push_str("## Preferences\n");
        if let Some(model) = prefs.execution_model {
            prompt.push_str(&format!("- Execution model: {}\n", model));
        }
        if let Some(max_steps) = prefs.max_steps {
            prompt.push_str(&format!("- At most {} steps\n", max_steps));
        }
        if let Some(timeout_ms) = prefs.timeout_ms {
            prompt.push_str(&format!("- Should finish within {} ms\n", timeout_ms));
        }
        prompt.push('\n');
    }

    prompt.push_str(FORMAT_INSTRUCTIONS);
    prompt
}

/// Prompt asking for replacement steps after `current_step_index`.
pub fn build_adaptation_prompt(
    original: &ActionPlan,
    current_step_index: usize,
    results: &[StepResult],
    error: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "A plan failed part-way through. Propose replacement steps for the \
         part that has not run yet.\n\n",
    );

    prompt.push_str(&format!("## Original Plan\n{}\n", original.render()));
    prompt.push_str(&format!(
        "## Progress\nSteps 1..{} are kept as they are. Replace everything after them.\n\n",
        current_step_index
    ));

    if !results.is_empty() {
        prompt.push_str("## Completed Results\n");
        for result in results {
            let output = truncate_chars(&result.output.to_string(), MAX_RESULT_CHARS);
            prompt.push_str(&format!(
                "- {} ({}): {}\n",
                result.step_id, result.action_name, output
            ));
        }
        prompt.push('\n');
    }

    if let Some(error) = error {
        prompt.push_str(&format!("## Error\n{}\n\n", error));
    }

    let mut actions: Vec<&str> = Vec::new();
    for step in &original.steps {
        if !actions.contains(&step.action_name.as_str()) {
            actions.push(&step.action_name);
        }
    }
    if !actions.is_empty() {
        prompt.push_str("## Actions In Use\n");
        for action in actions {
            prompt.push_str(&format!("- {}\n", action));
        }
        prompt.push('\n');
    }

    prompt.push_str(FORMAT_INSTRUCTIONS);
    prompt.push_str(
        "\n\nOnly list the new steps. They cannot depend on the kept steps.",
    );
    prompt
}

/// Truncate to at most `max_chars` characters, appending a marker when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}... [truncated]", &text[..byte_idx]),
        None => text.to_string(),
    }
}
