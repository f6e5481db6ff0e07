//! Plan Text Parser
//!
//! Turns generated planning text into an `ActionPlan`. Parsing never fails:
//! text with no recognizable step degrades to a one-step fallback plan.
//!
//! Wire format, one block per step:
//!
//! ```text
//! <step>
//!   <id>step_1</id>
//!   <action>SEARCH</action>
//!   <parameters>{"query": "rust"}</parameters>
//!   <dependencies>[]</dependencies>
//! </step>
//! ```
//!
//! Placeholder ids from the text are replaced by fresh UUIDs; dependencies
//! are resolved through the placeholder mapping once every block is read.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::PlanningConfig;
use crate::models::context::PlanningContext;
use crate::models::plan::{ActionPlan, ActionStep, ExecutionModel, FALLBACK_TAG};

/// Action used when no better acknowledgment action is available.
pub const DEFAULT_REPLY_ACTION: &str = "REPLY";

/// Tag carried by keyword-heuristic plans.
pub const SIMPLE_TAG: &str = "simple";

/// Name fragments of actions that can stand in as a fallback step.
const ACK_ACTION_HINTS: &[&str] = &["reply", "respond", "acknowledge", "analy", "think"];

// ============================================================================
// Patterns
// ============================================================================

struct Patterns {
    step: Regex,
    id: Regex,
    action: Regex,
    parameters: Regex,
    dependencies: Regex,
    goal: Regex,
    execution_model: Regex,
}

fn tag_pattern(tag: &str) -> String {
    format!(r"(?is)<{tag}(?:\s[^>]*)?>(.*?)</{tag}\s*>")
}

/// Compiled tag patterns (initialized once).
fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                step: Regex::new(&tag_pattern("step")).ok()?,
                id: Regex::new(&tag_pattern("id")).ok()?,
                action: Regex::new(&tag_pattern("action")).ok()?,
                parameters: Regex::new(&tag_pattern("parameters")).ok()?,
                dependencies: Regex::new(&tag_pattern("dependencies")).ok()?,
                goal: Regex::new(&tag_pattern("goal")).ok()?,
                execution_model: Regex::new(&tag_pattern("execution_model")).ok()?,
            })
        })
        .as_ref()
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

// ============================================================================
// Raw parsing
// ============================================================================

/// Steps and top-level fields recovered from planning text.
#[derive(Debug, Clone, Default)]
pub struct ParsedPlanText {
    /// Recognized steps with resolved dependencies, in text order
    pub steps: Vec<ActionStep>,
    pub goal: Option<String>,
    pub execution_model: Option<ExecutionModel>,
    /// `<step>` blocks found, recognized or not
    pub blocks_seen: usize,
}

/// Extract steps and top-level fields from planning text.
pub fn parse_plan_text(text: &str) -> ParsedPlanText {
    let Some(p) = patterns() else {
        tracing::warn!("[PlanParser] Tag patterns unavailable, treating text as empty");
        return ParsedPlanText::default();
    };

    let mut parsed = ParsedPlanText::default();
    let mut placeholders: HashMap<String, String> = HashMap::new();
    let mut raw_deps: Vec<Vec<String>> = Vec::new();

    // Top-level fields live outside step blocks
    let outside = p.step.replace_all(text, "");
    parsed.goal = capture(&p.goal, &outside)
        .filter(|g| !g.is_empty())
        .map(str::to_string);
    parsed.execution_model =
        capture(&p.execution_model, &outside).and_then(ExecutionModel::parse_lenient);

    for block in p.step.captures_iter(text) {
        parsed.blocks_seen += 1;
        let body = block.get(1).map(|m| m.as_str()).unwrap_or("");

        let Some(action) = capture(&p.action, body).filter(|a| !a.is_empty()) else {
            tracing::debug!(
                "[PlanParser] Skipping step block {} without an action",
                parsed.blocks_seen
            );
            continue;
        };

        let mut step = ActionStep::new(action);
        if let Some(placeholder) = capture(&p.id, body).filter(|id| !id.is_empty()) {
            placeholders
                .entry(placeholder.to_string())
                .or_insert_with(|| step.id.clone());
        }

        step.parameters = capture(&p.parameters, body)
            .map(decode_parameters)
            .unwrap_or_default();
        raw_deps.push(
            capture(&p.dependencies, body)
                .map(decode_dependencies)
                .unwrap_or_default(),
        );
        parsed.steps.push(step);
    }

    for (step, deps) in parsed.steps.iter_mut().zip(raw_deps) {
        for dep in deps {
            match placeholders.get(&dep) {
                Some(resolved) if *resolved != step.id => {
                    if !step.dependencies.contains(resolved) {
                        step.dependencies.push(resolved.clone());
                    }
                }
                Some(_) => {}
                None => {
                    tracing::debug!(
                        "[PlanParser] Dropping unresolved dependency '{}' of step {}",
                        dep,
                        step.id
                    );
                }
            }
        }
    }

    parsed
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag line
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn decode_parameters(raw: &str) -> Map<String, Value> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::debug!("[PlanParser] Ignoring malformed parameters: {}", body);
            Map::new()
        }
    }
}

fn decode_dependencies(raw: &str) -> Vec<String> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Vec::new();
    }

    if body.contains('[') || body.contains('{') {
        return match serde_json::from_str::<Vec<Value>>(body) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => {
                tracing::debug!("[PlanParser] Ignoring malformed dependencies: {}", body);
                Vec::new()
            }
        };
    }

    body.split(',')
        .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep the first `max_steps` steps and drop dependencies on removed ones.
pub fn truncate_steps(steps: &mut Vec<ActionStep>, max_steps: usize) {
    if steps.len() <= max_steps {
        return;
    }
    tracing::debug!(
        "[PlanParser] Truncating {} steps to {}",
        steps.len(),
        max_steps
    );
    steps.truncate(max_steps);
    let kept: HashSet<String> = steps.iter().map(|s| s.id.clone()).collect();
    for step in steps.iter_mut() {
        step.dependencies.retain(|d| kept.contains(d));
    }
}

// ============================================================================
// Plan construction
// ============================================================================

/// Build a plan from planning text. Never fails.
pub fn parse_plan(text: &str, ctx: &PlanningContext, config: &PlanningConfig) -> ActionPlan {
    let parsed = parse_plan_text(text);

    if parsed.steps.is_empty() {
        let reason = if parsed.blocks_seen == 0 {
            "no step blocks found".to_string()
        } else {
            format!("none of {} step blocks had an action", parsed.blocks_seen)
        };
        return fallback_plan(ctx, config, &reason);
    }

    let execution_model = ctx
        .preferences
        .execution_model
        .or(parsed.execution_model)
        .unwrap_or(config.default_execution_model);

    let goal = if ctx.goal.trim().is_empty() {
        parsed.goal.unwrap_or_default()
    } else {
        ctx.goal.clone()
    };

    let mut steps = parsed.steps;
    truncate_steps(
        &mut steps,
        ctx.preferences.max_steps.unwrap_or(config.max_steps),
    );

    let plan = ActionPlan::new(goal, execution_model).with_steps(steps);
    tracing::info!(
        "[PlanParser] Parsed plan {} with {} steps ({})",
        plan.id,
        plan.steps.len(),
        plan.execution_model
    );
    plan
}

/// Pick the fallback action: the first available action that looks like
/// an analysis/acknowledgment action, else `REPLY`.
pub fn fallback_action(available_actions: &[String]) -> String {
    available_actions
        .iter()
        .find(|action| {
            let lower = action.to_lowercase();
            ACK_ACTION_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .cloned()
        .unwrap_or_else(|| DEFAULT_REPLY_ACTION.to_string())
}

/// Single acknowledgment step used when nothing else could be planned.
pub fn fallback_step(goal: &str, available_actions: &[String]) -> ActionStep {
    let text = if goal.trim().is_empty() {
        "I will help you with this request step by step.".to_string()
    } else {
        format!("I will help you with this request step by step: {}", goal.trim())
    };
    ActionStep::new(fallback_action(available_actions)).with_parameter("text", Value::String(text))
}

/// One-step plan tagged `fallback`.
pub fn fallback_plan(ctx: &PlanningContext, config: &PlanningConfig, reason: &str) -> ActionPlan {
    tracing::warn!("[PlanParser] Using fallback plan: {}", reason);
    let execution_model = ctx
        .preferences
        .execution_model
        .unwrap_or(config.default_execution_model);
    ActionPlan::new(ctx.goal.clone(), execution_model)
        .with_step(fallback_step(&ctx.goal, &ctx.available_actions))
        .with_tag(FALLBACK_TAG)
}

/// Keyword-heuristic sequential plan for a free-text message.
///
/// When `available_actions` is non-empty, heuristic actions it does not list
/// are skipped; if none remain, the fallback action is used instead.
pub fn simple_plan(message: &str, available_actions: &[String]) -> ActionPlan {
    let lower = message.to_lowercase();
    let candidates: &[&str] = if lower.contains("email") {
        &["SEND_EMAIL"]
    } else if lower.contains("research") && (lower.contains("send") || lower.contains("summary")) {
        &["SEARCH", "REPLY"]
    } else if lower.contains("search") || lower.contains("find") || lower.contains("research") {
        &["SEARCH"]
    } else if lower.contains("analyz") {
        &["THINK", "REPLY"]
    } else {
        &["REPLY"]
    };

    let mut actions: Vec<String> = candidates
        .iter()
        .filter(|a| available_actions.is_empty() || available_actions.iter().any(|x| x == *a))
        .map(|a| a.to_string())
        .collect();
    if actions.is_empty() {
        actions.push(fallback_action(available_actions));
    }

    let mut steps: Vec<ActionStep> = Vec::with_capacity(actions.len());
    for action in actions {
        let mut step =
            ActionStep::new(action).with_parameter("message", Value::String(message.to_string()));
        if let Some(prev) = steps.last() {
            step = step.with_dependency(prev.id.clone());
        }
        steps.push(step);
    }

    let goal = if message.trim().is_empty() {
        "Execute plan".to_string()
    } else {
        message.to_string()
    };

    ActionPlan::new(goal, ExecutionModel::Sequential)
        .with_steps(steps)
        .with_tag(SIMPLE_TAG)
}
