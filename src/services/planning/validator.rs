//! Plan Validator
//!
//! Structural checks on an `ActionPlan`. Every problem is accumulated into a
//! `ValidationReport`; validation itself never fails.

use std::collections::{HashMap, HashSet};
use std::fmt;

use action_engine_core::CapabilityRegistry;

use crate::models::plan::{ActionPlan, ExecutionModel};

/// A single problem found in a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("Plan has no goal")]
    MissingGoal,

    #[error("Plan has no steps")]
    NoSteps,

    #[error("Step at position {index} has no id")]
    MissingStepId { index: usize },

    #[error("Step '{step_id}' has no action name")]
    MissingActionName { step_id: String },

    #[error("Duplicate step id '{step_id}'")]
    DuplicateStepId { step_id: String },

    #[error("Step '{step_id}' uses unregistered action '{action_name}'")]
    UnknownAction { step_id: String, action_name: String },

    #[error("Unknown dependency '{dependency}' in step '{step_id}'")]
    UnknownDependency { step_id: String, dependency: String },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),
}

/// Outcome of validating a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// True iff `issues` is empty
    pub ok: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            ok: issues.is_empty(),
            issues,
        }
    }

    /// Human-readable issue messages.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }

    pub fn has_cycle(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::CircularDependency(_)))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            return write!(f, "Plan is valid");
        }
        write!(f, "{} issue(s) found", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// Validate a plan, optionally checking action names against a registry.
pub fn validate_plan(plan: &ActionPlan, registry: Option<&CapabilityRegistry>) -> ValidationReport {
    let mut issues = Vec::new();

    if plan.goal.trim().is_empty() {
        issues.push(ValidationIssue::MissingGoal);
    }

    if plan.steps.is_empty() {
        issues.push(ValidationIssue::NoSteps);
        return ValidationReport::from_issues(issues);
    }

    let step_ids: HashSet<&str> = plan.step_ids();
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, step) in plan.steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            issues.push(ValidationIssue::MissingStepId { index });
        } else if !seen.insert(step.id.as_str()) {
            issues.push(ValidationIssue::DuplicateStepId {
                step_id: step.id.clone(),
            });
        }

        if step.action_name.trim().is_empty() {
            issues.push(ValidationIssue::MissingActionName {
                step_id: step.id.clone(),
            });
        } else if let Some(registry) = registry {
            if !registry.contains(&step.action_name) {
                issues.push(ValidationIssue::UnknownAction {
                    step_id: step.id.clone(),
                    action_name: step.action_name.clone(),
                });
            }
        }

        for dep in &step.dependencies {
            if !step_ids.contains(dep.as_str()) {
                issues.push(ValidationIssue::UnknownDependency {
                    step_id: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    if plan.execution_model == ExecutionModel::Dag {
        for cycle in find_cycles(plan) {
            issues.push(ValidationIssue::CircularDependency(cycle));
        }
    }

    if !issues.is_empty() {
        tracing::debug!(
            "[PlanValidator] Plan {} has {} issue(s)",
            plan.id,
            issues.len()
        );
    }

    ValidationReport::from_issues(issues)
}

// ============================================================================
// Cycle detection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Every cycle reachable through existing dependency edges, each reported
/// as a closed path (`a -> b -> a`).
fn find_cycles(plan: &ActionPlan) -> Vec<Vec<String>> {
    // First occurrence wins for duplicated ids
    let mut deps_by_id: HashMap<&str, &[String]> = HashMap::new();
    for step in &plan.steps {
        deps_by_id
            .entry(step.id.as_str())
            .or_insert(step.dependencies.as_slice());
    }

    let mut marks: HashMap<&str, Mark> = deps_by_id.keys().map(|id| (*id, Mark::Unvisited)).collect();
    let mut cycles = Vec::new();

    for step in &plan.steps {
        if marks.get(step.id.as_str()) == Some(&Mark::Unvisited) {
            dfs(step.id.as_str(), &deps_by_id, &mut marks, &mut cycles);
        }
    }

    cycles
}

/// Iterative depth-first walk from `start`; the explicit stack doubles as
/// the current path.
fn dfs<'a>(
    start: &'a str,
    deps_by_id: &HashMap<&'a str, &'a [String]>,
    marks: &mut HashMap<&'a str, Mark>,
    cycles: &mut Vec<Vec<String>>,
) {
    // (step id, index of the next dependency to follow)
    let mut stack: Vec<(&'a str, usize)> = vec![(start, 0)];
    marks.insert(start, Mark::InProgress);

    while let Some(frame) = stack.last_mut() {
        let (current, next) = *frame;
        let deps: &'a [String] = deps_by_id.get(current).copied().unwrap_or(&[]);
        let Some(dep) = deps.get(next) else {
            marks.insert(current, Mark::Done);
            stack.pop();
            continue;
        };
        frame.1 += 1;

        let dep = dep.as_str();
        match marks.get(dep).copied() {
            // Unknown dependency, reported elsewhere
            None => {}
            Some(Mark::Unvisited) => {
                marks.insert(dep, Mark::InProgress);
                stack.push((dep, 0));
            }
            Some(Mark::InProgress) => {
                if let Some(pos) = stack.iter().position(|(id, _)| *id == dep) {
                    let mut cycle: Vec<String> =
                        stack[pos..].iter().map(|(id, _)| id.to_string()).collect();
                    cycle.push(dep.to_string());
                    cycles.push(cycle);
                }
            }
            Some(Mark::Done) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::ActionStep;
    use action_engine_core::FnCapability;
    use serde_json::json;
    use std::sync::Arc;

    fn step(id: &str, action: &str, deps: &[&str]) -> ActionStep {
        let mut s = ActionStep::new(action).with_id(id);
        for d in deps {
            s = s.with_dependency(*d);
        }
        s
    }

    fn plan(model: ExecutionModel, steps: Vec<ActionStep>) -> ActionPlan {
        ActionPlan::new("goal", model).with_steps(steps)
    }

    fn registry(names: &[&str]) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        for name in names {
            registry.register(Arc::new(FnCapability::new(*name, |_ctx, _args| async {
                Ok(json!(null))
            })));
        }
        registry
    }

    #[test]
    fn test_valid_plan() {
        let p = plan(
            ExecutionModel::Dag,
            vec![step("a", "x", &[]), step("b", "y", &["a"])],
        );
        let report = validate_plan(&p, Some(&registry(&["x", "y"])));
        assert!(report.ok, "{}", report);
        assert!(report.issues.is_empty());
        assert_eq!(report.to_string(), "Plan is valid");
    }

    #[test]
    fn test_empty_plan() {
        let p = ActionPlan::new(" ", ExecutionModel::Sequential);
        let report = validate_plan(&p, None);
        assert!(!report.ok);
        assert_eq!(
            report.issues,
            vec![ValidationIssue::MissingGoal, ValidationIssue::NoSteps]
        );
    }

    #[test]
    fn test_accumulates_all_issues() {
        let p = plan(
            ExecutionModel::Sequential,
            vec![
                step("a", "x", &["ghost"]),
                step("a", "", &[]),
                step("", "unknown", &[]),
            ],
        );
        let report = validate_plan(&p, Some(&registry(&["x"])));
        assert!(!report.ok);
        assert!(report.issues.contains(&ValidationIssue::UnknownDependency {
            step_id: "a".to_string(),
            dependency: "ghost".to_string(),
        }));
        assert!(report.issues.contains(&ValidationIssue::DuplicateStepId {
            step_id: "a".to_string(),
        }));
        assert!(report.issues.contains(&ValidationIssue::MissingActionName {
            step_id: "a".to_string(),
        }));
        assert!(report.issues.contains(&ValidationIssue::MissingStepId { index: 2 }));
        assert!(report.issues.contains(&ValidationIssue::UnknownAction {
            step_id: String::new(),
            action_name: "unknown".to_string(),
        }));
    }

    #[test]
    fn test_registry_is_optional() {
        let p = plan(ExecutionModel::Sequential, vec![step("a", "anything", &[])]);
        assert!(validate_plan(&p, None).ok);
    }

    #[test]
    fn test_cycle_detected_for_dag() {
        let p = plan(
            ExecutionModel::Dag,
            vec![step("a", "x", &["b"]), step("b", "x", &["a"])],
        );
        let report = validate_plan(&p, None);
        assert!(!report.ok);
        assert!(report.has_cycle());
        assert_eq!(
            report.issues,
            vec![ValidationIssue::CircularDependency(vec![
                "a".to_string(),
                "b".to_string(),
                "a".to_string(),
            ])]
        );
        assert!(report.messages()[0].contains("a -> b -> a"));
    }

    #[test]
    fn test_cycle_ignored_for_sequential() {
        let steps = vec![step("a", "x", &["b"]), step("b", "x", &["a"])];
        let report = validate_plan(&plan(ExecutionModel::Sequential, steps.clone()), None);
        assert!(report.ok);
        let report = validate_plan(&plan(ExecutionModel::Parallel, steps), None);
        assert!(report.ok);
    }

    #[test]
    fn test_self_cycle_and_diamond() {
        let p = plan(ExecutionModel::Dag, vec![step("a", "x", &["a"])]);
        let report = validate_plan(&p, None);
        assert_eq!(
            report.issues,
            vec![ValidationIssue::CircularDependency(vec![
                "a".to_string(),
                "a".to_string(),
            ])]
        );

        let diamond = plan(
            ExecutionModel::Dag,
            vec![
                step("a", "x", &[]),
                step("b", "x", &["a"]),
                step("c", "x", &["a"]),
                step("d", "x", &["b", "c"]),
            ],
        );
        assert!(validate_plan(&diamond, None).ok);
    }

    #[test]
    fn test_longer_cycle_path() {
        let p = plan(
            ExecutionModel::Dag,
            vec![
                step("a", "x", &["b"]),
                step("b", "x", &["c"]),
                step("c", "x", &["a"]),
                step("d", "x", &["a"]),
            ],
        );
        let report = validate_plan(&p, None);
        let cycles: Vec<_> = report
            .issues
            .iter()
            .filter(|i| matches!(i, ValidationIssue::CircularDependency(_)))
            .collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(
            cycles[0].to_string(),
            "Circular dependency detected: a -> b -> c -> a"
        );
    }

    #[test]
    fn test_long_dependency_chain() {
        let n = 50_000;
        let mut steps: Vec<ActionStep> = (0..n)
            .map(|i| {
                let s = ActionStep::new("x").with_id(format!("s{i}"));
                if i > 0 {
                    s.with_dependency(format!("s{}", i - 1))
                } else {
                    s
                }
            })
            .collect();

        let report = validate_plan(&plan(ExecutionModel::Dag, steps.clone()), None);
        assert!(report.ok);

        // Close the chain into one long cycle
        steps[0] = steps[0].clone().with_dependency(format!("s{}", n - 1));
        let report = validate_plan(&plan(ExecutionModel::Dag, steps), None);
        assert!(report.has_cycle());
    }
}
