//! Capability Invocation Context
//!
//! Every capability invocation receives a `CapabilityContext` carrying:
//!
//! 1. Identity of the invocation (plan id, step id, action name, attempt)
//! 2. The execution's shared `WorkingMemory`
//! 3. A snapshot of the results recorded before this step started
//!
//! Working memory belongs to exactly one plan execution. Steps of the same
//! concurrent batch share it without any arbitration beyond the map lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// WorkingMemory
// ============================================================================

/// Mutable scratch map shared across the steps of one execution.
///
/// Cloning is cheap: clones point at the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl WorkingMemory {
    /// Create an empty working memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store.get(key).cloned()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        store.insert(key.into(), value)
    }

    /// Remove a value by key.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        store.remove(key)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store.len()
    }

    /// Whether the memory is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return every entry whose key contains `key_pattern`.
    pub fn search(&self, key_pattern: &str) -> Vec<(String, Value)> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store
            .iter()
            .filter(|(k, _)| k.contains(key_pattern))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy of the whole map.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store.clone()
    }
}

// ============================================================================
// PriorResult
// ============================================================================

/// Output of a step that finished before the current one started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorResult {
    pub step_id: String,
    pub action_name: String,
    pub output: Value,
}

// ============================================================================
// CapabilityContext
// ============================================================================

/// Context for a single capability invocation.
#[derive(Debug, Clone)]
pub struct CapabilityContext {
    plan_id: String,
    step_id: String,
    action_name: String,
    /// 1-based attempt number (retries increment it).
    attempt: u32,
    working_memory: WorkingMemory,
    previous_results: Vec<PriorResult>,
}

impl CapabilityContext {
    /// Create a context for the first attempt of a step.
    pub fn new(
        plan_id: impl Into<String>,
        step_id: impl Into<String>,
        action_name: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            step_id: step_id.into(),
            action_name: action_name.into(),
            attempt: 1,
            working_memory: WorkingMemory::new(),
            previous_results: Vec::new(),
        }
    }

    /// Share an execution's working memory.
    pub fn with_working_memory(mut self, memory: WorkingMemory) -> Self {
        self.working_memory = memory;
        self
    }

    /// Attach the results recorded before this step started.
    pub fn with_previous_results(mut self, results: Vec<PriorResult>) -> Self {
        self.previous_results = results;
        self
    }

    /// Set the attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working_memory
    }

    pub fn previous_results(&self) -> &[PriorResult] {
        &self.previous_results
    }

    /// Output of an earlier step by id, if it has been recorded.
    pub fn result_of(&self, step_id: &str) -> Option<&Value> {
        self.previous_results
            .iter()
            .find(|r| r.step_id == step_id)
            .map(|r| &r.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_working_memory_shared_between_clones() {
        let memory = WorkingMemory::new();
        let clone = memory.clone();
        clone.insert("sum", json!(3));
        assert_eq!(memory.get("sum"), Some(json!(3)));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_working_memory_insert_returns_previous() {
        let memory = WorkingMemory::new();
        assert!(memory.insert("k", json!(1)).is_none());
        assert_eq!(memory.insert("k", json!(2)), Some(json!(1)));
        assert_eq!(memory.remove("k"), Some(json!(2)));
        assert!(memory.is_empty());
    }

    #[test]
    fn test_working_memory_search() {
        let memory = WorkingMemory::new();
        memory.insert("step:a:output", json!("a"));
        memory.insert("step:b:output", json!("b"));
        memory.insert("other", json!("c"));

        let mut found = memory.search("step:");
        found.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "step:a:output");
        assert!(memory.search("missing").is_empty());
    }

    #[test]
    fn test_context_defaults() {
        let ctx = CapabilityContext::new("plan-1", "step-1", "compute_log");
        assert_eq!(ctx.plan_id(), "plan-1");
        assert_eq!(ctx.step_id(), "step-1");
        assert_eq!(ctx.action_name(), "compute_log");
        assert_eq!(ctx.attempt(), 1);
        assert!(ctx.previous_results().is_empty());
        assert!(ctx.working_memory().is_empty());
    }

    #[test]
    fn test_context_result_of() {
        let ctx = CapabilityContext::new("plan-1", "step-2", "compute_log")
            .with_attempt(2)
            .with_previous_results(vec![PriorResult {
                step_id: "step-1".to_string(),
                action_name: "sum_two_elements".to_string(),
                output: json!(5),
            }]);
        assert_eq!(ctx.attempt(), 2);
        assert_eq!(ctx.result_of("step-1"), Some(&json!(5)));
        assert!(ctx.result_of("step-9").is_none());
    }

    #[test]
    fn test_context_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CapabilityContext>();
        assert_send_sync::<WorkingMemory>();
    }
}
