//! Capability Traits
//!
//! Capabilities are the external, named units of work that plan steps refer
//! to by `action_name`. The abstraction is split the same way tools are:
//!
//! - `CapabilityDefinition` - Identity and parameter schema
//! - `CapabilityExecutable` - Execution
//! - `Capability` - Combined trait (auto-implemented via blanket impl)
//! - `CapabilityRegistry` - O(1) lookup by exact name with ordered iteration
//!
//! Names are resolved only when a step runs, never when a plan is parsed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::CapabilityContext;
use crate::error::{CoreError, CoreResult};

// ============================================================================
// Trait Definitions
// ============================================================================

/// Identity and schema of a capability.
pub trait CapabilityDefinition: Send + Sync {
    /// Unique name, matched exactly against `ActionStep::action_name`.
    fn name(&self) -> &str;

    /// Human-readable description, used when prompting for plans.
    fn description(&self) -> &str {
        ""
    }

    /// JSON schema describing accepted parameters.
    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }
}

/// Execution side of a capability.
#[async_trait]
pub trait CapabilityExecutable: Send + Sync {
    /// Invoke the capability.
    ///
    /// `args` is the step's declared parameters as a JSON object. Returning
    /// `Err` makes the engine apply the step's retry policy.
    async fn execute(&self, ctx: &CapabilityContext, args: Value) -> CoreResult<Value>;
}

/// Combined trait for capabilities that provide both definition and execution.
pub trait Capability: CapabilityDefinition + CapabilityExecutable {}

impl<T: CapabilityDefinition + CapabilityExecutable> Capability for T {}

// ============================================================================
// FnCapability
// ============================================================================

type BoxedHandler = Arc<
    dyn Fn(CapabilityContext, Value) -> Pin<Box<dyn Future<Output = CoreResult<Value>> + Send>>
        + Send
        + Sync,
>;

/// Capability backed by an async closure.
///
/// ```ignore
/// let echo = FnCapability::new("echo", |_ctx, args| async move { Ok(args) });
/// ```
#[derive(Clone)]
pub struct FnCapability {
    name: String,
    description: String,
    handler: BoxedHandler,
}

impl FnCapability {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CapabilityContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CoreResult<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for FnCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapability")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl CapabilityDefinition for FnCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[async_trait]
impl CapabilityExecutable for FnCapability {
    async fn execute(&self, ctx: &CapabilityContext, args: Value) -> CoreResult<Value> {
        (self.handler)(ctx.clone(), args).await
    }
}

// ============================================================================
// CapabilityRegistry
// ============================================================================

/// Registry of capabilities keyed by exact name.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    /// Insertion order for deterministic iteration.
    order: Vec<String>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a capability. Replaces any existing capability with the same name.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if !self.capabilities.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.capabilities.insert(name, capability);
    }

    /// Builder-style registration.
    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    /// Unregister a capability by name.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Capability>> {
        self.order.retain(|n| n != name);
        self.capabilities.remove(name)
    }

    /// Look up a capability by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capability definitions as JSON values in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name))
            .map(|cap| {
                serde_json::json!({
                    "name": cap.name(),
                    "description": cap.description(),
                    "parameters": cap.parameters_schema(),
                })
            })
            .collect()
    }

    /// Execute a capability by name.
    ///
    /// Returns `Err(CoreError::NotFound)` if the capability is not registered.
    pub async fn execute(
        &self,
        name: &str,
        ctx: &CapabilityContext,
        args: Value,
    ) -> CoreResult<Value> {
        match self.capabilities.get(name) {
            Some(cap) => cap.execute(ctx, args).await,
            None => Err(CoreError::not_found(format!("Capability not found: {}", name))),
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.order)
            .finish()
    }
}
