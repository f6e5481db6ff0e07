//! Action Engine Core
//!
//! Foundational traits, error types, and the execution context handed to
//! capabilities. This crate has no dependency on the planner, the executor or
//! any text-generation backend.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Per-invocation context (`CapabilityContext`, `WorkingMemory`, `PriorResult`)
//! - `capability` - Capability abstraction (`CapabilityDefinition`, `CapabilityExecutable`,
//!   `Capability`) and the name-keyed `CapabilityRegistry`

pub mod capability;
pub mod context;
pub mod error;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Invocation Context ─────────────────────────────────────────────────
pub use context::{CapabilityContext, PriorResult, WorkingMemory};

// ── Capabilities ───────────────────────────────────────────────────────
pub use capability::{
    Capability, CapabilityDefinition, CapabilityExecutable, CapabilityRegistry, FnCapability,
};
