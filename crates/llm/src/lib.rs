//! Action Engine LLM
//!
//! The text-generation interface the planner and replanner consume:
//! - `TextGenerator` - prompt in, text out
//! - `GenerateOptions` - per-request sampling options
//! - `ScriptedGenerator` - deterministic generator replaying canned responses
//!
//! Concrete REST providers live outside this workspace and only need to
//! implement `TextGenerator`.

pub mod provider;
pub mod scripted;
pub mod types;

pub use provider::TextGenerator;
pub use scripted::ScriptedGenerator;
pub use types::*;
