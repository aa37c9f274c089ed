//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! the decision, execution, and worker layers can stay focused on their own
//! concerns.

pub mod errors;
pub mod providers;

pub use errors::{ReasoningError, Result, RuntimeError};
pub use providers::{
    DialogueLine, DialogueRequest, ReasoningReply, ReasoningRequest, ReasoningService,
    ReasoningTier, SilentReasoner,
};
