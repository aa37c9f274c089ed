//! Turning decisions into activity: the plan state machine and dialogue sessions.

pub mod conversation;
pub mod executor;

pub use conversation::{
    ConversationEnd, ConversationManager, ConversationReport, ConversationSession, Participant,
    run_session,
};
pub use executor::{CompletionReason, ExecutorEvent, PlanExecutor, PlanState, PlanStatus};
