//! Unified error types surfaced by the runtime API.
//!
//! [`RuntimeError`] covers orchestration failures (misconfiguration, unknown
//! agents, closed channels). [`ReasoningError`] covers the reasoning boundary;
//! it never escapes the scheduler as a hard failure and is only reported on
//! outcomes and events.
use std::time::Duration;

use npc_core::AgentId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("scheduler requires {0} to be configured before building")]
    MissingCollaborator(&'static str),

    #[error("agent {0} is not registered")]
    UnknownAgent(AgentId),

    #[error("agent {0} is human-controlled and cannot be scheduled")]
    HumanControlled(AgentId),

    #[error("batch brain request channel closed")]
    BrainChannelClosed,

    #[error("batch results are already forwarded to a callback")]
    ResultsDetached,

    #[error("batch worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("conversation between {initiator} and {responder} refused: {reason}")]
    ConversationRefused {
        initiator: AgentId,
        responder: AgentId,
        reason: &'static str,
    },
}

/// Failure at the reasoning-service boundary. Always recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningError {
    #[error("reasoning service failed: {0}")]
    Service(String),

    #[error("reasoning call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed plan for {agent}: {reason}")]
    Malformed { agent: AgentId, reason: String },

    #[error("batch reply did not include agent {0}")]
    MissingReply(AgentId),
}
