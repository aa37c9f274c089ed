//! Asynchronous abstraction over the external reasoning service.
//!
//! Runtime users plug in a [`ReasoningService`] so the scheduler can run
//! against a hosted model, a local one, or scripted fixtures in tests. Only
//! [`crate::BatchBrain`] ever calls it.
use std::fmt;

use async_trait::async_trait;
use npc_core::{AgentId, Season, Tick, TimeSlot};
use serde::{Deserialize, Serialize};

use super::errors::ReasoningError;

/// Cost tier of a reasoning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTier {
    Standard,
    /// Higher fidelity, higher cost. Used when a human-controlled agent is near.
    Premium,
}

impl ReasoningTier {
    pub fn for_request(premium: bool) -> Self {
        if premium {
            ReasoningTier::Premium
        } else {
            ReasoningTier::Standard
        }
    }
}

impl fmt::Display for ReasoningTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReasoningTier::Standard => "standard",
            ReasoningTier::Premium => "premium",
        };
        write!(f, "{}", label)
    }
}

/// One agent's pending request for a fresh plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub agent: AgentId,
    /// Situation summary folded from the decision context.
    pub prompt_context: String,
    /// Drained triggers, one line each, when the request was trigger-driven.
    pub trigger_context: Option<String>,
    pub premium: bool,
    /// Cache slot the resulting plan is stored under.
    pub season: Season,
    pub slot: TimeSlot,
    pub requested_at: Tick,
    /// Scheduler-issued id; a reply is only honored while this is the
    /// agent's outstanding request.
    pub ticket: u64,
}

impl ReasoningRequest {
    pub fn tier(&self) -> ReasoningTier {
        ReasoningTier::for_request(self.premium)
    }
}

/// Raw structured output for one agent of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningReply {
    pub agent: AgentId,
    /// JSON plan document; parsed by the brain, never trusted as-is.
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: AgentId,
    pub speaker_name: String,
    pub text: String,
}

/// Request for the next line of a two-party conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueRequest {
    pub speaker: AgentId,
    pub speaker_name: String,
    pub listener: AgentId,
    pub listener_name: String,
    /// What the speaker remembers about the listener, oldest first.
    pub memories: Vec<String>,
    pub transcript: Vec<DialogueLine>,
}

/// The opaque, costly decision service.
///
/// Implementations should not retry internally; the brain applies timeouts and
/// the scheduler owns fallback behavior.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Produce one reply per request. Missing replies are treated as failures
    /// for those agents only.
    async fn reason_batch(
        &self,
        tier: ReasoningTier,
        requests: &[ReasoningRequest],
    ) -> Result<Vec<ReasoningReply>, ReasoningError>;

    /// Produce the next utterance of a conversation. An empty string ends it.
    async fn utter(&self, request: &DialogueRequest) -> Result<String, ReasoningError>;
}

/// A service that never produces plans. Useful for rule-and-cache-only runs.
pub struct SilentReasoner;

#[async_trait]
impl ReasoningService for SilentReasoner {
    async fn reason_batch(
        &self,
        _tier: ReasoningTier,
        _requests: &[ReasoningRequest],
    ) -> Result<Vec<ReasoningReply>, ReasoningError> {
        Err(ReasoningError::Service("reasoning disabled".to_string()))
    }

    async fn utter(&self, _request: &DialogueRequest) -> Result<String, ReasoningError> {
        Ok(String::new())
    }
}
