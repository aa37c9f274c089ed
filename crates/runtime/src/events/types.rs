//! Event types for different topics.

use std::collections::BTreeMap;

use npc_core::{ActionKind, AgentId, Position, StepTarget, Tick, TriggerKind};
use serde::{Deserialize, Serialize};

use crate::api::ReasoningTier;
use crate::decision::DecisionSource;
use crate::execution::{CompletionReason, ConversationEnd};

/// Observable activity emitted while plans execute.
///
/// The surrounding simulation applies these (moves agents, renders speech);
/// the runtime itself never mutates world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BehaviorEvent {
    Moved {
        agent: AgentId,
        from: Position,
        to: Position,
        tick: Tick,
    },
    Spoke {
        agent: AgentId,
        target: Option<AgentId>,
        message: String,
        tick: Tick,
    },
    Performed {
        agent: AgentId,
        action: ActionKind,
        target: Option<StepTarget>,
        params: BTreeMap<String, String>,
        tick: Tick,
    },
}

impl BehaviorEvent {
    pub fn agent(&self) -> AgentId {
        match self {
            BehaviorEvent::Moved { agent, .. }
            | BehaviorEvent::Spoke { agent, .. }
            | BehaviorEvent::Performed { agent, .. } => *agent,
        }
    }
}

/// Plan lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanEvent {
    Installed {
        agent: AgentId,
        plan: String,
        steps: usize,
        source: DecisionSource,
        tick: Tick,
    },
    StepCompleted {
        agent: AgentId,
        plan: String,
        step: usize,
        tick: Tick,
    },
    Paused {
        agent: AgentId,
        plan: String,
        step: usize,
        reason: String,
        tick: Tick,
    },
    Resumed {
        agent: AgentId,
        plan: String,
        step: usize,
        tick: Tick,
    },
    Completed {
        agent: AgentId,
        plan: String,
        reason: CompletionReason,
        tick: Tick,
    },
}

/// Decision-pipeline bookkeeping, mostly useful for cost dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DecisionEvent {
    TriggerRaised {
        agent: AgentId,
        kind: TriggerKind,
        description: String,
        tick: Tick,
    },
    ReasoningQueued {
        agent: AgentId,
        tier: ReasoningTier,
        triggers: usize,
        tick: Tick,
    },
    /// A reasoning result arrived after the agent already moved on.
    ResultDropped {
        agent: AgentId,
        tier: ReasoningTier,
        tick: Tick,
    },
    ReasoningFailed {
        agent: AgentId,
        tier: ReasoningTier,
        error: String,
        tick: Tick,
    },
    Fallback {
        agent: AgentId,
        reason: String,
        tick: Tick,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConversationEvent {
    Started {
        session: u64,
        initiator: AgentId,
        responder: AgentId,
        max_turns: u8,
        tick: Tick,
    },
    Line {
        session: u64,
        speaker: AgentId,
        listener: AgentId,
        turn: usize,
        text: String,
    },
    Ended {
        session: u64,
        initiator: AgentId,
        responder: AgentId,
        turns: usize,
        end: ConversationEnd,
        tick: Tick,
    },
}
