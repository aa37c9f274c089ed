//! Tiered decision pipeline.
//!
//! Each due agent is resolved by the cheapest tier that can answer:
//!
//! 1. **Rules** ([`RuleEngine`]): deterministic, zero-latency fast path
//! 2. **Pattern cache** ([`PatternCache`]): the last reasoned plan for the
//!    current season and time slot, reused while no trigger is pending
//! 3. **Reasoning** ([`crate::BatchBrain`]): batched calls to the external
//!    service, gated by [`TriggerDetector`] and paced by [`PriorityScheduler`]
//!
//! All tiers read the same [`DecisionContext`] built once per decision.

pub mod pattern_cache;
pub mod priority;
pub mod rules;
pub mod triggers;

use std::fmt;

use npc_core::{
    AgentId, AgentSnapshot, Clock, NearbyAgent, PointOfInterest, Position, Season, TimeSlot,
};
use serde::{Deserialize, Serialize};

use crate::api::ReasoningTier;

pub use pattern_cache::PatternCache;
pub use priority::{PriorityReason, PriorityScheduler, PriorityScore};
pub use rules::{Rule, RuleEngine, RuleMatch};
pub use triggers::TriggerDetector;

/// Which tier produced an installed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Rule(String),
    Cache,
    Reasoning(ReasoningTier),
    /// Ambient behavior after a reasoning failure, timeout, or malformed reply.
    Fallback,
    /// Installed by another subsystem through `set_plan`.
    External,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionSource::Rule(name) => write!(f, "rule:{}", name),
            DecisionSource::Cache => write!(f, "cache"),
            DecisionSource::Reasoning(tier) => write!(f, "reasoning:{}", tier),
            DecisionSource::Fallback => write!(f, "fallback"),
            DecisionSource::External => write!(f, "external"),
        }
    }
}

/// Everything a tier may look at when deciding for one agent.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub agent: AgentSnapshot,
    pub clock: Clock,
    pub season: Season,
    pub slot: TimeSlot,
    /// Nearest first.
    pub nearby: Vec<NearbyAgent>,
    pub in_combat: bool,
    pub nearest_poi: Option<PointOfInterest>,
    pub home: Option<Position>,
    /// Set when someone addressed this agent since its last decision.
    pub addressed_by: Option<AgentId>,
}

impl DecisionContext {
    pub fn new(agent: AgentSnapshot, clock: Clock) -> Self {
        let in_combat = agent.in_combat;
        Self {
            agent,
            season: clock.season(),
            slot: clock.time_slot(),
            clock,
            nearby: Vec::new(),
            in_combat,
            nearest_poi: None,
            home: None,
            addressed_by: None,
        }
    }

    pub fn with_nearby(mut self, nearby: Vec<NearbyAgent>) -> Self {
        self.nearby = nearby;
        self
    }

    pub fn with_poi(mut self, poi: Option<PointOfInterest>) -> Self {
        self.nearest_poi = poi;
        self
    }

    pub fn with_home(mut self, home: Option<Position>) -> Self {
        self.home = home;
        self
    }

    pub fn addressed_by(mut self, speaker: Option<AgentId>) -> Self {
        self.addressed_by = speaker;
        self
    }

    pub fn nearest_hostile(&self) -> Option<&NearbyAgent> {
        self.nearby.iter().find(|row| row.hostile)
    }

    pub fn human_nearby(&self) -> bool {
        self.nearby.iter().any(NearbyAgent::is_human)
    }
}
