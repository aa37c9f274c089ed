//! Value types shared by the NPC decision runtime and the simulation that
//! embeds it.
//!
//! `npc-core` has no async code and performs no I/O. It defines what an agent
//! looks like to the decision layer ([`AgentSnapshot`]), how in-world time is
//! bucketed ([`Clock`], [`Season`], [`TimeSlot`]), and the [`Plan`] value
//! object every decision tier produces.
pub mod agent;
pub mod clock;
pub mod common;
pub mod plan;
pub mod trigger;

pub use agent::{
    AgentSnapshot, AgentStats, Controller, InventorySummary, NearbyAgent, PointOfInterest, Role,
};
pub use clock::{Clock, Season, TimeSlot};
pub use common::{AgentId, Position, Tick};
pub use plan::{
    ActionKind, DEFAULT_MAX_DURATION, InterruptCondition, Plan, PlanError, PlanStep, StepTarget,
};
pub use trigger::{Trigger, TriggerKind};
