//! Decision scheduling for non-player characters.
//!
//! This crate decides *when* each agent should think and *how expensively*.
//! Most decisions are served by deterministic rules or a per-season pattern
//! cache; the rest are coalesced into tiered batches for an external
//! [`ReasoningService`]. Consumers embed [`NpcScheduler`], feed it world
//! signals through read-only oracles, and subscribe to the events it emits.
//!
//! Modules are organized by responsibility:
//! - [`scheduler`] hosts the orchestrator and builder
//! - [`decision`] holds the cheap tiers: priority, triggers, rules, cache
//! - [`brain`] batches reasoning calls and parses their plans
//! - [`execution`] runs plans and two-party conversations
//! - [`events`] provides the topic-based event bus
//! - [`oracle`] defines the read-only views of the surrounding world
//! - [`api`] exposes the reasoning boundary and error types
pub mod api;
pub mod brain;
pub mod config;
pub mod decision;
pub mod events;
pub mod execution;
pub mod memory;
pub mod oracle;
pub mod scheduler;

mod workers;

pub use api::{
    DialogueLine, DialogueRequest, ReasoningError, ReasoningReply, ReasoningRequest,
    ReasoningService, ReasoningTier, Result, RuntimeError, SilentReasoner,
};
pub use brain::{BatchBrain, BatchOutcome, DialogueClient};
pub use config::SchedulerConfig;
pub use decision::{DecisionContext, DecisionSource, PatternCache, RuleEngine, TriggerDetector};
pub use events::{
    BehaviorEvent, ConversationEvent, DecisionEvent, Event, EventBus, PlanEvent, Topic,
};
pub use execution::{ConversationManager, PlanExecutor};
pub use memory::MemoryStore;
pub use oracle::{
    AgentOracle, ClockOracle, ContextOracle, MapOracle, NoContext, OpenFieldMap, OracleManager,
};
pub use scheduler::{NpcScheduler, NpcSchedulerBuilder, PresenceFlags, TickSummary};
pub use workers::{DecisionMetrics, MetricsSnapshot};
