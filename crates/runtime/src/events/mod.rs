//! Topic-based event bus for runtime events.
//!
//! Plan execution, the decision tiers, and conversations publish onto
//! separate topics so consumers (the simulation applying moves, a transport
//! layer, cost dashboards) subscribe only to what they need.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{BehaviorEvent, ConversationEvent, DecisionEvent, PlanEvent};
