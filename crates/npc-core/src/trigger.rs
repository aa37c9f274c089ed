use strum::{Display, EnumString};

use crate::common::Tick;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TriggerKind {
    /// A vital stat crossed a threshold (low health, hunger).
    StatThreshold,
    /// The agent was addressed directly.
    SpokenTo,
    CombatStart,
    Damaged,
    /// Raised by an outside subsystem (politics, economy, ...).
    Custom,
}

/// A consumable fact that forces fresh reasoning for one agent.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trigger {
    pub kind: TriggerKind,
    pub description: String,
    pub tick: Tick,
}

impl Trigger {
    pub fn new(kind: TriggerKind, description: impl Into<String>, tick: Tick) -> Self {
        Self {
            kind,
            description: description.into(),
            tick,
        }
    }
}
