//! Read-only views of agents handed to the decision layer each tick.

use strum::{Display, EnumIter, EnumString};

use crate::common::{AgentId, Position};
use crate::plan::ActionKind;

/// Occupation of an agent; flavours rules and reasoning prompts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    Villager,
    Farmer,
    Merchant,
    Guard,
    Blacksmith,
    Innkeeper,
    Priest,
    Hunter,
    Wanderer,
}

impl Role {
    /// Routine activity the role falls back to when nothing else is going on.
    pub fn routine_action(self) -> ActionKind {
        match self {
            Role::Farmer | Role::Blacksmith | Role::Innkeeper => ActionKind::Work,
            Role::Merchant => ActionKind::Trade,
            Role::Guard | Role::Wanderer => ActionKind::Wander,
            Role::Priest => ActionKind::Pray,
            Role::Hunter => ActionKind::Gather,
            Role::Villager => ActionKind::Idle,
        }
    }
}

/// Who drives an agent's behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Controller {
    #[default]
    Npc,
    /// Human-controlled; never scheduled, but raises priority around it.
    Human,
}

/// Vital meters. `hunger` and `energy` are percentages (0–100).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentStats {
    pub health: u32,
    pub max_health: u32,
    /// 0 = sated, 100 = starving.
    pub hunger: u32,
    /// 0 = exhausted, 100 = fully rested.
    pub energy: u32,
}

impl AgentStats {
    pub const fn new(health: u32, max_health: u32, hunger: u32, energy: u32) -> Self {
        Self {
            health,
            max_health,
            hunger,
            energy,
        }
    }

    pub fn health_percent(&self) -> u32 {
        if self.max_health == 0 {
            return 0;
        }
        (self.health.min(self.max_health) * 100) / self.max_health
    }
}

impl Default for AgentStats {
    fn default() -> Self {
        Self::new(100, 100, 20, 80)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InventorySummary {
    pub food: u32,
    pub coins: u32,
    pub items: Vec<String>,
}

impl InventorySummary {
    pub fn has_food(&self) -> bool {
        self.food > 0
    }
}

/// Everything the decision layer may read about one agent for one tick.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub controller: Controller,
    pub position: Position,
    pub stats: AgentStats,
    pub inventory: InventorySummary,
    pub current_action: Option<ActionKind>,
    pub in_combat: bool,
}

impl AgentSnapshot {
    pub fn new(id: AgentId, name: impl Into<String>, role: Role, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            controller: Controller::Npc,
            position,
            stats: AgentStats::default(),
            inventory: InventorySummary::default(),
            current_action: None,
            in_combat: false,
        }
    }

    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_stats(mut self, stats: AgentStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_inventory(mut self, inventory: InventorySummary) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn is_human(&self) -> bool {
        self.controller == Controller::Human
    }
}

/// Result row of a spatial query around an agent.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NearbyAgent {
    pub id: AgentId,
    pub name: String,
    pub distance: u32,
    pub position: Position,
    pub role: Role,
    pub controller: Controller,
    pub current_action: Option<ActionKind>,
    pub hostile: bool,
}

impl NearbyAgent {
    /// Builds a row from a full snapshot as seen from `origin`.
    pub fn from_snapshot(origin: Position, other: &AgentSnapshot) -> Self {
        Self {
            id: other.id,
            name: other.name.clone(),
            distance: origin.chebyshev_distance(other.position),
            position: other.position,
            role: other.role,
            controller: other.controller,
            current_action: other.current_action,
            hostile: false,
        }
    }

    pub fn is_human(&self) -> bool {
        self.controller == Controller::Human
    }
}

/// Named location of interest (well, market, shrine, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointOfInterest {
    pub name: String,
    pub kind: String,
    pub position: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_percent_handles_zero_max() {
        assert_eq!(AgentStats::new(10, 0, 0, 0).health_percent(), 0);
        assert_eq!(AgentStats::new(15, 60, 0, 0).health_percent(), 25);
        assert_eq!(AgentStats::new(90, 60, 0, 0).health_percent(), 100);
    }

    #[test]
    fn nearby_row_measures_from_origin() {
        let other = AgentSnapshot::new(AgentId(2), "Mira", Role::Farmer, Position::new(4, 1));
        let row = NearbyAgent::from_snapshot(Position::new(1, 1), &other);
        assert_eq!(row.distance, 3);
        assert!(!row.is_human());
    }
}
