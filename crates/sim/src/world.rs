//! In-memory village implementing every oracle the scheduler reads.
//!
//! The village owns all world state. The scheduler only observes it; the
//! driver loop applies the [`BehaviorEvent`]s it emits back onto the village.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use npc_core::{
    ActionKind, AgentId, AgentSnapshot, AgentStats, Clock, Controller, InventorySummary,
    PointOfInterest, Position, Role, Tick,
};
use npc_runtime::{AgentOracle, BehaviorEvent, ClockOracle, ContextOracle, MapOracle, OpenFieldMap};
use tracing::{debug, trace};

pub const PLAYER: AgentId = AgentId(100);

/// Grid is `0..SIZE` on both axes.
const SIZE: i32 = 32;

/// Ticks between hunger increments.
const HUNGER_EVERY: u64 = 12;

/// Ticks between player steps along the patrol route.
const PLAYER_STEP_EVERY: u64 = 3;

/// Ticks between player greetings.
const GREETING_EVERY: u64 = 90;

#[derive(Clone, Copy, Debug)]
pub struct VillageClock {
    pub ms_per_tick: u64,
    pub ticks_per_day: u64,
}

/// A line of speech the player addressed to an NPC.
#[derive(Debug, Clone)]
pub struct Greeting {
    pub speaker: AgentId,
    pub speaker_name: String,
    pub message: String,
    pub position: Position,
    pub target: AgentId,
}

struct VillageState {
    tick: u64,
    agents: BTreeMap<AgentId, AgentSnapshot>,
    route_index: usize,
}

pub struct Village {
    clock: VillageClock,
    /// Ticks added so day zero starts at dawn rather than midnight.
    start_offset: u64,
    places: Vec<PointOfInterest>,
    homes: HashMap<AgentId, Position>,
    route: Vec<Position>,
    state: RwLock<VillageState>,
}

impl Village {
    /// Builds the default village: six villagers, a few landmarks, and one
    /// human-controlled player walking a loop between them.
    pub fn new(clock: VillageClock) -> Self {
        let places = vec![
            place("well", "water", 16, 16),
            place("market", "trade", 20, 12),
            place("fields", "farm", 6, 24),
            place("forge", "craft", 24, 20),
            place("chapel", "worship", 10, 8),
            place("inn", "tavern", 14, 20),
        ];

        let residents = [
            (AgentId(1), "Oswin", Role::Farmer, Position::new(4, 26)),
            (AgentId(2), "Marta", Role::Innkeeper, Position::new(13, 21)),
            (AgentId(3), "Tobin", Role::Blacksmith, Position::new(25, 21)),
            (AgentId(4), "Ilse", Role::Merchant, Position::new(21, 11)),
            (AgentId(5), "Brother Aldo", Role::Priest, Position::new(9, 7)),
            (AgentId(6), "Wren", Role::Guard, Position::new(17, 15)),
        ];

        let mut agents = BTreeMap::new();
        let mut homes = HashMap::new();
        for (index, (id, name, role, home)) in residents.into_iter().enumerate() {
            let stats = AgentStats::new(100, 100, 15 + 10 * index as u32, 90 - 5 * index as u32);
            let inventory = InventorySummary {
                food: 2,
                coins: 10 * (index as u32 + 1),
                items: Vec::new(),
            };
            agents.insert(
                id,
                AgentSnapshot::new(id, name, role, home)
                    .with_stats(stats)
                    .with_inventory(inventory),
            );
            homes.insert(id, home);
        }

        let route = vec![
            Position::new(16, 15),
            Position::new(19, 12),
            Position::new(23, 19),
            Position::new(15, 19),
        ];
        agents.insert(
            PLAYER,
            AgentSnapshot::new(PLAYER, "Traveler", Role::Wanderer, route[0])
                .with_controller(Controller::Human),
        );

        Self {
            clock,
            start_offset: clock.ticks_per_day * 3 / 10,
            places,
            homes,
            route,
            state: RwLock::new(VillageState {
                tick: 0,
                agents,
                route_index: 0,
            }),
        }
    }

    pub fn npc_ids(&self) -> Vec<AgentId> {
        self.read(|state| {
            state
                .agents
                .values()
                .filter(|agent| !agent.is_human())
                .map(|agent| agent.id)
                .collect()
        })
    }

    /// Moves time forward one tick and lets needs drift.
    pub fn advance(&self) -> Tick {
        self.write(|state| {
            state.tick += 1;
            let tick = state.tick;

            if tick % HUNGER_EVERY == 0 {
                for agent in state.agents.values_mut().filter(|agent| !agent.is_human()) {
                    agent.stats.hunger = (agent.stats.hunger + 1).min(100);
                }
            }

            if tick % PLAYER_STEP_EVERY == 0 && !self.route.is_empty() {
                let goal = self.route[state.route_index % self.route.len()];
                if let Some(player) = state.agents.get_mut(&PLAYER) {
                    match OpenFieldMap.find_path(player.position, goal).first() {
                        Some(next) => player.position = *next,
                        None => state.route_index += 1,
                    }
                }
            }
            Tick(tick)
        })
    }

    /// Applies an observable behavior to world state.
    pub fn apply(&self, event: &BehaviorEvent) {
        self.write(|state| {
            let Some(agent) = state.agents.get_mut(&event.agent()) else {
                return;
            };
            match event {
                BehaviorEvent::Moved { to, .. } => {
                    agent.position = clamp(*to);
                    agent.current_action = Some(ActionKind::Move);
                }
                BehaviorEvent::Spoke { message, .. } => {
                    debug!(target: "sim::world", agent = %agent.name, %message, "spoke");
                    agent.current_action = Some(ActionKind::Speak);
                }
                BehaviorEvent::Performed { action, .. } => {
                    apply_action(agent, *action);
                    agent.current_action = Some(*action);
                }
            }
            trace!(
                target: "sim::world",
                agent = %agent.name,
                position = %agent.position,
                hunger = agent.stats.hunger,
                energy = agent.stats.energy,
                "applied behavior"
            );
        });
    }

    /// Every so often the player greets the closest villager within earshot.
    pub fn player_greeting(&self) -> Option<Greeting> {
        self.read(|state| {
            if state.tick == 0 || state.tick % GREETING_EVERY != 0 {
                return None;
            }
            let player = state.agents.get(&PLAYER)?;
            let target = state
                .agents
                .values()
                .filter(|agent| !agent.is_human())
                .map(|agent| (agent.position.chebyshev_distance(player.position), agent))
                .filter(|(distance, _)| *distance <= 4)
                .min_by_key(|(distance, agent)| (*distance, agent.id))
                .map(|(_, agent)| agent)?;
            Some(Greeting {
                speaker: PLAYER,
                speaker_name: player.name.clone(),
                message: format!("Good day, {}. Anything new around here?", target.name),
                position: player.position,
                target: target.id,
            })
        })
    }

    /// Nearest other villager, used by the scripted reasoner to pick someone
    /// to talk to.
    pub fn nearest_villager(&self, id: AgentId, within: u32) -> Option<AgentId> {
        self.read(|state| {
            let origin = state.agents.get(&id)?.position;
            state
                .agents
                .values()
                .filter(|other| other.id != id && !other.is_human())
                .map(|other| (other.position.chebyshev_distance(origin), other.id))
                .filter(|(distance, _)| *distance <= within)
                .min()
                .map(|(_, other)| other)
        })
    }

    pub fn role_of(&self, id: AgentId) -> Option<Role> {
        self.read(|state| state.agents.get(&id).map(|agent| agent.role))
    }

    fn read<T>(&self, f: impl FnOnce(&VillageState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut VillageState) -> T) -> T {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

fn place(name: &str, kind: &str, x: i32, y: i32) -> PointOfInterest {
    PointOfInterest {
        name: name.to_string(),
        kind: kind.to_string(),
        position: Position::new(x, y),
    }
}

fn clamp(position: Position) -> Position {
    Position::new(position.x.clamp(0, SIZE - 1), position.y.clamp(0, SIZE - 1))
}

fn apply_action(agent: &mut AgentSnapshot, action: ActionKind) {
    let stats = &mut agent.stats;
    match action {
        ActionKind::Eat => {
            if agent.inventory.food > 0 {
                agent.inventory.food -= 1;
                stats.hunger = stats.hunger.saturating_sub(50);
            }
        }
        ActionKind::Rest => stats.energy = (stats.energy + 10).min(100),
        ActionKind::Sleep => stats.energy = 100,
        ActionKind::Gather => {
            agent.inventory.food += 1;
            stats.energy = stats.energy.saturating_sub(4);
        }
        ActionKind::Work | ActionKind::Trade => {
            agent.inventory.coins += 2;
            stats.energy = stats.energy.saturating_sub(5);
        }
        ActionKind::Attack => stats.energy = stats.energy.saturating_sub(8),
        _ => {}
    }
}

impl ClockOracle for Village {
    fn now(&self) -> Clock {
        let tick = self.read(|state| state.tick);
        let absolute = tick + self.start_offset;
        let per_day = self.clock.ticks_per_day;
        let day = (absolute / per_day) as u32;
        let time_of_day = (absolute % per_day) as f32 / per_day as f32;
        Clock::new(Tick(tick), day, time_of_day, tick * self.clock.ms_per_tick)
    }
}

impl AgentOracle for Village {
    fn agent(&self, id: AgentId) -> Option<AgentSnapshot> {
        self.read(|state| state.agents.get(&id).cloned())
    }

    fn agents(&self) -> Vec<AgentSnapshot> {
        self.read(|state| state.agents.values().cloned().collect())
    }
}

impl MapOracle for Village {
    fn find_path(&self, from: Position, to: Position) -> Vec<Position> {
        OpenFieldMap.find_path(clamp(from), clamp(to))
    }

    fn nearest_point_of_interest(&self, from: Position) -> Option<PointOfInterest> {
        self.places
            .iter()
            .min_by_key(|poi| poi.position.chebyshev_distance(from))
            .cloned()
    }

    fn locate(&self, place: &str) -> Option<Position> {
        self.places
            .iter()
            .find(|poi| poi.name.eq_ignore_ascii_case(place.trim()))
            .map(|poi| poi.position)
    }

    fn home_of(&self, agent: AgentId) -> Option<Position> {
        self.homes.get(&agent).copied()
    }
}

impl ContextOracle for Village {
    fn context_blocks(&self, agent: AgentId) -> Vec<String> {
        let clock = self.now();
        let weather = match clock.day % 3 {
            0 => "Weather: clear skies.",
            1 => "Weather: light rain since dawn.",
            _ => "Weather: fog over the fields.",
        };
        let mut blocks = vec![weather.to_string()];
        if self.role_of(agent) == Some(Role::Merchant) {
            blocks.push("Market: grain prices rose after the poor harvest.".to_string());
        }
        blocks
    }
}
