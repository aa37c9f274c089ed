//! Read-only views of the surrounding simulation.
//!
//! The runtime never owns world state. Each tick it reads the clock, agent
//! snapshots, spatial queries, paths, and opaque context text through these
//! traits, bundled into an [`OracleManager`] that is cheap to clone.
use std::sync::Arc;

use npc_core::{AgentId, AgentSnapshot, Clock, NearbyAgent, PointOfInterest, Position};

/// Source of the current simulation time.
pub trait ClockOracle: Send + Sync {
    fn now(&self) -> Clock;
}

/// Agent snapshots and spatial queries.
pub trait AgentOracle: Send + Sync {
    fn agent(&self, id: AgentId) -> Option<AgentSnapshot>;

    /// Every agent currently in the world, human-controlled ones included.
    fn agents(&self) -> Vec<AgentSnapshot>;

    /// Agents within `radius` tiles (Chebyshev) of `id`, excluding `id` itself,
    /// nearest first.
    fn nearby(&self, id: AgentId, radius: u32) -> Vec<NearbyAgent> {
        let Some(origin) = self.agent(id) else {
            return Vec::new();
        };
        let hostiles = self.hostiles_near(id);
        let mut rows: Vec<NearbyAgent> = self
            .agents()
            .iter()
            .filter(|other| other.id != id)
            .map(|other| {
                let mut row = NearbyAgent::from_snapshot(origin.position, other);
                row.hostile = hostiles.contains(&other.id);
                row
            })
            .filter(|row| row.distance <= radius)
            .collect();
        rows.sort_by_key(|row| (row.distance, row.id));
        rows
    }

    fn in_combat(&self, id: AgentId) -> bool {
        self.agent(id).is_some_and(|snapshot| snapshot.in_combat)
    }

    /// Agents currently hostile towards `id`. The combat subsystem owns this.
    fn hostiles_near(&self, _id: AgentId) -> Vec<AgentId> {
        Vec::new()
    }
}

/// Static map queries.
pub trait MapOracle: Send + Sync {
    /// Path from `from` to `to`, excluding `from` and including `to`. Empty when
    /// unreachable or already there.
    fn find_path(&self, from: Position, to: Position) -> Vec<Position>;

    fn nearest_point_of_interest(&self, _from: Position) -> Option<PointOfInterest> {
        None
    }

    /// Resolves a named place ("well", "market") to a tile.
    fn locate(&self, _place: &str) -> Option<Position> {
        None
    }

    fn home_of(&self, _agent: AgentId) -> Option<Position> {
        None
    }
}

/// Enrichment text from social, political, ecosystem and other subsystems.
///
/// Blocks are folded into reasoning prompts verbatim; the runtime does not
/// interpret them.
pub trait ContextOracle: Send + Sync {
    fn context_blocks(&self, agent: AgentId) -> Vec<String>;
}

/// Context oracle for worlds without enrichment subsystems.
pub struct NoContext;

impl ContextOracle for NoContext {
    fn context_blocks(&self, _agent: AgentId) -> Vec<String> {
        Vec::new()
    }
}

/// Straight-line stepping for worlds without obstacles.
///
/// Steps diagonally until aligned, then straight; matches Chebyshev distance.
pub struct OpenFieldMap;

impl MapOracle for OpenFieldMap {
    fn find_path(&self, from: Position, to: Position) -> Vec<Position> {
        let mut path = Vec::with_capacity(from.chebyshev_distance(to) as usize);
        let mut cursor = from;
        while cursor != to {
            cursor = Position::new(
                cursor.x + (to.x - cursor.x).signum(),
                cursor.y + (to.y - cursor.y).signum(),
            );
            path.push(cursor);
        }
        path
    }
}

/// Bundles all oracles the scheduler reads from.
#[derive(Clone)]
pub struct OracleManager {
    pub(crate) clock: Arc<dyn ClockOracle>,
    pub(crate) agents: Arc<dyn AgentOracle>,
    pub(crate) map: Arc<dyn MapOracle>,
    pub(crate) context: Arc<dyn ContextOracle>,
}

impl OracleManager {
    pub fn new(
        clock: Arc<dyn ClockOracle>,
        agents: Arc<dyn AgentOracle>,
        map: Arc<dyn MapOracle>,
        context: Arc<dyn ContextOracle>,
    ) -> Self {
        Self {
            clock,
            agents,
            map,
            context,
        }
    }

    pub fn clock(&self) -> &dyn ClockOracle {
        self.clock.as_ref()
    }

    pub fn agents(&self) -> &dyn AgentOracle {
        self.agents.as_ref()
    }

    pub fn map(&self) -> &dyn MapOracle {
        self.map.as_ref()
    }

    pub fn context(&self) -> &dyn ContextOracle {
        self.context.as_ref()
    }
}
