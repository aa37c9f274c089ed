//! Per-agent decision cadence.
//!
//! Agents with company decide often; lonely agents decide rarely, with jitter
//! so a crowd that went quiet together does not re-check in lockstep.

use std::time::Duration;

use npc_core::AgentSnapshot;
use rand::Rng;
use strum::Display;

use crate::config::PriorityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PriorityReason {
    Conversation,
    Company,
    Alone,
}

/// Derived, never stored: proximity changes every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityScore {
    pub interval: Duration,
    /// A human-controlled agent is within the nearby radius.
    pub premium: bool,
    pub reason: PriorityReason,
}

#[derive(Debug, Clone, Default)]
pub struct PriorityScheduler {
    config: PriorityConfig,
}

impl PriorityScheduler {
    pub fn new(config: PriorityConfig) -> Self {
        Self { config }
    }

    pub fn nearby_radius(&self) -> u32 {
        self.config.nearby_radius
    }

    /// How long `agent` must wait between decisions, given everyone's positions.
    ///
    /// Precedence: conversation, then company, then alone. Pure apart from the
    /// jitter drawn from `rng`.
    pub fn interval_for<R: Rng + ?Sized>(
        &self,
        agent: &AgentSnapshot,
        all_agents: &[AgentSnapshot],
        in_conversation: bool,
        rng: &mut R,
    ) -> PriorityScore {
        let radius = self.config.nearby_radius;
        let mut company = false;
        let mut premium = false;
        for other in all_agents.iter().filter(|other| other.id != agent.id) {
            if agent.position.chebyshev_distance(other.position) <= radius {
                company = true;
                premium |= other.is_human();
            }
        }

        let (interval, reason) = if in_conversation {
            (self.config.social_interval, PriorityReason::Conversation)
        } else if company {
            (self.config.social_interval, PriorityReason::Company)
        } else {
            let jitter_ms = self.config.alone_jitter.as_millis() as u64;
            let jitter = if jitter_ms == 0 {
                0
            } else {
                rng.gen_range(0..=jitter_ms)
            };
            (
                self.config.alone_interval + Duration::from_millis(jitter),
                PriorityReason::Alone,
            )
        };

        PriorityScore {
            interval,
            premium,
            reason,
        }
    }

    /// True when `interval` has passed since `last_decision` (or there was none).
    pub fn is_due(last_decision: Option<Duration>, now: Duration, interval: Duration) -> bool {
        match last_decision {
            None => true,
            Some(last) => now.saturating_sub(last) >= interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::{AgentId, Controller, Position, Role};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn npc(id: u32, x: i32, y: i32) -> AgentSnapshot {
        AgentSnapshot::new(AgentId(id), format!("npc{id}"), Role::Villager, Position::new(x, y))
    }

    fn human(id: u32, x: i32, y: i32) -> AgentSnapshot {
        npc(id, x, y).with_controller(Controller::Human)
    }

    #[test]
    fn alone_interval_is_jittered_within_bounds() {
        let scheduler = PriorityScheduler::default();
        let me = npc(1, 0, 0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let score = scheduler.interval_for(&me, &[me.clone()], false, &mut rng);
            assert_eq!(score.reason, PriorityReason::Alone);
            assert!(score.interval >= Duration::from_secs(90));
            assert!(score.interval <= Duration::from_secs(105));
            assert!(!score.premium);
        }
    }

    #[test]
    fn human_nearby_never_slows_decisions() {
        let scheduler = PriorityScheduler::default();
        let me = npc(1, 0, 0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let alone = scheduler.interval_for(&me, &[me.clone(), human(2, 40, 40)], false, &mut rng);
            let near = scheduler.interval_for(&me, &[me.clone(), human(2, 3, 3)], false, &mut rng);
            assert!(near.interval <= alone.interval);
            assert!(near.premium);
            assert!(!alone.premium);
        }
    }

    #[test]
    fn conversation_takes_precedence() {
        let scheduler = PriorityScheduler::default();
        let me = npc(1, 0, 0);
        let mut rng = StdRng::seed_from_u64(3);
        let score = scheduler.interval_for(&me, &[me.clone(), npc(2, 1, 0)], true, &mut rng);
        assert_eq!(score.reason, PriorityReason::Conversation);
        assert_eq!(score.interval, Duration::from_secs(15));
    }

    #[test]
    fn radius_is_inclusive() {
        let scheduler = PriorityScheduler::default();
        let me = npc(1, 0, 0);
        let mut rng = StdRng::seed_from_u64(5);
        let edge = scheduler.interval_for(&me, &[npc(2, 8, -8)], false, &mut rng);
        assert_eq!(edge.reason, PriorityReason::Company);
        let beyond = scheduler.interval_for(&me, &[npc(2, 9, 0)], false, &mut rng);
        assert_eq!(beyond.reason, PriorityReason::Alone);
    }

    #[test]
    fn due_check_handles_first_decision() {
        let interval = Duration::from_secs(15);
        assert!(PriorityScheduler::is_due(None, Duration::ZERO, interval));
        assert!(!PriorityScheduler::is_due(
            Some(Duration::from_secs(10)),
            Duration::from_secs(20),
            interval
        ));
        assert!(PriorityScheduler::is_due(
            Some(Duration::from_secs(10)),
            Duration::from_secs(25),
            interval
        ));
    }
}
