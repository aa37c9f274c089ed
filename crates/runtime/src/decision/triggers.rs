//! Per-agent trigger backlog.
//!
//! A trigger is a discrete fact ("health just dropped below 30%", "someone
//! spoke to me") that makes cached behavior untrustworthy. Triggers are queued
//! here and drained exactly once, when the agent's next reasoning request is
//! built.

use std::collections::{HashMap, VecDeque};

use npc_core::{AgentId, AgentSnapshot, Tick, Trigger, TriggerKind};
use tracing::debug;

use crate::config::TriggerConfig;

/// Health lost in one check, as a percentage of max, that counts as a hit.
const DAMAGE_PERCENT: u32 = 10;

#[derive(Debug, Default)]
struct AgentTriggers {
    pending: VecDeque<Trigger>,
    low_health: bool,
    hungry: bool,
    in_combat: bool,
    last_health: Option<u32>,
}

#[derive(Debug, Default)]
pub struct TriggerDetector {
    config: TriggerConfig,
    agents: HashMap<AgentId, AgentTriggers>,
}

impl TriggerDetector {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            agents: HashMap::new(),
        }
    }

    pub fn register(&mut self, agent: AgentId) {
        self.agents.entry(agent).or_default();
    }

    pub fn deregister(&mut self, agent: AgentId) {
        self.agents.remove(&agent);
    }

    /// Queues a trigger. Returns `false` (and drops it) for unknown agents.
    pub fn add_trigger(
        &mut self,
        agent: AgentId,
        kind: TriggerKind,
        description: impl Into<String>,
        tick: Tick,
    ) -> bool {
        let capacity = self.config.backlog_capacity.max(1);
        let Some(state) = self.agents.get_mut(&agent) else {
            debug!(
                target: "npc::triggers",
                agent = %agent,
                kind = %kind,
                "ignoring trigger for unregistered agent"
            );
            return false;
        };
        push_capped(&mut state.pending, Trigger::new(kind, description, tick), capacity);
        true
    }

    /// Compares the snapshot against the last one seen and queues a trigger
    /// for every threshold crossed since. Returns the triggers just raised.
    ///
    /// Conditions fire on the transition only; an agent that stays hungry
    /// raises one trigger, not one per tick.
    pub fn check_stat_triggers(
        &mut self,
        agent: AgentId,
        snapshot: &AgentSnapshot,
        tick: Tick,
    ) -> Vec<Trigger> {
        let capacity = self.config.backlog_capacity.max(1);
        let low_health_percent = self.config.low_health_percent;
        let hunger_threshold = self.config.hunger_threshold;
        let Some(state) = self.agents.get_mut(&agent) else {
            return Vec::new();
        };

        let stats = snapshot.stats;
        let mut raised = Vec::new();

        let low = stats.health_percent() < low_health_percent;
        if low && !state.low_health {
            raised.push(Trigger::new(
                TriggerKind::StatThreshold,
                format!("health fell to {}%", stats.health_percent()),
                tick,
            ));
        }
        state.low_health = low;

        let hungry = stats.hunger >= hunger_threshold;
        if hungry && !state.hungry {
            raised.push(Trigger::new(
                TriggerKind::StatThreshold,
                format!("hunger reached {}", stats.hunger),
                tick,
            ));
        }
        state.hungry = hungry;

        if snapshot.in_combat && !state.in_combat {
            raised.push(Trigger::new(TriggerKind::CombatStart, "combat started", tick));
        }
        state.in_combat = snapshot.in_combat;

        if let Some(previous) = state.last_health
            && stats.health < previous
            && stats.max_health > 0
            && (previous - stats.health) * 100 / stats.max_health >= DAMAGE_PERCENT
        {
            raised.push(Trigger::new(
                TriggerKind::Damaged,
                format!("lost {} health", previous - stats.health),
                tick,
            ));
        }
        state.last_health = Some(stats.health);

        for trigger in &raised {
            debug!(
                target: "npc::triggers",
                agent = %agent,
                kind = %trigger.kind,
                description = %trigger.description,
                "stat trigger raised"
            );
            push_capped(&mut state.pending, trigger.clone(), capacity);
        }
        raised
    }

    pub fn has_triggers(&self, agent: AgentId) -> bool {
        self.agents
            .get(&agent)
            .is_some_and(|state| !state.pending.is_empty())
    }

    /// Drains the backlog, oldest first.
    pub fn consume_triggers(&mut self, agent: AgentId, tick: Tick) -> Vec<Trigger> {
        let Some(state) = self.agents.get_mut(&agent) else {
            return Vec::new();
        };
        let drained: Vec<Trigger> = state.pending.drain(..).collect();
        if !drained.is_empty() {
            debug!(
                target: "npc::triggers",
                agent = %agent,
                count = drained.len(),
                tick = %tick,
                "triggers consumed"
            );
        }
        drained
    }
}

fn push_capped(queue: &mut VecDeque<Trigger>, trigger: Trigger, capacity: usize) {
    queue.push_back(trigger);
    while queue.len() > capacity {
        queue.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::{AgentStats, Position, Role};

    fn snapshot(health: u32, hunger: u32, in_combat: bool) -> AgentSnapshot {
        let mut snap = AgentSnapshot::new(AgentId(1), "Bram", Role::Farmer, Position::ORIGIN)
            .with_stats(AgentStats::new(health, 100, hunger, 50));
        snap.in_combat = in_combat;
        snap
    }

    #[test]
    fn thresholds_fire_on_crossing_only() {
        let mut detector = TriggerDetector::default();
        detector.register(AgentId(1));

        assert!(detector.check_stat_triggers(AgentId(1), &snapshot(100, 10, false), Tick(1)).is_empty());
        let raised = detector.check_stat_triggers(AgentId(1), &snapshot(100, 85, false), Tick(2));
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, TriggerKind::StatThreshold);

        // Still hungry: no new trigger.
        assert!(detector.check_stat_triggers(AgentId(1), &snapshot(100, 90, false), Tick(3)).is_empty());

        // Recover, then cross again.
        detector.check_stat_triggers(AgentId(1), &snapshot(100, 10, false), Tick(4));
        assert_eq!(
            detector.check_stat_triggers(AgentId(1), &snapshot(100, 95, false), Tick(5)).len(),
            1
        );
        assert_eq!(detector.consume_triggers(AgentId(1), Tick(6)).len(), 2);
    }

    #[test]
    fn combat_and_damage_are_reported() {
        let mut detector = TriggerDetector::default();
        detector.register(AgentId(1));
        detector.check_stat_triggers(AgentId(1), &snapshot(100, 0, false), Tick(1));

        let raised = detector.check_stat_triggers(AgentId(1), &snapshot(20, 0, true), Tick(2));
        let kinds: Vec<_> = raised.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TriggerKind::StatThreshold));
        assert!(kinds.contains(&TriggerKind::CombatStart));
        assert!(kinds.contains(&TriggerKind::Damaged));
    }

    #[test]
    fn consume_drains_exactly_once() {
        let mut detector = TriggerDetector::default();
        detector.register(AgentId(1));
        assert!(detector.add_trigger(AgentId(1), TriggerKind::SpokenTo, "hello", Tick(1)));
        assert!(detector.has_triggers(AgentId(1)));

        let drained = detector.consume_triggers(AgentId(1), Tick(2));
        assert_eq!(drained.len(), 1);
        assert!(!detector.has_triggers(AgentId(1)));
        assert!(detector.consume_triggers(AgentId(1), Tick(3)).is_empty());
    }

    #[test]
    fn backlog_drops_oldest_beyond_capacity() {
        let mut detector = TriggerDetector::new(TriggerConfig {
            backlog_capacity: 3,
            ..TriggerConfig::default()
        });
        detector.register(AgentId(1));
        for i in 0..5 {
            detector.add_trigger(AgentId(1), TriggerKind::Custom, format!("event {i}"), Tick(i));
        }
        let drained = detector.consume_triggers(AgentId(1), Tick(9));
        let descriptions: Vec<_> = drained.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, ["event 2", "event 3", "event 4"]);
    }

    #[test]
    fn unregistered_agents_are_ignored() {
        let mut detector = TriggerDetector::default();
        assert!(!detector.add_trigger(AgentId(7), TriggerKind::Custom, "x", Tick(0)));
        assert!(!detector.has_triggers(AgentId(7)));
        assert!(
            detector
                .check_stat_triggers(AgentId(7), &snapshot(1, 99, true), Tick(0))
                .is_empty()
        );
    }
}
