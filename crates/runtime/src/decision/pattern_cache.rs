//! Memoized reasoning output.
//!
//! Reasoning is expensive and agents are creatures of habit: the plan a
//! farmer reasoned out for a spring morning is usually still right the next
//! spring morning. Entries are keyed by `(agent, season)` and hold one plan per
//! [`TimeSlot`]. Any trigger wipes everything cached for that agent.

use std::collections::HashMap;

use npc_core::{AgentId, Plan, Season, TimeSlot};
use tracing::trace;

#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: HashMap<(AgentId, Season), HashMap<TimeSlot, Plan>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when at least one slot is cached for this agent and season.
    pub fn has_pattern(&self, agent: AgentId, season: Season) -> bool {
        self.patterns
            .get(&(agent, season))
            .is_some_and(|slots| !slots.is_empty())
    }

    pub fn get_pattern_plan(&self, agent: AgentId, season: Season, slot: TimeSlot) -> Option<&Plan> {
        self.patterns.get(&(agent, season))?.get(&slot)
    }

    /// Overwrites whatever was cached for the slot.
    pub fn store_pattern(&mut self, agent: AgentId, season: Season, slot: TimeSlot, plan: Plan) {
        trace!(
            target: "npc::cache",
            agent = %agent,
            season = %season,
            slot = %slot,
            plan = plan.name(),
            "pattern stored"
        );
        self.patterns.entry((agent, season)).or_default().insert(slot, plan);
    }

    /// Drops every season and slot for `agent`. Returns the number of plans removed.
    pub fn invalidate_pattern(&mut self, agent: AgentId) -> usize {
        let mut removed = 0;
        self.patterns.retain(|(owner, _), slots| {
            if *owner == agent {
                removed += slots.len();
                false
            } else {
                true
            }
        });
        if removed > 0 {
            trace!(target: "npc::cache", agent = %agent, removed, "patterns invalidated");
        }
        removed
    }

    /// Total cached plans across all agents.
    pub fn len(&self) -> usize {
        self.patterns.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::ActionKind;

    fn plan(name: &str) -> Plan {
        Plan::idle(name, ActionKind::Work, 10)
    }

    #[test]
    fn lookup_is_keyed_by_season_and_slot() {
        let mut cache = PatternCache::new();
        let a = AgentId(1);
        cache.store_pattern(a, Season::Spring, TimeSlot::Morning, plan("plough"));

        assert!(cache.has_pattern(a, Season::Spring));
        assert!(!cache.has_pattern(a, Season::Summer));
        assert_eq!(
            cache.get_pattern_plan(a, Season::Spring, TimeSlot::Morning).map(Plan::name),
            Some("plough")
        );
        assert!(cache.get_pattern_plan(a, Season::Spring, TimeSlot::Evening).is_none());
        assert!(cache.get_pattern_plan(AgentId(2), Season::Spring, TimeSlot::Morning).is_none());
    }

    #[test]
    fn store_overwrites_the_slot() {
        let mut cache = PatternCache::new();
        let a = AgentId(1);
        cache.store_pattern(a, Season::Winter, TimeSlot::Noon, plan("old"));
        cache.store_pattern(a, Season::Winter, TimeSlot::Noon, plan("new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get_pattern_plan(a, Season::Winter, TimeSlot::Noon).map(Plan::name),
            Some("new")
        );
    }

    #[test]
    fn invalidation_removes_every_season_for_one_agent() {
        let mut cache = PatternCache::new();
        cache.store_pattern(AgentId(1), Season::Spring, TimeSlot::Morning, plan("a"));
        cache.store_pattern(AgentId(1), Season::Autumn, TimeSlot::Night, plan("b"));
        cache.store_pattern(AgentId(2), Season::Spring, TimeSlot::Morning, plan("c"));

        assert_eq!(cache.invalidate_pattern(AgentId(1)), 2);
        assert!(!cache.has_pattern(AgentId(1), Season::Spring));
        assert!(!cache.has_pattern(AgentId(1), Season::Autumn));
        assert!(cache.has_pattern(AgentId(2), Season::Spring));
        assert_eq!(cache.invalidate_pattern(AgentId(1)), 0);
    }
}
