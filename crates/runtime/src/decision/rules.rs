//! Deterministic fast path.
//!
//! Survival decisions ("I am starving and carry bread") have one obvious
//! answer and never need the reasoning service. The [`RuleEngine`] runs an
//! ordered chain of [`Rule`]s and returns the first plan produced, the same
//! way a behavior-tree selector returns its first succeeding child.

use npc_core::{ActionKind, InterruptCondition, Plan, PlanStep, StepTarget, TimeSlot};
use tracing::trace;

use super::DecisionContext;

/// Health percentage below which a fighter breaks off and runs.
pub const CRITICAL_HEALTH_PERCENT: u32 = 25;

/// Hunger at or above which an agent carrying food eats immediately.
pub const STARVING_HUNGER: u32 = 90;

/// Energy at or below which an agent must rest.
pub const EXHAUSTED_ENERGY: u32 = 10;

/// Tiles an agent runs when fleeing.
const FLEE_DISTANCE: i32 = 6;

/// A pure decision rule. Returns `None` to let the next rule try.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &DecisionContext) -> Option<Plan>;
}

impl Rule for Box<dyn Rule> {
    #[inline]
    fn name(&self) -> &'static str {
        (**self).name()
    }

    #[inline]
    fn evaluate(&self, ctx: &DecisionContext) -> Option<Plan> {
        (**self).evaluate(ctx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: &'static str,
    pub plan: Plan,
}

pub struct FleeDanger;

impl Rule for FleeDanger {
    fn name(&self) -> &'static str {
        "flee_danger"
    }

    fn evaluate(&self, ctx: &DecisionContext) -> Option<Plan> {
        if !ctx.in_combat || ctx.agent.stats.health_percent() >= CRITICAL_HEALTH_PERCENT {
            return None;
        }
        let target = match ctx.nearest_hostile() {
            Some(hostile) => {
                StepTarget::Position(ctx.agent.position.away_from(hostile.position, FLEE_DISTANCE))
            }
            None => StepTarget::Home,
        };
        Plan::new(
            self.name(),
            vec![
                PlanStep::new(ActionKind::Flee).with_target(target),
                PlanStep::new(ActionKind::Rest).wait(5),
            ],
        )
        .ok()
    }
}

pub struct DefendSelf;

impl Rule for DefendSelf {
    fn name(&self) -> &'static str {
        "defend_self"
    }

    fn evaluate(&self, ctx: &DecisionContext) -> Option<Plan> {
        if !ctx.in_combat {
            return None;
        }
        let hostile = ctx.nearest_hostile()?;
        Plan::new(
            self.name(),
            vec![
                PlanStep::new(ActionKind::Attack)
                    .with_target(StepTarget::Agent(hostile.id))
                    .wait(2),
            ],
        )
        .and_then(|plan| plan.with_max_duration(20))
        .ok()
    }
}

pub struct Starving;

impl Rule for Starving {
    fn name(&self) -> &'static str {
        "starving"
    }

    fn evaluate(&self, ctx: &DecisionContext) -> Option<Plan> {
        if ctx.addressed_by.is_some()
            || ctx.agent.stats.hunger < STARVING_HUNGER
            || !ctx.agent.inventory.has_food()
        {
            return None;
        }
        Some(Plan::idle(self.name(), ActionKind::Eat, 5).with_interrupts([InterruptCondition::Attacked]))
    }
}

pub struct Exhausted;

impl Rule for Exhausted {
    fn name(&self) -> &'static str {
        "exhausted"
    }

    fn evaluate(&self, ctx: &DecisionContext) -> Option<Plan> {
        if ctx.addressed_by.is_some() || ctx.agent.stats.energy > EXHAUSTED_ENERGY {
            return None;
        }
        Some(Plan::idle(self.name(), ActionKind::Rest, 20).with_interrupts([
            InterruptCondition::Attacked,
            InterruptCondition::SpokenTo,
        ]))
    }
}

pub struct NightSleep;

impl Rule for NightSleep {
    fn name(&self) -> &'static str {
        "night_sleep"
    }

    fn evaluate(&self, ctx: &DecisionContext) -> Option<Plan> {
        if ctx.addressed_by.is_some() || ctx.slot != TimeSlot::Night {
            return None;
        }
        let mut steps = Vec::with_capacity(2);
        if ctx.home.is_some_and(|home| home != ctx.agent.position) {
            steps.push(PlanStep::new(ActionKind::Move).with_target(StepTarget::Home));
        }
        steps.push(PlanStep::new(ActionKind::Sleep).wait(120));
        Plan::new(self.name(), steps).ok().map(|plan| {
            plan.with_interrupts([InterruptCondition::Attacked, InterruptCondition::SpokenTo])
        })
    }
}

/// Ordered rule chain; first match wins.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Survival first, then routine: flee, defend, eat, rest, sleep.
    pub fn with_default_rules() -> Self {
        Self::new(vec![
            Box::new(FleeDanger),
            Box::new(DefendSelf),
            Box::new(Starving),
            Box::new(Exhausted),
            Box::new(NightSleep),
        ])
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn evaluate(&self, ctx: &DecisionContext) -> Option<RuleMatch> {
        self.rules.iter().find_map(|rule| {
            let plan = rule.evaluate(ctx)?;
            trace!(
                target: "npc::rules",
                agent = %ctx.agent.id,
                rule = rule.name(),
                plan = plan.name(),
                "rule matched"
            );
            Some(RuleMatch {
                rule: rule.name(),
                plan,
            })
        })
    }

    /// Ambient behavior used when every other tier fails. Never empty.
    pub fn fallback_plan(&self, ctx: &DecisionContext) -> Plan {
        let action = if ctx.slot.is_dark() {
            ActionKind::Rest
        } else {
            ctx.agent.role.routine_action()
        };
        Plan::idle(format!("ambient_{action}"), action, 30).with_interrupts([
            InterruptCondition::SpokenTo,
            InterruptCondition::Attacked,
            InterruptCondition::HumanApproached,
        ])
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::{
        AgentId, AgentSnapshot, AgentStats, Clock, InventorySummary, NearbyAgent, Position, Role,
        Tick,
    };

    fn context(stats: AgentStats, time_of_day: f32) -> DecisionContext {
        let agent = AgentSnapshot::new(AgentId(1), "Oda", Role::Farmer, Position::new(2, 2))
            .with_stats(stats)
            .with_inventory(InventorySummary {
                food: 2,
                ..InventorySummary::default()
            });
        DecisionContext::new(agent, Clock::new(Tick(0), 0, time_of_day, 0))
    }

    fn hostile_at(x: i32, y: i32) -> NearbyAgent {
        let other = AgentSnapshot::new(AgentId(9), "Wolf", Role::Wanderer, Position::new(x, y));
        let mut row = NearbyAgent::from_snapshot(Position::new(2, 2), &other);
        row.hostile = true;
        row
    }

    #[test]
    fn critical_health_in_combat_flees_away_from_threat() {
        let mut ctx = context(AgentStats::new(10, 100, 0, 80), 0.5)
            .with_nearby(vec![hostile_at(4, 2)]);
        ctx.in_combat = true;

        let matched = RuleEngine::default().evaluate(&ctx).unwrap();
        assert_eq!(matched.rule, "flee_danger");
        assert_eq!(
            matched.plan.steps()[0].target,
            Some(StepTarget::Position(Position::new(-4, 2)))
        );
    }

    #[test]
    fn healthy_fighter_defends() {
        let mut ctx = context(AgentStats::new(90, 100, 0, 80), 0.5)
            .with_nearby(vec![hostile_at(3, 3)]);
        ctx.in_combat = true;

        let matched = RuleEngine::default().evaluate(&ctx).unwrap();
        assert_eq!(matched.rule, "defend_self");
        assert_eq!(matched.plan.steps()[0].target, Some(StepTarget::Agent(AgentId(9))));
    }

    #[test]
    fn starving_agent_with_food_eats() {
        let ctx = context(AgentStats::new(100, 100, 95, 80), 0.5);
        let matched = RuleEngine::default().evaluate(&ctx).unwrap();
        assert_eq!(matched.rule, "starving");
        assert_eq!(matched.plan.steps()[0].action, ActionKind::Eat);
    }

    #[test]
    fn night_sends_agent_home_to_sleep() {
        let ctx = context(AgentStats::default(), 0.95).with_home(Some(Position::new(0, 0)));
        let matched = RuleEngine::default().evaluate(&ctx).unwrap();
        assert_eq!(matched.rule, "night_sleep");
        let actions: Vec<_> = matched.plan.steps().iter().map(|s| s.action).collect();
        assert_eq!(actions, [ActionKind::Move, ActionKind::Sleep]);
    }

    #[test]
    fn routine_rules_abstain_when_addressed() {
        let ctx = context(AgentStats::new(100, 100, 95, 5), 0.95).addressed_by(Some(AgentId(4)));
        assert!(RuleEngine::default().evaluate(&ctx).is_none());
    }

    #[test]
    fn default_rules_run_survival_first() {
        let names = RuleEngine::default().rule_names();
        assert_eq!(names.first(), Some(&"flee_danger"));
        assert_eq!(names.last(), Some(&"night_sleep"));
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn ordinary_daytime_falls_through() {
        let ctx = context(AgentStats::default(), 0.4);
        assert!(RuleEngine::default().evaluate(&ctx).is_none());
    }

    #[test]
    fn fallback_is_never_empty() {
        let engine = RuleEngine::default();
        let day = engine.fallback_plan(&context(AgentStats::default(), 0.4));
        assert_eq!(day.steps()[0].action, ActionKind::Work);
        let night = engine.fallback_plan(&context(AgentStats::default(), 0.95));
        assert_eq!(night.steps()[0].action, ActionKind::Rest);
        assert!(night.interrupted_by(InterruptCondition::SpokenTo));
    }
}
