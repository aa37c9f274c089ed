//! Plans: the value object every decision tier produces.
//!
//! A [`Plan`] is an ordered list of [`PlanStep`]s plus the conditions that may
//! pause it and an upper bound on how long it may run. Plans are immutable once
//! built; re-planning replaces the whole object.

use std::collections::BTreeMap;

use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::common::{AgentId, Position};

/// Upper bound on plan lifetime, in ticks, when the producer does not set one.
pub const DEFAULT_MAX_DURATION: u32 = 600;

/// Every action a plan step can ask for.
///
/// Parsing is case-insensitive so structured output from the reasoning
/// service maps straight onto variants; unknown names fail to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActionKind {
    Move,
    Wander,
    Flee,
    Work,
    Gather,
    Eat,
    Rest,
    Sleep,
    /// One-off utterance, no reply expected.
    Speak,
    /// Open a two-party conversation with the step's target agent.
    Talk,
    Trade,
    Attack,
    Pray,
    Idle,
}

impl ActionKind {
    /// Movement steps complete when their path is exhausted rather than on a timer.
    pub fn is_movement(self) -> bool {
        matches!(self, ActionKind::Move | ActionKind::Wander | ActionKind::Flee)
    }

    fn requires_target(self) -> bool {
        matches!(
            self,
            ActionKind::Move | ActionKind::Flee | ActionKind::Talk | ActionKind::Attack
        )
    }
}

/// Where a step is aimed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StepTarget {
    Position(Position),
    Agent(AgentId),
    /// Named place resolved through the map oracle.
    Place(String),
    Home,
}

/// Conditions under which a running plan pauses instead of advancing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InterruptCondition {
    SpokenTo,
    Attacked,
    HumanApproached,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanStep {
    pub action: ActionKind,
    pub params: BTreeMap<String, String>,
    pub target: Option<StepTarget>,
    /// Ticks to linger after the action itself is done.
    pub wait_after: u32,
}

impl PlanStep {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            params: BTreeMap::new(),
            target: None,
            wait_after: 0,
        }
    }

    pub fn with_target(mut self, target: StepTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn wait(mut self, ticks: u32) -> Self {
        self.wait_after = ticks;
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("plan has no steps")]
    Empty,

    #[error("plan max_duration must be at least one tick")]
    ZeroDuration,

    #[error("step {index} ({action}) requires a target")]
    MissingTarget { index: usize, action: ActionKind },
}

/// An ordered, bounded sequence of timed actions.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Plan {
    name: String,
    steps: Vec<PlanStep>,
    interrupt_conditions: Vec<InterruptCondition>,
    max_duration: u32,
}

impl Plan {
    /// Validates and builds a plan with the default duration bound and no
    /// interrupt conditions.
    pub fn new(name: impl Into<String>, steps: Vec<PlanStep>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::Empty);
        }
        if let Some((index, step)) = steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.action.requires_target() && s.target.is_none())
        {
            return Err(PlanError::MissingTarget {
                index,
                action: step.action,
            });
        }

        Ok(Self {
            name: name.into(),
            steps,
            interrupt_conditions: Vec::new(),
            max_duration: DEFAULT_MAX_DURATION,
        })
    }

    /// One-step plan for actions that need no target. Cannot fail.
    pub fn idle(name: impl Into<String>, action: ActionKind, wait_after: u32) -> Self {
        let action = if action.requires_target() {
            ActionKind::Idle
        } else {
            action
        };
        Self {
            name: name.into(),
            steps: vec![PlanStep::new(action).wait(wait_after)],
            interrupt_conditions: Vec::new(),
            max_duration: DEFAULT_MAX_DURATION,
        }
    }

    pub fn with_interrupts(mut self, conditions: impl IntoIterator<Item = InterruptCondition>) -> Self {
        for condition in conditions {
            if !self.interrupt_conditions.contains(&condition) {
                self.interrupt_conditions.push(condition);
            }
        }
        self
    }

    pub fn with_max_duration(mut self, ticks: u32) -> Result<Self, PlanError> {
        if ticks == 0 {
            return Err(PlanError::ZeroDuration);
        }
        self.max_duration = ticks;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn interrupt_conditions(&self) -> &[InterruptCondition] {
        &self.interrupt_conditions
    }

    pub fn interrupted_by(&self, signal: InterruptCondition) -> bool {
        self.interrupt_conditions.contains(&signal)
    }

    pub fn max_duration(&self) -> u32 {
        self.max_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_untargeted_plans() {
        assert_eq!(Plan::new("nothing", vec![]), Err(PlanError::Empty));
        assert_eq!(
            Plan::new("lost", vec![PlanStep::new(ActionKind::Rest), PlanStep::new(ActionKind::Move)]),
            Err(PlanError::MissingTarget {
                index: 1,
                action: ActionKind::Move
            })
        );
    }

    #[test]
    fn idle_plan_never_needs_a_target() {
        let plan = Plan::idle("bad", ActionKind::Attack, 3);
        assert_eq!(plan.steps()[0].action, ActionKind::Idle);
        assert_eq!(plan.steps()[0].wait_after, 3);
    }

    #[test]
    fn interrupts_are_deduplicated() {
        let plan = Plan::idle("rest", ActionKind::Rest, 1).with_interrupts([
            InterruptCondition::SpokenTo,
            InterruptCondition::SpokenTo,
            InterruptCondition::Attacked,
        ]);
        assert_eq!(plan.interrupt_conditions().len(), 2);
        assert!(plan.interrupted_by(InterruptCondition::Attacked));
        assert!(!plan.interrupted_by(InterruptCondition::HumanApproached));
    }

    #[test]
    fn action_names_parse_case_insensitively() {
        assert_eq!("MOVE".parse::<ActionKind>().unwrap(), ActionKind::Move);
        assert!("teleport".parse::<ActionKind>().is_err());
        assert_eq!(ActionKind::Talk.to_string(), "talk");
    }
}
