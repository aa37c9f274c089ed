//! Structured plan parsing.
//!
//! The reasoning service answers with a JSON plan document:
//!
//! ```json
//! {
//!   "name": "morning_chores",
//!   "steps": [
//!     { "action": "move", "target": "well" },
//!     { "action": "gather", "params": { "item": "water" }, "wait_after": 10 },
//!     { "action": "talk", "target": { "agent": 4 } }
//!   ],
//!   "interrupt_conditions": ["spoken_to"],
//!   "max_duration": 240
//! }
//! ```
//!
//! Targets are `{x, y}`, `{agent}`, `{place}`, `"home"`, or a bare place name.
//! Anything the runtime cannot map onto a [`Plan`] is rejected whole.

use std::collections::BTreeMap;

use npc_core::{ActionKind, AgentId, InterruptCondition, Plan, PlanError, PlanStep, Position, StepTarget};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("plan is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("unknown interrupt condition `{0}`")]
    UnknownInterrupt(String),

    #[error(transparent)]
    Invalid(#[from] PlanError),
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    name: Option<String>,
    steps: Vec<RawStep>,
    #[serde(default)]
    interrupt_conditions: Vec<String>,
    #[serde(default)]
    max_duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    action: String,
    #[serde(default)]
    target: Option<RawTarget>,
    #[serde(default)]
    params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    wait_after: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Position { x: i32, y: i32 },
    Agent { agent: u32 },
    Place { place: String },
    Named(String),
}

impl From<RawTarget> for StepTarget {
    fn from(raw: RawTarget) -> Self {
        match raw {
            RawTarget::Position { x, y } => StepTarget::Position(Position::new(x, y)),
            RawTarget::Agent { agent } => StepTarget::Agent(AgentId(agent)),
            RawTarget::Place { place } => StepTarget::Place(place),
            RawTarget::Named(name) if name.eq_ignore_ascii_case("home") => StepTarget::Home,
            RawTarget::Named(name) => StepTarget::Place(name),
        }
    }
}

/// Parses one reply into a validated plan.
pub fn parse_plan(raw: &str) -> Result<Plan, PlanParseError> {
    let document: RawPlan = serde_json::from_str(strip_code_fence(raw))?;

    let steps = document
        .steps
        .into_iter()
        .map(|step| -> Result<PlanStep, PlanParseError> {
            let action: ActionKind = step
                .action
                .trim()
                .parse()
                .map_err(|_| PlanParseError::UnknownAction(step.action.clone()))?;
            let mut built = PlanStep::new(action).wait(step.wait_after);
            if let Some(target) = step.target {
                built = built.with_target(target.into());
            }
            for (key, value) in step.params {
                let value = match value {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                };
                built = built.with_param(key, value);
            }
            Ok(built)
        })
        .collect::<Result<Vec<_>, PlanParseError>>()?;

    let interrupts = document
        .interrupt_conditions
        .iter()
        .map(|name| {
            name.trim()
                .parse::<InterruptCondition>()
                .map_err(|_| PlanParseError::UnknownInterrupt(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let name = document
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "reasoned".to_string());

    let mut plan = Plan::new(name, steps)?.with_interrupts(interrupts);
    if let Some(ticks) = document.max_duration {
        plan = plan.with_max_duration(ticks)?;
    }
    Ok(plan)
}

/// Models like to wrap JSON in markdown fences; accept that.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let raw = r#"{
            "name": "morning_chores",
            "steps": [
                {"action": "move", "target": "well"},
                {"action": "Gather", "params": {"item": "water", "amount": 2}, "wait_after": 10},
                {"action": "talk", "target": {"agent": 4}},
                {"action": "move", "target": {"x": 3, "y": -1}},
                {"action": "sleep", "target": "home"}
            ],
            "interrupt_conditions": ["spoken_to", "attacked"],
            "max_duration": 240
        }"#;

        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.name(), "morning_chores");
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.steps()[0].target, Some(StepTarget::Place("well".into())));
        assert_eq!(plan.steps()[1].param("item"), Some("water"));
        assert_eq!(plan.steps()[1].param("amount"), Some("2"));
        assert_eq!(plan.steps()[1].wait_after, 10);
        assert_eq!(plan.steps()[2].target, Some(StepTarget::Agent(AgentId(4))));
        assert_eq!(plan.steps()[3].target, Some(StepTarget::Position(Position::new(3, -1))));
        assert_eq!(plan.steps()[4].target, Some(StepTarget::Home));
        assert!(plan.interrupted_by(InterruptCondition::SpokenTo));
        assert_eq!(plan.max_duration(), 240);
    }

    #[test]
    fn accepts_fenced_output() {
        let raw = "```json\n{\"steps\": [{\"action\": \"rest\", \"wait_after\": 3}]}\n```";
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.name(), "reasoned");
        assert_eq!(plan.steps()[0].action, ActionKind::Rest);
    }

    #[test]
    fn rejects_unknown_actions() {
        let raw = r#"{"steps": [{"action": "teleport"}]}"#;
        assert!(matches!(parse_plan(raw), Err(PlanParseError::UnknownAction(name)) if name == "teleport"));
    }

    #[test]
    fn rejects_invalid_plans() {
        assert!(matches!(parse_plan("not json"), Err(PlanParseError::Json(_))));
        assert!(matches!(
            parse_plan(r#"{"steps": []}"#),
            Err(PlanParseError::Invalid(PlanError::Empty))
        ));
        assert!(matches!(
            parse_plan(r#"{"steps": [{"action": "attack"}]}"#),
            Err(PlanParseError::Invalid(PlanError::MissingTarget { .. }))
        ));
        assert!(matches!(
            parse_plan(r#"{"steps": [{"action": "rest"}], "interrupt_conditions": ["bored"]}"#),
            Err(PlanParseError::UnknownInterrupt(_))
        ));
    }
}
