//! Deterministic stand-in for a hosted reasoning model.
//!
//! Plans are shaped by role and time slot and serialized to the same JSON a
//! real model is prompted to return, so the brain's parser is exercised end
//! to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use npc_core::{AgentId, Role, TimeSlot};
use npc_runtime::{
    DialogueRequest, ReasoningError, ReasoningReply, ReasoningRequest, ReasoningService,
    ReasoningTier,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::world::Village;

/// Villagers within this many tiles may be invited to chat.
const CHAT_RANGE: u32 = 3;

const SMALL_TALK: &[&str] = &[
    "Good day to you.",
    "Busy morning at the market, I hear.",
    "The well rope needs mending again.",
    "I should get back to it before the light goes.",
];

pub struct ScriptedReasoner {
    village: Arc<Village>,
    latency: Duration,
}

impl ScriptedReasoner {
    pub fn new(village: Arc<Village>, latency: Duration) -> Self {
        Self { village, latency }
    }

    fn plan_for(&self, request: &ReasoningRequest) -> Value {
        let role = self.village.role_of(request.agent).unwrap_or(Role::Villager);
        let workplace = workplace(role);
        let interrupts = ["spoken_to", "attacked", "human_approached"];

        if request.trigger_context.is_some()
            && let Some(friend) = self.village.nearest_villager(request.agent, CHAT_RANGE)
        {
            return json!({
                "name": "catch_up",
                "steps": [
                    {"action": "talk", "target": {"agent": friend.0}},
                    {"action": "idle", "wait_after": 5},
                ],
                "interrupt_conditions": ["attacked"],
            });
        }

        match request.slot {
            TimeSlot::Dawn | TimeSlot::Morning | TimeSlot::Noon => json!({
                "name": format!("{}_shift", workplace),
                "steps": [
                    {"action": "move", "target": {"place": workplace}},
                    {"action": routine(role), "wait_after": 40},
                    {"action": "eat", "wait_after": 3},
                ],
                "interrupt_conditions": interrupts,
            }),
            TimeSlot::Afternoon => json!({
                "name": "afternoon_rounds",
                "steps": [
                    {"action": "move", "target": "well"},
                    {"action": "gather", "wait_after": 10},
                    {"action": "move", "target": {"place": workplace}},
                    {"action": routine(role), "wait_after": 30},
                ],
                "interrupt_conditions": interrupts,
            }),
            TimeSlot::Evening => json!({
                "name": "evening_at_home",
                "steps": [
                    {"action": "move", "target": "home"},
                    {"action": "rest", "wait_after": 30},
                ],
                "interrupt_conditions": ["spoken_to", "attacked"],
            }),
            TimeSlot::Night => json!({
                "name": "turn_in",
                "steps": [
                    {"action": "move", "target": "home"},
                    {"action": "sleep", "wait_after": 60},
                ],
                "interrupt_conditions": ["attacked"],
            }),
        }
    }
}

fn workplace(role: Role) -> &'static str {
    match role {
        Role::Farmer | Role::Hunter => "fields",
        Role::Merchant => "market",
        Role::Blacksmith => "forge",
        Role::Innkeeper => "inn",
        Role::Priest => "chapel",
        Role::Guard | Role::Villager | Role::Wanderer => "well",
    }
}

fn routine(role: Role) -> String {
    role.routine_action().to_string()
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn reason_batch(
        &self,
        tier: ReasoningTier,
        requests: &[ReasoningRequest],
    ) -> Result<Vec<ReasoningReply>, ReasoningError> {
        tokio::time::sleep(self.latency).await;
        debug!(target: "sim::reasoner", tier = %tier, requests = requests.len(), "batch answered");
        Ok(requests
            .iter()
            .map(|request| ReasoningReply {
                agent: request.agent,
                output: self.plan_for(request).to_string(),
            })
            .collect())
    }

    async fn utter(&self, request: &DialogueRequest) -> Result<String, ReasoningError> {
        tokio::time::sleep(self.latency / 4).await;
        let turn = request.transcript.len();
        let line = match turn {
            0 => format!("Hello, {}.", request.listener_name),
            _ => {
                let pick = (turn + agent_salt(request.speaker)) % (SMALL_TALK.len() + 1);
                SMALL_TALK.get(pick).map(|line| line.to_string()).unwrap_or_default()
            }
        };
        Ok(line)
    }
}

fn agent_salt(agent: AgentId) -> usize {
    agent.0 as usize
}
