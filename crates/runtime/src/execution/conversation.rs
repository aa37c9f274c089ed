//! Two-party dialogue sessions.
//!
//! The manager owns bookkeeping (who is talking, who is cooling down); the
//! turn loop itself runs as a detached task through [`run_session`] and
//! reports back with a [`ConversationReport`].

use std::collections::{HashMap, HashSet};

use npc_core::{AgentId, Tick};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{DialogueLine, DialogueRequest, Result, RuntimeError};
use crate::brain::DialogueClient;
use crate::config::ConversationConfig;
use crate::events::{ConversationEvent, Event, EventBus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationEnd {
    MaxTurns,
    /// A speaker had nothing to say.
    Silence,
    /// The dialogue call failed; no retry.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: AgentId,
    pub name: String,
    /// What this participant remembers about the other, snapshotted at start.
    pub memories: Vec<String>,
}

impl Participant {
    pub fn new(id: AgentId, name: impl Into<String>, memories: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            memories,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: u64,
    pub initiator: Participant,
    pub responder: Participant,
    pub max_turns: u8,
    pub started_at: Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReport {
    pub session: u64,
    pub initiator: Participant,
    pub responder: Participant,
    pub lines: Vec<DialogueLine>,
    pub end: ConversationEnd,
}

impl ConversationReport {
    pub fn turns(&self) -> usize {
        self.lines.len()
    }

    /// Memory text for `agent` about the other participant.
    pub fn summary_for(&self, agent: AgentId) -> String {
        let other = if agent == self.initiator.id {
            &self.responder
        } else {
            &self.initiator
        };
        let last_heard = self.lines.iter().rev().find(|line| line.speaker == other.id);
        match last_heard {
            Some(line) => format!("Talked with {}; they said \"{}\"", other.name, line.text),
            None => format!("Tried to talk with {} but got no answer", other.name),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConversationManager {
    config: ConversationConfig,
    /// Agent to session id.
    engaged: HashMap<AgentId, u64>,
    cooldowns: HashMap<AgentId, Tick>,
    next_id: u64,
}

impl ConversationManager {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            config,
            engaged: HashMap::new(),
            cooldowns: HashMap::new(),
            next_id: 0,
        }
    }

    /// Not in a session and past any cooldown.
    pub fn can_converse(&self, agent: AgentId, tick: Tick) -> bool {
        !self.engaged.contains_key(&agent)
            && self.cooldowns.get(&agent).is_none_or(|until| tick >= *until)
    }

    pub fn in_conversation(&self, agent: AgentId) -> bool {
        self.engaged.contains_key(&agent)
    }

    pub fn cooldown_until(&self, agent: AgentId) -> Option<Tick> {
        self.cooldowns.get(&agent).copied()
    }

    pub fn active_sessions(&self) -> usize {
        self.engaged.values().collect::<HashSet<_>>().len()
    }

    /// Opens a session with a random turn budget.
    pub fn begin<R: Rng + ?Sized>(
        &mut self,
        initiator: Participant,
        responder: Participant,
        tick: Tick,
        rng: &mut R,
    ) -> Result<ConversationSession> {
        let refuse = |reason| RuntimeError::ConversationRefused {
            initiator: initiator.id,
            responder: responder.id,
            reason,
        };
        if initiator.id == responder.id {
            return Err(refuse("cannot talk to oneself"));
        }
        if !self.can_converse(initiator.id, tick) {
            return Err(refuse("initiator busy or cooling down"));
        }
        if !self.can_converse(responder.id, tick) {
            return Err(refuse("responder busy or cooling down"));
        }

        let id = self.next_id;
        self.next_id += 1;
        let max_turns = rng.gen_range(self.config.min_turns..=self.config.max_turns);
        self.engaged.insert(initiator.id, id);
        self.engaged.insert(responder.id, id);

        info!(
            target: "npc::conversation",
            session = id,
            initiator = %initiator.id,
            responder = %responder.id,
            max_turns,
            "conversation started"
        );
        Ok(ConversationSession {
            id,
            initiator,
            responder,
            max_turns,
            started_at: tick,
        })
    }

    /// Releases both participants and gives each an independent random
    /// cooldown. Returns the deadlines, initiator first; `None` for a
    /// participant that was forgotten while the session ran.
    pub fn finish<R: Rng + ?Sized>(
        &mut self,
        report: &ConversationReport,
        tick: Tick,
        rng: &mut R,
    ) -> (Option<Tick>, Option<Tick>) {
        let mut deadline_for = |agent: AgentId| {
            if self.engaged.get(&agent) != Some(&report.session) {
                return None;
            }
            self.engaged.remove(&agent);
            let cooldown = rng.gen_range(self.config.min_cooldown..=self.config.max_cooldown);
            let until = tick + cooldown;
            self.cooldowns.insert(agent, until);
            Some(until)
        };
        let initiator = deadline_for(report.initiator.id);
        let responder = deadline_for(report.responder.id);

        info!(
            target: "npc::conversation",
            session = report.session,
            turns = report.turns(),
            end = ?report.end,
            "conversation finished"
        );
        (initiator, responder)
    }

    /// Drops all state for a deregistered agent. A session still running for
    /// it finishes on its own; the report is then ignored.
    pub fn forget(&mut self, agent: AgentId) {
        self.engaged.remove(&agent);
        self.cooldowns.remove(&agent);
    }
}

/// Alternating turn loop. Ends on silence, failure, or the turn budget.
pub async fn run_session(
    session: ConversationSession,
    dialogue: DialogueClient,
    events: EventBus,
) -> ConversationReport {
    let mut lines: Vec<DialogueLine> = Vec::with_capacity(usize::from(session.max_turns));
    let mut end = ConversationEnd::MaxTurns;

    for turn in 0..usize::from(session.max_turns) {
        let (speaker, listener) = if turn % 2 == 0 {
            (&session.initiator, &session.responder)
        } else {
            (&session.responder, &session.initiator)
        };
        let request = DialogueRequest {
            speaker: speaker.id,
            speaker_name: speaker.name.clone(),
            listener: listener.id,
            listener_name: listener.name.clone(),
            memories: speaker.memories.clone(),
            transcript: lines.clone(),
        };

        let text = match dialogue.utter(&request).await {
            Ok(text) if text.trim().is_empty() => {
                end = ConversationEnd::Silence;
                break;
            }
            Ok(text) => text.trim().to_string(),
            Err(error) => {
                debug!(
                    target: "npc::conversation",
                    session = session.id,
                    speaker = %speaker.id,
                    %error,
                    "dialogue turn failed"
                );
                end = ConversationEnd::Failed(error.to_string());
                break;
            }
        };

        events.publish(Event::Conversation(ConversationEvent::Line {
            session: session.id,
            speaker: speaker.id,
            listener: listener.id,
            turn,
            text: text.clone(),
        }));
        lines.push(DialogueLine {
            speaker: speaker.id,
            speaker_name: speaker.name.clone(),
            text,
        });
    }

    ConversationReport {
        session: session.id,
        initiator: session.initiator,
        responder: session.responder,
        lines,
        end,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::api::{ReasoningError, ReasoningReply, ReasoningRequest, ReasoningService, ReasoningTier};
    use crate::brain::BatchBrain;
    use crate::config::BatchConfig;
    use crate::workers::DecisionMetrics;

    /// Says a fixed number of lines, then falls silent.
    struct Chatty {
        lines_left: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ReasoningService for Chatty {
        async fn reason_batch(
            &self,
            _tier: ReasoningTier,
            _requests: &[ReasoningRequest],
        ) -> std::result::Result<Vec<ReasoningReply>, ReasoningError> {
            Ok(Vec::new())
        }

        async fn utter(&self, request: &DialogueRequest) -> std::result::Result<String, ReasoningError> {
            if self.fail {
                return Err(ReasoningError::Service("offline".into()));
            }
            let left = self.lines_left.load(Ordering::SeqCst);
            if left == 0 {
                return Ok("   ".into());
            }
            self.lines_left.store(left - 1, Ordering::SeqCst);
            Ok(format!("{} greets {}", request.speaker_name, request.listener_name))
        }
    }

    fn participants() -> (Participant, Participant) {
        (
            Participant::new(AgentId(1), "Ada", vec![]),
            Participant::new(AgentId(2), "Bo", vec!["owes me bread".into()]),
        )
    }

    fn dialogue(lines: usize, fail: bool) -> DialogueClient {
        let service = Arc::new(Chatty {
            lines_left: AtomicUsize::new(lines),
            fail,
        });
        let config = BatchConfig {
            call_timeout: Duration::from_secs(1),
            ..BatchConfig::default()
        };
        BatchBrain::spawn(service, config, Arc::new(DecisionMetrics::new())).dialogue()
    }

    #[test]
    fn begin_refuses_busy_or_cooling_agents() {
        let mut manager = ConversationManager::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (a, b) = participants();

        let session = manager.begin(a.clone(), b.clone(), Tick(0), &mut rng).unwrap();
        assert!((3..=6).contains(&session.max_turns));
        assert!(manager.in_conversation(AgentId(1)));
        assert!(manager.begin(a.clone(), b.clone(), Tick(0), &mut rng).is_err());

        let report = ConversationReport {
            session: session.id,
            initiator: a.clone(),
            responder: b.clone(),
            lines: vec![],
            end: ConversationEnd::Silence,
        };
        let (until_a, until_b) = manager.finish(&report, Tick(10), &mut rng);
        let until_a = until_a.unwrap();
        for until in [until_a, until_b.unwrap()] {
            assert!(until >= Tick(40) && until <= Tick(70));
        }
        assert!(!manager.in_conversation(AgentId(1)));
        assert!(!manager.can_converse(AgentId(1), Tick(39)));
        assert!(manager.can_converse(AgentId(1), until_a));
        assert!(manager.begin(a.clone(), a, Tick(100), &mut rng).is_err());
    }

    #[test]
    fn forgotten_participant_gets_no_cooldown() {
        let mut manager = ConversationManager::default();
        let mut rng = StdRng::seed_from_u64(3);
        let (a, b) = participants();
        let session = manager.begin(a.clone(), b.clone(), Tick(0), &mut rng).unwrap();

        manager.forget(AgentId(2));
        let report = ConversationReport {
            session: session.id,
            initiator: a,
            responder: b,
            lines: vec![],
            end: ConversationEnd::Silence,
        };
        let (until_a, until_b) = manager.finish(&report, Tick(5), &mut rng);

        assert!(until_a.is_some());
        assert_eq!(until_b, None);
        assert_eq!(manager.cooldown_until(AgentId(2)), None);
        assert!(manager.cooldown_until(AgentId(1)).is_some());
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn session_stops_at_turn_budget() {
        let (a, b) = participants();
        let session = ConversationSession {
            id: 7,
            initiator: a,
            responder: b,
            max_turns: 3,
            started_at: Tick(0),
        };
        let events = EventBus::new();
        let mut lines_rx = events.subscribe(crate::events::Topic::Conversation);

        let report = run_session(session, dialogue(10, false), events).await;
        assert_eq!(report.end, ConversationEnd::MaxTurns);
        assert_eq!(report.turns(), 3);
        assert_eq!(report.lines[0].speaker, AgentId(1));
        assert_eq!(report.lines[1].speaker, AgentId(2));
        assert!(lines_rx.try_recv().is_ok());
        assert_eq!(report.summary_for(AgentId(1)), "Talked with Bo; they said \"Bo greets Ada\"");
    }

    #[tokio::test]
    async fn session_stops_on_silence_or_failure() {
        let (a, b) = participants();
        let session = ConversationSession {
            id: 1,
            initiator: a.clone(),
            responder: b.clone(),
            max_turns: 6,
            started_at: Tick(0),
        };
        let report = run_session(session.clone(), dialogue(1, false), EventBus::new()).await;
        assert_eq!(report.end, ConversationEnd::Silence);
        assert_eq!(report.turns(), 1);
        assert_eq!(report.summary_for(AgentId(1)), "Tried to talk with Bo but got no answer");

        let report = run_session(session, dialogue(5, true), EventBus::new()).await;
        assert!(matches!(report.end, ConversationEnd::Failed(_)));
        assert_eq!(report.turns(), 0);
    }
}
