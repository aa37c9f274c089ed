//! Per-agent plan state machine.
//!
//! ```text
//! Idle --set_plan--> Running(0) --step done--> Running(i+1) --last step--> Completed
//!                        |   ^
//!              interrupt |   | resume / resume_at reached
//!                        v   |
//!                       Paused
//! ```
//!
//! Movement steps compute a path when they start and walk one tile per tick.
//! Every other step emits its action once and then lingers for `wait_after`
//! ticks. `max_duration` bounds the whole plan, paused time included.

use std::collections::{HashMap, VecDeque};

use npc_core::{
    ActionKind, AgentId, AgentSnapshot, InterruptCondition, Plan, PlanStep, Position, StepTarget,
    Tick,
};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, trace};

use crate::config::ExecutorConfig;
use crate::decision::DecisionSource;
use crate::events::{BehaviorEvent, PlanEvent};
use crate::oracle::OracleManager;

/// Tiles covered by one untargeted wander step.
const WANDER_RADIUS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Finished,
    TimedOut,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    Running,
    Paused {
        reason: String,
        /// Automatic resume tick; `None` waits for an explicit resume.
        resume_at: Option<Tick>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StepProgress {
    NotStarted,
    Moving { at: Position, path: VecDeque<Position> },
    Waiting { until: Tick },
}

#[derive(Debug, Clone)]
pub struct PlanState {
    plan: Plan,
    source: DecisionSource,
    step_index: usize,
    status: PlanStatus,
    started_at: Tick,
    progress: StepProgress,
}

impl PlanState {
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn source(&self) -> &DecisionSource {
        &self.source
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn status(&self) -> &PlanStatus {
        &self.status
    }

    pub fn started_at(&self) -> Tick {
        self.started_at
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.status, PlanStatus::Paused { .. })
    }
}

/// What advancing a plan produced this tick.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    Behavior(BehaviorEvent),
    Plan(PlanEvent),
    /// A `talk` step started; the orchestrator decides whether a session opens.
    ConversationRequested {
        agent: AgentId,
        target: AgentId,
        tick: Tick,
    },
}

#[derive(Debug, Default)]
pub struct PlanExecutor {
    config: ExecutorConfig,
    states: HashMap<AgentId, PlanState>,
}

impl PlanExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Installs `plan` unless one is already active. First writer wins.
    pub fn set_plan(&mut self, agent: AgentId, plan: Plan, source: DecisionSource, tick: Tick) -> bool {
        if self.states.contains_key(&agent) {
            trace!(
                target: "npc::executor",
                agent = %agent,
                rejected = plan.name(),
                "plan already active"
            );
            return false;
        }
        debug!(
            target: "npc::executor",
            agent = %agent,
            plan = plan.name(),
            steps = plan.len(),
            source = %source,
            "plan installed"
        );
        self.states.insert(
            agent,
            PlanState {
                plan,
                source,
                step_index: 0,
                status: PlanStatus::Running,
                started_at: tick,
                progress: StepProgress::NotStarted,
            },
        );
        true
    }

    pub fn has_plan(&self, agent: AgentId) -> bool {
        self.states.contains_key(&agent)
    }

    pub fn state(&self, agent: AgentId) -> Option<&PlanState> {
        self.states.get(&agent)
    }

    pub fn current_step(&self, agent: AgentId) -> Option<(usize, &PlanStep)> {
        let state = self.states.get(&agent)?;
        state.plan.step(state.step_index).map(|step| (state.step_index, step))
    }

    pub fn is_paused(&self, agent: AgentId) -> bool {
        self.states.get(&agent).is_some_and(PlanState::is_paused)
    }

    pub fn active_plans(&self) -> usize {
        self.states.len()
    }

    /// Moves the agent's plan forward by one tick.
    pub fn advance(
        &mut self,
        snapshot: &AgentSnapshot,
        tick: Tick,
        oracles: &OracleManager,
    ) -> Vec<ExecutorEvent> {
        let agent = snapshot.id;
        let mut events = Vec::new();
        let Some(state) = self.states.get_mut(&agent) else {
            return events;
        };

        if tick.since(state.started_at) >= u64::from(state.plan.max_duration()) {
            let name = state.plan.name().to_string();
            self.states.remove(&agent);
            debug!(target: "npc::executor", agent = %agent, plan = %name, "plan timed out");
            events.push(ExecutorEvent::Plan(PlanEvent::Completed {
                agent,
                plan: name,
                reason: CompletionReason::TimedOut,
                tick,
            }));
            return events;
        }

        if state.is_paused() {
            let due = matches!(
                state.status,
                PlanStatus::Paused { resume_at: Some(at), .. } if tick >= at
            );
            if !due {
                return events;
            }
            state.status = PlanStatus::Running;
            events.push(ExecutorEvent::Plan(PlanEvent::Resumed {
                agent,
                plan: state.plan.name().to_string(),
                step: state.step_index,
                tick,
            }));
        }

        let Some(step) = state.plan.step(state.step_index).cloned() else {
            // Unreachable for validated plans; treat as finished.
            return self.finish(agent, CompletionReason::Finished, tick, events);
        };

        if state.progress == StepProgress::NotStarted {
            state.progress = start_step(snapshot, &step, tick, oracles, &mut events);
        }

        if let StepProgress::Moving { at, path } = &mut state.progress {
            if let Some(next) = path.pop_front() {
                events.push(ExecutorEvent::Behavior(BehaviorEvent::Moved {
                    agent,
                    from: *at,
                    to: next,
                    tick,
                }));
                *at = next;
            }
            if path.is_empty() {
                state.progress = StepProgress::Waiting {
                    until: tick + u64::from(step.wait_after),
                };
            }
        }

        if let StepProgress::Waiting { until } = state.progress
            && tick >= until
        {
            events.push(ExecutorEvent::Plan(PlanEvent::StepCompleted {
                agent,
                plan: state.plan.name().to_string(),
                step: state.step_index,
                tick,
            }));
            state.step_index += 1;
            state.progress = StepProgress::NotStarted;
            if state.step_index >= state.plan.len() {
                return self.finish(agent, CompletionReason::Finished, tick, events);
            }
        }

        events
    }

    /// Pauses the plan when it lists `signal` among its interrupt conditions.
    /// It resumes on its own after the configured delay.
    pub fn interrupt(&mut self, agent: AgentId, signal: InterruptCondition, tick: Tick) -> Option<PlanEvent> {
        let resume_delay = self.config.resume_delay;
        let state = self.states.get_mut(&agent)?;
        if !state.plan.interrupted_by(signal) {
            return None;
        }
        let resume_at = tick + resume_delay;
        match &mut state.status {
            PlanStatus::Paused {
                resume_at: Some(existing),
                ..
            } => {
                // Repeated signal while already interrupted: extend the pause.
                *existing = (*existing).max(resume_at);
                None
            }
            // Held indefinitely (conversation); the interrupt changes nothing.
            PlanStatus::Paused { resume_at: None, .. } => None,
            PlanStatus::Running => {
                state.status = PlanStatus::Paused {
                    reason: signal.to_string(),
                    resume_at: Some(resume_at),
                };
                debug!(
                    target: "npc::executor",
                    agent = %agent,
                    signal = %signal,
                    resume_at = %resume_at,
                    "plan interrupted"
                );
                Some(PlanEvent::Paused {
                    agent,
                    plan: state.plan.name().to_string(),
                    step: state.step_index,
                    reason: signal.to_string(),
                    tick,
                })
            }
        }
    }

    /// Pauses until an explicit [`resume`](Self::resume).
    pub fn pause(&mut self, agent: AgentId, reason: impl Into<String>, tick: Tick) -> Option<PlanEvent> {
        let state = self.states.get_mut(&agent)?;
        let reason = reason.into();
        state.status = PlanStatus::Paused {
            reason: reason.clone(),
            resume_at: None,
        };
        Some(PlanEvent::Paused {
            agent,
            plan: state.plan.name().to_string(),
            step: state.step_index,
            reason,
            tick,
        })
    }

    /// Resumes at the exact step and progress where the plan paused.
    pub fn resume(&mut self, agent: AgentId, tick: Tick) -> Option<PlanEvent> {
        let state = self.states.get_mut(&agent)?;
        if !state.is_paused() {
            return None;
        }
        state.status = PlanStatus::Running;
        Some(PlanEvent::Resumed {
            agent,
            plan: state.plan.name().to_string(),
            step: state.step_index,
            tick,
        })
    }

    pub fn clear(&mut self, agent: AgentId, tick: Tick) -> Option<PlanEvent> {
        self.end(agent, CompletionReason::Cleared, tick)
    }

    fn end(&mut self, agent: AgentId, reason: CompletionReason, tick: Tick) -> Option<PlanEvent> {
        let state = self.states.remove(&agent)?;
        Some(PlanEvent::Completed {
            agent,
            plan: state.plan.name().to_string(),
            reason,
            tick,
        })
    }

    fn finish(
        &mut self,
        agent: AgentId,
        reason: CompletionReason,
        tick: Tick,
        mut events: Vec<ExecutorEvent>,
    ) -> Vec<ExecutorEvent> {
        if let Some(event) = self.end(agent, reason, tick) {
            debug!(target: "npc::executor", agent = %agent, reason = %reason, "plan completed");
            events.push(ExecutorEvent::Plan(event));
        }
        events
    }
}

fn start_step(
    snapshot: &AgentSnapshot,
    step: &PlanStep,
    tick: Tick,
    oracles: &OracleManager,
    events: &mut Vec<ExecutorEvent>,
) -> StepProgress {
    let agent = snapshot.id;

    if step.action.is_movement() {
        let origin = snapshot.position;
        let destination = match &step.target {
            Some(target) => resolve_target(agent, target, oracles),
            None => Some(wander_destination(origin, agent, tick, oracles)),
        };
        let path = match destination {
            Some(to) => oracles.map().find_path(origin, to),
            None => {
                debug!(
                    target: "npc::executor",
                    agent = %agent,
                    action = %step.action,
                    step_target = ?step.target,
                    "movement target unresolved"
                );
                Vec::new()
            }
        };
        return StepProgress::Moving {
            at: origin,
            path: path.into(),
        };
    }

    let event = match (step.action, &step.target) {
        (ActionKind::Talk, Some(StepTarget::Agent(target))) => ExecutorEvent::ConversationRequested {
            agent,
            target: *target,
            tick,
        },
        (ActionKind::Speak, target) => ExecutorEvent::Behavior(BehaviorEvent::Spoke {
            agent,
            target: match target {
                Some(StepTarget::Agent(id)) => Some(*id),
                _ => None,
            },
            message: step.param("message").unwrap_or("...").to_string(),
            tick,
        }),
        (action, target) => ExecutorEvent::Behavior(BehaviorEvent::Performed {
            agent,
            action,
            target: target.clone(),
            params: step.params.clone(),
            tick,
        }),
    };
    events.push(event);

    StepProgress::Waiting {
        until: tick + u64::from(step.wait_after),
    }
}

fn resolve_target(agent: AgentId, target: &StepTarget, oracles: &OracleManager) -> Option<Position> {
    match target {
        StepTarget::Position(position) => Some(*position),
        StepTarget::Agent(other) => oracles.agents().agent(*other).map(|snapshot| snapshot.position),
        StepTarget::Place(name) => oracles.map().locate(name),
        StepTarget::Home => oracles.map().home_of(agent),
    }
}

/// Nearest landmark if there is one, otherwise a short hop in a direction
/// derived from agent and tick.
fn wander_destination(origin: Position, agent: AgentId, tick: Tick, oracles: &OracleManager) -> Position {
    if let Some(poi) = oracles.map().nearest_point_of_interest(origin)
        && poi.position != origin
    {
        return poi.position;
    }
    const DIRECTIONS: [(i32, i32); 8] = [
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
    ];
    let index = (u64::from(agent.0) + tick.0) as usize % DIRECTIONS.len();
    let (dx, dy) = DIRECTIONS[index];
    Position::new(origin.x + dx * WANDER_RADIUS, origin.y + dy * WANDER_RADIUS)
}
