//! The orchestrator.
//!
//! [`NpcScheduler`] owns every decision component and runs them once per
//! world tick:
//!
//! 1. finished conversations and returned reasoning results are applied
//! 2. each registered agent, in id order, has its stat triggers checked and
//!    its active plan advanced
//! 3. agents with no plan, no outstanding request, and an elapsed interval
//!    decide: rules, then the pattern cache, then a batched reasoning request
//!
//! Per-agent state is only touched through `&mut self`; reasoning calls and
//! conversation turn loops run detached and report back over channels.

mod builder;
mod state;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use npc_core::{
    ActionKind, AgentId, AgentSnapshot, Clock, InterruptCondition, Plan, Position, Tick, TriggerKind,
};
use rand::rngs::StdRng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::api::{ReasoningRequest, ReasoningTier, Result, RuntimeError};
use crate::brain::BatchOutcome;
use crate::brain::prompt::{situation_prompt, trigger_context};
use crate::config::SchedulerConfig;
use crate::decision::{
    DecisionContext, DecisionSource, PatternCache, PriorityScheduler, RuleEngine, TriggerDetector,
};
use crate::events::{ConversationEvent, DecisionEvent, Event, EventBus, PlanEvent, Topic};
use crate::execution::{
    ConversationManager, ConversationReport, ExecutorEvent, Participant, PlanExecutor, run_session,
};
use crate::memory::MemoryStore;
use crate::oracle::OracleManager;
use crate::workers::{DecisionMetrics, MetricsSnapshot};

pub use builder::NpcSchedulerBuilder;
pub use state::{PresenceFlags, SchedulerRuntime};
use state::PendingRequest;

/// Memories handed to a reasoning prompt.
const PROMPT_MEMORIES: usize = 3;

/// What one call to [`NpcScheduler::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: Tick,
    pub agents: usize,
    pub advanced: usize,
    pub rule_hits: usize,
    pub cache_hits: usize,
    pub enqueued: usize,
    pub installed: usize,
    pub stale_drops: usize,
    pub fallbacks: usize,
    pub conversations_started: usize,
    pub conversations_finished: usize,
}

pub struct NpcScheduler {
    config: SchedulerConfig,
    oracles: OracleManager,
    events: EventBus,
    metrics: Arc<DecisionMetrics>,
    brain: crate::brain::BatchBrain,
    priority: PriorityScheduler,
    triggers: TriggerDetector,
    cache: PatternCache,
    rules: RuleEngine,
    executor: PlanExecutor,
    conversations: ConversationManager,
    memory: MemoryStore,
    runtimes: BTreeMap<AgentId, SchedulerRuntime>,
    /// Outcomes received by `pump_results`, applied on the next tick.
    ready: Vec<BatchOutcome>,
    conversation_tx: mpsc::UnboundedSender<ConversationReport>,
    conversation_rx: mpsc::UnboundedReceiver<ConversationReport>,
    /// Reports received by `pump_conversations`, applied on the next tick.
    finished: Vec<ConversationReport>,
    rng: StdRng,
    next_ticket: u64,
}

impl NpcScheduler {
    pub fn builder() -> NpcSchedulerBuilder {
        NpcSchedulerBuilder::new()
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Starts scheduling `agent`. Human-controlled agents are refused.
    pub fn register(&mut self, agent: AgentId) -> Result<()> {
        let snapshot = self
            .oracles
            .agents()
            .agent(agent)
            .ok_or(RuntimeError::UnknownAgent(agent))?;
        if snapshot.is_human() {
            return Err(RuntimeError::HumanControlled(agent));
        }
        if self.runtimes.contains_key(&agent) {
            return Ok(());
        }
        self.runtimes.insert(
            agent,
            SchedulerRuntime::new(self.config.social.recent_chat_capacity),
        );
        self.triggers.register(agent);
        info!(target: "npc::scheduler", agent = %agent, name = %snapshot.name, "agent registered");
        Ok(())
    }

    /// Stops scheduling `agent` and drops everything held for it. Results
    /// still in flight are discarded when they arrive.
    pub fn deregister(&mut self, agent: AgentId) -> bool {
        if self.runtimes.remove(&agent).is_none() {
            return false;
        }
        let tick = self.oracles.clock().now().tick;
        self.triggers.deregister(agent);
        self.cache.invalidate_pattern(agent);
        self.conversations.forget(agent);
        self.memory.forget(agent);
        if let Some(event) = self.executor.clear(agent, tick) {
            self.events.publish(Event::Plan(event));
        }
        info!(target: "npc::scheduler", agent = %agent, "agent deregistered");
        true
    }

    pub fn is_registered(&self, agent: AgentId) -> bool {
        self.runtimes.contains_key(&agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.runtimes.keys().copied()
    }

    // ---------------------------------------------------------------------
    // External entry points
    // ---------------------------------------------------------------------

    pub fn has_plan(&self, agent: AgentId) -> bool {
        self.executor.has_plan(agent)
    }

    /// Installs a plan from outside the decision pipeline. Returns `false`
    /// when the agent is unknown or already busy.
    pub fn set_plan(&mut self, agent: AgentId, plan: Plan) -> bool {
        if !self.runtimes.contains_key(&agent) {
            return false;
        }
        let tick = self.oracles.clock().now().tick;
        self.install(agent, plan, DecisionSource::External, tick)
    }

    /// Raises a trigger from an outside subsystem and invalidates the agent's
    /// cached patterns.
    pub fn add_trigger(&mut self, agent: AgentId, kind: TriggerKind, description: impl Into<String>) -> bool {
        let tick = self.oracles.clock().now().tick;
        let description = description.into();
        if !self.triggers.add_trigger(agent, kind, description.clone(), tick) {
            return false;
        }
        self.on_trigger(agent, kind, description, tick);
        true
    }

    /// Routes a line of speech from the world.
    ///
    /// Registered agents within hearing radius of `position` overhear it. If
    /// it was addressed to `target`, that agent gets a `SpokenTo` trigger, its
    /// cached patterns are dropped, its plan is interrupted when the plan
    /// allows it, and it becomes due for a decision immediately.
    pub fn feed_chat(
        &mut self,
        speaker: AgentId,
        speaker_name: &str,
        message: &str,
        position: Position,
        target: Option<AgentId>,
    ) {
        let tick = self.oracles.clock().now().tick;
        let hearing = self.config.social.hearing_radius;
        let line = format!("{}: {}", speaker_name, message);

        let listeners: Vec<AgentId> = self
            .oracles
            .agents()
            .agents()
            .into_iter()
            .filter(|other| other.id != speaker)
            .filter(|other| other.position.chebyshev_distance(position) <= hearing)
            .map(|other| other.id)
            .collect();
        for listener in listeners {
            if let Some(runtime) = self.runtimes.get_mut(&listener) {
                runtime.overhear(line.clone());
            }
        }

        let Some(target) = target else {
            return;
        };
        if !self.runtimes.contains_key(&target) {
            trace!(target: "npc::scheduler", agent = %target, "chat addressed to unscheduled agent");
            return;
        }

        let description = format!("{} said \"{}\"", speaker_name, message);
        if self
            .triggers
            .add_trigger(target, TriggerKind::SpokenTo, description.clone(), tick)
        {
            self.on_trigger(target, TriggerKind::SpokenTo, description, tick);
        }
        self.memory.record(
            target,
            Some(speaker),
            format!("{} told me \"{}\"", speaker_name, message),
            tick,
        );
        if let Some(runtime) = self.runtimes.get_mut(&target) {
            runtime.addressed_by = Some(speaker);
            runtime.last_decision = None;
        }
        if let Some(event) = self.executor.interrupt(target, InterruptCondition::SpokenTo, tick) {
            self.events.publish(Event::Plan(event));
        }
    }

    /// Opens a conversation between two registered agents within reach.
    /// Returns the session id.
    pub fn start_conversation(&mut self, initiator: AgentId, responder: AgentId) -> Result<u64> {
        let tick = self.oracles.clock().now().tick;
        let a = self.scheduled_snapshot(initiator)?;
        let b = self.scheduled_snapshot(responder)?;

        if a.position.chebyshev_distance(b.position) > self.config.conversation.reach {
            return Err(RuntimeError::ConversationRefused {
                initiator,
                responder,
                reason: "too far apart",
            });
        }

        let per_turn = self.config.social.memories_per_turn;
        let first = Participant::new(a.id, a.name, self.memory.recall_about(a.id, b.id, per_turn));
        let second = Participant::new(b.id, b.name, self.memory.recall_about(b.id, a.id, per_turn));
        let session = self.conversations.begin(first, second, tick, &mut self.rng)?;
        let session_id = session.id;

        for agent in [initiator, responder] {
            if let Some(event) = self.executor.pause(agent, "conversation", tick) {
                self.events.publish(Event::Plan(event));
            }
            if let Some(runtime) = self.runtimes.get_mut(&agent) {
                runtime.flags.insert(PresenceFlags::IN_CONVERSATION);
            }
        }

        self.events.publish(Event::Conversation(ConversationEvent::Started {
            session: session_id,
            initiator,
            responder,
            max_turns: session.max_turns,
            tick,
        }));

        let dialogue = self.brain.dialogue();
        let events = self.events.clone();
        let reports = self.conversation_tx.clone();
        tokio::spawn(async move {
            let report = run_session(session, dialogue, events).await;
            if reports.send(report).is_err() {
                debug!(target: "npc::conversation", session = session_id, "scheduler gone before session ended");
            }
        });

        Ok(session_id)
    }

    pub fn in_conversation(&self, agent: AgentId) -> bool {
        self.conversations.in_conversation(agent)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared counters, for exporting from another task.
    pub fn metrics_handle(&self) -> Arc<DecisionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.events.subscribe(topic)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn runtime(&self, agent: AgentId) -> Option<&SchedulerRuntime> {
        self.runtimes.get(&agent)
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    pub fn pattern_cache(&self) -> &PatternCache {
        &self.cache
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    // ---------------------------------------------------------------------
    // Async result plumbing
    // ---------------------------------------------------------------------

    /// Waits for the next reasoning batch and holds it for the next tick.
    /// Returns the number of outcomes received; zero once the brain is gone.
    pub async fn pump_results(&mut self) -> usize {
        match self.brain.next_results().await {
            Some(batch) => {
                let received = batch.len();
                self.ready.extend(batch);
                received
            }
            None => 0,
        }
    }

    /// Waits for the next conversation to finish and holds its report for the
    /// next tick.
    pub async fn pump_conversations(&mut self) -> bool {
        match self.conversation_rx.recv().await {
            Some(report) => {
                self.finished.push(report);
                true
            }
            None => false,
        }
    }

    /// Hands reasoning results to `callback` from a background task instead of
    /// buffering them for [`tick`](Self::tick). Outcomes only take effect once
    /// passed back through [`deliver`](Self::deliver).
    pub fn on_results<F>(&mut self, callback: F) -> Result<tokio::task::JoinHandle<()>>
    where
        F: FnMut(Vec<BatchOutcome>) + Send + 'static,
    {
        self.brain.on_results(callback)
    }

    /// Queues outcomes received outside the scheduler for the next tick.
    pub fn deliver(&mut self, outcomes: impl IntoIterator<Item = BatchOutcome>) {
        self.ready.extend(outcomes);
    }

    /// Stops the batch worker after it flushes pending requests.
    pub async fn shutdown(self) -> Result<()> {
        self.brain.shutdown().await
    }

    // ---------------------------------------------------------------------
    // Tick
    // ---------------------------------------------------------------------

    pub fn tick(&mut self) -> TickSummary {
        let clock = self.oracles.clock().now();
        let mut summary = TickSummary {
            tick: clock.tick,
            agents: self.runtimes.len(),
            ..TickSummary::default()
        };

        self.apply_conversations(clock.tick, &mut summary);

        let mut outcomes = std::mem::take(&mut self.ready);
        outcomes.extend(self.brain.drain_results());
        self.apply_outcomes(outcomes, clock.tick, &mut summary);

        let snapshots = self.oracles.agents().agents();
        let by_id: HashMap<AgentId, &AgentSnapshot> =
            snapshots.iter().map(|snapshot| (snapshot.id, snapshot)).collect();
        let ids: Vec<AgentId> = self.runtimes.keys().copied().collect();

        for id in ids {
            let Some(snapshot) = by_id.get(&id) else {
                trace!(target: "npc::scheduler", agent = %id, "no snapshot this tick");
                continue;
            };
            self.step_agent(snapshot, &snapshots, &clock, &mut summary);
        }

        trace!(
            target: "npc::scheduler",
            tick = %summary.tick,
            advanced = summary.advanced,
            rule_hits = summary.rule_hits,
            cache_hits = summary.cache_hits,
            enqueued = summary.enqueued,
            "tick complete"
        );
        summary
    }

    fn step_agent(
        &mut self,
        snapshot: &AgentSnapshot,
        all_agents: &[AgentSnapshot],
        clock: &Clock,
        summary: &mut TickSummary,
    ) {
        let id = snapshot.id;
        let tick = clock.tick;

        for trigger in self.triggers.check_stat_triggers(id, snapshot, tick) {
            self.on_trigger(id, trigger.kind, trigger.description, tick);
        }

        let premium = self.update_presence(snapshot, all_agents, tick);

        if self.executor.has_plan(id) {
            let produced = self.executor.advance(snapshot, tick, &self.oracles);
            summary.advanced += 1;
            self.dispatch(produced, summary);
        }

        let pending_timeout = self.config.executor.pending_timeout;
        let mut timed_out = false;
        if let Some(runtime) = self.runtimes.get_mut(&id)
            && runtime
                .pending
                .is_some_and(|pending| tick.since(pending.since) >= pending_timeout)
        {
            runtime.pending = None;
            timed_out = true;
        }
        if timed_out {
            warn!(target: "npc::scheduler", agent = %id, "reasoning request timed out");
            self.install_fallback(id, "reasoning request timed out", tick, summary);
        }

        let Some(runtime) = self.runtimes.get(&id) else {
            return;
        };
        if self.executor.has_plan(id)
            || runtime.pending.is_some()
            || self.conversations.in_conversation(id)
            || !PriorityScheduler::is_due(runtime.last_decision, clock.elapsed(), runtime.interval)
        {
            return;
        }

        self.decide(snapshot, clock, premium, summary);
    }

    /// Refreshes presence flags and the decision interval. Returns whether a
    /// human is close enough to warrant the premium tier.
    fn update_presence(&mut self, snapshot: &AgentSnapshot, all_agents: &[AgentSnapshot], tick: Tick) -> bool {
        let id = snapshot.id;
        let in_conversation = self.conversations.in_conversation(id);
        let score = self
            .priority
            .interval_for(snapshot, all_agents, in_conversation, &mut self.rng);
        let radius = self.priority.nearby_radius();
        let others_nearby = all_agents
            .iter()
            .any(|other| other.id != id && other.position.chebyshev_distance(snapshot.position) <= radius);

        let Some(runtime) = self.runtimes.get_mut(&id) else {
            return score.premium;
        };

        let mut flags = PresenceFlags::empty();
        flags.set(PresenceFlags::OTHERS_NEARBY, others_nearby);
        flags.set(PresenceFlags::HUMAN_NEARBY, score.premium);
        flags.set(PresenceFlags::IN_COMBAT, snapshot.in_combat);
        flags.set(PresenceFlags::IN_CONVERSATION, in_conversation);
        let human_arrived =
            flags.contains(PresenceFlags::HUMAN_NEARBY) && !runtime.flags.contains(PresenceFlags::HUMAN_NEARBY);
        runtime.flags = flags;

        // Keep the jittered interval stable while the situation is unchanged.
        if runtime.interval_reason != Some(score.reason) {
            runtime.interval = score.interval;
            runtime.interval_reason = Some(score.reason);
        }

        if human_arrived
            && let Some(event) = self.executor.interrupt(id, InterruptCondition::HumanApproached, tick)
        {
            self.events.publish(Event::Plan(event));
        }
        score.premium
    }

    /// Rules, then cache, then reasoning.
    fn decide(&mut self, snapshot: &AgentSnapshot, clock: &Clock, premium: bool, summary: &mut TickSummary) {
        let id = snapshot.id;
        let tick = clock.tick;
        let addressed_by = self.runtimes.get_mut(&id).and_then(|runtime| {
            runtime.last_decision = Some(clock.elapsed());
            runtime.addressed_by.take()
        });
        let ctx = self.build_context(snapshot, *clock, addressed_by);

        if let Some(matched) = self.rules.evaluate(&ctx) {
            self.metrics.record_rule_hit();
            summary.rule_hits += 1;
            self.install(id, matched.plan, DecisionSource::Rule(matched.rule.to_string()), tick);
            summary.installed += 1;
            return;
        }

        if !self.triggers.has_triggers(id)
            && let Some(plan) = self.cache.get_pattern_plan(id, ctx.season, ctx.slot).cloned()
        {
            self.metrics.record_cache_hit();
            summary.cache_hits += 1;
            self.install(id, plan, DecisionSource::Cache, tick);
            summary.installed += 1;
            return;
        }

        let triggers = self.triggers.consume_triggers(id, tick);
        let (recent_chat, memories) = match self.runtimes.get(&id) {
            Some(runtime) => (
                runtime.recent_chat.iter().cloned().collect::<Vec<_>>(),
                self.memory.recent(id, PROMPT_MEMORIES),
            ),
            None => (Vec::new(), Vec::new()),
        };
        let blocks = self.oracles.context().context_blocks(id);
        let request = ReasoningRequest {
            agent: id,
            prompt_context: situation_prompt(&ctx, &recent_chat, &memories, &blocks),
            trigger_context: trigger_context(&triggers),
            premium,
            season: ctx.season,
            slot: ctx.slot,
            requested_at: tick,
            ticket: self.next_ticket,
        };
        self.next_ticket += 1;
        let tier = request.tier();
        let request_ticket = request.ticket;

        match self.brain.enqueue(request) {
            Ok(()) => {
                if let Some(runtime) = self.runtimes.get_mut(&id) {
                    runtime.pending = Some(PendingRequest {
                        ticket: request_ticket,
                        since: tick,
                    });
                }
                summary.enqueued += 1;
                self.events.publish(Event::Decision(DecisionEvent::ReasoningQueued {
                    agent: id,
                    tier,
                    triggers: triggers.len(),
                    tick,
                }));
            }
            Err(error) => {
                warn!(target: "npc::scheduler", agent = %id, %error, "could not enqueue reasoning");
                self.install_fallback(id, "reasoning unavailable", tick, summary);
            }
        }
    }

    fn build_context(&self, snapshot: &AgentSnapshot, clock: Clock, addressed_by: Option<AgentId>) -> DecisionContext {
        let id = snapshot.id;
        let agents = self.oracles.agents();
        let map = self.oracles.map();
        let mut ctx = DecisionContext::new(snapshot.clone(), clock)
            .with_nearby(agents.nearby(id, self.priority.nearby_radius()))
            .with_poi(map.nearest_point_of_interest(snapshot.position))
            .with_home(map.home_of(id))
            .addressed_by(addressed_by);
        ctx.in_combat = snapshot.in_combat || agents.in_combat(id);
        ctx
    }

    // ---------------------------------------------------------------------
    // Result application
    // ---------------------------------------------------------------------

    fn apply_outcomes(&mut self, outcomes: Vec<BatchOutcome>, tick: Tick, summary: &mut TickSummary) {
        for outcome in outcomes {
            let agent = outcome.agent;
            let Some(runtime) = self.runtimes.get_mut(&agent) else {
                self.drop_stale(agent, outcome.tier, tick, summary);
                continue;
            };
            // Requests from before a timeout or a re-registration no longer
            // match the outstanding ticket.
            if runtime.pending.is_none_or(|pending| pending.ticket != outcome.ticket) {
                self.drop_stale(agent, outcome.tier, tick, summary);
                continue;
            }
            runtime.pending = None;
            if self.executor.has_plan(agent) || self.conversations.in_conversation(agent) {
                self.drop_stale(agent, outcome.tier, tick, summary);
                continue;
            }

            match outcome.plan {
                Some(plan) => {
                    self.cache
                        .store_pattern(agent, outcome.season, outcome.slot, plan.clone());
                    if self.install(agent, plan, DecisionSource::Reasoning(outcome.tier), tick) {
                        summary.installed += 1;
                    }
                }
                None => {
                    let error = outcome
                        .error
                        .map_or_else(|| "no plan".to_string(), |error| error.to_string());
                    self.events.publish(Event::Decision(DecisionEvent::ReasoningFailed {
                        agent,
                        tier: outcome.tier,
                        error: error.clone(),
                        tick,
                    }));
                    self.install_fallback(agent, &error, tick, summary);
                }
            }
        }
    }

    fn drop_stale(&mut self, agent: AgentId, tier: ReasoningTier, tick: Tick, summary: &mut TickSummary) {
        debug!(target: "npc::scheduler", agent = %agent, tier = %tier, "dropping stale reasoning result");
        self.metrics.record_stale_drop();
        summary.stale_drops += 1;
        self.events
            .publish(Event::Decision(DecisionEvent::ResultDropped { agent, tier, tick }));
    }

    fn apply_conversations(&mut self, tick: Tick, summary: &mut TickSummary) {
        let mut reports = std::mem::take(&mut self.finished);
        while let Ok(report) = self.conversation_rx.try_recv() {
            reports.push(report);
        }

        for report in reports {
            self.conversations.finish(&report, tick, &mut self.rng);
            self.metrics.record_conversation(report.turns());
            summary.conversations_finished += 1;

            for (me, other) in [
                (report.initiator.id, report.responder.id),
                (report.responder.id, report.initiator.id),
            ] {
                let Some(runtime) = self.runtimes.get_mut(&me) else {
                    continue;
                };
                runtime.flags.remove(PresenceFlags::IN_CONVERSATION);
                self.memory.record(me, Some(other), report.summary_for(me), tick);
                if let Some(event) = self.executor.resume(me, tick) {
                    self.events.publish(Event::Plan(event));
                }
            }

            self.events.publish(Event::Conversation(ConversationEvent::Ended {
                session: report.session,
                initiator: report.initiator.id,
                responder: report.responder.id,
                turns: report.turns(),
                end: report.end.clone(),
                tick,
            }));
        }
    }

    fn dispatch(&mut self, produced: Vec<ExecutorEvent>, summary: &mut TickSummary) {
        for event in produced {
            match event {
                ExecutorEvent::Behavior(behavior) => self.events.publish(Event::Behavior(behavior)),
                ExecutorEvent::Plan(plan) => self.events.publish(Event::Plan(plan)),
                ExecutorEvent::ConversationRequested { agent, target, .. } => {
                    match self.start_conversation(agent, target) {
                        Ok(_) => summary.conversations_started += 1,
                        Err(error) => {
                            debug!(target: "npc::scheduler", agent = %agent, partner = %target, %error, "talk step skipped");
                        }
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn install(&mut self, agent: AgentId, plan: Plan, source: DecisionSource, tick: Tick) -> bool {
        let name = plan.name().to_string();
        let steps = plan.len();
        if !self.executor.set_plan(agent, plan, source.clone(), tick) {
            return false;
        }
        self.events.publish(Event::Plan(PlanEvent::Installed {
            agent,
            plan: name,
            steps,
            source,
            tick,
        }));
        true
    }

    fn install_fallback(&mut self, agent: AgentId, reason: &str, tick: Tick, summary: &mut TickSummary) {
        let clock = self.oracles.clock().now();
        let plan = match self.oracles.agents().agent(agent) {
            Some(snapshot) => {
                let ctx = self.build_context(&snapshot, clock, None);
                self.rules.fallback_plan(&ctx)
            }
            None => Plan::idle("ambient_idle", ActionKind::Idle, 30),
        };
        self.metrics.record_fallback();
        summary.fallbacks += 1;
        self.events.publish(Event::Decision(DecisionEvent::Fallback {
            agent,
            reason: reason.to_string(),
            tick,
        }));
        if self.install(agent, plan, DecisionSource::Fallback, tick) {
            summary.installed += 1;
        }
    }

    /// Common handling for every accepted trigger.
    fn on_trigger(&mut self, agent: AgentId, kind: TriggerKind, description: String, tick: Tick) {
        self.cache.invalidate_pattern(agent);
        if matches!(kind, TriggerKind::Damaged | TriggerKind::CombatStart)
            && let Some(event) = self.executor.interrupt(agent, InterruptCondition::Attacked, tick)
        {
            self.events.publish(Event::Plan(event));
        }
        self.events.publish(Event::Decision(DecisionEvent::TriggerRaised {
            agent,
            kind,
            description,
            tick,
        }));
    }

    fn scheduled_snapshot(&self, agent: AgentId) -> Result<AgentSnapshot> {
        let snapshot = self
            .oracles
            .agents()
            .agent(agent)
            .ok_or(RuntimeError::UnknownAgent(agent))?;
        if snapshot.is_human() {
            return Err(RuntimeError::HumanControlled(agent));
        }
        if !self.runtimes.contains_key(&agent) {
            return Err(RuntimeError::UnknownAgent(agent));
        }
        Ok(snapshot)
    }
}
