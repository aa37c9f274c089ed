//! Shared fixtures: a hand-driven world and a scripted reasoning service.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use npc_core::{AgentId, AgentSnapshot, Clock, Position, Tick};
use npc_runtime::{
    AgentOracle, ClockOracle, DialogueRequest, MapOracle, NoContext, NpcScheduler, OpenFieldMap,
    OracleManager, ReasoningError, ReasoningReply, ReasoningRequest, ReasoningService,
    ReasoningTier, SchedulerConfig,
};

/// One simulated second per tick, mid-morning on day zero.
pub const MS_PER_TICK: u64 = 1_000;
pub const MORNING: f32 = 0.4;

pub const WORK_PLAN: &str = r#"{
    "name": "tend_fields",
    "steps": [{"action": "work", "wait_after": 3}],
    "interrupt_conditions": ["spoken_to", "attacked"]
}"#;

#[derive(Default)]
struct WorldState {
    tick: u64,
    agents: HashMap<AgentId, AgentSnapshot>,
}

/// World whose clock only moves when a test says so.
#[derive(Clone, Default)]
pub struct TestWorld {
    state: Arc<Mutex<WorldState>>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, snapshot: AgentSnapshot) {
        let mut state = self.state.lock().unwrap();
        state.agents.insert(snapshot.id, snapshot);
    }

    pub fn update(&self, id: AgentId, f: impl FnOnce(&mut AgentSnapshot)) {
        let mut state = self.state.lock().unwrap();
        if let Some(agent) = state.agents.get_mut(&id) {
            f(agent);
        }
    }

    pub fn tick(&self) -> Tick {
        Tick(self.state.lock().unwrap().tick)
    }

    pub fn set_tick(&self, tick: u64) {
        self.state.lock().unwrap().tick = tick;
    }

    pub fn oracles(&self) -> OracleManager {
        OracleManager::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(OpenFieldMap),
            Arc::new(NoContext),
        )
    }
}

impl ClockOracle for TestWorld {
    fn now(&self) -> Clock {
        let tick = self.state.lock().unwrap().tick;
        Clock::new(Tick(tick), 0, MORNING, tick * MS_PER_TICK)
    }
}

impl AgentOracle for TestWorld {
    fn agent(&self, id: AgentId) -> Option<AgentSnapshot> {
        self.state.lock().unwrap().agents.get(&id).cloned()
    }

    fn agents(&self) -> Vec<AgentSnapshot> {
        let mut agents: Vec<_> = self.state.lock().unwrap().agents.values().cloned().collect();
        agents.sort_by_key(|agent| agent.id);
        agents
    }
}

impl MapOracle for TestWorld {
    fn find_path(&self, from: Position, to: Position) -> Vec<Position> {
        OpenFieldMap.find_path(from, to)
    }
}

/// Reasoning double that answers every request with the same plan and
/// records what it was asked.
pub struct ScriptedReasoner {
    plan: String,
    fail: AtomicBool,
    stall: AtomicBool,
    batch_calls: AtomicUsize,
    requests: Mutex<Vec<(ReasoningTier, ReasoningRequest)>>,
    lines: Vec<String>,
    utterances: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(plan: &str) -> Self {
        Self {
            plan: plan.to_string(),
            fail: AtomicBool::new(false),
            stall: AtomicBool::new(false),
            batch_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            lines: Vec::new(),
            utterances: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let reasoner = Self::new(WORK_PLAN);
        reasoner.fail.store(true, Ordering::SeqCst);
        reasoner
    }

    /// Never answers; the brain's call timeout has to fire.
    pub fn stalled() -> Self {
        let reasoner = Self::new(WORK_PLAN);
        reasoner.stall.store(true, Ordering::SeqCst);
        reasoner
    }

    /// Dialogue lines handed out in order; silence afterwards.
    pub fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|line| line.to_string()).collect();
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(ReasoningTier, ReasoningRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn utterances(&self) -> usize {
        self.utterances.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn reason_batch(
        &self,
        tier: ReasoningTier,
        requests: &[ReasoningRequest],
    ) -> Result<Vec<ReasoningReply>, ReasoningError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .extend(requests.iter().cloned().map(|request| (tier, request)));
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReasoningError::Service("upstream unavailable".to_string()));
        }
        Ok(requests
            .iter()
            .map(|request| ReasoningReply {
                agent: request.agent,
                output: self.plan.clone(),
            })
            .collect())
    }

    async fn utter(&self, _request: &DialogueRequest) -> Result<String, ReasoningError> {
        let turn = self.utterances.fetch_add(1, Ordering::SeqCst);
        Ok(self.lines.get(turn).cloned().unwrap_or_default())
    }
}

/// Deterministic config with a short batch window so tests stay fast.
pub fn test_config() -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.seed = Some(7);
    config.batch.batch_window = Duration::from_millis(5);
    config.batch.call_timeout = Duration::from_millis(500);
    config
}

pub fn scheduler(world: &TestWorld, service: Arc<ScriptedReasoner>) -> NpcScheduler {
    NpcScheduler::builder()
        .config(test_config())
        .oracles(world.oracles())
        .reasoning(service)
        .build()
        .expect("scheduler should build")
}

/// Waits for the next reasoning batch to come back.
pub async fn await_results(scheduler: &mut NpcScheduler) -> usize {
    tokio::time::timeout(Duration::from_secs(1), scheduler.pump_results())
        .await
        .expect("reasoning batch should arrive")
}

/// Advances the world one tick at a time, ticking the scheduler each step.
pub fn run_ticks(world: &TestWorld, scheduler: &mut NpcScheduler, count: u64) {
    for _ in 0..count {
        world.set_tick(world.tick().0 + 1);
        scheduler.tick();
    }
}
