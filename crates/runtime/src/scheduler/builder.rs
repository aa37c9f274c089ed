use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tracing::info;

use crate::api::{ReasoningService, Result, RuntimeError};
use crate::brain::BatchBrain;
use crate::config::SchedulerConfig;
use crate::decision::{PatternCache, PriorityScheduler, RuleEngine, TriggerDetector};
use crate::events::EventBus;
use crate::execution::{ConversationManager, PlanExecutor};
use crate::memory::MemoryStore;
use crate::oracle::OracleManager;
use crate::workers::DecisionMetrics;

use super::NpcScheduler;

/// Builder for [`NpcScheduler`]. Oracles and a reasoning service are required.
#[derive(Default)]
pub struct NpcSchedulerBuilder {
    config: SchedulerConfig,
    oracles: Option<OracleManager>,
    service: Option<Arc<dyn ReasoningService>>,
    events: Option<EventBus>,
    rules: Option<RuleEngine>,
}

impl NpcSchedulerBuilder {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn oracles(mut self, oracles: OracleManager) -> Self {
        self.oracles = Some(oracles);
        self
    }

    pub fn reasoning(mut self, service: Arc<dyn ReasoningService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Share an existing bus. A fresh one sized from the config is created otherwise.
    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the default rule chain.
    pub fn rules(mut self, rules: RuleEngine) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Builds the scheduler and spawns the batch worker on the current tokio runtime.
    pub fn build(self) -> Result<NpcScheduler> {
        let oracles = self.oracles.ok_or(RuntimeError::MissingCollaborator("oracles"))?;
        let service = self
            .service
            .ok_or(RuntimeError::MissingCollaborator("reasoning service"))?;
        let config = self.config.normalized();

        let events = self
            .events
            .unwrap_or_else(|| EventBus::with_capacity(config.event_buffer_size));
        let metrics = Arc::new(DecisionMetrics::new());
        let brain = BatchBrain::spawn(service, config.batch.clone(), Arc::clone(&metrics));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (conversation_tx, conversation_rx) = mpsc::unbounded_channel();
        let rules = self.rules.unwrap_or_default();

        info!(
            target: "npc::scheduler",
            rules = ?rules.rule_names(),
            batch_size = config.batch.batch_size,
            seeded = config.seed.is_some(),
            "scheduler built"
        );

        Ok(NpcScheduler {
            priority: PriorityScheduler::new(config.priority.clone()),
            triggers: TriggerDetector::new(config.triggers.clone()),
            cache: PatternCache::new(),
            rules,
            executor: PlanExecutor::new(config.executor.clone()),
            conversations: ConversationManager::new(config.conversation.clone()),
            memory: MemoryStore::new(config.social.memory_capacity),
            runtimes: Default::default(),
            ready: Vec::new(),
            conversation_tx,
            conversation_rx,
            finished: Vec::new(),
            oracles,
            events,
            metrics,
            brain,
            rng,
            next_ticket: 0,
            config,
        })
    }
}
