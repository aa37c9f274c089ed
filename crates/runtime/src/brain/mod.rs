//! The batch brain: sole caller of the reasoning service.
//!
//! Decision requests go in through [`BatchBrain::enqueue`] and come back,
//! batched and parsed, as [`BatchOutcome`]s on a results channel. Dialogue
//! turns take the single-shot [`DialogueClient`] path so conversation traffic
//! shares the same service handle and timeout.

pub mod parse;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use npc_core::{AgentId, Plan, Season, Tick, TimeSlot};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;

use crate::api::{
    DialogueRequest, ReasoningError, ReasoningRequest, ReasoningService, ReasoningTier, Result,
    RuntimeError,
};
use crate::config::BatchConfig;
use crate::workers::{BatchWorker, DecisionMetrics};

pub use parse::{PlanParseError, parse_plan};

/// Result of one request after its batch returned.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub agent: AgentId,
    pub tier: ReasoningTier,
    pub season: Season,
    pub slot: TimeSlot,
    pub requested_at: Tick,
    pub ticket: u64,
    /// `None` when the call failed or the reply could not be parsed.
    pub plan: Option<Plan>,
    pub error: Option<ReasoningError>,
}

impl BatchOutcome {
    pub(crate) fn planned(tier: ReasoningTier, request: &ReasoningRequest, plan: Plan) -> Self {
        Self {
            agent: request.agent,
            tier,
            season: request.season,
            slot: request.slot,
            requested_at: request.requested_at,
            ticket: request.ticket,
            plan: Some(plan),
            error: None,
        }
    }

    pub(crate) fn failed(
        tier: ReasoningTier,
        request: &ReasoningRequest,
        error: ReasoningError,
    ) -> Self {
        Self {
            agent: request.agent,
            tier,
            season: request.season,
            slot: request.slot,
            requested_at: request.requested_at,
            ticket: request.ticket,
            plan: None,
            error: Some(error),
        }
    }
}

/// Clonable handle for dialogue turns.
#[derive(Clone)]
pub struct DialogueClient {
    service: Arc<dyn ReasoningService>,
    timeout: Duration,
}

impl DialogueClient {
    pub async fn utter(&self, request: &DialogueRequest) -> std::result::Result<String, ReasoningError> {
        match time::timeout(self.timeout, self.service.utter(request)).await {
            Ok(reply) => reply,
            Err(_) => Err(ReasoningError::Timeout(self.timeout)),
        }
    }
}

pub struct BatchBrain {
    requests: mpsc::UnboundedSender<ReasoningRequest>,
    results: Option<mpsc::UnboundedReceiver<Vec<BatchOutcome>>>,
    dialogue: DialogueClient,
    metrics: Arc<DecisionMetrics>,
    worker: JoinHandle<()>,
}

impl BatchBrain {
    /// Starts the batch worker on the current tokio runtime.
    pub fn spawn(
        service: Arc<dyn ReasoningService>,
        config: BatchConfig,
        metrics: Arc<DecisionMetrics>,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let dialogue = DialogueClient {
            service: Arc::clone(&service),
            timeout: config.call_timeout,
        };
        let worker = BatchWorker::new(service, config, request_rx, result_tx, Arc::clone(&metrics));
        let worker = tokio::spawn(worker.run());

        Self {
            requests: request_tx,
            results: Some(result_rx),
            dialogue,
            metrics,
            worker,
        }
    }

    pub fn enqueue(&self, request: ReasoningRequest) -> Result<()> {
        debug!(
            target: "npc::brain",
            agent = %request.agent,
            tier = %request.tier(),
            "reasoning request enqueued"
        );
        self.requests
            .send(request)
            .map_err(|_| RuntimeError::BrainChannelClosed)?;
        self.metrics.record_enqueued();
        Ok(())
    }

    /// Every outcome delivered since the last drain, without waiting.
    pub fn drain_results(&mut self) -> Vec<BatchOutcome> {
        let Some(results) = self.results.as_mut() else {
            return Vec::new();
        };
        let mut outcomes = Vec::new();
        while let Ok(batch) = results.try_recv() {
            outcomes.extend(batch);
        }
        outcomes
    }

    /// Waits for the next batch of outcomes. `None` once the worker and every
    /// in-flight call are gone, or when results were handed to a callback.
    pub async fn next_results(&mut self) -> Option<Vec<BatchOutcome>> {
        self.results.as_mut()?.recv().await
    }

    /// Forwards every future batch to `callback` from a background task.
    ///
    /// After this the polling methods return nothing.
    pub fn on_results<F>(&mut self, mut callback: F) -> Result<JoinHandle<()>>
    where
        F: FnMut(Vec<BatchOutcome>) + Send + 'static,
    {
        let mut results = self.results.take().ok_or(RuntimeError::ResultsDetached)?;
        Ok(tokio::spawn(async move {
            while let Some(batch) = results.recv().await {
                callback(batch);
            }
        }))
    }

    pub fn dialogue(&self) -> DialogueClient {
        self.dialogue.clone()
    }

    /// Closes the request channel and waits for the worker to flush.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.requests);
        self.worker.await.map_err(RuntimeError::WorkerJoin)
    }
}
