//! Reasoning batch worker.
//!
//! Accumulates requests per cost tier and turns each full (or expired) queue
//! into a single `reason_batch` call. Calls run as detached tasks so a slow
//! service never blocks accumulation of the next batch.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::api::{ReasoningError, ReasoningReply, ReasoningRequest, ReasoningService, ReasoningTier};
use crate::brain::BatchOutcome;
use crate::brain::parse::parse_plan;
use crate::config::BatchConfig;
use crate::workers::DecisionMetrics;

#[derive(Debug)]
struct TierQueue {
    tier: ReasoningTier,
    pending: Vec<ReasoningRequest>,
    /// Set when the first request of the current batch arrives.
    deadline: Option<Instant>,
}

impl TierQueue {
    fn new(tier: ReasoningTier) -> Self {
        Self {
            tier,
            pending: Vec::new(),
            deadline: None,
        }
    }

    /// Latest request per agent wins.
    fn push(&mut self, request: ReasoningRequest, window: time::Duration) {
        match self.pending.iter_mut().find(|queued| queued.agent == request.agent) {
            Some(queued) => *queued = request,
            None => self.pending.push(request),
        }
        self.deadline.get_or_insert_with(|| Instant::now() + window);
    }

    fn take(&mut self) -> Vec<ReasoningRequest> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// Background task behind [`crate::BatchBrain`].
pub(crate) struct BatchWorker {
    service: Arc<dyn ReasoningService>,
    config: BatchConfig,
    requests: mpsc::UnboundedReceiver<ReasoningRequest>,
    results: mpsc::UnboundedSender<Vec<BatchOutcome>>,
    metrics: Arc<DecisionMetrics>,
    standard: TierQueue,
    premium: TierQueue,
}

impl BatchWorker {
    pub(crate) fn new(
        service: Arc<dyn ReasoningService>,
        config: BatchConfig,
        requests: mpsc::UnboundedReceiver<ReasoningRequest>,
        results: mpsc::UnboundedSender<Vec<BatchOutcome>>,
        metrics: Arc<DecisionMetrics>,
    ) -> Self {
        Self {
            service,
            config,
            requests,
            results,
            metrics,
            standard: TierQueue::new(ReasoningTier::Standard),
            premium: TierQueue::new(ReasoningTier::Premium),
        }
    }

    /// Main worker loop. Exits once the request channel closes, after
    /// flushing whatever is still queued.
    pub(crate) async fn run(mut self) {
        info!(
            target: "npc::batch",
            batch_size = self.config.batch_size,
            window_ms = self.config.batch_window.as_millis() as u64,
            "batch worker started"
        );

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                received = self.requests.recv() => match received {
                    Some(request) => self.accept(request),
                    None => break,
                },
                _ = wait_until(deadline) => self.flush_expired(),
            }
        }

        self.flush(ReasoningTier::Standard);
        self.flush(ReasoningTier::Premium);
        info!(target: "npc::batch", "batch worker stopped");
    }

    fn accept(&mut self, request: ReasoningRequest) {
        let tier = request.tier();
        let window = self.config.batch_window;
        let batch_size = self.config.batch_size;
        let queue = self.queue_mut(tier);
        queue.push(request, window);
        let full = queue.pending.len() >= batch_size;
        self.update_depth();
        if full {
            self.flush(tier);
        }
    }

    fn flush_expired(&mut self) {
        let now = Instant::now();
        for tier in [ReasoningTier::Premium, ReasoningTier::Standard] {
            if self.queue_mut(tier).expired(now) {
                self.flush(tier);
            }
        }
    }

    fn flush(&mut self, tier: ReasoningTier) {
        let batch = self.queue_mut(tier).take();
        self.update_depth();
        if batch.is_empty() {
            return;
        }

        debug!(
            target: "npc::batch",
            tier = %tier,
            requests = batch.len(),
            "flushing reasoning batch"
        );

        let service = Arc::clone(&self.service);
        let results = self.results.clone();
        let metrics = Arc::clone(&self.metrics);
        let call_timeout = self.config.call_timeout;

        tokio::spawn(async move {
            let started = Instant::now();
            let reply = match time::timeout(call_timeout, service.reason_batch(tier, &batch)).await {
                Ok(reply) => reply,
                Err(_) => Err(ReasoningError::Timeout(call_timeout)),
            };
            metrics.record_call(tier, batch.len(), started.elapsed());

            let outcomes = collect_outcomes(tier, batch, reply, &metrics);
            if results.send(outcomes).is_err() {
                debug!(target: "npc::batch", tier = %tier, "results receiver dropped");
            }
        });
    }

    fn queue_mut(&mut self, tier: ReasoningTier) -> &mut TierQueue {
        match tier {
            ReasoningTier::Standard => &mut self.standard,
            ReasoningTier::Premium => &mut self.premium,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [self.standard.deadline, self.premium.deadline]
            .into_iter()
            .flatten()
            .min()
    }

    fn update_depth(&self) {
        let depth = self.standard.pending.len() + self.premium.pending.len();
        self.metrics.set_queue_depth(depth as u64);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Pairs every request of a batch with its parsed plan or the reason it has none.
fn collect_outcomes(
    tier: ReasoningTier,
    batch: Vec<ReasoningRequest>,
    reply: Result<Vec<ReasoningReply>, ReasoningError>,
    metrics: &DecisionMetrics,
) -> Vec<BatchOutcome> {
    let replies = match reply {
        Ok(replies) => replies,
        Err(error) => {
            warn!(
                target: "npc::batch",
                tier = %tier,
                requests = batch.len(),
                %error,
                "reasoning call failed"
            );
            metrics.record_failure();
            return batch
                .into_iter()
                .map(|request| BatchOutcome::failed(tier, &request, error.clone()))
                .collect();
        }
    };

    let mut by_agent: HashMap<_, String> = replies
        .into_iter()
        .map(|reply| (reply.agent, reply.output))
        .collect();

    batch
        .into_iter()
        .map(|request| {
            let Some(output) = by_agent.remove(&request.agent) else {
                return BatchOutcome::failed(tier, &request, ReasoningError::MissingReply(request.agent));
            };
            match parse_plan(&output) {
                Ok(plan) => BatchOutcome::planned(tier, &request, plan),
                Err(error) => {
                    metrics.record_malformed();
                    debug!(
                        target: "npc::batch",
                        agent = %request.agent,
                        %error,
                        "discarding malformed plan"
                    );
                    let error = ReasoningError::Malformed {
                        agent: request.agent,
                        reason: error.to_string(),
                    };
                    BatchOutcome::failed(tier, &request, error)
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::{AgentId, Season, Tick, TimeSlot};

    fn request(agent: u32, premium: bool) -> ReasoningRequest {
        ReasoningRequest {
            agent: AgentId(agent),
            prompt_context: format!("agent {agent}"),
            trigger_context: None,
            premium,
            season: Season::Spring,
            slot: TimeSlot::Morning,
            requested_at: Tick(0),
            ticket: u64::from(agent),
        }
    }

    #[test]
    fn queue_deduplicates_by_agent() {
        let mut queue = TierQueue::new(ReasoningTier::Standard);
        let window = time::Duration::from_millis(100);
        let mut first = request(1, false);
        first.prompt_context = "old".into();
        queue.push(first, window);
        queue.push(request(2, false), window);
        let mut again = request(1, false);
        again.prompt_context = "new".into();
        queue.push(again, window);

        assert_eq!(queue.pending.len(), 2);
        assert_eq!(queue.pending[0].prompt_context, "new");
        assert!(queue.deadline.is_some());
        assert_eq!(queue.take().len(), 2);
        assert!(queue.deadline.is_none());
    }

    #[test]
    fn outcomes_cover_every_request() {
        let metrics = DecisionMetrics::new();
        let batch = vec![request(1, false), request(2, false), request(3, false)];
        let replies = vec![
            ReasoningReply {
                agent: AgentId(1),
                output: r#"{"steps": [{"action": "work", "wait_after": 5}]}"#.into(),
            },
            ReasoningReply {
                agent: AgentId(2),
                output: r#"{"steps": [{"action": "juggle"}]}"#.into(),
            },
        ];

        let outcomes = collect_outcomes(ReasoningTier::Standard, batch, Ok(replies), &metrics);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].plan.is_some());
        assert!(matches!(outcomes[1].error, Some(ReasoningError::Malformed { .. })));
        assert_eq!(outcomes[2].error, Some(ReasoningError::MissingReply(AgentId(3))));
        assert_eq!(metrics.snapshot().malformed_replies, 1);
    }

    #[test]
    fn service_failure_fails_the_whole_batch() {
        let metrics = DecisionMetrics::new();
        let batch = vec![request(1, true), request(2, true)];
        let outcomes = collect_outcomes(
            ReasoningTier::Premium,
            batch,
            Err(ReasoningError::Service("down".into())),
            &metrics,
        );
        assert!(outcomes.iter().all(|o| o.plan.is_none() && o.error.is_some()));
        assert!(outcomes.iter().all(|o| o.tier == ReasoningTier::Premium));
        assert_eq!(metrics.snapshot().reasoning_failures, 1);
    }
}
