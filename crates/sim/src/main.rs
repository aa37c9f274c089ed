//! Village simulation harness.
//!
//! Drives an [`NpcScheduler`] against a small in-memory village with a
//! scripted reasoning service, applying emitted behaviors back to the world
//! and reporting decision metrics at the end.
//!
//! ```bash
//! NPC_SIM_TICKS=1200 NPC_SIM_LOG_DIR=default RUST_LOG=npc=debug cargo run -p npc-sim
//! ```

mod config;
mod reasoner;
mod world;

use std::sync::Arc;

use anyhow::{Context, Result};
use npc_runtime::{ConversationEvent, Event, NpcScheduler, OracleManager, Topic};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::SimConfig;
use reasoner::ScriptedReasoner;
use world::{Village, VillageClock};

/// Ticks between progress reports.
const REPORT_EVERY: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = SimConfig::from_env();
    let _guard = setup_logging(&config)?;

    info!(
        session = %config.session_id,
        ticks = config.ticks,
        batch_size = config.scheduler.batch.batch_size,
        batch_window_ms = config.scheduler.batch.batch_window.as_millis() as u64,
        "starting village simulation"
    );

    let village = Arc::new(Village::new(VillageClock {
        ms_per_tick: config.sim_ms_per_tick,
        ticks_per_day: config.ticks_per_day,
    }));
    let oracles = OracleManager::new(
        village.clone(),
        village.clone(),
        village.clone(),
        village.clone(),
    );
    let reasoner = Arc::new(ScriptedReasoner::new(
        Arc::clone(&village),
        config.reasoning_latency,
    ));

    let mut scheduler = NpcScheduler::builder()
        .config(config.scheduler.clone())
        .oracles(oracles)
        .reasoning(reasoner)
        .build()
        .context("failed to build scheduler")?;
    for id in village.npc_ids() {
        scheduler.register(id)?;
    }

    run(&config, &village, &mut scheduler).await;

    let metrics = scheduler.metrics();
    info!(
        rule_hits = metrics.rule_hits,
        cache_hits = metrics.cache_hits,
        reasoning_calls = metrics.reasoning_calls(),
        premium_calls = metrics.premium_calls,
        requests_sent = metrics.requests_sent,
        fallbacks = metrics.fallbacks,
        stale_drops = metrics.stale_drops,
        conversations = metrics.conversations,
        offload_rate = metrics.offload_rate,
        avg_call_ms = metrics.avg_call_time.as_millis() as u64,
        "simulation finished"
    );

    scheduler.shutdown().await?;
    Ok(())
}

async fn run(config: &SimConfig, village: &Village, scheduler: &mut NpcScheduler) {
    let mut behavior = scheduler.subscribe(Topic::Behavior);
    let mut conversations = scheduler.subscribe(Topic::Conversation);
    let mut interval = tokio::time::interval(config.tick_interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    for _ in 0..config.ticks {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                warn!("interrupted, stopping early");
                break;
            }
        }

        village.advance();
        let summary = scheduler.tick();

        loop {
            match behavior.try_recv() {
                Ok(Event::Behavior(event)) => village.apply(&event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "behavior events lagged; world state may drift");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        while let Ok(event) = conversations.try_recv() {
            if let Event::Conversation(ConversationEvent::Line { speaker, text, .. }) = event {
                info!(target: "sim::dialogue", speaker = %speaker, "{}", text);
            }
        }

        if let Some(greeting) = village.player_greeting() {
            scheduler.feed_chat(
                greeting.speaker,
                &greeting.speaker_name,
                &greeting.message,
                greeting.position,
                Some(greeting.target),
            );
        }

        if summary.tick.0 % REPORT_EVERY == 0 {
            let metrics = scheduler.metrics();
            info!(
                tick = %summary.tick,
                rule_hits = metrics.rule_hits,
                cache_hits = metrics.cache_hits,
                reasoning_calls = metrics.reasoning_calls(),
                queue_depth = metrics.queue_depth,
                active_plans = scheduler.executor().active_plans(),
                conversations = scheduler.conversations().active_sessions(),
                "progress"
            );
        }
    }
}

/// Logs to stderr, and to a per-session file when a log directory is set.
fn setup_logging(config: &SimConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(log_dir) = &config.log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    let session_log_dir = log_dir.join(&config.session_id);
    std::fs::create_dir_all(&session_log_dir)
        .with_context(|| format!("failed to create {}", session_log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&session_log_dir, "sim.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}/sim.log", session_log_dir.display());
    Ok(Some(guard))
}
