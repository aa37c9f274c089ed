//! Harness configuration loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use npc_runtime::SchedulerConfig;

#[derive(Clone, Debug)]
pub struct SimConfig {
    /// World ticks to run before shutting down.
    pub ticks: u64,
    /// Wall time between ticks.
    pub tick_interval: Duration,
    /// Simulated milliseconds that pass per tick.
    pub sim_ms_per_tick: u64,
    /// Ticks in one in-world day.
    pub ticks_per_day: u64,
    /// Artificial latency of the scripted reasoner.
    pub reasoning_latency: Duration,
    /// Write logs to a session file in this directory as well as stderr.
    pub log_dir: Option<PathBuf>,
    pub session_id: String,
    pub scheduler: SchedulerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: 600,
            tick_interval: Duration::from_millis(20),
            sim_ms_per_tick: 1_000,
            ticks_per_day: 480,
            reasoning_latency: Duration::from_millis(40),
            log_dir: None,
            session_id: default_session_id(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SimConfig {
    /// Environment variables:
    /// - `NPC_SIM_TICKS` - Ticks to run (default: 600)
    /// - `NPC_SIM_TICK_MS` - Wall milliseconds per tick (default: 20)
    /// - `NPC_SIM_MS_PER_TICK` - Simulated milliseconds per tick (default: 1000)
    /// - `NPC_SIM_TICKS_PER_DAY` - Ticks per in-world day (default: 480)
    /// - `NPC_SIM_LATENCY_MS` - Scripted reasoning latency (default: 40)
    /// - `NPC_SIM_LOG_DIR` - Log directory; `default` picks the platform cache dir
    /// - `NPC_SIM_SESSION` - Session name used for the log subdirectory
    ///
    /// Scheduler tunables are read through [`SchedulerConfig::from_env`].
    pub fn from_env() -> Self {
        let mut config = Self {
            scheduler: SchedulerConfig::from_env(),
            ..Self::default()
        };

        if let Some(ticks) = read_env::<u64>("NPC_SIM_TICKS") {
            config.ticks = ticks;
        }
        if let Some(ms) = read_env::<u64>("NPC_SIM_TICK_MS") {
            config.tick_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = read_env::<u64>("NPC_SIM_MS_PER_TICK") {
            config.sim_ms_per_tick = ms.max(1);
        }
        if let Some(ticks) = read_env::<u64>("NPC_SIM_TICKS_PER_DAY") {
            config.ticks_per_day = ticks.max(1);
        }
        if let Some(ms) = read_env::<u64>("NPC_SIM_LATENCY_MS") {
            config.reasoning_latency = Duration::from_millis(ms);
        }
        if let Ok(session) = env::var("NPC_SIM_SESSION")
            && !session.trim().is_empty()
        {
            config.session_id = session;
        }
        config.log_dir = env::var("NPC_SIM_LOG_DIR").ok().map(|dir| {
            if dir.eq_ignore_ascii_case("default") {
                default_log_dir()
            } else {
                PathBuf::from(dir)
            }
        });

        config
    }
}

/// Platform cache directory, e.g. `~/.cache/npc-sim/logs` on Linux.
pub fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "npc-sim")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/npc-sim"))
        .join("logs")
}

fn default_session_id() -> String {
    format!("session_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
