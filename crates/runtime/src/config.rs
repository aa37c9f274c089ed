//! Scheduler configuration structures and loaders.
//!
//! Every tunable of the decision pipeline lives here with a sensible default.
//! [`SchedulerConfig::from_env`] overrides individual values from `NPC_*`
//! environment variables so deployments can retune cadence and batching
//! without a rebuild.

use std::env;
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct SchedulerConfig {
    pub priority: PriorityConfig,
    pub batch: BatchConfig,
    pub triggers: TriggerConfig,
    pub executor: ExecutorConfig,
    pub conversation: ConversationConfig,
    pub social: SocialConfig,
    /// Seed for jitter, turn counts and cooldowns. `None` draws from entropy.
    pub seed: Option<u64>,
    pub event_buffer_size: usize,
}

/// Decision cadence.
#[derive(Clone, Debug)]
pub struct PriorityConfig {
    /// Chebyshev radius within which another agent counts as company.
    pub nearby_radius: u32,
    /// Interval while conversing or in company.
    pub social_interval: Duration,
    /// Base interval when alone.
    pub alone_interval: Duration,
    /// Upper bound of the uniform jitter added to `alone_interval`.
    pub alone_jitter: Duration,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            nearby_radius: 8,
            social_interval: Duration::from_secs(15),
            alone_interval: Duration::from_secs(90),
            alone_jitter: Duration::from_secs(15),
        }
    }
}

/// Reasoning batch shaping.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Flush a tier's queue as soon as it holds this many requests.
    pub batch_size: usize,
    /// Flush a tier's queue this long after its first request arrived.
    pub batch_window: Duration,
    /// Per-call deadline at the reasoning boundary.
    pub call_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            batch_window: Duration::from_millis(250),
            call_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TriggerConfig {
    /// Health percentage below which a stat trigger fires.
    pub low_health_percent: u32,
    /// Hunger at or above which a stat trigger fires.
    pub hunger_threshold: u32,
    /// Pending triggers kept per agent; oldest are dropped beyond this.
    pub backlog_capacity: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            low_health_percent: 30,
            hunger_threshold: 80,
            backlog_capacity: 16,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Ticks a plan stays paused by an interrupt before resuming on its own.
    pub resume_delay: u64,
    /// Ticks a reasoning request may stay unanswered before the agent falls back.
    pub pending_timeout: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            resume_delay: 5,
            pending_timeout: 60,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub min_turns: u8,
    pub max_turns: u8,
    pub min_cooldown: u64,
    pub max_cooldown: u64,
    /// Participants must be within this many tiles to start talking.
    pub reach: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            min_turns: 3,
            max_turns: 6,
            min_cooldown: 30,
            max_cooldown: 60,
            reach: 3,
        }
    }
}

/// Chat feed and memory sizing.
#[derive(Clone, Debug)]
pub struct SocialConfig {
    /// Radius within which spoken lines are overheard.
    pub hearing_radius: u32,
    /// Overheard lines kept per agent.
    pub recent_chat_capacity: usize,
    /// Memory entries kept per agent.
    pub memory_capacity: usize,
    /// Memories about the other party handed to each conversation turn.
    pub memories_per_turn: usize,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            hearing_radius: 6,
            recent_chat_capacity: 5,
            memory_capacity: 32,
            memories_per_turn: 4,
        }
    }
}

impl SchedulerConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `NPC_NEARBY_RADIUS` - Company radius in tiles (default: 8)
    /// - `NPC_SOCIAL_INTERVAL_MS` - Decision interval in company (default: 15000)
    /// - `NPC_ALONE_INTERVAL_MS` - Base decision interval alone (default: 90000)
    /// - `NPC_ALONE_JITTER_MS` - Jitter added when alone (default: 15000)
    /// - `NPC_BATCH_SIZE` - Requests per reasoning call (default: 8)
    /// - `NPC_BATCH_WINDOW_MS` - Batch accumulation window (default: 250)
    /// - `NPC_REASONING_TIMEOUT_MS` - Reasoning call deadline (default: 20000)
    /// - `NPC_RESUME_DELAY_TICKS` - Auto-resume delay after an interrupt (default: 5)
    /// - `NPC_PENDING_TIMEOUT_TICKS` - Wait before falling back (default: 60)
    /// - `NPC_HEARING_RADIUS` - Chat overhearing radius (default: 6)
    /// - `NPC_SEED` - Deterministic RNG seed (default: entropy)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(radius) = read_env::<u32>("NPC_NEARBY_RADIUS") {
            config.priority.nearby_radius = radius;
        }
        if let Some(ms) = read_env::<u64>("NPC_SOCIAL_INTERVAL_MS") {
            config.priority.social_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env::<u64>("NPC_ALONE_INTERVAL_MS") {
            config.priority.alone_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env::<u64>("NPC_ALONE_JITTER_MS") {
            config.priority.alone_jitter = Duration::from_millis(ms);
        }

        if let Some(size) = read_env::<usize>("NPC_BATCH_SIZE") {
            config.batch.batch_size = size.max(1);
        }
        if let Some(ms) = read_env::<u64>("NPC_BATCH_WINDOW_MS") {
            config.batch.batch_window = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env::<u64>("NPC_REASONING_TIMEOUT_MS") {
            config.batch.call_timeout = Duration::from_millis(ms.max(1));
        }

        if let Some(ticks) = read_env::<u64>("NPC_RESUME_DELAY_TICKS") {
            config.executor.resume_delay = ticks;
        }
        if let Some(ticks) = read_env::<u64>("NPC_PENDING_TIMEOUT_TICKS") {
            config.executor.pending_timeout = ticks.max(1);
        }

        if let Some(radius) = read_env::<u32>("NPC_HEARING_RADIUS") {
            config.social.hearing_radius = radius;
        }

        config.seed = read_env::<u64>("NPC_SEED");
        config
    }

    /// Clamps inverted ranges so downstream `gen_range` calls stay valid.
    pub(crate) fn normalized(mut self) -> Self {
        let conv = &mut self.conversation;
        conv.min_turns = conv.min_turns.max(1);
        if conv.max_turns < conv.min_turns {
            conv.max_turns = conv.min_turns;
        }
        if conv.max_cooldown < conv.min_cooldown {
            conv.max_cooldown = conv.min_cooldown;
        }
        self.batch.batch_size = self.batch.batch_size.max(1);
        if self.event_buffer_size == 0 {
            self.event_buffer_size = 256;
        }
        self
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_repairs_inverted_ranges() {
        let mut config = SchedulerConfig::default();
        config.conversation.min_turns = 5;
        config.conversation.max_turns = 2;
        config.conversation.min_cooldown = 40;
        config.conversation.max_cooldown = 10;
        config.batch.batch_size = 0;

        let config = config.normalized();
        assert_eq!(config.conversation.max_turns, 5);
        assert_eq!(config.conversation.max_cooldown, 40);
        assert_eq!(config.batch.batch_size, 1);
        assert_eq!(config.event_buffer_size, 256);
    }

    #[test]
    fn defaults_match_documented_cadence() {
        let config = SchedulerConfig::default();
        assert_eq!(config.priority.social_interval, Duration::from_secs(15));
        assert_eq!(config.priority.alone_interval, Duration::from_secs(90));
        assert_eq!(config.conversation.min_cooldown, 30);
        assert_eq!(config.conversation.max_cooldown, 60);
    }
}
