use std::collections::VecDeque;
use std::time::Duration;

use bitflags::bitflags;
use npc_core::{AgentId, Tick};

use crate::decision::PriorityReason;

bitflags! {
    /// Who and what was around an agent at its last tick.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PresenceFlags: u8 {
        const OTHERS_NEARBY   = 1 << 0;
        const HUMAN_NEARBY    = 1 << 1;
        const IN_COMBAT       = 1 << 2;
        const IN_CONVERSATION = 1 << 3;
    }
}

/// Reasoning request an agent is still waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingRequest {
    pub(crate) ticket: u64,
    pub(crate) since: Tick,
}

/// Scheduling bookkeeping for one registered agent.
#[derive(Debug, Clone)]
pub struct SchedulerRuntime {
    pub(crate) last_decision: Option<Duration>,
    pub(crate) interval: Duration,
    pub(crate) interval_reason: Option<PriorityReason>,
    pub(crate) recent_chat: VecDeque<String>,
    chat_capacity: usize,
    pub(crate) flags: PresenceFlags,
    pub(crate) pending: Option<PendingRequest>,
    pub(crate) addressed_by: Option<AgentId>,
}

impl SchedulerRuntime {
    pub(crate) fn new(chat_capacity: usize) -> Self {
        Self {
            last_decision: None,
            interval: Duration::ZERO,
            interval_reason: None,
            recent_chat: VecDeque::with_capacity(chat_capacity),
            chat_capacity: chat_capacity.max(1),
            flags: PresenceFlags::empty(),
            pending: None,
            addressed_by: None,
        }
    }

    pub(crate) fn overhear(&mut self, line: String) {
        self.recent_chat.push_back(line);
        while self.recent_chat.len() > self.chat_capacity {
            self.recent_chat.pop_front();
        }
    }

    pub fn last_decision(&self) -> Option<Duration> {
        self.last_decision
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn recent_chat(&self) -> impl Iterator<Item = &str> {
        self.recent_chat.iter().map(String::as_str)
    }

    pub fn flags(&self) -> PresenceFlags {
        self.flags
    }

    pub fn awaiting_reasoning(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overheard_chat_is_bounded() {
        let mut runtime = SchedulerRuntime::new(2);
        for line in ["a", "b", "c"] {
            runtime.overhear(line.to_string());
        }
        assert_eq!(runtime.recent_chat().collect::<Vec<_>>(), ["b", "c"]);
    }
}
