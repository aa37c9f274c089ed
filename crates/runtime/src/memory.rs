//! Per-agent episodic memory.
//!
//! A bounded log of short text entries (conversation summaries, notable
//! overheard speech). Conversations read what one agent remembers about the
//! other; reasoning prompts read the most recent entries.

use std::collections::{HashMap, VecDeque};

use npc_core::{AgentId, Tick};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    pub tick: Tick,
    /// The other agent the memory concerns, if any.
    pub about: Option<AgentId>,
    pub text: String,
}

#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    entries: HashMap<AgentId, VecDeque<MemoryEntry>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Appends a memory, evicting the oldest past capacity.
    pub fn record(&mut self, agent: AgentId, about: Option<AgentId>, text: impl Into<String>, tick: Tick) {
        let log = self.entries.entry(agent).or_default();
        log.push_back(MemoryEntry {
            tick,
            about,
            text: text.into(),
        });
        while log.len() > self.capacity {
            log.pop_front();
        }
    }

    /// Up to `limit` most recent memories `agent` holds about `other`, oldest first.
    pub fn recall_about(&self, agent: AgentId, other: AgentId, limit: usize) -> Vec<String> {
        let Some(log) = self.entries.get(&agent) else {
            return Vec::new();
        };
        let mut recalled: Vec<String> = log
            .iter()
            .rev()
            .filter(|entry| entry.about == Some(other))
            .take(limit)
            .map(|entry| entry.text.clone())
            .collect();
        recalled.reverse();
        recalled
    }

    /// Up to `limit` most recent memories of any kind, oldest first.
    pub fn recent(&self, agent: AgentId, limit: usize) -> Vec<String> {
        let Some(log) = self.entries.get(&agent) else {
            return Vec::new();
        };
        let skip = log.len().saturating_sub(limit);
        log.iter().skip(skip).map(|entry| entry.text.clone()).collect()
    }

    pub fn len(&self, agent: AgentId) -> usize {
        self.entries.get(&agent).map_or(0, VecDeque::len)
    }

    pub fn forget(&mut self, agent: AgentId) {
        self.entries.remove(&agent);
    }
}
