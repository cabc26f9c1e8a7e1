//! In-memory conversation store.
//!
//! Histories are keyed by thread id and append-only: messages are never
//! mutated or removed once appended. Reads hand out owned copies so callers
//! can iterate without holding the lock.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::Message;

struct ThreadEntry {
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Summary of one conversation thread.
#[derive(Clone, Debug)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Concurrency-safe map of thread id to message history.
#[derive(Default)]
pub struct ConversationStore {
    inner: RwLock<HashMap<String, ThreadEntry>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owned copy of a thread's history. Unknown ids yield an empty vec.
    pub fn get(&self, thread_id: &str) -> Vec<Message> {
        let inner = self.inner.read().unwrap();
        inner
            .get(thread_id)
            .map(|entry| entry.messages.clone())
            .unwrap_or_default()
    }

    /// Append messages to a thread, creating it on first use.
    pub fn append(&self, thread_id: &str, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        let count = messages.len();
        let now = Utc::now();
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .entry(thread_id.to_string())
            .or_insert_with(|| ThreadEntry {
                messages: Vec::new(),
                created_at: now,
                updated_at: now,
            });
        entry.messages.extend(messages);
        entry.updated_at = now;
        debug!(thread_id, count, total = entry.messages.len(), "appended messages");
    }

    /// Summaries of all threads, most recently updated first.
    pub fn threads(&self) -> Vec<ThreadSummary> {
        let inner = self.inner.read().unwrap();
        let mut summaries: Vec<ThreadSummary> = inner
            .iter()
            .map(|(id, entry)| ThreadSummary {
                thread_id: id.clone(),
                message_count: entry.messages.len(),
                created_at: entry.created_at,
                updated_at: entry.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
