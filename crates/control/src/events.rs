// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Normalizer: two independent sinks fed by the same inputs.
//!
//! - [`EventStore`] is the durable, append-only record of normalized PTY/
//!   session-event envelopes, grounded directly in the teacher's
//!   `EventLog` (JSONL, `OpenOptions::new().create(true).append(true)`,
//!   linear-scan catchup — no in-memory buffer).
//! - [`Journal`] is the separate bounded in-memory ring of scoped
//!   "observed events" with a monotonic cursor that `stream.subscribe`
//!   catches up from; unrelated to the Event Store's own per-conversation
//!   `eventSeq`.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use harness_core::event::{EnvelopeCategory, EnvelopeKind, NormalizedEnvelope, Scope};

/// Durable append-only store of [`NormalizedEnvelope`] rows, one JSONL file
/// per store instance. Ordering is enforced per-conversation via
/// `next_seq`; the file itself is the only state that survives a restart.
pub struct EventStore {
    path: Option<PathBuf>,
    seqs: std::sync::Mutex<std::collections::HashMap<String, u64>>,
}

impl EventStore {
    pub fn in_memory() -> Self {
        Self { path: None, seqs: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }

    pub fn open(path: &Path) -> Self {
        Self { path: Some(path.to_path_buf()), seqs: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }

    fn next_seq(&self, conversation_key: &str) -> u64 {
        let mut seqs = self.seqs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let seq = seqs.entry(conversation_key.to_owned()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Stamp and append one envelope. The conversation-id component of
    /// `scope` (or the literal string `"_"` when absent) keys the
    /// `eventSeq` counter, matching the strict `(conversationId, eventSeq)`
    /// ordering rule `stream.subscribe` readers rely on.
    pub fn append(
        &self,
        scope: Scope,
        category: EnvelopeCategory,
        kind: EnvelopeKind,
        payload: serde_json::Value,
        event_id: String,
        ts_ms: u64,
    ) -> NormalizedEnvelope {
        let conversation_key = scope.conversation_id.clone().unwrap_or_else(|| "_".to_owned());
        let event_seq = self.next_seq(&conversation_key);
        let envelope = NormalizedEnvelope { event_id, ts_ms, scope, category, kind, event_seq, payload };

        if let Some(path) = &self.path {
            if let Ok(mut line) = serde_json::to_string(&envelope) {
                line.push('\n');
                if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
                    let _ = file.write_all(line.as_bytes());
                }
            }
        }
        envelope
    }

    /// Linear-scan catchup for one conversation's durable envelopes with
    /// `eventSeq > since_seq`. Returns empty when the store is in-memory
    /// (no file) or the conversation has no entries.
    pub fn catchup(&self, conversation_id: &str, since_seq: u64) -> Vec<NormalizedEnvelope> {
        let Some(path) = &self.path else { return Vec::new() };
        let Ok(contents) = std::fs::read_to_string(path) else { return Vec::new() };
        contents
            .lines()
            .filter_map(|line| serde_json::from_str::<NormalizedEnvelope>(line).ok())
            .filter(|e| e.scope.conversation_id.as_deref() == Some(conversation_id) && e.event_seq > since_seq)
            .collect()
    }
}

/// The closed set of observed-event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservedEventKind {
    DirectoryUpserted,
    DirectoryArchived,
    ConversationCreated,
    ConversationUpdated,
    ConversationArchived,
    ConversationDeleted,
    SessionStatus,
    SessionControl,
    SessionOutput,
    AttentionRaised,
    AttentionCleared,
    RepositoryUpserted,
    RepositoryArchived,
    TaskUpserted,
    TaskArchived,
}

/// One entry in the bounded observed-event journal: `{cursor, scope, type,
/// payload, ts}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedEvent {
    pub cursor: u64,
    pub scope: Scope,
    #[serde(rename = "type")]
    pub kind: ObservedEventKind,
    pub payload: serde_json::Value,
    #[serde(rename = "ts")]
    pub ts_ms: u64,
}

/// Subscription-side conjunctive filter: every `Some` field narrows the
/// match; `include_output` additionally gates `session-output` events,
/// which are otherwise excluded by default unless `includeOutput` is set.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub scope: Scope,
    pub include_output: bool,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &ObservedEvent) -> bool {
        if event.kind == ObservedEventKind::SessionOutput && !self.include_output {
            return false;
        }
        event.scope.matches_filter(&self.scope)
    }
}

/// Bounded ring of [`ObservedEvent`]s with a monotonic cursor. Entries
/// beyond capacity are evicted oldest-first; a subscriber whose
/// `afterCursor` falls below the oldest retained entry must be told to
/// resync (`journal-gap`) rather than silently skip forward.
pub struct Journal {
    capacity: usize,
    entries: VecDeque<ObservedEvent>,
    next_cursor: AtomicU64,
}

/// Returned by [`Journal::catch_up`] when the requested `after_cursor` is
/// older than the oldest retained entry.
#[derive(Debug, Clone, Copy)]
pub struct JournalGap {
    pub current_cursor: u64,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: VecDeque::with_capacity(capacity), next_cursor: AtomicU64::new(1) }
    }

    /// Assign the next cursor and append, evicting the oldest entry first
    /// if at capacity. Returns the published event.
    pub fn publish(
        &mut self,
        scope: Scope,
        kind: ObservedEventKind,
        payload: serde_json::Value,
        ts_ms: u64,
    ) -> ObservedEvent {
        let cursor = self.next_cursor.fetch_add(1, Ordering::SeqCst);
        let event = ObservedEvent { cursor, scope, kind, payload, ts_ms };
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event.clone());
        event
    }

    pub fn current_cursor(&self) -> u64 {
        self.next_cursor.load(Ordering::SeqCst).saturating_sub(1)
    }

    fn oldest_retained_cursor(&self) -> u64 {
        self.entries.front().map(|e| e.cursor).unwrap_or_else(|| self.current_cursor() + 1)
    }

    /// Drain entries with `cursor > after_cursor` matching `filter`, in
    /// cursor order. Fails with [`JournalGap`] when `after_cursor` predates
    /// the retained window and the journal is non-empty or has already
    /// evicted past it.
    pub fn catch_up(
        &self,
        after_cursor: u64,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<ObservedEvent>, JournalGap> {
        let evicted_any = self.current_cursor() > self.capacity as u64;
        if evicted_any && !self.entries.is_empty() {
            let oldest = self.oldest_retained_cursor();
            if after_cursor + 1 < oldest {
                return Err(JournalGap { current_cursor: self.current_cursor() });
            }
        }
        Ok(self
            .entries
            .iter()
            .filter(|e| e.cursor > after_cursor)
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
