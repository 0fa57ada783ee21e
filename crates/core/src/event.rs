// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side-channel signals a Live Session emits in addition to raw PTY bytes,
//! and the scope every event in the system is stamped with.

use serde::{Deserialize, Serialize};

use crate::pty::ExitStatus;

/// Identifies the tenant/user/workspace/conversation an event pertains to.
/// Fields are optional because not every event narrows to every level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub directory_id: Option<String>,
    pub conversation_id: Option<String>,
}

impl Scope {
    /// Whether `self` matches a subscription `filter`: every field set on
    /// the filter must equal the same field on `self`.
    pub fn matches_filter(&self, filter: &Scope) -> bool {
        matches_field(&filter.tenant_id, &self.tenant_id)
            && matches_field(&filter.user_id, &self.user_id)
            && matches_field(&filter.workspace_id, &self.workspace_id)
            && matches_field(&filter.directory_id, &self.directory_id)
            && matches_field(&filter.conversation_id, &self.conversation_id)
    }
}

fn matches_field(filter: &Option<String>, actual: &Option<String>) -> bool {
    match filter {
        None => true,
        Some(want) => actual.as_deref() == Some(want.as_str()),
    }
}

/// Side-channel event a Live Session raises beyond its raw byte stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    AttentionRequired { reason: String },
    AttentionCleared,
    Notify { payload: serde_json::Value },
    TurnCompleted,
    SessionExit { exit: ExitStatus },
}

/// A PTY-bytes envelope, tagged `provider-text-delta` per the Event
/// Normalizer's contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDelta {
    pub chunk_base64: String,
    pub cursor: u64,
}

/// The normalized kinds the Event Normalizer stamps onto envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    ProviderTextDelta,
    ProviderTurnCompleted,
    MetaAttentionRaised,
    MetaAttentionCleared,
    MetaNotifyObserved,
}

/// Durable, append-only record. Ordering is strict per
/// `(scope.conversation_id, event_seq)`; independent of the observed
/// journal's pub/sub cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEnvelope {
    pub event_id: String,
    pub ts_ms: u64,
    pub scope: Scope,
    pub category: EnvelopeCategory,
    pub kind: EnvelopeKind,
    pub event_seq: u64,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeCategory {
    ProviderText,
    ProviderTurn,
    MetaAttention,
    MetaNotify,
}

impl SessionEvent {
    /// The envelope kind the Event Normalizer stamps this as, or `None` if
    /// this event is published only as an observed event (e.g. session
    /// exit, which the Control-Plane Server reports directly).
    pub fn envelope_kind(&self) -> Option<EnvelopeKind> {
        match self {
            Self::AttentionRequired { .. } => Some(EnvelopeKind::MetaAttentionRaised),
            Self::Notify { .. } => Some(EnvelopeKind::MetaNotifyObserved),
            Self::TurnCompleted => Some(EnvelopeKind::ProviderTurnCompleted),
            Self::SessionExit { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
