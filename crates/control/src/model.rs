// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable catalog entities: Directory, Conversation, Repository, Task.
//! Plain records with lifecycle fields; the State Store is what layers
//! CRUD, scoping, and persistence on top of these shapes.

use serde::{Deserialize, Serialize};

use harness_core::session::SessionStatus;

/// Root of a user's project. Created/upserted by clients, never implicitly
/// deleted; archival is a tombstone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub directory_id: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub path: String,
    pub archived_at: Option<u64>,
}

/// Durable descriptor of an agent thread. `adapter_state` is an opaque
/// agent-specific blob (e.g. a prior session id for resume). `runtime_status`
/// and `runtime_live` are advisory snapshots of the last observed runtime;
/// `session.list` is the live authority (Open Question, resolved in
/// SPEC_FULL §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    pub directory_id: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub title: String,
    pub agent_type: String,
    #[serde(default)]
    pub adapter_state: serde_json::Map<String, serde_json::Value>,
    pub runtime_status: Option<SessionStatus>,
    #[serde(default)]
    pub runtime_live: bool,
    pub archived_at: Option<u64>,
}

/// Lifecycle shared by Repository and Task rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogStatus {
    Draft,
    Ready,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub repository_id: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub name: String,
    pub status: CatalogStatus,
    pub archived_at: Option<u64>,
}

/// A reorderable list item, scoped to either a repository or a bare
/// project; task scope must specify one or the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub repository_id: Option<String>,
    pub project_id: Option<String>,
    pub title: String,
    pub status: CatalogStatus,
    pub order: u32,
    pub archived_at: Option<u64>,
}

/// Conjunctive scope filter accepted by every State Store query. All
/// fields optional; a `None` field imposes no constraint.
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub include_archived: bool,
    pub limit: Option<usize>,
}

pub(crate) fn matches_scope(
    filter: &ScopeFilter,
    tenant_id: &Option<String>,
    user_id: &Option<String>,
    workspace_id: &Option<String>,
) -> bool {
    field_matches(&filter.tenant_id, tenant_id)
        && field_matches(&filter.user_id, user_id)
        && field_matches(&filter.workspace_id, workspace_id)
}

fn field_matches(filter: &Option<String>, actual: &Option<String>) -> bool {
    match filter {
        None => true,
        Some(want) => actual.as_deref() == Some(want.as_str()),
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
