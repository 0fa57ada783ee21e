// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-Plane State Store: durable catalog of Directory,
//! Conversation, Repository, Task behind one `RwLock`, snapshotted to a
//! JSON file on mutation with the teacher's write-temp-then-rename
//! pattern (`credential::persist::{load,save}`), generalized from one
//! entity table to four.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use harness_core::error::{CommandError, ErrorKind};

use crate::model::{
    matches_scope, now_ms, CatalogStatus, Conversation, Directory, Repository, ScopeFilter, Task,
};

/// On-disk snapshot shape, mirroring `PersistedCredentials`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    directories: HashMap<String, Directory>,
    #[serde(default)]
    conversations: HashMap<String, Conversation>,
    #[serde(default)]
    repositories: HashMap<String, Repository>,
    #[serde(default)]
    tasks: IndexMap<String, Task>,
}

struct Inner {
    snapshot: Snapshot,
    path: Option<PathBuf>,
}

/// Durable key-value catalog. All queries accept a conjunctive
/// [`ScopeFilter`]; mutations are single-row except `task.reorder`, which
/// rewrites the ordered list atomically.
pub struct StateStore {
    inner: RwLock<Inner>,
}

impl StateStore {
    /// In-memory only — used by tests and the embedded transport when no
    /// `HARNESS_CONTROL_PLANE_DB_PATH` is configured.
    pub fn in_memory() -> Self {
        Self { inner: RwLock::new(Inner { snapshot: Snapshot::default(), path: None }) }
    }

    /// Load from `path` if it exists, else start empty; `path` becomes the
    /// save target for every subsequent mutation.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let snapshot = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            Snapshot::default()
        };
        Ok(Self { inner: RwLock::new(Inner { snapshot, path: Some(path.to_path_buf()) }) })
    }

    async fn persist(&self, inner: &Inner) {
        let Some(path) = &inner.path else { return };
        let Ok(json) = serde_json::to_string_pretty(&inner.snapshot) else { return };
        let tmp_path = path.with_extension("tmp");
        if std::fs::write(&tmp_path, json).is_ok() {
            let _ = std::fs::rename(&tmp_path, path);
        }
    }

    // -- Directory ---------------------------------------------------------

    pub async fn directory_upsert(&self, mut directory: Directory) -> Directory {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.snapshot.directories.get(&directory.directory_id) {
            directory.archived_at = existing.archived_at;
        }
        inner.snapshot.directories.insert(directory.directory_id.clone(), directory.clone());
        self.persist(&inner).await;
        directory
    }

    pub async fn directory_get(&self, directory_id: &str) -> Option<Directory> {
        self.inner.read().await.snapshot.directories.get(directory_id).cloned()
    }

    pub async fn directory_list(&self, filter: &ScopeFilter) -> Vec<Directory> {
        let inner = self.inner.read().await;
        let mut out: Vec<Directory> = inner
            .snapshot
            .directories
            .values()
            .filter(|d| filter.include_archived || d.archived_at.is_none())
            .filter(|d| matches_scope(filter, &d.tenant_id, &d.user_id, &d.workspace_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.directory_id.cmp(&b.directory_id));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }

    pub async fn directory_archive(&self, directory_id: &str) -> Result<Directory, CommandError> {
        let mut inner = self.inner.write().await;
        let directory = inner
            .snapshot
            .directories
            .get_mut(directory_id)
            .ok_or_else(|| CommandError::not_found("directory", directory_id))?;
        directory.archived_at = Some(now_ms());
        let result = directory.clone();
        self.persist(&inner).await;
        Ok(result)
    }

    // -- Conversation --------------------------------------------------------

    pub async fn conversation_create(&self, conversation: Conversation) -> Conversation {
        let mut inner = self.inner.write().await;
        inner.snapshot.conversations.insert(conversation.conversation_id.clone(), conversation.clone());
        self.persist(&inner).await;
        conversation
    }

    pub async fn conversation_get(&self, conversation_id: &str) -> Option<Conversation> {
        self.inner.read().await.snapshot.conversations.get(conversation_id).cloned()
    }

    pub async fn conversation_list(&self, filter: &ScopeFilter) -> Vec<Conversation> {
        let inner = self.inner.read().await;
        let mut out: Vec<Conversation> = inner
            .snapshot
            .conversations
            .values()
            .filter(|c| filter.include_archived || c.archived_at.is_none())
            .filter(|c| matches_scope(filter, &c.tenant_id, &c.user_id, &c.workspace_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }

    pub async fn conversation_update_title(
        &self,
        conversation_id: &str,
        title: String,
    ) -> Result<Conversation, CommandError> {
        let mut inner = self.inner.write().await;
        let conversation = inner
            .snapshot
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| CommandError::not_found("conversation", conversation_id))?;
        if conversation.archived_at.is_some() {
            return Err(CommandError::new(
                ErrorKind::Archived,
                format!("conversation `{conversation_id}` is archived"),
            ));
        }
        conversation.title = title;
        let result = conversation.clone();
        self.persist(&inner).await;
        Ok(result)
    }

    /// Opportunistic update of the advisory runtime fields, called when a
    /// `session-status` observed event fires. Never treated as
    /// authoritative by readers.
    pub async fn conversation_mark_runtime(
        &self,
        conversation_id: &str,
        runtime_status: harness_core::session::SessionStatus,
        runtime_live: bool,
    ) {
        let mut inner = self.inner.write().await;
        if let Some(conversation) = inner.snapshot.conversations.get_mut(conversation_id) {
            conversation.runtime_status = Some(runtime_status);
            conversation.runtime_live = runtime_live;
        }
        self.persist(&inner).await;
    }

    pub async fn conversation_archive(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, CommandError> {
        let mut inner = self.inner.write().await;
        let conversation = inner
            .snapshot
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| CommandError::not_found("conversation", conversation_id))?;
        conversation.archived_at = Some(now_ms());
        let result = conversation.clone();
        self.persist(&inner).await;
        Ok(result)
    }

    pub async fn conversation_delete(&self, conversation_id: &str) -> Result<(), CommandError> {
        let mut inner = self.inner.write().await;
        inner
            .snapshot
            .conversations
            .remove(conversation_id)
            .ok_or_else(|| CommandError::not_found("conversation", conversation_id))?;
        self.persist(&inner).await;
        Ok(())
    }

    // -- Repository -----------------------------------------------------------

    pub async fn repository_upsert(&self, repository: Repository) -> Repository {
        let mut inner = self.inner.write().await;
        inner.snapshot.repositories.insert(repository.repository_id.clone(), repository.clone());
        self.persist(&inner).await;
        repository
    }

    pub async fn repository_list(&self, filter: &ScopeFilter) -> Vec<Repository> {
        let inner = self.inner.read().await;
        inner
            .snapshot
            .repositories
            .values()
            .filter(|r| filter.include_archived || r.archived_at.is_none())
            .filter(|r| matches_scope(filter, &r.tenant_id, &r.user_id, &r.workspace_id))
            .cloned()
            .collect()
    }

    pub async fn repository_set_status(
        &self,
        repository_id: &str,
        status: CatalogStatus,
    ) -> Result<Repository, CommandError> {
        let mut inner = self.inner.write().await;
        let repository = inner
            .snapshot
            .repositories
            .get_mut(repository_id)
            .ok_or_else(|| CommandError::not_found("repository", repository_id))?;
        repository.status = status;
        let result = repository.clone();
        self.persist(&inner).await;
        Ok(result)
    }

    // -- Task ---------------------------------------------------------------

    pub async fn task_create(&self, task: Task) -> Result<Task, CommandError> {
        if task.repository_id.is_none() && task.project_id.is_none() {
            return Err(CommandError::new(
                ErrorKind::ConstraintViolation,
                "task scope must specify repository or project",
            ));
        }
        let mut inner = self.inner.write().await;
        inner.snapshot.tasks.insert(task.task_id.clone(), task.clone());
        self.persist(&inner).await;
        Ok(task)
    }

    pub async fn task_list(&self, filter: &ScopeFilter) -> Vec<Task> {
        let inner = self.inner.read().await;
        let mut out: Vec<Task> = inner
            .snapshot
            .tasks
            .values()
            .filter(|t| filter.include_archived || t.archived_at.is_none())
            .filter(|t| matches_scope(filter, &t.tenant_id, &t.user_id, &t.workspace_id))
            .cloned()
            .collect();
        out.sort_by_key(|t| t.order);
        out
    }

    pub async fn task_set_status(
        &self,
        task_id: &str,
        status: CatalogStatus,
    ) -> Result<Task, CommandError> {
        let mut inner = self.inner.write().await;
        let task = inner
            .snapshot
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| CommandError::not_found("task", task_id))?;
        task.status = status;
        let result = task.clone();
        self.persist(&inner).await;
        Ok(result)
    }

    /// Atomically rewrite the ordered task list to match `ordered_ids`.
    /// Unknown ids are ignored; ids not present in the input keep their
    /// relative order appended after the reordered prefix.
    pub async fn task_reorder(&self, ordered_ids: &[String]) -> Result<Vec<Task>, CommandError> {
        let mut inner = self.inner.write().await;
        for id in ordered_ids {
            if !inner.snapshot.tasks.contains_key(id) {
                return Err(CommandError::not_found("task", id));
            }
        }
        for (idx, id) in ordered_ids.iter().enumerate() {
            if let Some(task) = inner.snapshot.tasks.get_mut(id) {
                task.order = idx as u32;
            }
        }
        let mut next_order = ordered_ids.len() as u32;
        let remaining: Vec<String> = inner
            .snapshot
            .tasks
            .keys()
            .filter(|id| !ordered_ids.contains(id))
            .cloned()
            .collect();
        for id in remaining {
            if let Some(task) = inner.snapshot.tasks.get_mut(&id) {
                task.order = next_order;
                next_order += 1;
            }
        }
        let mut out: Vec<Task> = inner.snapshot.tasks.values().cloned().collect();
        out.sort_by_key(|t| t.order);
        self.persist(&inner).await;
        Ok(out)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
