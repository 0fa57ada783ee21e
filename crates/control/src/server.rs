// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-Plane Server: the session-lifecycle dispatcher sitting on
//! top of the State Store, Event Normalizer, and a registry of Live
//! Sessions. Generalized from the teacher's single aggregated `MuxState`
//! (one upstream session list, one broadcast channel, `axum` routing) into
//! a transport-agnostic command/response multiplexer keyed by connection
//! id: [`ControlPlane::dispatch`] is called identically whether the frame
//! arrived over the embedded in-process transport or the line-framed TCP
//! transport (see [`crate::transport`]).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use harness_core::error::{CommandError, ErrorKind};
use harness_core::event::{EnvelopeCategory, EnvelopeKind, Scope, SessionEvent};
use harness_core::pty::spawn::NativePty;
use harness_core::pty::Boxed;
use harness_core::session::{
    AttachmentHandle, AttachmentMessage, LiveSession, SessionRegistry, SessionStatus,
    DEFAULT_RING_CAPACITY,
};
use harness_core::status::{reduce, ReducerRegistry, ReducerState, TelemetrySample};

use crate::events::{EventStore, Journal, JournalGap, ObservedEvent, ObservedEventKind, SubscriptionFilter};
use crate::model::{now_ms, Conversation, Directory, Repository, ScopeFilter, Task};
use crate::store::StateStore;
use crate::wire::{err_response, ok_response, Command, Envelope};

/// Tuning knobs for a [`ControlPlane`] instance.
#[derive(Debug, Clone, Copy)]
pub struct ControlPlaneConfig {
    /// Per-session byte-ring capacity, passed through to [`LiveSession::spawn`].
    pub ring_capacity: usize,
    /// Observed-event journal capacity: how many entries the bounded
    /// in-memory journal retains before evicting the oldest.
    pub journal_capacity: usize,
    /// Bounded channel depth for a single attachment or output pump.
    pub attachment_buffer: usize,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            journal_capacity: 4096,
            attachment_buffer: 256,
        }
    }
}

/// Journal plus its broadcast fan-out under one lock, so that a
/// subscriber's catch-up drain and its live hookup happen atomically: the
/// live receiver is obtained before the journal lock is released, so no
/// event published in between can be missed or delivered twice.
struct JournalHub {
    journal: Mutex<Journal>,
    sender: broadcast::Sender<ObservedEvent>,
}

impl JournalHub {
    fn new(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity.max(64));
        Self { journal: Mutex::new(Journal::new(capacity)), sender }
    }

    async fn publish(
        &self,
        scope: Scope,
        kind: ObservedEventKind,
        payload: Value,
        ts_ms: u64,
    ) -> ObservedEvent {
        let mut journal = self.journal.lock().await;
        let event = journal.publish(scope, kind, payload, ts_ms);
        let _ = self.sender.send(event.clone());
        event
    }

    async fn subscribe(
        &self,
        after_cursor: u64,
        filter: &SubscriptionFilter,
    ) -> Result<(Vec<ObservedEvent>, u64, broadcast::Receiver<ObservedEvent>), JournalGap> {
        let journal = self.journal.lock().await;
        let backlog = journal.catch_up(after_cursor, filter)?;
        let cursor = journal.current_cursor();
        Ok((backlog, cursor, self.sender.subscribe()))
    }
}

/// Per-session metadata a [`LiveSession`] doesn't itself carry: its scope,
/// launch command, agent type, terminal palette hints, and the Status
/// Reducer carry-forward state (`ReducerState`, scoped one per session
/// rather than one per process).
struct SessionRuntime {
    scope: Scope,
    started_at_ms: u64,
    launch_command: Vec<String>,
    agent_type: String,
    terminal_foreground_hex: Option<String>,
    terminal_background_hex: Option<String>,
    reducer_state: Mutex<ReducerState>,
    telemetry: Mutex<Option<TelemetrySample>>,
}

/// Per-connection bookkeeping so disconnect can cascade cleanly: detach
/// every attachment, abort every forwarding task, and release every
/// controller claim this connection held. Mirrors the teacher's
/// per-session `cancel: CancellationToken` but scoped to a connection
/// holding references into many sessions instead of one session holding
/// its own lifetime token.
#[derive(Default)]
struct ConnectionState {
    outbound: Option<mpsc::Sender<Envelope>>,
    attachments: HashMap<String, (AttachmentHandle, JoinHandle<()>)>,
    event_subscriptions: HashMap<String, JoinHandle<()>>,
    stream_subscriptions: HashMap<String, JoinHandle<()>>,
    controlled_sessions: HashSet<String>,
}

/// The multiplexer: one instance serves every connection on every
/// transport. Holds the durable catalog ([`StateStore`]), the durable
/// event log ([`EventStore`]), the bounded observed-event journal
/// ([`JournalHub`]), the registry of live PTY sessions, and the
/// per-connection bookkeeping needed to clean up on disconnect.
pub struct ControlPlane {
    config: ControlPlaneConfig,
    store: Arc<StateStore>,
    event_store: Arc<EventStore>,
    journal: JournalHub,
    sessions: SessionRegistry,
    runtimes: RwLock<HashMap<String, Arc<SessionRuntime>>>,
    reducers: ReducerRegistry,
    connections: RwLock<HashMap<String, ConnectionState>>,
}

fn scope_of(
    tenant_id: Option<String>,
    user_id: Option<String>,
    workspace_id: Option<String>,
    directory_id: Option<String>,
    conversation_id: Option<String>,
) -> Scope {
    Scope { tenant_id, user_id, workspace_id, directory_id, conversation_id }
}

impl ControlPlane {
    pub fn new(
        config: ControlPlaneConfig,
        store: Arc<StateStore>,
        event_store: Arc<EventStore>,
        reducers: ReducerRegistry,
    ) -> Arc<Self> {
        Arc::new(Self {
            journal: JournalHub::new(config.journal_capacity),
            config,
            store,
            event_store,
            sessions: SessionRegistry::new(),
            runtimes: RwLock::new(HashMap::new()),
            reducers,
            connections: RwLock::new(HashMap::new()),
        })
    }

    /// Register a connection and its outbound push channel. Must be called
    /// before any `dispatch` that needs to push envelopes (`pty.attach`,
    /// `pty.subscribe-events`, `stream.subscribe`).
    pub async fn connect(&self, connection_id: impl Into<String>, outbound: mpsc::Sender<Envelope>) {
        let id = connection_id.into();
        self.connections.write().await.insert(id, ConnectionState { outbound: Some(outbound), ..Default::default() });
    }

    /// Tear down every resource a connection held: detach attachments,
    /// abort forwarding tasks, release controller claims. Idempotent.
    pub async fn disconnect(&self, connection_id: &str) {
        let Some(state) = self.connections.write().await.remove(connection_id) else { return };

        for (session_id, (handle, task)) in state.attachments {
            task.abort();
            if let Some(session) = self.sessions.get(&session_id).await {
                session.detach(handle).await;
            }
        }
        for (_, task) in state.event_subscriptions {
            task.abort();
        }
        for (_, task) in state.stream_subscriptions {
            task.abort();
        }
        for session_id in state.controlled_sessions {
            if let Some(session) = self.sessions.get(&session_id).await {
                session.release_if_held_by(connection_id).await;
            }
        }
    }

    /// Parse-then-dispatch is handled by callers (`crate::wire::parse_command`
    /// then this); `dispatch` always succeeds at the transport level,
    /// encoding failures as `{ok: false, error}` rather than propagating them.
    pub async fn dispatch(&self, connection_id: &str, command: Command) -> Value {
        match self.handle(connection_id, command).await {
            Ok(fields) => ok_response(fields),
            Err(err) => err_response(&err),
        }
    }

    async fn outbound_for(&self, connection_id: &str) -> Result<mpsc::Sender<Envelope>, CommandError> {
        self.connections
            .read()
            .await
            .get(connection_id)
            .and_then(|c| c.outbound.clone())
            .ok_or_else(|| CommandError::new(ErrorKind::InvalidArgument, "connection not registered"))
    }

    async fn get_live(&self, session_id: &str) -> Result<Arc<LiveSession>, CommandError> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| CommandError::not_found("session", session_id))
    }

    async fn require_controller(
        &self,
        connection_id: &str,
        session: &Arc<LiveSession>,
    ) -> Result<(), CommandError> {
        if session.may_mutate(connection_id).await {
            Ok(())
        } else {
            Err(CommandError::controller_conflict(&session.session_id))
        }
    }

    async fn handle(&self, connection_id: &str, command: Command) -> Result<Value, CommandError> {
        match command {
            Command::DirectoryUpsert { directory_id, tenant_id, user_id, workspace_id, path } => {
                self.directory_upsert(directory_id, tenant_id, user_id, workspace_id, path).await
            }
            Command::DirectoryList { tenant_id, user_id, workspace_id, include_archived, limit } => {
                self.directory_list(tenant_id, user_id, workspace_id, include_archived, limit).await
            }
            Command::DirectoryArchive { directory_id } => self.directory_archive(directory_id).await,
            Command::DirectoryGitStatus { directory_id } => self.directory_git_status(directory_id).await,

            Command::ConversationCreate {
                conversation_id,
                directory_id,
                title,
                agent_type,
                adapter_state,
                tenant_id,
                user_id,
                workspace_id,
            } => {
                self.conversation_create(
                    conversation_id,
                    directory_id,
                    title,
                    agent_type,
                    adapter_state,
                    tenant_id,
                    user_id,
                    workspace_id,
                )
                .await
            }
            Command::ConversationList { tenant_id, user_id, workspace_id, include_archived, limit } => {
                self.conversation_list(tenant_id, user_id, workspace_id, include_archived, limit).await
            }
            Command::ConversationArchive { conversation_id } => {
                self.conversation_archive(conversation_id).await
            }
            Command::ConversationUpdate { conversation_id, title } => {
                self.conversation_update(conversation_id, title).await
            }
            Command::ConversationDelete { conversation_id } => {
                self.conversation_delete(conversation_id).await
            }

            Command::RepositoryUpsert { repository_id, tenant_id, user_id, workspace_id, name } => {
                self.repository_upsert(repository_id, tenant_id, user_id, workspace_id, name).await
            }
            Command::RepositoryList { tenant_id, user_id, workspace_id, include_archived, limit } => {
                self.repository_list(tenant_id, user_id, workspace_id, include_archived, limit).await
            }
            Command::RepositorySetStatus { repository_id, status } => {
                self.repository_set_status(repository_id, status).await
            }

            Command::TaskCreate {
                task_id,
                tenant_id,
                user_id,
                workspace_id,
                repository_id,
                project_id,
                title,
            } => {
                self.task_create(task_id, tenant_id, user_id, workspace_id, repository_id, project_id, title)
                    .await
            }
            Command::TaskList { tenant_id, user_id, workspace_id, include_archived, limit } => {
                self.task_list(tenant_id, user_id, workspace_id, include_archived, limit).await
            }
            Command::TaskSetStatus { task_id, status } => self.task_set_status(task_id, status).await,
            Command::TaskReorder { ordered_ids } => self.task_reorder(ordered_ids).await,

            Command::StreamSubscribe {
                tenant_id,
                user_id,
                workspace_id,
                repository_id,
                task_id,
                directory_id,
                conversation_id,
                include_output,
                after_cursor,
            } => {
                self.stream_subscribe(
                    connection_id,
                    tenant_id,
                    user_id,
                    workspace_id,
                    repository_id,
                    task_id,
                    directory_id,
                    conversation_id,
                    include_output,
                    after_cursor,
                )
                .await
            }
            Command::StreamUnsubscribe { subscription_id } => {
                self.stream_unsubscribe(connection_id, subscription_id).await
            }

            Command::SessionList { sort, limit } => self.session_list(sort, limit).await,
            Command::AttentionList {} => self.attention_list().await,
            Command::SessionStatus { session_id } => self.session_status(session_id).await,
            Command::SessionSnapshot { session_id, tail_lines } => {
                self.session_snapshot(session_id, tail_lines).await
            }
            Command::SessionRespond { session_id, text } => {
                self.session_respond(connection_id, session_id, text).await
            }
            Command::SessionClaim {
                session_id,
                controller_id,
                controller_type,
                controller_label,
                reason,
                takeover,
            } => {
                self.session_claim(
                    connection_id,
                    session_id,
                    controller_id,
                    controller_type,
                    controller_label,
                    reason,
                    takeover,
                )
                .await
            }
            Command::SessionRelease { session_id, reason } => {
                self.session_release(connection_id, session_id, reason).await
            }
            Command::SessionInterrupt { session_id } => {
                self.session_interrupt(connection_id, session_id).await
            }
            Command::SessionRemove { session_id } => {
                self.session_remove(connection_id, session_id).await
            }

            Command::PtyStart {
                session_id,
                args,
                env,
                cwd,
                initial_cols,
                initial_rows,
                tenant_id,
                user_id,
                workspace_id,
                worktree_id,
                terminal_foreground_hex,
                terminal_background_hex,
            } => {
                self.pty_start(
                    session_id,
                    args,
                    env,
                    cwd,
                    initial_cols,
                    initial_rows,
                    tenant_id,
                    user_id,
                    workspace_id,
                    worktree_id,
                    terminal_foreground_hex,
                    terminal_background_hex,
                )
                .await
            }
            Command::PtyAttach { session_id, since_cursor } => {
                self.pty_attach(connection_id, session_id, since_cursor).await
            }
            Command::PtyDetach { session_id } => self.pty_detach(connection_id, session_id).await,
            Command::PtySubscribeEvents { session_id } => {
                self.pty_subscribe_events(connection_id, session_id).await
            }
            Command::PtyUnsubscribeEvents { session_id } => {
                self.pty_unsubscribe_events(connection_id, session_id).await
            }
            Command::PtyClose { session_id } => self.pty_close(connection_id, session_id).await,
            Command::PtyInput { session_id, chunk_base64 } => {
                self.pty_input(connection_id, session_id, chunk_base64).await
            }
            Command::PtyResize { session_id, cols, rows } => {
                self.pty_resize(connection_id, session_id, cols, rows).await
            }
        }
    }

    // -- Directory ----------------------------------------------------------

    async fn directory_upsert(
        &self,
        directory_id: Option<String>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        path: String,
    ) -> Result<Value, CommandError> {
        let directory_id = directory_id.unwrap_or_else(|| format!("directory-{path}"));
        let directory = Directory {
            directory_id,
            tenant_id,
            user_id,
            workspace_id,
            path,
            archived_at: None,
        };
        let saved = self.store.directory_upsert(directory).await;
        self.journal
            .publish(
                scope_of(
                    saved.tenant_id.clone(),
                    saved.user_id.clone(),
                    saved.workspace_id.clone(),
                    Some(saved.directory_id.clone()),
                    None,
                ),
                ObservedEventKind::DirectoryUpserted,
                json!({ "directory": saved }),
                now_ms(),
            )
            .await;
        Ok(json!({ "directory": saved }))
    }

    async fn directory_list(
        &self,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        include_archived: bool,
        limit: Option<usize>,
    ) -> Result<Value, CommandError> {
        let filter = ScopeFilter { tenant_id, user_id, workspace_id, include_archived, limit };
        let directories = self.store.directory_list(&filter).await;
        Ok(json!({ "directories": directories }))
    }

    async fn directory_archive(&self, directory_id: String) -> Result<Value, CommandError> {
        let directory = self.store.directory_archive(&directory_id).await?;
        self.journal
            .publish(
                scope_of(
                    directory.tenant_id.clone(),
                    directory.user_id.clone(),
                    directory.workspace_id.clone(),
                    Some(directory.directory_id.clone()),
                    None,
                ),
                ObservedEventKind::DirectoryArchived,
                json!({ "directory": directory }),
                now_ms(),
            )
            .await;
        Ok(json!({ "directory": directory }))
    }

    /// Stub for the external-collaborator interface; git status
    /// snapshotting is out of scope. Validates the directory
    /// exists so callers still get `not-found` on a bad id, but performs
    /// no actual git plumbing.
    async fn directory_git_status(&self, directory_id: String) -> Result<Value, CommandError> {
        self.store
            .directory_get(&directory_id)
            .await
            .ok_or_else(|| CommandError::not_found("directory", &directory_id))?;
        Ok(json!({ "directoryId": directory_id, "gitStatus": Value::Null }))
    }

    // -- Conversation ---------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn conversation_create(
        &self,
        conversation_id: Option<String>,
        directory_id: String,
        title: String,
        agent_type: String,
        adapter_state: serde_json::Map<String, Value>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
    ) -> Result<Value, CommandError> {
        let conversation_id = conversation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let conversation = Conversation {
            conversation_id,
            directory_id,
            tenant_id,
            user_id,
            workspace_id,
            title,
            agent_type,
            adapter_state,
            runtime_status: None,
            runtime_live: false,
            archived_at: None,
        };
        let saved = self.store.conversation_create(conversation).await;
        self.journal
            .publish(
                scope_of(
                    saved.tenant_id.clone(),
                    saved.user_id.clone(),
                    saved.workspace_id.clone(),
                    Some(saved.directory_id.clone()),
                    Some(saved.conversation_id.clone()),
                ),
                ObservedEventKind::ConversationCreated,
                json!({ "conversation": saved }),
                now_ms(),
            )
            .await;
        Ok(json!({ "conversation": saved }))
    }

    async fn conversation_list(
        &self,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        include_archived: bool,
        limit: Option<usize>,
    ) -> Result<Value, CommandError> {
        let filter = ScopeFilter { tenant_id, user_id, workspace_id, include_archived, limit };
        let conversations = self.store.conversation_list(&filter).await;
        Ok(json!({ "conversations": conversations }))
    }

    async fn conversation_archive(&self, conversation_id: String) -> Result<Value, CommandError> {
        let conversation = self.store.conversation_archive(&conversation_id).await?;
        self.journal
            .publish(
                scope_of(
                    conversation.tenant_id.clone(),
                    conversation.user_id.clone(),
                    conversation.workspace_id.clone(),
                    Some(conversation.directory_id.clone()),
                    Some(conversation.conversation_id.clone()),
                ),
                ObservedEventKind::ConversationArchived,
                json!({ "conversation": conversation }),
                now_ms(),
            )
            .await;
        Ok(json!({ "conversation": conversation }))
    }

    async fn conversation_update(
        &self,
        conversation_id: String,
        title: String,
    ) -> Result<Value, CommandError> {
        let conversation = self.store.conversation_update_title(&conversation_id, title).await?;
        self.journal
            .publish(
                scope_of(
                    conversation.tenant_id.clone(),
                    conversation.user_id.clone(),
                    conversation.workspace_id.clone(),
                    Some(conversation.directory_id.clone()),
                    Some(conversation.conversation_id.clone()),
                ),
                ObservedEventKind::ConversationUpdated,
                json!({ "conversation": conversation }),
                now_ms(),
            )
            .await;
        Ok(json!({ "conversation": conversation }))
    }

    async fn conversation_delete(&self, conversation_id: String) -> Result<Value, CommandError> {
        let existing = self
            .store
            .conversation_get(&conversation_id)
            .await
            .ok_or_else(|| CommandError::not_found("conversation", &conversation_id))?;
        self.destroy_session(&conversation_id).await;
        self.store.conversation_delete(&conversation_id).await?;
        self.journal
            .publish(
                scope_of(
                    existing.tenant_id.clone(),
                    existing.user_id.clone(),
                    existing.workspace_id.clone(),
                    Some(existing.directory_id.clone()),
                    Some(conversation_id.clone()),
                ),
                ObservedEventKind::ConversationDeleted,
                json!({ "conversationId": conversation_id }),
                now_ms(),
            )
            .await;
        Ok(json!({}))
    }

    // -- Repository -----------------------------------------------------------

    async fn repository_upsert(
        &self,
        repository_id: Option<String>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        name: String,
    ) -> Result<Value, CommandError> {
        let repository_id = repository_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let repository = Repository {
            repository_id,
            tenant_id,
            user_id,
            workspace_id,
            name,
            status: crate::model::CatalogStatus::Draft,
            archived_at: None,
        };
        let saved = self.store.repository_upsert(repository).await;
        self.journal
            .publish(
                scope_of(
                    saved.tenant_id.clone(),
                    saved.user_id.clone(),
                    saved.workspace_id.clone(),
                    None,
                    None,
                ),
                ObservedEventKind::RepositoryUpserted,
                json!({ "repository": saved }),
                now_ms(),
            )
            .await;
        Ok(json!({ "repository": saved }))
    }

    async fn repository_list(
        &self,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        include_archived: bool,
        limit: Option<usize>,
    ) -> Result<Value, CommandError> {
        let filter = ScopeFilter { tenant_id, user_id, workspace_id, include_archived, limit };
        let repositories = self.store.repository_list(&filter).await;
        Ok(json!({ "repositories": repositories }))
    }

    async fn repository_set_status(
        &self,
        repository_id: String,
        status: crate::model::CatalogStatus,
    ) -> Result<Value, CommandError> {
        let repository = self.store.repository_set_status(&repository_id, status).await?;
        self.journal
            .publish(
                scope_of(
                    repository.tenant_id.clone(),
                    repository.user_id.clone(),
                    repository.workspace_id.clone(),
                    None,
                    None,
                ),
                ObservedEventKind::RepositoryUpserted,
                json!({ "repository": repository }),
                now_ms(),
            )
            .await;
        Ok(json!({ "repository": repository }))
    }

    // -- Task -----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn task_create(
        &self,
        task_id: Option<String>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        repository_id: Option<String>,
        project_id: Option<String>,
        title: String,
    ) -> Result<Value, CommandError> {
        let task_id = task_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let task = Task {
            task_id,
            tenant_id,
            user_id,
            workspace_id,
            repository_id,
            project_id,
            title,
            status: crate::model::CatalogStatus::Draft,
            order: 0,
            archived_at: None,
        };
        let saved = self.store.task_create(task).await?;
        self.journal
            .publish(
                scope_of(
                    saved.tenant_id.clone(),
                    saved.user_id.clone(),
                    saved.workspace_id.clone(),
                    None,
                    None,
                ),
                ObservedEventKind::TaskUpserted,
                json!({ "task": saved }),
                now_ms(),
            )
            .await;
        Ok(json!({ "task": saved }))
    }

    async fn task_list(
        &self,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        include_archived: bool,
        limit: Option<usize>,
    ) -> Result<Value, CommandError> {
        let filter = ScopeFilter { tenant_id, user_id, workspace_id, include_archived, limit };
        let tasks = self.store.task_list(&filter).await;
        Ok(json!({ "tasks": tasks }))
    }

    async fn task_set_status(
        &self,
        task_id: String,
        status: crate::model::CatalogStatus,
    ) -> Result<Value, CommandError> {
        let task = self.store.task_set_status(&task_id, status).await?;
        self.journal
            .publish(
                scope_of(task.tenant_id.clone(), task.user_id.clone(), task.workspace_id.clone(), None, None),
                ObservedEventKind::TaskUpserted,
                json!({ "task": task }),
                now_ms(),
            )
            .await;
        Ok(json!({ "task": task }))
    }

    /// A reorder can span tasks with different scopes, so the observed
    /// event this raises is unscoped — a deliberate simplification over
    /// per-task normalized events (see DESIGN.md).
    async fn task_reorder(&self, ordered_ids: Vec<String>) -> Result<Value, CommandError> {
        let tasks = self.store.task_reorder(&ordered_ids).await?;
        self.journal
            .publish(
                Scope::default(),
                ObservedEventKind::TaskUpserted,
                json!({ "tasks": tasks }),
                now_ms(),
            )
            .await;
        Ok(json!({ "tasks": tasks }))
    }

    // -- Streaming subscription -------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn stream_subscribe(
        &self,
        connection_id: &str,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        repository_id: Option<String>,
        task_id: Option<String>,
        directory_id: Option<String>,
        conversation_id: Option<String>,
        include_output: bool,
        after_cursor: u64,
    ) -> Result<Value, CommandError> {
        // repository_id/task_id don't narrow `Scope` — the observed-event
        // scope model only extends to tenant/user/workspace/directory/
        // conversation (see DESIGN.md); they're accepted for wire
        // compatibility but don't filter.
        let _ = (repository_id, task_id);

        let outbound = self.outbound_for(connection_id).await?;
        let scope = scope_of(tenant_id, user_id, workspace_id, directory_id, conversation_id);
        let filter = SubscriptionFilter { scope, include_output };

        let (backlog, cursor, mut live_rx) = self
            .journal
            .subscribe(after_cursor, &filter)
            .await
            .map_err(|gap| {
                CommandError::new(
                    ErrorKind::JournalGap,
                    format!("journal gap, current cursor {}", gap.current_cursor),
                )
            })?;

        let subscription_id = Uuid::new_v4().to_string();
        for event in &backlog {
            let _ = outbound
                .send(Envelope::StreamEvent {
                    subscription_id: subscription_id.clone(),
                    cursor: event.cursor,
                    event: event.clone(),
                })
                .await;
        }

        let task_subscription_id = subscription_id.clone();
        let task_outbound = outbound.clone();
        let task = tokio::spawn(async move {
            loop {
                match live_rx.recv().await {
                    Ok(event) => {
                        if !filter.matches(&event) {
                            continue;
                        }
                        let envelope = Envelope::StreamEvent {
                            subscription_id: task_subscription_id.clone(),
                            cursor: event.cursor,
                            event,
                        };
                        if task_outbound.send(envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.connections
            .write()
            .await
            .entry(connection_id.to_owned())
            .or_default()
            .stream_subscriptions
            .insert(subscription_id.clone(), task);

        Ok(json!({ "subscriptionId": subscription_id, "cursor": cursor }))
    }

    async fn stream_unsubscribe(
        &self,
        connection_id: &str,
        subscription_id: String,
    ) -> Result<Value, CommandError> {
        if let Some(task) = self
            .connections
            .write()
            .await
            .get_mut(connection_id)
            .and_then(|c| c.stream_subscriptions.remove(&subscription_id))
        {
            task.abort();
        }
        Ok(json!({}))
    }

    // -- Session lifecycle / controller discipline ------------------------------

    async fn summarize_session(&self, session: &Arc<LiveSession>) -> Value {
        let status = session.status().await;
        let attention_reason = session.attention_reason().await;
        let runtime = self.runtimes.read().await.get(&session.session_id).cloned();

        let status_model = match &runtime {
            Some(runtime) => {
                let mut state = runtime.reducer_state.lock().await;
                let telemetry = runtime.telemetry.lock().await.clone();
                let reducer = self.reducers.get(&runtime.agent_type);
                Some(reduce(
                    reducer.as_ref(),
                    status,
                    attention_reason.as_deref(),
                    telemetry.as_ref(),
                    &mut state,
                    now_ms(),
                ))
            }
            None => None,
        };

        json!({
            "sessionId": session.session_id,
            "status": status,
            "attentionReason": attention_reason,
            "controller": session.controller().await,
            "processId": session.child_pid(),
            "lastObservedOutputCursor": session.latest_cursor().await,
            "lastExit": session.last_exit().await,
            "startedAt": runtime.as_ref().map(|r| r.started_at_ms),
            "launchCommand": runtime.as_ref().map(|r| r.launch_command.clone()),
            "scope": runtime.as_ref().map(|r| r.scope.clone()),
            "terminalForegroundHex": runtime.as_ref().and_then(|r| r.terminal_foreground_hex.clone()),
            "terminalBackgroundHex": runtime.as_ref().and_then(|r| r.terminal_background_hex.clone()),
            "statusModel": status_model,
        })
    }

    async fn session_list(
        &self,
        sort: crate::wire::SessionSort,
        limit: Option<usize>,
    ) -> Result<Value, CommandError> {
        use crate::wire::SessionSort;

        let sessions = self.sessions.list().await;
        let mut rows = Vec::with_capacity(sessions.len());
        for session in &sessions {
            let status = session.status().await;
            let started_at = self
                .runtimes
                .read()
                .await
                .get(&session.session_id)
                .map(|r| r.started_at_ms)
                .unwrap_or(0);
            let summary = self.summarize_session(session).await;
            rows.push((status, started_at, summary));
        }

        match sort {
            SessionSort::AttentionFirst => rows.sort_by(|a, b| {
                fn rank(status: SessionStatus) -> u8 {
                    match status {
                        SessionStatus::NeedsInput => 0,
                        SessionStatus::Running => 1,
                        SessionStatus::Completed => 2,
                        SessionStatus::Exited => 3,
                    }
                }
                rank(a.0).cmp(&rank(b.0)).then(b.1.cmp(&a.1))
            }),
            SessionSort::StartedDesc => rows.sort_by(|a, b| b.1.cmp(&a.1)),
            SessionSort::StartedAsc => rows.sort_by(|a, b| a.1.cmp(&b.1)),
        }

        let mut summaries: Vec<Value> = rows.into_iter().map(|(_, _, v)| v).collect();
        if let Some(limit) = limit {
            summaries.truncate(limit);
        }
        Ok(json!({ "sessions": summaries }))
    }

    async fn attention_list(&self) -> Result<Value, CommandError> {
        let sessions = self.sessions.list().await;
        let mut summaries = Vec::new();
        for session in &sessions {
            if session.status().await == SessionStatus::NeedsInput {
                summaries.push(self.summarize_session(session).await);
            }
        }
        Ok(json!({ "sessions": summaries }))
    }

    async fn session_status(&self, session_id: String) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        Ok(json!({ "session": self.summarize_session(&session).await }))
    }

    async fn session_snapshot(
        &self,
        session_id: String,
        tail_lines: Option<usize>,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        let frame = session.snapshot().await;
        let lines = match tail_lines {
            Some(n) => session.buffer_tail(n).await,
            None => frame.lines.clone(),
        };
        Ok(json!({
            "sessionId": session_id,
            "cols": frame.cols,
            "rows": frame.rows,
            "activeScreen": frame.active_screen,
            "modes": frame.modes,
            "cursor": frame.cursor,
            "viewport": frame.viewport,
            "lines": lines,
        }))
    }

    async fn session_respond(
        &self,
        connection_id: &str,
        session_id: String,
        text: String,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        self.require_controller(connection_id, &session).await?;
        session.write(Bytes::from(text.into_bytes())).await?;
        session.mark_running().await?;
        Ok(json!({}))
    }

    async fn session_claim(
        &self,
        connection_id: &str,
        session_id: String,
        controller_id: String,
        controller_type: crate::wire::ControllerType,
        controller_label: Option<String>,
        reason: Option<String>,
        takeover: bool,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        let took_over = session.claim(&controller_id, takeover).await?;

        self.connections
            .write()
            .await
            .entry(connection_id.to_owned())
            .or_default()
            .controlled_sessions
            .insert(session_id.clone());

        if let Some(runtime) = self.runtimes.read().await.get(&session_id).cloned() {
            self.journal
                .publish(
                    runtime.scope.clone(),
                    ObservedEventKind::SessionControl,
                    json!({
                        "sessionId": session_id,
                        "controllerId": controller_id,
                        "controllerType": controller_type,
                        "controllerLabel": controller_label,
                        "reason": reason,
                        "takeover": took_over,
                    }),
                    now_ms(),
                )
                .await;
        }

        Ok(json!({ "sessionId": session_id, "controllerId": controller_id, "tookOver": took_over }))
    }

    async fn session_release(
        &self,
        connection_id: &str,
        session_id: String,
        reason: Option<String>,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        session.release(connection_id).await;

        if let Some(conn) = self.connections.write().await.get_mut(connection_id) {
            conn.controlled_sessions.remove(&session_id);
        }
        if let Some(runtime) = self.runtimes.read().await.get(&session_id).cloned() {
            self.journal
                .publish(
                    runtime.scope.clone(),
                    ObservedEventKind::SessionControl,
                    json!({ "sessionId": session_id, "released": true, "reason": reason }),
                    now_ms(),
                )
                .await;
        }
        Ok(json!({}))
    }

    async fn session_interrupt(
        &self,
        connection_id: &str,
        session_id: String,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        self.require_controller(connection_id, &session).await?;
        session.write(Bytes::from_static(b"\x03")).await?;
        session.record_event(SessionEvent::TurnCompleted).await;
        Ok(json!({}))
    }

    async fn session_remove(
        &self,
        connection_id: &str,
        session_id: String,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        self.require_controller(connection_id, &session).await?;
        if !self.destroy_session(&session_id).await {
            return Err(CommandError::not_found("session", &session_id));
        }
        Ok(json!({}))
    }

    /// Remove a session from the registry, request its process die, and
    /// record the exit immediately — the actual OS-level exit (and the
    /// `pty.exit` fan-out it triggers through the attachment/normalizer
    /// pumps already running) follows shortly after `kill`. Returns
    /// `false` if no such session was live.
    async fn destroy_session(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions.remove(session_id).await else { return false };
        session.kill(None).await;
        if let Some(runtime) = self.runtimes.write().await.remove(session_id) {
            self.store.conversation_mark_runtime(session_id, SessionStatus::Exited, false).await;
            self.journal
                .publish(
                    runtime.scope.clone(),
                    ObservedEventKind::SessionStatus,
                    json!({ "sessionId": session_id, "status": "exited" }),
                    now_ms(),
                )
                .await;
        }
        true
    }

    // -- PTY lifecycle ----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn pty_start(
        &self,
        session_id: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        cwd: Option<String>,
        initial_cols: u16,
        initial_rows: u16,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        worktree_id: Option<String>,
        terminal_foreground_hex: Option<String>,
        terminal_background_hex: Option<String>,
    ) -> Result<Value, CommandError> {
        let _ = worktree_id; // not modeled in Scope; see DESIGN.md

        if args.is_empty() {
            return Err(CommandError::new(ErrorKind::InvalidArgument, "pty.start requires at least one argument"));
        }
        if self.sessions.get(&session_id).await.is_some() {
            return Err(CommandError::new(
                ErrorKind::ConstraintViolation,
                format!("session `{session_id}` already running"),
            ));
        }

        // `sessionId == conversationId` for threads; look up the durable
        // conversation, if any, to inherit its directory and agent type.
        let conversation = self.store.conversation_get(&session_id).await;
        let directory_id = conversation.as_ref().map(|c| c.directory_id.clone());
        let agent_type = conversation.as_ref().map(|c| c.agent_type.clone()).unwrap_or_else(|| "unknown".to_owned());

        let env_pairs: Vec<(String, String)> = env.into_iter().collect();
        let backend = NativePty::spawn_in(&args, initial_cols, initial_rows, &env_pairs, cwd.as_deref())
            .map_err(|e| CommandError::new(ErrorKind::PtyStartFailed, e.to_string()))?;

        let (session, events_rx) = LiveSession::spawn(
            session_id.clone(),
            backend.boxed(),
            initial_cols,
            initial_rows,
            self.config.ring_capacity,
        );
        self.sessions.insert(Arc::clone(&session)).await;

        let scope = scope_of(tenant_id, user_id, workspace_id, directory_id, Some(session_id.clone()));
        let runtime = Arc::new(SessionRuntime {
            scope: scope.clone(),
            started_at_ms: now_ms(),
            launch_command: args,
            agent_type,
            terminal_foreground_hex,
            terminal_background_hex,
            reducer_state: Mutex::new(ReducerState::default()),
            telemetry: Mutex::new(None),
        });
        self.runtimes.write().await.insert(session_id.clone(), Arc::clone(&runtime));

        self.spawn_normalizer_pump(Arc::clone(&session), Arc::clone(&runtime), events_rx);
        self.spawn_output_pump(Arc::clone(&session), Arc::clone(&runtime));

        self.store.conversation_mark_runtime(&session_id, SessionStatus::Running, true).await;
        self.journal
            .publish(
                scope,
                ObservedEventKind::SessionStatus,
                json!({ "sessionId": session_id, "status": "running" }),
                now_ms(),
            )
            .await;

        Ok(json!({ "sessionId": session_id }))
    }

    /// Forward [`SessionEvent`]s into the Event Store (for the kinds the
    /// Event Normalizer stamps) and into the observed-event journal,
    /// keeping the durable conversation row's advisory runtime fields in
    /// sync. Detection of the underlying notify/telemetry/attention
    /// protocol from raw PTY bytes is out of scope (that would mean
    /// building an agent runtime); this pump only reacts to whatever calls
    /// [`LiveSession::record_event`].
    fn spawn_normalizer_pump(
        self: &Arc<Self>,
        session: Arc<LiveSession>,
        runtime: Arc<SessionRuntime>,
        mut events_rx: broadcast::Receiver<SessionEvent>,
    ) {
        let control = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = match events_rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                control.handle_session_event(&session, &runtime, event).await;
            }
        });
    }

    async fn handle_session_event(
        &self,
        session: &Arc<LiveSession>,
        runtime: &Arc<SessionRuntime>,
        event: SessionEvent,
    ) {
        let ts = now_ms();

        if let Some(kind) = event.envelope_kind() {
            let category = match kind {
                EnvelopeKind::ProviderTextDelta => EnvelopeCategory::ProviderText,
                EnvelopeKind::ProviderTurnCompleted => EnvelopeCategory::ProviderTurn,
                EnvelopeKind::MetaAttentionRaised | EnvelopeKind::MetaAttentionCleared => {
                    EnvelopeCategory::MetaAttention
                }
                EnvelopeKind::MetaNotifyObserved => EnvelopeCategory::MetaNotify,
            };
            let payload = serde_json::to_value(&event).unwrap_or(Value::Null);
            self.event_store.append(
                runtime.scope.clone(),
                category,
                kind,
                payload,
                Uuid::new_v4().to_string(),
                ts,
            );
        }

        match &event {
            SessionEvent::Notify { payload } => {
                if let Ok(sample) = serde_json::from_value::<TelemetrySample>(payload.clone()) {
                    *runtime.telemetry.lock().await = Some(sample);
                }
                self.journal
                    .publish(
                        runtime.scope.clone(),
                        ObservedEventKind::SessionStatus,
                        json!({ "sessionId": session.session_id, "notify": payload }),
                        ts,
                    )
                    .await;
            }
            SessionEvent::AttentionRequired { reason } => {
                self.journal
                    .publish(
                        runtime.scope.clone(),
                        ObservedEventKind::AttentionRaised,
                        json!({ "sessionId": session.session_id, "reason": reason }),
                        ts,
                    )
                    .await;
            }
            SessionEvent::AttentionCleared => {
                self.journal
                    .publish(
                        runtime.scope.clone(),
                        ObservedEventKind::AttentionCleared,
                        json!({ "sessionId": session.session_id }),
                        ts,
                    )
                    .await;
            }
            SessionEvent::TurnCompleted => {}
            SessionEvent::SessionExit { exit } => {
                self.journal
                    .publish(
                        runtime.scope.clone(),
                        ObservedEventKind::SessionStatus,
                        json!({ "sessionId": session.session_id, "exit": exit }),
                        ts,
                    )
                    .await;
            }
        }

        let status = session.status().await;
        if let Some(conversation_id) = &runtime.scope.conversation_id {
            self.store
                .conversation_mark_runtime(conversation_id, status, status != SessionStatus::Exited)
                .await;
        }
    }

    /// Attach an internal, never-detached observer so raw PTY bytes reach
    /// the observed-event journal as `session-output` events independent
    /// of any real `pty.attach` connection — `stream.subscribe
    /// {includeOutput: true}` consumers need these even with zero
    /// attached clients — streaming-journal delivery is distinct from
    /// direct attachment delivery.
    fn spawn_output_pump(self: &Arc<Self>, session: Arc<LiveSession>, runtime: Arc<SessionRuntime>) {
        let control = Arc::clone(self);
        let buffer = self.config.attachment_buffer;
        tokio::spawn(async move {
            let (handle, mut rx, _gap) = session.attach(0, buffer).await;
            while let Some(message) = rx.recv().await {
                match message {
                    AttachmentMessage::Output(chunk) => {
                        let encoded = base64::engine::general_purpose::STANDARD.encode(&chunk.data);
                        control
                            .journal
                            .publish(
                                runtime.scope.clone(),
                                ObservedEventKind::SessionOutput,
                                json!({
                                    "sessionId": session.session_id,
                                    "cursor": chunk.cursor,
                                    "chunkBase64": encoded,
                                }),
                                now_ms(),
                            )
                            .await;
                    }
                    AttachmentMessage::Exit(_) => break,
                }
            }
            session.detach(handle).await;
        });
    }

    async fn pty_attach(
        &self,
        connection_id: &str,
        session_id: String,
        since_cursor: u64,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        let outbound = self.outbound_for(connection_id).await?;

        if let Some((old_handle, old_task)) = {
            let mut connections = self.connections.write().await;
            connections.get_mut(connection_id).and_then(|c| c.attachments.remove(&session_id))
        } {
            old_task.abort();
            session.detach(old_handle).await;
        }

        let (handle, mut rx, gap) = session.attach(since_cursor, self.config.attachment_buffer).await;
        let forward_session_id = session_id.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let envelope = match message {
                    AttachmentMessage::Output(chunk) => Envelope::PtyOutput {
                        session_id: forward_session_id.clone(),
                        cursor: chunk.cursor,
                        chunk_base64: base64::engine::general_purpose::STANDARD.encode(&chunk.data),
                    },
                    AttachmentMessage::Exit(exit) => {
                        Envelope::PtyExit { session_id: forward_session_id.clone(), exit }
                    }
                };
                if outbound.send(envelope).await.is_err() {
                    break;
                }
            }
        });

        self.connections
            .write()
            .await
            .entry(connection_id.to_owned())
            .or_default()
            .attachments
            .insert(session_id.clone(), (handle, task));

        Ok(json!({ "sessionId": session_id, "gap": gap }))
    }

    async fn pty_detach(&self, connection_id: &str, session_id: String) -> Result<Value, CommandError> {
        let handle_task = self
            .connections
            .write()
            .await
            .get_mut(connection_id)
            .and_then(|c| c.attachments.remove(&session_id));
        if let Some((handle, task)) = handle_task {
            task.abort();
            if let Some(session) = self.sessions.get(&session_id).await {
                session.detach(handle).await;
            }
        }
        Ok(json!({}))
    }

    async fn pty_subscribe_events(
        &self,
        connection_id: &str,
        session_id: String,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        let outbound = self.outbound_for(connection_id).await?;
        let mut events_rx = session.subscribe_events();
        let forward_session_id = session_id.clone();
        let task = tokio::spawn(async move {
            loop {
                match events_rx.recv().await {
                    Ok(event) => {
                        let envelope = Envelope::PtyEvent { session_id: forward_session_id.clone(), event };
                        if outbound.send(envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Some(old_task) = self
            .connections
            .write()
            .await
            .entry(connection_id.to_owned())
            .or_default()
            .event_subscriptions
            .insert(session_id, task)
        {
            old_task.abort();
        }
        Ok(json!({}))
    }

    async fn pty_unsubscribe_events(
        &self,
        connection_id: &str,
        session_id: String,
    ) -> Result<Value, CommandError> {
        if let Some(task) = self
            .connections
            .write()
            .await
            .get_mut(connection_id)
            .and_then(|c| c.event_subscriptions.remove(&session_id))
        {
            task.abort();
        }
        Ok(json!({}))
    }

    async fn pty_close(
        &self,
        connection_id: &str,
        session_id: String,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        self.require_controller(connection_id, &session).await?;
        if !self.destroy_session(&session_id).await {
            return Err(CommandError::session_not_live(&session_id));
        }
        Ok(json!({}))
    }

    async fn pty_input(
        &self,
        connection_id: &str,
        session_id: String,
        chunk_base64: String,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        self.require_controller(connection_id, &session).await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(chunk_base64)
            .map_err(|e| CommandError::new(ErrorKind::InvalidArgument, format!("invalid base64: {e}")))?;
        session.write(Bytes::from(bytes)).await?;
        Ok(json!({}))
    }

    async fn pty_resize(
        &self,
        connection_id: &str,
        session_id: String,
        cols: u16,
        rows: u16,
    ) -> Result<Value, CommandError> {
        let session = self.get_live(&session_id).await?;
        self.require_controller(connection_id, &session).await?;
        session.resize(cols, rows).await?;
        Ok(json!({}))
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
