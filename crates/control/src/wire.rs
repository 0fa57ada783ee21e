// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed command/envelope vocabulary. `Command` is a tagged union so
//! the server's dispatch can be exhaustive; `parse_command` returns a
//! `CommandParseResult = Ok(Command) | Err(invalid-argument)` shape
//! instead of propagating serde's own error type.
//!
//! Every variant pins its own wire tag with `#[serde(rename = "...")]`
//! (the command names are dotted, e.g. `pty.subscribe-events`, which no
//! case convention produces on its own); the container's `rename_all =
//! "camelCase"` only governs the field names within each variant, to
//! produce `directoryId`/`initialCols`/`chunkBase64` wire casing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use harness_core::error::{CommandError, ErrorKind};
use harness_core::event::SessionEvent;
use harness_core::pty::ExitStatus;

use crate::events::ObservedEvent;
use crate::model::CatalogStatus;

/// `session.claim`'s `controllerType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerType {
    Human,
    Agent,
    Automation,
}

/// `session.list`'s `sort`, also used to order the rendered rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionSort {
    #[default]
    AttentionFirst,
    StartedDesc,
    StartedAsc,
}

/// The closed command set. Every command deserializes from its wire
/// `type` tag; every field name matches its camelCase wire name via
/// `rename_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename = "directory.upsert")]
    DirectoryUpsert {
        directory_id: Option<String>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        path: String,
    },
    #[serde(rename = "directory.list")]
    DirectoryList {
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        #[serde(default)]
        include_archived: bool,
        limit: Option<usize>,
    },
    #[serde(rename = "directory.archive")]
    DirectoryArchive { directory_id: String },
    #[serde(rename = "directory.git-status")]
    DirectoryGitStatus { directory_id: String },

    #[serde(rename = "conversation.create")]
    ConversationCreate {
        conversation_id: Option<String>,
        directory_id: String,
        title: String,
        agent_type: String,
        #[serde(default)]
        adapter_state: serde_json::Map<String, Value>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
    },
    #[serde(rename = "conversation.list")]
    ConversationList {
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        #[serde(default)]
        include_archived: bool,
        limit: Option<usize>,
    },
    #[serde(rename = "conversation.archive")]
    ConversationArchive { conversation_id: String },
    #[serde(rename = "conversation.update")]
    ConversationUpdate { conversation_id: String, title: String },
    #[serde(rename = "conversation.delete")]
    ConversationDelete { conversation_id: String },

    #[serde(rename = "repository.upsert")]
    RepositoryUpsert {
        repository_id: Option<String>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        name: String,
    },
    #[serde(rename = "repository.list")]
    RepositoryList {
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        #[serde(default)]
        include_archived: bool,
        limit: Option<usize>,
    },
    #[serde(rename = "repository.set-status")]
    RepositorySetStatus { repository_id: String, status: CatalogStatus },

    #[serde(rename = "task.create")]
    TaskCreate {
        task_id: Option<String>,
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        repository_id: Option<String>,
        project_id: Option<String>,
        title: String,
    },
    #[serde(rename = "task.list")]
    TaskList {
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        #[serde(default)]
        include_archived: bool,
        limit: Option<usize>,
    },
    #[serde(rename = "task.set-status")]
    TaskSetStatus { task_id: String, status: CatalogStatus },
    #[serde(rename = "task.reorder")]
    TaskReorder { ordered_ids: Vec<String> },

    #[serde(rename = "stream.subscribe")]
    StreamSubscribe {
        tenant_id: Option<String>,
        user_id: Option<String>,
        workspace_id: Option<String>,
        repository_id: Option<String>,
        task_id: Option<String>,
        directory_id: Option<String>,
        conversation_id: Option<String>,
        #[serde(default)]
        include_output: bool,
        #[serde(default)]
        after_cursor: u64,
    },
    #[serde(rename = "stream.unsubscribe")]
    StreamUnsubscribe { subscription_id: String },

    #[serde(rename = "session.list")]
    SessionList {
        #[serde(default)]
        sort: SessionSort,
        limit: Option<usize>,
    },
    #[serde(rename = "attention.list")]
    AttentionList {},
    #[serde(rename = "session.status")]
    SessionStatus { session_id: String },
    #[serde(rename = "session.snapshot")]
    SessionSnapshot { session_id: String, tail_lines: Option<usize> },
    #[serde(rename = "session.respond")]
    SessionRespond { session_id: String, text: String },
    #[serde(rename = "session.claim")]
    SessionClaim {
        session_id: String,
        controller_id: String,
        controller_type: ControllerType,
        controller_label: Option<String>,
        reason: Option<String>,
        #[serde(default)]
        takeover: bool,
    },
    #[serde(rename = "session.release")]
    SessionRelease { session_id: String, reason: Option<String> },
    #[serde(rename = "session.interrupt")]
    SessionInterrupt { session_id: String },
    #[serde(rename = "session.remove")]
    SessionRemove { session_id: String },

    #[serde(rename = "pty.start")]
    PtyStart {
        session_id: String,
        args: Vec<String>,
        #[serde(default)]
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
    },
    #[serde(rename = "pty.attach")]
    PtyAttach {
        session_id: String,
        #[serde(default)]
        since_cursor: u64,
    },
    #[serde(rename = "pty.detach")]
    PtyDetach { session_id: String },
    #[serde(rename = "pty.subscribe-events")]
    PtySubscribeEvents { session_id: String },
    #[serde(rename = "pty.unsubscribe-events")]
    PtyUnsubscribeEvents { session_id: String },
    #[serde(rename = "pty.close")]
    PtyClose { session_id: String },
    #[serde(rename = "pty.input")]
    PtyInput { session_id: String, chunk_base64: String },
    #[serde(rename = "pty.resize")]
    PtyResize { session_id: String, cols: u16, rows: u16 },
}

/// Result of parsing one wire command: `Ok(Command) | Err(invalid-argument)`.
pub type CommandParseResult = Result<Command, CommandError>;

/// Parse one JSON command frame. Any serde failure (unknown `type`, missing
/// field, wrong type) becomes `invalid-argument`, never a panic.
pub fn parse_command(raw: &str) -> CommandParseResult {
    serde_json::from_str::<Command>(raw)
        .map_err(|e| CommandError::new(ErrorKind::InvalidArgument, e.to_string()))
}

/// Envelopes pushed from server to client, outside the command/response
/// cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Envelope {
    #[serde(rename = "pty.output")]
    PtyOutput { session_id: String, cursor: u64, chunk_base64: String },
    #[serde(rename = "pty.event")]
    PtyEvent { session_id: String, event: SessionEvent },
    #[serde(rename = "pty.exit")]
    PtyExit { session_id: String, exit: ExitStatus },
    #[serde(rename = "stream.event")]
    StreamEvent { subscription_id: String, cursor: u64, event: ObservedEvent },
}

/// Build the `{ok: true, ...fields}` response shape. `fields` must
/// serialize to a JSON object (or `Value::Null`, which contributes no
/// fields).
pub fn ok_response(fields: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("ok".to_owned(), Value::Bool(true));
    if let Value::Object(extra) = fields {
        map.extend(extra);
    }
    Value::Object(map)
}

/// Build the `{ok: false, error: {kind, message}}` response shape.
pub fn err_response(error: &CommandError) -> Value {
    serde_json::json!({ "ok": false, "error": error })
}
