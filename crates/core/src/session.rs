// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live Session: a PTY Host plus a Snapshot Oracle plus a byte ring,
//! wired into one multi-attach object. Generalizes the teacher's
//! single-broadcast-channel-per-process session (`transport::Store` +
//! `session::transition::feed_output`) into a per-session registry entry:
//! every live session owns its own ring, oracle, and set of attachments
//! instead of there being exactly one of each per running process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

use crate::error::CommandError;
use crate::event::SessionEvent;
use crate::oracle::{Frame, Oracle};
use crate::pty::{Backend, BackendInput, ExitStatus};
use crate::ring::RingBuffer;

/// Default byte-ring capacity per session: generous enough to cover a few
/// seconds of a chatty agent without costing much per idle session.
pub const DEFAULT_RING_CAPACITY: usize = 1 << 20;

/// Runtime status of a [`LiveSession`], independent of the projected
/// [`crate::status::StatusModel`] that wraps it with telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Running,
    NeedsInput,
    Completed,
    Exited,
}

/// Opaque handle returned by [`LiveSession::attach`]; pass it back to
/// [`LiveSession::detach`].
pub type AttachmentHandle = u64;

/// A chunk of PTY output delivered to an attachment, carrying the
/// ring-assigned cursor so every attachment observes the same ordering.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub cursor: u64,
    pub data: Bytes,
}

/// One of the two things an attachment can receive: PTY output, or the
/// session's terminal exit.
#[derive(Debug, Clone)]
pub enum AttachmentMessage {
    Output(OutputChunk),
    Exit(ExitStatus),
}

struct Attachment {
    tx: mpsc::Sender<AttachmentMessage>,
}

/// Ring buffer plus attachment registry, guarded by one lock so that
/// `attach`'s catch-up replay and `on_data`'s fan-out can never interleave.
/// The Oracle is guarded separately since rendering only ever
/// reads the latest snapshot and never needs to agree with fan-out
/// ordering.
struct Fanout {
    ring: RingBuffer,
    attachments: HashMap<AttachmentHandle, Attachment>,
}

impl Fanout {
    fn new(capacity: usize) -> Self {
        Self { ring: RingBuffer::new(capacity), attachments: HashMap::new() }
    }
}

/// Live, running session: a PTY Host, a Snapshot Oracle, a byte ring for
/// catch-up replay, and the fan-out registry of attached clients.
pub struct LiveSession {
    pub session_id: String,
    fanout: Mutex<Fanout>,
    oracle: RwLock<Oracle>,
    next_attachment_id: AtomicU64,
    input_tx: mpsc::Sender<BackendInput>,
    resize_tx: mpsc::Sender<(u16, u16)>,
    status: RwLock<SessionStatus>,
    last_exit: RwLock<Option<ExitStatus>>,
    controller: RwLock<Option<String>>,
    /// Broadcasts [`SessionEvent`]s for `pty.subscribe-events` consumers.
    session_events: broadcast::Sender<SessionEvent>,
    child_pid: AtomicU32,
    attention_reason: RwLock<Option<String>>,
}

impl LiveSession {
    /// Spawn `backend` and start its I/O loop on the current Tokio runtime.
    /// Returns the session plus a receiver of [`SessionEvent`]s the caller
    /// (the Control-Plane Server) should forward into the Event Normalizer
    /// and the observed-event journal.
    pub fn spawn(
        session_id: impl Into<String>,
        mut backend: Box<dyn Backend>,
        cols: u16,
        rows: u16,
        ring_capacity: usize,
    ) -> (Arc<Self>, broadcast::Receiver<SessionEvent>) {
        let (output_tx, mut output_rx) = mpsc::channel::<Bytes>(256);
        let (input_tx, input_rx) = mpsc::channel::<BackendInput>(64);
        let (resize_tx, resize_rx) = mpsc::channel::<(u16, u16)>(8);
        let (session_events, events_rx) = broadcast::channel(128);

        let child_pid = backend.child_pid().unwrap_or(0);

        let session = Arc::new(Self {
            session_id: session_id.into(),
            fanout: Mutex::new(Fanout::new(ring_capacity)),
            oracle: RwLock::new(Oracle::new(cols, rows)),
            next_attachment_id: AtomicU64::new(1),
            input_tx,
            resize_tx,
            status: RwLock::new(SessionStatus::Running),
            last_exit: RwLock::new(None),
            controller: RwLock::new(None),
            session_events,
            child_pid: AtomicU32::new(child_pid),
            attention_reason: RwLock::new(None),
        });

        let run_session = Arc::clone(&session);
        tokio::spawn(async move {
            let exit = backend.run(output_tx, input_rx, resize_rx).await;
            let status = exit.unwrap_or(ExitStatus { code: None, signal: None });
            run_session.on_exit(status).await;
        });

        let pump_session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(chunk) = output_rx.recv().await {
                pump_session.on_data(chunk).await;
            }
        });

        (session, events_rx)
    }

    /// Ingest one chunk of raw PTY output: stamp a ring cursor, feed the
    /// Oracle, and fan out to every attachment. Holds the single `fanout`
    /// lock across the ring write and the fan-out send so no `attach` can
    /// observe a torn view (bytes in the ring that were never sent to
    /// already-registered attachments, or vice versa).
    async fn on_data(&self, data: Bytes) {
        {
            let mut oracle = self.oracle.write().await;
            oracle.ingest(&data);
        }

        let mut fanout = self.fanout.lock().await;
        fanout.ring.write(&data);
        let cursor = fanout.ring.total_written();
        let msg = AttachmentMessage::Output(OutputChunk { cursor, data });
        for attachment in fanout.attachments.values() {
            let _ = attachment.tx.try_send(msg.clone());
        }
    }

    async fn on_exit(&self, status: ExitStatus) {
        *self.last_exit.write().await = Some(status);
        *self.status.write().await = SessionStatus::Exited;
        let _ = self.session_events.send(SessionEvent::SessionExit { exit: status });

        let fanout = self.fanout.lock().await;
        for attachment in fanout.attachments.values() {
            let _ = attachment.tx.try_send(AttachmentMessage::Exit(status));
        }
    }

    /// Bind a new attachment and replay any bytes with `cursor > since_cursor`
    /// still retained in the ring, atomically with respect to `on_data`'s
    /// fan-out — no chunk is ever skipped or duplicated for the new
    /// attachment. Returns the handle, the receiver, and `Some(oldest)` if
    /// `since_cursor` was below the oldest retained byte (a gap occurred;
    /// the caller should surface this rather than silently skip bytes).
    pub async fn attach(
        &self,
        since_cursor: u64,
        buffer: usize,
    ) -> (AttachmentHandle, mpsc::Receiver<AttachmentMessage>, Option<u64>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = self.next_attachment_id.fetch_add(1, Ordering::Relaxed);

        let mut fanout = self.fanout.lock().await;
        let oldest = fanout.ring.oldest_retained();
        let effective_from = since_cursor.max(oldest);

        if let Some((a, b)) = fanout.ring.read_from(effective_from) {
            let mut cursor = effective_from;
            if !a.is_empty() {
                let _ = tx.try_send(AttachmentMessage::Output(OutputChunk {
                    cursor,
                    data: Bytes::copy_from_slice(a),
                }));
                cursor += a.len() as u64;
            }
            if !b.is_empty() {
                let _ = tx.try_send(AttachmentMessage::Output(OutputChunk {
                    cursor,
                    data: Bytes::copy_from_slice(b),
                }));
            }
        }

        fanout.attachments.insert(handle, Attachment { tx });
        let gap = if since_cursor < oldest { Some(oldest) } else { None };
        (handle, rx, gap)
    }

    /// Detach and release resources. Idempotent.
    pub async fn detach(&self, handle: AttachmentHandle) {
        self.fanout.lock().await.attachments.remove(&handle);
    }

    /// Highest cursor assigned so far.
    pub async fn latest_cursor(&self) -> u64 {
        self.fanout.lock().await.ring.total_written()
    }

    /// Last N logical lines from the Oracle's current frame.
    pub async fn buffer_tail(&self, tail_lines: usize) -> Vec<String> {
        let frame = self.oracle.read().await.snapshot();
        let lines = frame.lines;
        if lines.len() <= tail_lines {
            lines
        } else {
            lines[lines.len() - tail_lines..].to_vec()
        }
    }

    /// Current Oracle snapshot.
    pub async fn snapshot(&self) -> Frame {
        self.oracle.read().await.snapshot()
    }

    /// Write bytes to the controlled PTY. Fails with `session-not-live` if
    /// the session has already exited.
    pub async fn write(&self, data: Bytes) -> Result<(), CommandError> {
        if *self.status.read().await == SessionStatus::Exited {
            return Err(CommandError::session_not_live(&self.session_id));
        }
        self.input_tx
            .send(BackendInput::Write(data))
            .await
            .map_err(|_| CommandError::session_not_live(&self.session_id))
    }

    /// Best-effort signal delivery to the child (`kill(signal)`).
    /// Exit is still reported asynchronously via `onExit`/`SessionEvent`;
    /// this never blocks on it. A no-op once the session has exited.
    pub async fn kill(&self, signal: Option<i32>) {
        let _ = self.input_tx.send(BackendInput::Kill(signal)).await;
    }

    /// Force status back to `running` regardless of the current state,
    /// clearing any attention reason — `session.respond` writes to the
    /// controlled PTY and resets status to running. Fails if the session
    /// has already exited.
    pub async fn mark_running(&self) -> Result<(), CommandError> {
        let mut status = self.status.write().await;
        if *status == SessionStatus::Exited {
            return Err(CommandError::session_not_live(&self.session_id));
        }
        *status = SessionStatus::Running;
        *self.attention_reason.write().await = None;
        Ok(())
    }

    /// Request a resize; the PTY Host treats identical sizes as a no-op.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), CommandError> {
        if *self.status.read().await == SessionStatus::Exited {
            return Err(CommandError::session_not_live(&self.session_id));
        }
        self.oracle.write().await.resize(cols, rows);
        let _ = self.resize_tx.send((cols, rows)).await;
        Ok(())
    }

    pub async fn scroll_viewport(&self, delta: i64) {
        self.oracle.write().await.scroll_viewport(delta);
    }

    pub async fn pin_to_tail(&self) {
        self.oracle.write().await.pin_to_tail();
    }

    /// Record a side-channel [`SessionEvent`] and apply the status state
    /// machine transition it implies. Returns the new status if it changed.
    pub async fn record_event(&self, event: SessionEvent) -> Option<SessionStatus> {
        let mut status = self.status.write().await;
        let prev = *status;
        let mut reason = self.attention_reason.write().await;

        let next = match (&event, prev) {
            (SessionEvent::AttentionRequired { reason: r }, SessionStatus::Running)
            | (SessionEvent::AttentionRequired { reason: r }, SessionStatus::Completed) => {
                *reason = Some(r.clone());
                SessionStatus::NeedsInput
            }
            (SessionEvent::AttentionCleared, SessionStatus::NeedsInput) => {
                *reason = None;
                SessionStatus::Running
            }
            (SessionEvent::TurnCompleted, SessionStatus::Running)
            | (SessionEvent::TurnCompleted, SessionStatus::NeedsInput) => {
                *reason = None;
                SessionStatus::Completed
            }
            (SessionEvent::SessionExit { .. }, _) => SessionStatus::Exited,
            _ => prev,
        };
        drop(reason);

        let _ = self.session_events.send(event);

        if next != prev {
            *status = next;
            Some(next)
        } else {
            None
        }
    }

    pub async fn status(&self) -> SessionStatus {
        *self.status.read().await
    }

    pub async fn attention_reason(&self) -> Option<String> {
        self.attention_reason.read().await.clone()
    }

    pub async fn last_exit(&self) -> Option<ExitStatus> {
        *self.last_exit.read().await
    }

    pub fn child_pid(&self) -> Option<u32> {
        let pid = self.child_pid.load(Ordering::Relaxed);
        if pid == 0 {
            None
        } else {
            Some(pid)
        }
    }

    /// Subscribe to this session's [`SessionEvent`] stream (for
    /// `pty.subscribe-events`).
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_events.subscribe()
    }

    /// Current controller, if any.
    pub async fn controller(&self) -> Option<String> {
        self.controller.read().await.clone()
    }

    /// Claim the session for `connection_id`. Succeeds if unclaimed, if the
    /// same connection already holds it, or if `takeover` is set (which
    /// always succeeds and replaces the current controller).
    pub async fn claim(&self, connection_id: &str, takeover: bool) -> Result<bool, CommandError> {
        let mut controller = self.controller.write().await;
        match controller.as_deref() {
            None => {
                *controller = Some(connection_id.to_owned());
                Ok(false)
            }
            Some(current) if current == connection_id => Ok(false),
            Some(_) if takeover => {
                *controller = Some(connection_id.to_owned());
                Ok(true)
            }
            Some(_) => Err(CommandError::controller_conflict(&self.session_id)),
        }
    }

    /// Release the session if `connection_id` currently holds it.
    pub async fn release(&self, connection_id: &str) {
        let mut controller = self.controller.write().await;
        if controller.as_deref() == Some(connection_id) {
            *controller = None;
        }
    }

    /// Release the session unconditionally — used on connection drop.
    pub async fn release_if_held_by(&self, connection_id: &str) -> bool {
        let mut controller = self.controller.write().await;
        if controller.as_deref() == Some(connection_id) {
            *controller = None;
            true
        } else {
            false
        }
    }

    /// Whether `connection_id` is allowed to issue mutating commands:
    /// either no controller is set, or it is the current controller.
    pub async fn may_mutate(&self, connection_id: &str) -> bool {
        match self.controller.read().await.as_deref() {
            None => true,
            Some(current) => current == connection_id,
        }
    }
}

/// A session registry keyed by session id, guarded by a single lock:
/// `Session` holds attachment ids, attachments hold back-references, and
/// destruction must cascade under one exclusive section.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<LiveSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<LiveSession>) {
        self.sessions.lock().await.insert(session.session_id.clone(), session);
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<LiveSession>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<LiveSession>> {
        self.sessions.lock().await.remove(session_id)
    }

    pub async fn list(&self) -> Vec<Arc<LiveSession>> {
        self.sessions.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
