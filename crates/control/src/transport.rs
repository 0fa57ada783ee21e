// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two transports: an embedded in-process transport that hands
//! [`crate::wire::Command`] values directly to [`ControlPlane::dispatch`]
//! over an in-process channel (no serialization), and a line-framed
//! JSON-over-TCP transport, grounded in the teacher's `transport::ws_mux`
//! JSON message design (`ClientMessage`/`ServerMessage` tagged enums)
//! adapted from WebSocket frames to newline-delimited TCP.
//!
//! Both sides of the TCP transport share one demultiplexing rule: a line
//! with an `"ok"` field is a command response, anything else is a pushed
//! [`Envelope`]. The wire protocol carries no request id, so responses
//! must be read back in the order their commands were sent — the same
//! per-connection ordering guarantee the server already provides.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use harness_core::error::{CommandError, ErrorKind};

use crate::server::ControlPlane;
use crate::wire::{err_response, parse_command, Command, Envelope};

/// An embedded, in-process handle to a [`ControlPlane`]: commands are
/// dispatched directly with no serialization round-trip, and envelopes
/// pushed by the server arrive on an owned channel.
pub struct EmbeddedClient {
    control: Arc<ControlPlane>,
    connection_id: String,
    envelopes: Mutex<mpsc::Receiver<Envelope>>,
}

impl EmbeddedClient {
    /// Register a fresh connection against `control` and return a client
    /// bound to it. Mirrors `pty.attach`'s requirement that a connection
    /// exist before it can receive pushed envelopes.
    pub async fn connect(control: Arc<ControlPlane>, connection_id: impl Into<String>) -> Self {
        let connection_id = connection_id.into();
        let (tx, rx) = mpsc::channel(256);
        control.connect(connection_id.clone(), tx).await;
        Self { control, connection_id, envelopes: Mutex::new(rx) }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub async fn call(&self, command: Command) -> Value {
        self.control.dispatch(&self.connection_id, command).await
    }

    /// Await the next pushed envelope (`pty.output`, `pty.event`,
    /// `pty.exit`, `stream.event`). Returns `None` once the connection has
    /// been torn down.
    pub async fn recv_envelope(&self) -> Option<Envelope> {
        self.envelopes.lock().await.recv().await
    }

    pub async fn close(&self) {
        self.control.disconnect(&self.connection_id).await;
    }
}

/// Tuning for the line-framed TCP transport's listening side.
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    pub host: String,
    pub port: u16,
    pub auth_token: Option<String>,
}

/// Bind and serve the line-framed TCP transport until the listener errors.
/// Each accepted connection gets its own connection id and runs until the
/// peer disconnects; a connection drop cascades cleanup through
/// [`ControlPlane::disconnect`] exactly as the embedded transport's
/// `close` does.
pub async fn serve_tcp(control: Arc<ControlPlane>, config: TcpServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    loop {
        let (socket, peer) = listener.accept().await?;
        let control = Arc::clone(&control);
        let token = config.auth_token.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_tcp_connection(control, socket, token).await {
                warn!(%peer, %err, "tcp connection terminated");
            }
        });
    }
}

async fn handle_tcp_connection(
    control: Arc<ControlPlane>,
    socket: TcpStream,
    auth_token: Option<String>,
) -> anyhow::Result<()> {
    let connection_id = Uuid::new_v4().to_string();
    let (read_half, write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let writer = Arc::new(Mutex::new(write_half));

    if let Some(expected) = &auth_token {
        let authorized = match lines.next_line().await? {
            Some(line) => serde_json::from_str::<Value>(&line)
                .ok()
                .and_then(|v| v.get("token").and_then(|t| t.as_str()).map(str::to_owned))
                .is_some_and(|token| token == *expected),
            None => false,
        };
        if !authorized {
            let error = CommandError::new(ErrorKind::InvalidArgument, "missing or invalid auth token");
            write_line(&writer, &err_response(&error)).await;
            return Ok(());
        }
    }

    let (env_tx, mut env_rx) = mpsc::channel::<Envelope>(256);
    control.connect(connection_id.clone(), env_tx).await;

    let forward_writer = Arc::clone(&writer);
    let forward_task = tokio::spawn(async move {
        while let Some(envelope) = env_rx.recv().await {
            if let Ok(value) = serde_json::to_value(&envelope) {
                write_line(&forward_writer, &value).await;
            }
        }
    });

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match parse_command(&line) {
            Ok(command) => control.dispatch(&connection_id, command).await,
            Err(err) => err_response(&err),
        };
        write_line(&writer, &response).await;
    }

    debug!(connection_id, "tcp connection closed");
    forward_task.abort();
    control.disconnect(&connection_id).await;
    Ok(())
}

async fn write_line(writer: &Arc<Mutex<tokio::net::tcp::OwnedWriteHalf>>, value: &Value) {
    let Ok(mut line) = serde_json::to_string(value) else { return };
    line.push('\n');
    let mut guard = writer.lock().await;
    let _ = guard.write_all(line.as_bytes()).await;
}

/// Client side of the line-framed TCP transport (remote mode, selected
/// by `--harness-server-host`/`--harness-server-port`). A
/// background task demultiplexes incoming lines into command responses
/// (delivered in send order) and pushed envelopes.
pub struct RemoteClient {
    writer: Mutex<tokio::net::tcp::OwnedWriteHalf>,
    responses: Mutex<mpsc::Receiver<Value>>,
    envelopes: Mutex<mpsc::Receiver<Envelope>>,
    /// Serializes `call()`'s write-then-await-response so concurrent
    /// callers never observe each other's response out of order.
    call_lock: Mutex<()>,
}

impl RemoteClient {
    pub async fn connect(addr: &str, auth_token: Option<&str>) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, mut write_half) = stream.into_split();

        if let Some(token) = auth_token {
            let mut line = json!({ "token": token }).to_string();
            line.push('\n');
            write_half.write_all(line.as_bytes()).await?;
        }

        let (resp_tx, resp_rx) = mpsc::channel(256);
        let (env_tx, env_rx) = mpsc::channel(256);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    _ => break,
                };
                let Ok(value) = serde_json::from_str::<Value>(&line) else { continue };
                if value.get("ok").is_some() {
                    if resp_tx.send(value).await.is_err() {
                        break;
                    }
                } else if let Ok(envelope) = serde_json::from_value::<Envelope>(value) {
                    if env_tx.send(envelope).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            writer: Mutex::new(write_half),
            responses: Mutex::new(resp_rx),
            envelopes: Mutex::new(env_rx),
            call_lock: Mutex::new(()),
        })
    }

    pub async fn call(&self, command: Command) -> Value {
        let _order = self.call_lock.lock().await;

        let mut line = match serde_json::to_string(&command) {
            Ok(line) => line,
            Err(e) => return err_response(&CommandError::new(ErrorKind::InvalidArgument, e.to_string())),
        };
        line.push('\n');

        {
            let mut writer = self.writer.lock().await;
            if writer.write_all(line.as_bytes()).await.is_err() {
                return err_response(&CommandError::session_not_live("<connection>"));
            }
        }

        let mut responses = self.responses.lock().await;
        responses.recv().await.unwrap_or_else(|| {
            err_response(&CommandError::session_not_live("<connection>"))
        })
    }

    pub async fn recv_envelope(&self) -> Option<Envelope> {
        self.envelopes.lock().await.recv().await
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
