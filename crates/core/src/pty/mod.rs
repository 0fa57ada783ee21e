// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY Host: spawns and owns the lifetime of a child process on a
//! pseudo-terminal, relaying its output and accepting input/resize
//! requests. Mirrors the teacher's `Backend` abstraction so a session
//! owner never depends on `forkpty` directly.

pub mod nbio;
pub mod spawn;

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// How the child process under a PTY terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Input sent to the PTY backend: raw bytes to write, a drain
/// synchronization point used during graceful shutdown, or a best-effort
/// signal delivery to the child (`kill(signal)`).
#[derive(Debug)]
pub enum BackendInput {
    Write(Bytes),
    Drain(tokio::sync::oneshot::Sender<()>),
    Kill(Option<i32>),
}

/// Terminal backend abstraction over a PTY. Object-safe for use as
/// `Box<dyn Backend>` so the Live Session never depends on the concrete
/// spawn mechanism.
pub trait Backend: Send + 'static {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<BackendInput>,
        resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>;

    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()>;

    /// Best-effort signal delivery to the child. `None` defaults to
    /// `SIGHUP`. Exit is still reported via the `run` future's return value,
    /// never synchronously here.
    fn kill(&self, signal: Option<i32>) -> anyhow::Result<()>;

    fn child_pid(&self) -> Option<u32>;
}

/// Conversion trait so both concrete backends and `Box<dyn Backend>` can
/// be passed to session construction without explicit boxing.
pub trait Boxed {
    fn boxed(self) -> Box<dyn Backend>;
}

impl<T: Backend> Boxed for T {
    fn boxed(self) -> Box<dyn Backend> {
        Box::new(self)
    }
}

impl Boxed for Box<dyn Backend> {
    fn boxed(self) -> Box<dyn Backend> {
        self
    }
}
