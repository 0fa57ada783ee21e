// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harness-core`: the PTY Session Host & Streaming Oracle.
//!
//! Owns the three primitives a Control Plane builds sessions out of: the
//! [`pty`] backend that spawns and drives a child process on a
//! pseudo-terminal, the [`oracle`] that turns its byte stream into a
//! terminal snapshot, and the [`ring`] that retains bytes for catch-up
//! replay. [`session`] wires the three together into a multi-attach Live
//! Session, and [`status`] projects a per-agent status model from the
//! session's runtime state and side-channel telemetry.

pub mod error;
pub mod event;
pub mod oracle;
pub mod pty;
pub mod ring;
pub mod session;
pub mod status;

pub use error::{CommandError, ErrorKind};
pub use event::{EnvelopeCategory, EnvelopeKind, NormalizedEnvelope, Scope, SessionEvent, TextDelta};
pub use oracle::{Frame, Oracle};
pub use ring::RingBuffer;
pub use session::{AttachmentHandle, LiveSession, SessionStatus};
pub use status::{Phase, StatusModel, StatusReducer};
