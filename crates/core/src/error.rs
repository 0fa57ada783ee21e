// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of error kinds surfaced on command responses and propagated
/// through every transport (embedded, TCP). Mirrors the taxonomy in the
/// system's error handling design: each variant is a `kind`, not a type,
/// carrying its own wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    SessionNotLive,
    ControllerConflict,
    Archived,
    ConstraintViolation,
    PtyStartFailed,
    JournalGap,
    TerminalRequired,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::SessionNotLive => "session-not-live",
            Self::ControllerConflict => "controller-conflict",
            Self::Archived => "archived",
            Self::ConstraintViolation => "constraint-violation",
            Self::PtyStartFailed => "pty-start-failed",
            Self::JournalGap => "journal-gap",
            Self::TerminalRequired => "terminal-required",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol-facing error: a `kind` plus a human-readable `message`.
/// Serializes to the `error{kind, message}` shape used on command
/// responses across every transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{what} `{id}` not found"))
    }

    pub fn session_not_live(session_id: &str) -> Self {
        Self::new(
            ErrorKind::SessionNotLive,
            format!("session `{session_id}` is not live"),
        )
    }

    pub fn controller_conflict(session_id: &str) -> Self {
        Self::new(
            ErrorKind::ControllerConflict,
            format!(
                "session `{session_id}` is controlled by another connection; use session.claim with takeover=true"
            ),
        )
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CommandError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
