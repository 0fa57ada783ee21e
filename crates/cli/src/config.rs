// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface and environment variables, following the teacher's
//! `Config` pattern of one `clap::Parser` struct with an `env`
//! attribute mirroring every recognized environment variable, plus a
//! `validate()` pass run before startup.

use std::path::PathBuf;

use clap::Parser;

fn parse_truthy(raw: &str) -> Result<bool, String> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(format!("expected a boolean-ish value, got {other:?}")),
    }
}

/// Multi-session coding-agent terminal multiplexer.
#[derive(Debug, Parser)]
#[command(name = "harness-mux", version, about)]
pub struct Config {
    /// Control-plane host to connect to (selects remote mode; omit for
    /// an embedded control plane).
    #[arg(long, env = "HARNESS_CONTROL_PLANE_HOST")]
    pub harness_server_host: Option<String>,

    /// Control-plane port to connect to.
    #[arg(long, env = "HARNESS_CONTROL_PLANE_PORT")]
    pub harness_server_port: Option<u16>,

    /// Bearer token for the remote control plane.
    #[arg(long, env = "HARNESS_CONTROL_PLANE_AUTH_TOKEN")]
    pub harness_server_token: Option<String>,

    /// Path for the Event Store (embedded mode). In-memory if unset.
    #[arg(long, env = "HARNESS_EVENTS_DB_PATH", hide = true)]
    pub events_db_path: Option<PathBuf>,

    /// Path for the State Store (embedded mode). In-memory if unset.
    #[arg(long, env = "HARNESS_CONTROL_PLANE_DB_PATH", hide = true)]
    pub control_plane_db_path: Option<PathBuf>,

    #[arg(long, env = "HARNESS_TENANT_ID", hide = true)]
    pub tenant_id: Option<String>,
    #[arg(long, env = "HARNESS_USER_ID", hide = true)]
    pub user_id: Option<String>,
    #[arg(long, env = "HARNESS_WORKSPACE_ID", hide = true)]
    pub workspace_id: Option<String>,
    #[arg(long, env = "HARNESS_WORKTREE_ID", hide = true)]
    pub worktree_id: Option<String>,
    #[arg(long, env = "HARNESS_CONVERSATION_ID", hide = true)]
    pub conversation_id: Option<String>,
    #[arg(long, env = "HARNESS_TURN_ID", hide = true)]
    pub turn_id: Option<String>,

    /// Override the palette probe's foreground color guess.
    #[arg(long, env = "HARNESS_TERM_FG", hide = true)]
    pub term_fg: Option<String>,
    /// Override the palette probe's background color guess.
    #[arg(long, env = "HARNESS_TERM_BG", hide = true)]
    pub term_bg: Option<String>,

    /// Whether ctrl+c quits the app (vs. interrupting every session).
    #[arg(long, env = "HARNESS_MUX_CTRL_C_EXITS", default_value = "true", value_parser = parse_truthy, hide = true)]
    pub ctrl_c_exits: bool,

    /// Log format: json or text.
    #[arg(long, env = "HARNESS_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "HARNESS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// The agent launch command (after `--`), forwarded to the PTY host.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("a command to launch is required");
        }
        if self.harness_server_host.is_some() != self.harness_server_port.is_some() {
            anyhow::bail!("--harness-server-host and --harness-server-port must be given together");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid --log-format: {other}"),
        }
        Ok(())
    }

    /// Whether this invocation targets a remote control plane.
    pub fn is_remote(&self) -> bool {
        self.harness_server_host.is_some()
    }

    /// `host:port` for the remote transport, if configured.
    pub fn server_addr(&self) -> Option<String> {
        Some(format!("{}:{}", self.harness_server_host.as_ref()?, self.harness_server_port?))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
