// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opens a control-plane client: embedded (an in-process [`ControlPlane`]
//! built from local stores) or remote (a TCP connection to an
//! already-running one), selected by whether
//! `--harness-server-host`/`--harness-server-port` were given.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use harness_control::events::EventStore;
use harness_control::store::StateStore;
use harness_control::wire::{Command, Envelope};
use harness_control::{ControlPlane, ControlPlaneConfig, EmbeddedClient, RemoteClient};
use harness_core::status::ReducerRegistry;

use crate::config::Config;

/// Unifies the embedded and remote transports behind one `call`/
/// `recv_envelope` surface so the orchestrator doesn't need to care which
/// one it's driving.
pub enum ControlClient {
    Embedded(EmbeddedClient),
    Remote(RemoteClient),
}

impl ControlClient {
    pub async fn call(&self, command: Command) -> Value {
        match self {
            ControlClient::Embedded(client) => client.call(command).await,
            ControlClient::Remote(client) => client.call(command).await,
        }
    }

    pub async fn recv_envelope(&self) -> Option<Envelope> {
        match self {
            ControlClient::Embedded(client) => client.recv_envelope().await,
            ControlClient::Remote(client) => client.recv_envelope().await,
        }
    }

    pub async fn close(&self) {
        if let ControlClient::Embedded(client) = self {
            client.close().await;
        }
    }
}

/// Build an in-process [`ControlPlane`] from `config`'s store paths. Only
/// used in embedded mode.
fn build_embedded_plane(config: &Config) -> anyhow::Result<Arc<ControlPlane>> {
    let store = match &config.control_plane_db_path {
        Some(path) => Arc::new(StateStore::open(path)?),
        None => Arc::new(StateStore::in_memory()),
    };
    let event_store = match &config.events_db_path {
        Some(path) => Arc::new(EventStore::open(path)),
        None => Arc::new(EventStore::in_memory()),
    };
    Ok(ControlPlane::new(ControlPlaneConfig::default(), store, event_store, ReducerRegistry::new()))
}

/// Open a [`ControlClient`] per `config`: remote if
/// `--harness-server-host`/`--harness-server-port` are set, embedded
/// otherwise.
pub async fn connect(config: &Config) -> anyhow::Result<ControlClient> {
    if let Some(addr) = config.server_addr() {
        let remote = RemoteClient::connect(&addr, config.harness_server_token.as_deref()).await?;
        Ok(ControlClient::Remote(remote))
    } else {
        let plane = build_embedded_plane(config)?;
        let connection_id = Uuid::new_v4().to_string();
        let client = EmbeddedClient::connect(plane, connection_id).await;
        Ok(ControlClient::Embedded(client))
    }
}
