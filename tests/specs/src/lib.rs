// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared scaffolding for end-to-end tests that drive a [`ControlPlane`]
//! the same way a real client would: through [`EmbeddedClient::call`] and
//! [`EmbeddedClient::recv_envelope`], never by reaching into the server's
//! internals. One in-process plane per test, backed by in-memory storage,
//! so tests run without touching disk and can execute concurrently.

use std::time::Duration;

use std::sync::Arc;

use harness_control::events::EventStore;
use harness_control::store::StateStore;
use harness_control::{ControlPlane, ControlPlaneConfig, Envelope, EmbeddedClient};
use harness_core::status::ReducerRegistry;

/// Build a fresh plane with in-memory catalog and event storage.
pub fn new_control_plane() -> Arc<ControlPlane> {
    ControlPlane::new(
        ControlPlaneConfig::default(),
        Arc::new(StateStore::in_memory()),
        Arc::new(EventStore::in_memory()),
        ReducerRegistry::new(),
    )
}

/// Register a connection against `control` under `connection_id`.
pub async fn connect(control: &Arc<ControlPlane>, connection_id: &str) -> EmbeddedClient {
    EmbeddedClient::connect(Arc::clone(control), connection_id).await
}

/// How long a scenario test waits for an expected envelope before
/// concluding the server hung rather than just being slow.
pub const ENVELOPE_TIMEOUT: Duration = Duration::from_secs(10);

/// Await the next pushed envelope, failing the test instead of hanging
/// forever if the server never sends one.
pub async fn next_envelope(client: &EmbeddedClient) -> anyhow::Result<Envelope> {
    tokio::time::timeout(ENVELOPE_TIMEOUT, client.recv_envelope())
        .await?
        .ok_or_else(|| anyhow::anyhow!("connection closed before an envelope arrived"))
}

pub fn decode_base64(chunk_base64: &str) -> anyhow::Result<Vec<u8>> {
    use base64::Engine;
    Ok(base64::engine::general_purpose::STANDARD.decode(chunk_base64)?)
}
