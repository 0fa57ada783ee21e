// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;
use crate::events::EventStore;
use crate::server::{ControlPlane, ControlPlaneConfig};
use crate::store::StateStore;
use harness_core::status::ReducerRegistry;

fn plane() -> Arc<ControlPlane> {
    ControlPlane::new(
        ControlPlaneConfig::default(),
        Arc::new(StateStore::in_memory()),
        Arc::new(EventStore::in_memory()),
        ReducerRegistry::new(),
    )
}

#[tokio::test]
async fn embedded_client_round_trips_a_command() {
    let plane = plane();
    let client = EmbeddedClient::connect(Arc::clone(&plane), "conn-a").await;

    let response = client
        .call(parse_command(r#"{"type":"directory.upsert","path":"/work/one"}"#).unwrap())
        .await;
    assert_eq!(response["ok"], true);
    assert_eq!(response["directory"]["path"], "/work/one");
}

#[tokio::test]
async fn embedded_client_disconnect_releases_attachments() {
    let plane = plane();
    let client = EmbeddedClient::connect(Arc::clone(&plane), "conn-a").await;

    client
        .call(
            parse_command(
                r#"{"type":"pty.start","sessionId":"s1","args":["cat"],"initialCols":20,"initialRows":5}"#,
            )
            .unwrap(),
        )
        .await;
    let attach = client
        .call(parse_command(r#"{"type":"pty.attach","sessionId":"s1"}"#).unwrap())
        .await;
    assert_eq!(attach["ok"], true);

    client.close().await;

    // The session itself is untouched by a connection drop (only its own
    // attachments/controllers are released); it's still reachable by a
    // fresh connection.
    let client2 = EmbeddedClient::connect(plane, "conn-b").await;
    let status = client2
        .call(parse_command(r#"{"type":"session.status","sessionId":"s1"}"#).unwrap())
        .await;
    assert_eq!(status["ok"], true);
}

#[tokio::test]
async fn tcp_transport_round_trips_a_command_and_rejects_bad_token() {
    let plane = plane();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = TcpServerConfig { host: addr.ip().to_string(), port: addr.port(), auth_token: Some("secret".into()) };
    let control = Arc::clone(&plane);
    tokio::spawn(async move {
        let _ = serve_tcp(control, config).await;
    });

    // Give the listener a moment to bind.
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let bad = RemoteClient::connect(&addr.to_string(), Some("wrong")).await.unwrap();
    let response = bad
        .call(parse_command(r#"{"type":"directory.list"}"#).unwrap())
        .await;
    assert_eq!(response["ok"], false);

    let good = RemoteClient::connect(&addr.to_string(), Some("secret")).await.unwrap();
    let response = good
        .call(parse_command(r#"{"type":"directory.upsert","path":"/remote"}"#).unwrap())
        .await;
    assert_eq!(response["ok"], true);
    assert_eq!(response["directory"]["path"], "/remote");
}
