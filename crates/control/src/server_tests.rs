// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::mpsc;

use super::*;
use crate::wire::parse_command;

fn plane() -> Arc<ControlPlane> {
    ControlPlane::new(
        ControlPlaneConfig::default(),
        Arc::new(StateStore::in_memory()),
        Arc::new(EventStore::in_memory()),
        ReducerRegistry::new(),
    )
}

async fn connect(plane: &Arc<ControlPlane>, connection_id: &str) -> mpsc::Receiver<Envelope> {
    let (tx, rx) = mpsc::channel(64);
    plane.connect(connection_id, tx).await;
    rx
}

fn cmd(json: serde_json::Value) -> Command {
    parse_command(&json.to_string()).expect("valid command")
}

#[tokio::test]
async fn directory_upsert_then_list_round_trips() {
    let plane = plane();
    connect(&plane, "conn-a").await;

    let response = plane
        .dispatch(
            "conn-a",
            cmd(json!({"type": "directory.upsert", "path": "/work/one"})),
        )
        .await;
    assert_eq!(response["ok"], true);
    let directory_id = response["directory"]["directoryId"].as_str().unwrap().to_owned();

    let listed = plane
        .dispatch("conn-a", cmd(json!({"type": "directory.list"})))
        .await;
    let directories = listed["directories"].as_array().unwrap();
    assert_eq!(directories.len(), 1);
    assert_eq!(directories[0]["directoryId"], directory_id);
}

#[tokio::test]
async fn directory_git_status_rejects_unknown_directory() {
    let plane = plane();
    connect(&plane, "conn-a").await;

    let response = plane
        .dispatch(
            "conn-a",
            cmd(json!({"type": "directory.git-status", "directoryId": "ghost"})),
        )
        .await;
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["kind"], "not-found");
}

#[tokio::test]
async fn conversation_delete_tears_down_its_live_session() {
    let plane = plane();
    connect(&plane, "conn-a").await;

    plane
        .dispatch("conn-a", cmd(json!({"type": "directory.upsert", "path": "/work/one", "directoryId": "dir-1"})))
        .await;
    plane
        .dispatch(
            "conn-a",
            cmd(json!({
                "type": "conversation.create",
                "conversationId": "conv-1",
                "directoryId": "dir-1",
                "title": "thread one",
                "agentType": "claude",
            })),
        )
        .await;
    plane
        .dispatch(
            "conn-a",
            cmd(json!({
                "type": "pty.start",
                "sessionId": "conv-1",
                "args": ["/bin/cat"],
                "initialCols": 80,
                "initialRows": 24,
            })),
        )
        .await;

    let deleted = plane
        .dispatch("conn-a", cmd(json!({"type": "conversation.delete", "conversationId": "conv-1"})))
        .await;
    assert_eq!(deleted["ok"], true);

    let status = plane
        .dispatch("conn-a", cmd(json!({"type": "session.status", "sessionId": "conv-1"})))
        .await;
    assert_eq!(status["ok"], false);
    assert_eq!(status["error"]["kind"], "not-found");
}

#[tokio::test]
async fn task_requires_repository_or_project_scope() {
    let plane = plane();
    connect(&plane, "conn-a").await;

    let response = plane
        .dispatch("conn-a", cmd(json!({"type": "task.create", "title": "orphan task"})))
        .await;
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["kind"], "constraint-violation");
}

#[tokio::test]
async fn stream_subscribe_delivers_backlog_then_live_events() {
    let plane = plane();
    let mut rx_a = connect(&plane, "conn-a").await;
    connect(&plane, "conn-b").await;

    plane
        .dispatch("conn-b", cmd(json!({"type": "directory.upsert", "path": "/work/one"})))
        .await;

    let subscribed = plane
        .dispatch("conn-a", cmd(json!({"type": "stream.subscribe", "afterCursor": 0})))
        .await;
    assert_eq!(subscribed["ok"], true);
    let cursor_at_subscribe = subscribed["cursor"].as_u64().unwrap();
    assert_eq!(cursor_at_subscribe, 1, "cursor reflects the one directory.upsert published before subscribing");

    let backlog_envelope = tokio::time::timeout(std::time::Duration::from_secs(1), rx_a.recv())
        .await
        .expect("backlog envelope within timeout")
        .expect("channel open");
    match backlog_envelope {
        Envelope::StreamEvent { event, cursor, .. } => {
            assert_eq!(event.kind, ObservedEventKind::DirectoryUpserted);
            assert_eq!(cursor, cursor_at_subscribe, "the replayed directory.upsert must be delivered as a stream.event");
        }
        other => panic!("expected a stream.event envelope, got {other:?}"),
    }

    plane
        .dispatch("conn-b", cmd(json!({"type": "directory.upsert", "path": "/work/two"})))
        .await;

    let envelope = tokio::time::timeout(std::time::Duration::from_secs(1), rx_a.recv())
        .await
        .expect("envelope within timeout")
        .expect("channel open");
    match envelope {
        Envelope::StreamEvent { event, .. } => {
            assert_eq!(event.kind, ObservedEventKind::DirectoryUpserted);
        }
        other => panic!("expected a stream.event envelope, got {other:?}"),
    }
}

#[tokio::test]
async fn session_claim_conflicts_without_takeover() {
    let plane = plane();
    connect(&plane, "conn-a").await;
    connect(&plane, "conn-b").await;

    plane
        .dispatch(
            "conn-a",
            cmd(json!({
                "type": "pty.start",
                "sessionId": "sess-1",
                "args": ["/bin/cat"],
                "initialCols": 80,
                "initialRows": 24,
            })),
        )
        .await;

    let first = plane
        .dispatch(
            "conn-a",
            cmd(json!({
                "type": "session.claim",
                "sessionId": "sess-1",
                "controllerId": "conn-a",
                "controllerType": "human",
            })),
        )
        .await;
    assert_eq!(first["ok"], true);

    let second = plane
        .dispatch(
            "conn-b",
            cmd(json!({
                "type": "session.claim",
                "sessionId": "sess-1",
                "controllerId": "conn-b",
                "controllerType": "human",
            })),
        )
        .await;
    assert_eq!(second["ok"], false);
    assert_eq!(second["error"]["kind"], "controller-conflict");

    let input = plane
        .dispatch(
            "conn-b",
            cmd(json!({
                "type": "pty.input",
                "sessionId": "sess-1",
                "chunkBase64": base64::engine::general_purpose::STANDARD.encode(b"x"),
            })),
        )
        .await;
    assert_eq!(input["ok"], false);
    assert_eq!(input["error"]["kind"], "controller-conflict");

    plane.dispatch("conn-a", cmd(json!({"type": "pty.close", "sessionId": "sess-1"}))).await;
}

#[tokio::test]
async fn pty_start_echoes_input_through_attach() {
    let plane = plane();
    let mut rx_a = connect(&plane, "conn-a").await;

    let started = plane
        .dispatch(
            "conn-a",
            cmd(json!({
                "type": "pty.start",
                "sessionId": "sess-echo",
                "args": ["/bin/cat"],
                "initialCols": 80,
                "initialRows": 24,
            })),
        )
        .await;
    assert_eq!(started["ok"], true);

    plane
        .dispatch("conn-a", cmd(json!({"type": "pty.attach", "sessionId": "sess-echo", "sinceCursor": 0})))
        .await;

    plane
        .dispatch(
            "conn-a",
            cmd(json!({
                "type": "pty.input",
                "sessionId": "sess-echo",
                "chunkBase64": base64::engine::general_purpose::STANDARD.encode(b"hi\n"),
            })),
        )
        .await;

    let mut seen = Vec::new();
    loop {
        let envelope = tokio::time::timeout(std::time::Duration::from_secs(2), rx_a.recv())
            .await
            .expect("envelope within timeout")
            .expect("channel open");
        if let Envelope::PtyOutput { chunk_base64, .. } = &envelope {
            let decoded = base64::engine::general_purpose::STANDARD.decode(chunk_base64).unwrap();
            seen.extend_from_slice(&decoded);
            if String::from_utf8_lossy(&seen).contains("hi") {
                break;
            }
        }
    }

    plane.dispatch("conn-a", cmd(json!({"type": "pty.close", "sessionId": "sess-echo"}))).await;
}
