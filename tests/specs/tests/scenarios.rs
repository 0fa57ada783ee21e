// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios driven entirely through the wire command/envelope
//! vocabulary, against a real PTY-backed session (no mocked backend). Each
//! test stands up its own in-process plane so sessions never leak between
//! tests.

use std::time::Duration;

use harness_control::wire::{Command, ControllerType};
use harness_specs::{connect, decode_base64, new_control_plane, next_envelope};

fn pty_start(session_id: &str, args: &[&str], cols: u16, rows: u16) -> Command {
    Command::PtyStart {
        session_id: session_id.to_owned(),
        args: args.iter().map(|s| s.to_string()).collect(),
        env: Default::default(),
        cwd: None,
        initial_cols: cols,
        initial_rows: rows,
        tenant_id: None,
        user_id: None,
        workspace_id: None,
        worktree_id: None,
        terminal_foreground_hex: None,
        terminal_background_hex: None,
    }
}

#[tokio::test]
async fn session_start_streams_output_then_event_then_exit() -> anyhow::Result<()> {
    let control = new_control_plane();
    let client = connect(&control, "conn-a").await;

    let resp = client
        .call(Command::DirectoryUpsert {
            directory_id: None,
            tenant_id: None,
            user_id: None,
            workspace_id: None,
            path: "/tmp/p".to_owned(),
        })
        .await;
    assert_eq!(resp["ok"], true);
    let directory_id = resp["directory"]["directoryId"].as_str().unwrap().to_owned();

    let resp = client
        .call(Command::ConversationCreate {
            conversation_id: Some("c1".to_owned()),
            directory_id,
            title: "t".to_owned(),
            agent_type: "codex".to_owned(),
            adapter_state: Default::default(),
            tenant_id: None,
            user_id: None,
            workspace_id: None,
        })
        .await;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["conversation"]["conversationId"], "c1");

    let resp = client.call(pty_start("c1", &["echo", "hi"], 20, 5)).await;
    assert_eq!(resp["ok"], true);

    let resp = client.call(Command::PtySubscribeEvents { session_id: "c1".to_owned() }).await;
    assert_eq!(resp["ok"], true);

    let resp = client.call(Command::PtyAttach { session_id: "c1".to_owned(), since_cursor: 0 }).await;
    assert_eq!(resp["ok"], true);

    let mut saw_output_with_hi = false;
    let mut saw_session_exit_event = false;
    let mut saw_pty_exit = false;

    while !saw_pty_exit {
        match next_envelope(&client).await? {
            harness_control::Envelope::PtyOutput { chunk_base64, .. } => {
                let bytes = decode_base64(&chunk_base64)?;
                if String::from_utf8_lossy(&bytes).contains("hi") {
                    saw_output_with_hi = true;
                }
            }
            harness_control::Envelope::PtyEvent { event, .. } => {
                if matches!(event, harness_core::event::SessionEvent::SessionExit { .. }) {
                    saw_session_exit_event = true;
                }
            }
            harness_control::Envelope::PtyExit { exit, .. } => {
                assert_eq!(exit.code, Some(0));
                saw_pty_exit = true;
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    assert!(saw_output_with_hi, "expected a pty.output chunk containing \"hi\"");
    assert!(saw_session_exit_event, "expected a pty.event carrying session-exit");
    Ok(())
}

#[tokio::test]
async fn late_attach_replays_full_history_then_exit() -> anyhow::Result<()> {
    let control = new_control_plane();
    let first = connect(&control, "conn-first").await;

    let resp = first
        .call(Command::DirectoryUpsert {
            directory_id: None,
            tenant_id: None,
            user_id: None,
            workspace_id: None,
            path: "/tmp/q".to_owned(),
        })
        .await;
    let directory_id = resp["directory"]["directoryId"].as_str().unwrap().to_owned();
    first
        .call(Command::ConversationCreate {
            conversation_id: Some("c2".to_owned()),
            directory_id,
            title: "t".to_owned(),
            agent_type: "codex".to_owned(),
            adapter_state: Default::default(),
            tenant_id: None,
            user_id: None,
            workspace_id: None,
        })
        .await;
    first.call(pty_start("c2", &["echo", "from-c2"], 20, 5)).await;

    // Give the child time to run and exit before the second client attaches,
    // so the replay path is exercised against a session that has already
    // finished rather than one still producing output.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let latecomer = connect(&control, "conn-second").await;
    let resp = latecomer.call(Command::PtyAttach { session_id: "c2".to_owned(), since_cursor: 0 }).await;
    assert_eq!(resp["ok"], true);

    let mut replayed = Vec::new();
    loop {
        match next_envelope(&latecomer).await? {
            harness_control::Envelope::PtyOutput { chunk_base64, .. } => {
                replayed.extend(decode_base64(&chunk_base64)?);
            }
            harness_control::Envelope::PtyExit { exit, .. } => {
                assert_eq!(exit.code, Some(0));
                break;
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    assert!(String::from_utf8_lossy(&replayed).contains("from-c2"));
    Ok(())
}

#[tokio::test]
async fn claim_blocks_other_controllers_until_release_or_takeover() -> anyhow::Result<()> {
    let control = new_control_plane();
    let client_a = connect(&control, "conn-claimer").await;
    let client_b = connect(&control, "conn-rival").await;

    client_a
        .call(Command::DirectoryUpsert {
            directory_id: None,
            tenant_id: None,
            user_id: None,
            workspace_id: None,
            path: "/tmp/r".to_owned(),
        })
        .await;
    client_a
        .call(Command::ConversationCreate {
            conversation_id: Some("c3".to_owned()),
            directory_id: "directory-/tmp/r".to_owned(),
            title: "t".to_owned(),
            agent_type: "codex".to_owned(),
            adapter_state: Default::default(),
            tenant_id: None,
            user_id: None,
            workspace_id: None,
        })
        .await;
    client_a.call(pty_start("c3", &["cat"], 20, 5)).await;

    let claim = client_a
        .call(Command::SessionClaim {
            session_id: "c3".to_owned(),
            controller_id: "conn-claimer".to_owned(),
            controller_type: ControllerType::Human,
            controller_label: None,
            reason: None,
            takeover: false,
        })
        .await;
    assert_eq!(claim["ok"], true);

    let rejected = client_b
        .call(Command::SessionRespond { session_id: "c3".to_owned(), text: "hello".to_owned() })
        .await;
    assert_eq!(rejected["ok"], false);
    assert_eq!(rejected["error"]["kind"], "controller-conflict");

    let takeover = client_b
        .call(Command::SessionClaim {
            session_id: "c3".to_owned(),
            controller_id: "conn-rival".to_owned(),
            controller_type: ControllerType::Human,
            controller_label: None,
            reason: None,
            takeover: true,
        })
        .await;
    assert_eq!(takeover["ok"], true);
    assert_eq!(takeover["tookOver"], true);

    let accepted = client_b
        .call(Command::SessionRespond { session_id: "c3".to_owned(), text: "hello".to_owned() })
        .await;
    assert_eq!(accepted["ok"], true);

    let removed = client_b.call(Command::SessionRemove { session_id: "c3".to_owned() }).await;
    assert_eq!(removed["ok"], true, "the current controller must be able to remove the session");
    Ok(())
}

#[tokio::test]
async fn stream_subscribe_delivers_filtered_events_in_cursor_order() -> anyhow::Result<()> {
    let control = new_control_plane();
    let subscriber = connect(&control, "conn-subscriber").await;
    let actor = connect(&control, "conn-actor").await;

    let resp = subscriber
        .call(Command::StreamSubscribe {
            tenant_id: None,
            user_id: None,
            workspace_id: Some("w".to_owned()),
            repository_id: None,
            task_id: None,
            directory_id: None,
            conversation_id: None,
            include_output: false,
            after_cursor: 0,
        })
        .await;
    assert_eq!(resp["ok"], true);

    actor
        .call(Command::DirectoryUpsert {
            directory_id: Some("d1".to_owned()),
            tenant_id: None,
            user_id: None,
            workspace_id: Some("w".to_owned()),
            path: "/tmp/d1".to_owned(),
        })
        .await;
    actor
        .call(Command::DirectoryUpsert {
            directory_id: Some("d2".to_owned()),
            tenant_id: None,
            user_id: None,
            workspace_id: Some("w".to_owned()),
            path: "/tmp/d2".to_owned(),
        })
        .await;

    let first = next_envelope(&subscriber).await?;
    let second = next_envelope(&subscriber).await?;

    let (cursor1, id1) = expect_directory_upserted(&first);
    let (cursor2, id2) = expect_directory_upserted(&second);

    assert_eq!(id1, "d1");
    assert_eq!(id2, "d2");
    assert!(cursor2 > cursor1, "cursors must be strictly increasing");
    Ok(())
}

fn expect_directory_upserted(envelope: &harness_control::Envelope) -> (u64, String) {
    match envelope {
        harness_control::Envelope::StreamEvent { cursor, event, .. } => {
            assert_eq!(event.kind, harness_control::events::ObservedEventKind::DirectoryUpserted);
            let directory_id = event.payload["directory"]["directoryId"].as_str().unwrap().to_owned();
            (*cursor, directory_id)
        }
        other => panic!("unexpected envelope: {other:?}"),
    }
}
