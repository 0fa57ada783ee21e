// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn scoped(workspace_id: &str) -> Scope {
    Scope { workspace_id: Some(workspace_id.to_owned()), ..Default::default() }
}

#[test]
fn cursor_is_strictly_monotonic() {
    let mut journal = Journal::new(8);
    let a = journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 1);
    let b = journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 2);
    assert!(b.cursor > a.cursor);
}

#[test]
fn catch_up_is_scope_filtered_and_cursor_ordered() {
    let mut journal = Journal::new(8);
    journal.publish(scoped("w1"), ObservedEventKind::DirectoryUpserted, serde_json::json!({"id": "d1"}), 1);
    journal.publish(scoped("w2"), ObservedEventKind::DirectoryUpserted, serde_json::json!({"id": "d2"}), 2);
    journal.publish(scoped("w1"), ObservedEventKind::DirectoryUpserted, serde_json::json!({"id": "d3"}), 3);

    let filter = SubscriptionFilter { scope: scoped("w1"), include_output: false };
    let caught_up = journal.catch_up(0, &filter).expect("no gap");
    assert_eq!(caught_up.len(), 2);
    assert!(caught_up[0].cursor < caught_up[1].cursor);
    assert_eq!(caught_up[0].payload["id"], "d1");
}

#[test]
fn session_output_excluded_unless_include_output_set() {
    let mut journal = Journal::new(8);
    journal.publish(scoped("w"), ObservedEventKind::SessionOutput, serde_json::json!({}), 1);

    let default_filter = SubscriptionFilter { scope: scoped("w"), include_output: false };
    assert!(journal.catch_up(0, &default_filter).expect("no gap").is_empty());

    let output_filter = SubscriptionFilter { scope: scoped("w"), include_output: true };
    assert_eq!(journal.catch_up(0, &output_filter).expect("no gap").len(), 1);
}

#[test]
fn eviction_beyond_capacity_reports_gap_for_stale_cursor() {
    let mut journal = Journal::new(2);
    journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 1);
    journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 2);
    journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 3);

    let filter = SubscriptionFilter { scope: Scope::default(), include_output: false };
    let err = journal.catch_up(0, &filter).expect_err("cursor 0 predates retained window");
    assert_eq!(err.current_cursor, 3);
}

#[test]
fn catch_up_within_retained_window_succeeds_after_eviction() {
    let mut journal = Journal::new(2);
    journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 1);
    let second = journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 2);
    journal.publish(scoped("w"), ObservedEventKind::DirectoryUpserted, serde_json::json!({}), 3);

    let filter = SubscriptionFilter { scope: Scope::default(), include_output: false };
    let caught_up = journal.catch_up(second.cursor, &filter).expect("within window");
    assert_eq!(caught_up.len(), 1);
}

#[test]
fn event_store_assigns_per_conversation_sequence_and_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("events.jsonl");
    let store = EventStore::open(&path);

    let scope = Scope { conversation_id: Some("c1".to_owned()), ..Default::default() };
    store.append(
        scope.clone(),
        EnvelopeCategory::ProviderText,
        EnvelopeKind::ProviderTextDelta,
        serde_json::json!({"chunk": "a"}),
        "e1".to_owned(),
        1,
    );
    store.append(
        scope.clone(),
        EnvelopeCategory::ProviderText,
        EnvelopeKind::ProviderTextDelta,
        serde_json::json!({"chunk": "b"}),
        "e2".to_owned(),
        2,
    );

    let caught_up = store.catchup("c1", 0);
    assert_eq!(caught_up.len(), 1);
    assert_eq!(caught_up[0].event_seq, 1);

    let reopened = EventStore::open(&path);
    let all = reopened.catchup("c1", u64::MAX - 1);
    assert!(all.is_empty());
    let all_from_zero = reopened.catchup("c1", 0);
    assert_eq!(all_from_zero.len(), 2);
}
