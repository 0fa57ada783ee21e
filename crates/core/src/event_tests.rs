// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn scope_filter_matches_only_set_fields() {
    let scope = Scope {
        tenant_id: Some("t1".into()),
        user_id: Some("u1".into()),
        workspace_id: Some("w1".into()),
        directory_id: Some("d1".into()),
        conversation_id: Some("c1".into()),
    };
    let filter = Scope { workspace_id: Some("w1".into()), ..Scope::default() };
    assert!(scope.matches_filter(&filter));

    let mismatch = Scope { workspace_id: Some("other".into()), ..Scope::default() };
    assert!(!scope.matches_filter(&mismatch));
}

#[test]
fn empty_filter_matches_everything() {
    let scope = Scope { tenant_id: Some("t1".into()), ..Scope::default() };
    assert!(scope.matches_filter(&Scope::default()));
}

#[test]
fn session_event_envelope_kind_mapping() {
    assert_eq!(
        SessionEvent::AttentionRequired { reason: "x".into() }.envelope_kind(),
        Some(EnvelopeKind::MetaAttentionRaised)
    );
    assert_eq!(SessionEvent::TurnCompleted.envelope_kind(), Some(EnvelopeKind::ProviderTurnCompleted));
    assert_eq!(
        SessionEvent::Notify { payload: serde_json::json!({}) }.envelope_kind(),
        Some(EnvelopeKind::MetaNotifyObserved)
    );
    assert_eq!(
        SessionEvent::SessionExit { exit: ExitStatus { code: Some(0), signal: None } }.envelope_kind(),
        None
    );
}

#[test]
fn normalized_envelope_round_trips_through_json() {
    let envelope = NormalizedEnvelope {
        event_id: "e1".into(),
        ts_ms: 1234,
        scope: Scope::default(),
        category: EnvelopeCategory::ProviderText,
        kind: EnvelopeKind::ProviderTextDelta,
        event_seq: 7,
        payload: serde_json::json!({"chunkBase64": "aGk="}),
    };
    let json = serde_json::to_string(&envelope).unwrap();
    let back: NormalizedEnvelope = serde_json::from_str(&json).unwrap();
    assert_eq!(back.event_id, "e1");
    assert_eq!(back.event_seq, 7);
    assert_eq!(back.kind, EnvelopeKind::ProviderTextDelta);
}
