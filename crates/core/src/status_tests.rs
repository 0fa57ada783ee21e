// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

struct UpperReducer;
impl StatusReducer for UpperReducer {
    fn normalize_attention_reason(&self, reason: &str) -> String {
        reason.to_uppercase()
    }
}

#[test]
fn needs_input_uses_normalized_attention_reason() {
    let reducer = DefaultStatusReducer;
    let mut state = ReducerState::default();
    let model = reduce(&reducer, SessionStatus::NeedsInput, Some("approve plan"), None, &mut state, 10);
    assert_eq!(model.phase, Phase::NeedsAction);
    assert_eq!(model.detail_text, "approve plan");
    assert_eq!(model.glyph, '▲');
    assert_eq!(model.badge, "NEED");
}

#[test]
fn registry_dispatches_per_agent_normalization() {
    let mut registry = ReducerRegistry::new();
    registry.register("codex", Arc::new(UpperReducer));
    let reducer = registry.get("codex");
    let mut state = ReducerState::default();
    let model = reduce(reducer.as_ref(), SessionStatus::NeedsInput, Some("approve"), None, &mut state, 0);
    assert_eq!(model.attention_reason.as_deref(), Some("APPROVE"));

    let fallback = registry.get("unknown-agent");
    let mut state2 = ReducerState::default();
    let model2 = reduce(fallback.as_ref(), SessionStatus::NeedsInput, Some("approve"), None, &mut state2, 0);
    assert_eq!(model2.attention_reason.as_deref(), Some("approve"));
}

#[test]
fn newer_telemetry_supersedes_older() {
    let reducer = DefaultStatusReducer;
    let mut state = ReducerState::default();
    let older = TelemetrySample { observed_at_ms: 5, text: Some("reading files".into()), phase_hint: Some(Phase::Working) };
    let newer = TelemetrySample { observed_at_ms: 10, text: Some("running tests".into()), phase_hint: Some(Phase::Working) };

    let _ = reduce(&reducer, SessionStatus::Running, None, Some(&newer), &mut state, 10);
    let model = reduce(&reducer, SessionStatus::Running, None, Some(&older), &mut state, 11);
    // older sample must not overwrite the newer one already recorded.
    assert_eq!(model.last_known_work.as_deref(), Some("running tests"));
}

#[test]
fn completed_after_needs_action_forces_idle_unless_prior_was_needs_action() {
    let reducer = DefaultStatusReducer;
    let mut state = ReducerState::default();
    let _ = reduce(&reducer, SessionStatus::NeedsInput, Some("approve"), None, &mut state, 0);
    let model = reduce(&reducer, SessionStatus::Completed, None, None, &mut state, 1);
    // prior phase was needs-action, so lastKnownWork is NOT forced to inactive.
    assert_ne!(model.last_known_work.as_deref(), Some("inactive"));
}

#[test]
fn completed_from_running_forces_inactive_idle() {
    let reducer = DefaultStatusReducer;
    let mut state = ReducerState::default();
    let _ = reduce(&reducer, SessionStatus::Running, None, None, &mut state, 0);
    let model = reduce(&reducer, SessionStatus::Completed, None, None, &mut state, 1);
    assert_eq!(model.last_known_work.as_deref(), Some("inactive"));
    assert_eq!(model.phase, Phase::Idle);
}

#[test]
fn exited_forces_exited_lastknownwork_and_phase() {
    let reducer = DefaultStatusReducer;
    let mut state = ReducerState::default();
    let model = reduce(&reducer, SessionStatus::Exited, None, None, &mut state, 2);
    assert_eq!(model.last_known_work.as_deref(), Some("exited"));
    assert_eq!(model.phase, Phase::Exited);
    assert_eq!(model.badge, "EXIT");
}

#[test]
fn running_without_hint_defaults_to_starting() {
    let reducer = DefaultStatusReducer;
    let mut state = ReducerState::default();
    let model = reduce(&reducer, SessionStatus::Running, None, None, &mut state, 0);
    assert_eq!(model.phase, Phase::Starting);
    assert_eq!(model.detail_text, "starting…");
}
