// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status Reducer: projects a [`StatusModel`] from the hard
//! `runtimeStatus` (from the Control-Plane Server), the latest telemetry
//! sample, and optional notify payloads, per agent type.
//!
//! Grounded in the teacher's `driver::AgentType` enum
//! (`Claude`/`Codex`/`Gemini`/`Unknown`) and a registry-by-`agentType`
//! shape, but reduced to a capability bundle (`{reducer, promptExtractor}`)
//! instead of the teacher's screen-scraping detectors — building an agent
//! runtime is out of scope.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;

/// Projected UI-level phase. Open Question resolved per SPEC_FULL §9: the
/// single telemetry key carried through this type is `phase_hint`, never
/// `activity_hint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Starting,
    Working,
    Idle,
    NeedsAction,
    Exited,
}

/// One-shot telemetry summary from an external exporter, keyed by
/// `observedAt` so newer samples supersede older ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub observed_at_ms: u64,
    pub text: Option<String>,
    pub phase_hint: Option<Phase>,
}

/// Projected status model rendered in the rail and status row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusModel {
    pub runtime_status: SessionStatus,
    pub phase: Phase,
    pub glyph: char,
    pub badge: &'static str,
    pub detail_text: String,
    pub attention_reason: Option<String>,
    pub last_known_work: Option<String>,
    pub last_known_work_at: Option<u64>,
    pub phase_hint: Option<Phase>,
    pub observed_at_ms: u64,
}

fn glyph_for(phase: Phase) -> char {
    match phase {
        Phase::NeedsAction => '▲',
        Phase::Starting => '◔',
        Phase::Working => '◆',
        Phase::Exited => '■',
        Phase::Idle => '○',
    }
}

fn badge_for(runtime_status: SessionStatus) -> &'static str {
    match runtime_status {
        SessionStatus::NeedsInput => "NEED",
        SessionStatus::Running => "RUN",
        SessionStatus::Completed => "DONE",
        SessionStatus::Exited => "EXIT",
    }
}

fn default_detail(phase: Phase) -> &'static str {
    match phase {
        Phase::Starting => "starting…",
        Phase::Working => "working",
        Phase::Idle => "idle",
        Phase::NeedsAction => "needs input",
        Phase::Exited => "exited",
    }
}

/// A per-agent capability bundle: a status reducer plus (eventually) a
/// prompt extractor. The prompt-extractor half is out of scope (building
/// an agent runtime is out of scope) so only the reducer is modeled.
pub trait StatusReducer: Send + Sync {
    /// Normalize an `attentionReason` string for display (e.g. trimming a
    /// provider-specific prefix). The base reducer returns it unchanged.
    fn normalize_attention_reason(&self, reason: &str) -> String {
        reason.to_owned()
    }

    /// Map a telemetry event name to display text + phase hint. The base
    /// reducer never hard-codes agent-specific strings; subclasses override.
    fn telemetry_for_event(&self, _event_name: &str) -> Option<(String, Phase)> {
        None
    }
}

/// The reducer every agent type falls back to when no specific bundle is
/// registered.
#[derive(Default)]
pub struct DefaultStatusReducer;

impl StatusReducer for DefaultStatusReducer {}

/// Registry of per-`agentType` capability bundles.
/// The core carries no agent-specific logic; callers populate this from
/// their own crate (e.g. the CLI front-end) before driving reductions.
#[derive(Clone, Default)]
pub struct ReducerRegistry {
    reducers: HashMap<String, Arc<dyn StatusReducer>>,
}

impl ReducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent_type: impl Into<String>, reducer: Arc<dyn StatusReducer>) {
        self.reducers.insert(agent_type.into(), reducer);
    }

    pub fn get(&self, agent_type: &str) -> Arc<dyn StatusReducer> {
        self.reducers
            .get(agent_type)
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultStatusReducer))
    }
}

/// Prior reduction state carried across calls so "newer telemetry
/// supersedes older" and "preserve needs-action across completed" hold.
#[derive(Debug, Clone, Default)]
pub struct ReducerState {
    pub last_known_work: Option<String>,
    pub last_known_work_at: Option<u64>,
    pub phase_hint: Option<Phase>,
    pub prior_phase: Option<Phase>,
}

/// Reduce one step of the Status Reducer contract.
pub fn reduce(
    reducer: &dyn StatusReducer,
    runtime_status: SessionStatus,
    attention_reason: Option<&str>,
    telemetry: Option<&TelemetrySample>,
    state: &mut ReducerState,
    now_ms: u64,
) -> StatusModel {
    if let Some(sample) = telemetry {
        let newer = match state.last_known_work_at {
            Some(at) => sample.observed_at_ms > at,
            None => true,
        };
        if newer {
            if let Some(text) = &sample.text {
                state.last_known_work = Some(text.clone());
                state.last_known_work_at = Some(sample.observed_at_ms);
            }
            if sample.phase_hint.is_some() {
                state.phase_hint = sample.phase_hint;
            }
        }
    }

    match runtime_status {
        SessionStatus::Completed => {
            if state.prior_phase != Some(Phase::NeedsAction) {
                state.last_known_work = Some("inactive".to_owned());
                state.phase_hint = Some(Phase::Idle);
            }
        }
        SessionStatus::Exited => {
            state.last_known_work = Some("exited".to_owned());
            state.phase_hint = Some(Phase::Idle);
        }
        _ => {}
    }

    let normalized_reason = attention_reason.map(|r| reducer.normalize_attention_reason(r));

    let phase = match runtime_status {
        SessionStatus::NeedsInput => Phase::NeedsAction,
        SessionStatus::Exited => Phase::Exited,
        _ => match state.phase_hint {
            Some(hint) => hint,
            None => match runtime_status {
                SessionStatus::Running => Phase::Starting,
                _ => Phase::Idle,
            },
        },
    };

    let detail_text = if runtime_status == SessionStatus::NeedsInput {
        normalized_reason
            .clone()
            .or_else(|| state.last_known_work.clone())
            .unwrap_or_else(|| default_detail(phase).to_owned())
    } else {
        state
            .last_known_work
            .clone()
            .or_else(|| normalized_reason.clone())
            .unwrap_or_else(|| default_detail(phase).to_owned())
    };

    state.prior_phase = Some(phase);

    StatusModel {
        runtime_status,
        phase,
        glyph: glyph_for(phase),
        badge: badge_for(runtime_status),
        detail_text,
        attention_reason: normalized_reason,
        last_known_work: state.last_known_work.clone(),
        last_known_work_at: state.last_known_work_at,
        phase_hint: state.phase_hint,
        observed_at_ms: now_ms,
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
