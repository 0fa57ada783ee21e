// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boundary-behavior scenarios that don't need a running session: resize
//! coalescing and mouse-driven selection/clipboard, exercised directly
//! against `harness-term`'s pure functions.

use std::time::{Duration, Instant};

use harness_core::oracle::Oracle;
use harness_term::clipboard::osc52_set_clipboard;
use harness_term::input::{InputRouter, Keybindings, RouteAction};
use harness_term::layout::compute_dual_pane_layout;
use harness_term::resize::{ResizeDecision, ResizeThrottle, TerminalSize, DEFAULT_MIN_INTERVAL_MS, DEFAULT_SETTLE_MS};

fn sgr_mouse(col: u16, row: u16, code: u8, release: bool) -> Vec<u8> {
    let terminator = if release { 'm' } else { 'M' };
    format!("\x1b[<{code};{col};{row}{terminator}").into_bytes()
}

#[test]
fn six_resizes_in_60ms_coalesce_to_at_most_two_applies() {
    let mut throttle = ResizeThrottle::new(
        Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
        Duration::from_millis(DEFAULT_SETTLE_MS),
    );
    let base = Instant::now();
    let observations = [
        (120u16, 40u16, 0u64),
        (119, 40, 10),
        (118, 40, 20),
        (117, 39, 30),
        (117, 38, 40),
        (117, 37, 60),
    ];

    let mut applies = 0;
    for (cols, rows, offset_ms) in observations {
        let now = base + Duration::from_millis(offset_ms);
        if matches!(throttle.observe(TerminalSize { cols, rows }, now), ResizeDecision::Apply(_)) {
            applies += 1;
        }
    }
    assert!(applies <= 2, "expected at most two immediate applies within the 60ms window, got {applies}");

    // Whatever didn't apply immediately drains once its throttle window passes.
    throttle.drain_pending(base + Duration::from_millis(100));
    let settled = throttle.take_settled(base + Duration::from_millis(100 + DEFAULT_SETTLE_MS));
    let final_size = settled.expect("a layout-changing resize should have a pending settle");
    assert_eq!(final_size, TerminalSize { cols: 117, rows: 37 });

    let layout = compute_dual_pane_layout(final_size.cols, final_size.rows, None);
    assert_eq!(layout.right_cols, final_size.cols - layout.left_cols - 1);
    assert_eq!(layout.pane_rows, final_size.rows - 1);
}

#[test]
fn mouse_drag_selection_then_copy_shortcut_emits_one_osc52_sequence() {
    let layout = compute_dual_pane_layout(60, 10, Some(12));
    let mut oracle = Oracle::new(layout.right_cols, layout.pane_rows);
    oracle.ingest(b"selected text here\r\n");
    let frame = oracle.snapshot();
    let line = frame.lines.first().cloned().unwrap_or_default();
    assert!(line.starts_with("selected"));

    let mut router = InputRouter::new(Keybindings::default());
    let start_col = layout.right_start_col;
    let end_col = layout.right_start_col + 7;
    let row = 1u16;

    let mut actions = Vec::new();
    for token in router.feed(&sgr_mouse(start_col, row, 0, false)) {
        actions.extend(router.route(token, &layout, true));
    }
    for token in router.feed(&sgr_mouse(end_col, row, 32, false)) {
        actions.extend(router.route(token, &layout, true));
    }
    for token in router.feed(&sgr_mouse(end_col, row, 0, true)) {
        actions.extend(router.route(token, &layout, true));
    }

    assert!(actions.iter().any(|a| matches!(a, RouteAction::SelectionStarted(_))));
    assert!(actions.iter().any(|a| matches!(a, RouteAction::SelectionFinished(_))));

    let selection = {
        // Re-derive the same selection the router just finished, since
        // `current_selection` is cleared once a drag completes — the
        // finished anchor pair is what a caller would persist instead.
        let Some(RouteAction::SelectionFinished(end_anchor)) =
            actions.iter().rev().find(|a| matches!(a, RouteAction::SelectionFinished(_)))
        else {
            unreachable!("checked above");
        };
        let Some(RouteAction::SelectionStarted(start_anchor)) =
            actions.iter().find(|a| matches!(a, RouteAction::SelectionStarted(_)))
        else {
            unreachable!("checked above");
        };
        (*start_anchor, *end_anchor)
    };

    let (start_anchor, end_anchor) = selection;
    let pane_col = |col: u16| col.saturating_sub(layout.right_start_col) as usize;
    let from = pane_col(start_anchor.col);
    let to = pane_col(end_anchor.col);
    let selected_text: String = line.chars().skip(from).take(to - from).collect();
    assert_eq!(selected_text, "selecte");

    let sequence = osc52_set_clipboard(&selected_text);
    assert!(sequence.starts_with("\x1b]52;c;"));
    assert!(sequence.ends_with('\x07'));

    let encoded = sequence.trim_start_matches("\x1b]52;c;").trim_end_matches('\x07');
    let decoded = {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(encoded).unwrap()
    };
    assert_eq!(String::from_utf8(decoded).unwrap(), "selecte");
}
