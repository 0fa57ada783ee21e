// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::oracle::{ActiveScreen, Cursor, CursorStyle, Modes, Viewport};
use harness_term::SelectionAnchor;
use serde_json::json;

fn frame_with(lines: Vec<&str>, cols: u16) -> Frame {
    Frame {
        rows: lines.len() as u16,
        cols,
        active_screen: ActiveScreen::Primary,
        modes: Modes::default(),
        cursor: Cursor { row: 0, col: 0, visible: false, style: CursorStyle::Block, blinking: false },
        viewport: Viewport { top: 0, total_rows: lines.len(), follow_output: true },
        lines: lines.into_iter().map(String::from).collect(),
        rich_lines: Vec::new(),
    }
}

#[test]
fn rail_entry_reads_session_id_status_and_glyph() {
    let summary = json!({
        "sessionId": "sess-a",
        "status": "needs-input",
        "attentionReason": "waiting for approval",
        "statusModel": { "glyph": "▲", "badge": "NEED" },
    });
    let entry = rail_entry_from_summary(&summary).expect("valid summary");
    assert_eq!(entry.session_id, "sess-a");
    assert_eq!(entry.glyph, '▲');
    assert_eq!(entry.badge, "NEED");
    assert!(entry.needs_attention);
    assert!(!entry.dead);
}

#[test]
fn rail_entry_marks_exited_sessions_dead() {
    let summary = json!({ "sessionId": "sess-b", "status": "exited" });
    let entry = rail_entry_from_summary(&summary).expect("valid summary");
    assert!(entry.dead);
    assert!(!entry.needs_attention);
}

#[test]
fn rail_entry_requires_a_session_id() {
    let summary = json!({ "status": "running" });
    assert!(rail_entry_from_summary(&summary).is_none());
}

#[test]
fn status_line_falls_back_to_starting_before_the_first_summary() {
    let line = build_status_line(None, "sess-a", true, 40);
    assert!(line.contains("starting"));
    assert_eq!(line.chars().count(), 40);
}

#[test]
fn status_line_reports_detail_text_and_controller() {
    let summary = json!({
        "status": "running",
        "statusModel": { "detailText": "working" },
        "controller": "human-1",
    });
    let line = build_status_line(Some(&summary), "sess-a", true, 80);
    assert!(line.contains("sess-a"));
    assert!(line.contains("working"));
    assert!(line.contains("controller=human-1"));
}

#[test]
fn status_line_flags_read_only_when_not_controller() {
    let summary = json!({ "status": "running" });
    let line = build_status_line(Some(&summary), "sess-a", false, 80);
    assert!(line.contains("read-only"));
}

#[test]
fn selection_on_one_row_extracts_the_between_columns() {
    let layout = compute_dual_pane_layout(20, 5, None);
    let frame = frame_with(vec!["hello world", "", "", ""], layout.right_cols);
    let start = SelectionAnchor { col: layout.right_start_col, row: 1 };
    let end = SelectionAnchor { col: layout.right_start_col + 5, row: 1 };
    let selection = Selection { start, end, active: false };
    let text = extract_selection_text(&frame, &layout, &selection);
    assert_eq!(text, "hello");
}

#[test]
fn selection_spanning_rows_joins_with_newlines() {
    let layout = compute_dual_pane_layout(20, 5, None);
    let frame = frame_with(vec!["hello world", "second line", "", ""], layout.right_cols);
    let start = SelectionAnchor { col: layout.right_start_col + 6, row: 1 };
    let end = SelectionAnchor { col: layout.right_start_col + 6, row: 2 };
    let selection = Selection { start, end, active: false };
    let text = extract_selection_text(&frame, &layout, &selection);
    assert_eq!(text, "world\nsecond");
}

#[test]
fn selection_anchors_are_normalized_regardless_of_drag_direction() {
    let layout = compute_dual_pane_layout(20, 5, None);
    let frame = frame_with(vec!["hello world", "", "", ""], layout.right_cols);
    let start = SelectionAnchor { col: layout.right_start_col + 5, row: 1 };
    let end = SelectionAnchor { col: layout.right_start_col, row: 1 };
    let selection = Selection { start, end, active: false };
    let text = extract_selection_text(&frame, &layout, &selection);
    assert_eq!(text, "hello");
}
