// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dual-Pane Renderer: composes [`PaneLayout`] geometry, an Oracle
//! [`harness_core::oracle::Frame`], a rendered rail, and a status row into
//! one rendered row set, then hands it to [`diff_rendered_rows`] for a
//! minimal repaint. Generalizes the teacher's single reserved-statusline
//! DECSTBM technique (`attach.rs`'s `render_statusline`) from one fixed
//! bottom line into a rail + right-pane + status-row triple layout.

use harness_core::oracle::Frame;
use unicode_width::UnicodeWidthStr;

use crate::diff::{diff_rendered_rows, RowDiff};
use crate::layout::PaneLayout;
use crate::rail::{render_rail, RailEntry};

/// Everything one render pass needs: the current layout, the active
/// session's terminal frame, the rail catalog, and a pre-formatted status
/// line (built by the caller from a [`harness_core::status::StatusModel`]).
pub struct RenderInput<'a> {
    pub layout: PaneLayout,
    pub frame: &'a Frame,
    pub rail_entries: &'a [RailEntry],
    pub active_session_id: &'a str,
    pub status_line: &'a str,
}

fn pad_or_truncate(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    if w >= width {
        s.chars().take(width).collect()
    } else {
        let mut out = s.to_owned();
        out.push_str(&" ".repeat(width - w));
        out
    }
}

/// Composites the rail and right-pane content side by side for one row,
/// separated by a single blank column.
fn compose_row(rail_row: Option<&str>, right_row: Option<&str>, layout: &PaneLayout) -> String {
    let left = pad_or_truncate(rail_row.unwrap_or(""), layout.left_cols as usize);
    let right = pad_or_truncate(right_row.unwrap_or(""), layout.right_cols as usize);
    format!("{left} {right}")
}

/// Throttled, diffed frame renderer. Holds the last rendered row set so
/// repeated `render` calls only repaint changed rows, and only re-renders
/// at all when the input actually differs from the last render (a
/// cursor-only or mode-only change is caught by comparing full row
/// content, not individual fields).
pub struct FrameRenderer {
    previous_rows: Vec<String>,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self { previous_rows: Vec::new() }
    }

    /// Forces the next `render` call to repaint unconditionally (e.g.
    /// after an activation switch or a settled resize).
    pub fn invalidate(&mut self) {
        self.previous_rows.clear();
    }

    pub fn render(&mut self, input: &RenderInput<'_>) -> RowDiff {
        let layout = &input.layout;
        let rail_rows = render_rail(
            input.rail_entries,
            input.active_session_id,
            layout.pane_rows as usize,
            layout.left_cols as usize,
        );

        let mut rows = Vec::with_capacity(layout.rows as usize);
        for row_index in 0..layout.pane_rows as usize {
            let rail_row = rail_rows.get(row_index).map(String::as_str);
            let right_row = input.frame.lines.get(row_index).map(String::as_str);
            rows.push(compose_row(rail_row, right_row, layout));
        }
        rows.push(pad_or_truncate(input.status_line, layout.cols as usize));

        let diff = diff_rendered_rows(&rows, &self.previous_rows);
        self.previous_rows = diff.next_rows.clone();
        diff
    }

    /// Cursor position to report to the terminal after a render,
    /// translated from the Oracle's pane-relative coordinates into the
    /// right pane's absolute screen coordinates. Hidden whenever the
    /// viewport has scrolled away from the tail — the cursor overlay only
    /// applies when `followOutput && cursor.visible`.
    pub fn cursor_screen_position(&self, input: &RenderInput<'_>) -> Option<(u16, u16)> {
        if !input.frame.cursor.visible || !input.frame.viewport.follow_output {
            return None;
        }
        let layout = &input.layout;
        if input.frame.cursor.row >= layout.pane_rows || input.frame.cursor.col >= layout.right_cols {
            return None;
        }
        let col = layout.right_start_col + input.frame.cursor.col;
        let row = input.frame.cursor.row + 1;
        Some((col, row))
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
