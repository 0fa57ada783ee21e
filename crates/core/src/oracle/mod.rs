// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot Oracle: parses a PTY byte stream into a terminal state (grid,
//! scrollback, cursor, modes) and exposes immutable `Frame` snapshots for
//! rendering. Built on `avt::Vt` the same way the teacher's `Screen` type
//! is, extended with scrollback, viewport scrolling, mode tracking, and a
//! `richLines` projection for wide-glyph-aware overlay rendering.

mod modes;
mod width;

pub use modes::{CursorStyle, ModeScanner, Modes, MouseModes};
pub use width::{measure_display_width, to_rich_cells, RichCell};

use serde::{Deserialize, Serialize};

/// Default scrollback capacity in lines when the caller doesn't specify one.
pub const DEFAULT_SCROLLBACK_LINES: usize = 10_000;

/// Cursor position, visibility, and style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
    pub style: CursorStyle,
    pub blinking: bool,
}

/// Scroll position within the combined scrollback + live grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Index of the first visible row, 0 == oldest retained line.
    pub top: usize,
    /// Total rows available (scrollback + live grid).
    pub total_rows: usize,
    /// Whether the viewport is pinned to the tail (auto-scrolls on new output).
    pub follow_output: bool,
}

/// A single rendered line with per-cell wide-glyph accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct RichLine {
    pub text: String,
    pub cells: Vec<RichCell>,
}

/// Immutable point-in-time capture of the terminal state.
#[derive(Debug, Clone)]
pub struct Frame {
    pub rows: u16,
    pub cols: u16,
    pub active_screen: ActiveScreen,
    pub modes: Modes,
    pub cursor: Cursor,
    pub viewport: Viewport,
    pub lines: Vec<String>,
    pub rich_lines: Vec<RichLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveScreen {
    Primary,
    Alternate,
}

/// DECSET alternate screen buffer enable/disable, scanned the same way the
/// teacher's `Screen::scan_alt_screen` does.
const ALT_SCREEN_ON: &[u8] = b"\x1b[?1049h";
const ALT_SCREEN_OFF: &[u8] = b"\x1b[?1049l";

fn scan_alt_screen(data: &[u8], alt_screen: &mut bool) {
    if data.len() < ALT_SCREEN_ON.len() {
        return;
    }
    if data.windows(ALT_SCREEN_ON.len()).any(|w| w == ALT_SCREEN_ON) {
        *alt_screen = true;
    }
    if data.windows(ALT_SCREEN_OFF.len()).any(|w| w == ALT_SCREEN_OFF) {
        *alt_screen = false;
    }
}

/// Returns the number of trailing bytes that form an incomplete UTF-8
/// sequence, identical to the teacher's `Screen::incomplete_utf8_tail_len`.
fn incomplete_utf8_tail_len(data: &[u8]) -> usize {
    let len = data.len();
    for i in 1..=len.min(3) {
        let byte = data[len - i];
        if byte < 0x80 {
            return 0;
        }
        if byte >= 0xC0 {
            let expected = if byte < 0xE0 {
                2
            } else if byte < 0xF0 {
                3
            } else {
                4
            };
            return if i < expected { i } else { 0 };
        }
    }
    0
}

/// Ring of scrollback lines evicted from `avt::Vt`'s live grid, capped at
/// `capacity` lines, oldest dropped first.
#[derive(Debug)]
struct Scrollback {
    lines: std::collections::VecDeque<String>,
    capacity: usize,
}

impl Scrollback {
    fn new(capacity: usize) -> Self {
        Self { lines: std::collections::VecDeque::with_capacity(capacity.min(1024)), capacity }
    }

    fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

/// Terminal snapshot engine. `ingest` is pure append; `snapshot` captures
/// an immutable `Frame`.
pub struct Oracle {
    vt: avt::Vt,
    cols: u16,
    rows: u16,
    seq: u64,
    alt_screen: bool,
    modes: Modes,
    cursor_style: CursorStyle,
    mode_scanner: ModeScanner,
    scrollback: Scrollback,
    /// Snapshot of the live grid's top line from the previous ingest, used
    /// to detect lines that scrolled off and belong in `scrollback`.
    prev_top_line: Option<String>,
    viewport_top: usize,
    follow_output: bool,
    utf8_buf: Vec<u8>,
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("seq", &self.seq)
            .field("alt_screen", &self.alt_screen)
            .finish()
    }
}

impl Oracle {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_scrollback(cols, rows, DEFAULT_SCROLLBACK_LINES)
    }

    pub fn with_scrollback(cols: u16, rows: u16, scrollback_lines: usize) -> Self {
        Self {
            vt: avt::Vt::new(cols as usize, rows as usize),
            cols,
            rows,
            seq: 0,
            alt_screen: false,
            modes: Modes::default(),
            cursor_style: CursorStyle::default(),
            mode_scanner: ModeScanner::new(),
            scrollback: Scrollback::new(scrollback_lines),
            prev_top_line: None,
            viewport_top: 0,
            follow_output: true,
            utf8_buf: Vec::new(),
        }
    }

    /// Append raw PTY bytes. Never panics on malformed escape sequences —
    /// `avt` degrades to literal rendering, matching the bounded-recovery
    /// failure mode required of the Oracle.
    pub fn ingest(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let owned: Vec<u8>;
        let input: &[u8] = if self.utf8_buf.is_empty() {
            data
        } else {
            owned = [self.utf8_buf.as_slice(), data].concat();
            self.utf8_buf.clear();
            &owned
        };

        scan_alt_screen(input, &mut self.alt_screen);
        self.mode_scanner.scan(input, &mut self.modes, &mut self.cursor_style);

        let tail = incomplete_utf8_tail_len(input);
        let (to_feed, to_buffer) = input.split_at(input.len() - tail);
        if !to_buffer.is_empty() {
            self.utf8_buf = to_buffer.to_vec();
        }

        if !to_feed.is_empty() {
            // Capture the outgoing top line before it's pushed out of the
            // live grid by wrapped output, so it can be retained as
            // scrollback rather than silently discarded.
            if !self.alt_screen {
                if let Some(top) = self.vt.view().next() {
                    self.prev_top_line = Some(top.text());
                }
            }

            let s = String::from_utf8_lossy(to_feed);
            let _ = self.vt.feed_str(&s);

            if !self.alt_screen {
                if let (Some(prev), Some(new_top)) =
                    (self.prev_top_line.take(), self.vt.view().next())
                {
                    let new_top_text = new_top.text();
                    if new_top_text != prev {
                        self.scrollback.push(prev);
                    }
                }
            }

            if self.follow_output {
                self.viewport_top = self.total_rows().saturating_sub(self.rows as usize);
            }
        }

        self.seq += 1;
    }

    fn total_rows(&self) -> usize {
        self.scrollback.lines.len() + self.rows as usize
    }

    /// Resize the virtual terminal, reflowing content without losing it.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let _ = self.vt.resize(cols as usize, rows as usize);
        self.cols = cols;
        self.rows = rows;
        if self.follow_output {
            self.viewport_top = self.total_rows().saturating_sub(self.rows as usize);
        } else {
            let max_top = self.total_rows().saturating_sub(self.rows as usize);
            self.viewport_top = self.viewport_top.min(max_top);
        }
    }

    /// Scroll the viewport by `delta` rows (negative scrolls up/back into
    /// history). Clamps to `[0, total_rows - rows]`. Scrolling away from
    /// the tail clears `follow_output`.
    pub fn scroll_viewport(&mut self, delta: i64) {
        let max_top = self.total_rows().saturating_sub(self.rows as usize);
        let current = self.viewport_top as i64;
        let next = (current + delta).clamp(0, max_top as i64) as usize;
        self.viewport_top = next;
        self.follow_output = next >= max_top;
    }

    /// Re-pin the viewport to the tail of output.
    pub fn pin_to_tail(&mut self) {
        self.follow_output = true;
        self.viewport_top = self.total_rows().saturating_sub(self.rows as usize);
    }

    pub fn is_alt_screen(&self) -> bool {
        self.alt_screen
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Capture an immutable snapshot of the current terminal state.
    pub fn snapshot(&self) -> Frame {
        let cursor = self.vt.cursor();
        let scrollback_count = self.scrollback.lines.len();
        let window_start = self.viewport_top;
        let window_end = (self.viewport_top + self.rows as usize).min(self.total_rows());

        let mut lines: Vec<String> = Vec::with_capacity(self.rows as usize);
        for idx in window_start..window_end {
            if idx < scrollback_count {
                lines.push(self.scrollback.lines[idx].clone());
            } else {
                let live_idx = idx - scrollback_count;
                lines.push(
                    self.vt
                        .view()
                        .nth(live_idx)
                        .map(|l| l.text())
                        .unwrap_or_default(),
                );
            }
        }
        while lines.len() < self.rows as usize {
            lines.push(String::new());
        }

        let rich_lines = lines
            .iter()
            .map(|text| RichLine { cells: to_rich_cells(text), text: text.clone() })
            .collect();

        Frame {
            rows: self.rows,
            cols: self.cols,
            active_screen: if self.alt_screen { ActiveScreen::Alternate } else { ActiveScreen::Primary },
            modes: self.modes,
            cursor: Cursor {
                row: cursor.row as u16,
                col: cursor.col as u16,
                visible: self.modes.cursor_visible,
                style: self.cursor_style,
                blinking: self.modes.cursor_blinking,
            },
            viewport: Viewport {
                top: self.viewport_top,
                total_rows: self.total_rows(),
                follow_output: self.follow_output,
            },
            lines,
            rich_lines,
        }
    }
}

#[cfg(test)]
#[path = "oracle_tests.rs"]
mod tests;
