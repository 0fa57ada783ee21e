// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scans raw PTY bytes for the DEC private-mode sequences the Oracle needs
//! to track but `avt::Vt` does not expose: bracketed paste, the several SGR
//! mouse-tracking variants, focus tracking, and DECSCUSR cursor style.
//!
//! Mirrors the teacher's alt-screen scanner (`Screen::scan_alt_screen`):
//! a small sliding-window byte search rather than a full parser, because
//! these sequences are short, fixed, and never need to be round-tripped.

use serde::{Deserialize, Serialize};

/// Cursor style set via DECSCUSR (`\x1b[<n> q`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorStyle {
    Block,
    Underline,
    Bar,
}

impl Default for CursorStyle {
    fn default() -> Self {
        Self::Block
    }
}

/// DEC mouse-tracking protocol variants, named after the DECSET codes that
/// enable them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MouseModes {
    /// `?1000h` — normal tracking (press/release).
    pub normal: bool,
    /// `?1002h` — button-event tracking (press/release/drag while a button is held).
    pub button_event: bool,
    /// `?1003h` — any-event tracking (all motion reported).
    pub any_event: bool,
    /// `?1006h` — SGR extended coordinates.
    pub sgr: bool,
    /// `?1015h` — urxvt extended coordinates (rarely used; tracked for completeness).
    pub urxvt: bool,
}

impl MouseModes {
    /// Whether any mouse reporting is currently enabled.
    pub fn enabled(&self) -> bool {
        self.normal || self.button_event || self.any_event
    }
}

/// Terminal modes the Oracle tracks alongside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modes {
    pub bracketed_paste: bool,
    pub focus_tracking: bool,
    pub mouse: MouseModes,
    pub cursor_blinking: bool,
    /// DECTCEM (`\x1b[?25h`/`l`) cursor visibility; terminals start with the
    /// cursor shown.
    pub cursor_visible: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            bracketed_paste: false,
            focus_tracking: false,
            mouse: MouseModes::default(),
            cursor_blinking: false,
            cursor_visible: true,
        }
    }
}

/// Carries unconsumed trailing bytes across `scan` calls so a sequence
/// split across two PTY reads is still detected. Mirrors the teacher's
/// `esc_buf` tail-buffering technique in `Screen::feed`.
#[derive(Debug, Default)]
pub struct ModeScanner {
    tail: Vec<u8>,
}

/// Longest recognized sequence is `\x1b[?1049h` / mouse variants — 8 bytes.
const MAX_SEQ_LEN: usize = 8;

impl ModeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `data` for mode-changing escape sequences, updating `modes` and
    /// `cursor_style` in place. Must be called with bytes in stream order.
    pub fn scan(&mut self, data: &[u8], modes: &mut Modes, cursor_style: &mut CursorStyle) {
        if data.is_empty() {
            return;
        }

        let bridge: Vec<u8>;
        let region: &[u8] = if self.tail.is_empty() {
            data
        } else {
            let take = data.len().min(MAX_SEQ_LEN);
            bridge = [&self.tail[..], &data[..take]].concat();
            &bridge
        };

        apply_dec_modes(region, modes);
        apply_cursor_style(region, cursor_style, &mut modes.cursor_blinking);
        apply_dec_modes(data, modes);
        apply_cursor_style(data, cursor_style, &mut modes.cursor_blinking);

        let tail_len = data.len().min(MAX_SEQ_LEN - 1);
        self.tail = data[data.len() - tail_len..].to_vec();
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn apply_dec_modes(data: &[u8], modes: &mut Modes) {
    if contains(data, b"\x1b[?2004h") {
        modes.bracketed_paste = true;
    }
    if contains(data, b"\x1b[?2004l") {
        modes.bracketed_paste = false;
    }
    if contains(data, b"\x1b[?1004h") {
        modes.focus_tracking = true;
    }
    if contains(data, b"\x1b[?1004l") {
        modes.focus_tracking = false;
    }
    if contains(data, b"\x1b[?1000h") {
        modes.mouse.normal = true;
    }
    if contains(data, b"\x1b[?1000l") {
        modes.mouse.normal = false;
    }
    if contains(data, b"\x1b[?1002h") {
        modes.mouse.button_event = true;
    }
    if contains(data, b"\x1b[?1002l") {
        modes.mouse.button_event = false;
    }
    if contains(data, b"\x1b[?1003h") {
        modes.mouse.any_event = true;
    }
    if contains(data, b"\x1b[?1003l") {
        modes.mouse.any_event = false;
    }
    if contains(data, b"\x1b[?1006h") {
        modes.mouse.sgr = true;
    }
    if contains(data, b"\x1b[?1006l") {
        modes.mouse.sgr = false;
    }
    if contains(data, b"\x1b[?1015h") {
        modes.mouse.urxvt = true;
    }
    if contains(data, b"\x1b[?1015l") {
        modes.mouse.urxvt = false;
    }
    if contains(data, b"\x1b[?25h") {
        modes.cursor_visible = true;
    }
    if contains(data, b"\x1b[?25l") {
        modes.cursor_visible = false;
    }
}

/// DECSCUSR: `\x1b[<n> q`. n in {0,1} block blink/steady, {2} block steady,
/// {3,4} underline blink/steady, {5,6} bar blink/steady. Conventionally 0
/// resets to the terminal default (treated here as blinking block).
fn apply_cursor_style(data: &[u8], style: &mut CursorStyle, blinking: &mut bool) {
    let mut i = 0;
    while i + 4 <= data.len() {
        if data[i] == 0x1b && data[i + 1] == b'[' {
            // find the 'q' within a short lookahead
            let mut j = i + 2;
            let mut digits = String::new();
            while j < data.len() && data[j].is_ascii_digit() {
                digits.push(data[j] as char);
                j += 1;
            }
            if j < data.len() && data[j] == b' ' && j + 1 < data.len() && data[j + 1] == b'q' {
                if let Ok(n) = digits.parse::<u8>() {
                    *style = match n {
                        0 | 1 | 2 => CursorStyle::Block,
                        3 | 4 => CursorStyle::Underline,
                        5 | 6 => CursorStyle::Bar,
                        _ => *style,
                    };
                    if n != 0 {
                        *blinking = n % 2 == 1;
                    }
                }
                i = j + 2;
                continue;
            }
        }
        i += 1;
    }
}

#[cfg(test)]
#[path = "modes_tests.rs"]
mod tests;
