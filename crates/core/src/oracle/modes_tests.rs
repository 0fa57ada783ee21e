// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn tracks_bracketed_paste() {
    let mut scanner = ModeScanner::new();
    let mut modes = Modes::default();
    let mut style = CursorStyle::Block;

    scanner.scan(b"\x1b[?2004h", &mut modes, &mut style);
    assert!(modes.bracketed_paste);

    scanner.scan(b"\x1b[?2004l", &mut modes, &mut style);
    assert!(!modes.bracketed_paste);
}

#[test]
fn tracks_sgr_mouse() {
    let mut scanner = ModeScanner::new();
    let mut modes = Modes::default();
    let mut style = CursorStyle::Block;

    scanner.scan(b"\x1b[?1000h\x1b[?1006h", &mut modes, &mut style);
    assert!(modes.mouse.normal);
    assert!(modes.mouse.sgr);
    assert!(modes.mouse.enabled());
}

#[test]
fn detects_sequence_split_across_calls() {
    let mut scanner = ModeScanner::new();
    let mut modes = Modes::default();
    let mut style = CursorStyle::Block;

    scanner.scan(b"\x1b[?200", &mut modes, &mut style);
    assert!(!modes.bracketed_paste);
    scanner.scan(b"4h", &mut modes, &mut style);
    assert!(modes.bracketed_paste);
}

#[test]
fn tracks_dectcem_cursor_visibility() {
    let mut scanner = ModeScanner::new();
    let mut modes = Modes::default();
    let mut style = CursorStyle::Block;

    assert!(modes.cursor_visible);
    scanner.scan(b"\x1b[?25l", &mut modes, &mut style);
    assert!(!modes.cursor_visible);
    scanner.scan(b"\x1b[?25h", &mut modes, &mut style);
    assert!(modes.cursor_visible);
}

#[test]
fn decscusr_sets_cursor_style() {
    let mut scanner = ModeScanner::new();
    let mut modes = Modes::default();
    let mut style = CursorStyle::Block;

    scanner.scan(b"\x1b[3 q", &mut modes, &mut style);
    assert_eq!(style, CursorStyle::Underline);

    scanner.scan(b"\x1b[5 q", &mut modes, &mut style);
    assert_eq!(style, CursorStyle::Bar);
}
