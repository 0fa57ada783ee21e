// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn entry(id: &str) -> RailEntry {
    RailEntry { session_id: id.to_owned(), glyph: '◆', badge: "RUN".to_owned(), dead: false, needs_attention: false }
}

#[test]
fn max_rows_one_yields_only_the_header() {
    let entries = vec![entry("s1"), entry("s2")];
    let rows = render_rail(&entries, "s1", 1, 20);
    assert_eq!(rows.len(), 1);
}

#[test]
fn active_session_is_marked() {
    let entries = vec![entry("s1"), entry("s2")];
    let rows = render_rail(&entries, "s2", 5, 20);
    assert_eq!(rows.len(), 3);
    assert!(rows[2].starts_with('>'));
    assert!(rows[1].starts_with(' '));
}

#[test]
fn active_session_outside_window_replaces_last_slot() {
    let entries: Vec<RailEntry> = (0..10).map(|i| entry(&format!("s{i}"))).collect();
    // Window holds 3 session rows (max_rows=4: header + 3); active is s9,
    // far outside the first 3.
    let rows = render_rail(&entries, "s9", 4, 20);
    assert_eq!(rows.len(), 4);
    assert!(rows[3].contains("s9"));
    assert!(rows[3].starts_with('>'));
}

#[test]
fn dead_and_attention_suffixes() {
    let mut dead = entry("s1");
    dead.dead = true;
    let mut attention = entry("s2");
    attention.needs_attention = true;
    let rows = render_rail(&[dead, attention], "none", 5, 40);
    assert!(rows[1].contains("[dead]"));
    assert!(rows[2].contains("[!]"));
}
