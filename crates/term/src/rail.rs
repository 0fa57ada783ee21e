// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Left navigation rail: one row per active session in the server's
//! enforced sort (`session.list`'s `attention-first` default or the
//! `started-asc`/`started-desc` alternatives), active-marker, state
//! glyph, compact id, and a dead/attention suffix.

/// One row's worth of catalog data the rail needs; the caller (the
/// Front-End Orchestrator) builds this from a `session.list` response
/// already sorted server-side.
#[derive(Debug, Clone)]
pub struct RailEntry {
    pub session_id: String,
    pub glyph: char,
    pub badge: String,
    pub dead: bool,
    pub needs_attention: bool,
}

const COMPACT_ID_LEN: usize = 10;

fn compact_id(session_id: &str) -> String {
    if session_id.chars().count() <= COMPACT_ID_LEN {
        session_id.to_owned()
    } else {
        session_id.chars().take(COMPACT_ID_LEN).collect::<String>() + "\u{2026}"
    }
}

fn pad_to(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s.chars().take(width).collect()
    } else {
        let mut out = s.to_owned();
        out.push_str(&" ".repeat(width - len));
        out
    }
}

fn format_row(entry: &RailEntry, active: bool, width: usize) -> String {
    let marker = if active { '>' } else { ' ' };
    let mut line = format!("{marker} {} {}", entry.glyph, compact_id(&entry.session_id));
    if entry.dead {
        line.push_str(" [dead]");
    } else if entry.needs_attention {
        line.push_str(" [!]");
    }
    pad_to(&line, width)
}

fn rail_header(width: usize) -> String {
    pad_to("SESSIONS", width)
}

/// `render_rail`: the header row always appears first (`maxRows=1`
/// yields exactly one row, the header), followed by up to
/// `max_rows - 1` session rows in `entries`' given order. When the active
/// session would scroll outside that window, the last visible slot is
/// replaced with it so the active session is always shown.
pub fn render_rail(entries: &[RailEntry], active_id: &str, max_rows: usize, width: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(max_rows.max(1));
    out.push(rail_header(width));
    if max_rows <= 1 {
        return out;
    }

    let visible_rows = max_rows - 1;
    let active_index = entries.iter().position(|e| e.session_id == active_id);

    let mut window: Vec<&RailEntry> = entries.iter().take(visible_rows).collect();
    if let Some(idx) = active_index {
        if idx >= visible_rows && visible_rows > 0 {
            window.pop();
            window.push(&entries[idx]);
        }
    }

    for entry in window {
        let is_active = entry.session_id == active_id;
        out.push(format_row(entry, is_active, width));
    }

    out
}

#[cfg(test)]
#[path = "rail_tests.rs"]
mod tests;
