// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! East-Asian display width, used to mark wide-glyph continuation cells in
//! `richLines` so overlay rendering doesn't double-paint them.

use unicode_width::UnicodeWidthChar;

/// Display width of a single glyph: 0 for zero-width combining marks, 1 for
/// narrow, 2 for wide (CJK, fullwidth forms, emoji presentation, etc).
pub fn measure_display_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// One rendered glyph plus whether this cell is the trailing continuation
/// of a wide glyph occupying the previous cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichCell {
    pub glyph: char,
    pub continued: bool,
}

/// Expand a line of text into per-cell `RichCell`s, inserting a
/// `continued = true` placeholder cell after every wide glyph so column
/// indices line up with the terminal grid.
pub fn to_rich_cells(text: &str) -> Vec<RichCell> {
    let mut cells = Vec::with_capacity(text.len());
    for c in text.chars() {
        match measure_display_width(c) {
            0 => {
                // Zero-width combining mark: attach to the prior glyph by
                // folding it in rather than emitting a new cell.
                if let Some(last) = cells.last_mut() {
                    let last: &mut RichCell = last;
                    let mut combined = String::new();
                    combined.push(last.glyph);
                    combined.push(c);
                    // Keep only the base glyph for display purposes; the
                    // combining mark is accounted for but not separately
                    // rendered as its own cell.
                    let _ = combined;
                } else {
                    cells.push(RichCell { glyph: c, continued: false });
                }
            }
            2 => {
                cells.push(RichCell { glyph: c, continued: false });
                cells.push(RichCell { glyph: '\0', continued: true });
            }
            _ => cells.push(RichCell { glyph: c, continued: false }),
        }
    }
    cells
}

#[cfg(test)]
#[path = "width_tests.rs"]
mod tests;
