// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn narrow_ascii_is_width_one() {
    assert_eq!(measure_display_width('a'), 1);
}

#[test]
fn wide_cjk_is_width_two() {
    assert_eq!(measure_display_width('漢'), 2);
}

#[test]
fn wide_glyph_emits_continuation_cell() {
    let cells = to_rich_cells("漢a");
    assert_eq!(cells.len(), 3);
    assert_eq!(cells[0].glyph, '漢');
    assert!(!cells[0].continued);
    assert!(cells[1].continued);
    assert_eq!(cells[2].glyph, 'a');
    assert!(!cells[2].continued);
}

#[test]
fn no_continuation_cell_precedes_a_non_wide_glyph() {
    let cells = to_rich_cells("ab漢");
    for (i, cell) in cells.iter().enumerate() {
        if cell.continued {
            assert!(i > 0 && measure_display_width(cells[i - 1].glyph) == 2);
        }
    }
}
