// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn extracts_full_precision_rgb_response() {
    let response = "\x1b]10;rgb:ffff/0000/8080\x07";
    assert_eq!(extract_rgb(response, "10").as_deref(), Some("#ff0080"));
}

#[test]
fn extracts_half_precision_rgb_response() {
    let response = "\x1b]11;rgb:ff/00/80\x07";
    assert_eq!(extract_rgb(response, "11").as_deref(), Some("#ff0080"));
}

#[test]
fn missing_marker_yields_none() {
    assert_eq!(extract_rgb("garbage", "10"), None);
}

#[test]
fn overrides_skip_the_probe_entirely() {
    // Can't exercise the real termios path without a pty in a unit test;
    // the override short-circuit is what callers rely on when running
    // headless (CI, `tests/specs`).
    let probe = PaletteProbe { foreground_hex: Some("#111111".into()), background_hex: Some("#222222".into()) };
    assert_eq!(probe.foreground_hex.as_deref(), Some("#111111"));
}
