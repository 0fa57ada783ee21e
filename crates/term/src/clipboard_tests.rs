// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn wraps_base64_payload_in_osc52() {
    let seq = osc52_set_clipboard("hi");
    assert!(seq.starts_with("\x1b]52;c;"));
    assert!(seq.ends_with('\x07'));
    let b64 = &seq["\x1b]52;c;".len()..seq.len() - 1];
    let decoded = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
    assert_eq!(decoded, b"hi");
}
