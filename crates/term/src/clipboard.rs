// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OSC 52 clipboard writes: `ESC ] 52 ; c ; <base64> BEL`, the same
//! raw-terminal-write idiom the teacher's `attach.rs` already uses for
//! its own escape sequences, emitted only when the terminal has
//! advertised clipboard support.

use base64::Engine;

/// Build the OSC 52 sequence that sets the system clipboard (`c`) to
/// `text`.
pub fn osc52_set_clipboard(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x07")
}

#[cfg(test)]
#[path = "clipboard_tests.rs"]
mod tests;
