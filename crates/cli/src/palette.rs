// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup palette probe (`HARNESS_TERM_FG`/`_BG`): queries the
//! terminal's foreground/background color via OSC 10/11 with
//! a hard timeout (default 80ms). Uses the termios `VMIN`/`VTIME`
//! read-timeout mechanism rather than a background thread, so a timed-out
//! probe never races the orchestrator's later stdin reader for whatever
//! bytes arrive after the deadline — grounded in the teacher's direct
//! `nix::sys::termios` use in `attach.rs`.

use std::io::{Read, Write};
use std::os::fd::BorrowedFd;
use std::time::Duration;

use nix::sys::termios;

use crate::terminal::RawModeGuard;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaletteProbe {
    pub foreground_hex: Option<String>,
    pub background_hex: Option<String>,
}

/// Probe the terminal's colors, or return the configured overrides
/// unprobed if either is set.
pub fn probe_palette(
    raw_guard: &RawModeGuard,
    term_fg_override: Option<&str>,
    term_bg_override: Option<&str>,
    timeout: Duration,
) -> PaletteProbe {
    if term_fg_override.is_some() || term_bg_override.is_some() {
        return PaletteProbe {
            foreground_hex: term_fg_override.map(str::to_owned),
            background_hex: term_bg_override.map(str::to_owned),
        };
    }

    let borrowed = borrow(raw_guard.fd());
    let Ok(original) = termios::tcgetattr(borrowed) else { return PaletteProbe::default() };
    let mut timed = original.clone();
    timed.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 0;
    // VTIME ticks in deciseconds; round up so sub-100ms timeouts still
    // wait at least one tick instead of returning immediately.
    let deciseconds = (timeout.as_millis().div_ceil(100)).clamp(1, 255) as u8;
    timed.control_chars[termios::SpecialCharacterIndices::VTIME as usize] = deciseconds;
    if termios::tcsetattr(borrowed, termios::SetArg::TCSANOW, &timed).is_err() {
        return PaletteProbe::default();
    }

    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "\x1b]10;?\x07\x1b]11;?\x07");
    let _ = stdout.flush();

    let mut buf = [0u8; 256];
    let mut collected = Vec::new();
    let mut stdin = std::io::stdin();
    if let Ok(n) = stdin.read(&mut buf) {
        collected.extend_from_slice(&buf[..n]);
    }

    let _ = termios::tcsetattr(borrowed, termios::SetArg::TCSANOW, &original);

    let text = String::from_utf8_lossy(&collected);
    PaletteProbe { foreground_hex: extract_rgb(&text, "10"), background_hex: extract_rgb(&text, "11") }
}

fn borrow(fd: i32) -> BorrowedFd<'static> {
    // SAFETY: `fd` is the stdin descriptor the caller's `RawModeGuard`
    // owns for the lifetime of the process.
    #[allow(unsafe_code)]
    unsafe {
        BorrowedFd::borrow_raw(fd)
    }
}

fn extract_rgb(text: &str, code: &str) -> Option<String> {
    let marker = format!("]{code};rgb:");
    let start = text.find(&marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find(['\x07', '\x1b']).unwrap_or(rest.len());
    let mut channels = rest[..end].split('/');
    let r = parse_channel(channels.next()?)?;
    let g = parse_channel(channels.next()?)?;
    let b = parse_channel(channels.next()?)?;
    Some(format!("#{r:02x}{g:02x}{b:02x}"))
}

fn parse_channel(s: &str) -> Option<u8> {
    let value = u32::from_str_radix(s, 16).ok()?;
    let max = (1u32 << (4 * s.len().min(8))).saturating_sub(1).max(1);
    Some(((value * 255) / max) as u8)
}

#[cfg(test)]
#[path = "palette_tests.rs"]
mod tests;
