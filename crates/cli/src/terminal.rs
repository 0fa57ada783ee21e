// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw-mode terminal control, ported from the teacher's `attach.rs`
//! (`RawModeGuard`, `terminal_size`): the narrow `unsafe` surface the
//! workspace otherwise denies is confined to this module and scoped to
//! the two ioctls a terminal client genuinely needs.

use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd};

use nix::sys::termios;

/// RAII guard that restores the original terminal attributes on drop.
pub struct RawModeGuard {
    fd: i32,
    original: termios::Termios,
}

impl RawModeGuard {
    pub fn enter() -> anyhow::Result<Self> {
        let fd = std::io::stdin().as_raw_fd();
        let borrowed = borrow_fd(fd);
        let original = termios::tcgetattr(borrowed)?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(borrowed, termios::SetArg::TCSAFLUSH, &raw)?;
        Ok(Self { fd, original })
    }

    pub fn raw_termios(&self) -> nix::libc::termios {
        self.original.clone().into()
    }

    pub fn fd(&self) -> i32 {
        self.fd
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let borrowed = borrow_fd(self.fd);
        let _ = termios::tcsetattr(borrowed, termios::SetArg::TCSAFLUSH, &self.original);
    }
}

fn borrow_fd(fd: i32) -> BorrowedFd<'static> {
    // SAFETY: stdin fd 0 is valid for the lifetime of the process.
    #[allow(unsafe_code)]
    unsafe {
        BorrowedFd::borrow_raw(fd)
    }
}

/// Query the controlling terminal's size via `TIOCGWINSZ`.
pub fn terminal_size() -> Option<(u16, u16)> {
    let fd = std::io::stdout().as_raw_fd();
    let mut ws = nix::libc::winsize { ws_row: 0, ws_col: 0, ws_xpixel: 0, ws_ypixel: 0 };
    // SAFETY: TIOCGWINSZ ioctl reads terminal size into a winsize struct;
    // fd is stdout (valid for the process lifetime) and ws is a properly
    // initialized stack value with the layout this ioctl expects.
    #[allow(unsafe_code)]
    let ret = unsafe { nix::libc::ioctl(fd, nix::libc::TIOCGWINSZ, &mut ws) };
    if ret == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some((ws.ws_col, ws.ws_row))
    } else {
        None
    }
}

/// Restore cursor visibility, SGR attributes, and disable mouse/bracketed
/// paste/focus-tracking modes. Best-effort, written directly to `stdout`.
pub fn reset_terminal_modes(stdout: &mut std::io::Stdout) {
    let _ = write!(
        stdout,
        "\x1b[?1000l\x1b[?1002l\x1b[?1003l\x1b[?1006l\x1b[?2004l\x1b[?1004l\x1b[?25h\x1b[0m"
    );
    let _ = stdout.flush();
}

/// Enable the mux's input modes: SGR mouse tracking, bracketed paste,
/// focus tracking, hidden cursor (the renderer draws its own).
pub fn enable_terminal_modes(stdout: &mut std::io::Stdout) {
    let _ = write!(stdout, "\x1b[?1000h\x1b[?1002h\x1b[?1006h\x1b[?2004h\x1b[?1004h");
    let _ = stdout.flush();
}
