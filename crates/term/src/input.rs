// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input Router: parses raw stdin into `passthrough`/`mouse` tokens,
//! keeping partial ANSI sequences in a `remainder` buffer across chunks
//! (grounded in the teacher's `Screen::feed` cross-boundary tail-buffering
//! idiom, generalized from alt-screen detection to SGR mouse + focus
//! sequences), then routes each token to a pane, a selection, or a global
//! shortcut.

use crate::layout::{classify_pane_at, PaneLayout, PaneRegion};

/// One parsed unit of raw stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Passthrough(Vec<u8>),
    Mouse(MouseEvent),
    FocusIn,
    FocusOut,
}

/// An SGR mouse report: `ESC [ < Cb ; Cx ; Cy (M|m)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub code: u8,
    pub col: u16,
    pub row: u16,
    /// `true` for the `m` terminator (button release), `false` for `M`
    /// (press or motion).
    pub final_: bool,
    /// Whether the motion bit (0x20) is set on `code` — a drag/move
    /// report rather than a discrete click.
    pub sequence: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MousePhase {
    Press,
    Drag,
    Release,
}

impl MouseEvent {
    pub fn button(&self) -> MouseButton {
        if self.code & 0x40 != 0 {
            return if self.code & 0x01 == 0 { MouseButton::WheelUp } else { MouseButton::WheelDown };
        }
        match self.code & 0x03 {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Other(self.code),
        }
    }

    pub fn phase(&self) -> MousePhase {
        if self.final_ {
            MousePhase::Release
        } else if self.sequence {
            MousePhase::Drag
        } else {
            MousePhase::Press
        }
    }

    pub fn shift(&self) -> bool {
        self.code & 0x04 != 0
    }

    pub fn alt(&self) -> bool {
        self.code & 0x08 != 0
    }

    pub fn ctrl(&self) -> bool {
        self.code & 0x10 != 0
    }
}

/// Longest prefix we need to hold back before we can tell whether an
/// escape sequence is complete: `ESC [ < Cb ; Cx ; Cy M` easily exceeds
/// typical terminal coordinates, but we only ever stash from the `ESC`
/// itself, so there's no fixed cap — `feed` stashes whatever's left.
fn parse_sgr_mouse(seq: &[u8]) -> Option<MouseEvent> {
    // seq is exactly `ESC [ < ... (M|m)`.
    let body = &seq[3..seq.len() - 1];
    let terminator = seq[seq.len() - 1];
    let text = std::str::from_utf8(body).ok()?;
    let mut parts = text.split(';');
    let cb: i64 = parts.next()?.parse().ok()?;
    let cx: i64 = parts.next()?.parse().ok()?;
    let cy: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(MouseEvent {
        code: cb.clamp(0, u8::MAX as i64) as u8,
        col: cx.max(1) as u16,
        row: cy.max(1) as u16,
        final_: terminator == b'm',
        sequence: cb & 0x20 != 0,
    })
}

/// Configurable global shortcut bindings. The commonly bound set —
/// `ctrl+t`/`ctrl+j`/`ctrl+k`/`ctrl+]`/`ctrl+c` — covers five of the seven
/// named actions; archive/delete have no default binding (see
/// `DESIGN.md`).
#[derive(Debug, Clone)]
pub struct Keybindings {
    pub new_conversation: Vec<u8>,
    pub next_conversation: Vec<u8>,
    pub previous_conversation: Vec<u8>,
    pub archive_current: Option<Vec<u8>>,
    pub delete_current: Option<Vec<u8>>,
    pub quit: Vec<u8>,
    pub interrupt_all: Vec<u8>,
    /// `HARNESS_MUX_CTRL_C_EXITS`: when true, the
    /// `interrupt_all` binding (`ctrl+c` by default) quits the app
    /// instead of interrupting every session.
    pub ctrl_c_exits: bool,
}

impl Default for Keybindings {
    fn default() -> Self {
        Self {
            new_conversation: vec![0x14], // ctrl+t
            next_conversation: vec![0x0a], // ctrl+j
            previous_conversation: vec![0x0b], // ctrl+k
            archive_current: None,
            delete_current: None,
            quit: vec![0x1d],       // ctrl+]
            interrupt_all: vec![0x03], // ctrl+c
            ctrl_c_exits: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    NewConversation,
    NextConversation,
    PreviousConversation,
    ArchiveCurrent,
    DeleteCurrent,
    Quit,
    InterruptAll,
}

impl Keybindings {
    fn match_shortcut(&self, bytes: &[u8]) -> Option<Shortcut> {
        if bytes == self.new_conversation.as_slice() {
            return Some(Shortcut::NewConversation);
        }
        if bytes == self.next_conversation.as_slice() {
            return Some(Shortcut::NextConversation);
        }
        if bytes == self.previous_conversation.as_slice() {
            return Some(Shortcut::PreviousConversation);
        }
        if bytes == self.quit.as_slice() {
            return Some(Shortcut::Quit);
        }
        if bytes == self.interrupt_all.as_slice() {
            return Some(if self.ctrl_c_exits { Shortcut::Quit } else { Shortcut::InterruptAll });
        }
        if let Some(binding) = &self.archive_current {
            if bytes == binding.as_slice() {
                return Some(Shortcut::ArchiveCurrent);
            }
        }
        if let Some(binding) = &self.delete_current {
            if bytes == binding.as_slice() {
                return Some(Shortcut::DeleteCurrent);
            }
        }
        None
    }
}

enum RoutedInput {
    Shortcut(Shortcut),
    Keystroke(Vec<u8>),
}

/// Which pane region a classified mouse coordinate landed in, re-exported
/// for callers that only need routing, not layout math directly.
pub type ClassifiedPane = PaneRegion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionAnchor {
    pub col: u16,
    pub row: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: SelectionAnchor,
    pub end: SelectionAnchor,
    pub active: bool,
}

/// One routed effect the Front-End Orchestrator should carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    ScrollRightPane(i64),
    ScrollRail(i64),
    SelectConversationAtRow(u16),
    SelectionStarted(SelectionAnchor),
    SelectionUpdated(SelectionAnchor),
    SelectionFinished(SelectionAnchor),
    SelectionCleared,
    Passthrough(Vec<u8>),
    Shortcut(Shortcut),
    FocusChanged(bool),
}

/// Parses raw stdin into tokens and routes each one to a pane, a
/// selection, or a global shortcut.
pub struct InputRouter {
    remainder: Vec<u8>,
    keybindings: Keybindings,
    selection: Option<Selection>,
}

impl InputRouter {
    pub fn new(keybindings: Keybindings) -> Self {
        Self { remainder: Vec::new(), keybindings, selection: None }
    }

    /// Parse one chunk of raw stdin into tokens, carrying any incomplete
    /// trailing escape sequence into the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Token> {
        let owned: Vec<u8>;
        let buf: &[u8] = if self.remainder.is_empty() {
            data
        } else {
            owned = [self.remainder.as_slice(), data].concat();
            &owned
        };

        let mut tokens = Vec::new();
        let mut passthrough_start = 0usize;
        let mut i = 0usize;
        let len = buf.len();

        while i < len {
            if buf[i] != 0x1b {
                i += 1;
                continue;
            }
            if i + 1 >= len {
                push_passthrough(&mut tokens, &buf[passthrough_start..i]);
                self.remainder = buf[i..].to_vec();
                return tokens;
            }
            if buf[i + 1] != b'[' {
                i += 1;
                continue;
            }
            if i + 2 >= len {
                push_passthrough(&mut tokens, &buf[passthrough_start..i]);
                self.remainder = buf[i..].to_vec();
                return tokens;
            }
            match buf[i + 2] {
                b'I' => {
                    push_passthrough(&mut tokens, &buf[passthrough_start..i]);
                    tokens.push(Token::FocusIn);
                    i += 3;
                    passthrough_start = i;
                }
                b'O' => {
                    push_passthrough(&mut tokens, &buf[passthrough_start..i]);
                    tokens.push(Token::FocusOut);
                    i += 3;
                    passthrough_start = i;
                }
                b'<' => match buf[i + 3..].iter().position(|&b| b == b'M' || b == b'm') {
                    None => {
                        push_passthrough(&mut tokens, &buf[passthrough_start..i]);
                        self.remainder = buf[i..].to_vec();
                        return tokens;
                    }
                    Some(rel_end) => {
                        let seq_end = i + 3 + rel_end + 1;
                        match parse_sgr_mouse(&buf[i..seq_end]) {
                            Some(event) => {
                                push_passthrough(&mut tokens, &buf[passthrough_start..i]);
                                tokens.push(Token::Mouse(event));
                                i = seq_end;
                                passthrough_start = i;
                            }
                            // Malformed SGR body: falls back to passthrough,
                            // left in the run to flush with the rest.
                            None => i = seq_end,
                        }
                    }
                },
                _ => i += 1,
            }
        }

        push_passthrough(&mut tokens, &buf[passthrough_start..len]);
        self.remainder.clear();
        tokens
    }

    /// Route one parsed token. `is_controller` gates whether passthrough
    /// keystrokes are forwarded, dropped silently when the local process
    /// doesn't control the active session.
    pub fn route(&mut self, token: Token, layout: &PaneLayout, is_controller: bool) -> Vec<RouteAction> {
        match token {
            Token::FocusIn => vec![RouteAction::FocusChanged(true)],
            Token::FocusOut => vec![RouteAction::FocusChanged(false)],
            Token::Mouse(event) => self.route_mouse(event, layout),
            Token::Passthrough(bytes) => self.route_passthrough(bytes, is_controller),
        }
    }

    pub fn current_selection(&self) -> Option<Selection> {
        self.selection
    }

    fn split_shortcuts(&self, data: &[u8]) -> Vec<RoutedInput> {
        let mut out = Vec::new();
        let mut run_start = 0usize;
        for (i, &b) in data.iter().enumerate() {
            if let Some(shortcut) = self.keybindings.match_shortcut(&[b]) {
                if i > run_start {
                    out.push(RoutedInput::Keystroke(data[run_start..i].to_vec()));
                }
                out.push(RoutedInput::Shortcut(shortcut));
                run_start = i + 1;
            }
        }
        if run_start < data.len() {
            out.push(RoutedInput::Keystroke(data[run_start..].to_vec()));
        }
        out
    }

    fn route_passthrough(&mut self, bytes: Vec<u8>, is_controller: bool) -> Vec<RouteAction> {
        let mut actions = Vec::new();
        // Any non-wheel input clears a pending selection first.
        if self.selection.take().is_some() {
            actions.push(RouteAction::SelectionCleared);
        }
        for piece in self.split_shortcuts(&bytes) {
            match piece {
                RoutedInput::Shortcut(shortcut) => actions.push(RouteAction::Shortcut(shortcut)),
                RoutedInput::Keystroke(keys) if is_controller => actions.push(RouteAction::Passthrough(keys)),
                RoutedInput::Keystroke(_) => {}
            }
        }
        actions
    }

    fn route_mouse(&mut self, event: MouseEvent, layout: &PaneLayout) -> Vec<RouteAction> {
        let pane = classify_pane_at(layout, event.col, event.row);
        let button = event.button();

        if matches!(button, MouseButton::WheelUp | MouseButton::WheelDown) {
            let delta: i64 = if button == MouseButton::WheelUp { -3 } else { 3 };
            return match pane {
                PaneRegion::Right => vec![RouteAction::ScrollRightPane(delta)],
                PaneRegion::Left => vec![RouteAction::ScrollRail(delta)],
                _ => vec![],
            };
        }

        if event.alt() {
            return if self.selection.take().is_some() { vec![RouteAction::SelectionCleared] } else { vec![] };
        }

        // Any non-wheel input clears a pending selection first, unless
        // it's the event that's continuing that very selection.
        let continuing_drag = matches!(pane, PaneRegion::Right)
            && matches!(event.phase(), MousePhase::Drag | MousePhase::Release)
            && self.selection.is_some();

        let mut actions = Vec::new();
        if !continuing_drag {
            if let Some(_cleared) = self.selection.take() {
                actions.push(RouteAction::SelectionCleared);
            }
        }

        match (pane, event.phase(), button) {
            (PaneRegion::Left, MousePhase::Press, MouseButton::Left) => {
                actions.push(RouteAction::SelectConversationAtRow(event.row));
            }
            (PaneRegion::Right, MousePhase::Press, MouseButton::Left) => {
                let anchor = SelectionAnchor { col: event.col, row: event.row };
                self.selection = Some(Selection { start: anchor, end: anchor, active: true });
                actions.push(RouteAction::SelectionStarted(anchor));
            }
            (PaneRegion::Right, MousePhase::Drag, _) if continuing_drag => {
                let anchor = SelectionAnchor { col: event.col, row: event.row };
                if let Some(sel) = self.selection.as_mut() {
                    sel.end = anchor;
                }
                actions.push(RouteAction::SelectionUpdated(anchor));
            }
            (_, MousePhase::Release, _) if continuing_drag => {
                let anchor = SelectionAnchor { col: event.col, row: event.row };
                if let Some(sel) = self.selection.as_mut() {
                    sel.end = anchor;
                    sel.active = false;
                }
                actions.push(RouteAction::SelectionFinished(anchor));
            }
            _ => {}
        }

        actions
    }
}

fn push_passthrough(tokens: &mut Vec<Token>, bytes: &[u8]) {
    if !bytes.is_empty() {
        tokens.push(Token::Passthrough(bytes.to_vec()));
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
