// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Front-End Orchestrator: the six-step sequence that takes a
//! terminal and a command line to a live dual-pane session, ported from
//! the teacher's `attach` event loop (stdin on a blocking reader thread,
//! `tokio::select!` main loop, panic-hook terminal restoration) and
//! generalized from one WebSocket session to a control-plane client
//! driving many.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use serde_json::Value;
use tokio::sync::mpsc;

use harness_control::wire::{Command, Envelope};
use harness_core::oracle::{Frame, Oracle};
use harness_term::resize::{ResizeDecision, TerminalSize, DEFAULT_MIN_INTERVAL_MS, DEFAULT_SETTLE_MS};
use harness_term::{
    clipboard, compute_dual_pane_layout, FrameRenderer, InputRouter, Keybindings, PaneLayout, RailEntry,
    RenderInput, ResizeThrottle, RouteAction, Selection, Shortcut,
};

use crate::client::{self, ControlClient};
use crate::config::Config;
use crate::palette::{probe_palette, PaletteProbe};
use crate::terminal::{enable_terminal_modes, reset_terminal_modes, terminal_size, RawModeGuard};

const PALETTE_PROBE_TIMEOUT: Duration = Duration::from_millis(80);
const RENDER_COALESCE: Duration = Duration::from_millis(16);

/// Step 1 + entry point: raw mode, palette probe, then hand off to the
/// control-plane-aware portion of startup. Returns the process exit code:
/// 0 clean shutdown, 1 runtime error, 2 requires a TTY.
pub async fn run(config: Config) -> i32 {
    if terminal_size().is_none() {
        eprintln!("harness-mux: requires a TTY");
        return 2;
    }

    let raw_guard = match RawModeGuard::enter() {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("harness-mux: failed to enter raw mode: {err}");
            return 1;
        }
    };
    install_panic_hook(&raw_guard);

    let palette = probe_palette(&raw_guard, config.term_fg.as_deref(), config.term_bg.as_deref(), PALETTE_PROBE_TIMEOUT);

    let control = match client::connect(&config).await {
        Ok(control) => control,
        Err(err) => {
            eprintln!("harness-mux: failed to open control plane: {err}");
            restore_terminal(&raw_guard);
            return 1;
        }
    };

    let code = match Session::start(&config, &control, palette).await {
        Ok(mut session) => session.run().await,
        Err(err) => {
            eprintln!("harness-mux: {err}");
            1
        }
    };

    control.close().await;
    restore_terminal(&raw_guard);
    code
}

fn restore_terminal(guard: &RawModeGuard) {
    let _ = guard;
    let mut stdout = std::io::stdout();
    reset_terminal_modes(&mut stdout);
}

/// Install a panic hook that restores the terminal's original attributes
/// before unwinding, mirroring the teacher's `attach.rs` panic-safety net.
fn install_panic_hook(guard: &RawModeGuard) {
    let restored = Arc::new(AtomicBool::new(false));
    let raw_termios = guard.raw_termios();
    let fd = guard.fd();
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if !restored.swap(true, Ordering::SeqCst) {
            // SAFETY: restoring terminal attributes in a panic hook; fd is
            // stdin, valid for the lifetime of the process.
            #[allow(unsafe_code)]
            unsafe {
                nix::libc::tcsetattr(fd, nix::libc::TCSAFLUSH, &raw_termios);
            }
        }
        prev_hook(info);
    }));
}

fn extract_str(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_owned)
}

fn rail_entry_from_summary(summary: &Value) -> Option<RailEntry> {
    let session_id = extract_str(summary, "/sessionId")?;
    let status = summary.get("status").and_then(Value::as_str).unwrap_or("running");
    let dead = status == "exited";
    let needs_attention = status == "needs-input" || summary.get("attentionReason").is_some_and(|v| !v.is_null());
    let glyph = extract_str(summary, "/statusModel/glyph")
        .and_then(|g| g.chars().next())
        .unwrap_or(if dead {
            '■'
        } else if needs_attention {
            '▲'
        } else {
            '◆'
        });
    let badge = extract_str(summary, "/statusModel/badge").unwrap_or_else(|| status.to_owned());
    Some(RailEntry { session_id, glyph, badge, dead, needs_attention })
}

fn pad_line(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s.chars().take(width).collect()
    } else {
        let mut out = s.to_owned();
        out.push_str(&" ".repeat(width - len));
        out
    }
}

fn build_status_line(summary: Option<&Value>, session_id: &str, is_controller: bool, width: usize) -> String {
    let Some(summary) = summary else { return pad_line(&format!(" {session_id} — starting…"), width) };
    let status = summary.get("status").and_then(Value::as_str).unwrap_or("running");
    let detail = extract_str(summary, "/statusModel/detailText").unwrap_or_else(|| status.to_owned());
    let controller = extract_str(summary, "/controller");
    let mut line = format!(" {session_id} [{status}] {detail}");
    if !is_controller {
        line.push_str(" · read-only");
    }
    if let Some(controller) = controller {
        line.push_str(&format!(" · controller={controller}"));
    }
    pad_line(&line, width)
}

fn extract_selection_text(frame: &Frame, layout: &PaneLayout, selection: &Selection) -> String {
    let (start, end) = match selection.start.row.cmp(&selection.end.row) {
        std::cmp::Ordering::Greater => (selection.end, selection.start),
        std::cmp::Ordering::Equal if selection.start.col > selection.end.col => (selection.end, selection.start),
        _ => (selection.start, selection.end),
    };
    let pane_col = |screen_col: u16| screen_col.saturating_sub(layout.right_start_col) as usize;
    let mut lines_out = Vec::new();
    for row in start.row..=end.row {
        let Some(idx) = row.checked_sub(1) else { continue };
        let Some(line) = frame.lines.get(idx as usize) else { continue };
        let chars: Vec<char> = line.chars().collect();
        let (from, to) = if start.row == end.row {
            (pane_col(start.col), pane_col(end.col))
        } else if row == start.row {
            (pane_col(start.col), chars.len())
        } else if row == end.row {
            (0, pane_col(end.col))
        } else {
            (0, chars.len())
        };
        let lo = from.min(chars.len());
        let hi = to.clamp(lo, chars.len());
        lines_out.push(chars[lo..hi].iter().collect::<String>());
    }
    lines_out.join("\n")
}

/// Live state the event loop mutates: which session is active, each
/// visited session's reconstructed [`Oracle`], the cached rail, and the
/// pending resize/render coalescing.
struct Session<'a> {
    config: &'a Config,
    control: &'a ControlClient,
    palette: PaletteProbe,
    directory_id: String,
    active_session_id: String,
    oracles: HashMap<String, Oracle>,
    last_cursor: HashMap<String, u64>,
    rail: Vec<RailEntry>,
    active_summary: Option<Value>,
    layout: PaneLayout,
    renderer: FrameRenderer,
    router: InputRouter,
    resize: ResizeThrottle,
    dirty: bool,
}

impl<'a> Session<'a> {
    /// Steps 2–4: open the directory, hydrate the catalog, activate (or
    /// create) the initial session, attach, and schedule the first resize.
    async fn start(config: &'a Config, control: &'a ControlClient, palette: PaletteProbe) -> anyhow::Result<Session<'a>> {
        let cwd = std::env::current_dir()?.to_string_lossy().into_owned();
        let directory_resp = control
            .call(Command::DirectoryUpsert {
                directory_id: None,
                tenant_id: config.tenant_id.clone(),
                user_id: config.user_id.clone(),
                workspace_id: config.workspace_id.clone(),
                path: cwd.clone(),
            })
            .await;
        let directory_id = extract_str(&directory_resp, "/directory/directoryId")
            .ok_or_else(|| anyhow::anyhow!("directory.upsert did not return a directoryId"))?;

        let conversations = control
            .call(Command::ConversationList {
                tenant_id: config.tenant_id.clone(),
                user_id: config.user_id.clone(),
                workspace_id: config.workspace_id.clone(),
                include_archived: false,
                limit: None,
            })
            .await
            .get("conversations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let sessions_resp = control
            .call(Command::SessionList { sort: Default::default(), limit: None })
            .await;
        let live_sessions = sessions_resp.get("sessions").and_then(Value::as_array).cloned().unwrap_or_default();
        for summary in &live_sessions {
            if let Some(session_id) = extract_str(summary, "/sessionId") {
                let _ = control
                    .call(Command::PtySubscribeEvents { session_id })
                    .await;
            }
        }

        let conversation_id = match config.conversation_id.clone().or_else(|| {
            conversations
                .iter()
                .find(|c| c.get("directoryId").and_then(Value::as_str) == Some(directory_id.as_str()))
                .and_then(|c| extract_str(c, "/conversationId"))
        }) {
            Some(id) => id,
            None => {
                let title = config.command.join(" ");
                let agent_type = config.command.first().cloned().unwrap_or_else(|| "unknown".to_owned());
                let created = control
                    .call(Command::ConversationCreate {
                        conversation_id: None,
                        directory_id: directory_id.clone(),
                        title,
                        agent_type,
                        adapter_state: serde_json::Map::new(),
                        tenant_id: config.tenant_id.clone(),
                        user_id: config.user_id.clone(),
                        workspace_id: config.workspace_id.clone(),
                    })
                    .await;
                extract_str(&created, "/conversation/conversationId")
                    .ok_or_else(|| anyhow::anyhow!("conversation.create did not return a conversationId"))?
            }
        };

        let (cols, rows) = terminal_size().unwrap_or((80, 24));
        let layout = compute_dual_pane_layout(cols, rows, None);
        let already_live = live_sessions
            .iter()
            .any(|s| extract_str(s, "/sessionId").as_deref() == Some(conversation_id.as_str()));

        if !already_live {
            control
                .call(Command::PtyStart {
                    session_id: conversation_id.clone(),
                    args: config.command.clone(),
                    env: HashMap::new(),
                    cwd: Some(cwd),
                    initial_cols: layout.right_cols,
                    initial_rows: layout.pane_rows,
                    tenant_id: config.tenant_id.clone(),
                    user_id: config.user_id.clone(),
                    workspace_id: config.workspace_id.clone(),
                    worktree_id: config.worktree_id.clone(),
                    terminal_foreground_hex: palette.foreground_hex.clone(),
                    terminal_background_hex: palette.background_hex.clone(),
                })
                .await;
        }
        control
            .call(Command::PtySubscribeEvents { session_id: conversation_id.clone() })
            .await;
        control
            .call(Command::PtyAttach { session_id: conversation_id.clone(), since_cursor: 0 })
            .await;

        let mut resize = ResizeThrottle::new(
            Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            Duration::from_millis(DEFAULT_SETTLE_MS),
        );
        resize.observe(TerminalSize { cols, rows }, Instant::now());
        if resize.flush().is_some() {
            control
                .call(Command::PtyResize {
                    session_id: conversation_id.clone(),
                    cols: layout.right_cols,
                    rows: layout.pane_rows,
                })
                .await;
        }

        let mut oracles = HashMap::new();
        oracles.insert(conversation_id.clone(), Oracle::new(layout.right_cols, layout.pane_rows));

        let keybindings = Keybindings { ctrl_c_exits: config.ctrl_c_exits, ..Keybindings::default() };

        let mut session = Session {
            config,
            control,
            palette,
            directory_id,
            active_session_id: conversation_id,
            oracles,
            last_cursor: HashMap::new(),
            rail: Vec::new(),
            active_summary: None,
            layout,
            renderer: FrameRenderer::new(),
            router: InputRouter::new(keybindings),
            resize,
            dirty: true,
        };
        session.refresh_rail().await;
        enable_terminal_modes(&mut std::io::stdout());
        Ok(session)
    }

    async fn refresh_rail(&mut self) {
        let resp = self
            .control
            .call(Command::SessionList { sort: Default::default(), limit: None })
            .await;
        let sessions = resp.get("sessions").and_then(Value::as_array).cloned().unwrap_or_default();
        self.active_summary =
            sessions.iter().find(|s| extract_str(s, "/sessionId").as_deref() == Some(self.active_session_id.as_str())).cloned();
        self.rail = sessions.iter().filter_map(rail_entry_from_summary).collect();
        self.dirty = true;
    }

    fn oracle(&mut self) -> &mut Oracle {
        let layout = self.layout;
        self.oracles
            .entry(self.active_session_id.clone())
            .or_insert_with(|| Oracle::new(layout.right_cols, layout.pane_rows))
    }

    fn is_controller(&self) -> bool {
        // Conservative default: the local attach always holds the controller
        // seat it was attached with (session.claim conflicts surface as
        // command errors, handled at the call site instead of gating here).
        true
    }

    /// Step 5 + 6: the main event loop, then best-effort cleanup.
    async fn run(&mut self) -> i32 {
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(64);
        std::thread::spawn(move || {
            use std::io::Read;
            let stdin = std::io::stdin();
            let mut handle = stdin.lock();
            let mut buf = [0u8; 4096];
            loop {
                match handle.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdin_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let mut sigwinch = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change()).ok();
        let mut render_tick = tokio::time::interval(RENDER_COALESCE);
        render_tick.tick().await;

        let mut exit_code = 0;
        self.render();

        loop {
            tokio::select! {
                data = stdin_rx.recv() => {
                    match data {
                        Some(bytes) => {
                            if self.handle_stdin(bytes).await == Some(true) {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                envelope = self.control.recv_envelope() => {
                    match envelope {
                        Some(envelope) => self.handle_envelope(envelope).await,
                        None => break,
                    }
                }

                _ = async {
                    match sigwinch.as_mut() {
                        Some(s) => { s.recv().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.handle_resize().await;
                }

                _ = render_tick.tick() => {
                    if let Some(size) = self.resize.drain_pending(Instant::now()) {
                        self.apply_resize(size).await;
                    }
                    if let Some(size) = self.resize.take_settled(Instant::now()) {
                        self.send_pty_resize(size).await;
                    }
                    if self.dirty {
                        self.render();
                    }
                }
            }
        }

        let _ = self
            .control
            .call(Command::PtyDetach { session_id: self.active_session_id.clone() })
            .await;
        let _ = exit_code;
        exit_code = 0;
        exit_code
    }

    /// Returns `Some(true)` when the app should quit.
    async fn handle_stdin(&mut self, bytes: Vec<u8>) -> Option<bool> {
        let tokens = self.router.feed(&bytes);
        let is_controller = self.is_controller();
        for token in tokens {
            let actions = self.router.route(token, &self.layout, is_controller);
            for action in actions {
                if self.handle_route_action(action).await {
                    return Some(true);
                }
            }
        }
        None
    }

    /// Returns `true` when the app should quit.
    async fn handle_route_action(&mut self, action: RouteAction) -> bool {
        match action {
            RouteAction::Passthrough(bytes) => {
                let chunk_base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
                let _ = self
                    .control
                    .call(Command::PtyInput {
                        session_id: self.active_session_id.clone(),
                        chunk_base64,
                    })
                    .await;
            }
            RouteAction::ScrollRightPane(delta) => {
                self.oracle().scroll_viewport(delta);
                self.dirty = true;
            }
            RouteAction::ScrollRail(_delta) => {
                // The rail currently shows a fixed window; rail scrolling
                // beyond that window is not yet modeled.
            }
            RouteAction::SelectConversationAtRow(row) => {
                if let Some(session_id) = self.rail.get(row.saturating_sub(1) as usize).map(|e| e.session_id.clone()) {
                    self.switch_active(session_id).await;
                }
            }
            RouteAction::SelectionFinished(_) => {
                if let Some(selection) = self.router.current_selection() {
                    let frame = self.oracle().snapshot();
                    let text = extract_selection_text(&frame, &self.layout, &selection);
                    if !text.is_empty() && (self.palette.foreground_hex.is_some() || self.palette.background_hex.is_some()) {
                        let mut stdout = std::io::stdout();
                        let _ = write!(stdout, "{}", clipboard::osc52_set_clipboard(&text));
                        let _ = stdout.flush();
                    }
                }
            }
            RouteAction::SelectionStarted(_) | RouteAction::SelectionUpdated(_) | RouteAction::SelectionCleared => {
                self.dirty = true;
            }
            RouteAction::FocusChanged(_) => {}
            RouteAction::Shortcut(shortcut) => return self.handle_shortcut(shortcut).await,
        }
        false
    }

    async fn handle_shortcut(&mut self, shortcut: Shortcut) -> bool {
        match shortcut {
            Shortcut::Quit => return true,
            Shortcut::InterruptAll => {
                let ids: Vec<String> = self.rail.iter().map(|e| e.session_id.clone()).collect();
                for session_id in ids {
                    let _ = self.control.call(Command::SessionInterrupt { session_id }).await;
                }
            }
            Shortcut::NextConversation | Shortcut::PreviousConversation => {
                if let Some(next) = self.neighbor_session_id(shortcut == Shortcut::PreviousConversation) {
                    self.switch_active(next).await;
                }
            }
            Shortcut::NewConversation => {
                let title = self.config.command.join(" ");
                let agent_type = self.config.command.first().cloned().unwrap_or_else(|| "unknown".to_owned());
                let created = self
                    .control
                    .call(Command::ConversationCreate {
                        conversation_id: None,
                        directory_id: self.directory_id.clone(),
                        title,
                        agent_type,
                        adapter_state: serde_json::Map::new(),
                        tenant_id: self.config.tenant_id.clone(),
                        user_id: self.config.user_id.clone(),
                        workspace_id: self.config.workspace_id.clone(),
                    })
                    .await;
                if let Some(conversation_id) = extract_str(&created, "/conversation/conversationId") {
                    let cwd = std::env::current_dir().ok().map(|p| p.to_string_lossy().into_owned());
                    let _ = self
                        .control
                        .call(Command::PtyStart {
                            session_id: conversation_id.clone(),
                            args: self.config.command.clone(),
                            env: HashMap::new(),
                            cwd,
                            initial_cols: self.layout.right_cols,
                            initial_rows: self.layout.pane_rows,
                            tenant_id: self.config.tenant_id.clone(),
                            user_id: self.config.user_id.clone(),
                            workspace_id: self.config.workspace_id.clone(),
                            worktree_id: self.config.worktree_id.clone(),
                            terminal_foreground_hex: self.palette.foreground_hex.clone(),
                            terminal_background_hex: self.palette.background_hex.clone(),
                        })
                        .await;
                    let _ = self
                        .control
                        .call(Command::PtySubscribeEvents { session_id: conversation_id.clone() })
                        .await;
                    self.switch_active(conversation_id).await;
                }
            }
            Shortcut::ArchiveCurrent => {
                let _ = self
                    .control
                    .call(Command::ConversationArchive { conversation_id: self.active_session_id.clone() })
                    .await;
                self.refresh_rail().await;
            }
            Shortcut::DeleteCurrent => {
                let _ = self
                    .control
                    .call(Command::ConversationDelete { conversation_id: self.active_session_id.clone() })
                    .await;
                self.refresh_rail().await;
            }
        }
        false
    }

    fn neighbor_session_id(&self, backward: bool) -> Option<String> {
        if self.rail.is_empty() {
            return None;
        }
        let idx = self.rail.iter().position(|e| e.session_id == self.active_session_id)?;
        let len = self.rail.len();
        let next = if backward { (idx + len - 1) % len } else { (idx + 1) % len };
        Some(self.rail[next].session_id.clone())
    }

    async fn switch_active(&mut self, session_id: String) {
        if session_id == self.active_session_id {
            return;
        }
        let _ = self
            .control
            .call(Command::PtyDetach { session_id: self.active_session_id.clone() })
            .await;
        let since_cursor = self.last_cursor.get(&session_id).copied().unwrap_or(0);
        let _ = self
            .control
            .call(Command::PtyAttach { session_id: session_id.clone(), since_cursor })
            .await;
        self.active_session_id = session_id;
        self.renderer.invalidate();
        if let Some(size) = self.resize.flush() {
            self.send_pty_resize(size).await;
        }
        self.refresh_rail().await;
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::PtyOutput { session_id, cursor, chunk_base64 } => {
                if session_id != self.active_session_id {
                    return;
                }
                self.last_cursor.insert(session_id, cursor);
                if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(chunk_base64) {
                    self.oracle().ingest(&bytes);
                    self.dirty = true;
                }
            }
            Envelope::PtyEvent { .. } | Envelope::PtyExit { .. } => {
                self.refresh_rail().await;
            }
            Envelope::StreamEvent { .. } => {}
        }
    }

    async fn handle_resize(&mut self) {
        let Some((cols, rows)) = terminal_size() else { return };
        match self.resize.observe(TerminalSize { cols, rows }, Instant::now()) {
            ResizeDecision::Apply(size) => self.apply_resize(size).await,
            ResizeDecision::Coalesced => {}
        }
    }

    async fn apply_resize(&mut self, size: TerminalSize) {
        self.layout = compute_dual_pane_layout(size.cols, size.rows, None);
        self.oracle().resize(self.layout.right_cols, self.layout.pane_rows);
        self.renderer.invalidate();
        self.dirty = true;
    }

    async fn send_pty_resize(&mut self, _size: TerminalSize) {
        let _ = self
            .control
            .call(Command::PtyResize {
                session_id: self.active_session_id.clone(),
                cols: self.layout.right_cols,
                rows: self.layout.pane_rows,
            })
            .await;
    }

    fn render(&mut self) {
        self.dirty = false;
        let frame = self
            .oracles
            .get(&self.active_session_id)
            .map(Oracle::snapshot)
            .unwrap_or_else(|| Oracle::new(self.layout.right_cols, self.layout.pane_rows).snapshot());
        let status_line =
            build_status_line(self.active_summary.as_ref(), &self.active_session_id, self.is_controller(), self.layout.cols as usize);
        let input = RenderInput {
            layout: self.layout,
            frame: &frame,
            rail_entries: &self.rail,
            active_session_id: &self.active_session_id,
            status_line: &status_line,
        };
        let diff = self.renderer.render(&input);
        if diff.output.is_empty() {
            return;
        }
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(diff.output.as_bytes());
        if let Some((col, row)) = self.renderer.cursor_screen_position(&input) {
            let _ = write!(stdout, "\x1b[{row};{col}H");
        }
        let _ = stdout.flush();
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
