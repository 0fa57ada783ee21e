// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harness-term`: the Dual-Pane Renderer and Input Router.
//!
//! [`layout`] computes pane geometry from a raw terminal size. [`rail`]
//! renders the left navigation rail from a session catalog. [`diff`]
//! produces the minimal row-level repaint between two rendered frames.
//! [`render`] composes layout + an Oracle [`harness_core::Frame`] + rail +
//! status row into one throttled, diffed paint, generalizing the
//! teacher's single reserved-statusline DECSTBM technique (`attach.rs`)
//! into a rail + right-pane + status-row triple layout. [`input`] parses
//! raw stdin into passthrough/mouse tokens and routes them to a pane,
//! selection, or a global shortcut, grounded in the teacher's ANSI
//! scanning idiom (`screen.rs`'s alt-screen detector) generalized to SGR
//! mouse sequences. [`clipboard`] emits the OSC 52 write.

pub mod clipboard;
pub mod diff;
pub mod input;
pub mod layout;
pub mod rail;
pub mod render;
pub mod resize;

pub use diff::{diff_rendered_rows, RowDiff};
pub use input::{
    ClassifiedPane, InputRouter, Keybindings, MouseButton, MouseEvent, MousePhase, RouteAction, Selection,
    SelectionAnchor, Shortcut, Token,
};
pub use layout::{classify_pane_at, compute_dual_pane_layout, PaneLayout, PaneRegion};
pub use rail::{render_rail, RailEntry};
pub use render::{FrameRenderer, RenderInput};
pub use resize::ResizeThrottle;
