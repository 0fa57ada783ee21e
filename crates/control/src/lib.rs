// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harness-control`: the Control Plane.
//!
//! [`model`] and [`store`] are the durable catalog (Directory, Conversation,
//! Repository, Task) behind one `RwLock`. [`events`] is the Event
//! Normalizer's two sinks: the durable [`events::EventStore`] and the
//! bounded observed-event [`events::Journal`]. [`wire`] is the closed
//! command/envelope vocabulary every transport speaks. [`server`] is the
//! multiplexer itself: session lifecycle dispatch, controller discipline,
//! and subscription fan-out, generalized from the teacher's single
//! in-process `Store` into a registry of many concurrent sessions.
//! [`transport`] hosts the two transports clients can use: an embedded
//! in-process channel and a line-framed JSON-over-TCP listener.

pub mod events;
pub mod model;
pub mod server;
pub mod store;
pub mod transport;
pub mod wire;

pub use server::{ControlPlane, ControlPlaneConfig};
pub use transport::{serve_tcp, EmbeddedClient, RemoteClient, TcpServerConfig};
pub use wire::{Command, Envelope};
