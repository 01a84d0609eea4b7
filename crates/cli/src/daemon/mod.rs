// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the formatter daemon.
//!
//! The daemon is an external process reached over localhost TCP. This module
//! spawns or adopts it, talks to it, and keeps it alive.

mod channel;
mod client;
mod dispatch;
mod lifecycle;
mod state;

#[cfg(test)]
pub(crate) mod test_daemon;

pub use channel::{Reply, RpcChannel};
pub use client::{DaemonClient, FormatOutcome, FormatReply, FormatRequest, SkipReason};
pub use dispatch::{DispatchHandle, Dispatcher, Pending};
pub use lifecycle::{Activation, ExitHook, ExitReport, Supervisor};
pub use state::{DaemonState, SharedDaemonState};
