// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon state shared between the supervisor, the worker and callers.
//!
//! Reads are lock-free so editor-thread readiness checks never wait on a
//! spawn in progress.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// State values for the atomic state field.
pub const STATE_NOT_STARTED: u8 = 0;
pub const STATE_SPAWNING: u8 = 1;
pub const STATE_READY: u8 = 2;
pub const STATE_FAILED: u8 = 3;
pub const STATE_TERMINATED: u8 = 4;

/// Supervisor state machine.
///
/// ```text
/// NotStarted -> Spawning -> Ready -> (crash) Spawning -> ...
///                  |          |
///                  v          v
///               Failed    Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotStarted,
    Spawning,
    Ready,
    Failed,
    Terminated,
}

impl DaemonState {
    fn from_u8(value: u8) -> Self {
        match value {
            STATE_SPAWNING => DaemonState::Spawning,
            STATE_READY => DaemonState::Ready,
            STATE_FAILED => DaemonState::Failed,
            STATE_TERMINATED => DaemonState::Terminated,
            _ => DaemonState::NotStarted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            DaemonState::NotStarted => STATE_NOT_STARTED,
            DaemonState::Spawning => STATE_SPAWNING,
            DaemonState::Ready => STATE_READY,
            DaemonState::Failed => STATE_FAILED,
            DaemonState::Terminated => STATE_TERMINATED,
        }
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DaemonState::NotStarted => "not started",
            DaemonState::Spawning => "spawning",
            DaemonState::Ready => "ready",
            DaemonState::Failed => "failed",
            DaemonState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Daemon state visible to every thread.
pub struct SharedDaemonState {
    state: AtomicU8,
    /// Spawn attempt count (for status reporting).
    attempt: AtomicU32,
    /// Set while a regeneration is scheduled or running.
    regenerating: AtomicBool,
    /// Set once the client started stopping or detaching; blocks respawns.
    stopping: AtomicBool,
    /// Pid of the owned daemon, 0 when there is none.
    pid: AtomicU32,
}

impl SharedDaemonState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_NOT_STARTED),
            attempt: AtomicU32::new(0),
            regenerating: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            pid: AtomicU32::new(0),
        }
    }

    pub fn get(&self) -> DaemonState {
        DaemonState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: DaemonState) {
        let previous = self.state.swap(state.as_u8(), Ordering::AcqRel);
        if previous != state.as_u8() {
            tracing::info!(from = %DaemonState::from_u8(previous), to = %state, "daemon state");
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.get() == DaemonState::Ready
    }

    /// Claim the regeneration slot. Returns false if a regeneration is
    /// already pending.
    pub fn try_begin_regeneration(&self) -> bool {
        self.regenerating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_regeneration(&self) {
        self.regenerating.store(false, Ordering::Release);
    }

    pub fn is_regenerating(&self) -> bool {
        self.regenerating.load(Ordering::Acquire)
    }

    /// Mark the daemon as going away on purpose. Exits seen from here on
    /// are not crashes and must not respawn anything.
    pub fn begin_stopping(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Allow spawning again, for a fresh activation.
    pub fn end_stopping(&self) {
        self.stopping.store(false, Ordering::Release);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Pid of the owned daemon; readable without the supervisor lock.
    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn set_pid(&self, pid: Option<u32>) {
        self.pid.store(pid.unwrap_or(0), Ordering::Release);
    }

    /// Human-readable status for the status line.
    pub fn status_string(&self) -> String {
        match self.get() {
            DaemonState::Spawning => {
                let attempt = self.attempt();
                if attempt > 1 {
                    format!("spawning (attempt {})", attempt)
                } else {
                    "spawning".to_string()
                }
            }
            other => other.to_string(),
        }
    }
}

impl Default for SharedDaemonState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
