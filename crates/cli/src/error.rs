// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use fmtd_ipc::{Method, ProtocolError};
use thiserror::Error;

/// All possible errors that can occur in the fmtd client.
///
/// Daemon call failures fall into the transport / timeout / application
/// taxonomy; see [`Error::is_transient`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("daemon did not answer '{method}' within {}ms", after.as_millis())]
    Timeout { method: Method, after: Duration },

    #[error("daemon error: {0}")]
    Application(String),

    #[error("port {0} is held by a process that does not answer\n  hint: stop it or pick another port with --port")]
    Collision(u16),

    #[error("daemon exited unexpectedly: {0}")]
    Crash(String),

    #[error("daemon is not ready")]
    NotReady,

    #[error("stale response: request {id} was superseded by {latest}")]
    Stale { id: u64, latest: u64 },

    #[error("daemon handshake failed: {0}")]
    Handshake(String),

    #[error("failed to start daemon ({program}): {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("daemon worker has stopped")]
    WorkerGone,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("buffer error: {0}")]
    Buffer(#[from] fmtd_core::Error),
}

/// A specialized Result type for fmtd operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for per-call failures that leave the daemon usable: the call is
    /// reported and nothing is retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout { .. } | Error::Application(_)
        )
    }

    /// True when the daemon itself looks unreachable and should be respawned.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

// Undecodable daemon output is a transport failure: the bytes never formed a
// valid envelope.
impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Transport(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
