// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `FMTD_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    std::env::var(vars::FMTD_CONFIG).ok().map(PathBuf::from)
}

/// Returns `FMTD_PORT` if it is set to a valid port number.
pub fn port() -> Option<u16> {
    std::env::var(vars::FMTD_PORT)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|p| *p != 0)
}

/// Returns the value of `FMTD_DAEMON_SCRIPT` if set.
pub fn daemon_script() -> Option<PathBuf> {
    std::env::var(vars::FMTD_DAEMON_SCRIPT)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
