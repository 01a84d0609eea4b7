// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands.
//!
//! These talk to whatever listens on the port directly and never spawn.

use std::io::Write;

use fmtd_ipc::Method;

use crate::config::Settings;
use crate::daemon::RpcChannel;
use crate::error::{Error, Result};

/// Send `method`; `Ok(false)` when nothing usable answers.
fn send(settings: &Settings, method: Method) -> Result<bool> {
    let channel = RpcChannel::new(settings.port);
    match channel.request_bare(method, settings.timeouts.for_method(method)) {
        Ok(_) => Ok(true),
        Err(e @ Error::Application(_)) => Err(e),
        Err(e) if e.is_transient() => {
            tracing::debug!(port = settings.port, error = %e, "{} failed", method);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Report whether a daemon answers on the port.
pub fn ping(settings: &Settings, out: &mut impl Write) -> Result<()> {
    let running = match send(settings, Method::Ping) {
        Ok(running) => running,
        // It answered, just not with a pong.
        Err(Error::Application(_)) => true,
        Err(e) => return Err(e),
    };
    if running {
        writeln!(out, "running on port {}", settings.port)?;
    } else {
        writeln!(out, "not running on port {}", settings.port)?;
    }
    Ok(())
}

/// Ask the daemon to drop its cached configs.
pub fn clear_cache(settings: &Settings, out: &mut impl Write) -> Result<()> {
    if send(settings, Method::ClearConfigCache)? {
        writeln!(out, "cache cleared")?;
    } else {
        writeln!(out, "not running on port {}", settings.port)?;
    }
    Ok(())
}

/// Ask the daemon to exit.
pub fn stop(settings: &Settings, out: &mut impl Write) -> Result<()> {
    if send(settings, Method::Quit)? {
        writeln!(out, "daemon on port {} stopped", settings.port)?;
    } else {
        writeln!(out, "not running on port {}", settings.port)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
