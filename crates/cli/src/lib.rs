// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fmtd - client for a long-running code formatter daemon.
//!
//! The formatter itself runs as a separate process listening on a localhost
//! port. This crate spawns or adopts that process, keeps it alive, asks it
//! how to treat each buffer, and patches formatted text back into buffers
//! with minimal edits.
//!
//! # Main Components
//!
//! - [`DaemonClient`] - owns the daemon connection, supervisor, buffer cache
//!   and worker thread
//! - [`Editor`] - synchronous commands and save/close hooks on top of it
//! - [`Settings`] - user configuration
//! - [`Error`] - error types for all operations
//!
//! ```rust,ignore
//! use fmtd::{DaemonClient, Editor, Settings, StderrNotifier};
//! use fmtd_core::MemoryBuffer;
//!
//! let client = DaemonClient::new(Settings::discover(None)?)?;
//! let editor = Editor::new(client, Box::new(StderrNotifier));
//! editor.start();
//!
//! let mut buffer = MemoryBuffer::open("src/app.js")?;
//! editor.format_buffer(&mut buffer, true, false)?;
//! editor.close();
//! ```

mod cli;
mod commands;
pub mod env;

pub mod cache;
pub mod config;
pub mod daemon;
pub mod editor;
pub mod error;

pub use cli::{Cli, Command};
pub use config::Settings;
pub use daemon::{DaemonClient, FormatOutcome, FormatRequest, SkipReason};
pub use editor::{Editor, FormatReport, Notifier, StderrNotifier};
pub use error::{Error, Result};

use std::io;

/// Settings for this invocation: the discovered file, then `--port`.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::discover(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.port = port;
    }
    Ok(settings)
}

pub fn run(command: Command, settings: Settings) -> Result<()> {
    let mut out = io::stdout().lock();
    match command {
        Command::Format { file, write, force } => {
            commands::format::run(settings, &file, write, force, &mut out)
        }
        Command::Info { file } => commands::format::info(settings, &file, &mut out),
        Command::Ping => commands::daemon::ping(&settings, &mut out),
        Command::ClearCache => commands::daemon::clear_cache(&settings, &mut out),
        Command::Stop => commands::daemon::stop(&settings, &mut out),
    }
}
