// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;
use std::path::Path;

use clap::Parser;
use fmtd::Cli;

fn main() {
    let cli = Cli::parse();
    let settings = match fmtd::load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    setup_logging(settings.log_file.as_deref());

    if let Err(e) = fmtd::run(cli.command, settings) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Log to `log_file` when configured and writable, otherwise to stderr.
fn setup_logging(log_file: Option<&Path>) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(fmtd::env::vars::RUST_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = log_file.and_then(|path| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    if let Some(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
