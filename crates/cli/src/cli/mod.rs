// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fmtd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Format files through a long-running formatter daemon")]
#[command(
    long_about = "Format files through a long-running formatter daemon.\n\n\
    The daemon is started on first use and adopted by later invocations on the same port."
)]
pub struct Cli {
    /// Settings file (defaults to $FMTD_CONFIG, then the user config dir)
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Daemon port, overriding the settings file
    #[arg(long, global = true, value_name = "n", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Format a file and print the result
    #[command(after_help = "\
Examples:
  fmtd format src/app.js            Print the formatted file
  fmtd format -w src/app.js         Rewrite the file in place
  fmtd format --force notes.rb      Format even if the daemon does not claim the file")]
    Format {
        file: PathBuf,

        /// Write the result back to the file instead of printing it
        #[arg(short, long)]
        write: bool,

        /// Format even when the file is ignored or has no inferred parser
        #[arg(long)]
        force: bool,
    },

    /// Show how the daemon classifies a file
    Info { file: PathBuf },

    /// Check whether a daemon answers on the port
    Ping,

    /// Ask the daemon to drop its cached formatter configs
    ClearCache,

    /// Ask the daemon to exit
    Stop,
}
