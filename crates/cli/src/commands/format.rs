// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! File commands that go through the daemon client.

use std::io::Write;
use std::path::Path;

use fmtd_core::{MemoryBuffer, TextBuffer};

use super::start_editor;
use crate::config::Settings;
use crate::editor::FormatReport;
use crate::error::{Error, Result};

/// Format `file`. Prints the result to `out`, or patches and saves the file
/// when `write` is set.
pub fn run(
    settings: Settings,
    file: &Path,
    write: bool,
    force: bool,
    out: &mut impl Write,
) -> Result<()> {
    let mut buffer = MemoryBuffer::open(std::path::absolute(file)?)?;
    let editor = start_editor(settings)?;
    let report = editor.format_buffer(&mut buffer, write, force);
    editor.close();

    match report? {
        FormatReport::Failed(message) => return Err(Error::Application(message)),
        FormatReport::Skipped(reason) => {
            eprintln!("fmtd: skipped {}: {}", file.display(), reason);
        }
        FormatReport::Formatted(summary) => {
            tracing::debug!(
                inserted = summary.inserted,
                deleted = summary.deleted,
                "patched {}",
                file.display()
            );
        }
        FormatReport::Unchanged | FormatReport::Stale => {}
    }

    if !write {
        out.write_all(buffer.text().as_bytes())?;
    }
    Ok(())
}

/// Print how the daemon classifies `file`.
pub fn info(settings: Settings, file: &Path, out: &mut impl Write) -> Result<()> {
    let buffer = MemoryBuffer::with_path(std::path::absolute(file)?, "");
    let editor = start_editor(settings)?;
    let status = editor.on_activated(&buffer).join();
    editor.close();

    writeln!(out, "{}: {}", file.display(), status?)?;
    Ok(())
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
