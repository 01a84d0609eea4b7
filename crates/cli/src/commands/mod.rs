// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod daemon;
pub mod format;

use crate::config::Settings;
use crate::daemon::DaemonClient;
use crate::editor::{Editor, StderrNotifier};
use crate::error::{Error, Result};

/// Adopt or spawn the daemon for one invocation.
fn start_editor(settings: Settings) -> Result<Editor> {
    let editor = Editor::new(DaemonClient::new(settings)?, Box::new(StderrNotifier));
    if editor.start() {
        Ok(editor)
    } else {
        editor.close();
        Err(Error::NotReady)
    }
}
