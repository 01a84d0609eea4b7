// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Editor-facing commands and hooks.
//!
//! [`Editor`] drives a [`DaemonClient`] synchronously: each command waits
//! for its result and reports through a [`Notifier`]. Hosts that must not
//! block their UI thread use the client's [`Pending`] API directly.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use fmtd_core::{BufferStatus, PatchSummary, TextBuffer};

use crate::cache::{triggers_invalidation, BufferInfo};
use crate::config::{FormatOnSave, Settings};
use crate::daemon::{Activation, DaemonClient, FormatOutcome, FormatRequest, Pending, SkipReason};
use crate::error::{Error, Result};

/// Where user-visible messages go.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Prints notifications to stderr.
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn info(&self, message: &str) {
        eprintln!("fmtd: {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("fmtd: {}", message);
    }
}

/// What a format command did to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatReport {
    Skipped(SkipReason),
    Unchanged,
    Formatted(PatchSummary),
    /// A newer request superseded this one; nothing was applied.
    Stale,
    /// Reported to the user; the buffer is untouched.
    Failed(String),
}

pub struct Editor {
    client: DaemonClient,
    notifier: Box<dyn Notifier>,
    /// Set for the duration of a save-without-formatting.
    suppress_format: AtomicBool,
}

impl Editor {
    pub fn new(client: DaemonClient, notifier: Box<dyn Notifier>) -> Self {
        Self {
            client,
            notifier,
            suppress_format: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &DaemonClient {
        &self.client
    }

    fn settings(&self) -> &Settings {
        self.client.settings()
    }

    fn verbose(&self, message: &str) {
        if self.settings().is_verbose() {
            self.notifier.info(message);
        }
    }

    /// Adopt or spawn the daemon and wait for it. A failure is reported and
    /// leaves formatting disabled.
    pub fn start(&self) -> bool {
        match self.client.activate().join() {
            Ok(Activation::Adopted) => {
                self.verbose("ready (adopted running daemon)");
                true
            }
            Ok(Activation::Spawned { pid }) => {
                self.verbose(&format!("ready (daemon pid {})", pid));
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "daemon unavailable");
                self.notifier
                    .error(&format!("formatter daemon unavailable: {}", e));
                false
            }
        }
    }

    /// Format `buffer` and patch the result in.
    pub fn format_buffer<B: TextBuffer + ?Sized>(
        &self,
        buffer: &mut B,
        save_after_format: bool,
        force: bool,
    ) -> Result<FormatReport> {
        if let Some(crash) = self.client.take_crash() {
            self.notifier.error(&crash.to_string());
        }
        let outcome = self.client.format(FormatRequest::of(buffer, force)).join();
        let report = match outcome {
            Ok(FormatOutcome::Skipped(reason)) => {
                if let SkipReason::TooLarge { size, limit } = &reason {
                    self.verbose(&format!("buffer too large to format ({} >= {} chars)", size, limit));
                }
                FormatReport::Skipped(reason)
            }
            Ok(FormatOutcome::Unchanged) => {
                self.verbose("unchanged");
                FormatReport::Unchanged
            }
            Ok(FormatOutcome::Formatted(reply)) => match self.client.apply_format(&reply, buffer) {
                Ok(summary) => {
                    if save_after_format && buffer.file_path().is_some() {
                        buffer.save()?;
                    }
                    self.verbose(&format!("formatted ({})", reply.parser));
                    FormatReport::Formatted(summary)
                }
                Err(Error::Stale { .. }) => FormatReport::Stale,
                Err(e) => return Err(e),
            },
            Err(Error::Stale { .. }) => FormatReport::Stale,
            Err(Error::NotReady) => FormatReport::Skipped(SkipReason::NotReady),
            Err(Error::Application(message)) => {
                tracing::error!(message = %message, "daemon rejected document");
                self.notifier
                    .error("format failed, open log to see error message");
                FormatReport::Failed(message)
            }
            Err(e) if e.is_transient() => {
                self.notifier.error(&format!("format failed: {}", e));
                FormatReport::Failed(e.to_string())
            }
            Err(e) => return Err(e),
        };
        Ok(report)
    }

    /// Save through the hooks: pre-save formatting, write, post-save
    /// invalidation.
    pub fn save<B: TextBuffer + ?Sized>(&self, buffer: &mut B) -> Result<Option<FormatReport>> {
        let report = self.format_before_save(buffer, false)?;
        buffer.save()?;
        self.on_post_save(buffer);
        Ok(report)
    }

    /// Save without the pre-save format.
    pub fn save_without_formatting<B: TextBuffer + ?Sized>(&self, buffer: &mut B) -> Result<()> {
        self.suppress_format.store(true, Ordering::SeqCst);
        let result = self.save(buffer);
        self.suppress_format.store(false, Ordering::SeqCst);
        result.map(|_| ())
    }

    /// Forget local classifications and the daemon's config cache. A no-op
    /// while the daemon is not ready.
    pub fn clear_cache(&self) -> Result<()> {
        if !self.client.is_ready() {
            return Ok(());
        }
        match self.client.clear_cache().join() {
            Ok(()) => {
                self.verbose("cache cleared");
                Ok(())
            }
            Err(Error::NotReady) => Ok(()),
            Err(e) if e.is_transient() => {
                self.notifier.error(&format!("clear cache failed: {}", e));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the daemon. A no-op while the daemon is not ready.
    pub fn restart_daemon(&self) -> Result<()> {
        if !self.client.is_ready() {
            return Ok(());
        }
        match self.client.restart().join() {
            Ok(_) => {
                self.verbose("daemon restarted");
                Ok(())
            }
            Err(Error::NotReady) => Ok(()),
            Err(e) => {
                self.notifier.error(&format!("restart failed: {}", e));
                Err(e)
            }
        }
    }

    /// A buffer gained focus: classify it (memoized).
    pub fn on_activated<B: TextBuffer + ?Sized>(&self, buffer: &B) -> Pending<Result<BufferStatus>> {
        self.client.classify(BufferInfo::of(buffer))
    }

    /// Classify every open buffer, e.g. once the daemon is ready.
    pub fn refresh<'a>(
        &self,
        buffers: impl IntoIterator<Item = &'a dyn TextBuffer>,
    ) -> Vec<Pending<Result<BufferStatus>>> {
        buffers
            .into_iter()
            .map(|buffer| self.on_activated(buffer))
            .collect()
    }

    /// Format before the buffer is written, when configured to.
    pub fn on_pre_save<B: TextBuffer + ?Sized>(&self, buffer: &mut B) -> Result<Option<FormatReport>> {
        let save_after = self.settings().save_on_format;
        self.format_before_save(buffer, save_after)
    }

    /// Saving a formatter config file invalidates every classification.
    pub fn on_post_save<B: TextBuffer + ?Sized>(&self, buffer: &B) {
        if buffer.file_path().is_some_and(triggers_invalidation) {
            tracing::info!("formatter config saved, clearing caches");
            if let Err(e) = self.clear_cache() {
                tracing::warn!(error = %e, "cache invalidation failed");
            }
        }
    }

    pub fn on_close<B: TextBuffer + ?Sized>(&self, buffer: &B) {
        self.client.forget(buffer.id());
    }

    /// One-line status for a buffer, e.g. `ready [ruby]`.
    pub fn status_text<B: TextBuffer + ?Sized>(&self, buffer: &B) -> String {
        format!(
            "{} [{}]",
            self.client.status_string(),
            self.client.status(buffer.id())
        )
    }

    /// Stop a daemon this editor spawned; leave an adopted one running.
    pub fn close(self) {
        self.client.close();
    }

    pub fn shutdown(self) {
        self.client.shutdown();
    }

    fn format_before_save<B: TextBuffer + ?Sized>(
        &self,
        buffer: &mut B,
        save_after: bool,
    ) -> Result<Option<FormatReport>> {
        if self.suppress_format.load(Ordering::SeqCst) || !self.client.is_ready() {
            return Ok(None);
        }
        if !self.formats_on_save(buffer) {
            return Ok(None);
        }
        if buffer.char_len() >= self.settings().size_threshold() {
            return Ok(None);
        }
        self.format_buffer(buffer, save_after, false).map(Some)
    }

    fn formats_on_save<B: TextBuffer + ?Sized>(&self, buffer: &B) -> bool {
        match self.settings().format_on_save {
            FormatOnSave::Off => false,
            FormatOnSave::On => true,
            FormatOnSave::Explicit => buffer.file_path().is_some_and(has_prettier_config),
        }
    }
}

/// Walk up from `path` looking for a `*prettierrc*` file. The search stops
/// at the first directory holding a `package.json`.
pub fn has_prettier_config(path: &Path) -> bool {
    for dir in path.ancestors().skip(1) {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        let mut project_root = false;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.contains("prettierrc") {
                return true;
            }
            if name == "package.json" {
                project_root = true;
            }
        }
        if project_root {
            return false;
        }
    }
    false
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod tests;
