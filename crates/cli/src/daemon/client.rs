// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon client: one owned object tying the channel, supervisor,
//! buffer cache and worker together.
//!
//! Every method returns without blocking. Daemon calls run on the worker
//! and come back as [`Pending`] values; anything answerable locally (cached
//! statuses, readiness, size limits) resolves immediately.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use fmtd_core::parser::parser_for_extension;
use fmtd_core::patch::patch;
use fmtd_core::{BufferId, BufferStatus, PatchSummary, TextBuffer};
use fmtd_ipc::{FileInfo, FileInfoParams, FormatParams, Formatted, Method};

use crate::cache::{status_from_file_info, BufferCache, BufferInfo, ClassifyRules, Lookup};
use crate::config::Settings;
use crate::error::{Error, Result};

use super::channel::RpcChannel;
use super::dispatch::{DispatchHandle, Dispatcher, Pending};
use super::lifecycle::{Activation, ExitHook, ExitReport, Supervisor};
use super::state::{DaemonState, SharedDaemonState};

/// Parser that cannot map a cursor offset.
const NO_CURSOR_PARSER: &str = "svelte";

/// A request to format one buffer's current contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    pub buffer: BufferInfo,
    pub contents: String,
    pub cursor: Option<usize>,
    /// Format even when the buffer is not claimed by the daemon.
    pub force: bool,
}

impl FormatRequest {
    pub fn of<B: TextBuffer + ?Sized>(buffer: &B, force: bool) -> Self {
        Self {
            buffer: BufferInfo::of(buffer),
            contents: buffer.text(),
            cursor: buffer.cursor(),
            force,
        }
    }
}

/// Why a format request did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotReady,
    TooLarge { size: usize, limit: usize },
    NotFormattable(BufferStatus),
    /// Forced, but no parser could be derived.
    NoParser,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotReady => f.write_str("daemon not ready"),
            SkipReason::TooLarge { size, limit } => {
                write!(f, "buffer too large ({} >= {} chars)", size, limit)
            }
            SkipReason::NotFormattable(status) => write!(f, "not formattable ({})", status),
            SkipReason::NoParser => f.write_str("no parser for this file"),
        }
    }
}

/// Formatted text waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatReply {
    /// Request id, checked again when the reply is applied.
    pub id: u64,
    pub parser: String,
    pub formatted: String,
    pub cursor: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Skipped(SkipReason),
    /// The daemon returned the contents unchanged.
    Unchanged,
    Formatted(FormatReply),
}

/// State reachable from the worker and the daemon watcher.
struct Shared {
    settings: Settings,
    channel: RpcChannel,
    state: Arc<SharedDaemonState>,
    supervisor: Mutex<Supervisor>,
    cache: Mutex<BufferCache>,
    dispatch: DispatchHandle,
    on_exit: ExitHook,
    /// Most recent unexpected exit, until someone takes it.
    last_crash: Mutex<Option<Error>>,
}

/// Client for one daemon port.
pub struct DaemonClient {
    shared: Arc<Shared>,
    // Dropped last: stops the worker after queued jobs finish.
    dispatcher: Dispatcher,
}

impl DaemonClient {
    /// Build the client. Nothing is spawned until [`activate`](Self::activate).
    pub fn new(settings: Settings) -> Result<Self> {
        let rules = ClassifyRules::from_settings(&settings)?;
        let dispatcher = Dispatcher::new("fmtd-daemon")?;
        let dispatch = dispatcher.handle();
        let channel = RpcChannel::new(settings.port);
        let state = Arc::new(SharedDaemonState::new());
        let supervisor = Supervisor::new(
            settings.daemon.clone(),
            settings.timeouts.clone(),
            channel.clone(),
            Arc::clone(&state),
        );

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| Shared {
            settings,
            channel,
            state,
            supervisor: Mutex::new(supervisor),
            cache: Mutex::new(BufferCache::new(rules)),
            dispatch,
            on_exit: exit_hook(weak.clone()),
            last_crash: Mutex::new(None),
        });

        Ok(Self { shared, dispatcher })
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    pub fn port(&self) -> u16 {
        self.shared.channel.port()
    }

    pub fn state(&self) -> DaemonState {
        self.shared.state.get()
    }

    /// Lock-free readiness check.
    pub fn is_ready(&self) -> bool {
        self.shared.state.is_ready()
    }

    pub fn status_string(&self) -> String {
        self.shared.state.status_string()
    }

    /// Pid of the daemon if this client spawned it. Lock-free, so it may
    /// still show the old pid while a regeneration is running.
    pub fn daemon_pid(&self) -> Option<u32> {
        self.shared.state.pid()
    }

    /// The latest unexpected daemon exit, as [`Error::Crash`]. Each crash
    /// is handed out once.
    pub fn take_crash(&self) -> Option<Error> {
        self.shared
            .last_crash
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Adopt or spawn the daemon.
    pub fn activate(&self) -> Pending<Result<Activation>> {
        let shared = Arc::clone(&self.shared);
        self.dispatcher
            .submit(move || shared.lock_supervisor().activate(&shared.on_exit))
    }

    /// Cached status; never calls the daemon.
    pub fn status(&self, id: BufferId) -> BufferStatus {
        self.shared.lock_cache().get(id)
    }

    /// Classify a buffer, at most once per buffer.
    pub fn classify(&self, info: BufferInfo) -> Pending<Result<BufferStatus>> {
        match self.shared.lock_cache().lookup(&info) {
            Lookup::Known(status) => return Pending::ready(Ok(status)),
            Lookup::AskDaemon(_) if !self.is_ready() => return Pending::ready(Err(Error::NotReady)),
            Lookup::AskDaemon(_) => {}
        }
        let shared = Arc::clone(&self.shared);
        self.dispatcher.submit(move || shared.classify(&info))
    }

    /// Format a buffer's contents. Apply a [`FormatOutcome::Formatted`]
    /// result with [`apply_format`](Self::apply_format).
    pub fn format(&self, request: FormatRequest) -> Pending<Result<FormatOutcome>> {
        if !self.is_ready() {
            return Pending::ready(Ok(FormatOutcome::Skipped(SkipReason::NotReady)));
        }
        let size = request.contents.chars().count();
        let limit = self.shared.settings.size_threshold();
        if size >= limit {
            return Pending::ready(Ok(FormatOutcome::Skipped(SkipReason::TooLarge {
                size,
                limit,
            })));
        }
        let shared = Arc::clone(&self.shared);
        self.dispatcher.submit(move || shared.format(request))
    }

    /// Patch `buffer` to the formatted text, unless a newer request has been
    /// issued since this one.
    pub fn apply_format<B: TextBuffer + ?Sized>(
        &self,
        reply: &FormatReply,
        buffer: &mut B,
    ) -> Result<PatchSummary> {
        let latest = self.shared.channel.latest_id();
        if reply.id != latest {
            tracing::warn!(id = reply.id, latest, "discarding superseded format result");
            return Err(Error::Stale {
                id: reply.id,
                latest,
            });
        }
        let current = buffer.text();
        let summary = patch(buffer, &current, &reply.formatted, reply.cursor)?;
        tracing::debug!(
            buffer = buffer.id().0,
            mutations = summary.mutations,
            inserted = summary.inserted,
            deleted = summary.deleted,
            "applied format"
        );
        Ok(summary)
    }

    /// Ask the daemon to drop its config cache and forget every local
    /// classification.
    pub fn clear_cache(&self) -> Pending<Result<()>> {
        if !self.is_ready() {
            return Pending::ready(Err(Error::NotReady));
        }
        let shared = Arc::clone(&self.shared);
        self.dispatcher.submit(move || shared.clear_cache())
    }

    /// Forget a closed buffer.
    pub fn forget(&self, id: BufferId) {
        self.shared.lock_cache().remove(id);
    }

    /// Replace the daemon with a fresh one.
    pub fn restart(&self) -> Pending<Result<Activation>> {
        if !self.is_ready() || !self.shared.state.try_begin_regeneration() {
            return Pending::ready(Err(Error::NotReady));
        }
        let shared = Arc::clone(&self.shared);
        self.dispatcher.submit(move || shared.regenerate())
    }

    /// Stop the daemon and clear the cache.
    pub fn shutdown(self) {
        let shared = Arc::clone(&self.shared);
        let done = self.dispatcher.submit(move || shared.terminate());
        if let Err(e) = done.wait() {
            tracing::warn!(error = %e, "shutdown did not complete");
        }
    }

    /// Leave the daemon running for another client to adopt.
    pub fn detach(self) {
        let shared = Arc::clone(&self.shared);
        let done = self
            .dispatcher
            .submit(move || shared.lock_supervisor().detach());
        if let Err(e) = done.wait() {
            tracing::warn!(error = %e, "detach did not complete");
        }
    }

    /// Stop a daemon this client spawned; leave an adopted one running.
    pub fn close(self) {
        let shared = Arc::clone(&self.shared);
        let done = self.dispatcher.submit(move || {
            let owned = shared.lock_supervisor().owns_process();
            if owned {
                shared.terminate();
            } else {
                shared.lock_supervisor().detach();
            }
        });
        if let Err(e) = done.wait() {
            tracing::warn!(error = %e, "close did not complete");
        }
    }
}

/// Regenerate on an unexpected daemon exit.
fn exit_hook(shared: Weak<Shared>) -> ExitHook {
    Arc::new(move |report: ExitReport| {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        tracing::warn!(
            pid = report.pid,
            collision = report.collision,
            last_line = ?report.last_line,
            "daemon crashed"
        );
        let crash = Error::from(report);
        *shared
            .last_crash
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(crash);
        shared.schedule_regeneration();
    })
}

impl Shared {
    fn lock_supervisor(&self) -> MutexGuard<'_, Supervisor> {
        self.supervisor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, BufferCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    /// Queue one regeneration unless one is already pending or the client
    /// is shutting down.
    fn schedule_regeneration(self: &Arc<Self>) {
        if self.state.is_stopping() || self.state.get() == DaemonState::Terminated {
            tracing::debug!("client stopping, not regenerating");
            return;
        }
        if !self.state.try_begin_regeneration() {
            tracing::debug!("regeneration already pending");
            return;
        }
        self.state.set(DaemonState::Spawning);
        let shared = Arc::clone(self);
        let _ = self.dispatch.submit(move || {
            if let Err(e) = shared.regenerate() {
                tracing::error!(error = %e, "daemon regeneration failed");
            }
        });
    }

    fn regenerate(&self) -> Result<Activation> {
        let result = self.lock_supervisor().regenerate(&self.on_exit);
        self.state.end_regeneration();
        result
    }

    /// Pass `result` through, scheduling a respawn when the daemon stopped
    /// answering.
    fn observe<T>(self: &Arc<Self>, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_transport() && self.state.is_ready() {
                tracing::warn!(error = %e, "daemon unreachable");
                self.schedule_regeneration();
            }
        }
        result
    }

    fn classify(self: &Arc<Self>, info: &BufferInfo) -> Result<BufferStatus> {
        let path = match self.lock_cache().lookup(info) {
            Lookup::Known(status) => return Ok(status),
            Lookup::AskDaemon(path) => path,
        };
        self.ensure_ready()?;
        let file_info = self.observe(self.file_info(&path))?;
        let status = status_from_file_info(&file_info);
        tracing::debug!(buffer = info.id.0, path = %path, status = %status, "classified");
        Ok(self.lock_cache().record(info.id, status))
    }

    fn format(self: &Arc<Self>, request: FormatRequest) -> Result<FormatOutcome> {
        if !self.state.is_ready() {
            return Ok(FormatOutcome::Skipped(SkipReason::NotReady));
        }

        let status = self.classify(&request.buffer)?;
        let parser = match status {
            BufferStatus::Formattable(parser) => parser,
            other if !request.force => {
                return Ok(FormatOutcome::Skipped(SkipReason::NotFormattable(other)))
            }
            _ => match request
                .buffer
                .extension
                .as_deref()
                .and_then(parser_for_extension)
            {
                Some(parser) => parser.to_string(),
                None => return Ok(FormatOutcome::Skipped(SkipReason::NoParser)),
            },
        };
        let Some(path) = request.buffer.lookup_path() else {
            return Ok(FormatOutcome::Skipped(SkipReason::NoParser));
        };

        let cursor = request
            .cursor
            .filter(|_| self.settings.cursor && parser != NO_CURSOR_PARSER);
        let params = FormatParams {
            path,
            contents: request.contents,
            parser,
            cursor,
        };
        let timeout = self.settings.timeouts.for_method(Method::Format);
        let reply = self.observe(self.channel.call(Method::Format, &params, timeout))?;
        let id = reply.request_id;
        let formatted: Formatted = self.channel.accept_as(reply)?;

        if formatted.formatted == params.contents {
            return Ok(FormatOutcome::Unchanged);
        }
        Ok(FormatOutcome::Formatted(FormatReply {
            id,
            cursor: formatted.cursor(),
            parser: params.parser,
            formatted: formatted.formatted,
        }))
    }

    fn clear_cache(self: &Arc<Self>) -> Result<()> {
        let timeout = self.settings.timeouts.for_method(Method::ClearConfigCache);
        let result = self.observe(self.channel.request_bare(Method::ClearConfigCache, timeout));
        self.lock_cache().invalidate_all();
        result.map(|_| ())
    }

    fn file_info(&self, path: &str) -> Result<FileInfo> {
        let params = FileInfoParams {
            path: path.to_string(),
        };
        let timeout = self.settings.timeouts.for_method(Method::GetFileInfo);
        self.channel.request(Method::GetFileInfo, &params, timeout)
    }

    fn terminate(&self) {
        self.lock_supervisor().terminate();
        self.lock_cache().invalidate_all();
    }
}


#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
