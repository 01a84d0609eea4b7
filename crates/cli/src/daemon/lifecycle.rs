// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: spawn, adopt, watch, respawn, terminate.
//!
//! The daemon is launched as `<program> [script] [args...] <port> <ppid>`.
//! Its stdout and stderr are merged into one line stream. The first
//! meaningful line is the handshake: `{"ok": <port>}` once it listens,
//! `{"err": ...}` if it gave up, or a line mentioning `EADDRINUSE` when
//! another process already holds the port. After the handshake a watcher
//! thread keeps draining the stream and reports an unexpected close.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fmtd_ipc::{Handshake, Method, ADDR_IN_USE};

use crate::config::{DaemonConfig, Timeouts};
use crate::error::{Error, Result};

use super::channel::RpcChannel;
use super::state::{DaemonState, SharedDaemonState};

/// Upper bound for the doubling respawn delay.
const MAX_RESPAWN_DELAY: Duration = Duration::from_secs(30);

/// Called from the watcher thread when an owned daemon goes away on its own.
pub type ExitHook = Arc<dyn Fn(ExitReport) + Send + Sync>;

/// What the watcher saw before the daemon's output closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub pid: u32,
    /// The daemon reported `EADDRINUSE` after the handshake.
    pub collision: bool,
    pub last_line: Option<String>,
}

impl From<ExitReport> for Error {
    fn from(report: ExitReport) -> Self {
        let detail = match (report.collision, report.last_line) {
            (true, _) => "lost its port (EADDRINUSE)".to_string(),
            (false, Some(line)) => format!("last output: {}", line),
            (false, None) => "no output".to_string(),
        };
        Error::Crash(format!("pid {}, {}", report.pid, detail))
    }
}

/// How the supervisor reached Ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// A daemon already answering on the port was reused.
    Adopted,
    /// A new child was spawned.
    Spawned { pid: u32 },
}

enum SpawnOutcome {
    Listening(u32),
    Collision,
}

/// An owned daemon child.
struct DaemonProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    /// Set before we stop the child ourselves so the watcher stays quiet.
    expected_exit: Arc<AtomicBool>,
}

impl DaemonProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Tell the watcher the coming exit is ours.
    fn expect_exit(&self) {
        self.expected_exit.store(true, Ordering::SeqCst);
    }

    fn stop(mut self) {
        self.expect_exit();
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.write_all(b"q\n");
        }
        reap(&mut self.child);
    }
}

/// Owns the daemon process, if this client spawned it, and drives the
/// state machine in [`SharedDaemonState`].
pub struct Supervisor {
    config: DaemonConfig,
    timeouts: Timeouts,
    channel: RpcChannel,
    state: Arc<SharedDaemonState>,
    process: Option<DaemonProcess>,
}

impl Supervisor {
    pub fn new(
        config: DaemonConfig,
        timeouts: Timeouts,
        channel: RpcChannel,
        state: Arc<SharedDaemonState>,
    ) -> Self {
        Self {
            config,
            timeouts,
            channel,
            state,
            process: None,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state.get()
    }

    /// True when this supervisor spawned the running daemon.
    pub fn owns_process(&self) -> bool {
        self.process.is_some()
    }

    /// Whether something answers `ping` on the port.
    pub fn answers_ping(&self) -> bool {
        match self
            .channel
            .request_bare(Method::Ping, self.timeouts.for_method(Method::Ping))
        {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(port = self.channel.port(), error = %e, "ping failed");
                false
            }
        }
    }

    /// Best-effort `quit` to whatever holds the port.
    fn request_quit(&self) {
        if let Err(e) = self
            .channel
            .request_bare(Method::Quit, self.timeouts.for_method(Method::Quit))
        {
            tracing::debug!(port = self.channel.port(), error = %e, "quit not delivered");
        }
    }

    /// Reach Ready: adopt a daemon that already answers, otherwise clear the
    /// port and spawn one.
    pub fn activate(&mut self, on_exit: &ExitHook) -> Result<Activation> {
        self.state.end_stopping();
        self.state.set(DaemonState::Spawning);
        if self.answers_ping() {
            tracing::info!(port = self.channel.port(), "adopting running daemon");
            self.state.set(DaemonState::Ready);
            return Ok(Activation::Adopted);
        }
        self.request_quit();
        self.spawn(on_exit)
    }

    /// Replace a daemon that died or stopped answering. Refused once
    /// [`terminate`](Self::terminate) or [`detach`](Self::detach) began.
    pub fn regenerate(&mut self, on_exit: &ExitHook) -> Result<Activation> {
        if self.state.is_stopping() {
            tracing::debug!(port = self.channel.port(), "stopping, not regenerating");
            self.state.set(DaemonState::Terminated);
            return Err(Error::NotReady);
        }
        tracing::info!(port = self.channel.port(), "regenerating daemon");
        self.state.set(DaemonState::Spawning);
        if let Some(process) = self.process.take() {
            process.stop();
            self.state.set_pid(None);
        }
        self.request_quit();
        self.spawn(on_exit)
    }

    /// Spawn with retries. Each failed attempt doubles the delay before the
    /// next one; after `max_spawn_attempts` the state becomes Failed.
    pub fn spawn(&mut self, on_exit: &ExitHook) -> Result<Activation> {
        let port = self.channel.port();
        let attempts = self.config.max_spawn_attempts.max(1);
        let mut delay = self.config.respawn_delay();
        let mut last_error = Error::NotReady;

        for attempt in 1..=attempts {
            self.state.set_attempt(attempt);
            self.state.set(DaemonState::Spawning);

            match self.spawn_once(on_exit) {
                Ok(SpawnOutcome::Listening(pid)) => {
                    tracing::info!(pid, port, attempt, "daemon ready");
                    self.state.set(DaemonState::Ready);
                    return Ok(Activation::Spawned { pid });
                }
                Ok(SpawnOutcome::Collision) => {
                    if self.answers_ping() {
                        tracing::info!(port, "port already served, adopting that daemon");
                        self.state.set(DaemonState::Ready);
                        return Ok(Activation::Adopted);
                    }
                    tracing::warn!(port, attempt, "port held by an unresponsive process");
                    self.request_quit();
                    last_error = Error::Collision(port);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "daemon spawn failed");
                    last_error = e;
                }
            }

            if attempt < attempts {
                std::thread::sleep(delay);
                delay = (delay * 2).min(MAX_RESPAWN_DELAY);
            }
        }

        tracing::error!(port, attempts, error = %last_error, "giving up on daemon");
        self.state.set(DaemonState::Failed);
        Err(last_error)
    }

    fn spawn_once(&mut self, on_exit: &ExitHook) -> Result<SpawnOutcome> {
        let port = self.channel.port();
        let mut child = Command::new(&self.config.program)
            .args(self.config.spawn_args(port, std::process::id()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        let pid = child.id();
        tracing::debug!(pid, program = %self.config.program, "spawned daemon");

        let lines = merge_output(&mut child);
        let handshake = match read_handshake(&lines, self.config.handshake_timeout()) {
            Ok(handshake) => handshake,
            Err(HandshakeWait::TimedOut) => {
                reap(&mut child);
                return Err(Error::Handshake(format!(
                    "no handshake within {}ms",
                    self.config.handshake_timeout_ms
                )));
            }
            Err(HandshakeWait::Closed(last_line)) => {
                let status = child.wait()?;
                let detail = last_line.map(|l| format!(": {}", l)).unwrap_or_default();
                return Err(Error::Handshake(format!(
                    "daemon exited ({}) before listening{}",
                    status, detail
                )));
            }
        };

        match handshake {
            Handshake::Listening(listening) if listening == port => {
                let expected_exit = Arc::new(AtomicBool::new(false));
                watch(pid, lines, Arc::clone(&expected_exit), Arc::clone(on_exit));
                self.state.set_pid(Some(pid));
                self.process = Some(DaemonProcess {
                    stdin: child.stdin.take(),
                    child,
                    expected_exit,
                });
                Ok(SpawnOutcome::Listening(pid))
            }
            Handshake::Listening(other) => {
                reap(&mut child);
                Err(Error::Handshake(format!(
                    "daemon listened on port {} instead of {}",
                    other, port
                )))
            }
            Handshake::AddrInUse => {
                reap(&mut child);
                Ok(SpawnOutcome::Collision)
            }
            Handshake::Failed(message) => {
                reap(&mut child);
                Err(Error::Handshake(message))
            }
            Handshake::Unrecognized(line) => {
                reap(&mut child);
                Err(Error::Handshake(format!("unexpected output: {}", line)))
            }
        }
    }

    /// Stop the daemon: `quit`, then `q` on stdin and a kill for an owned
    /// child.
    ///
    /// The exit is marked as expected before `quit` goes out, since the
    /// daemon may close its output as soon as it reads it.
    pub fn terminate(&mut self) {
        self.state.begin_stopping();
        let process = self.process.take();
        if let Some(process) = &process {
            process.expect_exit();
        }
        self.state.set_pid(None);
        self.state.set(DaemonState::Terminated);

        self.request_quit();
        if let Some(process) = process {
            let pid = process.pid();
            process.stop();
            tracing::info!(pid, "daemon terminated");
        }
    }

    /// Forget the daemon without stopping it.
    pub fn detach(&mut self) {
        self.state.begin_stopping();
        if let Some(process) = self.process.take() {
            process.expect_exit();
            tracing::info!(pid = process.pid(), "detached from daemon");
        }
        self.state.set_pid(None);
        self.state.set(DaemonState::Terminated);
    }
}

enum HandshakeWait {
    TimedOut,
    /// Output closed; carries the last unrecognized line.
    Closed(Option<String>),
}

/// Read lines until one of them settles the handshake. Lines that do not
/// (warnings, debugger banners) are logged and skipped.
fn read_handshake(
    lines: &Receiver<String>,
    timeout: Duration,
) -> std::result::Result<Handshake, HandshakeWait> {
    let deadline = Instant::now() + timeout;
    let mut last_line = None;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match lines.recv_timeout(remaining) {
            Ok(line) => match Handshake::parse(&line) {
                Handshake::Unrecognized(line) => {
                    tracing::debug!(line = %line, "daemon output before handshake");
                    last_line = Some(line);
                }
                handshake => return Ok(handshake),
            },
            Err(RecvTimeoutError::Timeout) => return Err(HandshakeWait::TimedOut),
            Err(RecvTimeoutError::Disconnected) => return Err(HandshakeWait::Closed(last_line)),
        }
    }
}

/// Merge the child's stdout and stderr into one line channel. The channel
/// disconnects once both streams are closed.
fn merge_output(child: &mut Child) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, tx.clone(), "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, tx, "stderr");
    }
    rx
}

fn forward_lines<R: Read + Send + 'static>(stream: R, tx: Sender<String>, name: &'static str) {
    let spawned = std::thread::Builder::new()
        .name(format!("fmtd-daemon-{}", name))
        .spawn(move || {
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(stream = name, error = %e, "could not read daemon output");
    }
}

/// Drain the rest of the daemon's output. When it closes without us having
/// asked, report through `on_exit`.
fn watch(pid: u32, lines: Receiver<String>, expected_exit: Arc<AtomicBool>, on_exit: ExitHook) {
    let spawned = std::thread::Builder::new()
        .name(format!("fmtd-watch-{}", pid))
        .spawn(move || {
            let mut collision = false;
            let mut last_line = None;
            for line in lines.iter() {
                tracing::debug!(pid, "daemon: {}", line);
                if line.contains(ADDR_IN_USE) {
                    collision = true;
                }
                last_line = Some(line);
            }
            if expected_exit.load(Ordering::SeqCst) {
                tracing::debug!(pid, "daemon output closed");
                return;
            }
            tracing::warn!(pid, collision, "daemon exited unexpectedly");
            on_exit(ExitReport {
                pid,
                collision,
                last_line,
            });
        });
    if let Err(e) = spawned {
        tracing::warn!(pid, error = %e, "could not watch daemon");
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
