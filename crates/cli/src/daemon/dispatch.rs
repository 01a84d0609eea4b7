// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background worker for daemon calls.
//!
//! Every blocking daemon interaction runs on one dedicated thread, in
//! submission order, so the editor thread never waits on a socket. Results
//! come back as [`Pending`] values that can be polled, awaited, or waited on.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Owner of the worker thread. Dropping it stops the worker after the jobs
/// already queued have run.
pub struct Dispatcher {
    handle: DispatchHandle,
    worker: Option<JoinHandle<()>>,
}

/// Cloneable submission handle onto the worker queue.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl Dispatcher {
    /// Start a worker thread called `name`.
    pub fn new(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let worker = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(message) = rx.blocking_recv() {
                    match message {
                        Message::Run(job) => {
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                tracing::error!("daemon worker job panicked");
                            }
                        }
                        Message::Stop => break,
                    }
                }
                tracing::debug!("daemon worker stopped");
            })?;
        Ok(Self {
            handle: DispatchHandle { tx },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Queue `f` on the worker.
    pub fn submit<T, F>(&self, f: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.handle.submit(f)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Message::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("daemon worker thread panicked");
            }
        }
    }
}

impl DispatchHandle {
    /// Queue `f` on the worker. If the worker has stopped, the returned
    /// value resolves to [`Error::WorkerGone`].
    pub fn submit<T, F>(&self, f: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = tx.send(f());
        });
        if self.tx.send(Message::Run(job)).is_err() {
            tracing::warn!("daemon worker is gone, dropping job");
        }
        Pending { rx }
    }
}

/// The eventual result of a worker job.
#[must_use = "a pending result does nothing unless waited on or polled"]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Pending<T> {
    /// A result that is already available, without involving the worker.
    pub fn ready(value: T) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(value);
        Pending { rx }
    }

    /// Block the calling thread until the job finishes.
    ///
    /// Must not be called from inside an async runtime; `.await` the value
    /// there instead.
    pub fn wait(self) -> Result<T> {
        self.rx.blocking_recv().map_err(|_| Error::WorkerGone)
    }

    /// Take the result if the job has finished.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::WorkerGone)),
        }
    }
}

impl<T> Pending<Result<T>> {
    /// Wait and flatten the job's own result.
    pub fn join(self) -> Result<T> {
        self.wait()?
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|r| r.map_err(|_| Error::WorkerGone))
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
