// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response calls to the daemon over localhost TCP.
//!
//! Each call opens a fresh connection, writes one request, half-closes the
//! write side and reads until the daemon closes. Every request carries a
//! fresh id from a counter shared by all clones of the channel; a response is
//! only accepted while its id is still the latest one issued.

use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fmtd_ipc::{framing, Method, Outcome, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// A raw daemon reply, not yet checked for staleness.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Id of the request this reply answers.
    pub request_id: u64,
    pub method: Method,
    pub response: Response,
}

impl Reply {
    /// The id the daemon echoed, or the request id when it echoed none.
    pub fn id(&self) -> u64 {
        self.response.id.unwrap_or(self.request_id)
    }
}

/// Client end of the daemon protocol.
#[derive(Debug, Clone)]
pub struct RpcChannel {
    addr: SocketAddr,
    last_id: Arc<AtomicU64>,
}

impl RpcChannel {
    /// A channel to `127.0.0.1:port`.
    pub fn new(port: u16) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            last_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The highest id issued so far (0 before the first call).
    pub fn latest_id(&self) -> u64 {
        self.last_id.load(Ordering::SeqCst)
    }

    /// True while no newer request has been issued since `id`.
    pub fn is_current(&self, id: u64) -> bool {
        id == self.latest_id()
    }

    fn next_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Send `method` with `params` and return the unchecked reply.
    pub fn call<P: Serialize>(
        &self,
        method: Method,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        let request = Request::new(self.next_id(), method, params)?;
        self.exchange(request, timeout)
    }

    /// Send `method` without parameters.
    pub fn call_bare(&self, method: Method, timeout: Option<Duration>) -> Result<Reply> {
        let request = Request::bare(self.next_id(), method);
        self.exchange(request, timeout)
    }

    /// Check a reply for staleness, then unwrap its outcome.
    ///
    /// Staleness is judged first so a superseded `err` is dropped silently
    /// like a superseded `ok`.
    pub fn accept(&self, reply: Reply) -> Result<Value> {
        let id = reply.id();
        if id != reply.request_id || !self.is_current(id) {
            tracing::warn!(
                id,
                latest = self.latest_id(),
                method = %reply.method,
                "dropping stale response"
            );
            return Err(Error::Stale {
                id,
                latest: self.latest_id(),
            });
        }
        match reply.response.outcome {
            Outcome::Ok(payload) => Ok(payload),
            Outcome::Err(message) => Err(Error::Application(message)),
        }
    }

    /// [`accept`](Self::accept) and decode the payload into `T`.
    pub fn accept_as<T: DeserializeOwned>(&self, reply: Reply) -> Result<T> {
        let method = reply.method;
        let payload = self.accept(reply)?;
        serde_json::from_value(payload)
            .map_err(|e| Error::Transport(format!("unexpected '{}' payload: {}", method, e)))
    }

    /// Call and accept in one step.
    pub fn request<P: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let reply = self.call(method, params, timeout)?;
        self.accept_as(reply)
    }

    /// Call a parameterless method and accept the reply.
    pub fn request_bare(&self, method: Method, timeout: Option<Duration>) -> Result<Value> {
        let reply = self.call_bare(method, timeout)?;
        self.accept(reply)
    }

    fn exchange(&self, request: Request, timeout: Option<Duration>) -> Result<Reply> {
        let method = request.method;
        let request_id = request.id;
        tracing::debug!(id = request_id, %method, port = self.port(), "daemon call");

        let io_error = |e: std::io::Error| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout {
                method,
                after: timeout.unwrap_or_default(),
            },
            _ => Error::Transport(format!("{} {}: {}", method, self.addr, e)),
        };

        let mut stream = match timeout {
            Some(t) => TcpStream::connect_timeout(&self.addr, t),
            None => TcpStream::connect(self.addr),
        }
        .map_err(io_error)?;
        stream.set_read_timeout(timeout).map_err(io_error)?;
        stream.set_write_timeout(timeout).map_err(io_error)?;

        framing::write_message(&mut stream, &request).map_err(io_error)?;
        stream.flush().map_err(io_error)?;
        stream.shutdown(Shutdown::Write).map_err(io_error)?;

        let bytes = framing::read_message(&mut stream).map_err(io_error)?;
        let response = Response::parse(&bytes)?;
        tracing::debug!(id = ?response.id, %method, bytes = bytes.len(), "daemon reply");

        Ok(Reply {
            request_id,
            method,
            response,
        })
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
