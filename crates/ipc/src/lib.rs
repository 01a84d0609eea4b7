// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between `fmtd` and the formatter daemon.
//!
//! Every call opens a fresh TCP connection and carries exactly one JSON
//! document in each direction. The client half-closes its write side to mark
//! the end of the request; the daemon closes the connection after writing the
//! response. No length prefix is used.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token the daemon prints when its port is already bound.
pub const ADDR_IN_USE: &str = "EADDRINUSE";

/// Errors raised while decoding daemon traffic.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty response")]
    Empty,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unknown method: '{0}'")]
    UnknownMethod(String),
}

/// RPC methods understood by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    /// Liveness check.
    Ping,
    /// Ask which parser (if any) applies to a path.
    GetFileInfo,
    /// Format a document.
    Format,
    /// Drop the daemon's resolved-config cache.
    ClearConfigCache,
    /// Ask the daemon to exit.
    Quit,
}

impl Method {
    /// Returns the method name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Ping => "ping",
            Method::GetFileInfo => "getFileInfo",
            Method::Format => "format",
            Method::ClearConfigCache => "clearConfigCache",
            Method::Quit => "quit",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, ProtocolError> {
        match s {
            "ping" => Ok(Method::Ping),
            "getFileInfo" => Ok(Method::GetFileInfo),
            "format" => Ok(Method::Format),
            "clearConfigCache" => Ok(Method::ClearConfigCache),
            "quit" => Ok(Method::Quit),
            _ => Err(ProtocolError::UnknownMethod(s.to_string())),
        }
    }
}

/// A single request sent to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number, strictly increasing per client.
    pub id: u64,
    pub method: Method,
    /// Method parameters, `null` when the method takes none.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Build a request with typed parameters.
    pub fn new<P: Serialize>(id: u64, method: Method, params: &P) -> Result<Self, ProtocolError> {
        Ok(Request {
            id,
            method,
            params: serde_json::to_value(params)?,
        })
    }

    /// Build a request without parameters.
    pub fn bare(id: u64, method: Method) -> Self {
        Request {
            id,
            method,
            params: Value::Null,
        }
    }
}

/// Result half of a response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `{"ok": payload}`
    Ok(Value),
    /// `{"err": message}`
    Err(String),
}

/// A decoded daemon response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Echoed request id. Older daemons may omit it.
    pub id: Option<u64>,
    pub outcome: Outcome,
}

impl Response {
    pub fn ok(id: u64, payload: Value) -> Self {
        Response {
            id: Some(id),
            outcome: Outcome::Ok(payload),
        }
    }

    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Response {
            id: Some(id),
            outcome: Outcome::Err(message.into()),
        }
    }

    /// Decode a response from the raw bytes read off a connection.
    ///
    /// `ok` wins if a daemon ever sends both keys. A non-string `err` is kept
    /// as its JSON text.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::Empty);
        }
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::Malformed(
                "response is not a JSON object".to_string(),
            ));
        };

        let id = map.get("id").and_then(Value::as_u64);
        if let Some(payload) = map.remove("ok") {
            return Ok(Response {
                id,
                outcome: Outcome::Ok(payload),
            });
        }
        match map.remove("err") {
            Some(Value::String(message)) => Ok(Response {
                id,
                outcome: Outcome::Err(message),
            }),
            Some(other) => Ok(Response {
                id,
                outcome: Outcome::Err(other.to_string()),
            }),
            None => Err(ProtocolError::Malformed(
                "response has neither 'ok' nor 'err'".to_string(),
            )),
        }
    }

    /// Encode the response the way the daemon writes it.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(id) = self.id {
            map.insert("id".to_string(), Value::from(id));
        }
        match &self.outcome {
            Outcome::Ok(payload) => map.insert("ok".to_string(), payload.clone()),
            Outcome::Err(message) => map.insert("err".to_string(), Value::from(message.clone())),
        };
        Value::Object(map)
    }
}

/// Parameters of `getFileInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfoParams {
    pub path: String,
}

/// Payload of a successful `getFileInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub ignored: bool,
    #[serde(default, rename = "inferredParser")]
    pub inferred_parser: Option<String>,
}

/// Parameters of `format`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatParams {
    pub path: String,
    pub contents: String,
    pub parser: String,
    /// Cursor offset in characters, `null` when cursor tracking is off.
    pub cursor: Option<usize>,
}

/// Payload of a successful `format`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formatted {
    pub formatted: String,
    /// Post-format cursor offset. Negative when the daemon could not map it.
    #[serde(default, rename = "cursorOffset")]
    pub cursor_offset: Option<i64>,
}

impl Formatted {
    /// The reported cursor position, if it is a usable offset.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor_offset.and_then(|c| usize::try_from(c).ok())
    }
}

/// Interpretation of the first line a freshly spawned daemon prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// `{"ok": <port>}`: the daemon is listening.
    Listening(u16),
    /// The line mentions `EADDRINUSE`: another process holds the port.
    AddrInUse,
    /// `{"err": message}`: the daemon gave up during startup.
    Failed(String),
    /// Anything else.
    Unrecognized(String),
}

impl Handshake {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.contains(ADDR_IN_USE) {
            return Handshake::AddrInUse;
        }
        match Response::parse(line.as_bytes()) {
            Ok(Response {
                outcome: Outcome::Ok(port),
                ..
            }) => match port.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => Handshake::Listening(port),
                None => Handshake::Unrecognized(line.to_string()),
            },
            Ok(Response {
                outcome: Outcome::Err(message),
                ..
            }) => Handshake::Failed(message),
            Err(_) => Handshake::Unrecognized(line.to_string()),
        }
    }
}

/// Half-close framing: one document per direction, ended by the writer
/// closing its side.
pub mod framing {
    use std::io::{Read, Write};

    use serde::Serialize;

    /// Upper bound on a response body. Formatted documents are large, so this
    /// is generous.
    pub const MAX_MESSAGE_SIZE: u64 = 64 * 1024 * 1024;

    /// Serialize `message` and write it in full. The caller closes the write
    /// side afterwards.
    pub fn write_message<W: Write, T: Serialize>(
        writer: &mut W,
        message: &T,
    ) -> std::io::Result<()> {
        let json = serde_json::to_vec(message)
            .map_err(|e| std::io::Error::other(format!("serialize error: {}", e)))?;
        writer.write_all(&json)?;
        writer.flush()
    }

    /// Read until the peer closes its side.
    pub fn read_message<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        reader.take(MAX_MESSAGE_SIZE + 1).read_to_end(&mut buf)?;
        if buf.len() as u64 > MAX_MESSAGE_SIZE {
            return Err(std::io::Error::other(format!(
                "message too large (max {} bytes)",
                MAX_MESSAGE_SIZE
            )));
        }
        Ok(buf)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
