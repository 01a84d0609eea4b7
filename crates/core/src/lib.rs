// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fmtd-core: editor-side building blocks for the fmtd formatter client.
//!
//! Nothing in this crate performs network or process I/O. It holds the
//! buffer abstraction the client mutates, the typed per-buffer status, and
//! the patch engine that turns a formatted document into minimal edits.

pub mod buffer;
pub mod error;
pub mod parser;
pub mod patch;
pub mod status;

pub use buffer::{BufferId, MemoryBuffer, TextBuffer};
pub use error::{Error, Result};
pub use patch::{Edit, PatchSummary};
pub use status::BufferStatus;
