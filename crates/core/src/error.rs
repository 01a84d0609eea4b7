// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for fmtd-core operations.

use thiserror::Error;

/// All possible errors that can occur in fmtd-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("offset {offset} out of range (buffer has {len} chars)")]
    OutOfRange { offset: usize, len: usize },

    #[error("buffer has no file to save to")]
    NoFilePath,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for fmtd-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
