// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-buffer formattability.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether, and with which parser, a buffer can be formatted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "parser")]
pub enum BufferStatus {
    /// Formattable with the named parser.
    Formattable(String),
    /// Excluded by configuration or by the daemon's ignore file.
    Ignored,
    /// No parser applies.
    Off,
    /// Not classified yet.
    Unknown,
}

impl BufferStatus {
    /// The parser name, for formattable buffers only.
    pub fn parser(&self) -> Option<&str> {
        match self {
            BufferStatus::Formattable(parser) => Some(parser),
            _ => None,
        }
    }

    pub fn is_formattable(&self) -> bool {
        matches!(self, BufferStatus::Formattable(_))
    }

    /// True once classification produced a definite answer.
    pub fn is_known(&self) -> bool {
        !matches!(self, BufferStatus::Unknown)
    }
}

impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferStatus::Formattable(parser) => f.write_str(parser),
            BufferStatus::Ignored => f.write_str("ignored"),
            BufferStatus::Off => f.write_str("off"),
            BufferStatus::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
