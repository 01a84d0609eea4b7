// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-buffer formattability cache.
//!
//! A buffer is classified at most once; the answer stays until the buffer
//! closes or the whole cache is invalidated. Classification order:
//!
//! 1. A basename matching `file_exclude_patterns` is `Ignored`.
//! 2. A basename matching an `overrides` glob is formattable with the mapped
//!    parser.
//! 3. Otherwise the daemon's `getFileInfo` decides.
//!
//! Rules 1 and 2 never touch the daemon.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fmtd_core::buffer::extension_of;
use fmtd_core::{BufferId, BufferStatus, TextBuffer};
use fmtd_ipc::FileInfo;
use glob::Pattern;

use crate::config::Settings;
use crate::error::{Error, Result};

/// Name used for buffers that were never saved.
const SYNTHETIC_STEM: &str = "main";

/// The identity of a buffer, detached from its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    pub id: BufferId,
    pub path: Option<PathBuf>,
    /// Extension with leading dot.
    pub extension: Option<String>,
}

impl BufferInfo {
    pub fn of<B: TextBuffer + ?Sized>(buffer: &B) -> Self {
        Self {
            id: buffer.id(),
            path: buffer.file_path().map(Path::to_path_buf),
            extension: extension_of(buffer),
        }
    }

    /// Path sent to the daemon: the backing file, or `main<ext>` for an
    /// unsaved buffer. `None` when there is nothing to go on.
    pub fn lookup_path(&self) -> Option<String> {
        match (&self.path, &self.extension) {
            (Some(path), _) => Some(path.to_string_lossy().into_owned()),
            (None, Some(ext)) => Some(format!("{}{}", SYNTHETIC_STEM, ext)),
            (None, None) => None,
        }
    }

    /// Basename matched against the local rules.
    fn basename(&self) -> Option<String> {
        let path = self.lookup_path()?;
        Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Local exclude and override globs, compiled once.
#[derive(Debug, Clone, Default)]
pub struct ClassifyRules {
    exclude: Vec<Pattern>,
    overrides: Vec<(Pattern, String)>,
}

impl ClassifyRules {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let exclude = settings
            .file_exclude_patterns
            .iter()
            .map(|p| compile(p.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let overrides = settings
            .overrides
            .iter()
            .map(|(glob, parser)| Ok((compile(glob)?, parser.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { exclude, overrides })
    }

    pub fn is_excluded(&self, basename: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(basename))
    }

    /// Parser forced by the first matching override.
    pub fn override_for(&self, basename: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|(pattern, _)| pattern.matches(basename))
            .map(|(_, parser)| parser.as_str())
    }
}

fn compile(glob: &str) -> Result<Pattern> {
    Pattern::new(glob).map_err(|e| Error::Config(format!("invalid glob '{}': {}", glob, e)))
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Answered without the daemon.
    Known(BufferStatus),
    /// Ask the daemon about this path, then [`BufferCache::record`].
    AskDaemon(String),
}

/// Map a `getFileInfo` answer to a status. `ignored` wins over a parser.
pub fn status_from_file_info(info: &FileInfo) -> BufferStatus {
    if info.ignored {
        return BufferStatus::Ignored;
    }
    match info.inferred_parser.as_deref() {
        Some(parser) if !parser.is_empty() => BufferStatus::Formattable(parser.to_string()),
        _ => BufferStatus::Off,
    }
}

/// Saving one of these files changes what the daemon resolves.
pub fn triggers_invalidation(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.contains("prettierrc") || name == "package.json")
}

/// Memoized buffer statuses.
#[derive(Debug, Default)]
pub struct BufferCache {
    rules: ClassifyRules,
    entries: HashMap<BufferId, BufferStatus>,
}

impl BufferCache {
    pub fn new(rules: ClassifyRules) -> Self {
        Self {
            rules,
            entries: HashMap::new(),
        }
    }

    /// Cached status, `Unknown` if the buffer was never classified.
    pub fn get(&self, id: BufferId) -> BufferStatus {
        self.entries
            .get(&id)
            .cloned()
            .unwrap_or(BufferStatus::Unknown)
    }

    /// Resolve what can be resolved locally.
    ///
    /// A buffer with neither a path nor an extension is `Off` and is not
    /// cached, since it may gain a syntax later.
    pub fn lookup(&mut self, info: &BufferInfo) -> Lookup {
        if let Some(status) = self.entries.get(&info.id) {
            return Lookup::Known(status.clone());
        }
        let (Some(path), Some(name)) = (info.lookup_path(), info.basename()) else {
            return Lookup::Known(BufferStatus::Off);
        };

        if self.rules.is_excluded(&name) {
            tracing::debug!(buffer = info.id.0, name = %name, "excluded by pattern");
            return Lookup::Known(self.record(info.id, BufferStatus::Ignored));
        }
        if let Some(parser) = self.rules.override_for(&name) {
            tracing::debug!(buffer = info.id.0, name = %name, parser, "parser override");
            let status = BufferStatus::Formattable(parser.to_string());
            return Lookup::Known(self.record(info.id, status));
        }
        Lookup::AskDaemon(path)
    }

    /// Store the status for `id` and hand it back.
    pub fn record(&mut self, id: BufferId, status: BufferStatus) -> BufferStatus {
        self.entries.insert(id, status.clone());
        status
    }

    /// Drop the entry for a closed buffer.
    pub fn remove(&mut self, id: BufferId) -> Option<BufferStatus> {
        self.entries.remove(&id)
    }

    /// Forget every classification.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
