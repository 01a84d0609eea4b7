// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The text buffer abstraction the formatter client edits.
//!
//! Offsets and lengths are counted in chars, never bytes, so a host editor
//! can map them onto its own point model.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an open buffer. Stable for the buffer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl BufferId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A live, editable document as seen by the formatter client.
pub trait TextBuffer {
    fn id(&self) -> BufferId;

    /// Backing file, if the buffer has been saved at least once.
    fn file_path(&self) -> Option<&Path>;

    /// File extension implied by the buffer's syntax (e.g. `".rb"`), used
    /// when there is no backing file.
    fn syntax_extension(&self) -> Option<&str>;

    /// Full contents.
    fn text(&self) -> String;

    /// Length in chars.
    fn char_len(&self) -> usize;

    /// Insert `text` at char offset `at`.
    fn insert(&mut self, at: usize, text: &str) -> Result<()>;

    /// Remove `len` chars starting at `at`.
    fn erase(&mut self, at: usize, len: usize) -> Result<()>;

    /// Primary caret position.
    fn cursor(&self) -> Option<usize>;

    /// Collapse the selection to a caret at `at`.
    fn set_cursor(&mut self, at: usize);

    /// Persist the contents to the backing file.
    fn save(&mut self) -> Result<()>;
}

/// Extension (with leading dot) used to pick a parser for `buffer`.
///
/// The file name wins; the syntax mapping is the fallback.
pub fn extension_of<B: TextBuffer + ?Sized>(buffer: &B) -> Option<String> {
    let from_path = buffer
        .file_path()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e));
    from_path.or_else(|| {
        buffer.syntax_extension().map(|ext| {
            if ext.starts_with('.') {
                ext.to_string()
            } else {
                format!(".{}", ext)
            }
        })
    })
}

/// An in-memory buffer, optionally backed by a file on disk.
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    id: BufferId,
    path: Option<PathBuf>,
    syntax_extension: Option<String>,
    text: String,
    cursor: Option<usize>,
    mutations: usize,
}

impl MemoryBuffer {
    /// A scratch buffer with no backing file.
    pub fn new(text: impl Into<String>) -> Self {
        MemoryBuffer {
            id: BufferId::next(),
            path: None,
            syntax_extension: None,
            text: text.into(),
            cursor: None,
            mutations: 0,
        }
    }

    /// A buffer that claims to be backed by `path` without reading it.
    pub fn with_path(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        MemoryBuffer {
            path: Some(path.into()),
            ..MemoryBuffer::new(text)
        }
    }

    /// Load `path` from disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        Ok(MemoryBuffer::with_path(path, text))
    }

    /// Set the syntax-derived extension (builder style).
    pub fn with_syntax_extension(mut self, ext: impl Into<String>) -> Self {
        self.syntax_extension = Some(ext.into());
        self
    }

    /// Place the caret (builder style).
    pub fn with_cursor(mut self, at: usize) -> Self {
        self.cursor = Some(at);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of insert/erase calls applied so far.
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    fn byte_offset(&self, at: usize) -> Result<usize> {
        if at == 0 {
            return Ok(0);
        }
        let mut count = 0;
        for (idx, _) in self.text.char_indices() {
            if count == at {
                return Ok(idx);
            }
            count += 1;
        }
        if count == at {
            Ok(self.text.len())
        } else {
            Err(Error::OutOfRange {
                offset: at,
                len: count,
            })
        }
    }
}

impl TextBuffer for MemoryBuffer {
    fn id(&self) -> BufferId {
        self.id
    }

    fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn syntax_extension(&self) -> Option<&str> {
        self.syntax_extension.as_deref()
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn insert(&mut self, at: usize, text: &str) -> Result<()> {
        let idx = self.byte_offset(at)?;
        self.text.insert_str(idx, text);
        self.mutations += 1;
        if let Some(cursor) = self.cursor {
            if cursor >= at {
                self.cursor = Some(cursor + text.chars().count());
            }
        }
        Ok(())
    }

    fn erase(&mut self, at: usize, len: usize) -> Result<()> {
        let start = self.byte_offset(at)?;
        let end = self.byte_offset(at + len)?;
        self.text.replace_range(start..end, "");
        self.mutations += 1;
        if let Some(cursor) = self.cursor {
            if cursor >= at + len {
                self.cursor = Some(cursor - len);
            } else if cursor > at {
                self.cursor = Some(at);
            }
        }
        Ok(())
    }

    fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn set_cursor(&mut self, at: usize) {
        self.cursor = Some(at.min(self.char_len()));
    }

    fn save(&mut self) -> Result<()> {
        let path = self.path.as_ref().ok_or(Error::NoFilePath)?;
        fs::write(path, &self.text)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
