// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal-edit patching of a live buffer.
//!
//! Replacing a whole buffer with the formatter's output would reset the
//! caret, every other selection, the scroll position and the undo history.
//! Instead the two texts are diffed per character and only the changed spans
//! are touched.
//!
//! Edits are applied front to back with a single running position into the
//! buffer being mutated:
//!
//! - `Keep(n)` advances the position by `n`.
//! - `Insert(text)` inserts at the position, then advances past it.
//! - `Delete(n)` erases `n` chars at the position and does not advance.
//!
//! The order is load-bearing: the position is only valid against the buffer
//! as mutated by all previous edits.

use std::time::Duration;

use similar::{Algorithm, DiffTag, TextDiff};

use crate::buffer::TextBuffer;
use crate::error::{Error, Result};

/// Upper bound on diff time. Past it `similar` falls back to a coarser (but
/// still correct) script.
const DIFF_TIMEOUT: Duration = Duration::from_secs(1);

/// One step of a patch. Lengths are in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Keep(usize),
    Insert(String),
    Delete(usize),
}

/// What an applied patch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    /// Insert and delete steps applied.
    pub mutations: usize,
    /// Chars inserted.
    pub inserted: usize,
    /// Chars deleted.
    pub deleted: usize,
}

impl PatchSummary {
    pub fn is_empty(&self) -> bool {
        self.mutations == 0
    }
}

/// Compute the edit script turning `original` into `formatted`.
///
/// Identical inputs produce no edits, and a trailing `Keep` is never
/// emitted.
pub fn diff(original: &str, formatted: &str) -> Vec<Edit> {
    if original == formatted {
        return Vec::new();
    }

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_chars(original, formatted);
    let new_slices = diff.new_slices();

    let mut edits = Vec::new();
    for op in diff.ops() {
        let (tag, old, new) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => push(&mut edits, Edit::Keep(old.len())),
            DiffTag::Delete => push(&mut edits, Edit::Delete(old.len())),
            DiffTag::Insert => push(&mut edits, Edit::Insert(new_slices[new].concat())),
            DiffTag::Replace => {
                push(&mut edits, Edit::Delete(old.len()));
                push(&mut edits, Edit::Insert(new_slices[new].concat()));
            }
        }
    }

    if matches!(edits.last(), Some(Edit::Keep(_))) {
        edits.pop();
    }
    edits
}

/// Append `edit`, merging it into the previous step when they are the same
/// kind. Empty steps are dropped.
fn push(edits: &mut Vec<Edit>, edit: Edit) {
    match &edit {
        Edit::Keep(0) | Edit::Delete(0) => return,
        Edit::Insert(text) if text.is_empty() => return,
        _ => {}
    }
    match (edits.last_mut(), &edit) {
        (Some(Edit::Keep(n)), Edit::Keep(m)) | (Some(Edit::Delete(n)), Edit::Delete(m)) => {
            *n += m;
            return;
        }
        (Some(Edit::Insert(prev)), Edit::Insert(text)) => {
            prev.push_str(text);
            return;
        }
        _ => {}
    }
    edits.push(edit);
}

/// Apply `edits` to `buffer`, starting at offset 0.
pub fn apply<B: TextBuffer + ?Sized>(buffer: &mut B, edits: &[Edit]) -> Result<PatchSummary> {
    let mut summary = PatchSummary::default();
    let mut point = 0;
    for edit in edits {
        match edit {
            Edit::Keep(n) => {
                point += n;
                let len = buffer.char_len();
                if point > len {
                    return Err(Error::OutOfRange { offset: point, len });
                }
            }
            Edit::Insert(text) => {
                buffer.insert(point, text)?;
                let n = text.chars().count();
                point += n;
                summary.inserted += n;
                summary.mutations += 1;
            }
            Edit::Delete(n) => {
                buffer.erase(point, *n)?;
                summary.deleted += n;
                summary.mutations += 1;
            }
        }
    }
    Ok(summary)
}

/// Bring `buffer` (currently holding `original`) to `formatted` through
/// minimal edits, then move the caret to `cursor` when one is given.
///
/// Without a cursor hint the caret stays wherever the edits pushed it.
pub fn patch<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    original: &str,
    formatted: &str,
    cursor: Option<usize>,
) -> Result<PatchSummary> {
    let edits = diff(original, formatted);
    let summary = apply(buffer, &edits)?;
    if let Some(at) = cursor {
        buffer.set_cursor(at);
    }
    Ok(summary)
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
