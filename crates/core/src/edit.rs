//! Byte-range edit algebra shared by every pass.
//!
//! A pass never splices text directly. It proposes [`EditOp`]s against the buffer its AST was
//! compiled from, then [`EditSet::finalize`] orders them and resolves overlaps
//! deterministically, and [`apply`] rewrites the buffer back to front so earlier offsets
//! stay valid while later ones change.

use crate::ast::SrcRange;
use crate::result::Error;
use crate::source::SourceBuffer;
use std::cmp::Reverse;
use tracing::{debug, warn};

/// One proposed replacement of `start..end` (byte offsets) with `replacement`.
///
/// `start == end` is a pure insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOp {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
    pub tag: &'static str,
}

impl EditOp {
    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.is_insertion() && self.replacement.is_empty()
    }

    fn range(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}

/// The outcome of [`EditSet::finalize`].
#[derive(Debug, Default)]
pub struct Finalized {
    /// Kept ops, sorted ascending and pairwise non-overlapping.
    pub ops: Vec<EditOp>,
    /// Ops rejected for out-of-bounds or split-codepoint ranges.
    pub malformed: Vec<(EditOp, Error)>,
    /// Ops discarded because they collided with an op that was already kept.
    pub conflicts: Vec<(EditOp, Error)>,
}

impl Finalized {
    pub fn dropped(&self) -> usize {
        self.malformed.len() + self.conflicts.len()
    }
}

/// Collects edit proposals for one pass over one buffer.
#[derive(Debug, Default, Clone)]
pub struct EditSet {
    ops: Vec<EditOp>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    /// Proposes replacing `start..end` with `replacement`.
    pub fn propose(
        &mut self,
        start: usize,
        end: usize,
        replacement: impl Into<String>,
        tag: &'static str,
    ) {
        self.ops.push(EditOp {
            start,
            end,
            replacement: replacement.into(),
            tag,
        });
    }

    /// Proposes inserting `text` at `at`.
    pub fn insert(&mut self, at: usize, text: impl Into<String>, tag: &'static str) {
        self.propose(at, at, text, tag);
    }

    /// Proposes replacing exactly the span of an AST node.
    pub fn replace(&mut self, src: &SrcRange, replacement: impl Into<String>, tag: &'static str) {
        self.propose(src.start, src.end(), replacement, tag);
    }

    /// Proposes deleting `start..end`.
    pub fn delete(&mut self, start: usize, end: usize, tag: &'static str) {
        self.propose(start, end, String::new(), tag);
    }

    pub fn extend(&mut self, other: EditSet) {
        self.ops.extend(other.ops);
    }

    /// Validates, orders and de-conflicts the proposals against `source`.
    ///
    /// Ops are sorted by start offset. At equal starts insertions come before
    /// replacements, then longer ranges before shorter ones, then proposal order.
    /// A sweep keeps an op only when it starts at or after the end of the last kept op.
    /// Exact duplicates collapse into one op.
    pub fn finalize(&self, source: &SourceBuffer) -> Finalized {
        let mut out = Finalized::default();
        let mut candidates: Vec<EditOp> = Vec::with_capacity(self.ops.len());

        for op in &self.ops {
            if !source.is_valid_range(op.start, op.end) {
                let err = Error::MalformedOffset {
                    start: op.start,
                    end: op.end,
                    len: source.len(),
                };
                warn!("[{}] dropping edit: {}", op.tag, err);
                out.malformed.push((op.clone(), err));
                continue;
            }
            if op.is_empty() || candidates.contains(op) {
                continue;
            }
            candidates.push(op.clone());
        }

        candidates.sort_by_key(|op| (op.start, !op.is_insertion(), Reverse(op.len())));

        let mut last_end = 0usize;
        let mut last_kept: Option<(usize, usize)> = None;
        for op in candidates {
            if op.start >= last_end {
                last_end = op.end;
                last_kept = Some(op.range());
                out.ops.push(op);
            } else {
                let err = Error::OverlapConflict {
                    kept: last_kept.unwrap_or((0, last_end)),
                    dropped: op.range(),
                };
                debug!("[{}] {}", op.tag, err);
                out.conflicts.push((op, err));
            }
        }
        out
    }

    /// Finalizes and applies in one step, returning the new buffer and the number of
    /// edits that were applied.
    pub fn commit(&self, source: &SourceBuffer) -> (SourceBuffer, usize) {
        let finalized = self.finalize(source);
        if finalized.dropped() > 0 {
            debug!(
                "{} edits dropped ({} malformed, {} conflicting)",
                finalized.dropped(),
                finalized.malformed.len(),
                finalized.conflicts.len()
            );
        }
        let applied = finalized.ops.len();
        (apply(source, &finalized.ops), applied)
    }
}

/// Applies finalized ops, last offset first.
///
/// `ops` must come from [`EditSet::finalize`] against the same `source`.
pub fn apply(source: &SourceBuffer, ops: &[EditOp]) -> SourceBuffer {
    if ops.is_empty() {
        return source.clone();
    }
    let mut text = source.as_str().to_string();
    for op in ops.iter().rev() {
        text.replace_range(op.start..op.end, &op.replacement);
    }
    SourceBuffer::new(text)
}
