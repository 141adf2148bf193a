//! Immutable source text shared between pipeline steps.

use crate::result::{Error, Result};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::sync::Arc;

/// The text of one compilation unit at one point in the pipeline.
///
/// A buffer is never mutated. A pass reads one buffer and produces a new one, so any AST
/// compiled from a buffer stays valid for exactly that buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    text: Arc<str>,
}

impl SourceBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns `true` when `start..end` is in bounds and both ends sit on char boundaries.
    pub fn is_valid_range(&self, start: usize, end: usize) -> bool {
        start <= end
            && end <= self.text.len()
            && self.text.is_char_boundary(start)
            && self.text.is_char_boundary(end)
    }

    /// Borrows the bytes `start..end` as text.
    pub fn slice(&self, start: usize, end: usize) -> Result<&str> {
        if !self.is_valid_range(start, end) {
            return Err(Error::MalformedOffset {
                start,
                end,
                len: self.text.len(),
            });
        }
        Ok(&self.text[start..end])
    }

    /// Keccak-256 of the text, used to bind an AST to the buffer it came from.
    pub fn fingerprint(&self) -> [u8; 32] {
        Keccak256::digest(self.text.as_bytes()).into()
    }

    /// Number of lines, for reporting.
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

impl fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("len", &self.text.len())
            .field("fingerprint", &hex::encode(&self.fingerprint()[..4]))
            .finish()
    }
}

impl fmt::Display for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<String> for SourceBuffer {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for SourceBuffer {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
