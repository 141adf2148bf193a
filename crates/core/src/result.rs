//! Core results and error types

use thiserror::Error;

/// Core error type encompassing all core module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The AST provider could not produce an AST for the current source.
    #[error("compiler unavailable: {0}")]
    CompileUnavailable(String),

    /// The compiler process did not finish within the configured timeout.
    #[error("compiler timed out after {0:?}")]
    CompilerTimeout(std::time::Duration),

    /// Failed to read file at the specified path.
    #[error("could not read file '{path}': {source}")]
    FileRead {
        /// The path to the file that could not be read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Two distinct identifiers hash to the same obfuscated name.
    #[error("rename collision: '{first}' and '{second}' both map to '{hashed}'")]
    HashCollision {
        /// The identifier that claimed the name first.
        first: String,
        /// The identifier that collided with it.
        second: String,
        /// The shared obfuscated name.
        hashed: String,
    },

    /// Invalid hexadecimal in seed.
    #[error("invalid hexadecimal in seed")]
    InvalidSeedHex,

    /// Invalid seed length.
    #[error("invalid seed length: expected 64 hex chars, got {0}")]
    InvalidSeedLength(usize),

    /// A `src` attribute did not have the `start:length:file` shape.
    #[error("invalid src attribute '{0}'")]
    InvalidSrc(String),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The AST JSON is missing a field or has an unexpected shape.
    #[error("malformed ast: {0}")]
    MalformedAst(String),

    /// A byte range is out of bounds or splits a multi-byte character.
    #[error("malformed offset {start}..{end} for buffer of {len} bytes")]
    MalformedOffset {
        /// Range start.
        start: usize,
        /// Range end (exclusive).
        end: usize,
        /// Length of the buffer the range was checked against.
        len: usize,
    },

    /// A proposed edit overlapped an edit that was already kept.
    #[error("edit {dropped:?} overlaps kept edit {kept:?}")]
    OverlapConflict {
        /// Range of the edit that won.
        kept: (usize, usize),
        /// Range of the edit that was discarded.
        dropped: (usize, usize),
    },

    /// An AST was used against a buffer other than the one it was compiled from.
    #[error("ast does not belong to the current source buffer")]
    StaleAst,
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;
