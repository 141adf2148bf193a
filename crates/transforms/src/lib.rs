pub mod booleans;
pub mod callgraph;
pub mod chaotic;
pub mod comments;
pub mod flatten;
pub mod format;
pub mod inline;
pub mod integers;
pub mod local_state;
pub mod obfuscator;
pub mod opaque_predicate;
pub mod pipeline;
pub mod rename;
pub mod scalar_struct;
pub mod static_data;
pub mod text;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use shroud_core::{SourceAst, SourceBuffer};
use std::path::Path;
use thiserror::Error;

/// Transform error type encompassing all transform module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Core operation failed.
    #[error(transparent)]
    Core(#[from] shroud_core::Error),

    /// A pass that needs an AST was run without one.
    #[error("pass {0} requires an AST")]
    MissingAst(&'static str),

    /// A pass could not complete.
    #[error("{pass} failed: {reason}")]
    PassFailed {
        /// Name of the failing pass.
        pass: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// Unknown pass name in a pass list.
    #[error("unknown pass: {0}")]
    UnknownPass(String),

    /// Configuration file could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Transform result type
pub type Result<T> = std::result::Result<T, Error>;

/// What one pass produced.
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub source: SourceBuffer,
    pub changes: usize,
}

impl PassOutput {
    /// Output for a pass that found nothing to do.
    pub fn unchanged(source: &SourceBuffer) -> Self {
        Self {
            source: source.clone(),
            changes: 0,
        }
    }
}

/// One source-to-source obfuscation step.
pub trait Pass: Send + Sync {
    /// Returns the pass name for logging and identification.
    fn name(&self) -> &'static str;

    /// Whether the pass can only run with an AST of the current source.
    fn requires_ast(&self) -> bool {
        true
    }

    /// Rewrites `source`. `ast`, when present, was compiled from exactly `source`.
    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        rng: &mut StdRng,
    ) -> Result<PassOutput>;
}

/// Configuration for transform passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Prefix of every obfuscated identifier
    pub rename_prefix: String,
    /// Hex characters of the name hash kept after the prefix
    pub rename_hash_len: usize,
    /// Rename contract names as well
    pub rename_contracts: bool,
    /// Upper bound on integer literals disguised per run (0 = unlimited)
    pub integer_max_per_unit: usize,
    /// Upper bound on boolean literals disguised per run (0 = unlimited)
    pub boolean_max_per_unit: usize,
    /// Functions with fewer top-level statements than this are not flattened
    /// unless they branch
    pub flatten_min_statements: usize,
    /// Chaotic-map variants the opaque predicate may pick from
    pub opaque_variants: Vec<chaotic::Variant>,
    /// Keep the SPDX license comment when stripping comments
    pub strip_keep_license: bool,
    /// Collapse the scrambled layout onto as few lines as possible
    pub format_one_line: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            rename_prefix: "OX".to_string(),
            rename_hash_len: 8,
            rename_contracts: false,
            integer_max_per_unit: 0,
            boolean_max_per_unit: 0,
            flatten_min_statements: 2,
            opaque_variants: chaotic::Variant::ALL.to_vec(),
            strip_keep_license: true,
            format_one_line: true,
        }
    }
}

impl PassConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

/// Registry names in the default pipeline order.
pub const DEFAULT_ORDER: &[&str] = &[
    "inline",
    "opaque",
    "flatten",
    "local_state",
    "static_data",
    "boolean",
    "integer",
    "scalar",
    "comments",
    "format",
    "rename",
];

/// Builds a pass from its registry name.
pub fn pass_by_name(name: &str, config: &PassConfig) -> Result<Box<dyn Pass>> {
    let pass: Box<dyn Pass> = match name.trim() {
        "comments" | "strip_comments" => Box::new(comments::CommentStripper::new(config)),
        "format" => Box::new(format::FormatScrambler::new(config)),
        "inline" => Box::new(inline::Inliner::new()),
        "opaque" | "opaque_predicate" => Box::new(opaque_predicate::OpaquePredicate::new(config)),
        "flatten" => Box::new(flatten::Flattener::new(config)),
        "local_state" => Box::new(local_state::LocalToState::new()),
        "static_data" => Box::new(static_data::StaticData::new()),
        "boolean" => Box::new(booleans::BooleanDisguise::new(config)),
        "integer" => Box::new(integers::IntegerDisguise::new(config)),
        "scalar" => Box::new(scalar_struct::ScalarGrouping::new()),
        "rename" => Box::new(rename::Renamer::new(config)),
        other => return Err(Error::UnknownPass(other.to_string())),
    };
    Ok(pass)
}

/// Builds passes from a comma-separated list of registry names.
pub fn build_passes(list: &str, config: &PassConfig) -> Result<Vec<Box<dyn Pass>>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| pass_by_name(name, config))
        .collect()
}

/// Every pass in the default order.
pub fn default_passes(config: &PassConfig) -> Vec<Box<dyn Pass>> {
    DEFAULT_ORDER
        .iter()
        .filter_map(|name| pass_by_name(name, config).ok())
        .collect()
}
