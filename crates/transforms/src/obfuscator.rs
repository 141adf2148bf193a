use crate::pipeline::{PassReport, PassStatus, Pipeline};
use crate::{default_passes, Pass, PassConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shroud_core::seed::Seed;
use shroud_core::{AstProvider, SourceBuffer};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Configuration for the obfuscation pipeline
pub struct ObfuscationConfig {
    /// Seed for deterministic obfuscation
    pub seed: Seed,
    /// Passes to run, in order
    pub passes: Vec<Box<dyn Pass>>,
    /// Set to stop the run before the next pass
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ObfuscationConfig {
    /// Create config with a specific seed and the default pass list
    pub fn with_seed(seed: Seed) -> Self {
        Self {
            seed,
            passes: default_passes(&PassConfig::default()),
            cancel: None,
        }
    }

    /// Replace the pass list
    pub fn with_passes(mut self, passes: Vec<Box<dyn Pass>>) -> Self {
        self.passes = passes;
        self
    }
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self::with_seed(Seed::generate())
    }
}

impl std::fmt::Debug for ObfuscationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationConfig")
            .field("seed", &self.seed)
            .field("passes", &format!("{} passes", self.passes.len()))
            .finish()
    }
}

/// Result of the obfuscation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationResult {
    /// The obfuscated source text
    pub obfuscated_source: String,
    /// Original size in bytes
    pub original_size: usize,
    /// Obfuscated size in bytes
    pub obfuscated_size: usize,
    /// Size increase as percentage
    pub size_increase_percentage: f64,
    pub original_lines: usize,
    pub obfuscated_lines: usize,
    /// Metadata about the obfuscation process
    pub metadata: ObfuscationMetadata,
    /// Per-pass outcome in run order
    pub reports: Vec<PassReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationMetadata {
    /// Names of passes whose output was kept
    pub passes_applied: Vec<String>,
    /// Names of passes that returned an error
    pub passes_failed: Vec<String>,
    /// Names of passes that were skipped or whose output was rejected
    pub passes_skipped: Vec<String>,
    /// Whether the input compiled
    pub ast_available: bool,
    /// Hash of the seed, safe to publish
    pub seed_hash: String,
}

/// Runs the configured passes over one compilation unit.
pub fn obfuscate_source(
    provider: Arc<dyn AstProvider>,
    source: &SourceBuffer,
    config: &ObfuscationConfig,
) -> ObfuscationResult {
    tracing::debug!("Starting obfuscation pipeline:");
    tracing::debug!("  Passes: {}", config.passes.len());
    tracing::debug!("  Input size: {} bytes", source.len());

    let mut pipeline = Pipeline::new(provider);
    if let Some(flag) = &config.cancel {
        pipeline = pipeline.with_cancel(Arc::clone(flag));
    }
    let outcome = pipeline.run(source.clone(), &config.passes, &config.seed);

    let names = |pred: fn(&PassStatus) -> bool| -> Vec<String> {
        outcome
            .reports
            .iter()
            .filter(|r| pred(&r.status))
            .map(|r| r.name.clone())
            .collect()
    };
    let metadata = ObfuscationMetadata {
        passes_applied: names(|s| matches!(s, PassStatus::Applied { .. })),
        passes_failed: names(|s| matches!(s, PassStatus::Failed(_))),
        passes_skipped: names(|s| matches!(s, PassStatus::Skipped(_))),
        ast_available: outcome.initial_ast,
        seed_hash: config.seed.hash_hex(),
    };

    let original_size = source.len();
    let obfuscated_size = outcome.source.len();
    let size_increase_percentage = if original_size == 0 {
        0.0
    } else {
        100.0 * (obfuscated_size as f64 - original_size as f64) / original_size as f64
    };

    tracing::debug!(
        "  Output size: {} bytes ({:+.1}%)",
        obfuscated_size,
        size_increase_percentage
    );

    ObfuscationResult {
        original_lines: source.as_str().lines().count(),
        obfuscated_lines: outcome.source.as_str().lines().count(),
        obfuscated_source: outcome.source.as_str().to_string(),
        original_size,
        obfuscated_size,
        size_increase_percentage,
        metadata,
        reports: outcome.reports,
    }
}

/// Prints a human-readable summary. Goes to stderr so stdout stays clean for the source.
pub fn print_obfuscation_analysis(result: &ObfuscationResult) {
    if !result.metadata.ast_available {
        eprintln!("Input Analysis:");
        eprintln!("   → Input did not compile; only text passes were run.");
        eprintln!();
    }

    eprintln!("Pass Analysis:");
    for report in &result.reports {
        let status = match &report.status {
            PassStatus::Applied { changes } => format!("applied ({changes} changes)"),
            PassStatus::Unchanged => "unchanged".to_string(),
            PassStatus::Failed(reason) => format!("failed: {reason}"),
            PassStatus::Skipped(reason) => format!("skipped: {reason}"),
        };
        eprintln!("  {:<16} {}", report.name, status);
    }

    eprintln!(
        "Size: {} → {} bytes ({:+.1}%), {} → {} lines",
        result.original_size,
        result.obfuscated_size,
        result.size_increase_percentage,
        result.original_lines,
        result.obfuscated_lines
    );
    if result.metadata.passes_failed.is_empty() {
        eprintln!("Obfuscation complete");
    } else {
        eprintln!(
            "Obfuscation complete with {} failed passes",
            result.metadata.passes_failed.len()
        );
    }
}

/// Builds a machine-readable report of one run.
pub fn create_report(result: &ObfuscationResult) -> serde_json::Value {
    json!({
        "original_bytes": result.original_size,
        "obfuscated_bytes": result.obfuscated_size,
        "size_delta_bytes": (result.obfuscated_size as i64 - result.original_size as i64),
        "percent_size": result.size_increase_percentage,
        "original_lines": result.original_lines,
        "obfuscated_lines": result.obfuscated_lines,
        "ast_available": result.metadata.ast_available,
        "passes_applied": result.metadata.passes_applied,
        "passes_failed": result.metadata.passes_failed,
        "passes_skipped": result.metadata.passes_skipped,
        "seed_hash": result.metadata.seed_hash,
        "passes": result.reports,
    })
}
