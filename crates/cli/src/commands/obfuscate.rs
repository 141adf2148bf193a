//! Module for the `obfuscate` subcommand, which rewrites Solidity sources through the pass
//! pipeline.
//!
//! Each input file runs as its own pipeline on a blocking worker. The pipelines share the
//! compiler handle and nothing else.

use crate::commands::{CompilerArgs, ObfuscateError};
use async_trait::async_trait;
use clap::Args;
use shroud_core::seed::Seed;
use shroud_core::{read_source, AstProvider, SourceBuffer};
use shroud_transform::obfuscator::{
    create_report, obfuscate_source, print_obfuscation_analysis, ObfuscationConfig,
    ObfuscationResult,
};
use shroud_transform::{build_passes, default_passes, Pass, PassConfig};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Arguments for the `obfuscate` subcommand.
#[derive(Args)]
pub struct ObfuscateArgs {
    /// Solidity source files to obfuscate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Hex seed for deterministic obfuscation (random when omitted)
    #[arg(long)]
    pub seed: Option<String>,
    /// Comma-separated pass list (default: every pass, in default order)
    #[arg(long)]
    pub passes: Option<String>,
    #[command(flatten)]
    pub compiler: CompilerArgs,
    /// JSON file with pass settings; missing fields keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Path to emit a size/pass report as JSON
    #[arg(long)]
    pub emit: Option<PathBuf>,
    /// Output file, or directory when several inputs are given (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Executes the `obfuscate` subcommand.
#[async_trait]
impl super::Command for ObfuscateArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let pass_config = match &self.config {
            Some(path) => PassConfig::from_json_file(path).map_err(ObfuscateError::from)?,
            None => PassConfig::default(),
        };
        let seed = match &self.seed {
            Some(hex) => Seed::from_hex(hex).map_err(ObfuscateError::from)?,
            None => Seed::generate(),
        };
        // Unknown pass names are reported before any file is touched.
        make_passes(self.passes.as_deref(), &pass_config)?;

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping after the current pass");
                flag.store(true, Ordering::Relaxed);
            }
        });

        let provider = self.compiler.provider();
        let mut handles = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let source = read_source(path).map_err(ObfuscateError::from)?;
            let passes = make_passes(self.passes.as_deref(), &pass_config)?;
            let config = ObfuscationConfig {
                seed: seed.clone(),
                passes,
                cancel: Some(Arc::clone(&cancel)),
            };
            handles.push(run_file(Arc::clone(&provider), source, config));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (path, handle) in self.files.iter().zip(handles) {
            let result = handle.await.map_err(ObfuscateError::from)?;
            if self.files.len() > 1 {
                eprintln!("{}:", path.display());
            }
            print_obfuscation_analysis(&result);
            results.push((path.clone(), result));
        }

        if let Some(path) = &self.emit {
            write_report(path, &results)?;
            eprintln!("Wrote report to {}", path.display());
        }
        write_outputs(self.output.as_deref(), &results)?;
        Ok(())
    }
}

fn run_file(
    provider: Arc<dyn AstProvider>,
    source: SourceBuffer,
    config: ObfuscationConfig,
) -> tokio::task::JoinHandle<ObfuscationResult> {
    tokio::task::spawn_blocking(move || obfuscate_source(provider, &source, &config))
}

/// Builds the pass list from `--passes`, or the default order.
pub(crate) fn make_passes(
    list: Option<&str>,
    config: &PassConfig,
) -> Result<Vec<Box<dyn Pass>>, ObfuscateError> {
    match list {
        Some(list) => Ok(build_passes(list, config)?),
        None => Ok(default_passes(config)),
    }
}

fn write_report(path: &Path, results: &[(PathBuf, ObfuscationResult)]) -> Result<(), ObfuscateError> {
    let report = match results {
        [(_, single)] => create_report(single),
        many => serde_json::Value::Object(
            many.iter()
                .map(|(p, r)| (p.display().to_string(), create_report(r)))
                .collect(),
        ),
    };
    fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

/// Writes obfuscated sources to stdout, one file, or a directory.
pub(crate) fn write_outputs(
    output: Option<&Path>,
    results: &[(PathBuf, ObfuscationResult)],
) -> Result<(), ObfuscateError> {
    match (output, results) {
        (None, _) => {
            for (_, result) in results {
                println!("{}", result.obfuscated_source);
            }
        }
        (Some(out), [(_, single)]) if !out.is_dir() => {
            fs::write(out, &single.obfuscated_source)?;
        }
        (Some(out), _) => {
            if out.is_file() {
                return Err(ObfuscateError::OutputNotDirectory(out.to_path_buf()));
            }
            fs::create_dir_all(out)?;
            for (path, result) in results {
                let name = path.file_name().unwrap_or(path.as_os_str());
                fs::write(out.join(name), &result.obfuscated_source)?;
            }
        }
    }
    Ok(())
}
