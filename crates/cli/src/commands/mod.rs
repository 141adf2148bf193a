use async_trait::async_trait;
use clap::Subcommand;
use shroud_core::{AstProvider, SolcCompiler};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod ast;
pub mod obfuscate;
pub mod passes;

use thiserror::Error;

/// Errors that can occur during obfuscation.
#[derive(Debug, Error)]
pub enum ObfuscateError {
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// Source, seed, or compiler error from the core crate.
    #[error(transparent)]
    Core(#[from] shroud_core::Error),
    /// Pass construction or configuration failed.
    #[error("transform error: {0}")]
    Transform(#[from] shroud_transform::Error),
    /// A worker task panicked or was cancelled.
    #[error("worker error: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// `-o` names a file but several inputs were given.
    #[error("output {0} is a file but several inputs were given")]
    OutputNotDirectory(PathBuf),
}

/// CLI subcommands for Shroud.
#[derive(Subcommand)]
pub enum Cmd {
    /// Obfuscate Solidity sources with the selected passes.
    Obfuscate(obfuscate::ObfuscateArgs),
    /// Compile a source and print its AST node histogram.
    Ast(ast::AstArgs),
    /// List the available passes in default order.
    Passes(passes::PassesArgs),
}

/// Trait for executing CLI subcommands.
#[async_trait]
pub trait Command {
    /// Executes the subcommand.
    ///
    /// # Returns
    /// A `Result` indicating success or an error if execution fails.
    async fn execute(self) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Obfuscate(args) => args.execute().await,
            Cmd::Ast(args) => args.execute().await,
            Cmd::Passes(args) => args.execute().await,
        }
    }
}

/// Compiler flags shared by every subcommand that needs an AST.
#[derive(clap::Args, Debug, Clone)]
pub struct CompilerArgs {
    /// Path to the solc binary
    #[arg(long, default_value = "solc")]
    pub solc: PathBuf,
    /// Seconds to wait for one compile before giving up
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

impl CompilerArgs {
    pub fn provider(&self) -> Arc<dyn AstProvider> {
        Arc::new(SolcCompiler::new(
            self.solc.clone(),
            Duration::from_secs(self.timeout),
        ))
    }
}
