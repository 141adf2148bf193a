//! Module for the `ast` subcommand, which compiles one source and summarizes its AST.

use crate::commands::{CompilerArgs, ObfuscateError};
use async_trait::async_trait;
use clap::Args;
use shroud_core::{read_source, scan};
use std::error::Error;
use std::path::PathBuf;

/// Arguments for the `ast` subcommand.
#[derive(Args)]
pub struct AstArgs {
    /// Solidity source file.
    pub file: PathBuf,
    #[command(flatten)]
    pub compiler: CompilerArgs,
}

#[async_trait]
impl super::Command for AstArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let source = read_source(&self.file).map_err(ObfuscateError::from)?;
        if let Some(version) = scan::pragma_version(source.as_str()) {
            println!("pragma solidity {version}");
        }

        let provider = self.compiler.provider();
        let ast = tokio::task::spawn_blocking(move || provider.compile(&source))
            .await
            .map_err(ObfuscateError::from)?
            .map_err(ObfuscateError::from)?;

        for contract in ast.contracts() {
            if let Some(def) = contract.as_contract() {
                println!("{:?} {}", def.kind, def.name);
            }
        }
        for (node_type, count) in ast.histogram() {
            println!("{count:>6}  {node_type}");
        }
        Ok(())
    }
}
