//! Module for the `passes` subcommand.

use async_trait::async_trait;
use clap::Args;
use shroud_transform::{pass_by_name, PassConfig, DEFAULT_ORDER};
use std::error::Error;

/// Arguments for the `passes` subcommand.
#[derive(Args)]
pub struct PassesArgs {}

#[async_trait]
impl super::Command for PassesArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        print!("{}", pass_table(&PassConfig::default())?);
        Ok(())
    }
}

/// One line per registry name: name, pass, and whether it needs an AST.
pub fn pass_table(config: &PassConfig) -> Result<String, shroud_transform::Error> {
    let mut out = String::new();
    for name in DEFAULT_ORDER {
        let pass = pass_by_name(name, config)?;
        let needs = if pass.requires_ast() { "ast" } else { "text" };
        out.push_str(&format!("{:<12} {:<16} {}\n", name, pass.name(), needs));
    }
    Ok(out)
}
