use clap::Parser;
use shroud_cli::commands::{Cmd, Command};

/// Shroud CLI
///
/// Shroud is a Solidity source obfuscator that rewrites contracts through a chain of
/// AST-guided passes (renaming, literal disguise, control-flow flattening, opaque predicates,
/// state promotion, struct grouping, inlining) while keeping them compilable
#[derive(Parser)]
#[command(name = "shroud")]
#[command(about = "Shroud: Solidity source obfuscator")]
struct Cli {
    /// Log pass internals
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Cmd,
}

/// Runs the Shroud CLI with the provided arguments.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute().await
}
