use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the ymodem workspace", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the workspace
    Build,
    /// Run all tests
    Test,
    /// Run ymrecv, forwarding the remaining arguments
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn cargo(args: &[&str], extra: &[String], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).args(extra).status()?;
    if !status.success() {
        anyhow::bail!("{} failed", what);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building workspace...");
            cargo(&["build", "--workspace"], &[], "Build")
        }
        Commands::Test => {
            println!("Running tests...");
            cargo(&["test", "--workspace"], &[], "Tests")
        }
        Commands::Run { args } => {
            println!("Running ymrecv...");
            cargo(&["run", "-p", "ymodem-cli", "--bin", "ymrecv", "--"], args, "Run")
        }
    }
}
