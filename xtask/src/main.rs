//! Development tasks for the dbkit workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Development tasks for dbkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run format, lint, unused-dependency and test checks
    Ci,
    /// Check formatting
    Fmt,
    /// Run clippy over every target
    Clippy,
    /// Run the test suite
    Test {
        /// Only test this package (e.g. `dbkit-client`)
        #[arg(short, long)]
        package: Option<String>,
        /// Only run tests whose name contains this filter
        filter: Option<String>,
    },
    /// Look for unused dependencies (requires cargo-machete)
    Machete,
    /// Build API documentation
    Doc {
        /// Open the docs in a browser when done
        #[arg(long)]
        open: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh)?;
            clippy(&sh)?;
            machete(&sh)?;
            test(&sh, None, None)?;
            println!("All CI checks passed!");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { package, filter } => test(&sh, package.as_deref(), filter.as_deref())?,
        Command::Machete => machete(&sh)?,
        Command::Doc { open } => doc(&sh, open)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let manifest = String::from_utf8(output.stdout).context("invalid UTF-8 in cargo output")?;

    PathBuf::from(manifest.trim())
        .parent()
        .map(PathBuf::from)
        .context("workspace manifest has no parent directory")
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("Checking formatting...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    println!("Running clippy...");
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, filter: Option<&str>) -> Result<()> {
    let scope: Vec<String> = match package {
        Some(package) => vec!["--package".into(), package.into()],
        None => vec!["--workspace".into()],
    };
    let filter: Vec<&str> = filter.into_iter().collect();

    println!("Running tests...");
    cmd!(sh, "cargo test {scope...} {filter...}").run()?;
    Ok(())
}

fn machete(sh: &Shell) -> Result<()> {
    println!("Checking for unused dependencies...");
    cmd!(sh, "cargo machete").run()?;
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    let open = open.then_some("--open");
    println!("Building documentation...");
    cmd!(sh, "cargo doc --workspace --no-deps {open...}").run()?;
    Ok(())
}
