//! treeforge: reconcile device trees onto a git-hosting account.
//!
//! # Usage
//!
//! ```text
//! treeforge devices [--json]
//! treeforge upload <device> [--owner <name>] [--api-url <url>] [--trees <dir>] [--json] [--seed-readme]
//! treeforge script <device> [--manifest <url>] [--kernel-branch <b>] [--kernel-clang <c>] [--notes <text>] [--owner <name>] [--save]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{devices::DevicesArgs, script::ScriptArgs, upload::UploadArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "treeforge",
    version,
    about = "Reconcile LineageOS device trees onto a GitHub account",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List devices in the manifest store.
    Devices(DevicesArgs),

    /// Create or update every repository of a device on the hosting account.
    Upload(UploadArgs),

    /// Print (and optionally save) the clone script for a device.
    Script(ScriptArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Devices(args) => args.run(),
        Commands::Upload(args) => args.run(),
        Commands::Script(args) => args.run(),
    }
}
