//! `treeforge upload`: reconcile a device's repositories on GitHub.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use treeforge_core::{config, DeviceId};
use treeforge_sync::pipeline::{self, ReadmeSeed};
use treeforge_sync::{
    BatchOrchestrator, BatchReport, CachedCredentials, CancellationToken, CredentialProvider,
    EnvTokenSource, GitHubClient, ReconciliationOutcome, TargetReport,
};

/// Arguments for `treeforge upload`.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Device id in the manifest store.
    pub device: String,

    /// Account that owns the repositories (overrides config).
    #[arg(long)]
    pub owner: Option<String>,

    /// REST API root, e.g. for GitHub Enterprise (overrides config).
    #[arg(long)]
    pub api_url: Option<String>,

    /// Root of the local device-tree directories (overrides config).
    #[arg(long)]
    pub trees: Option<PathBuf>,

    /// Emit the machine-readable report.
    #[arg(long)]
    pub json: bool,

    /// Add a generated README.md to repositories that have none.
    #[arg(long)]
    pub seed_readme: bool,

    /// Write into each repository's default branch instead of the declared one.
    #[arg(long)]
    pub default_branch: bool,
}

impl UploadArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let mut config = config::load_at(&home).context("failed to load ~/.treeforge/config.yaml")?;
        if let Some(owner) = self.owner.clone() {
            config.owner = owner;
        }
        if let Some(api_url) = self.api_url.clone() {
            config.api_url = api_url;
        }
        if self.default_branch {
            config.use_default_branch = true;
        }
        if config.owner.trim().is_empty() {
            bail!("no owner configured: pass --owner or set `owner` in ~/.treeforge/config.yaml");
        }
        let trees_root = self.trees.clone().unwrap_or_else(|| config.trees_dir.clone());

        let credentials = Arc::new(CachedCredentials::new(EnvTokenSource::new(&config.token_env)));
        credentials
            .token()
            .with_context(|| format!("set {} to a token with repo scope", config.token_env))?;

        let client = GitHubClient::new(&config, credentials)
            .with_context(|| format!("cannot use api_url '{}'", config.api_url))?;
        let orchestrator = BatchOrchestrator::new(client, &config);

        let renderer = if self.seed_readme {
            Some(pipeline::renderer_at(&home).context("failed to load templates")?)
        } else {
            None
        };
        let seed = renderer.as_ref().map(|renderer| ReadmeSeed {
            renderer,
            owner: &config.owner,
        });

        let device = DeviceId::from(self.device.as_str());
        let report = pipeline::upload_device_at(
            &home,
            &device,
            &trees_root,
            seed.as_ref(),
            &orchestrator,
            &CancellationToken::new(),
        )
        .with_context(|| format!("upload failed for '{device}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report.to_json())
                    .context("failed to serialize upload report")?
            );
        } else {
            print_report(&report);
        }

        if !report.success() {
            bail!("{}", report.summary());
        }
        Ok(())
    }
}

fn print_report(report: &BatchReport) {
    for target in &report.targets {
        print_target(target);
    }
    println!("{}", report.summary().bold());
}

fn print_target(target: &TargetReport) {
    let name = &target.repository;
    match &target.outcome {
        ReconciliationOutcome::Created => {
            let verb = if target.repository_created {
                "created"
            } else {
                "updated"
            };
            println!(
                "{} {name} {verb} ({} written, {} unchanged)",
                "✓".green(),
                target.files.written(),
                target.files.unchanged
            );
            if let Some(url) = &target.url {
                println!("    {}", url.bright_black());
            }
        }
        ReconciliationOutcome::AlreadyPresent => {
            println!("{} {name} up to date", "·".bright_black());
        }
        ReconciliationOutcome::PartialFailure(failures) => {
            println!(
                "{} {name}: {} file(s) failed, {} written",
                "!".yellow(),
                failures.len(),
                target.files.written()
            );
            for failure in failures {
                println!("    {} {failure}", "✗".red());
            }
        }
        ReconciliationOutcome::Failed(reason) => {
            println!("{} {name}: {reason}", "✗".red());
        }
    }
}
