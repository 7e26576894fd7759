//! `treeforge script`: print the clone script for a device.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use treeforge_core::{config, DeviceId};
use treeforge_renderer::ScriptOptions;
use treeforge_sync::pipeline;

/// Kernel-tree owner used when neither `--owner` nor the config names one.
const FALLBACK_KERNEL_OWNER: &str = "Gtajisan";

/// Arguments for `treeforge script`.
#[derive(Args, Debug)]
pub struct ScriptArgs {
    /// Device id in the manifest store.
    pub device: String,

    /// Manifest URL written at the top of the script.
    #[arg(long)]
    pub manifest: Option<String>,

    /// Kernel branch referenced in the kernel notes.
    #[arg(long)]
    pub kernel_branch: Option<String>,

    /// Clang toolchain referenced in the kernel notes.
    #[arg(long)]
    pub kernel_clang: Option<String>,

    /// Free-text notes stored with a saved script.
    #[arg(long)]
    pub notes: Option<String>,

    /// Owner of the kernel tree (defaults to the configured owner).
    #[arg(long)]
    pub owner: Option<String>,

    /// Persist the script under ~/.treeforge/scripts/.
    #[arg(long)]
    pub save: bool,
}

impl ScriptArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load ~/.treeforge/config.yaml")?;
        let owner = [self.owner.as_deref(), Some(config.owner.as_str())]
            .into_iter()
            .flatten()
            .find(|o| !o.trim().is_empty())
            .unwrap_or(FALLBACK_KERNEL_OWNER)
            .to_string();

        let options = ScriptOptions {
            manifest: self.manifest,
            kernel_branch: self.kernel_branch,
            kernel_clang: self.kernel_clang,
            notes: self.notes,
        };
        let device = DeviceId::from(self.device.as_str());
        let generated = pipeline::generate_script_at(&home, &device, &options, &owner, self.save)
            .with_context(|| format!("failed to generate script for '{device}'"))?;

        print!("{}", generated.script.content);
        if let Some(path) = generated.saved_to {
            eprintln!(
                "{} saved {} to {}",
                "✓".green(),
                generated.script.name,
                path.display()
            );
        }
        Ok(())
    }
}
