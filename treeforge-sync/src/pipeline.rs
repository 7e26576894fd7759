//! Device-level entrypoints shared by the CLI and embedding callers.
//!
//! A device's repository records become one [`Target`] each, in declaration
//! order, with files read from the matching local device-tree directory.

use std::path::{Path, PathBuf};

use treeforge_core::manifest;
use treeforge_core::types::{BuildScript, DeviceConfig, DeviceId, DeviceManifest, RepositoryRecord};
use treeforge_renderer::{assemble_build_script, ReadmeContext, Renderer, ScriptOptions};

use crate::cancel::CancellationToken;
use crate::error::SyncError;
use crate::host::HostingClient;
use crate::orchestrator::BatchOrchestrator;
use crate::report::BatchReport;
use crate::target::{collect_files, FileEntry, Target};

const README: &str = "README.md";

/// Render a README into targets that lack one.
pub struct ReadmeSeed<'a> {
    pub renderer: &'a Renderer,
    pub owner: &'a str,
}

/// Renderer honoring user overrides in `<home>/.treeforge/templates/`.
pub fn renderer_at(home: &Path) -> Result<Renderer, SyncError> {
    let overrides = manifest::root_at(home).join("templates");
    let renderer = if overrides.is_dir() {
        tracing::debug!("using template overrides from {}", overrides.display());
        Renderer::with_overrides(&overrides)?
    } else {
        Renderer::new()?
    };
    Ok(renderer)
}

// ---------------------------------------------------------------------------
// Target construction
// ---------------------------------------------------------------------------

/// Description given to a repository created for `record`.
pub fn description_for(device: &DeviceConfig, record: &RepositoryRecord) -> String {
    format!(
        "Device tree for {} ({}) - {} - LineageOS {}",
        device.name, device.codename, record.category, device.lineage_version
    )
}

/// Local tree for `record`: `<root>/<path>`, else `<root>/<name>`.
pub fn tree_dir_for(trees_root: &Path, record: &RepositoryRecord) -> PathBuf {
    let by_path = trees_root.join(&record.path);
    if by_path.is_dir() {
        return by_path;
    }
    let by_name = trees_root.join(&record.name.0);
    if by_name.is_dir() {
        return by_name;
    }
    by_path
}

/// One target per repository record, in declaration order.
pub fn build_targets(
    device: &DeviceManifest,
    trees_root: &Path,
    seed: Option<&ReadmeSeed<'_>>,
) -> Result<Vec<Target>, SyncError> {
    let mut targets = Vec::with_capacity(device.repositories.len());
    for record in &device.repositories {
        let dir = tree_dir_for(trees_root, record);
        let files = collect_files(&dir)?;
        tracing::debug!("{}: {} file(s) from {}", record.name, files.len(), dir.display());

        let description = description_for(&device.device, record);
        let mut target = Target::new(record.name.clone(), record.branch.clone(), files)?
            .with_description(description.clone());

        if let Some(seed) = seed {
            if !target.has_file(README) {
                let ctx = ReadmeContext::new(&device.device, record, &description, seed.owner);
                let readme = seed.renderer.render_readme(&ctx)?;
                target.push_file(FileEntry::new(README, readme))?;
            }
        }
        targets.push(target);
    }
    Ok(targets)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Reconcile every repository of `device_id` against the host.
///
/// Errors here mean the batch never started (unknown device, a device with
/// no repositories, unreadable tree). Once the batch starts, every outcome
/// lands in the report.
pub fn upload_device_at<C: HostingClient>(
    home: &Path,
    device_id: &DeviceId,
    trees_root: &Path,
    seed: Option<&ReadmeSeed<'_>>,
    orchestrator: &BatchOrchestrator<C>,
    cancel: &CancellationToken,
) -> Result<BatchReport, SyncError> {
    let device = manifest::load_device_at(home, device_id)?;
    if device.repositories.is_empty() {
        return Err(SyncError::NoRepositories(device_id.clone()));
    }
    let targets = build_targets(&device, trees_root, seed)?;
    tracing::info!(
        "uploading {} repositories for {}",
        targets.len(),
        device.device.codename
    );
    Ok(orchestrator
        .run(&targets, cancel)
        .with_device(&device.device.name, &device.device.codename))
}

/// A rendered build script and where it was saved, if it was.
#[derive(Debug)]
pub struct GeneratedScript {
    pub script: BuildScript,
    pub saved_to: Option<PathBuf>,
}

/// Assemble the build script for `device_id`, optionally persisting it.
pub fn generate_script_at(
    home: &Path,
    device_id: &DeviceId,
    options: &ScriptOptions,
    owner: &str,
    save: bool,
) -> Result<GeneratedScript, SyncError> {
    let device = manifest::load_device_at(home, device_id)?;
    let renderer = renderer_at(home)?;
    let script =
        assemble_build_script(&renderer, &device.device, &device.repositories, options, owner)?;
    let saved_to = if save {
        let path = manifest::save_script_at(home, &script)?;
        tracing::info!("saved {} to {}", script.name, path.display());
        Some(path)
    } else {
        None
    };
    Ok(GeneratedScript { script, saved_to })
}
