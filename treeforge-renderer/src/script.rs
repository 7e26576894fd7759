//! Build-script artifact assembly.

use chrono::Utc;

use treeforge_core::types::{BuildScript, DeviceConfig, KernelConfig, RepositoryRecord};

use crate::context::{lineage_number, ScriptContext, ScriptOptions, RECOVERY_BYPASS_PATCH};
use crate::engine::Renderer;
use crate::error::RenderError;

/// Artifact name for a device's recipe: `{codename}_{lineage number}_recipe`.
pub fn script_name(device: &DeviceConfig) -> String {
    format!(
        "{}_{}_recipe",
        device.codename,
        lineage_number(&device.lineage_version)
    )
}

/// Render the build script for `device` and wrap it in a [`BuildScript`]
/// artifact ready to be persisted.
///
/// `repositories` are emitted as clone commands in the order given.
pub fn assemble_build_script(
    renderer: &Renderer,
    device: &DeviceConfig,
    repositories: &[RepositoryRecord],
    options: &ScriptOptions,
    owner: &str,
) -> Result<BuildScript, RenderError> {
    let ctx = ScriptContext::new(device, repositories, options, owner);
    let content = renderer.render_script(&ctx)?;
    let now = Utc::now();
    let name = script_name(device);

    Ok(BuildScript {
        id: format!("{}-{}", name, now.timestamp()),
        device_id: device.id.clone(),
        name,
        content,
        manifest: Some(options.manifest().to_string()),
        kernel_config: Some(KernelConfig {
            branch: options.kernel_branch().to_string(),
            clang: options.kernel_clang().to_string(),
        }),
        recovery_patches: vec![RECOVERY_BYPASS_PATCH.to_string()],
        notes: options
            .notes
            .as_ref()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        created_at: now,
        updated_at: now,
    })
}
