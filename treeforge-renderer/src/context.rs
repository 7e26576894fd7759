//! Template contexts: serializable rendering payloads built from manifest records.

use serde::{Deserialize, Serialize};

use treeforge_core::types::{DeviceConfig, RepositoryRecord};

use crate::engine::TemplateKind;
use crate::error::RenderError;

/// Manifest source line used when the caller supplies none.
pub const DEFAULT_MANIFEST: &str = "https://github.com/NeedAlt-Room";
/// Kernel branch used when the caller supplies none.
pub const DEFAULT_KERNEL_BRANCH: &str = "lineage-23.0-bpf-test";
/// Kernel toolchain used when the caller supplies none.
pub const DEFAULT_KERNEL_CLANG: &str = "zyc clang 22";
/// Recovery bypass commit referenced by every generated script.
pub const RECOVERY_BYPASS_PATCH: &str =
    "https://github.com/Gtajisan/android_bootable_recovery/commit/74a50ca6db16ac4c6b7353e9d50f035e19891ff8";

/// User-supplied knobs for build-script assembly. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOptions {
    pub manifest: Option<String>,
    pub kernel_branch: Option<String>,
    pub kernel_clang: Option<String>,
    pub notes: Option<String>,
}

impl ScriptOptions {
    pub fn manifest(&self) -> &str {
        non_empty(self.manifest.as_deref()).unwrap_or(DEFAULT_MANIFEST)
    }

    pub fn kernel_branch(&self) -> &str {
        non_empty(self.kernel_branch.as_deref()).unwrap_or(DEFAULT_KERNEL_BRANCH)
    }

    pub fn kernel_clang(&self) -> &str {
        non_empty(self.kernel_clang.as_deref()).unwrap_or(DEFAULT_KERNEL_CLANG)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Rendering payload for the build script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptContext {
    pub manifest: String,
    /// Account hosting the kernel tree.
    pub owner: String,
    pub device: DeviceCtx,
    /// Clone commands, in declaration order.
    pub repositories: Vec<CloneCtx>,
    pub kernel: KernelCtx,
    pub recovery_patches: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCtx {
    pub name: String,
    pub codename: String,
    pub platform: String,
    /// Lowercased manufacturer, used in AOSP tree paths.
    pub vendor: String,
    pub lineage_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneCtx {
    pub name: String,
    pub url: String,
    pub branch: String,
    pub path: String,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelCtx {
    pub branch: String,
    pub clang: String,
}

impl DeviceCtx {
    fn from_device(device: &DeviceConfig) -> Self {
        DeviceCtx {
            name: device.name.clone(),
            codename: device.codename.clone(),
            platform: device.platform.clone(),
            vendor: device.manufacturer.trim().to_lowercase(),
            lineage_version: device.lineage_version.clone(),
        }
    }
}

impl ScriptContext {
    /// Build a [`ScriptContext`] from a device and its declared repositories.
    pub fn new(
        device: &DeviceConfig,
        repositories: &[RepositoryRecord],
        options: &ScriptOptions,
        owner: &str,
    ) -> Self {
        let repositories = repositories
            .iter()
            .map(|r| CloneCtx {
                name: r.name.0.clone(),
                url: r.url.clone(),
                branch: r.branch.clone(),
                path: r.path.clone(),
                depth: r.depth,
            })
            .collect();

        ScriptContext {
            manifest: options.manifest().to_string(),
            owner: owner.to_string(),
            device: DeviceCtx::from_device(device),
            repositories,
            kernel: KernelCtx {
                branch: options.kernel_branch().to_string(),
                clang: options.kernel_clang().to_string(),
            },
            recovery_patches: vec![RECOVERY_BYPASS_PATCH.to_string()],
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(|source| RenderError::Context {
            template: TemplateKind::BuildScript.template_name(),
            source,
        })
    }
}

/// Rendering payload for the README seeded into a freshly created repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadmeContext {
    pub repo_name: String,
    pub description: String,
    pub owner: String,
    pub branch: String,
    pub path: String,
    pub device_name: String,
    pub codename: String,
    pub lineage_version: String,
    /// `lineage_version` without the `lineage-` prefix.
    pub lineage_number: String,
}

impl ReadmeContext {
    pub fn new(
        device: &DeviceConfig,
        record: &RepositoryRecord,
        description: &str,
        owner: &str,
    ) -> Self {
        ReadmeContext {
            repo_name: record.name.0.clone(),
            description: description.to_string(),
            owner: owner.to_string(),
            branch: record.branch.clone(),
            path: record.path.clone(),
            device_name: device.name.clone(),
            codename: device.codename.clone(),
            lineage_version: device.lineage_version.clone(),
            lineage_number: lineage_number(&device.lineage_version).to_string(),
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(|source| RenderError::Context {
            template: TemplateKind::Readme.template_name(),
            source,
        })
    }
}

/// `lineage-23.0` → `23.0`; other strings pass through.
pub fn lineage_number(lineage_version: &str) -> &str {
    lineage_version
        .strip_prefix("lineage-")
        .unwrap_or(lineage_version)
}
