//! Domain records for the treeforge manifest store.
//!
//! All types are serializable/deserializable via serde + serde_yaml. Field
//! names are snake_case on disk.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for a device entry in the manifest store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed name for a repository on the hosting account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoName(pub String);

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What part of a device build a repository provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoCategory {
    #[default]
    Device,
    Vendor,
    Kernel,
    Hardware,
    Other,
}

impl fmt::Display for RepoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoCategory::Device => write!(f, "device"),
            RepoCategory::Vendor => write!(f, "vendor"),
            RepoCategory::Kernel => write!(f, "kernel"),
            RepoCategory::Hardware => write!(f, "hardware"),
            RepoCategory::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A device that the build recipes target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: DeviceId,
    /// Marketing name, e.g. "Xiaomi Mi A2 Lite".
    pub name: String,
    /// Build codename, e.g. "daisy".
    pub codename: String,
    pub manufacturer: String,
    /// SoC platform, e.g. "msm8953".
    pub platform: String,
    pub android_version: String,
    /// e.g. "lineage-23.0".
    pub lineage_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_depth() -> u32 {
    1
}

fn default_status() -> String {
    "pending".to_string()
}

/// One repository a device build pulls in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: RepoName,
    /// Clone URL used in build scripts.
    pub url: String,
    pub branch: String,
    /// Checkout path inside the source tree, e.g. `device/xiaomi/daisy`.
    pub path: String,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default)]
    pub category: RepoCategory,
    #[serde(default = "default_status")]
    pub status: String,
}

/// A device plus the repositories declared for it. One file per device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceManifest {
    pub device: DeviceConfig,
    #[serde(default)]
    pub repositories: Vec<RepositoryRecord>,
}

/// Kernel build parameters recorded alongside a generated script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    pub branch: String,
    /// Toolchain identifier, e.g. "zyc clang 22".
    pub clang: String,
}

/// A generated build script persisted as a named artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildScript {
    pub id: String,
    pub device_id: DeviceId,
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_config: Option<KernelConfig>,
    #[serde(default)]
    pub recovery_patches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(DeviceId::from("daisy").to_string(), "daisy");
        assert_eq!(
            RepoName::from("android_device_xiaomi_daisy").to_string(),
            "android_device_xiaomi_daisy"
        );
    }

    #[test]
    fn repository_record_defaults_apply() {
        let yaml = "name: dt\nurl: https://example.com/dt\nbranch: '16'\npath: device/x/y\n";
        let record: RepositoryRecord = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(record.depth, 1);
        assert_eq!(record.category, RepoCategory::Device);
        assert_eq!(record.status, "pending");
    }

    #[test]
    fn category_display_matches_serde() {
        for category in [
            RepoCategory::Device,
            RepoCategory::Vendor,
            RepoCategory::Kernel,
            RepoCategory::Hardware,
            RepoCategory::Other,
        ] {
            let yaml = serde_yaml::to_string(&category).expect("serialize");
            assert_eq!(yaml.trim(), category.to_string());
        }
    }
}
