//! YAML manifest store for devices, their repositories, and generated scripts.
//!
//! # Storage layout
//!
//! ```text
//! ~/.treeforge/
//!   config.yaml               (host configuration, see `config`)
//!   devices/
//!     <device_id>.yaml        (one DeviceManifest per device, mode 0600)
//!   scripts/
//!     <script_name>.yaml      (persisted BuildScript artifacts, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function that touches disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{io_err, ManifestError};
use crate::types::{BuildScript, DeviceId, DeviceManifest};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.treeforge/`: pure, no I/O.
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".treeforge")
}

/// `<home>/.treeforge/devices/<id>.yaml`: pure, no I/O.
pub fn device_path_at(home: &Path, id: &DeviceId) -> PathBuf {
    root_at(home).join("devices").join(format!("{}.yaml", id.0))
}

/// `<home>/.treeforge/scripts/<name>.yaml`: pure, no I/O.
pub fn script_path_at(home: &Path, name: &str) -> PathBuf {
    root_at(home).join("scripts").join(format!("{name}.yaml"))
}

// ---------------------------------------------------------------------------
// 2. Devices
// ---------------------------------------------------------------------------

/// Load a single device manifest.
///
/// Returns `ManifestError::DeviceNotFound` if absent,
/// `ManifestError::Parse` (with path + line context) if malformed YAML.
pub fn load_device_at(home: &Path, id: &DeviceId) -> Result<DeviceManifest, ManifestError> {
    let path = device_path_at(home, id);
    if !path.exists() {
        return Err(ManifestError::DeviceNotFound {
            id: id.0.clone(),
            path,
        });
    }
    read_yaml(&path)
}

/// `load_device_at` convenience wrapper.
pub fn load_device(id: &DeviceId) -> Result<DeviceManifest, ManifestError> {
    load_device_at(&home()?, id)
}

/// Every device manifest under `<home>/.treeforge/devices/`, sorted by file
/// name so the order is deterministic.
pub fn list_devices_at(home: &Path) -> Result<Vec<DeviceManifest>, ManifestError> {
    list_yaml_at(&root_at(home).join("devices"))
}

/// `list_devices_at` convenience wrapper.
pub fn list_devices() -> Result<Vec<DeviceManifest>, ManifestError> {
    list_devices_at(&home()?)
}

/// Atomically save a device manifest (`.yaml.tmp` sibling → `chmod 0600` → `rename`).
pub fn save_device_at(home: &Path, manifest: &DeviceManifest) -> Result<(), ManifestError> {
    write_yaml(&device_path_at(home, &manifest.device.id), manifest)
}

// ---------------------------------------------------------------------------
// 3. Build scripts
// ---------------------------------------------------------------------------

/// Persist a generated build script under its artifact name.
///
/// Saving a script with an existing name replaces the previous artifact.
pub fn save_script_at(home: &Path, script: &BuildScript) -> Result<PathBuf, ManifestError> {
    let path = script_path_at(home, &script.name);
    write_yaml(&path, script)?;
    Ok(path)
}

/// `save_script_at` convenience wrapper.
pub fn save_script(script: &BuildScript) -> Result<PathBuf, ManifestError> {
    save_script_at(&home()?, script)
}

/// All persisted build scripts, optionally filtered to one device.
pub fn list_scripts_at(
    home: &Path,
    device: Option<&DeviceId>,
) -> Result<Vec<BuildScript>, ManifestError> {
    let mut scripts: Vec<BuildScript> = list_yaml_at(&root_at(home).join("scripts"))?;
    if let Some(device) = device {
        scripts.retain(|s| &s.device_id == device);
    }
    Ok(scripts)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// The current user's home directory.
pub fn home() -> Result<PathBuf, ManifestError> {
    dirs::home_dir().ok_or(ManifestError::HomeNotFound)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn list_yaml_at<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, ManifestError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".yaml"))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        out.push(read_yaml(&entry.path())?);
    }
    Ok(out)
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid manifest path")));
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let yaml = serde_yaml::to_string(value)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ManifestError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ManifestError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ManifestError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ManifestError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
