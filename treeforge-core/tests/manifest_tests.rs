//! Manifest store error-message, atomic-write-safety, and roundtrip tests.

use assert_fs::prelude::*;
use chrono::Utc;
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

use treeforge_core::{
    manifest, DeviceConfig, DeviceId, DeviceManifest, ManifestError, RepoCategory, RepoName,
    RepositoryRecord,
};

fn daisy() -> DeviceId {
    DeviceId::from("daisy")
}

fn make_manifest() -> DeviceManifest {
    let now = Utc::now();
    DeviceManifest {
        device: DeviceConfig {
            id: daisy(),
            name: "Xiaomi Mi A2 Lite".to_string(),
            codename: "daisy".to_string(),
            manufacturer: "Xiaomi".to_string(),
            platform: "msm8953".to_string(),
            android_version: "16".to_string(),
            lineage_version: "lineage-23.0".to_string(),
            description: Some("A2 Lite".to_string()),
            created_at: now,
            updated_at: now,
        },
        repositories: vec![
            RepositoryRecord {
                name: RepoName::from("android_device_xiaomi_daisy"),
                url: "https://github.com/Gtajisan/android_device_xiaomi_daisy".to_string(),
                branch: "16".to_string(),
                path: "device/xiaomi/daisy".to_string(),
                depth: 1,
                category: RepoCategory::Device,
                status: "pending".to_string(),
            },
            RepositoryRecord {
                name: RepoName::from("proprietary_vendor_xiaomi_daisy"),
                url: "https://github.com/Gtajisan/proprietary_vendor_xiaomi_daisy".to_string(),
                branch: "16".to_string(),
                path: "vendor/xiaomi/daisy".to_string(),
                depth: 1,
                category: RepoCategory::Vendor,
                status: "pending".to_string(),
            },
        ],
    }
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_device_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = manifest::load_device_at(home.path(), &daisy()).unwrap_err();
    assert!(matches!(err, ManifestError::DeviceNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("daisy.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = manifest::device_path_at(home.path(), &daisy());
    fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
    fs::write(&path, b": : corrupt : yaml : !!!\n  - broken: [unclosed").expect("write");

    let err = manifest::load_device_at(home.path(), &daisy()).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("daisy.yaml"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    manifest::save_device_at(home.path(), &make_manifest()).expect("save");

    home.child(".treeforge/devices/daisy.yaml")
        .assert(predicate::path::exists());
    home.child(".treeforge/devices/daisy.yaml.tmp")
        .assert(predicate::path::missing());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let path = manifest::device_path_at(home.path(), &daisy());
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[test]
fn resave_replaces_repositories() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut m = make_manifest();
    manifest::save_device_at(home.path(), &m).expect("save");

    m.repositories.truncate(1);
    manifest::save_device_at(home.path(), &m).expect("resave");

    let loaded = manifest::load_device_at(home.path(), &daisy()).expect("load");
    assert_eq!(loaded.repositories.len(), 1);
    assert_eq!(loaded.repositories[0].name.0, "android_device_xiaomi_daisy");
}

// ---------------------------------------------------------------------------
// 3. Parameterised roundtrip
// ---------------------------------------------------------------------------

#[rstest]
#[case(RepoCategory::Device)]
#[case(RepoCategory::Vendor)]
#[case(RepoCategory::Kernel)]
#[case(RepoCategory::Hardware)]
#[case(RepoCategory::Other)]
fn repository_category_survives_store(#[case] category: RepoCategory) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut m = make_manifest();
    m.repositories[0].category = category;
    manifest::save_device_at(home.path(), &m).expect("save");

    let loaded = manifest::load_device_at(home.path(), &daisy()).expect("load");
    assert_eq!(loaded.repositories[0].category, category);
    assert_eq!(loaded.repositories[1].category, RepoCategory::Vendor);
}
