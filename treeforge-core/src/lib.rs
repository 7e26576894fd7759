//! treeforge core library: domain records, host configuration, manifest store.
//!
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`ManifestError`]
//! - [`manifest`]: device and build-script persistence
//! - [`config`]: [`HostConfig`]

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::HostConfig;
pub use error::ManifestError;
pub use types::{
    BuildScript, DeviceConfig, DeviceId, DeviceManifest, KernelConfig, RepoCategory, RepoName,
    RepositoryRecord,
};
