//! `treeforge devices`: list devices in the manifest store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use treeforge_core::{manifest, DeviceManifest};

/// Arguments for `treeforge devices`.
#[derive(Args, Debug)]
pub struct DevicesArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DeviceJson<'a> {
    id: &'a str,
    name: &'a str,
    codename: &'a str,
    manufacturer: &'a str,
    platform: &'a str,
    lineage_version: &'a str,
    repositories: Vec<&'a str>,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "device")]
    name: String,
    #[tabled(rename = "platform")]
    platform: String,
    #[tabled(rename = "lineage")]
    lineage: String,
    #[tabled(rename = "repos")]
    repositories: usize,
}

impl DevicesArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        self.run_at(&home)
    }

    fn run_at(&self, home: &Path) -> Result<()> {
        let devices = manifest::list_devices_at(home).context("failed to read device manifests")?;
        if self.json {
            return print_json(&devices);
        }
        print_table(&devices);
        Ok(())
    }
}

fn print_json(devices: &[DeviceManifest]) -> Result<()> {
    let payload: Vec<DeviceJson<'_>> = devices
        .iter()
        .map(|m| DeviceJson {
            id: &m.device.id.0,
            name: &m.device.name,
            codename: &m.device.codename,
            manufacturer: &m.device.manufacturer,
            platform: &m.device.platform,
            lineage_version: &m.device.lineage_version,
            repositories: m.repositories.iter().map(|r| r.name.0.as_str()).collect(),
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize devices JSON")?
    );
    Ok(())
}

fn print_table(devices: &[DeviceManifest]) {
    if devices.is_empty() {
        println!("No devices found. Add manifests under ~/.treeforge/devices/.");
        return;
    }
    println!(
        "treeforge v{} | {} devices",
        env!("CARGO_PKG_VERSION"),
        devices.len().to_string().bold()
    );
    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|m| DeviceRow {
            id: m.device.id.0.clone(),
            name: format!("{} ({})", m.device.name, m.device.codename),
            platform: m.device.platform.clone(),
            lineage: m.device.lineage_version.clone(),
            repositories: m.repositories.len(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
