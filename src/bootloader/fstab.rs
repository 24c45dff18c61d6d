//! Partition discovery from the filesystem table.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::error::Error;

fn device_for(fstab: &Path, mount_point: &str) -> Result<Option<String>> {
    let contents = fs::read_to_string(fstab)
        .with_context(|| format!("reading {}", fstab.display()))?;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mount)) = (fields.next(), fields.next()) else {
            continue;
        };
        if mount == mount_point && device.starts_with("/dev/") {
            return Ok(Some(device.to_string()));
        }
    }
    Ok(None)
}

/// The device mounted at `/`.
pub fn root_partition(fstab: &Path) -> Result<String> {
    device_for(fstab, "/")?
        .ok_or_else(|| Error::RootPartitionNotFound(fstab.to_path_buf()).into())
}

/// The device mounted at `/boot`, falling back to the root device on
/// systems without a separate boot partition.
pub fn boot_partition(fstab: &Path) -> Result<String> {
    match device_for(fstab, "/boot")? {
        Some(device) => Ok(device),
        None => root_partition(fstab),
    }
}
