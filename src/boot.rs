//! Scoped access to the boot area.
//!
//! Gentoo convention keeps /boot unmounted between kernel updates. Every
//! step touching the boot area runs inside [`with_boot_mounted`], which
//! mounts the filesystem when needed and unmounts it on all exit paths,
//! including when the inner operation fails.

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::process::Cmd;

/// Whether the boot area is already usable without mounting.
///
/// True when the path is an active mount point, or when it is populated
/// with real files (systems that keep /boot on the root filesystem).
/// The conventional `.keep` marker and the nested `boot/` symlink GRUB
/// leaves behind do not count as population.
pub fn is_boot_mounted(boot_root: &Path) -> bool {
    if let Ok(mounts) = fs::read_to_string("/proc/mounts") {
        let target = boot_root.to_string_lossy();
        for line in mounts.lines() {
            if line.split_whitespace().nth(1) == Some(target.as_ref()) {
                return true;
            }
        }
    }

    walkdir::WalkDir::new(boot_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            entry.file_name() != ".keep"
                && !entry
                    .path()
                    .strip_prefix(boot_root)
                    .map(|rest| rest.starts_with("boot"))
                    .unwrap_or(false)
        })
}

/// Run `operation` with the boot area available.
///
/// If /boot is already mounted (or populated), the operation runs as-is.
/// Otherwise the filesystem is mounted first and unmounted afterwards,
/// symmetric to acquisition even when the operation fails.
pub fn with_boot_mounted<T>(
    boot_root: &Path,
    dry_run: bool,
    operation: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if is_boot_mounted(boot_root) {
        return operation();
    }

    Cmd::new("mount")
        .arg(boot_root.to_string_lossy())
        .error_msg("mounting the boot area failed")
        .run_or_print(dry_run)?;

    let result = operation();

    let unmount = Cmd::new("umount")
        .arg(boot_root.to_string_lossy())
        .error_msg("unmounting the boot area failed")
        .run_or_print(dry_run);

    // The inner failure is the interesting one; an unmount failure only
    // surfaces when the operation itself succeeded.
    match result {
        Ok(value) => unmount.map(|_| value),
        Err(error) => Err(error),
    }
}
