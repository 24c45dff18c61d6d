//! Boot loader configuration handling.
//!
//! The dialect is a tagged variant selected once by the orchestration
//! layer, never probed at patch time. Legacy GRUB gets its `grub.conf`
//! patched in memory by a pure transform ([`grub::patch`]) and written
//! back with a backup; GRUB2 gets its defaults file amended and its
//! configuration regenerated by `grub2-mkconfig`.

pub mod fstab;
pub mod grub;
pub mod grub2;

use anyhow::{Context, Result};
use std::fs;

use crate::config::Settings;
use crate::error::Error;
use crate::fsops;

/// Known boot loader dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Legacy GRUB with a line-oriented `grub.conf`.
    Grub,
    /// GRUB2, configured through `/etc/default/grub` and `grub2-mkconfig`.
    Grub2,
}

impl Dialect {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "grub" => Ok(Self::Grub),
            "grub2" => Ok(Self::Grub2),
            other => anyhow::bail!("unknown boot loader '{}'; expected grub or grub2", other),
        }
    }

    /// Host tools this dialect needs beyond the common set.
    pub fn required_tools(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Grub => &[],
            Self::Grub2 => &[("grub2-mkconfig", "sys-boot/grub")],
        }
    }
}

/// Parameters of a newly built kernel, as the boot entry needs them.
#[derive(Debug, Clone)]
pub struct KernelEntry {
    /// Entry label, conventionally the source directory name.
    pub name: String,
    /// Image file name under /boot, e.g. `bzImage-3.12.6-gentoo`.
    pub image: String,
    /// Root partition of the running system, e.g. `/dev/sda3`.
    pub root_partition: String,
    /// Partition holding /boot, used for the GRUB root encoding.
    pub boot_partition: String,
    /// Literal kernel command-line options, appended verbatim.
    pub options: String,
    /// Initrd file name under /boot, when one was built.
    pub initrd: Option<String>,
}

/// Add a boot entry for `entry` using the selected dialect.
///
/// The caller is responsible for holding /boot mounted around this call.
pub fn install_entry(
    settings: &Settings,
    dialect: Dialect,
    entry: &KernelEntry,
    dry_run: bool,
) -> Result<()> {
    match dialect {
        Dialect::Grub => install_grub_entry(settings, entry, dry_run),
        Dialect::Grub2 => grub2::install_entry(settings, entry, dry_run),
    }
}

fn install_grub_entry(settings: &Settings, entry: &KernelEntry, dry_run: bool) -> Result<()> {
    let path = &settings.grub_config;
    let contents = fs::read_to_string(path)
        .map_err(|_| Error::ConfigurationUnreadable(path.clone()))?;
    let lines: Vec<String> = contents.lines().map(str::to_string).collect();

    let now = time::OffsetDateTime::now_utc();
    let timestamp = now
        .format(&time::format_description::well_known::Rfc2822)
        .unwrap_or_else(|_| now.to_string());

    let patched = grub::patch(&lines, entry, &timestamp)?;
    let mut new_contents = patched.join("\n");
    new_contents.push('\n');

    if dry_run {
        println!("cat > {} <<'EOF'", path.display());
        println!("{new_contents}EOF");
        return Ok(());
    }

    fsops::replace_file_with_backup(path, &new_contents)
        .with_context(|| format!("installing boot loader configuration {}", path.display()))?;
    println!("  Added boot entry for {}", entry.name);
    Ok(())
}
