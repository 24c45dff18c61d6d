//! Host layout settings.
//!
//! Every filesystem location the tool touches is collected here and
//! threaded explicitly into the components that need it, so nothing reads
//! ambient global state and everything can be pointed at a scratch
//! directory in tests. The defaults match a stock Gentoo install; an
//! optional TOML file can override individual paths.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the override file.
pub const SETTINGS_PATH: &str = "/etc/kernelup.toml";

/// Filesystem locations consumed by the kernel update workflow.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory containing unpacked `linux-*` source trees.
    pub sources_root: PathBuf,
    /// Conventional symlink pointing at the active source tree.
    pub sources_symlink: PathBuf,
    /// Boot area holding kernel images and `config-*` files.
    pub boot_root: PathBuf,
    /// Legacy GRUB configuration file.
    pub grub_config: PathBuf,
    /// GRUB2 generated configuration file.
    pub grub2_config: PathBuf,
    /// GRUB2 defaults file carrying the kernel command line.
    pub grub2_defaults: PathBuf,
    /// Filesystem table used to discover the root and boot partitions.
    pub fstab: PathBuf,
    /// Candidate make.conf locations, searched in order for MAKEOPTS.
    pub make_conf: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources_root: PathBuf::from("/usr/src"),
            sources_symlink: PathBuf::from("/usr/src/linux"),
            boot_root: PathBuf::from("/boot"),
            grub_config: PathBuf::from("/boot/grub/grub.conf"),
            grub2_config: PathBuf::from("/boot/grub/grub.cfg"),
            grub2_defaults: PathBuf::from("/etc/default/grub"),
            fstab: PathBuf::from("/etc/fstab"),
            make_conf: vec![
                PathBuf::from("/etc/portage/make.conf"),
                PathBuf::from("/etc/make.conf"),
            ],
        }
    }
}

impl Settings {
    /// Load settings, honoring `/etc/kernelup.toml` when it exists.
    pub fn load() -> Result<Self> {
        let path = Path::new(SETTINGS_PATH);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_gentoo_layout() {
        let settings = Settings::default();
        assert_eq!(settings.sources_root, Path::new("/usr/src"));
        assert_eq!(settings.sources_symlink, Path::new("/usr/src/linux"));
        assert_eq!(settings.grub_config, Path::new("/boot/grub/grub.conf"));
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernelup.toml");
        fs::write(&path, "sources_root = \"/mnt/gentoo/usr/src\"\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.sources_root, Path::new("/mnt/gentoo/usr/src"));
        assert_eq!(settings.boot_root, Path::new("/boot"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernelup.toml");
        fs::write(&path, "bogus_key = 1\n").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }
}
