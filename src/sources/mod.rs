//! Kernel source resolution and preparation.
//!
//! Maps a user-supplied kernel specification (or its absence) to a
//! Portage package atom and to the on-disk source directory that will be
//! built, then prepares that directory: `/usr/src/linux` symlink and a
//! carried-forward `.config` from the boot area.

mod spec;

pub use spec::KernelSpec;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::Error;
use crate::fsops;
use crate::portage::PackageOwner;
use crate::version::{is_config_file, is_source_directory, version_key};

/// Resolves kernel specifications against the installed source trees.
///
/// Owner lookups are cached per directory for the lifetime of the
/// resolver, since both the atom and the directory resolution walk the
/// same listing.
pub struct SourcesResolver<'a, O: PackageOwner> {
    settings: &'a Settings,
    owner: O,
    owner_cache: HashMap<String, Option<String>>,
}

impl<'a, O: PackageOwner> SourcesResolver<'a, O> {
    pub fn new(settings: &'a Settings, owner: O) -> Self {
        Self {
            settings,
            owner,
            owner_cache: HashMap::new(),
        }
    }

    /// All `linux-*` directories under the sources root, newest first.
    pub fn source_directories(&self) -> Result<Vec<String>> {
        let root = &self.settings.sources_root;
        let entries = fs::read_dir(root)
            .with_context(|| format!("listing kernel sources under {}", root.display()))?;

        let mut directories: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_source_directory(name))
            .collect();

        directories.sort_by_key(|name| std::cmp::Reverse(version_key(name)));
        Ok(directories)
    }

    /// Determine the package atom to install or verify.
    ///
    /// With a specification the atom is built directly from the parsed
    /// grammar; without one, the newest on-disk source directory is keyed
    /// and its owning package is taken as the atom.
    pub fn resolve_package_atom(&mut self, spec: Option<&str>) -> Result<String> {
        if let Some(spec) = spec {
            return Ok(KernelSpec::parse(spec)?.atom());
        }

        let directories = self.source_directories()?;
        let newest = directories
            .first()
            .ok_or_else(|| Error::NoSourcesFound(self.settings.sources_root.clone()))?
            .clone();

        let owner = self
            .owner_of(&newest)?
            .ok_or_else(|| Error::SourcesUnowned(self.settings.sources_root.join(&newest)))?;
        Ok(format!("={}", owner.trim_start_matches('=')))
    }

    /// The source directory owned by `atom`, e.g. `linux-3.12.6-gentoo`.
    pub fn resolve_directory_name(&mut self, atom: &str) -> Result<String> {
        let wanted = atom.trim_start_matches('=');
        for directory in self.source_directories()? {
            if self.owner_of(&directory)?.as_deref() == Some(wanted) {
                return Ok(directory);
            }
        }
        Err(Error::SourcesNotInstalled(atom.to_string()).into())
    }

    /// Pick the kernel configuration file to carry forward.
    ///
    /// An explicit path wins unchanged; otherwise the newest `config-*`
    /// file in the boot area is used. `None` means skip the config copy.
    pub fn resolve_configuration_file(
        &self,
        explicit: Option<PathBuf>,
    ) -> Result<Option<PathBuf>> {
        if explicit.is_some() {
            return Ok(explicit);
        }

        let root = &self.settings.boot_root;
        let entries = fs::read_dir(root)
            .with_context(|| format!("listing configurations under {}", root.display()))?;

        let newest = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_config_file(name))
            .max_by_key(|name| version_key(name));

        Ok(newest.map(|name| root.join(name)))
    }

    fn owner_of(&mut self, directory: &str) -> Result<Option<String>> {
        if let Some(cached) = self.owner_cache.get(directory) {
            return Ok(cached.clone());
        }
        let path = self.settings.sources_root.join(directory);
        let owner = self.owner.owner_of(&path)?;
        self.owner_cache.insert(directory.to_string(), owner.clone());
        Ok(owner)
    }
}

/// Point the conventional symlink at the chosen source directory.
pub fn set_symlink(settings: &Settings, directory: &str, dry_run: bool) -> Result<()> {
    let target = settings.sources_root.join(directory);
    if dry_run {
        println!(
            "ln -sfn {} {}",
            target.display(),
            settings.sources_symlink.display()
        );
        return Ok(());
    }
    fsops::swap_symlink(&settings.sources_symlink, &target)
}

/// Copy a saved configuration into the source tree as `.config`.
///
/// Any existing `.config` is kept as a backup until the copy succeeds.
pub fn copy_configuration(settings: &Settings, configuration: &Path, dry_run: bool) -> Result<()> {
    let dot_config = settings.sources_symlink.join(".config");
    if dry_run {
        println!("cp {} {}", configuration.display(), dot_config.display());
        return Ok(());
    }
    let backup = fsops::copy_with_backup(configuration, &dot_config).with_context(|| {
        format!(
            "copying configuration {} into the source tree",
            configuration.display()
        )
    })?;
    fsops::discard_backup(backup);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portage::testing::FakeOwner;
    use std::collections::HashMap;

    fn scratch_settings(dir: &Path) -> Settings {
        Settings {
            sources_root: dir.join("usr/src"),
            sources_symlink: dir.join("usr/src/linux"),
            boot_root: dir.join("boot"),
            ..Settings::default()
        }
    }

    fn populate(settings: &Settings, directories: &[&str]) {
        fs::create_dir_all(&settings.sources_root).unwrap();
        for name in directories {
            fs::create_dir_all(settings.sources_root.join(name)).unwrap();
        }
        fs::create_dir_all(&settings.boot_root).unwrap();
    }

    fn owner_map(settings: &Settings, pairs: &[(&str, &str)]) -> FakeOwner {
        FakeOwner(
            pairs
                .iter()
                .map(|(dir, atom)| (settings.sources_root.join(dir), atom.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_atom_from_explicit_specification() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        let mut resolver = SourcesResolver::new(&settings, FakeOwner(HashMap::new()));

        assert_eq!(
            resolver.resolve_package_atom(Some("gentoo-sources-3.12.6")).unwrap(),
            "=sys-kernel/gentoo-sources-3.12.6"
        );
        assert_eq!(
            resolver
                .resolve_package_atom(Some("hardened-sources-3.11.7-r1"))
                .unwrap(),
            "=sys-kernel/hardened-sources-3.11.7-r1"
        );
    }

    #[test]
    fn test_malformed_specification_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        let mut resolver = SourcesResolver::new(&settings, FakeOwner(HashMap::new()));

        let err = resolver.resolve_package_atom(Some("not a kernel")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MalformedSpec(_))
        ));
    }

    #[test]
    fn test_atom_without_spec_uses_newest_directory_owner() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(
            &settings,
            &["linux-3.10.7-gentoo", "linux-3.12.6-gentoo", "linux-3.12.5-gentoo"],
        );
        let owner = owner_map(
            &settings,
            &[("linux-3.12.6-gentoo", "sys-kernel/gentoo-sources-3.12.6")],
        );
        let mut resolver = SourcesResolver::new(&settings, owner);

        assert_eq!(
            resolver.resolve_package_atom(None).unwrap(),
            "=sys-kernel/gentoo-sources-3.12.6"
        );
    }

    #[test]
    fn test_no_sources_found_without_directories() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(&settings, &[]);
        let mut resolver = SourcesResolver::new(&settings, FakeOwner(HashMap::new()));

        let err = resolver.resolve_package_atom(None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NoSourcesFound(_))
        ));
    }

    #[test]
    fn test_unowned_newest_directory_reports_sources_unowned() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(&settings, &["linux-3.12.6-gentoo"]);
        let mut resolver = SourcesResolver::new(&settings, FakeOwner(HashMap::new()));

        let err = resolver.resolve_package_atom(None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::SourcesUnowned(_))
        ));
    }

    #[test]
    fn test_directory_matched_by_owning_package() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(
            &settings,
            &["linux-3.12.6-gentoo", "linux-3.12.5-gentoo", "linux-3.10.7-gentoo"],
        );
        let owner = owner_map(
            &settings,
            &[
                ("linux-3.12.6-gentoo", "sys-kernel/gentoo-sources-3.12.6"),
                ("linux-3.12.5-gentoo", "sys-kernel/gentoo-sources-3.12.5"),
                ("linux-3.10.7-gentoo", "sys-kernel/gentoo-sources-3.10.7"),
            ],
        );
        let mut resolver = SourcesResolver::new(&settings, owner);

        assert_eq!(
            resolver
                .resolve_directory_name("=sys-kernel/gentoo-sources-3.12.5")
                .unwrap(),
            "linux-3.12.5-gentoo"
        );
    }

    #[test]
    fn test_unowned_atom_reports_sources_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(&settings, &["linux-3.12.6-gentoo"]);
        let owner = owner_map(
            &settings,
            &[("linux-3.12.6-gentoo", "sys-kernel/gentoo-sources-3.12.6")],
        );
        let mut resolver = SourcesResolver::new(&settings, owner);

        let err = resolver
            .resolve_directory_name("=sys-kernel/hardened-sources-3.11.7")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::SourcesNotInstalled(_))
        ));
    }

    #[test]
    fn test_configuration_file_newest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(&settings, &[]);
        for name in ["config-3.10.7-gentoo", "config-3.12.6-gentoo", "config-3.12.5-gentoo"] {
            fs::write(settings.boot_root.join(name), "").unwrap();
        }
        let resolver = SourcesResolver::new(&settings, FakeOwner(HashMap::new()));

        assert_eq!(
            resolver.resolve_configuration_file(None).unwrap(),
            Some(settings.boot_root.join("config-3.12.6-gentoo"))
        );
    }

    #[test]
    fn test_configuration_file_explicit_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        let resolver = SourcesResolver::new(&settings, FakeOwner(HashMap::new()));

        let explicit = PathBuf::from("/tmp/custom-config");
        assert_eq!(
            resolver.resolve_configuration_file(Some(explicit.clone())).unwrap(),
            Some(explicit)
        );
    }

    #[test]
    fn test_configuration_file_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(&settings, &[]);
        let resolver = SourcesResolver::new(&settings, FakeOwner(HashMap::new()));

        assert_eq!(resolver.resolve_configuration_file(None).unwrap(), None);
    }

    #[test]
    fn test_set_symlink_points_at_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(&settings, &["linux-3.12.6-gentoo"]);

        set_symlink(&settings, "linux-3.12.6-gentoo", false).unwrap();
        assert_eq!(
            fs::read_link(&settings.sources_symlink).unwrap(),
            settings.sources_root.join("linux-3.12.6-gentoo")
        );
    }

    #[test]
    fn test_copy_configuration_lands_as_dot_config() {
        let dir = tempfile::tempdir().unwrap();
        let settings = scratch_settings(dir.path());
        populate(&settings, &["linux-3.12.6-gentoo"]);
        set_symlink(&settings, "linux-3.12.6-gentoo", false).unwrap();

        let saved = settings.boot_root.join("config-3.12.5-gentoo");
        fs::write(&saved, "CONFIG_EXT4_FS=y\n").unwrap();

        copy_configuration(&settings, &saved, false).unwrap();
        assert_eq!(
            fs::read_to_string(settings.sources_symlink.join(".config")).unwrap(),
            "CONFIG_EXT4_FS=y\n"
        );
    }
}
