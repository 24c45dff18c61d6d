//! Package manager collaborator.
//!
//! The core only needs two capabilities from Portage: a reverse
//! file-ownership query ("which installed package owns this directory")
//! and a forward install/existence check for a package atom. Both are
//! consumed through their CLI contracts (`equery`, `emerge`); the
//! [`PackageOwner`] trait keeps the reverse query mockable in tests.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Reverse file-ownership lookup against the installed-package database.
pub trait PackageOwner {
    /// The qualified name (`category/name-version`) of the package owning
    /// `path`, or `None` when no installed package claims it.
    fn owner_of(&mut self, path: &Path) -> Result<Option<String>>;
}

/// Production owner lookup via `equery belongs`.
pub struct EqueryOwner;

impl PackageOwner for EqueryOwner {
    fn owner_of(&mut self, path: &Path) -> Result<Option<String>> {
        let (stdout, found) = Cmd::new("equery")
            .args(["-q", "belongs"])
            .arg(path.to_string_lossy())
            .run_unchecked()
            .context("querying file ownership with equery")?;

        if !found {
            return Ok(None);
        }
        // equery -q prints one `category/name-version` per matching package.
        Ok(stdout
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next())
            .map(str::to_string))
    }
}

/// Whether `atom` is present in the installed-package database.
pub fn is_installed(atom: &str) -> Result<bool> {
    let (_, found) = Cmd::new("equery")
        .args(["-q", "list"])
        .arg(atom)
        .run_unchecked()
        .context("querying installed packages with equery")?;
    Ok(found)
}

/// Install `atom` with emerge. `-n` skips the install when it is already
/// present and `-1` keeps it out of the world file.
pub fn install(atom: &str, dry_run: bool) -> Result<()> {
    Cmd::new("emerge")
        .args(["-n", "-1"])
        .arg(atom)
        .error_msg("installing kernel sources failed")
        .run_or_print(dry_run)
}

/// Rebuild externally-packaged kernel modules against the new kernel.
pub fn rebuild_modules(dry_run: bool) -> Result<()> {
    Cmd::new("emerge")
        .arg("@module-rebuild")
        .error_msg("rebuilding portage kernel modules failed")
        .run_or_print(dry_run)
}

/// Extract MAKEOPTS from the first make.conf candidate that defines it.
///
/// The value is returned split into individual arguments, ready to pass
/// to `make`. Returns `None` when no candidate defines MAKEOPTS.
pub fn make_opts(candidates: &[PathBuf]) -> Option<Vec<String>> {
    for path in candidates {
        let Ok(contents) = fs::read_to_string(path) else {
            continue;
        };
        for line in contents.lines() {
            let Some(value) = line.trim().strip_prefix("MAKEOPTS=") else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                return Some(value.split_whitespace().map(str::to_string).collect());
            }
        }
    }
    None
}

/// In-memory owner lookup for tests, shared with the resolver tests.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    pub struct FakeOwner(pub HashMap<PathBuf, String>);

    impl PackageOwner for FakeOwner {
        fn owner_of(&mut self, path: &Path) -> Result<Option<String>> {
            Ok(self.0.get(path).cloned())
        }
    }
}
