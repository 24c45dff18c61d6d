//! Read-modify-write-with-backup filesystem operations.
//!
//! Every mutation of a shared file or symlink goes through these helpers:
//! compute the new state in memory, write it to a sibling temporary path,
//! swap it into place, and keep a backup of the original until the swap
//! is confirmed. On failure the backup is restored so the filesystem is
//! left exactly as it was found.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Replace `path` with `contents`, backing up any existing file first.
///
/// The new contents land at `<path>.tmp`, the original moves to
/// `<path>.bak`, and only once the rename into place succeeds is the
/// backup deleted. Any failure restores the original.
pub fn replace_file_with_backup(path: &Path, contents: &str) -> Result<()> {
    let tmp = sibling(path, ".tmp");
    let bak = sibling(path, ".bak");

    fs::write(&tmp, contents)
        .with_context(|| format!("writing temporary file {}", tmp.display()))?;

    let had_original = path.exists();
    if had_original {
        if let Err(error) = fs::copy(path, &bak) {
            let _ = fs::remove_file(&tmp);
            return Err(error)
                .with_context(|| format!("backing up {} to {}", path.display(), bak.display()));
        }
    }

    match fs::rename(&tmp, path) {
        Ok(()) => {
            if had_original {
                let _ = fs::remove_file(&bak);
            }
            Ok(())
        }
        Err(error) => {
            if had_original {
                let _ = fs::rename(&bak, path);
            }
            let _ = fs::remove_file(&tmp);
            Err(error).with_context(|| format!("installing {}", path.display()))
        }
    }
}

/// Copy `src` over `dst`, keeping a `.bak` of any existing destination.
///
/// On success the backup is left on disk and its path returned (`None`
/// when the destination did not exist), so callers sequencing several
/// copies can restore every overwritten file if a later step fails.
/// Call [`discard_backup`] once the whole sequence is committed. On
/// failure the original is restored here and the backup removed.
pub fn copy_with_backup(src: &Path, dst: &Path) -> Result<Option<PathBuf>> {
    let bak = sibling(dst, ".bak");
    let had_original = dst.exists();

    if had_original {
        fs::copy(dst, &bak)
            .with_context(|| format!("backing up {} to {}", dst.display(), bak.display()))?;
    }

    match fs::copy(src, dst) {
        Ok(_) => Ok(had_original.then_some(bak)),
        Err(error) => {
            if had_original {
                let _ = fs::rename(&bak, dst);
            }
            Err(error).with_context(|| {
                format!("copying {} to {}", src.display(), dst.display())
            })
        }
    }
}

/// Drop a backup retained by [`copy_with_backup`] after the caller has
/// committed the copy it belongs to.
pub fn discard_backup(bak: Option<PathBuf>) {
    if let Some(bak) = bak {
        let _ = fs::remove_file(bak);
    }
}

/// Re-point `link` at `target`, restoring the previous target on failure.
pub fn swap_symlink(link: &Path, target: &Path) -> Result<()> {
    let previous = if link.is_symlink() {
        let old = fs::read_link(link)
            .with_context(|| format!("reading existing symlink {}", link.display()))?;
        fs::remove_file(link)
            .with_context(|| format!("removing existing symlink {}", link.display()))?;
        Some(old)
    } else {
        None
    };

    match std::os::unix::fs::symlink(target, link) {
        Ok(()) => Ok(()),
        Err(error) => {
            if let Some(old) = previous {
                let _ = std::os::unix::fs::symlink(&old, link);
            }
            Err(error).with_context(|| {
                format!("linking {} -> {}", link.display(), target.display())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_creates_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grub.conf");

        replace_file_with_backup(&path, "default 0\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "default 0\n");
        assert!(!sibling(&path, ".bak").exists());
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[test]
    fn test_replace_overwrites_and_drops_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grub.conf");
        fs::write(&path, "old").unwrap();

        replace_file_with_backup(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!sibling(&path, ".bak").exists());
    }

    #[test]
    fn test_copy_with_backup_retains_backup_until_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("System.map");
        let dst = dir.path().join("boot-System.map");
        fs::write(&src, "symbols").unwrap();

        assert!(copy_with_backup(&src, &dst).unwrap().is_none());

        let bak = copy_with_backup(&src, &dst).unwrap();
        assert_eq!(bak.as_deref(), Some(sibling(&dst, ".bak").as_path()));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "symbols");
        assert!(sibling(&dst, ".bak").exists());

        discard_backup(bak);
        assert!(!sibling(&dst, ".bak").exists());
    }

    #[test]
    fn test_copy_failure_restores_overwritten_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("missing-System.map");
        let dst = dir.path().join("boot-System.map");
        fs::write(&dst, "OLD").unwrap();

        assert!(copy_with_backup(&src, &dst).is_err());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "OLD");
        assert!(!sibling(&dst, ".bak").exists());
    }

    #[test]
    fn test_replace_failure_leaves_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grub.conf");
        fs::write(&path, "OLD").unwrap();
        // A directory squatting on the backup path makes the backup
        // step fail before the original can be replaced.
        fs::create_dir(sibling(&path, ".bak")).unwrap();

        assert!(replace_file_with_backup(&path, "NEW").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "OLD");
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[test]
    fn test_swap_symlink_replaces_existing_link() {
        let dir = tempfile::tempdir().unwrap();
        let old_target = dir.path().join("linux-3.12.5-gentoo");
        let new_target = dir.path().join("linux-3.12.6-gentoo");
        fs::create_dir(&old_target).unwrap();
        fs::create_dir(&new_target).unwrap();

        let link = dir.path().join("linux");
        std::os::unix::fs::symlink(&old_target, &link).unwrap();

        swap_symlink(&link, &new_target).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), new_target);
    }

    #[test]
    fn test_swap_symlink_creates_fresh_link() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("linux-3.12.6-gentoo");
        fs::create_dir(&target).unwrap();

        let link = dir.path().join("linux");
        swap_symlink(&link, &target).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), target);
    }
}
