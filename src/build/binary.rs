//! Built kernel artifacts and their installation into /boot.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::config::Settings;
use crate::fsops;
use crate::process::Cmd;

/// A kernel built out of a specific source directory.
///
/// Knows the artifact names that directory produces: image, saved
/// configuration, System.map, and the optional initramfs.
#[derive(Debug, Clone)]
pub struct Binary {
    /// Source directory name, e.g. `linux-3.12.6-gentoo`.
    pub directory: String,
}

impl Binary {
    pub fn new(directory: &str) -> Self {
        Self {
            directory: directory.to_string(),
        }
    }

    /// Entry label for the boot loader; the source directory name.
    pub fn name(&self) -> &str {
        &self.directory
    }

    /// Version suffix shared by all artifacts, e.g. `3.12.6-gentoo`.
    pub fn suffix(&self) -> &str {
        self.directory
            .split_once('-')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.directory)
    }

    /// The image name the build produces for this architecture.
    pub fn install_image(&self) -> Result<&'static str> {
        match std::env::consts::ARCH {
            "x86_64" | "x86" => Ok("bzImage"),
            other => bail!("no known kernel image name for architecture '{}'", other),
        }
    }

    /// Path of the image inside the source tree.
    pub fn image_directory(&self) -> &'static str {
        "arch/x86/boot"
    }

    /// Versioned image name under /boot, e.g. `bzImage-3.12.6-gentoo`.
    pub fn image(&self) -> Result<String> {
        Ok(format!("{}-{}", self.install_image()?, self.suffix()))
    }

    /// Versioned initramfs name under /boot.
    pub fn initrd(&self) -> String {
        format!("initramfs-{}.img", self.suffix())
    }

    /// Install the image, configuration, and System.map into the boot
    /// area, plus System.map at the filesystem root.
    ///
    /// Copies are sequenced with backups; on any failure the files
    /// installed so far are removed or restored before the error is
    /// propagated.
    pub fn install(&self, settings: &Settings, dry_run: bool) -> Result<()> {
        let source = &settings.sources_symlink;
        let suffix = self.suffix();

        let copies: Vec<(PathBuf, PathBuf)> = vec![
            (
                source.join(self.image_directory()).join(self.install_image()?),
                settings.boot_root.join(self.image()?),
            ),
            (
                source.join(".config"),
                settings.boot_root.join(format!("config-{suffix}")),
            ),
            (
                source.join("System.map"),
                settings.boot_root.join(format!("System.map-{suffix}")),
            ),
            (source.join("System.map"), PathBuf::from("/System.map")),
        ];

        if dry_run {
            for (src, dst) in &copies {
                println!("cp {} {}", src.display(), dst.display());
            }
            return Ok(());
        }

        println!("Installing the kernel binaries ...");

        let mut installed: Vec<(PathBuf, Option<PathBuf>)> = Vec::new();
        for (src, dst) in &copies {
            match fsops::copy_with_backup(src, dst) {
                Ok(backup) => installed.push((dst.clone(), backup)),
                Err(error) => {
                    // Roll back the copies made so far; freshly created
                    // files are removed, overwritten ones are restored
                    // from the backups still held for them.
                    for (path, backup) in installed.iter().rev() {
                        match backup {
                            Some(bak) => {
                                let _ = fs::rename(bak, path);
                            }
                            None => {
                                let _ = fs::remove_file(path);
                            }
                        }
                    }
                    return Err(error).with_context(|| {
                        format!("installing kernel binary {}", dst.display())
                    });
                }
            }
        }

        for (_, backup) in installed {
            fsops::discard_backup(backup);
        }

        println!("Kernel binaries installed.");
        Ok(())
    }

    /// Build and install an initramfs for this kernel with dracut.
    pub fn install_initramfs(
        &self,
        settings: &Settings,
        dracut_options: &str,
        dry_run: bool,
    ) -> Result<()> {
        println!("Building and installing the initramfs ...");

        let output = settings.boot_root.join(self.initrd());
        let mut cmd = Cmd::new("dracut").args(["-H", "--force"]);
        if !dracut_options.is_empty() {
            cmd = cmd.args(dracut_options.split_whitespace());
        }
        cmd.arg(output.to_string_lossy())
            .arg(self.suffix())
            .error_msg("building the initramfs failed")
            .run_or_print(dry_run)?;

        println!("initramfs built and installed.");
        Ok(())
    }
}
