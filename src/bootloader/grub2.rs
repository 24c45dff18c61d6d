//! GRUB2 support.
//!
//! GRUB2 owns its own configuration file, so instead of patching it we
//! append the extra kernel options to `GRUB_CMDLINE_LINUX_DEFAULT` in the
//! defaults file, expose the image under a stable `kernel-*` name, and
//! let `grub2-mkconfig` regenerate the real configuration.

use anyhow::{Context, Result};
use std::fs;

use super::KernelEntry;
use crate::config::Settings;
use crate::error::Error;
use crate::fsops;
use crate::process::Cmd;

/// Append `options` inside the quoted `GRUB_CMDLINE_LINUX_DEFAULT` value.
///
/// Pure line transform; every other line is preserved verbatim. Options
/// already present in the value are not duplicated.
pub fn append_cmdline(lines: &[String], options: &str) -> Vec<String> {
    if options.is_empty() {
        return lines.to_vec();
    }

    lines
        .iter()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("GRUB_CMDLINE_LINUX_DEFAULT=")
                && trimmed.ends_with('"')
                && !has_all_tokens(trimmed, options)
            {
                let mut amended = line[..line.len() - 1].to_string();
                if !amended.ends_with('"') {
                    amended.push(' ');
                }
                amended.push_str(options);
                amended.push('"');
                amended
            } else {
                line.clone()
            }
        })
        .collect()
}

/// Whether every whitespace token of `options` already appears as a
/// whole token inside the quoted value. A plain substring test would
/// mistake `quietsplash` for `quiet`.
fn has_all_tokens(line: &str, options: &str) -> bool {
    let value = line
        .split_once('=')
        .map(|(_, value)| value.trim_matches('"'))
        .unwrap_or("");
    let existing: Vec<&str> = value.split_whitespace().collect();
    options
        .split_whitespace()
        .all(|option| existing.contains(&option))
}

pub fn install_entry(settings: &Settings, entry: &KernelEntry, dry_run: bool) -> Result<()> {
    link_image(settings, entry, dry_run)?;
    amend_defaults(settings, &entry.options, dry_run)?;
    regenerate(settings, dry_run)
}

/// Symlink the versioned image to a stable `kernel-<suffix>` name so the
/// grub2 probe scripts pick it up.
fn link_image(settings: &Settings, entry: &KernelEntry, dry_run: bool) -> Result<()> {
    let Some(suffix) = entry.image.split_once('-').map(|(_, rest)| rest) else {
        return Ok(());
    };
    let link = settings.boot_root.join(format!("kernel-{suffix}"));
    if dry_run {
        println!("ln -s {} {}", entry.image, link.display());
        return Ok(());
    }
    if !link.is_symlink() {
        std::os::unix::fs::symlink(&entry.image, &link)
            .with_context(|| format!("linking {}", link.display()))?;
    }
    Ok(())
}

fn amend_defaults(settings: &Settings, options: &str, dry_run: bool) -> Result<()> {
    if options.is_empty() {
        return Ok(());
    }
    let path = &settings.grub2_defaults;
    let contents = fs::read_to_string(path)
        .map_err(|_| Error::ConfigurationUnreadable(path.clone()))?;
    let lines: Vec<String> = contents.lines().map(str::to_string).collect();

    let mut amended = append_cmdline(&lines, options).join("\n");
    amended.push('\n');

    if dry_run {
        println!("cat > {} <<'EOF'", path.display());
        println!("{amended}EOF");
        return Ok(());
    }
    fsops::replace_file_with_backup(path, &amended)
        .with_context(|| format!("amending {}", path.display()))
}

fn regenerate(settings: &Settings, dry_run: bool) -> Result<()> {
    let config = &settings.grub2_config;
    let backup = fs::read(config).ok();

    let result = Cmd::new("grub2-mkconfig")
        .arg("-o")
        .arg(config.to_string_lossy())
        .error_msg("regenerating the grub2 configuration failed")
        .run_or_print(dry_run);

    if result.is_err() {
        if let Some(previous) = backup {
            let _ = fs::write(config, previous);
        }
    }
    result
}
