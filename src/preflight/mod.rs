//! Preflight checks before touching the system.
//!
//! Validates that the host has the delegated tools installed and that
//! the process has enough privilege, so a kernel update never dies
//! halfway through with a cryptic "command not found".

use anyhow::{bail, Result};

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Host tools every kernel update needs.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("emerge", "sys-apps/portage"),
    ("equery", "app-portage/gentoolkit"),
    ("make", "sys-devel/make"),
    ("mount", "sys-apps/util-linux"),
    ("umount", "sys-apps/util-linux"),
];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with the list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check the common tool set plus any dialect- or feature-specific
/// extras (`grub2-mkconfig`, `dracut`, ...).
pub fn check_host_tools(extra: &[(&str, &str)]) -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)?;
    check_required_tools(extra)
}

/// Whether the process runs with root privileges. Kernel installation
/// and boot loader patching are refused without them.
pub fn running_as_root() -> bool {
    // Safety: geteuid has no failure modes or side effects.
    unsafe { libc::geteuid() == 0 }
}
