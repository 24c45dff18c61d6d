//! Kernel building.
//!
//! Delegates configuration and compilation to the kernel's own build
//! system, with parallelism taken from the system MAKEOPTS. All commands
//! run inside the conventional source symlink.

pub mod binary;

pub use binary::Binary;

use anyhow::Result;

use crate::config::Settings;
use crate::error::Error;
use crate::portage;
use crate::process::Cmd;

/// Configurator targets the kernel build system offers.
pub const CONFIGURATORS: &[&str] = &[
    "config",
    "menuconfig",
    "nconfig",
    "xconfig",
    "gconfig",
    "oldconfig",
    "silentoldconfig",
    "defconfig",
    "allyesconfig",
    "allmodconfig",
    "allnoconfig",
    "randconfig",
];

/// MAKEOPTS from make.conf, or `-j<ncpu>` when none is configured.
pub fn make_opts(settings: &Settings) -> Vec<String> {
    if let Some(opts) = portage::make_opts(&settings.make_conf) {
        return opts;
    }
    let cpus = match std::thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            eprintln!("  [WARN] Could not detect CPU count ({}), using 4 jobs", e);
            4
        }
    };
    vec![format!("-j{}", cpus)]
}

/// Run the chosen configurator inside the source tree.
///
/// `accept_defaults` pipes `yes ""` into the configurator so new options
/// take their defaults without prompting.
pub fn configure(
    settings: &Settings,
    configurator: &str,
    make_opts: &[String],
    accept_defaults: bool,
    dry_run: bool,
) -> Result<()> {
    if !CONFIGURATORS.contains(&configurator) {
        return Err(Error::UnsupportedConfigurator(configurator.to_string()).into());
    }

    println!("Configuring the kernel sources ...");

    if accept_defaults {
        let command = format!("yes \"\" | make {} {}", make_opts.join(" "), configurator);
        Cmd::new("sh")
            .args(["-c", &command])
            .current_dir(&settings.sources_symlink)
            .error_msg("kernel configuration failed")
            .run_or_print(dry_run)?;
    } else {
        Cmd::new("make")
            .args(make_opts.iter().cloned())
            .arg(configurator)
            .current_dir(&settings.sources_symlink)
            .error_msg("kernel configuration failed")
            .run_or_print(dry_run)?;
    }

    println!("Kernel sources configured.");
    Ok(())
}

/// Compile the kernel and install its modules.
pub fn build(settings: &Settings, make_opts: &[String], dry_run: bool) -> Result<()> {
    println!("Building the kernel sources ...");

    Cmd::new("make")
        .args(make_opts.iter().cloned())
        .current_dir(&settings.sources_symlink)
        .error_msg("kernel build failed")
        .run_or_print(dry_run)?;

    Cmd::new("make")
        .args(make_opts.iter().cloned())
        .arg("modules_install")
        .current_dir(&settings.sources_symlink)
        .error_msg("module install failed")
        .run_or_print(dry_run)?;

    println!("Kernel sources built.");
    Ok(())
}
