//! Error taxonomy for the kernel update workflow.
//!
//! Core components never print; they return one of these variants with
//! enough detail (offending string, path, or command) for the CLI layer
//! to format a message. Everything converts into `anyhow::Error` at the
//! orchestration boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The user-supplied kernel specification matched neither accepted
    /// grammar (`[<flavor>-]sources-<version>[-r<rev>]` or
    /// `<version>[-<flavor>][-r<rev>]`).
    #[error("kernel specification '{0}' does not name a kernel package")]
    MalformedSpec(String),

    /// No `linux-*` source directories exist under the sources root.
    #[error("no kernel source directories found under {0}")]
    NoSourcesFound(PathBuf),

    /// No on-disk source directory is owned by the resolved package atom.
    #[error("sources for {0} are not installed; emerge them first")]
    SourcesNotInstalled(String),

    /// The newest source directory exists but no installed package claims
    /// it, so no atom can be derived from it.
    #[error("no installed package owns the kernel sources at {0}")]
    SourcesUnowned(PathBuf),

    /// A boot or root partition path matches no recognized device-naming
    /// convention (`/dev/sdXN` style or `/dev/cciss/c0dDpP`).
    #[error("cannot encode boot device '{0}' for the boot loader")]
    UnsupportedBootDevice(String),

    /// No `/` entry could be parsed out of the fstab.
    #[error("root partition not found in {0}")]
    RootPartitionNotFound(PathBuf),

    /// The boot loader configuration file could not be read.
    #[error("cannot read boot loader configuration at {0}")]
    ConfigurationUnreadable(PathBuf),

    /// A configurator target that the kernel build system does not offer.
    #[error("configurator '{0}' is not supported")]
    UnsupportedConfigurator(String),

    /// A delegated external command exited with a non-zero status.
    #[error("command `{command}` failed with exit status {status}")]
    CommandFailed { command: String, status: i32 },
}
