//! Gentoo kernel update builder.
//!
//! Automates the host-local workflow of moving a Gentoo box to a new
//! kernel: resolve a requested kernel specification to a Portage atom,
//! make sure those sources are installed, point `/usr/src/linux` at
//! them, carry the previous configuration forward, drive the kernel's
//! own build tooling, install the artifacts into /boot, and add a boot
//! loader entry. Heavy lifting is delegated to the external programs
//! that own each step (`emerge`, `make`, `mount`, `grub2-mkconfig`);
//! this crate does the sequencing, naming, and text-file patching
//! around them.
//!
//! # Architecture
//!
//! ```text
//! kernelup (bin)
//!     │
//!     ├── sources    - spec grammar, atom/directory resolution
//!     ├── version    - version keying for newest-first ordering
//!     ├── build      - make configure/build, artifact install
//!     ├── bootloader - grub.conf patching, grub2 regeneration
//!     ├── portage    - emerge/equery collaborator
//!     ├── boot       - scoped /boot mounting
//!     └── fsops      - write-with-backup discipline
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kernelup::config::Settings;
//! use kernelup::portage::EqueryOwner;
//! use kernelup::sources::SourcesResolver;
//!
//! let settings = Settings::load()?;
//! let mut resolver = SourcesResolver::new(&settings, EqueryOwner);
//! let atom = resolver.resolve_package_atom(Some("gentoo-sources-3.12.6"))?;
//! let directory = resolver.resolve_directory_name(&atom)?;
//! ```

pub mod boot;
pub mod bootloader;
pub mod build;
pub mod config;
pub mod error;
pub mod fsops;
pub mod portage;
pub mod preflight;
pub mod process;
pub mod sources;
pub mod version;

pub use config::Settings;
pub use error::Error;
