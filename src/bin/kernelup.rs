use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};

use kernelup::boot::with_boot_mounted;
use kernelup::bootloader::{self, Dialect, KernelEntry};
use kernelup::build::{self, Binary};
use kernelup::config::Settings;
use kernelup::error::Error;
use kernelup::portage::{self, EqueryOwner};
use kernelup::preflight;
use kernelup::sources::{self, KernelSpec, SourcesResolver};

fn usage() -> &'static str {
    "Usage:\n  kernelup [<kernel-spec>] [options]\n\n\
     Builds and installs a Gentoo kernel, then adds a boot entry for it.\n\
     <kernel-spec> names the sources, e.g. 'gentoo-sources-3.12.6',\n\
     'hardened-sources-3.11.7-r1', or just '3.12.6'. Without one, the\n\
     newest installed source tree is rebuilt.\n\n\
     Options:\n  \
     -c, --configurator <target>    make target used to configure (default: menuconfig)\n  \
     -o, --kernel-options <opts>    literal options for the kernel command line\n  \
     -f, --configuration <path>     kernel configuration to use instead of the newest in /boot\n  \
     -b, --bootloader <grub|grub2>  boot loader dialect (default: grub)\n  \
     -i, --initramfs                build and install an initramfs with dracut\n      \
     --initramfs-options <opts>     extra options passed to dracut\n  \
     -r, --module-rebuild           run emerge @module-rebuild afterwards\n  \
     -t, --time                     report how long the build took\n  \
     -y, --accept-defaults          accept defaults for new configuration items\n  \
     -n, --dry-run                  print mutating commands instead of running them\n      \
     --version                      print the version and exit\n  \
     -h, --help                     show this help"
}

struct Options {
    spec: Option<String>,
    configurator: String,
    kernel_options: String,
    configuration: Option<PathBuf>,
    dialect: Dialect,
    initramfs: bool,
    initramfs_options: String,
    module_rebuild: bool,
    time_build: bool,
    accept_defaults: bool,
    dry_run: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            spec: None,
            configurator: "menuconfig".to_string(),
            kernel_options: String::new(),
            configuration: None,
            dialect: Dialect::Grub,
            initramfs: false,
            initramfs_options: String::new(),
            module_rebuild: false,
            time_build: false,
            accept_defaults: false,
            dry_run: false,
        }
    }
}

fn value_for(flag: &str, iter: &mut std::slice::Iter<'_, String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{} requires a value\n\n{}", flag, usage()))
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" | "--configurator" => options.configurator = value_for(arg, &mut iter)?,
            "-o" | "--kernel-options" => options.kernel_options = value_for(arg, &mut iter)?,
            "-f" | "--configuration" => {
                options.configuration = Some(PathBuf::from(value_for(arg, &mut iter)?))
            }
            "-b" | "--bootloader" => {
                options.dialect = Dialect::parse(&value_for(arg, &mut iter)?)?
            }
            "--initramfs-options" => options.initramfs_options = value_for(arg, &mut iter)?,
            "-i" | "--initramfs" => options.initramfs = true,
            "-r" | "--module-rebuild" => options.module_rebuild = true,
            "-t" | "--time" => options.time_build = true,
            "-y" | "--accept-defaults" => options.accept_defaults = true,
            "-n" | "--dry-run" => options.dry_run = true,
            other if other.starts_with('-') => bail!("unknown option '{}'\n\n{}", other, usage()),
            spec => {
                if options.spec.is_some() {
                    bail!("only one kernel specification may be given\n\n{}", usage());
                }
                options.spec = Some(spec.to_string());
            }
        }
    }

    Ok(options)
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", usage());
        return Ok(());
    }
    if args.iter().any(|a| a == "--version") {
        println!("kernelup {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    run(parse_args(&args)?)
}

fn run(options: Options) -> Result<()> {
    let settings = Settings::load()?;

    let mut extra_tools: Vec<(&str, &str)> = options.dialect.required_tools().to_vec();
    if options.initramfs {
        extra_tools.push(("dracut", "sys-kernel/dracut"));
    }
    preflight::check_host_tools(&extra_tools)?;

    if !options.dry_run && !preflight::running_as_root() {
        bail!("kernel installation requires root privileges (use --dry-run to preview)");
    }

    let mut resolver = SourcesResolver::new(&settings, EqueryOwner);

    let atom = resolver.resolve_package_atom(options.spec.as_deref())?;
    println!("Using kernel package {atom}");

    if !portage::is_installed(&atom)? {
        portage::install(&atom, options.dry_run)?;
    }

    let directory = match resolver.resolve_directory_name(&atom) {
        Ok(directory) => directory,
        // A dry run never installed anything, so derive the directory
        // the sources would unpack to instead of failing.
        Err(error)
            if options.dry_run
                && matches!(error.downcast_ref::<Error>(), Some(Error::SourcesNotInstalled(_))) =>
        {
            match options.spec.as_deref() {
                Some(spec) => KernelSpec::parse(spec)?.directory_name(),
                None => return Err(error),
            }
        }
        Err(error) => return Err(error),
    };
    println!("Using source directory {directory}");

    sources::set_symlink(&settings, &directory, options.dry_run)?;

    with_boot_mounted(&settings.boot_root, options.dry_run, || {
        if let Some(configuration) =
            resolver.resolve_configuration_file(options.configuration.clone())?
        {
            sources::copy_configuration(&settings, &configuration, options.dry_run)?;
        } else {
            println!("  No previous configuration found; starting from defaults");
        }
        Ok(())
    })?;

    let make_opts = build::make_opts(&settings);
    build::configure(
        &settings,
        &options.configurator,
        &make_opts,
        options.accept_defaults,
        options.dry_run,
    )?;

    let build_started = Instant::now();
    build::build(&settings, &make_opts, options.dry_run)?;
    let build_elapsed = build_started.elapsed();

    let binary = Binary::new(&directory);
    let entry = KernelEntry {
        name: binary.name().to_string(),
        image: binary.image()?,
        root_partition: bootloader::fstab::root_partition(&settings.fstab)?,
        boot_partition: bootloader::fstab::boot_partition(&settings.fstab)?,
        options: options.kernel_options.clone(),
        initrd: options.initramfs.then(|| binary.initrd()),
    };

    with_boot_mounted(&settings.boot_root, options.dry_run, || {
        binary.install(&settings, options.dry_run)?;
        if options.initramfs {
            binary.install_initramfs(&settings, &options.initramfs_options, options.dry_run)?;
        }
        bootloader::install_entry(&settings, options.dialect, &entry, options.dry_run)
    })
    .context("installing the new kernel")?;

    if options.module_rebuild {
        portage::rebuild_modules(options.dry_run)?;
    }

    if options.time_build {
        let seconds = build_elapsed.as_secs();
        println!(
            "Kernel build took {}h {}m {}s",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        );
    }

    Ok(())
}
