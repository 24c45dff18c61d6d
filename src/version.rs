//! Version keying for kernel artifact names.
//!
//! Source directories (`linux-3.12.6-gentoo`) and boot configuration files
//! (`config-3.12.6-gentoo`) both embed a kernel version. `version_key`
//! collapses that version into a single integer so collections of names
//! can be sorted newest-first.

use regex::Regex;
use std::sync::OnceLock;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Unanchored: an arbitrary prefix (linux-, config-) and trailing
        // text (flavor, a stray .old) are both tolerated.
        Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)(?:\.(?P<patch>\d+))?")
            .expect("version pattern is valid")
    })
}

fn revision_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"-r(?P<revision>\d+)\b").expect("revision pattern is valid")
    })
}

/// Convert a kernel-related name into a sortable integer key.
///
/// The key is `major*10^9 + minor*10^6 + patch*10^3 + revision`, so it is
/// strictly increasing under component-wise version comparison. A name
/// with no recognizable version at all keys as 0; callers that care must
/// pre-filter with [`is_source_directory`] or [`is_config_file`].
///
/// ```
/// use kernelup::version::version_key;
///
/// assert_eq!(version_key("linux-3.12.6-gentoo"), 3_012_006_000);
/// assert_eq!(version_key("linux-3.10.7-gentoo-r1"), 3_010_007_001);
/// ```
pub fn version_key(name: &str) -> u64 {
    let Some(captures) = version_pattern().captures(name) else {
        return 0;
    };

    let component = |group: &str| -> u64 {
        captures
            .name(group)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    // The revision sits somewhere after the numeric version, usually
    // behind a flavor segment, so it gets its own search over the tail.
    let tail = &name[captures.get(0).map(|m| m.end()).unwrap_or(0)..];
    let revision: u64 = revision_pattern()
        .captures(tail)
        .and_then(|c| c.name("revision"))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    component("major") * 1_000_000_000
        + component("minor") * 1_000_000
        + component("patch") * 1_000
        + revision
}

/// Whether a directory name looks like an unpacked kernel source tree.
pub fn is_source_directory(name: &str) -> bool {
    name.strip_prefix("linux-").is_some_and(|rest| !rest.is_empty())
}

/// Whether a file name looks like a saved kernel configuration in /boot.
pub fn is_config_file(name: &str) -> bool {
    name.strip_prefix("config-").is_some_and(|rest| !rest.is_empty())
}
