//! Legacy GRUB configuration patching.
//!
//! [`patch`] is a pure transform from the existing `grub.conf` line
//! sequence plus the new kernel's parameters to the updated sequence.
//! It performs no I/O, which keeps the whole patching step testable
//! without a /boot to point it at.

use regex::Regex;
use std::sync::OnceLock;

use super::KernelEntry;
use crate::error::Error;

fn device_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/dev/([a-z]*)d(?P<letter>[a-z])(?P<number>\d+)$")
            .expect("device pattern is valid")
    })
}

fn cciss_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/dev/cciss/c0d(?P<drive>\d+)p(?P<partition>\d+)$")
            .expect("cciss pattern is valid")
    })
}

/// Encode a boot partition device path the way legacy GRUB names it.
///
/// `/dev/sda1` becomes `(hd0,0)`: the disk letter indexes into the
/// alphabet and the partition number drops to 0-based. Smart Array
/// (`cciss`) paths pass both numbers through, matching the long-standing
/// behavior of this tool rather than a unified rule.
pub fn grub_root(device: &str) -> Result<String, Error> {
    if let Some(captures) = cciss_pattern().captures(device) {
        return Ok(format!("(hd{},{})", &captures["drive"], &captures["partition"]));
    }

    if let Some(captures) = device_pattern().captures(device) {
        let letter = captures["letter"].bytes().next().unwrap_or(b'a');
        let number: u32 = captures["number"]
            .parse()
            .map_err(|_| Error::UnsupportedBootDevice(device.to_string()))?;
        let partition = number
            .checked_sub(1)
            .ok_or_else(|| Error::UnsupportedBootDevice(device.to_string()))?;
        return Ok(format!("(hd{},{})", letter - b'a', partition));
    }

    Err(Error::UnsupportedBootDevice(device.to_string()))
}

/// Rewrite a `default <N>` directive with the index incremented.
fn bump_default(line: &str) -> Option<String> {
    let rest = line.strip_prefix("default")?;
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let value = rest.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u64 = value.parse().ok()?;
    Some(format!("default {}", index + 1))
}

/// Produce the updated configuration line sequence.
///
/// A single linear pass over the input: `default <N>` directives are
/// rewritten with the index bumped, every other line is preserved
/// verbatim in order, and a new entry block is appended at the end. If
/// any line already mentions the kernel's name the input is returned as
/// a byte-identical copy instead, so applying the patch twice is the
/// same as applying it once.
pub fn patch(
    lines: &[String],
    entry: &KernelEntry,
    added_at: &str,
) -> Result<Vec<String>, Error> {
    if lines.iter().any(|line| line.contains(&entry.name)) {
        return Ok(lines.to_vec());
    }

    let mut output: Vec<String> = lines
        .iter()
        .map(|line| bump_default(line).unwrap_or_else(|| line.clone()))
        .collect();

    let mut kernel_line = format!(
        "  kernel /boot/{} root={}",
        entry.image, entry.root_partition
    );
    if !entry.options.is_empty() {
        kernel_line.push(' ');
        kernel_line.push_str(&entry.options);
    }

    output.push(String::new());
    output.push(format!("# Kernel added {added_at}:"));
    output.push(format!("title={}", entry.name));
    output.push(format!("  root {}", grub_root(&entry.boot_partition)?));
    output.push(kernel_line);
    if let Some(initrd) = &entry.initrd {
        output.push(format!("  initrd /boot/{initrd}"));
    }

    Ok(output)
}
