//! Kernel specification grammar.
//!
//! Two shapes are accepted, mirroring what operators actually type:
//!
//! - `[<flavor>-]sources-<version>[-r<revision>]`, e.g.
//!   `hardened-sources-3.11.7-r1` or `sources-3.12.6`
//! - `<version>[-<flavor>][-r<revision>]`, e.g. `3.12.6-hardened` or
//!   plain `3.12.6`
//!
//! Anything else is a [`Error::MalformedSpec`]; an atom is never
//! fabricated from unmatched input.

use crate::error::Error;

/// A parsed kernel specification. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSpec {
    /// Sources flavor, `gentoo` when not named.
    pub flavor: String,
    /// Dotted numeric version, e.g. `3.12.6`.
    pub version: String,
    /// Gentoo ebuild revision, when one was given.
    pub revision: Option<u32>,
}

impl KernelSpec {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let malformed = || Error::MalformedSpec(input.to_string());

        let (stem, revision) = split_revision(input);

        // Named form: [<flavor>-]sources-<version>
        if let Some((head, version)) = stem.split_once("sources-") {
            let flavor = match head.strip_suffix('-') {
                Some(flavor) if is_flavor(flavor) => flavor.to_string(),
                None if head.is_empty() => "gentoo".to_string(),
                _ => return Err(malformed()),
            };
            if !is_version(version) {
                return Err(malformed());
            }
            return Ok(Self {
                flavor,
                version: version.to_string(),
                revision,
            });
        }

        // Bare form: <version>[-<flavor>]
        match stem.split_once('-') {
            Some((version, flavor)) if is_version(version) && is_flavor(flavor) => Ok(Self {
                flavor: flavor.to_string(),
                version: version.to_string(),
                revision,
            }),
            None if is_version(stem) => Ok(Self {
                flavor: "gentoo".to_string(),
                version: stem.to_string(),
                revision,
            }),
            _ => Err(malformed()),
        }
    }

    /// The canonical Portage atom, `=sys-kernel/<flavor>-sources-<version>`.
    pub fn atom(&self) -> String {
        let mut atom = format!("=sys-kernel/{}-sources-{}", self.flavor, self.version);
        if let Some(revision) = self.revision {
            atom.push_str(&format!("-r{revision}"));
        }
        atom
    }

    /// The source directory these sources unpack to. The reference
    /// `vanilla` flavor omits its flavor segment.
    pub fn directory_name(&self) -> String {
        let mut name = format!("linux-{}", self.version);
        if self.flavor != "vanilla" {
            name.push('-');
            name.push_str(&self.flavor);
        }
        if let Some(revision) = self.revision {
            name.push_str(&format!("-r{revision}"));
        }
        name
    }
}

/// Split a trailing `-r<digits>` revision suffix off a specification.
fn split_revision(input: &str) -> (&str, Option<u32>) {
    if let Some(idx) = input.rfind("-r") {
        let digits = &input[idx + 2..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(revision) = digits.parse() {
                return (&input[..idx], Some(revision));
            }
        }
    }
    (input, None)
}

/// Dotted numeric version: two or three `.`-separated number groups.
fn is_version(candidate: &str) -> bool {
    let groups: Vec<&str> = candidate.split('.').collect();
    (2..=3).contains(&groups.len())
        && groups
            .iter()
            .all(|g| !g.is_empty() && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Flavor names as Portage package names allow them, minus a bare
/// `r<digits>` which would be ambiguous with a revision suffix.
fn is_flavor(candidate: &str) -> bool {
    let mut bytes = candidate.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'+')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_form_round_trips_to_atom() {
        let spec = KernelSpec::parse("gentoo-sources-3.12.6").unwrap();
        assert_eq!(spec.atom(), "=sys-kernel/gentoo-sources-3.12.6");

        let spec = KernelSpec::parse("hardened-sources-3.11.7-r1").unwrap();
        assert_eq!(spec.atom(), "=sys-kernel/hardened-sources-3.11.7-r1");
    }

    #[test]
    fn test_named_form_without_flavor_defaults_to_gentoo() {
        let spec = KernelSpec::parse("sources-3.12.6").unwrap();
        assert_eq!(spec.flavor, "gentoo");
        assert_eq!(spec.atom(), "=sys-kernel/gentoo-sources-3.12.6");
    }

    #[test]
    fn test_bare_version() {
        let spec = KernelSpec::parse("3.12.6").unwrap();
        assert_eq!(spec.flavor, "gentoo");
        assert_eq!(spec.version, "3.12.6");
        assert_eq!(spec.revision, None);
    }

    #[test]
    fn test_bare_version_with_flavor_and_revision() {
        let spec = KernelSpec::parse("3.11.7-hardened-r1").unwrap();
        assert_eq!(spec.flavor, "hardened");
        assert_eq!(spec.version, "3.11.7");
        assert_eq!(spec.revision, Some(1));
        assert_eq!(spec.atom(), "=sys-kernel/hardened-sources-3.11.7-r1");
    }

    #[test]
    fn test_bare_version_with_revision_only() {
        let spec = KernelSpec::parse("3.11.7-r1").unwrap();
        assert_eq!(spec.flavor, "gentoo");
        assert_eq!(spec.revision, Some(1));
    }

    #[test]
    fn test_two_component_version_accepted() {
        let spec = KernelSpec::parse("4.1-vanilla").unwrap();
        assert_eq!(spec.version, "4.1");
        assert_eq!(spec.flavor, "vanilla");
    }

    #[test]
    fn test_rejects_unmatched_input() {
        for bad in ["", "not a kernel", "sources-", "3", "3.x.6", "-sources-3.12.6", "3.12.6-"] {
            assert!(
                matches!(KernelSpec::parse(bad), Err(Error::MalformedSpec(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_directory_name_shapes() {
        assert_eq!(
            KernelSpec::parse("gentoo-sources-3.12.6").unwrap().directory_name(),
            "linux-3.12.6-gentoo"
        );
        assert_eq!(
            KernelSpec::parse("hardened-sources-3.11.7-r1").unwrap().directory_name(),
            "linux-3.11.7-hardened-r1"
        );
        // Vanilla omits the flavor segment.
        assert_eq!(
            KernelSpec::parse("vanilla-sources-3.12.6").unwrap().directory_name(),
            "linux-3.12.6"
        );
    }

    #[test]
    fn test_revision_must_be_numeric() {
        // `-rc1` is not a revision suffix; it parses as part of a flavor.
        let spec = KernelSpec::parse("3.12.6-vanilla-rc1");
        assert!(spec.is_ok());
        assert_eq!(spec.unwrap().flavor, "vanilla-rc1");
    }
}
