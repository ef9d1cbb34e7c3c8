// src/version/nevra.rs

//! NEVRA (name-epoch:version-release.arch) parsing.

use crate::error::{Error, Result};
use crate::version::Evr;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

// Accepts the epoch before the name or before the version:
//   389-ds-base-1.3.7.8-1.fc27.src
//   perl-DBD-Pg-2:3.7.4-2.module+el8+2517+b1471f1c.x86_64
//   3:Agda-2.5.2-9.fc27.x86_64
static NEVRA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<e1>[0-9]+):)?(?P<pn>[^:]+)-(?:(?P<e2>[0-9]+):)?(?P<ver>[^-:]+)-(?P<rel>[^-:]+)\.(?P<arch>[a-z0-9_]+)$",
    )
    .expect("NEVRA regex is valid")
});

/// A parsed package identity string.
///
/// An absent epoch parses as 0, matching EVR comparison semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nevra {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    /// Parse a NEVRA string, tolerating a trailing `.rpm` suffix.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_suffix(".rpm").unwrap_or(s);
        let caps = NEVRA_RE
            .captures(trimmed)
            .ok_or_else(|| Error::ParseError(format!("Failed to parse rpm name '{s}'")))?;

        let epoch = caps
            .name("e1")
            .or_else(|| caps.name("e2"))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0);

        Ok(Self {
            name: caps["pn"].to_string(),
            epoch,
            version: caps["ver"].to_string(),
            release: caps["rel"].to_string(),
            arch: caps["arch"].to_string(),
        })
    }

    /// The EVR part of this identity.
    pub fn evr(&self) -> Evr {
        Evr::new(self.epoch, self.version.clone(), self.release.clone())
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(
                f,
                "{}-{}:{}-{}.{}",
                self.name, self.epoch, self.version, self.release, self.arch
            )
        } else {
            write!(
                f,
                "{}-{}-{}.{}",
                self.name, self.version, self.release, self.arch
            )
        }
    }
}

/// Format NEVRA parts without building an intermediate struct.
pub fn nevra_string(name: &str, evr: &Evr, arch: &str) -> String {
    if evr.epoch > 0 {
        format!("{}-{}:{}-{}.{}", name, evr.epoch, evr.version, evr.release, arch)
    } else {
        format!("{}-{}-{}.{}", name, evr.version, evr.release, arch)
    }
}
