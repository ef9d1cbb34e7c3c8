// src/version/mod.rs

//! RPM-style version ordering.
//!
//! Implements the epoch:version-release comparison used by RPM, including
//! the `~` (pre-release) and `^` (post-release) markers. `compare_version`
//! is a total order over arbitrary strings and never fails; malformed input
//! simply compares by its recognizable segments.

mod nevra;

pub use nevra::{Nevra, nevra_string};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An epoch/version/release tuple, the unit of RPM-style ordering.
///
/// An absent epoch is equal to epoch 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evr {
    pub epoch: u64,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(epoch: u64, version: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release: release.into(),
        }
    }

    /// Build from string parts as they appear in an artifact or NEVRA.
    /// A missing or non-numeric epoch counts as 0.
    pub fn from_parts(epoch: Option<&str>, version: &str, release: &str) -> Self {
        let epoch = epoch.and_then(|e| e.parse::<u64>().ok()).unwrap_or(0);
        Self::new(epoch, version, release)
    }

    /// Precomputed order key, monotonic with [`compare_evr`]:
    /// `compare_evr(a, b) == a.key().cmp(&b.key())` for all a, b.
    pub fn key(&self) -> EvrKey {
        EvrKey {
            epoch: self.epoch,
            version: version_key(&self.version),
            release: version_key(&self.release),
        }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}-{}", self.version, self.release)
    }
}

/// Compare two EVR tuples: epoch numerically, then version, then release.
pub fn compare_evr(a: &Evr, b: &Evr) -> Ordering {
    match a.epoch.cmp(&b.epoch) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match compare_version(&a.version, &b.version) {
        Ordering::Equal => {}
        ord => return ord,
    }
    compare_version(&a.release, &b.release)
}

/// One token of a version string: a maximal digit run, a maximal letter
/// run, or a lone `~`/`^` marker. Every other character is a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(String),
    Alpha(String),
    Tilde,
    Caret,
}

fn tokenize(s: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'~' {
            segments.push(Segment::Tilde);
            i += 1;
        } else if c == b'^' {
            segments.push(Segment::Caret);
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            segments.push(Segment::Num(s[start..i].to_string()));
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            segments.push(Segment::Alpha(s[start..i].to_string()));
        } else {
            // Separator: skipped without producing a segment.
            i += 1;
        }
    }
    segments
}

/// Compare two digit runs by numeric magnitude, leading zeros ignored.
/// Stripped-length comparison avoids overflow on arbitrarily long runs.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        ord => ord,
    }
}

/// Compare two version strings segment by segment.
///
/// `~` sorts lower than anything including end-of-string; `^` sorts higher
/// than end-of-string but lower than any real segment; digit runs compare
/// numerically and outrank letter runs; with one side exhausted the other
/// side is greater.
pub fn compare_version(s1: &str, s2: &str) -> Ordering {
    let a = tokenize(s1);
    let b = tokenize(s2);
    let mut i = 0;
    let mut j = 0;
    loop {
        let sa = a.get(i);
        let sb = b.get(j);
        match (sa, sb) {
            (None, None) => return Ordering::Equal,
            // Tilde loses against everything, including end-of-string.
            (Some(Segment::Tilde), Some(Segment::Tilde)) => {
                i += 1;
                j += 1;
            }
            (Some(Segment::Tilde), _) => return Ordering::Less,
            (_, Some(Segment::Tilde)) => return Ordering::Greater,
            // Caret beats end-of-string but loses to a real segment.
            (Some(Segment::Caret), Some(Segment::Caret)) => {
                i += 1;
                j += 1;
            }
            (Some(Segment::Caret), None) => return Ordering::Greater,
            (None, Some(Segment::Caret)) => return Ordering::Less,
            (Some(Segment::Caret), Some(_)) => return Ordering::Less,
            (Some(_), Some(Segment::Caret)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(Segment::Num(x)), Some(Segment::Num(y))) => match compare_digits(x, y) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            },
            (Some(Segment::Num(_)), Some(Segment::Alpha(_))) => return Ordering::Greater,
            (Some(Segment::Alpha(_)), Some(Segment::Num(_))) => return Ordering::Less,
            (Some(Segment::Alpha(x)), Some(Segment::Alpha(y))) => match x.cmp(y) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            },
        }
    }
}

/// One element of a precomputed order key.
///
/// Variant declaration order encodes the comparator's ranking: `~` below
/// end-of-string, end-of-string below `^`, `^` below letter runs, letter
/// runs below digit runs. `Num` carries (stripped length, stripped digits)
/// so the derived ordering is numeric.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum KeySeg {
    Tilde,
    End,
    Caret,
    Alpha(String),
    Num(usize, String),
}

fn version_key(s: &str) -> Vec<KeySeg> {
    let mut key: Vec<KeySeg> = tokenize(s)
        .into_iter()
        .map(|seg| match seg {
            Segment::Tilde => KeySeg::Tilde,
            Segment::Caret => KeySeg::Caret,
            Segment::Alpha(a) => KeySeg::Alpha(a),
            Segment::Num(n) => {
                let stripped = n.trim_start_matches('0').to_string();
                KeySeg::Num(stripped.len(), stripped)
            }
        })
        .collect();
    key.push(KeySeg::End);
    key
}

/// Precomputed EVR order key. `Ord` on the key is exactly [`compare_evr`]
/// on the source tuples, so sorted structures built from keys agree with
/// the comparator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvrKey {
    epoch: u64,
    version: Vec<KeySeg>,
    release: Vec<KeySeg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare_version(a, b)
    }

    #[test]
    fn test_basic_ordering() {
        assert_eq!(cmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(cmp("1.0", "1.1.2"), Ordering::Less);
        assert_eq!(cmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(cmp("2.0", "10.0"), Ordering::Less);
    }

    #[test]
    fn test_leading_zeros_ignored() {
        assert_eq!(cmp("1.010", "1.10"), Ordering::Equal);
        assert_eq!(cmp("1.001", "1.1"), Ordering::Equal);
        assert_eq!(cmp("0001.2", "1.2"), Ordering::Equal);
    }

    #[test]
    fn test_letters_vs_digits() {
        // A trailing letter segment beats end-of-string...
        assert_eq!(cmp("1.0.1a", "1.0.1"), Ordering::Greater);
        // ...but a digit run outranks a letter run at the same position.
        assert_eq!(cmp("1.0.a", "1.0.1"), Ordering::Less);
        assert_eq!(cmp("1.0.alpha", "1.0.beta"), Ordering::Less);
    }

    #[test]
    fn test_tilde() {
        assert_eq!(cmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(cmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(cmp("1.0~rc1", "1.0~rc1"), Ordering::Equal);
        assert_eq!(cmp("1.0~~", "1.0~"), Ordering::Less);
    }

    #[test]
    fn test_caret() {
        assert_eq!(cmp("1.0^", "1.0"), Ordering::Greater);
        assert_eq!(cmp("1.0^git1", "1.0^git2"), Ordering::Less);
        assert_eq!(cmp("1.0^git1", "1.0.1"), Ordering::Less);
        assert_eq!(cmp("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(cmp("1.0~rc1^git1", "1.0~rc1"), Ordering::Greater);
    }

    #[test]
    fn test_separators_skipped() {
        assert_eq!(cmp("2_0", "2.0"), Ordering::Equal);
        assert_eq!(cmp("2..0", "2.0"), Ordering::Equal);
        assert_eq!(cmp("2-0+", "2.0"), Ordering::Equal);
    }

    #[test]
    fn test_malformed_input_never_fails() {
        assert_eq!(cmp("", ""), Ordering::Equal);
        assert_eq!(cmp("", "1"), Ordering::Less);
        assert_eq!(cmp("...", ""), Ordering::Equal);
        assert_eq!(cmp("+++a", "a"), Ordering::Equal);
    }

    #[test]
    fn test_total_order_transitivity() {
        let samples = [
            "", "1", "1.0", "1.0~rc1", "1.0~rc2", "1.0^", "1.0^git1", "1.0^git2", "1.0.1",
            "1.0.1a", "1.10", "2_0", "2.0", "10", "a", "0",
        ];
        for a in &samples {
            for b in &samples {
                // Antisymmetry
                assert_eq!(cmp(a, b), cmp(b, a).reverse(), "{a} vs {b}");
                for c in &samples {
                    if cmp(a, b) == Ordering::Less && cmp(b, c) == Ordering::Less {
                        assert_eq!(cmp(a, c), Ordering::Less, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_compare_evr_epoch_first() {
        let a = Evr::new(1, "1.0", "1");
        let b = Evr::new(0, "9.0", "1");
        assert_eq!(compare_evr(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_compare_evr_absent_epoch_is_zero() {
        let a = Evr::from_parts(None, "1.0", "1");
        let b = Evr::from_parts(Some("0"), "1.0", "1");
        assert_eq!(compare_evr(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_evr_release_breaks_tie() {
        let a = Evr::new(0, "1.0", "1.el8");
        let b = Evr::new(0, "1.0", "2.el8");
        assert_eq!(compare_evr(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_key_monotonic_with_comparator() {
        let versions = [
            "", "1", "1.0", "1.0~rc1", "1.0~rc2", "1.0~~", "1.0~", "1.0^", "1.0^git1",
            "1.0^git2", "1.0.1", "1.0.1a", "1.0.a", "1.10", "2_0", "2.0", "10", "007", "7",
        ];
        for v1 in &versions {
            for v2 in &versions {
                for r1 in ["1", "2.el8"] {
                    for r2 in ["1", "2.el8"] {
                        let a = Evr::new(0, *v1, r1);
                        let b = Evr::new(0, *v2, r2);
                        assert_eq!(
                            compare_evr(&a, &b),
                            a.key().cmp(&b.key()),
                            "key order diverged for {a} vs {b}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_evr_display() {
        assert_eq!(Evr::new(0, "1.0", "1.el8").to_string(), "1.0-1.el8");
        assert_eq!(Evr::new(2, "3.7.4", "2").to_string(), "2:3.7.4-2");
    }
}
