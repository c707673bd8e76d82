// src/version.rs

//! EVR (epoch:version-release) ordering
//!
//! Implements the rpm-style version comparison used for upgrade detection
//! and best-candidate selection: versions are split into alternating
//! numeric and alphabetic segments, numeric segments compare as integers
//! (leading zeros ignored), and numeric segments order after alphabetic
//! ones. Epoch dominates, then version, then release.

use std::cmp::Ordering;

/// A parsed epoch:version-release triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evr {
    pub epoch: u64,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(epoch: u64, version: &str, release: &str) -> Self {
        Self {
            epoch,
            version: version.to_string(),
            release: release.to_string(),
        }
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_segments(&self.version, &other.version))
            .then_with(|| compare_segments(&self.release, &other.release))
    }
}

/// Compare two version strings segment by segment, rpm style.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    let mut left = a.as_bytes();
    let mut right = b.as_bytes();

    loop {
        left = skip_separators(left);
        right = skip_separators(right);

        if left.is_empty() || right.is_empty() {
            break;
        }

        let (l_seg, l_numeric, l_rest) = take_segment(left);
        let (r_seg, r_numeric, r_rest) = take_segment(right);

        // A numeric segment is always newer than an alphabetic one.
        if l_numeric != r_numeric {
            return if l_numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if l_numeric {
            compare_numeric(l_seg, r_seg)
        } else {
            l_seg.cmp(r_seg)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        left = l_rest;
        right = r_rest;
    }

    // Whichever string has segments remaining is newer.
    match (left.is_empty(), right.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => unreachable!(),
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && !s[i].is_ascii_alphanumeric() {
        i += 1;
    }
    &s[i..]
}

/// Split off the leading run of digits or letters.
///
/// Returns the segment, whether it is numeric, and the remainder.
fn take_segment(s: &[u8]) -> (&[u8], bool, &[u8]) {
    let numeric = s[0].is_ascii_digit();
    let mut i = 1;
    while i < s.len() {
        let same_class = if numeric {
            s[i].is_ascii_digit()
        } else {
            s[i].is_ascii_alphabetic()
        };
        if !same_class {
            break;
        }
        i += 1;
    }
    (&s[..i], numeric, &s[i..])
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);

    // Longer digit run wins, otherwise lexicographic works for equal lengths.
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i + 1 < s.len() && s[i] == b'0' {
        i += 1;
    }
    &s[i..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare_segments(a, b)
    }

    #[test]
    fn test_equal_versions() {
        assert_eq!(cmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(cmp("1.2.3", "1.2.3"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_ordering() {
        assert_eq!(cmp("1.0", "2.0"), Ordering::Less);
        assert_eq!(cmp("2.0", "1.9"), Ordering::Greater);
        assert_eq!(cmp("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_leading_zeros_ignored() {
        assert_eq!(cmp("1.01", "1.1"), Ordering::Equal);
        assert_eq!(cmp("1.002", "1.2"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_beats_alphabetic() {
        assert_eq!(cmp("1.0", "1.a"), Ordering::Greater);
        assert_eq!(cmp("1.fc38", "1.1"), Ordering::Less);
    }

    #[test]
    fn test_longer_version_is_newer() {
        assert_eq!(cmp("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(cmp("1.0.1", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_mixed_alphanumeric_segments() {
        // "1.0a" splits into [1, 0, a]; "1.0b" into [1, 0, b]
        assert_eq!(cmp("1.0a", "1.0b"), Ordering::Less);
        // Alphabetic segment compares bytewise
        assert_eq!(cmp("1.alpha", "1.beta"), Ordering::Less);
    }

    #[test]
    fn test_separators_are_insignificant() {
        assert_eq!(cmp("1.0.1", "1_0_1"), Ordering::Equal);
        assert_eq!(cmp("1..0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_evr_epoch_dominates() {
        let older = Evr::new(0, "9.9", "10");
        let newer = Evr::new(1, "1.0", "1");
        assert!(newer > older);
    }

    #[test]
    fn test_evr_release_breaks_ties() {
        let a = Evr::new(0, "1.2.3", "1.fc38");
        let b = Evr::new(0, "1.2.3", "2.fc38");
        assert!(b > a);
        assert!(a < b);
    }

    #[test]
    fn test_evr_equality() {
        let a = Evr::new(0, "1.2.3", "1");
        let b = Evr::new(0, "1.2.3", "1");
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }
}
