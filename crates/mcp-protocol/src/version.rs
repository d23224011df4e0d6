//! Version comparison and selection (spec §4.3).
//!
//! Versions compare using PEP-440-like numeric-segment semantics when every
//! segment parses as a number (a leading `v` is stripped first), falling
//! back to lexicographic comparison otherwise. `None` (unversioned) sorts
//! strictly below any concrete version.

use std::cmp::Ordering;

/// A parsed, comparable version. `Unversioned` always compares `Less` than
/// any `Concrete` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparableVersion {
    Unversioned,
    /// Numeric dot-separated segments, e.g. `[1, 10, 1]` for `"1.10.1"`.
    Numeric(Vec<u64>),
    /// Fallback for anything that doesn't parse as all-numeric segments.
    Lexical(String),
}

impl ComparableVersion {
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return ComparableVersion::Unversioned;
        }
        let trimmed = raw.strip_prefix('v').unwrap_or(raw);
        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            match part.parse::<u64>() {
                Ok(n) => segments.push(n),
                Err(_) => return ComparableVersion::Lexical(raw.to_string()),
            }
        }
        if segments.is_empty() {
            ComparableVersion::Lexical(raw.to_string())
        } else {
            ComparableVersion::Numeric(segments)
        }
    }
}

impl PartialOrd for ComparableVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComparableVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        use ComparableVersion::*;
        match (self, other) {
            (Unversioned, Unversioned) => Ordering::Equal,
            (Unversioned, _) => Ordering::Less,
            (_, Unversioned) => Ordering::Greater,
            (Numeric(a), Numeric(b)) => {
                let len = a.len().max(b.len());
                for i in 0..len {
                    let x = a.get(i).copied().unwrap_or(0);
                    let y = b.get(i).copied().unwrap_or(0);
                    match x.cmp(&y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                Ordering::Equal
            }
            // Numeric versions are always considered higher than lexical
            // fallbacks — they at least parsed as a real version scheme.
            (Numeric(_), Lexical(_)) => Ordering::Greater,
            (Lexical(_), Numeric(_)) => Ordering::Less,
            (Lexical(a), Lexical(b)) => a.cmp(b),
        }
    }
}

/// A selection expression over component versions (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct VersionSpec {
    pub eq: Option<String>,
    pub gte: Option<String>,
    pub lt: Option<String>,
}

impl VersionSpec {
    pub fn exact(version: impl Into<String>) -> Self {
        Self { eq: Some(version.into()), ..Default::default() }
    }

    pub fn range(gte: Option<String>, lt: Option<String>) -> Self {
        Self { eq: None, gte, lt }
    }

    /// An unversioned component matches any `VersionSpec` (spec §4.3).
    pub fn matches(&self, version: &str) -> bool {
        if version.is_empty() {
            return true;
        }
        let v = ComparableVersion::parse(version);
        if let Some(eq) = &self.eq {
            return v == ComparableVersion::parse(eq);
        }
        if let Some(gte) = &self.gte {
            if v < ComparableVersion::parse(gte) {
                return false;
            }
        }
        if let Some(lt) = &self.lt {
            if v >= ComparableVersion::parse(lt) {
                return false;
            }
        }
        true
    }
}

/// Returns the highest version among `versions` (empty string allowed to
/// represent "unversioned", which always sorts lowest).
pub fn highest_version<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    versions
        .into_iter()
        .max_by(|a, b| ComparableVersion::parse(a).cmp(&ComparableVersion::parse(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_numeric_width_sorts_numerically_not_lexically() {
        let versions = ["1.0", "10", "2", "v1.5"];
        assert_eq!(highest_version(versions), Some("10"));
    }

    #[test]
    fn longer_numeric_tail_beats_shorter() {
        let versions = ["1.2.3", "1.2.10", "1.10.1"];
        assert_eq!(highest_version(versions), Some("1.10.1"));
    }

    #[test]
    fn unversioned_sorts_below_any_concrete_version() {
        assert!(ComparableVersion::Unversioned < ComparableVersion::parse("0.0.1"));
    }

    #[test]
    fn exact_spec_matches_only_that_version() {
        let spec = VersionSpec::exact("1.0");
        assert!(spec.matches("1.0"));
        assert!(!spec.matches("2.0"));
        // unversioned always matches
        assert!(spec.matches(""));
    }

    #[test]
    fn range_spec_is_half_open() {
        let spec = VersionSpec::range(Some("1.0".into()), Some("2.0".into()));
        assert!(!spec.matches("0.9"));
        assert!(spec.matches("1.0"));
        assert!(spec.matches("1.9"));
        assert!(!spec.matches("2.0"));
    }
}
