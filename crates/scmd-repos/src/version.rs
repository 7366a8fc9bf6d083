//! Version parsing and constraint matching for dependencies.
//!
//! Versions are compared as `(major, minor, patch)` tuples. Parsing is
//! lenient: a leading `v` is ignored, missing segments count as zero and each
//! segment is read up to its first non-digit (`1.2.3-beta` is `1.2.3`).

use std::fmt;
use std::str::FromStr;

use crate::error::{RepoError, RepoResult};

/// A three-part version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major.
    pub major: u64,
    /// Minor.
    pub minor: u64,
    /// Patch.
    pub patch: u64,
}

impl Version {
    /// Create a version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse leniently. Never fails; unreadable segments are zero.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = strip_v(raw.trim());
        let mut segments = raw.split('.').map(leading_number);
        Self {
            major: segments.next().unwrap_or(0),
            minor: segments.next().unwrap_or(0),
            patch: segments.next().unwrap_or(0),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn strip_v(raw: &str) -> &str {
    raw.strip_prefix('v')
        .or_else(|| raw.strip_prefix('V'))
        .unwrap_or(raw)
}

fn leading_number(segment: &str) -> u64 {
    let digits = segment
        .find(|c: char| !c.is_ascii_digit())
        .map_or(segment, |end| &segment[..end]);
    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

/// Comparison operator of a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `=`, also used when no operator is written.
    Eq,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `~>`: at least the target, within the same major.minor.
    Pessimistic,
}

/// A parsed version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Empty or `*`.
    Any,
    /// An operator applied to a target version.
    Compare {
        /// Operator.
        op: Op,
        /// Target version.
        target: Version,
    },
}

impl Constraint {
    /// Whether `version` satisfies the constraint.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        let Self::Compare { op, target } = self else {
            return true;
        };
        match op {
            Op::Eq => version == target,
            Op::Ge => version >= target,
            Op::Le => version <= target,
            Op::Gt => version > target,
            Op::Lt => version < target,
            Op::Pessimistic => {
                version >= target
                    && version.major == target.major
                    && version.minor == target.minor
            },
        }
    }
}

impl FromStr for Constraint {
    type Err = RepoError;

    fn from_str(raw: &str) -> RepoResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Any);
        }

        // Two-character operators must be tried before their prefixes.
        let (op, rest) = [
            (">=", Op::Ge),
            ("<=", Op::Le),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("~>", Op::Pessimistic),
            ("=", Op::Eq),
        ]
        .into_iter()
        .find_map(|(prefix, op)| trimmed.strip_prefix(prefix).map(|rest| (op, rest)))
        .unwrap_or((Op::Eq, trimmed));

        let rest = rest.trim();
        if !strip_v(rest).starts_with(|c: char| c.is_ascii_digit()) {
            return Err(RepoError::InvalidConstraint(raw.to_string()));
        }

        Ok(Self::Compare {
            op,
            target: Version::parse_lenient(rest),
        })
    }
}

/// Check `version` against `constraint`.
///
/// # Errors
///
/// Returns [`RepoError::InvalidConstraint`] if the constraint cannot be parsed.
pub fn check_version_constraint(version: &str, constraint: &str) -> RepoResult<bool> {
    let constraint: Constraint = constraint.parse()?;
    Ok(constraint.matches(&Version::parse_lenient(version)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(Version::parse_lenient("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(Version::parse_lenient("v2.0"), Version::new(2, 0, 0));
        assert_eq!(Version::parse_lenient("3"), Version::new(3, 0, 0));
        assert_eq!(Version::parse_lenient("1.4.0-beta.2"), Version::new(1, 4, 0));
        assert_eq!(Version::parse_lenient("1.x.7"), Version::new(1, 0, 7));
        assert_eq!(Version::parse_lenient(""), Version::default());
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
    }

    #[test]
    fn test_wildcards_match_anything() {
        for version in ["0.0.1", "9.9.9", "garbage"] {
            assert!(check_version_constraint(version, "").unwrap());
            assert!(check_version_constraint(version, "*").unwrap());
            assert!(check_version_constraint(version, "  ").unwrap());
        }
    }

    #[test]
    fn test_operators_agree_with_tuple_ordering() {
        let versions = ["0.9.9", "1.1.9", "1.2.0", "1.2.3", "1.2.4", "1.3.0", "2.0.0"];
        let target = Version::new(1, 2, 3);

        for raw in versions {
            let v = Version::parse_lenient(raw);
            assert_eq!(check_version_constraint(raw, ">=1.2.3").unwrap(), v >= target, ">= {raw}");
            assert_eq!(check_version_constraint(raw, "<=1.2.3").unwrap(), v <= target, "<= {raw}");
            assert_eq!(check_version_constraint(raw, ">1.2.3").unwrap(), v > target, "> {raw}");
            assert_eq!(check_version_constraint(raw, "<1.2.3").unwrap(), v < target, "< {raw}");
            assert_eq!(check_version_constraint(raw, "=1.2.3").unwrap(), v == target, "= {raw}");
            assert_eq!(check_version_constraint(raw, "1.2.3").unwrap(), v == target, "bare {raw}");
            assert_eq!(
                check_version_constraint(raw, "~>1.2.3").unwrap(),
                v >= target && v.major == 1 && v.minor == 2,
                "~> {raw}"
            );
        }
    }

    #[test]
    fn test_pessimistic_stays_within_minor() {
        assert!(check_version_constraint("1.2.9", "~> 1.2.0").unwrap());
        assert!(!check_version_constraint("1.3.0", "~> 1.2.0").unwrap());
        assert!(!check_version_constraint("1.1.9", "~> 1.2.0").unwrap());
    }

    #[test]
    fn test_whitespace_and_v_prefix() {
        assert!(check_version_constraint("v1.5.0", ">= v1.2").unwrap());
        assert!(check_version_constraint("1.0.0", " < 2 ").unwrap());
    }

    #[test]
    fn test_invalid_constraints() {
        for bad in [">=", "~>", "latest", ">=abc", "= "] {
            let err = check_version_constraint("1.0.0", bad).unwrap_err();
            assert!(matches!(err, RepoError::InvalidConstraint(_)), "{bad}");
        }
    }

    #[test]
    fn test_constraint_from_str() {
        let c: Constraint = "~>2.1".parse().unwrap();
        assert_eq!(
            c,
            Constraint::Compare {
                op: Op::Pessimistic,
                target: Version::new(2, 1, 0)
            }
        );
        assert_eq!("*".parse::<Constraint>().unwrap(), Constraint::Any);
    }
}
