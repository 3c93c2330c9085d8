//! Package versions and version specifiers.
//!
//! Versions follow the common Python shape: a dotted numeric release with an
//! optional pre-release (`a`, `b`, `rc`, `.dev`) and post-release (`.post`)
//! suffix, e.g. `2.3.2`, `1.0rc1`, `4.0.post2`. Trailing zero release
//! components are insignificant (`1.0 == 1.0.0`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// VERSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreKind {
    Dev,
    Alpha,
    Beta,
    Rc,
}

/// A parsed package version. Keeps the original spelling for display and
/// for locating the version directory in a package index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
}

impl Version {
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Like [`Ord::cmp`], with equal versions (`1.0` and `1.0.0`) ordered by
    /// their spelling.
    pub fn cmp_spelled(&self, other: &Self) -> Ordering {
        self.cmp(other).then_with(|| self.as_str().cmp(other.as_str()))
    }

    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|part| *part != 0)
            .map_or(0, |pos| pos + 1);
        &self.release[..end]
    }

    /// Whether `prefix` matches the leading release components (missing
    /// components count as zero).
    fn release_starts_with(&self, prefix: &[u64]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(i, part)| self.release.get(i).copied().unwrap_or(0) == *part)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err("empty version".into());
        }

        let lower = raw.to_ascii_lowercase();
        let release_end = lower
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(lower.len());
        let (release_part, mut rest) = lower.split_at(release_end);
        let release_part = release_part.trim_end_matches('.');

        if release_part.is_empty() {
            return Err(format!("version '{raw}' has no release number"));
        }
        let release = release_part
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| format!("version '{raw}' has an invalid release component"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut pre = None;
        let mut post = None;
        while !rest.is_empty() {
            let (kind, tail) = if let Some(tail) = rest.strip_prefix("rc") {
                (Some(PreKind::Rc), tail)
            } else if let Some(tail) = rest.strip_prefix("dev") {
                (Some(PreKind::Dev), tail)
            } else if let Some(tail) = rest.strip_prefix("post") {
                (None, tail)
            } else if let Some(tail) = rest.strip_prefix('a') {
                (Some(PreKind::Alpha), tail)
            } else if let Some(tail) = rest.strip_prefix('b') {
                (Some(PreKind::Beta), tail)
            } else if let Some(tail) = rest.strip_prefix('.') {
                rest = tail;
                continue;
            } else {
                return Err(format!("version '{raw}' has an unsupported suffix '{rest}'"));
            };

            let digits_end = tail
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(tail.len());
            let number = if digits_end == 0 {
                0
            } else {
                tail[..digits_end]
                    .parse::<u64>()
                    .map_err(|_| format!("version '{raw}' has an invalid suffix number"))?
            };

            match kind {
                Some(kind) if pre.is_none() && post.is_none() => pre = Some((kind, number)),
                None if post.is_none() => post = Some(number),
                _ => return Err(format!("version '{raw}' has repeated suffixes")),
            }
            rest = &tail[digits_end..];
        }

        Ok(Self {
            raw: raw.to_string(),
            release,
            pre,
            post,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.trimmed_release()
            .cmp(other.trimmed_release())
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
            .then_with(|| self.post.cmp(&other.post))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Version {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

// ============================================================================
// SPECIFIERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `==` (`==1.2.*` when wildcard)
    Equal,
    /// `!=` (`!=1.2.*` when wildcard)
    NotEqual,
    GreaterEqual,
    LessEqual,
    Greater,
    Less,
    /// `~=` compatible release
    Compatible,
}

impl Operator {
    fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::GreaterEqual => ">=",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Compatible => "~=",
        }
    }
}

/// One `<op><version>` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    op: Operator,
    version: Version,
    wildcard: bool,
}

impl Specifier {
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            Operator::Equal if self.wildcard => candidate.release_starts_with(&self.version.release),
            Operator::Equal => candidate == &self.version,
            Operator::NotEqual if self.wildcard => {
                !candidate.release_starts_with(&self.version.release)
            }
            Operator::NotEqual => candidate != &self.version,
            Operator::GreaterEqual => candidate >= &self.version,
            Operator::LessEqual => candidate <= &self.version,
            Operator::Greater => candidate > &self.version,
            Operator::Less => candidate < &self.version,
            Operator::Compatible => {
                let prefix = &self.version.release[..self.version.release.len() - 1];
                candidate >= &self.version && candidate.release_starts_with(prefix)
            }
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl FromStr for Specifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        const OPERATORS: [(&str, Operator); 7] = [
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            (">=", Operator::GreaterEqual),
            ("<=", Operator::LessEqual),
            ("~=", Operator::Compatible),
            (">", Operator::Greater),
            ("<", Operator::Less),
        ];

        let (op, rest) = OPERATORS
            .iter()
            .find_map(|(symbol, op)| s.strip_prefix(symbol).map(|rest| (*op, rest.trim())))
            .ok_or_else(|| format!("'{s}' does not start with a comparison operator"))?;

        if rest.starts_with('=') {
            return Err(format!("'{s}': arbitrary equality (===) is not supported"));
        }

        let (version_str, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (rest, false),
        };
        if wildcard && !matches!(op, Operator::Equal | Operator::NotEqual) {
            return Err(format!("'{s}': wildcards are only allowed with == and !="));
        }

        let version: Version = version_str.parse()?;
        if wildcard && (version.pre.is_some() || version.post.is_some()) {
            return Err(format!("'{s}': wildcard prefix must be a plain release"));
        }
        if op == Operator::Compatible && version.release.len() < 2 {
            return Err(format!("'{s}': ~= needs at least two release components"));
        }

        Ok(Self {
            op,
            version,
            wildcard,
        })
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

/// Conjunction of specifiers; empty means "any version".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
}

impl VersionConstraint {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.specifiers.is_empty()
    }

    pub fn specifiers(&self) -> &[Specifier] {
        &self.specifiers
    }

    /// Add the clauses of `other` (both must hold).
    pub fn extend(&mut self, other: &VersionConstraint) {
        self.specifiers.extend(other.specifiers.iter().cloned());
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        self.specifiers.iter().all(|spec| spec.matches(candidate))
    }

    /// Pre-releases are only eligible when a clause names one explicitly.
    pub fn allows_prereleases(&self) -> bool {
        self.specifiers.iter().any(|spec| spec.version.is_prerelease())
    }

    /// Highest candidate satisfying every clause.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let allow_pre = self.allows_prereleases();
        candidates
            .into_iter()
            .filter(|v| allow_pre || !v.is_prerelease())
            .filter(|v| self.matches(v))
            .max_by(|a, b| a.cmp_spelled(b))
    }
}

impl FromStr for VersionConstraint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::any());
        }
        let specifiers = s
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Specifier>, _>>()?;
        Ok(Self { specifiers })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .specifiers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn c(s: &str) -> VersionConstraint {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_versions() {
        assert_eq!(v("2.3.2").release(), &[2, 3, 2]);
        assert!(v("1.0rc1").is_prerelease());
        assert!(v("1.0.dev3").is_prerelease());
        assert!(!v("4.0.post2").is_prerelease());
        assert_eq!(v("2.3.2").to_string(), "2.3.2");

        for bad in ["", "abc", "1.x", "1.0-beta", "1.0rc1rc2"] {
            assert!(bad.parse::<Version>().is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_ordering() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert!(v("1.0.dev1") < v("1.0a1"));
        assert!(v("1.0a1") < v("1.0b1"));
        assert!(v("1.0b1") < v("1.0rc1"));
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0") < v("1.0.post1"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("2.0") > v("1.99.99"));
    }

    #[test]
    fn test_specifiers() {
        assert!(c("==2.3.2").matches(&v("2.3.2")));
        assert!(!c("==2.3.2").matches(&v("2.3.3")));
        assert!(c("==2.3.*").matches(&v("2.3.9")));
        assert!(!c("==2.3.*").matches(&v("2.4.0")));
        assert!(c("!=2.3.*").matches(&v("2.4.0")));
        assert!(c(">=1.0,<2.0").matches(&v("1.5")));
        assert!(!c(">=1.0,<2.0").matches(&v("2.0")));
        assert!(c("~=2.2").matches(&v("2.9")));
        assert!(!c("~=2.2").matches(&v("3.0")));
        assert!(c("~=1.4.5").matches(&v("1.4.9")));
        assert!(!c("~=1.4.5").matches(&v("1.5.0")));
        assert!(c("").matches(&v("0.0.1")));
    }

    #[test]
    fn test_bad_specifiers() {
        for bad in ["2.3", "===1.0", ">=1.*", "~=1", "==1.0rc1.*", "=>1.0"] {
            assert!(bad.parse::<VersionConstraint>().is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_best_match_skips_prereleases() {
        let candidates = [v("1.0"), v("1.1"), v("2.0rc1")];
        assert_eq!(c(">=1.0").best_match(&candidates), Some(&candidates[1]));
        assert_eq!(c(">=2.0rc1").best_match(&candidates), Some(&candidates[2]));
        assert_eq!(c(">=3").best_match(&candidates), None);
    }

    #[test]
    fn test_best_match_equal_versions_ignores_candidate_order() {
        let forward = [v("1.0.0"), v("1.0")];
        let reversed = [v("1.0"), v("1.0.0")];
        assert_eq!(c(">=1.0").best_match(&forward).unwrap().as_str(), "1.0.0");
        assert_eq!(c(">=1.0").best_match(&reversed).unwrap().as_str(), "1.0.0");
    }

    #[test]
    fn test_display_round_trip() {
        let constraint = c(">=1.0, <2.0,!=1.5.*");
        assert_eq!(constraint.to_string(), ">=1.0,<2.0,!=1.5.*");
    }

    proptest! {
        #[test]
        fn prop_ordering_matches_numeric_release(a in proptest::collection::vec(0u64..50, 1..4),
                                                 b in proptest::collection::vec(0u64..50, 1..4)) {
            let join = |parts: &[u64]| parts.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
            let va = v(&join(&a));
            let vb = v(&join(&b));

            let pad = |parts: &[u64]| {
                let mut padded = parts.to_vec();
                padded.resize(4, 0);
                padded
            };
            prop_assert_eq!(va.cmp(&vb), pad(&a).cmp(&pad(&b)));
        }

        #[test]
        fn prop_best_match_satisfies_constraint(versions in proptest::collection::vec((0u64..5, 0u64..5), 1..10),
                                                 floor in 0u64..5) {
            let candidates: Vec<Version> = versions
                .iter()
                .map(|(major, minor)| v(&format!("{major}.{minor}")))
                .collect();
            let constraint = c(&format!(">={floor}.0"));

            match constraint.best_match(&candidates) {
                Some(best) => {
                    prop_assert!(constraint.matches(best));
                    for other in candidates.iter().filter(|o| constraint.matches(o)) {
                        prop_assert!(other <= best);
                    }
                }
                None => prop_assert!(candidates.iter().all(|o| !constraint.matches(o))),
            }
        }
    }
}
