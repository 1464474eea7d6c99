//! Version ranges for dependencies.
//!
//! Mod manifests use node-style ranges (`^1.2.0`, `>=1.0.0 <1.5.0`, `1.x`,
//! `a || b`, `1.0.0 - 2.0.0`) and occasionally interval notation
//! (`[1.0,1.5)`). Each alternative is normalised into a `semver::VersionReq`,
//! while the original text is kept so manifests round-trip unchanged.

use std::fmt;

use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModError;

/// A semantic version predicate, satisfied if any alternative matches.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(raw: &str) -> Result<Self, ModError> {
        let alternatives = raw
            .split("||")
            .map(|alt| {
                let normalized = normalize(alt.trim()).ok_or_else(|| invalid(raw))?;
                VersionReq::parse(&normalized).map_err(|e| ModError::Format {
                    reason: format!("invalid version range '{}': {}", raw, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    pub fn is_satisfied(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn invalid(raw: &str) -> ModError {
    ModError::Format {
        reason: format!("invalid version range '{}'", raw),
    }
}

/// Rewrites one alternative into the comma-separated syntax `semver` accepts.
/// Returns `None` for syntax that cannot be expressed.
fn normalize(alt: &str) -> Option<String> {
    if alt.is_empty() || alt == "*" || alt.eq_ignore_ascii_case("x") {
        return Some("*".to_string());
    }

    if let Some(interval) = normalize_interval(alt) {
        return interval;
    }

    if let Some((low, high)) = alt.split_once(" - ") {
        return Some(format!(
            ">={}, <={}",
            strip_v(low.trim()),
            strip_v(high.trim())
        ));
    }

    // Node allows "> = 1.0" style gaps between operator and version.
    let mut comparators = Vec::new();
    let mut pending_op = String::new();
    for token in alt.split_whitespace() {
        if token.chars().all(|c| "<>=~^".contains(c)) {
            pending_op.push_str(token);
            continue;
        }
        let token = format!("{}{}", pending_op, token);
        pending_op.clear();
        comparators.push(normalize_comparator(&token));
    }
    if !pending_op.is_empty() || comparators.is_empty() {
        return None;
    }

    Some(comparators.join(", "))
}

/// `[1.0,1.5)` style ranges. Returns `Some(None)` for a malformed interval.
fn normalize_interval(alt: &str) -> Option<Option<String>> {
    let first = alt.chars().next()?;
    let last = alt.chars().last()?;
    if !matches!(first, '[' | '(') || !matches!(last, ']' | ')') || alt.len() < 2 {
        return None;
    }

    let inner = &alt[1..alt.len() - 1];
    let Some((low, high)) = inner.split_once(',') else {
        // "[1.0]" pins a single version
        let pinned = inner.trim();
        return Some((first == '[' && last == ']' && !pinned.is_empty())
            .then(|| format!("={}", full_version(strip_v(pinned)))));
    };

    let mut parts = Vec::new();
    let low = low.trim();
    if !low.is_empty() {
        let op = if first == '[' { ">=" } else { ">" };
        parts.push(format!("{}{}", op, full_version(strip_v(low))));
    }
    let high = high.trim();
    if !high.is_empty() {
        let op = if last == ']' { "<=" } else { "<" };
        parts.push(format!("{}{}", op, full_version(strip_v(high))));
    }

    if parts.is_empty() {
        return Some(Some("*".to_string()));
    }
    Some(Some(parts.join(", ")))
}

/// Pads an interval bound to `MAJOR.MINOR.PATCH`. Interval bounds are exact
/// points, while `semver` reads `1.5` in `<=1.5` as the whole 1.5.x line.
fn full_version(bound: &str) -> String {
    let core_end = bound.find(['-', '+']).unwrap_or(bound.len());
    let (core, suffix) = bound.split_at(core_end);
    let mut parts: Vec<&str> = core.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    format!("{}{}", parts.join("."), suffix)
}

fn normalize_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| !"<>=~^".contains(c))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = strip_v(version);

    if !op.is_empty() {
        return format!("{}{}", op, version);
    }
    if version.contains(['x', 'X', '*']) {
        return version.to_string();
    }
    // A bare version is exact in node ranges; `semver` would treat it as caret.
    format!("={}", version)
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('='))
        .unwrap_or(version)
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRange {}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
