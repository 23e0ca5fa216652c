// Copyright 2024 the pep440_ranges authors. All rights reserved. MIT license.

//! PEP 440 versions and comparator ranges, plus the range rewriting
//! used by dependency update tooling.
//!
//! The string-in, string-out facade ([`is_valid`], [`matches`],
//! [`get_new_value`], ...) mirrors how manifests are actually
//! consumed: malformed inputs degrade to `false` or `None` rather
//! than erroring, while the typed layer ([`Version`],
//! [`RangeExpression`]) is available for callers that want parsing
//! errors.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

mod specifier;
mod update;
mod version;

pub use specifier::parse_specifier;
pub use specifier::Comparator;
pub use specifier::Operand;
pub use specifier::RangeExpression;
pub use specifier::RangeParseError;
pub use specifier::Specifier;
pub use specifier::SpecifierParseError;
pub use update::get_new_value;
pub use update::NewValueConfig;
pub use update::RangeStrategy;
pub use version::VersionParseError;

/// The valid range with zero clauses, which admits every version.
pub static UNCONSTRAINED_RANGE: Lazy<RangeExpression> =
  Lazy::new(|| RangeExpression::parse("").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
  Alpha,
  Beta,
  Rc,
}

impl PreKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      PreKind::Alpha => "a",
      PreKind::Beta => "b",
      PreKind::Rc => "rc",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pre {
  pub kind: PreKind,
  pub number: u64,
}

/// A PEP 440 version.
///
/// Comparison zero-extends the release so `1.0` equals `1.0.0`, and
/// orders suffixes dev < pre < final < post. The local segment is
/// carried for display but ignored by comparison, equality, and
/// hashing, so `1.0.0+ubuntu1` and `1.0.0` collapse to one map key.
#[derive(Debug, Clone)]
pub struct Version {
  pub epoch: u64,
  pub release: Vec<u64>,
  pub pre: Option<Pre>,
  pub post: Option<u64>,
  pub dev: Option<u64>,
  pub local: Option<String>,
}

impl Version {
  pub fn parse(text: &str) -> Result<Version, VersionParseError> {
    version::parse_version(text)
  }

  /// Neither a pre-release nor a dev release.
  pub fn is_stable(&self) -> bool {
    self.pre.is_none() && self.dev.is_none()
  }

  fn release_segment(&self, i: usize) -> u64 {
    self.release.get(i).copied().unwrap_or(0)
  }

  // dev-only releases sort below any pre-release, pre-releases below
  // the final release
  fn pre_key(&self) -> (u8, Option<Pre>) {
    match self.pre {
      Some(pre) => (1, Some(pre)),
      None if self.dev.is_some() && self.post.is_none() => (0, None),
      None => (2, None),
    }
  }

  fn post_key(&self) -> (u8, u64) {
    match self.post {
      Some(number) => (1, number),
      None => (0, 0),
    }
  }

  fn dev_key(&self) -> (u8, u64) {
    match self.dev {
      Some(number) => (0, number),
      None => (1, 0),
    }
  }
}

// equality and hashing go through the same zero-extended,
// local-ignoring comparison as `Ord`
impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.epoch.hash(state);
    let trimmed = match self.release.iter().rposition(|segment| *segment != 0) {
      Some(i) => &self.release[..=i],
      None => &self.release[..0],
    };
    trimmed.hash(state);
    self.pre.hash(state);
    self.post.hash(state);
    self.dev.hash(state);
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    let result = self.epoch.cmp(&other.epoch);
    if result != Ordering::Equal {
      return result;
    }
    for i in 0..self.release.len().max(other.release.len()) {
      let result = self.release_segment(i).cmp(&other.release_segment(i));
      if result != Ordering::Equal {
        return result;
      }
    }
    let result = self.pre_key().cmp(&other.pre_key());
    if result != Ordering::Equal {
      return result;
    }
    let result = self.post_key().cmp(&other.post_key());
    if result != Ordering::Equal {
      return result;
    }
    self.dev_key().cmp(&other.dev_key())
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.epoch > 0 {
      write!(f, "{}!", self.epoch)?;
    }
    for (i, segment) in self.release.iter().enumerate() {
      if i > 0 {
        write!(f, ".")?;
      }
      write!(f, "{}", segment)?;
    }
    if let Some(pre) = &self.pre {
      write!(f, "{}{}", pre.kind.as_str(), pre.number)?;
    }
    if let Some(post) = &self.post {
      write!(f, ".post{}", post)?;
    }
    if let Some(dev) = &self.dev {
      write!(f, ".dev{}", dev)?;
    }
    if let Some(local) = &self.local {
      write!(f, "+{}", local)?;
    }
    Ok(())
  }
}

impl Serialize for Version {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for Version {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let text: String = Deserialize::deserialize(deserializer)?;
    Version::parse(&text).map_err(de::Error::custom)
  }
}

/// A parseable version.
pub fn is_version(input: &str) -> bool {
  Version::parse(input).is_ok()
}

/// A parseable version, or a range with at least one clause.
pub fn is_valid(input: &str) -> bool {
  is_version(input)
    || matches!(RangeExpression::parse(input), Ok(range) if !range.is_unconstrained())
}

pub fn is_stable(input: &str) -> bool {
  Version::parse(input)
    .map(|version| version.is_stable())
    .unwrap_or(false)
}

/// Both parse and compare equal, so `1.0` equals `1.0.0`.
pub fn equals(a: &str, b: &str) -> bool {
  match (Version::parse(a), Version::parse(b)) {
    (Ok(a), Ok(b)) => a.cmp(&b) == Ordering::Equal,
    _ => false,
  }
}

/// A bare version, or a single non-wildcard `==`/`===` clause.
pub fn is_single_version(input: &str) -> bool {
  as_single_version(input).is_some()
}

/// Whether the candidate lands inside the range. The candidate goes
/// through the same single-version reduction as [`is_single_version`],
/// so a range-shaped candidate like `>=3.8` is simply not a match.
pub fn matches(candidate: &str, range: &str) -> bool {
  let Some(version) = as_single_version(candidate) else {
    return false;
  };
  RangeExpression::parse(range)
    .map(|range| range.satisfies(&version))
    .unwrap_or(false)
}

fn as_single_version(input: &str) -> Option<Version> {
  if let Ok(version) = Version::parse(input) {
    return Some(version);
  }
  let specifier = parse_specifier(input).ok()?;
  match (specifier.comparator, &specifier.operand) {
    (
      Comparator::Equal,
      Operand::Version {
        version,
        wildcard: false,
      },
    ) => Some(version.clone()),
    (Comparator::ArbitraryEqual, Operand::Arbitrary(text)) => {
      Version::parse(text).ok()
    }
    _ => None,
  }
}

/// The highest candidate inside the range, returned as the caller
/// wrote it. Unparseable candidates are skipped.
pub fn get_satisfying_version<'a>(
  versions: &[&'a str],
  range: &str,
) -> Option<&'a str> {
  satisfying_versions(versions, range)
    .max_by(|(_, a), (_, b)| a.cmp(b))
    .map(|(text, _)| text)
}

/// The lowest candidate inside the range.
pub fn min_satisfying_version<'a>(
  versions: &[&'a str],
  range: &str,
) -> Option<&'a str> {
  satisfying_versions(versions, range)
    .min_by(|(_, a), (_, b)| a.cmp(b))
    .map(|(text, _)| text)
}

fn satisfying_versions<'a>(
  versions: &[&'a str],
  range: &str,
) -> impl Iterator<Item = (&'a str, Version)> {
  let range = RangeExpression::parse(range).ok();
  versions
    .iter()
    .filter_map(|text| Version::parse(text).ok().map(|version| (*text, version)))
    .filter(move |(_, version)| {
      range
        .as_ref()
        .map(|range| range.satisfies(version))
        .unwrap_or(false)
    })
    .collect::<Vec<_>>()
    .into_iter()
}

/// Whether the version sits entirely below the range's lower bound.
/// Ranges without a floor (only upper bounds or exclusions) never
/// report a version as below them.
pub fn is_less_than_range(version: &str, range: &str) -> bool {
  let Ok(version) = Version::parse(version) else {
    return false;
  };
  let Ok(range) = RangeExpression::parse(range) else {
    return false;
  };
  match range.floor() {
    Some((floor, true)) => version <= *floor,
    Some((floor, false)) => version < *floor,
    None => false,
  }
}

/// The operation surface a version scheme exposes to update tooling.
///
/// Everything is stringly typed at this boundary and degrades to
/// `false`/`None` instead of erroring, since the inputs come straight
/// out of manifests the tooling does not control.
pub trait VersioningScheme {
  fn is_valid(&self, input: &str) -> bool;
  fn is_stable(&self, input: &str) -> bool;
  fn is_single_version(&self, input: &str) -> bool;
  fn equals(&self, a: &str, b: &str) -> bool;
  fn matches(&self, candidate: &str, range: &str) -> bool;
  fn is_less_than_range(&self, version: &str, range: &str) -> bool;
  fn get_satisfying_version<'a>(
    &self,
    versions: &[&'a str],
    range: &str,
  ) -> Option<&'a str>;
  fn min_satisfying_version<'a>(
    &self,
    versions: &[&'a str],
    range: &str,
  ) -> Option<&'a str>;
  fn get_new_value(&self, config: &NewValueConfig) -> Option<String>;
}

/// The PEP 440 implementation of [`VersioningScheme`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Pep440;

impl VersioningScheme for Pep440 {
  fn is_valid(&self, input: &str) -> bool {
    is_valid(input)
  }

  fn is_stable(&self, input: &str) -> bool {
    is_stable(input)
  }

  fn is_single_version(&self, input: &str) -> bool {
    is_single_version(input)
  }

  fn equals(&self, a: &str, b: &str) -> bool {
    equals(a, b)
  }

  fn matches(&self, candidate: &str, range: &str) -> bool {
    matches(candidate, range)
  }

  fn is_less_than_range(&self, version: &str, range: &str) -> bool {
    is_less_than_range(version, range)
  }

  fn get_satisfying_version<'a>(
    &self,
    versions: &[&'a str],
    range: &str,
  ) -> Option<&'a str> {
    get_satisfying_version(versions, range)
  }

  fn min_satisfying_version<'a>(
    &self,
    versions: &[&'a str],
    range: &str,
  ) -> Option<&'a str> {
    min_satisfying_version(versions, range)
  }

  fn get_new_value(&self, config: &NewValueConfig) -> Option<String> {
    get_new_value(config)
  }
}
