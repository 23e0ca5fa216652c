// Copyright 2024 the pep440_ranges authors. All rights reserved. MIT license.

use crate::specifier::Comparator;
use crate::specifier::Operand;
use crate::specifier::RangeExpression;
use crate::specifier::Specifier;
use crate::version::parse_version;
use crate::Version;

/// How `get_new_value` rewrites an existing range when an update
/// arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeStrategy {
  Auto,
  Bump,
  Pin,
  Replace,
  Widen,
}

impl RangeStrategy {
  /// Unrecognized names fall back to replace.
  pub fn parse(text: &str) -> Self {
    match text {
      "auto" => RangeStrategy::Auto,
      "bump" => RangeStrategy::Bump,
      "pin" => RangeStrategy::Pin,
      "widen" => RangeStrategy::Widen,
      _ => RangeStrategy::Replace,
    }
  }
}

impl std::str::FromStr for RangeStrategy {
  type Err = std::convert::Infallible;

  fn from_str(text: &str) -> Result<Self, Self::Err> {
    Ok(RangeStrategy::parse(text))
  }
}

#[derive(Debug, Clone)]
pub struct NewValueConfig<'a> {
  pub current_value: &'a str,
  pub range_strategy: RangeStrategy,
  /// Carried for interface parity with other version schemes; the
  /// rewrite rules here only look at `current_value` and
  /// `new_version`.
  pub current_version: Option<&'a str>,
  pub new_version: &'a str,
  /// A replacement swaps the dependency itself, so the constraint
  /// becomes the replacement version verbatim no matter the strategy.
  pub is_replacement: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Bump,
  Replace,
  Widen,
}

/// Rewrites `current_value` so it admits `new_version`, or returns
/// `None` when the range cannot be rewritten (unparsable text,
/// arbitrary equality, or a result that would still exclude the new
/// version).
pub fn get_new_value(config: &NewValueConfig) -> Option<String> {
  if config.is_replacement {
    return Some(config.new_version.to_string());
  }
  if config.range_strategy == RangeStrategy::Pin {
    return Some(format!("=={}", config.new_version));
  }
  if parse_version(config.current_value).is_ok() {
    // a pinned bare version, not a range
    return Some(config.new_version.to_string());
  }
  let range = RangeExpression::parse(config.current_value).ok()?;
  if range.is_unconstrained() {
    return Some(config.current_value.to_string());
  }
  if range
    .specifiers
    .iter()
    .any(|s| s.comparator == Comparator::ArbitraryEqual)
  {
    // arbitrary equality pins an exact string and cannot be advanced
    return None;
  }
  let new_version = parse_version(config.new_version).ok()?;
  let result = match config.range_strategy {
    RangeStrategy::Bump => {
      rewrite(&range, config.new_version, &new_version, Mode::Bump)
    }
    RangeStrategy::Widen => {
      if range.satisfies(&new_version) {
        return Some(config.current_value.to_string());
      }
      rewrite(&range, config.new_version, &new_version, Mode::Widen)
    }
    _ => {
      if range.satisfies(&new_version) {
        return Some(config.current_value.to_string());
      }
      rewrite(&range, config.new_version, &new_version, Mode::Replace)
    }
  };
  // never emit a range that excludes the version being moved to
  let reparsed = RangeExpression::parse(&result).ok()?;
  if !reparsed.satisfies(&new_version) {
    return None;
  }
  Some(result)
}

fn rewrite(
  range: &RangeExpression,
  new_text: &str,
  new_version: &Version,
  mode: Mode,
) -> String {
  let pair = if mode == Mode::Widen {
    None
  } else {
    as_bound_pair(range)
  };
  let texts = match pair {
    Some(pair) => rewrite_bound_pair(&pair, new_text, new_version),
    None => rewrite_each(range, new_text, new_version, mode),
  };
  // `==X.*,>=Y` pins a release family plus a floor inside it; once the
  // family itself moves, the floor is redundant
  if range.specifiers.len() == 2
    && range.specifiers[0].comparator == Comparator::Equal
    && matches!(
      range.specifiers[0].operand,
      Operand::Version { wildcard: true, .. }
    )
    && range.specifiers[1].comparator == Comparator::GreaterEqual
  {
    return texts[0].clone();
  }
  range.rejoin(&texts)
}

fn rewrite_each(
  range: &RangeExpression,
  new_text: &str,
  new_version: &Version,
  mode: Mode,
) -> Vec<String> {
  range
    .specifiers
    .iter()
    .map(|specifier| rewrite_specifier(specifier, new_text, new_version, mode))
    .collect()
}

fn rewrite_specifier(
  specifier: &Specifier,
  new_text: &str,
  new_version: &Version,
  mode: Mode,
) -> String {
  let Operand::Version {
    version: operand,
    wildcard,
  } = &specifier.operand
  else {
    return specifier.text().to_string();
  };
  match specifier.comparator {
    Comparator::ArbitraryEqual | Comparator::NotEqual => {
      specifier.text().to_string()
    }
    Comparator::Equal => {
      if *wildcard {
        format!(
          "=={}.*",
          render(&at_precision(&new_version.release, operand.release.len()))
        )
      } else {
        format!("=={new_text}")
      }
    }
    Comparator::GreaterEqual => {
      if mode == Mode::Widen {
        specifier.text().to_string()
      } else {
        format!(">={new_text}")
      }
    }
    Comparator::Greater => {
      if mode == Mode::Widen || new_version > operand {
        specifier.text().to_string()
      } else {
        format!(">={new_text}")
      }
    }
    Comparator::LessEqual => {
      if new_version <= operand {
        specifier.text().to_string()
      } else {
        format!("<={new_text}")
      }
    }
    Comparator::Less => {
      if new_version < operand {
        specifier.text().to_string()
      } else if mode == Mode::Widen {
        format!(
          "<{}",
          render(&widen_ceiling(&new_version.release, &operand.release))
        )
      } else {
        format!(
          "<{}",
          render(&next_ceiling(&new_version.release, operand.release.len()))
        )
      }
    }
    Comparator::Compatible => {
      if mode == Mode::Widen {
        // `~=X` is sugar for `>=X,<ceiling`, so widening keeps the
        // written floor and raises only the implied ceiling
        let precision = operand.release.len().max(2) - 1;
        format!(
          ">={},<{}",
          specifier.operand_text(),
          render(&next_ceiling(&new_version.release, precision))
        )
      } else {
        format!(
          "~={}",
          render(&at_precision(&new_version.release, operand.release.len()))
        )
      }
    }
  }
}

struct BoundPair<'a> {
  lower: &'a Version,
  upper_specifier: &'a Specifier,
  upper: &'a Version,
}

fn as_bound_pair(range: &RangeExpression) -> Option<BoundPair> {
  if range.specifiers.len() != 2 {
    return None;
  }
  let lower = &range.specifiers[0];
  let upper = &range.specifiers[1];
  match (&lower.operand, &upper.operand) {
    (
      Operand::Version {
        version: lower_version,
        wildcard: false,
      },
      Operand::Version {
        version: upper_version,
        wildcard: false,
      },
    ) if lower.comparator == Comparator::GreaterEqual
      && upper.comparator == Comparator::Less =>
    {
      Some(BoundPair {
        lower: lower_version,
        upper_specifier: upper,
        upper: upper_version,
      })
    }
    _ => None,
  }
}

/// A `>=X,<Y` pair moves together: the floor becomes the new version
/// and the ceiling advances at the position where X and Y first
/// diverge, which keeps the window as wide as the author wrote it.
fn rewrite_bound_pair(
  pair: &BoundPair,
  new_text: &str,
  new_version: &Version,
) -> Vec<String> {
  let x = pair.lower;
  let y = pair.upper;
  let upper_text = if new_version < y {
    pair.upper_specifier.text().to_string()
  } else {
    let len = y.release.len();
    let max_len = x.release.len().max(len);
    let position = (0..max_len)
      .find(|i| {
        x.release.get(*i).copied().unwrap_or(0)
          != y.release.get(*i).copied().unwrap_or(0)
      })
      .unwrap_or(len - 1)
      .min(len - 1);
    let mut ceiling = at_precision(&new_version.release, len);
    ceiling[position] += 1;
    for segment in &mut ceiling[position + 1..] {
      *segment = 0;
    }
    format!("<{}", render(&ceiling))
  };
  vec![format!(">={new_text}"), upper_text]
}

fn at_precision(release: &[u64], len: usize) -> Vec<u64> {
  (0..len)
    .map(|i| release.get(i).copied().unwrap_or(0))
    .collect()
}

fn next_ceiling(release: &[u64], len: usize) -> Vec<u64> {
  let mut ceiling = at_precision(release, len.max(1));
  let last = ceiling.len() - 1;
  ceiling[last] += 1;
  ceiling
}

/// The ceiling for widening `<Y`: advance at Y's last nonzero
/// position and zero everything below it, so `<19.13.0` widens to
/// `<20.4.0` for `20.3.1` while `<19.13.9` only widens to `<20.3.2`.
fn widen_ceiling(release: &[u64], bound: &[u64]) -> Vec<u64> {
  let position = bound
    .iter()
    .rposition(|segment| *segment != 0)
    .unwrap_or(bound.len() - 1);
  let mut ceiling = at_precision(release, bound.len());
  ceiling[position] += 1;
  for segment in &mut ceiling[position + 1..] {
    *segment = 0;
  }
  ceiling
}

fn render(release: &[u64]) -> String {
  release
    .iter()
    .map(|segment| segment.to_string())
    .collect::<Vec<_>>()
    .join(".")
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::*;

  #[track_caller]
  fn run(
    current_value: &str,
    strategy: &str,
    current_version: &str,
    new_version: &str,
  ) -> Option<String> {
    get_new_value(&NewValueConfig {
      current_value,
      range_strategy: RangeStrategy::parse(strategy),
      current_version: Some(current_version),
      new_version,
      is_replacement: false,
    })
  }

  #[test]
  fn strategy_parse_falls_back_to_replace() {
    assert_eq!(RangeStrategy::parse("pin"), RangeStrategy::Pin);
    assert_eq!(RangeStrategy::parse("bump"), RangeStrategy::Bump);
    assert_eq!(RangeStrategy::parse("widen"), RangeStrategy::Widen);
    assert_eq!(RangeStrategy::parse("auto"), RangeStrategy::Auto);
    assert_eq!(RangeStrategy::parse("replace"), RangeStrategy::Replace);
    assert_eq!(RangeStrategy::parse("unsupported"), RangeStrategy::Replace);
    assert_eq!(
      "update-lockfile".parse::<RangeStrategy>(),
      Ok(RangeStrategy::Replace)
    );
  }

  #[test]
  fn pins_regardless_of_current_value() {
    let fixtures = [
      ("1.0.0", "==1.2.3"),
      ("==1.0.3", "==1.2.3"),
      (">=1.2.0", "==1.2.3"),
      ("~=1.2.0", "==1.2.3"),
      (" ", "==1.2.3"),
      ("invalid", "==1.2.3"),
      ("===1.0.3", "==1.2.3"),
      ("!=1.2.3", "==1.2.3"),
      ("==1.2.*", "==1.2.3"),
    ];
    for (current_value, expected) in fixtures {
      assert_eq!(
        run(current_value, "pin", "1.0.0", "1.2.3").as_deref(),
        Some(expected),
        "{}",
        current_value
      );
    }
  }

  #[test]
  fn replacement_returns_new_version_verbatim() {
    for strategy in ["pin", "bump", "replace", "widen", "auto", "unsupported"] {
      let result = get_new_value(&NewValueConfig {
        current_value: "==1.0.3",
        range_strategy: RangeStrategy::parse(strategy),
        current_version: Some("1.0.3"),
        new_version: "1.2.3",
        is_replacement: true,
      });
      assert_eq!(result.as_deref(), Some("1.2.3"), "{}", strategy);
    }
  }

  #[test]
  fn bump_rewrites_clauses() {
    let fixtures = [
      // a bare version stays a bare version
      ("1.0.0", "1.0.0", "1.2.3", Some("1.2.3")),
      ("==1.0.3", "1.0.3", "1.2.3", Some("==1.2.3")),
      (">=1.2.0", "1.0.0", "1.2.3", Some(">=1.2.3")),
      // bump follows the new version even downwards
      (">=2.0.0", "1.0.0", "1.2.3", Some(">=1.2.3")),
      ("~=1.2.0", "1.0.0", "1.2.3", Some("~=1.2.3")),
      ("~=1.0.3", "1.0.3", "1.2.3", Some("~=1.2.3")),
      ("==1.2.*", "1.0.0", "1.2.3", Some("==1.2.*")),
      ("==1.0.*", "1.0.0", "1.2.3", Some("==1.2.*")),
      ("<1.2.2.3", "1.0.0", "1.2.3", Some("<1.2.3.1")),
      ("<1.2.3", "1.0.0", "1.2.3", Some("<1.2.4")),
      ("<1.2", "1.0.0", "1.2.3", Some("<1.3")),
      ("<1", "1.0.0", "1.2.3", Some("<2")),
      ("<2.0.0", "1.0.0", "1.2.3", Some("<2.0.0")),
      (">0.9.8", "1.0.0", "1.2.3", Some(">0.9.8")),
      (">2.0.0", "1.0.0", "1.2.3", Some(">=1.2.3")),
      ("~=1.1.0, !=1.1.1", "1.1.0", "1.2.3", Some("~=1.2.3, !=1.1.1")),
      ("~=1.1.0,!=1.1.1", "1.1.0", "1.2.3", Some("~=1.2.3,!=1.1.1")),
      (" ", "1.0.0", "1.2.3", Some(" ")),
      ("invalid", "1.0.0", "1.2.3", None),
      ("===1.0.3", "1.0.3", "1.2.3", None),
      ("!=1.2.3", "1.0.0", "1.2.3", None),
      // bump downgrades leave satisfied upper bounds alone
      ("<1.3.0", "1.3.0", "0.9.2", Some("<1.3.0")),
      ("<=1.3.0", "1.3.0", "0.9.2", Some("<=1.3.0")),
      ("<=1.3.0", "1.3.0", "1.6.0", Some("<=1.6.0")),
      ("<1.3.0", "1.3.0", "1.6.0", Some("<1.6.1")),
    ];
    for (current_value, current_version, new_version, expected) in fixtures {
      assert_eq!(
        run(current_value, "bump", current_version, new_version).as_deref(),
        expected,
        "{} -> {}",
        current_value,
        new_version
      );
    }
  }

  #[test]
  fn replace_keeps_satisfied_ranges() {
    let fixtures = [
      (">=1.2.0", "1.0.0", "1.2.3", Some(">=1.2.0")),
      ("~=1.2.0", "1.0.0", "1.2.3", Some("~=1.2.0")),
      ("==1.2.*", "1.0.0", "1.2.3", Some("==1.2.*")),
      ("<2.0.0", "1.0.0", "1.2.3", Some("<2.0.0")),
      ("<2.0.0, >0.9.8", "1.0.0", "1.2.3", Some("<2.0.0, >0.9.8")),
    ];
    for (current_value, current_version, new_version, expected) in fixtures {
      assert_eq!(
        run(current_value, "replace", current_version, new_version).as_deref(),
        expected,
        "{}",
        current_value
      );
    }
  }

  #[test]
  fn replace_rewrites_unsatisfied_ranges() {
    let fixtures = [
      ("1.0.0", "1.0.0", "1.2.3", Some("1.2.3")),
      ("==1.0.3", "1.0.3", "1.2.3", Some("==1.2.3")),
      ("~=1.0.3", "1.0.3", "1.2.3", Some("~=1.2.3")),
      ("==1.0.*", "1.0.0", "1.2.3", Some("==1.2.*")),
      ("<1.2.2.3", "1.0.0", "1.2.3", Some("<1.2.3.1")),
      ("<1.2.3", "1.0.0", "1.2.3", Some("<1.2.4")),
      ("<1.2", "1.0.0", "1.2.3", Some("<1.3")),
      ("<1", "1.0.0", "1.2.3", Some("<2")),
      (">2.0.0", "1.0.0", "1.2.3", Some(">=1.2.3")),
      (">=2.0.0", "1.0.0", "1.2.3", Some(">=1.2.3")),
      ("~=1.1.0, !=1.1.1", "1.1.0", "1.2.3", Some("~=1.2.3, !=1.1.1")),
      ("~=1.1.0,!=1.1.1", "1.1.0", "1.2.3", Some("~=1.2.3,!=1.1.1")),
      (" ", "1.0.0", "1.2.3", Some(" ")),
      ("invalid", "1.0.0", "1.2.3", None),
      ("===1.0.3", "1.0.3", "1.2.3", None),
      ("!=1.2.3", "1.0.0", "1.2.3", None),
      // truncation and zero padding follow the written precision
      ("~=7.2", "7.2.0", "8.0.1", Some("~=8.0")),
      ("~=7.2", "7.2.0", "8", Some("~=8.0")),
      ("~=7.2.0", "7.2.0", "8.2", Some("~=8.2.0")),
      ("~=7.2.0", "7.2.0", "8.2.0.1", Some("~=8.2.0")),
    ];
    for (current_value, current_version, new_version, expected) in fixtures {
      assert_eq!(
        run(current_value, "replace", current_version, new_version).as_deref(),
        expected,
        "{} -> {}",
        current_value,
        new_version
      );
    }
  }

  #[test]
  fn replace_moves_bound_pairs_together() {
    let fixtures = [
      (">=19.12.2,<20.13.9", "21.3.1", Some(">=21.3.1,<22.0.0")),
      (">=19.12.2,<19.13.9", "20.3.1", Some(">=20.3.1,<20.4.0")),
      (">=19.12.2,<19.13.0", "20.3.1", Some(">=20.3.1,<20.4.0")),
      (">=19.12.2,<19.13.0", "20.3.0", Some(">=20.3.0,<20.4.0")),
      (">=19.12.2,<19.13.0", "19.13.1", Some(">=19.13.1,<19.14.0")),
      (">=19.12.2,<19.13.0", "19.13.0", Some(">=19.13.0,<19.14.0")),
      (">=1.0.0,<1.1.0", "1.2.0", Some(">=1.2.0,<1.3.0")),
    ];
    for (current_value, new_version, expected) in fixtures {
      for strategy in ["replace", "auto"] {
        assert_eq!(
          run(current_value, strategy, "19.12.2", new_version).as_deref(),
          expected,
          "{} {} -> {}",
          strategy,
          current_value,
          new_version
        );
      }
    }
  }

  #[test]
  fn replace_collapses_wildcard_with_floor() {
    let fixtures = [
      ("==3.2.*,>=3.2.2", "3.2.2", "4.1.1", Some("==4.1.*")),
      ("==3.2.*,>=3.2.2", "3.2.2", "4.0.0", Some("==4.0.*")),
    ];
    for (current_value, current_version, new_version, expected) in fixtures {
      assert_eq!(
        run(current_value, "replace", current_version, new_version).as_deref(),
        expected,
        "{}",
        current_value
      );
    }
  }

  #[test]
  fn widen_extends_upper_bounds_only() {
    let fixtures = [
      // already satisfied ranges stay as written
      (">=1.2.0", "1.0.0", "1.2.3", Some(">=1.2.0")),
      ("<2.0.0", "1.0.0", "1.2.3", Some("<2.0.0")),
      (">=19.12.2,<20.13.9", "19.12.2", "21.3.1", Some(">=19.12.2,<21.3.2")),
      (">=19.12.2,<19.13.9", "19.12.2", "20.3.1", Some(">=19.12.2,<20.3.2")),
      (">=19.12.2,<19.13.0", "19.12.2", "20.3.1", Some(">=19.12.2,<20.4.0")),
      (">=19.12.2,<19.13.0", "19.12.2", "20.3.0", Some(">=19.12.2,<20.4.0")),
      (">=19.12.2,<19.13.0", "19.12.2", "19.13.1", Some(">=19.12.2,<19.14.0")),
      (">=19.12.2,<19.13.0", "19.12.2", "19.13.0", Some(">=19.12.2,<19.14.0")),
      // a compatible release expands into its implied pair
      ("~=7.2", "7.2.0", "8.0.1", Some(">=7.2,<9")),
      ("~=7.2", "7.2.0", "8", Some(">=7.2,<9")),
      ("~=7.2.0", "7.2.0", "8.2", Some(">=7.2.0,<8.3")),
      ("invalid", "1.0.0", "1.2.3", None),
      ("===1.0.3", "1.0.3", "1.2.3", None),
    ];
    for (current_value, current_version, new_version, expected) in fixtures {
      assert_eq!(
        run(current_value, "widen", current_version, new_version).as_deref(),
        expected,
        "{} -> {}",
        current_value,
        new_version
      );
    }
  }

  #[test]
  fn auto_and_unknown_strategies_behave_like_replace() {
    for strategy in ["auto", "unsupported"] {
      assert_eq!(
        run(">=1.2.0", strategy, "1.0.0", "1.2.3").as_deref(),
        Some(">=1.2.0"),
        "{}",
        strategy
      );
      assert_eq!(
        run("~=1.1.0,!=1.1.1", strategy, "1.1.0", "1.2.3").as_deref(),
        Some("~=1.2.3,!=1.1.1"),
        "{}",
        strategy
      );
    }
  }

  #[test]
  fn result_always_admits_the_new_version() {
    let fixtures = [
      (">=1.2.0", "bump"),
      ("<1.2.2.3", "bump"),
      ("~=1.1.0,!=1.1.1", "replace"),
      (">=19.12.2,<19.13.0", "widen"),
      ("==3.2.*,>=3.2.2", "replace"),
    ];
    for (current_value, strategy) in fixtures {
      let result = run(current_value, strategy, "1.0.0", "1.2.3");
      if let Some(result) = result {
        let range = RangeExpression::parse(&result).unwrap();
        let new_version = parse_version("1.2.3").unwrap();
        assert!(
          range.satisfies(&new_version),
          "{} {} -> {}",
          strategy,
          current_value,
          result
        );
      }
    }
  }
}
