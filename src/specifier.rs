// Copyright 2024 the pep440_ranges authors. All rights reserved. MIT license.

use std::cmp::Ordering;

use monch::*;
use thiserror::Error;

use crate::Version;

#[derive(Error, Debug, Clone)]
#[error("Invalid specifier")]
pub struct SpecifierParseError {
  #[source]
  pub(crate) source: ParseErrorFailureError,
}

#[derive(Error, Debug, Clone)]
pub enum RangeParseError {
  #[error("Invalid range \"{text}\"")]
  Specifier {
    text: String,
    #[source]
    source: SpecifierParseError,
  },
  #[error("Invalid range \"{text}\"")]
  EmptyClause { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
  /// `===`
  ArbitraryEqual,
  /// `==`
  Equal,
  /// `!=`
  NotEqual,
  /// `~=`
  Compatible,
  /// `<=`
  LessEqual,
  /// `>=`
  GreaterEqual,
  /// `<`
  Less,
  /// `>`
  Greater,
}

impl Comparator {
  pub fn as_str(&self) -> &'static str {
    match self {
      Comparator::ArbitraryEqual => "===",
      Comparator::Equal => "==",
      Comparator::NotEqual => "!=",
      Comparator::Compatible => "~=",
      Comparator::LessEqual => "<=",
      Comparator::GreaterEqual => ">=",
      Comparator::Less => "<",
      Comparator::Greater => ">",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
  Version {
    version: Version,
    /// `==1.2.*` holds the prefix `1.2` with this flag set. Only
    /// `==` and `!=` clauses may carry it.
    wildcard: bool,
  },
  /// The operand of `===`, kept as written since arbitrary equality
  /// compares text rather than parsed versions.
  Arbitrary(String),
}

/// A single comparator clause like `>=1.2.0` or `==1.2.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specifier {
  pub comparator: Comparator,
  pub operand: Operand,
  text: String,
}

impl Specifier {
  /// The clause exactly as written (trimmed), so untouched clauses
  /// round-trip byte for byte.
  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn operand_text(&self) -> &str {
    self.text[self.comparator.as_str().len()..].trim()
  }

  pub fn satisfies(&self, version: &Version) -> bool {
    let (operand, wildcard) = match &self.operand {
      Operand::Version { version, wildcard } => (version, *wildcard),
      Operand::Arbitrary(text) => {
        return self.comparator == Comparator::ArbitraryEqual
          && version.to_string() == *text;
      }
    };
    match self.comparator {
      Comparator::ArbitraryEqual => false,
      Comparator::Equal => {
        if wildcard {
          matches_prefix(version, operand)
        } else {
          version.cmp(operand) == Ordering::Equal
        }
      }
      Comparator::NotEqual => {
        if wildcard {
          !matches_prefix(version, operand)
        } else {
          version.cmp(operand) != Ordering::Equal
        }
      }
      Comparator::Compatible => {
        version >= operand && version < &compatible_ceiling(operand)
      }
      Comparator::LessEqual => version <= operand,
      Comparator::GreaterEqual => version >= operand,
      Comparator::Less => version < operand,
      Comparator::Greater => version > operand,
    }
  }
}

fn matches_prefix(version: &Version, prefix: &Version) -> bool {
  version.epoch == prefix.epoch
    && prefix.release.iter().enumerate().all(|(i, segment)| {
      version.release.get(i).copied().unwrap_or(0) == *segment
    })
}

fn compatible_ceiling(operand: &Version) -> Version {
  // `~=1.2.3` admits everything below `1.3`
  let mut release = operand.release[..operand.release.len() - 1].to_vec();
  if let Some(last) = release.last_mut() {
    *last += 1;
  }
  Version {
    epoch: operand.epoch,
    release,
    pre: None,
    post: None,
    dev: None,
    local: None,
  }
}

pub fn parse_specifier(text: &str) -> Result<Specifier, SpecifierParseError> {
  let text = text.trim();
  let (comparator, operand) = with_failure_handling(specifier_parts)(text)
    .map_err(|err| SpecifierParseError { source: err })?;
  Ok(Specifier {
    comparator,
    operand,
    text: text.to_string(),
  })
}

fn specifier_parts(input: &str) -> ParseResult<(Comparator, Operand)> {
  let (input, comparator) = comparator(input)?;
  let (input, _) = skip_whitespace(input)?;
  match comparator {
    Comparator::ArbitraryEqual => {
      let (input, operand_text) =
        if_not_empty(substring(skip_while(|_| true)))(input)?;
      Ok((
        input,
        (comparator, Operand::Arbitrary(operand_text.to_string())),
      ))
    }
    Comparator::Equal | Comparator::NotEqual => {
      let (input, operand) = or(wildcard_operand, version_operand)(input)?;
      Ok((input, (comparator, operand)))
    }
    Comparator::Compatible => {
      let (input, operand) = version_operand(input)?;
      if let Operand::Version { version, .. } = &operand {
        if version.release.len() < 2 {
          return ParseError::fail(
            input,
            "A compatible release clause requires at least two release segments",
          );
        }
      }
      Ok((input, (comparator, operand)))
    }
    _ => {
      let (input, operand) = version_operand(input)?;
      Ok((input, (comparator, operand)))
    }
  }
}

fn comparator(input: &str) -> ParseResult<Comparator> {
  or5(
    map(tag("==="), |_| Comparator::ArbitraryEqual),
    map(tag("=="), |_| Comparator::Equal),
    map(tag("!="), |_| Comparator::NotEqual),
    map(tag("~="), |_| Comparator::Compatible),
    or4(
      map(tag("<="), |_| Comparator::LessEqual),
      map(tag(">="), |_| Comparator::GreaterEqual),
      map(ch('<'), |_| Comparator::Less),
      map(ch('>'), |_| Comparator::Greater),
    ),
  )(input)
}

fn wildcard_operand(input: &str) -> ParseResult<Operand> {
  let (input, release) = crate::version::release(input)?;
  let (input, _) = tag(".*")(input)?;
  Ok((
    input,
    Operand::Version {
      version: Version {
        epoch: 0,
        release,
        pre: None,
        post: None,
        dev: None,
        local: None,
      },
      wildcard: true,
    },
  ))
}

fn version_operand(input: &str) -> ParseResult<Operand> {
  let (input, version) = crate::version::version(input)?;
  Ok((
    input,
    Operand::Version {
      version,
      wildcard: false,
    },
  ))
}

/// A comma separated conjunction of comparator clauses.
///
/// Separators are kept exactly as written so a partially rewritten
/// range preserves the author's `", "` versus `","` style. Empty or
/// whitespace-only text parses to the valid unconstrained expression
/// with zero clauses.
#[derive(Debug, Clone)]
pub struct RangeExpression {
  pub specifiers: Vec<Specifier>,
  separators: Vec<String>,
  raw_text: String,
}

impl PartialEq for RangeExpression {
  fn eq(&self, other: &Self) -> bool {
    self.specifiers == other.specifiers
  }
}

impl Eq for RangeExpression {}

impl std::fmt::Display for RangeExpression {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{}", self.raw_text)
  }
}

impl serde::Serialize for RangeExpression {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.raw_text)
  }
}

impl<'de> serde::Deserialize<'de> for RangeExpression {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let text: String = serde::Deserialize::deserialize(deserializer)?;
    RangeExpression::parse(&text).map_err(serde::de::Error::custom)
  }
}

impl RangeExpression {
  pub fn parse(text: &str) -> Result<Self, RangeParseError> {
    if text.trim().is_empty() {
      return Ok(RangeExpression {
        specifiers: Vec::new(),
        separators: Vec::new(),
        raw_text: text.to_string(),
      });
    }
    let parts = text.split(',').collect::<Vec<_>>();
    let mut specifiers = Vec::with_capacity(parts.len());
    let mut separators = Vec::with_capacity(parts.len().saturating_sub(1));
    for (i, part) in parts.iter().enumerate() {
      let token = part.trim();
      if token.is_empty() {
        return Err(RangeParseError::EmptyClause {
          text: text.to_string(),
        });
      }
      specifiers.push(parse_specifier(token).map_err(|source| {
        RangeParseError::Specifier {
          text: text.to_string(),
          source,
        }
      })?);
      if i + 1 < parts.len() {
        let trailing = &part[part.trim_end().len()..];
        let next = parts[i + 1];
        let leading = &next[..next.len() - next.trim_start().len()];
        separators.push(format!("{trailing},{leading}"));
      }
    }
    Ok(RangeExpression {
      specifiers,
      separators,
      raw_text: text.to_string(),
    })
  }

  pub fn raw_text(&self) -> &str {
    &self.raw_text
  }

  pub fn is_unconstrained(&self) -> bool {
    self.specifiers.is_empty()
  }

  /// True when every clause admits the version. The unconstrained
  /// expression admits everything.
  pub fn satisfies(&self, version: &Version) -> bool {
    self.specifiers.iter().all(|s| s.satisfies(version))
  }

  /// The strongest lower bound the clauses impose, if any. `>=X`,
  /// `~=X` and exact `==X` clauses bound inclusively, `>X` exclusively;
  /// upper bounds, exclusions, wildcards and `===` impose none.
  pub fn floor(&self) -> Option<(&Version, bool)> {
    let mut best: Option<(&Version, bool)> = None;
    for specifier in &self.specifiers {
      let Operand::Version { version, wildcard } = &specifier.operand else {
        continue;
      };
      let candidate = match specifier.comparator {
        Comparator::GreaterEqual | Comparator::Compatible => (version, false),
        Comparator::Equal if !wildcard => (version, false),
        Comparator::Greater => (version, true),
        _ => continue,
      };
      best = Some(match best {
        None => candidate,
        Some(current) => {
          let stronger = match candidate.0.cmp(current.0) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => candidate.1 && !current.1,
          };
          if stronger {
            candidate
          } else {
            current
          }
        }
      });
    }
    best
  }

  /// Joins rewritten clause texts with the original separators.
  pub(crate) fn rejoin(&self, texts: &[String]) -> String {
    debug_assert_eq!(texts.len(), self.specifiers.len());
    let mut result = String::new();
    for (i, text) in texts.iter().enumerate() {
      if i > 0 {
        result.push_str(&self.separators[i - 1]);
      }
      result.push_str(text);
    }
    result
  }
}
