// Copyright 2024 the pep440_ranges authors. All rights reserved. MIT license.

use monch::*;
use thiserror::Error;

use crate::Pre;
use crate::PreKind;
use crate::Version;

// A loose rendition of the PEP 440 version grammar. Accepts the
// normalized spelling plus the common deviations installers accept:
//
// version        ::= 'v'? epoch? release pre? post? dev? local?
// epoch          ::= nr '!'
// release        ::= nr ( '.' nr )*
// pre            ::= sep? pre-tag sep? nr?
// pre-tag        ::= 'a' | 'alpha' | 'b' | 'beta' | 'rc' | 'c' | 'pre' | 'preview'
// post           ::= sep? post-tag sep? nr? | '-' nr
// post-tag       ::= 'post' | 'rev' | 'r'
// dev            ::= sep? 'dev' sep? nr?
// local          ::= '+' [a-zA-Z0-9._-]+
// sep            ::= '.' | '-' | '_'
// nr             ::= [0-9]+
//
// Tags are case insensitive and a tag without a number means zero.

#[derive(Error, Debug, Clone)]
#[error("Invalid version")]
pub struct VersionParseError {
  #[source]
  pub(crate) source: ParseErrorFailureError,
}

pub fn parse_version(text: &str) -> Result<Version, VersionParseError> {
  let text = text.trim();
  with_failure_handling(version)(text)
    .map_err(|err| VersionParseError { source: err })
}

pub(crate) fn version(input: &str) -> ParseResult<Version> {
  let (input, _) = maybe(or(ch('v'), ch('V')))(input)?;
  let (input, epoch) = maybe(epoch)(input)?;
  let (input, release) = release(input)?;
  let (input, pre) = maybe(pre)(input)?;
  let (input, post) = maybe(post)(input)?;
  let (input, dev) = maybe(dev)(input)?;
  let (input, local) = maybe(local)(input)?;
  Ok((
    input,
    Version {
      epoch: epoch.unwrap_or(0),
      release,
      pre,
      post,
      dev,
      local,
    },
  ))
}

fn epoch(input: &str) -> ParseResult<u64> {
  let (input, value) = nr(input)?;
  let (input, _) = ch('!')(input)?;
  Ok((input, value))
}

pub(crate) fn release(input: &str) -> ParseResult<Vec<u64>> {
  let (mut input, first) = nr(input)?;
  let mut segments = vec![first];
  while let (rest, Some(value)) = maybe(dot_nr)(input)? {
    segments.push(value);
    input = rest;
  }
  Ok((input, segments))
}

fn dot_nr(input: &str) -> ParseResult<u64> {
  let (input, _) = ch('.')(input)?;
  nr(input)
}

fn pre(input: &str) -> ParseResult<Pre> {
  let (input, _) = maybe(separator)(input)?;
  let (input, kind) = pre_kind(input)?;
  let (input, _) = maybe(separator)(input)?;
  let (input, number) = maybe(nr)(input)?;
  Ok((
    input,
    Pre {
      kind,
      number: number.unwrap_or(0),
    },
  ))
}

fn pre_kind(input: &str) -> ParseResult<PreKind> {
  let (input, tag_text) = tag_word(input)?;
  match tag_text.to_ascii_lowercase().as_str() {
    "a" | "alpha" => Ok((input, PreKind::Alpha)),
    "b" | "beta" => Ok((input, PreKind::Beta)),
    "rc" | "c" | "pre" | "preview" => Ok((input, PreKind::Rc)),
    _ => ParseError::backtrace(),
  }
}

fn post(input: &str) -> ParseResult<u64> {
  or(explicit_post, implicit_post)(input)
}

fn explicit_post(input: &str) -> ParseResult<u64> {
  let (input, _) = maybe(separator)(input)?;
  let (input, tag_text) = tag_word(input)?;
  match tag_text.to_ascii_lowercase().as_str() {
    "post" | "rev" | "r" => {}
    _ => return ParseError::backtrace(),
  }
  let (input, _) = maybe(separator)(input)?;
  let (input, number) = maybe(nr)(input)?;
  Ok((input, number.unwrap_or(0)))
}

fn implicit_post(input: &str) -> ParseResult<u64> {
  let (input, _) = ch('-')(input)?;
  nr(input)
}

fn dev(input: &str) -> ParseResult<u64> {
  let (input, _) = maybe(separator)(input)?;
  let (input, tag_text) = tag_word(input)?;
  if !tag_text.eq_ignore_ascii_case("dev") {
    return ParseError::backtrace();
  }
  let (input, _) = maybe(separator)(input)?;
  let (input, number) = maybe(nr)(input)?;
  Ok((input, number.unwrap_or(0)))
}

fn local(input: &str) -> ParseResult<String> {
  let (input, _) = ch('+')(input)?;
  let (input, text) = if_not_empty(substring(skip_while(|c| {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
  })))(input)?;
  Ok((input, text.to_ascii_lowercase().replace(['-', '_'], ".")))
}

fn separator(input: &str) -> ParseResult<char> {
  or3(ch('.'), ch('-'), ch('_'))(input)
}

fn tag_word(input: &str) -> ParseResult<&str> {
  if_not_empty(substring(skip_while(|c| c.is_ascii_alphabetic())))(input)
}

fn nr(input: &str) -> ParseResult<u64> {
  let (input, result) =
    if_not_empty(substring(skip_while(|c| c.is_ascii_digit())))(input)?;
  match result.parse::<u64>() {
    Ok(value) => Ok((input, value)),
    Err(err) => ParseError::fail(
      input,
      format!("Error parsing '{result}' to u64.\n\n{err:#}"),
    ),
  }
}
