/*
 *  jsonpath.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Dotted key-path value extraction over raw JSON-like text
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

//! Locates values inside a JSON-ish text blob by key path, without building
//! a parse tree.
//!
//! The scan is deliberately minimal: keys are found by literal substring
//! match on `"key"`, nested objects by brace counting, and string escapes are
//! limited to `\n`, `\t` and "backslash followed by anything means that
//! thing". Unicode `\uXXXX` escapes are *not* decoded (`\u0041` comes back
//! as `u0041`).
//!
//! ```text
//! {"main":{"temp":21.5}}   main.temp        -> Scalar("21.5")
//! {"weather":[{"main":"Clouds"}]}  weather[0].main  -> String("Clouds")
//! ```

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters that end an unquoted scalar token.
pub const SCALAR_DELIMITERS: [char; 5] = [',', '}', ']', ' ', '\n'];

/// Errors building a [`KeyPath`] from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("key path is empty")]
    Empty,
    #[error("key path '{0}' has an empty segment")]
    EmptySegment(String),
    #[error("bad array index in key path segment '{0}'")]
    BadIndex(String),
}

/// Why a lookup came back empty. [`Extractor::extract`] folds all of these
/// into [`RawValue::Absent`]; [`Extractor::try_extract`] keeps them for logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("key '{segment}' not found")]
    PathNotFound { segment: String },
    #[error("unbalanced or missing delimiter after key '{segment}'")]
    MalformedSpan { segment: String },
    #[error("key '{segment}' has an empty value")]
    EmptyValue { segment: String },
}

/// One step of a key path: an object key, optionally indexing into an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    key: String,
    index: Option<usize>,
}

impl Segment {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    fn parse(raw: &str, whole: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::EmptySegment(whole.to_string()));
        }
        let Some(open) = raw.find('[') else {
            return Ok(Self { key: raw.to_string(), index: None });
        };
        let key = &raw[..open];
        let index = raw[open + 1..]
            .strip_suffix(']')
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| PathError::BadIndex(raw.to_string()))?;
        if key.is_empty() {
            return Err(PathError::EmptySegment(whole.to_string()));
        }
        Ok(Self { key: key.to_string(), index: Some(index) })
    }

    /// The key as it appears in the source text, quotes included.
    fn needle(&self) -> String {
        format!("\"{}\"", self.key)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{}]", self.key, i),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Non-empty, immutable sequence of [`Segment`]s, e.g. `main.temp` or
/// `weather[0].description`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    pub fn parse(dotted: &str) -> Result<Self, PathError> {
        if dotted.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = dotted
            .split('.')
            .map(|raw| Segment::parse(raw, dotted))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

/// Result of a lookup, borrowing from the searched buffer where it can.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue<'a> {
    /// Quoted string with escapes already resolved.
    String(Cow<'a, str>),
    /// Unquoted token (number, bool, null), left for the caller to parse.
    Scalar(&'a str),
    Absent,
}

impl<'a> RawValue<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, RawValue::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            RawValue::Scalar(s) => Some(s),
            RawValue::Absent => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            RawValue::String(s) => Some(s.into_owned()),
            RawValue::Scalar(s) => Some(s.to_string()),
            RawValue::Absent => None,
        }
    }

    /// String payload or `default`.
    pub fn text_or(&self, default: &str) -> String {
        self.as_str().unwrap_or(default).to_string()
    }

    /// Leading numeric prefix as f64 (`"12.5abc"` reads as 12.5), or
    /// `default` when there are no digits at all.
    pub fn as_f64_or(&self, default: f64) -> f64 {
        self.as_f64().unwrap_or(default)
    }

    /// Leading integer prefix (`"21.9"` reads as 21), or `default`.
    pub fn as_i64_or(&self, default: i64) -> i64 {
        self.as_i64().unwrap_or(default)
    }

    pub fn as_bool_or(&self, default: bool) -> bool {
        match self {
            RawValue::Scalar("true") => true,
            RawValue::Scalar("false") => false,
            _ => default,
        }
    }

    /// Same as [`as_f64_or`](Self::as_f64_or) but keeps absence visible.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_str()
            .and_then(|s| float_prefix(s.trim_start()))
            .and_then(|p| p.parse::<f64>().ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_str()
            .and_then(|s| int_prefix(s.trim_start()))
            .and_then(|p| p.parse::<i64>().ok())
    }
}

fn sign_len(s: &[u8]) -> usize {
    usize::from(matches!(s.first(), Some(b'+') | Some(b'-')))
}

fn digits_from(s: &[u8], start: usize) -> usize {
    s[start..].iter().take_while(|b| b.is_ascii_digit()).count()
}

fn int_prefix(s: &str) -> Option<&str> {
    let b = s.as_bytes();
    let sign = sign_len(b);
    let digits = digits_from(b, sign);
    (digits > 0).then(|| &s[..sign + digits])
}

fn float_prefix(s: &str) -> Option<&str> {
    let b = s.as_bytes();
    let mut end = sign_len(b);
    let int_digits = digits_from(b, end);
    end += int_digits;
    let mut frac_digits = 0;
    if b.get(end) == Some(&b'.') {
        frac_digits = digits_from(b, end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if matches!(b.get(end), Some(b'e') | Some(b'E')) {
        let exp_sign = sign_len(&b[end + 1..]);
        let exp_digits = digits_from(b, end + 1 + exp_sign);
        if exp_digits > 0 {
            end += 1 + exp_sign + exp_digits;
        }
    }
    Some(&s[..end])
}

/// How nested object spans are closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BraceMode {
    /// Count every `{`/`}` in the region, including ones inside string
    /// values. A `"}"` inside a nested string closes the span early.
    #[default]
    Naive,
    /// Skip braces inside quoted strings, honoring backslash escapes.
    StringAware,
}

/// Key-path lookups over borrowed text. Stateless apart from the brace mode,
/// so the same lookup always yields the same answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extractor {
    mode: BraceMode,
}

impl Extractor {
    pub const fn new(mode: BraceMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> BraceMode {
        self.mode
    }

    /// Look up `path` in `buffer`; any miss comes back as [`RawValue::Absent`].
    pub fn extract<'a>(&self, buffer: &'a str, path: &KeyPath) -> RawValue<'a> {
        match self.try_extract(buffer, path) {
            Ok(value) => value,
            Err(e) => {
                trace!("{path}: {e}");
                RawValue::Absent
            }
        }
    }

    pub fn try_extract<'a>(&self, buffer: &'a str, path: &KeyPath) -> Result<RawValue<'a>, ExtractError> {
        match path.segments().split_first() {
            Some((head, rest)) => self.walk(buffer, head, rest),
            None => Ok(RawValue::Absent),
        }
    }

    /// First element of the array under `array_key`, then `key` inside it.
    pub fn extract_first_element<'a>(&self, buffer: &'a str, array_key: &str, key: &str) -> RawValue<'a> {
        let head = Segment { key: array_key.to_string(), index: Some(0) };
        let leaf = Segment { key: key.to_string(), index: None };
        match self.walk(buffer, &head, std::slice::from_ref(&leaf)) {
            Ok(value) => value,
            Err(e) => {
                trace!("{array_key}[0].{key}: {e}");
                RawValue::Absent
            }
        }
    }

    fn walk<'a>(&self, buffer: &'a str, head: &Segment, rest: &[Segment]) -> Result<RawValue<'a>, ExtractError> {
        let scope = match (head.index, rest.is_empty()) {
            (None, true) => return self.value_at(buffer, head),
            (None, false) => self.object_span(buffer, head)?,
            (Some(n), _) => self.element_span(buffer, head, n)?,
        };
        match rest.split_first() {
            Some((next, tail)) => self.walk(scope, next, tail),
            // a bare `name[N]` hands back the element's raw object text
            None => Ok(RawValue::Scalar(scope)),
        }
    }

    /// Byte offset just past the quoted key.
    fn key_end(buffer: &str, seg: &Segment) -> Result<usize, ExtractError> {
        let needle = seg.needle();
        buffer
            .find(&needle)
            .map(|at| at + needle.len())
            .ok_or_else(|| ExtractError::PathNotFound { segment: seg.to_string() })
    }

    fn object_span<'a>(&self, buffer: &'a str, seg: &Segment) -> Result<&'a str, ExtractError> {
        let from = Self::key_end(buffer, seg)?;
        let open = buffer[from..]
            .find('{')
            .map(|i| from + i)
            .ok_or_else(|| ExtractError::MalformedSpan { segment: seg.to_string() })?;
        self.balanced(buffer, open, seg)
    }

    fn element_span<'a>(&self, buffer: &'a str, seg: &Segment, index: usize) -> Result<&'a str, ExtractError> {
        let malformed = || ExtractError::MalformedSpan { segment: seg.to_string() };
        let from = Self::key_end(buffer, seg)?;
        let bracket = buffer[from..].find('[').map(|i| from + i).ok_or_else(malformed)?;
        // an empty array (or one of scalars) has no element to span
        let open = buffer[bracket + 1..]
            .find(|c: char| !c.is_whitespace())
            .map(|i| bracket + 1 + i)
            .filter(|&at| buffer[at..].starts_with('{'))
            .ok_or_else(|| ExtractError::PathNotFound { segment: seg.to_string() })?;
        let mut span = self.balanced(buffer, open, seg)?;
        let mut cursor = open + span.len();
        for _ in 0..index {
            let gap = buffer[cursor..]
                .find(|c: char| !(c.is_whitespace() || c == ','))
                .map(|i| cursor + i);
            match gap {
                Some(next) if buffer[next..].starts_with('{') => {
                    span = self.balanced(buffer, next, seg)?;
                    cursor = next + span.len();
                }
                _ => return Err(ExtractError::PathNotFound { segment: seg.to_string() }),
            }
        }
        Ok(span)
    }

    /// Slice from the `{` at `open` through its matching `}`.
    fn balanced<'a>(&self, buffer: &'a str, open: usize, seg: &Segment) -> Result<&'a str, ExtractError> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (i, b) in buffer.bytes().enumerate().skip(open) {
            if self.mode == BraceMode::StringAware {
                if escaped {
                    escaped = false;
                    continue;
                }
                match b {
                    b'\\' if in_string => {
                        escaped = true;
                        continue;
                    }
                    b'"' => {
                        in_string = !in_string;
                        continue;
                    }
                    _ if in_string => continue,
                    _ => {}
                }
            }
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&buffer[open..=i]);
                    }
                }
                _ => {}
            }
        }
        Err(ExtractError::MalformedSpan { segment: seg.to_string() })
    }

    fn value_at<'a>(&self, buffer: &'a str, seg: &Segment) -> Result<RawValue<'a>, ExtractError> {
        let from = Self::key_end(buffer, seg)?;
        let colon = buffer[from..]
            .find(':')
            .map(|i| from + i)
            .ok_or_else(|| ExtractError::PathNotFound { segment: seg.to_string() })?;
        let rest = buffer[colon + 1..].trim_start_matches([' ', '\t']);
        if let Some(body) = rest.strip_prefix('"') {
            return read_string(body)
                .map(RawValue::String)
                .ok_or_else(|| ExtractError::MalformedSpan { segment: seg.to_string() });
        }
        let end = rest.find(SCALAR_DELIMITERS).unwrap_or(rest.len());
        if end == 0 {
            return Err(ExtractError::EmptyValue { segment: seg.to_string() });
        }
        Ok(RawValue::Scalar(&rest[..end]))
    }
}

/// Read a string body (opening quote already consumed). Borrows when there
/// is nothing to unescape; `None` when the closing quote never comes.
fn read_string(body: &str) -> Option<Cow<'_, str>> {
    let stop = body.find(['"', '\\'])?;
    if body[stop..].starts_with('"') {
        return Some(Cow::Borrowed(&body[..stop]));
    }
    let mut out = String::with_capacity(body.len().min(64));
    out.push_str(&body[..stop]);
    let mut chars = body[stop..].chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(Cow::Owned(out)),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            _ => out.push(c),
        }
    }
    None
}

/// Naive-mode lookup of `path` in `buffer`.
pub fn extract<'a>(buffer: &'a str, path: &KeyPath) -> RawValue<'a> {
    Extractor::default().extract(buffer, path)
}

/// Naive-mode first-element lookup, e.g. `weather` / `main`.
pub fn extract_first_element<'a>(buffer: &'a str, array_key: &str, key: &str) -> RawValue<'a> {
    Extractor::default().extract_first_element(buffer, array_key, key)
}

/// Parse `dotted` and look it up; an unparsable path reads as absent.
pub fn lookup<'a>(buffer: &'a str, dotted: &str) -> RawValue<'a> {
    match KeyPath::parse(dotted) {
        Ok(path) => extract(buffer, &path),
        Err(e) => {
            trace!("{dotted}: {e}");
            RawValue::Absent
        }
    }
}
