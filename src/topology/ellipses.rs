// Copyright 2025 MinIO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parser for `{a...b}` ellipses patterns.
//!
//! A range is decimal unless either bound contains a hex letter, in which case both
//! bounds are read as hexadecimal (IPv6 hosts). Bounds of equal length with a
//! leading zero keep their width when expanded, so `{01...32}` yields `01`, `02`, ...

use super::{Error, InvalidRangeSnafu};
use std::fmt;
use std::str::FromStr;

const OPEN_BRACE: char = '{';
const CLOSE_BRACE: char = '}';
const ELLIPSES: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    start: u64,
    end: u64,
    width: usize,
    hex: bool,
}

impl Range {
    fn parse(pattern: &str, body: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| {
            InvalidRangeSnafu {
                pattern: pattern.to_string(),
                range: body.to_string(),
                reason: reason.to_string(),
            }
            .build()
        };

        let (start, end) = body
            .split_once(ELLIPSES)
            .ok_or_else(|| invalid("missing '...'"))?;

        if start.is_empty() || end.is_empty() {
            return Err(invalid("range bounds must not be empty"));
        }

        if !start
            .chars()
            .chain(end.chars())
            .all(|c| c.is_ascii_hexdigit())
        {
            return Err(invalid("range bounds must be decimal or hexadecimal"));
        }

        // Each bound falls back to hex on its own; one hex bound makes the labels hex.
        let bound = |text: &str, what: &str| {
            let radix = if text.chars().all(|c| c.is_ascii_digit()) { 10 } else { 16 };
            u64::from_str_radix(text, radix)
                .map(|value| (value, radix == 16))
                .map_err(|_| invalid(&format!("range {what} is too large")))
        };
        let (start_value, start_hex) = bound(start, "start")?;
        let (end_value, end_hex) = bound(end, "end")?;
        let hex = start_hex || end_hex;

        if start_value > end_value {
            return Err(invalid("range start is bigger than range end"));
        }

        let width = if start.len() == end.len() && start.len() > 1 && start.starts_with('0') {
            end.len()
        } else {
            0
        };

        Ok(Self {
            start: start_value,
            end: end_value,
            width,
            hex,
        })
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        usize::try_from(self.end - self.start).map_or(usize::MAX, |n| n.saturating_add(1))
    }

    /// Label of the `index`-th element, formatted the way it was written.
    pub fn label(&self, index: usize) -> String {
        let value = self.start + index as u64;
        match self.hex {
            true => format!("{value:0width$x}", width = self.width),
            false => format!("{value:0width$}", width = self.width),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.len()).map(|i| self.label(i))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Range(Range),
}

/// An endpoint argument split into literal text and ellipses ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn ranges(&self) -> impl Iterator<Item = &Range> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Range(range) => Some(range),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_ellipses(&self) -> bool {
        self.ranges().next().is_some()
    }

    /// Number of endpoints the pattern expands to.
    pub fn total_size(&self) -> usize {
        self.ranges()
            .map(Range::len)
            .fold(1usize, |acc, len| acc.saturating_mul(len))
    }

    /// Every concrete endpoint, leftmost range varying slowest.
    pub fn expand(&self) -> Vec<String> {
        self.segments
            .iter()
            .fold(vec![String::new()], |prefixes, segment| match segment {
                Segment::Literal(text) => prefixes
                    .into_iter()
                    .map(|prefix| prefix + text)
                    .collect(),
                Segment::Range(range) => prefixes
                    .iter()
                    .flat_map(|prefix| range.labels().map(move |label| format!("{prefix}{label}")))
                    .collect(),
            })
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = s;

        while let Some(open) = rest.find(OPEN_BRACE) {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let close = after.find(CLOSE_BRACE).ok_or_else(|| {
                InvalidRangeSnafu {
                    pattern: s.to_string(),
                    range: after.to_string(),
                    reason: "unbalanced braces",
                }
                .build()
            })?;
            let body = &after[..close];

            if body.contains(ELLIPSES) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Range(Range::parse(s, body)?));
            } else {
                literal.push(OPEN_BRACE);
                literal.push_str(body);
                literal.push(CLOSE_BRACE);
            }

            rest = &after[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: s.to_string(),
            segments,
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
