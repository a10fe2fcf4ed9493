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

//! Parser for the `export NAME=VALUE` lines a seed secret carries.
//!
//! This is a documented subset of shell syntax, not a shell:
//! - blank lines and lines starting with `#` are ignored;
//! - every other line must read `export NAME=VALUE`, anything else is skipped;
//! - a value wrapped in matching `"` or `'` loses the outer quotes, and inside them a `\`
//!   makes the next character literal (a trailing lone `\` is dropped);
//! - an unquoted value is taken verbatim after trimming.

use crate::types::v2::tenant::{ROOT_PASSWORD_KEYS, ROOT_USER_KEYS};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Seed {
    pub vars: BTreeMap<String, String>,
}

impl Seed {
    pub fn parse(content: &str) -> Self {
        let vars = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let parsed = parse_line(line);
                if parsed.is_none() {
                    debug!(line, "skipping malformed seed line");
                }
                parsed
            })
            .collect();

        Self { vars }
    }

    pub fn root_user_present(&self) -> bool {
        ROOT_USER_KEYS.iter().any(|k| self.vars.contains_key(*k))
    }

    pub fn root_password_present(&self) -> bool {
        ROOT_PASSWORD_KEYS.iter().any(|k| self.vars.contains_key(*k))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("export")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (name, value) = rest.trim_start().split_once('=')?;
    if !is_valid_name(name) {
        return None;
    }

    Some((name.to_owned(), unquote(value.trim())))
}

/// Shell identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> String {
    let quoted = value.len() >= 2
        && (value.starts_with('"') && value.ends_with('"')
            || value.starts_with('\'') && value.ends_with('\''));
    if !quoted {
        return value.to_owned();
    }

    let inner = &value[1..value.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
