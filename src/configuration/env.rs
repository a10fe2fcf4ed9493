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

use super::seed::is_valid_name;
use crate::types::v2::tenant::{Tenant, is_root_credential};
use k8s_openapi::api::core::v1 as corev1;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Value of one configuration variable before references are resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvValue {
    Literal(String),
    SecretKey { name: String, key: String },
    ConfigMapKey { name: String, key: String },
}

impl EnvValue {
    /// Converts a container-style variable; field and resource references have no
    /// meaning outside a pod and yield `None`.
    pub fn from_env_var(var: &corev1::EnvVar) -> Option<Self> {
        let Some(source) = &var.value_from else {
            return Some(EnvValue::Literal(var.value.clone().unwrap_or_default()));
        };

        if let Some(selector) = &source.secret_key_ref {
            return Some(EnvValue::SecretKey {
                name: selector.name.clone(),
                key: selector.key.clone(),
            });
        }

        if let Some(selector) = &source.config_map_key_ref {
            return Some(EnvValue::ConfigMapKey {
                name: selector.name.clone(),
                key: selector.key.clone(),
            });
        }

        None
    }

    /// Looks the value up; `None` when the referenced object or key is absent.
    pub fn resolve(
        &self,
        config_maps: &BTreeMap<String, corev1::ConfigMap>,
        secrets: &BTreeMap<String, corev1::Secret>,
    ) -> Option<String> {
        match self {
            EnvValue::Literal(value) => Some(value.clone()),
            EnvValue::SecretKey { name, key } => secret_value(secrets.get(name)?, key),
            EnvValue::ConfigMapKey { name, key } => {
                let cm = config_maps.get(name)?;
                cm.data.as_ref().and_then(|d| d.get(key)).cloned().or_else(|| {
                    cm.binary_data
                        .as_ref()
                        .and_then(|d| d.get(key))
                        .and_then(|v| String::from_utf8(v.0.clone()).ok())
                })
            }
        }
    }
}

pub fn secret_value(secret: &corev1::Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .and_then(|v| String::from_utf8(v.0.clone()).ok())
        .or_else(|| secret.string_data.as_ref().and_then(|d| d.get(key)).cloned())
}

/// Names of every Secret and ConfigMap a tenant's configuration depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct References {
    pub secrets: BTreeSet<String>,
    pub config_maps: BTreeSet<String>,
}

impl References {
    pub fn of(tenant: &Tenant) -> Self {
        let mut refs = Self::default();

        if let Some(configuration) = &tenant.spec.configuration {
            refs.secrets.insert(configuration.name.clone());
        }

        for var in &tenant.spec.env {
            match EnvValue::from_env_var(var) {
                Some(EnvValue::SecretKey { name, .. }) => {
                    refs.secrets.insert(name);
                }
                Some(EnvValue::ConfigMapKey { name, .. }) => {
                    refs.config_maps.insert(name);
                }
                _ => {}
            }
        }

        refs
    }
}

/// `tenant.env` as a map, minus the variables it may not set.
pub fn tenant_env(tenant: &Tenant) -> BTreeMap<String, EnvValue> {
    let mut env = BTreeMap::new();

    for var in &tenant.spec.env {
        if !is_valid_name(&var.name) {
            warn!(
                tenant = %tenant.name(),
                name = ?var.name,
                "ignoring spec.env entry with an invalid name"
            );
            continue;
        }

        if is_root_credential(&var.name) {
            warn!(
                tenant = %tenant.name(),
                name = %var.name,
                "ignoring root credential in spec.env"
            );
            continue;
        }

        match EnvValue::from_env_var(var) {
            Some(value) => {
                env.insert(var.name.clone(), value);
            }
            None => warn!(
                tenant = %tenant.name(),
                name = %var.name,
                "ignoring env var with unsupported valueFrom"
            ),
        }
    }

    env
}

/// Quotes `value` the way Go's `%q` verb does, so the file is readable by both
/// a POSIX shell and the server's own env-file loader.
pub fn go_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');

    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if !is_printable(c) && (c as u32) <= 0xffff => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c if !is_printable(c) => {
                out.push_str(&format!("\\U{:08x}", c as u32));
            }
            c => out.push(c),
        }
    }

    out.push('"');
    out
}

/// Format characters, separators other than the ASCII space, and private use
/// code points are not printable. Unassigned code points are passed through.
fn is_printable(c: char) -> bool {
    !matches!(
        c,
        '\u{0}'..='\u{1f}'
            | '\u{7f}'..='\u{a0}'
            | '\u{ad}'
            | '\u{600}'..='\u{605}'
            | '\u{61c}'
            | '\u{6dd}'
            | '\u{70f}'
            | '\u{890}'..='\u{891}'
            | '\u{8e2}'
            | '\u{1680}'
            | '\u{180e}'
            | '\u{2000}'..='\u{200f}'
            | '\u{2028}'..='\u{202f}'
            | '\u{205f}'..='\u{2064}'
            | '\u{2066}'..='\u{206f}'
            | '\u{3000}'
            | '\u{e000}'..='\u{f8ff}'
            | '\u{feff}'
            | '\u{fff9}'..='\u{fffb}'
            | '\u{110bd}'
            | '\u{110cd}'
            | '\u{13430}'..='\u{1343f}'
            | '\u{1bca0}'..='\u{1bca3}'
            | '\u{1d173}'..='\u{1d17a}'
            | '\u{e0001}'
            | '\u{e0020}'..='\u{e007f}'
            | '\u{f0000}'..='\u{10ffff}'
    )
}

pub fn export_line(name: &str, value: &str) -> String {
    format!("export {name}={}\n", go_quote(value))
}
