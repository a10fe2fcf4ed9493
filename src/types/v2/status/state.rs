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

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use strum::Display;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum State {
    #[strum(serialize = "Initialized")]
    Initialized,

    #[strum(serialize = "Provisioning")]
    Provisioning,

    #[strum(serialize = "Waiting for pods to be ready")]
    WaitingForReadiness,

    #[strum(serialize = "Ready")]
    Ready,

    #[strum(serialize = "InvalidConfiguration")]
    InvalidConfiguration,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    /// Every server is available.
    Green,

    /// Some servers are available.
    Yellow,

    /// No server is available.
    Red,
}

impl HealthStatus {
    pub fn from_replicas(available: i32, desired: i32) -> Self {
        match available {
            a if desired > 0 && a >= desired => HealthStatus::Green,
            a if a > 0 => HealthStatus::Yellow,
            _ => HealthStatus::Red,
        }
    }
}

impl JsonSchema for HealthStatus {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("HealthStatus")
    }
    fn schema_id() -> Cow<'static, str> {
        Cow::Borrowed(concat!(module_path!(), "::", "HealthStatus"))
    }
    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema! {
            {"type": "string", "enum": ["green", "yellow", "red"]}
        }
    }
}
