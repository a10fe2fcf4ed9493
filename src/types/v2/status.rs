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

pub mod pool;
pub mod state;

use kube::KubeSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub current_state: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<state::HealthStatus>,

    #[serde(default)]
    pub available_replicas: i32,

    /// Drives declared across all pools.
    #[serde(default)]
    pub drives_total: i64,

    /// Bumped every time the operator observes a new spec generation.
    #[serde(default)]
    pub revision: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<pool::Pool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}
