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

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    /// Provision one Service per bucket so buckets resolve as `<bucket>.<domain>`.
    #[serde(default, rename = "bucketDNS")]
    pub bucket_dns: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<Domains>,
}

/// Externally reachable addresses advertised by the tenant.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Domains {
    /// Server URLs or host names; the first entry becomes the server URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub minio: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,
}
