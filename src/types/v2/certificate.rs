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

/// A secret holding a TLS key pair for the tenant.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalCertificateReference {
    pub name: String,

    /// Secret type, e.g. `kubernetes.io/tls` or `cert-manager.io/v1`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

impl LocalCertificateReference {
    /// Key names of the public and private halves inside the secret.
    pub fn key_names(&self) -> (&'static str, &'static str) {
        match self.type_.as_deref() {
            Some("kubernetes.io/tls") | Some("cert-manager.io/v1alpha2") | Some("cert-manager.io/v1") => {
                ("tls.crt", "tls.key")
            }
            _ => ("public.crt", "private.key"),
        }
    }
}
