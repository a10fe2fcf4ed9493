//  Copyright 2025 MinIO, Inc.
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//      http:www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use std::collections::BTreeMap;

use crate::configuration::CONFIG_ENV_KEY;
use crate::types::v2::pool::Pool;
use crate::types::v2::tenant::{Tenant, TenantSpec};

pub const SEED_SECRET_NAME: &str = "test-tenant-env-configuration";

fn test_pool() -> Pool {
    Pool {
        name: "pool-0".to_string(),
        servers: 4,
        volumes_per_server: 4,
        ..Default::default()
    }
}

// Helper function to create a test tenant (available to submodule tests via crate::tests)
pub fn create_test_tenant(
    service_account_name: Option<String>,
    create_service_account_rbac: Option<bool>,
) -> Tenant {
    Tenant {
        metadata: metav1::ObjectMeta {
            name: Some("test-tenant".to_string()),
            namespace: Some("default".to_string()),
            uid: Some("test-uid-123".to_string()),
            ..Default::default()
        },
        spec: TenantSpec {
            pools: vec![test_pool()],
            request_auto_cert: Some(true),
            service_account_name,
            create_service_account_rbac,
            ..Default::default()
        },
        status: None,
    }
}

/// A tenant pointing at [`SEED_SECRET_NAME`], before defaults are applied.
pub fn seeded_tenant(name: Option<&str>, namespace: Option<&str>) -> Tenant {
    Tenant {
        metadata: metav1::ObjectMeta {
            name: Some(name.unwrap_or("test-tenant").to_string()),
            namespace: namespace.map(str::to_string),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: TenantSpec {
            pools: vec![test_pool()],
            configuration: Some(corev1::LocalObjectReference {
                name: SEED_SECRET_NAME.to_string(),
            }),
            ..Default::default()
        },
        status: None,
    }
}

pub fn secret(name: &str, data: &[(&str, &str)]) -> corev1::Secret {
    corev1::Secret {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Secrets map holding only the seed secret with `content` under `config.env`.
pub fn seed_secret(content: &str) -> BTreeMap<String, corev1::Secret> {
    [(
        SEED_SECRET_NAME.to_string(),
        secret(SEED_SECRET_NAME, &[(CONFIG_ENV_KEY, content)]),
    )]
    .into_iter()
    .collect()
}
