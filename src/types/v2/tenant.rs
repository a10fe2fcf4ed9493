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

mod rbac;
mod services;
mod workloads;

use crate::configuration::seed;
use crate::topology::{self, SetLayout};
use crate::types;
use crate::types::error::{
    DuplicatePoolSnafu, ForbiddenEnvSnafu, InvalidEnvNameSnafu, InvalidPoolSnafu,
    NoNamespaceSnafu, NoPoolsSnafu, PoolTopologySnafu, UnnamedPoolSnafu,
};
use crate::types::v2::certificate::LocalCertificateReference;
use crate::types::v2::features::Features;
use crate::types::v2::k8s;
use crate::types::v2::kes::KesConfig;
use crate::types::v2::pool::Pool;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::{CustomResource, KubeSchema, Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_MINIO_IMAGE: &str = "minio/minio:RELEASE.2025-04-22T22-12-26Z";
pub const DEFAULT_MOUNT_PATH: &str = "/export";
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Name of the in-cluster Service fronting every tenant.
pub const MINIO_SERVICE_NAME: &str = "minio";
pub const MINIO_PORT: i32 = 9000;
pub const CONSOLE_PORT: i32 = 9090;
pub const MINIO_SERVICE_HTTP_PORT: i32 = 80;
pub const MINIO_SERVICE_HTTPS_PORT: i32 = 443;
pub const CONSOLE_SERVICE_HTTP_PORT: i32 = 9090;
pub const CONSOLE_SERVICE_HTTPS_PORT: i32 = 9443;
pub const KES_PORT: i32 = 7373;

/// Where the server container finds its TLS material, including the KES client pair.
pub const MINIO_CERT_PATH: &str = "/tmp/certs";
pub const PROMETHEUS_JOB_NAME: &str = "minio-job";

pub const TENANT_LABEL: &str = "v1.min.io/tenant";
pub const POOL_LABEL: &str = "v1.min.io/pool";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const OPERATOR_NAME: &str = "minio-operator";

/// Variables that may only arrive through the configuration secret.
pub const ROOT_USER_KEYS: [&str; 2] = ["MINIO_ROOT_USER", "MINIO_ACCESS_KEY"];
pub const ROOT_PASSWORD_KEYS: [&str; 2] = ["MINIO_ROOT_PASSWORD", "MINIO_SECRET_KEY"];

pub fn is_root_credential(name: &str) -> bool {
    ROOT_USER_KEYS.contains(&name) || ROOT_PASSWORD_KEYS.contains(&name)
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "minio.min.io",
    version = "v2",
    kind = "Tenant",
    namespaced,
    status = "crate::types::v2::status::Status",
    shortname = "tenant",
    plural = "tenants",
    singular = "tenant",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.currentState"}"#,
    printcolumn = r#"{"name":"Health", "type":"string", "jsonPath":".status.healthStatus"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    #[x_kube(validation = Rule::new("self.size() > 0").message("pools must be configured"))]
    pub pools: Vec<Pool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<k8s::ImagePullPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<corev1::LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_management_policy: Option<k8s::PodManagementPolicy>,

    /// Secret whose `config.env` key holds `export NAME="VALUE"` lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<corev1::LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[x_kube(validation = Rule::new(
        "self.all(e, e.name.matches('^[A-Za-z_][A-Za-z0-9_]*$') && !(e.name in ['MINIO_ROOT_USER', 'MINIO_ACCESS_KEY', 'MINIO_ROOT_PASSWORD', 'MINIO_SECRET_KEY']))"
    ).message("env names must be shell identifiers, and root credentials must be set through the configuration secret"))]
    pub env: Vec<corev1::EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Features>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kes: Option<KesConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_operator: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_auto_cert: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_cert_secret: Vec<LocalCertificateReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_service_account_rbac: Option<bool>,
}

impl Tenant {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    /// Namespace for DNS names; an unset namespace renders as an empty label.
    fn dns_namespace(&self) -> String {
        ResourceExt::namespace(self).unwrap_or_default()
    }

    /// Fills the fields the rest of the operator expects to be present.
    pub fn ensure_defaults(&mut self) {
        let spec = &mut self.spec;

        if spec.image.as_deref().is_none_or(str::is_empty) {
            spec.image = Some(DEFAULT_MINIO_IMAGE.to_owned());
        }

        if spec.image_pull_policy.is_none() {
            spec.image_pull_policy = Some(k8s::ImagePullPolicy::IfNotPresent);
        }

        if spec.mount_path.as_deref().is_none_or(str::is_empty) {
            spec.mount_path = Some(DEFAULT_MOUNT_PATH.to_owned());
        }

        if spec.request_auto_cert.is_none() {
            spec.request_auto_cert = Some(true);
        }

        for (ordinal, pool) in spec.pools.iter_mut().enumerate() {
            if pool.name.is_empty() {
                pool.name = format!("pool-{ordinal}");
            }
        }
    }

    /// Checks the spec against the rules the server enforces at boot and
    /// returns the erasure-set layout of every pool.
    pub fn validate(&self, cluster_domain: &str) -> Result<Vec<SetLayout>, types::error::Error> {
        if self.spec.pools.is_empty() {
            return NoPoolsSnafu.fail();
        }

        if let Some(env) = self.spec.env.iter().find(|e| !seed::is_valid_name(&e.name)) {
            return InvalidEnvNameSnafu {
                name: env.name.clone(),
            }
            .fail();
        }

        if let Some(env) = self.spec.env.iter().find(|e| is_root_credential(&e.name)) {
            return ForbiddenEnvSnafu {
                name: env.name.clone(),
            }
            .fail();
        }

        let mut names = HashSet::with_capacity(self.spec.pools.len());
        let mut layouts = Vec::with_capacity(self.spec.pools.len());

        for (ordinal, pool) in self.spec.pools.iter().enumerate() {
            if pool.name.is_empty() {
                return UnnamedPoolSnafu { ordinal }.fail();
            }

            if !names.insert(pool.name.as_str()) {
                return DuplicatePoolSnafu {
                    name: pool.name.clone(),
                }
                .fail();
            }

            if pool.servers < 1 || pool.volumes_per_server < 1 {
                return InvalidPoolSnafu {
                    pool: pool.name.clone(),
                    reason: format!(
                        "servers ({}) and volumesPerServer ({}) must both be at least 1",
                        pool.servers, pool.volumes_per_server
                    ),
                }
                .fail();
            }

            let layout = topology::resolve(&[self.pool_endpoint(pool, cluster_domain)])
                .context(PoolTopologySnafu {
                    pool: pool.name.clone(),
                })?;
            layouts.push(layout);
        }

        Ok(layouts)
    }

    pub fn auto_cert_enabled(&self) -> bool {
        self.spec.request_auto_cert.unwrap_or(false)
    }

    pub fn tls_enabled(&self) -> bool {
        self.auto_cert_enabled() || !self.spec.external_cert_secret.is_empty()
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls_enabled() { "https" } else { "http" }
    }

    pub fn bucket_dns_enabled(&self) -> bool {
        self.spec.features.as_ref().is_some_and(|f| f.bucket_dns)
    }

    pub fn kes_enabled(&self) -> bool {
        self.spec.kes.is_some()
    }

    pub fn prometheus_operator_enabled(&self) -> bool {
        self.spec.prometheus_operator.unwrap_or(false)
    }

    pub fn minio_domains(&self) -> &[String] {
        self.spec
            .features
            .as_ref()
            .and_then(|f| f.domains.as_ref())
            .map(|d| d.minio.as_slice())
            .unwrap_or_default()
    }

    pub fn console_domain(&self) -> Option<&str> {
        self.spec
            .features
            .as_ref()
            .and_then(|f| f.domains.as_ref())
            .and_then(|d| d.console.as_deref())
            .filter(|d| !d.is_empty())
    }

    pub fn mount_path(&self) -> &str {
        self.spec
            .mount_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_MOUNT_PATH)
    }

    pub fn headless_service_name(&self) -> String {
        format!("{}-hl", self.name())
    }

    pub fn console_service_name(&self) -> String {
        format!("{}-console", self.name())
    }

    pub fn minio_fqdn_service_name(&self, cluster_domain: &str) -> String {
        format!(
            "{MINIO_SERVICE_NAME}.{}.svc.{cluster_domain}",
            self.dns_namespace()
        )
    }

    /// Domain under which per-bucket Services resolve.
    pub fn bucket_base_domain(&self, cluster_domain: &str) -> String {
        format!("{}.svc.{cluster_domain}", self.dns_namespace())
    }

    pub fn minio_service_port(&self) -> i32 {
        if self.tls_enabled() {
            MINIO_SERVICE_HTTPS_PORT
        } else {
            MINIO_SERVICE_HTTP_PORT
        }
    }

    pub fn console_service_port(&self) -> i32 {
        if self.tls_enabled() {
            CONSOLE_SERVICE_HTTPS_PORT
        } else {
            CONSOLE_SERVICE_HTTP_PORT
        }
    }

    /// In-cluster URL of the tenant's S3 endpoint.
    pub fn minio_server_endpoint(&self, cluster_domain: &str) -> String {
        format!(
            "{}://{}:{}",
            self.scheme(),
            self.minio_fqdn_service_name(cluster_domain),
            self.minio_service_port()
        )
    }

    /// Public server URL: the first configured domain, else the in-cluster endpoint.
    pub fn server_url(&self, cluster_domain: &str) -> String {
        match self.minio_domains().first() {
            Some(domain) => self.with_scheme(domain),
            None => self.minio_server_endpoint(cluster_domain),
        }
    }

    pub fn browser_redirect_url(&self) -> Option<String> {
        self.console_domain().map(|domain| self.with_scheme(domain))
    }

    fn with_scheme(&self, domain: &str) -> String {
        if domain.starts_with("http") {
            domain.to_owned()
        } else {
            format!("{}://{domain}", self.scheme())
        }
    }

    pub fn prometheus_config_job_name(&self) -> &'static str {
        PROMETHEUS_JOB_NAME
    }

    pub fn kes_service_endpoint(&self, cluster_domain: &str) -> Option<String> {
        let kes = self.spec.kes.as_ref()?;
        Some(match kes.service_endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => endpoint.to_owned(),
            None => format!(
                "https://{}-kes-hl-svc.{}.svc.{cluster_domain}:{KES_PORT}",
                self.name(),
                self.dns_namespace()
            ),
        })
    }

    /// Ellipses argument naming every drive of `pool`.
    pub fn pool_endpoint(&self, pool: &Pool, cluster_domain: &str) -> String {
        let mut volumes = format!(
            "{}{}",
            self.mount_path().trim_end_matches('/'),
            ellipsis(pool.volumes_per_server)
        );
        if let Some(sub_path) = self
            .spec
            .sub_path
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
        {
            volumes = format!("{volumes}/{sub_path}");
        }

        format!(
            "{}://{}-{}-{}.{}.{}.svc.{cluster_domain}{volumes}",
            self.scheme(),
            self.name(),
            pool.name,
            ellipsis(pool.servers),
            self.headless_service_name(),
            self.dns_namespace(),
        )
    }

    /// Endpoint arguments of all pools, in pool order.
    pub fn endpoint_args(&self, cluster_domain: &str) -> Vec<String> {
        self.spec
            .pools
            .iter()
            .map(|pool| self.pool_endpoint(pool, cluster_domain))
            .collect()
    }

    pub fn uses_crun(&self) -> bool {
        self.spec.pools.iter().any(Pool::uses_crun)
    }

    pub fn drives_total(&self) -> i64 {
        self.spec.pools.iter().map(Pool::drive_count).sum()
    }

    pub fn servers_total(&self) -> i32 {
        self.spec.pools.iter().map(|p| p.servers).sum()
    }

    /// a new owner reference for tenant
    pub fn new_owner_ref(&self) -> metav1::OwnerReference {
        metav1::OwnerReference {
            api_version: Self::api_version(&()).to_string(),
            kind: Self::kind(&()).to_string(),
            name: self.name(),
            uid: self.meta().uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    pub fn common_labels(&self) -> BTreeMap<String, String> {
        [
            (MANAGED_BY_LABEL.to_owned(), OPERATOR_NAME.to_owned()),
            (TENANT_LABEL.to_owned(), self.name()),
        ]
        .into_iter()
        .collect()
    }

    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        [(TENANT_LABEL.to_owned(), self.name())].into_iter().collect()
    }

    pub fn pool_labels(&self, pool: &Pool) -> BTreeMap<String, String> {
        let mut labels = self.common_labels();
        labels.insert(POOL_LABEL.to_owned(), pool.name.clone());
        labels
    }

    pub fn pool_selector_labels(&self, pool: &Pool) -> BTreeMap<String, String> {
        let mut labels = self.selector_labels();
        labels.insert(POOL_LABEL.to_owned(), pool.name.clone());
        labels
    }

    pub fn role_binding_name(&self) -> String {
        format!("{}-role-binding", self.name())
    }

    pub fn role_name(&self) -> String {
        format!("{}-role", self.name())
    }

    pub fn service_account_name(&self) -> String {
        self.spec
            .service_account_name
            .clone()
            .unwrap_or_else(|| format!("{}-sa", self.name()))
    }

    pub fn statefulset_name(&self, pool: &Pool) -> String {
        format!("{}-{}", self.name(), pool.name)
    }

    /// Secret the auto-cert flow stores the server key pair in.
    pub fn tls_secret_name(&self) -> String {
        format!("{}-tls", self.name())
    }
}

fn ellipsis(count: i32) -> String {
    format!("{{0...{}}}", count - 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::v2::features::Domains;

    #[test]
    fn test_ensure_defaults() {
        let mut tenant = crate::tests::create_test_tenant(None, None);
        tenant.spec.pools[0].name.clear();
        tenant.ensure_defaults();

        assert_eq!(tenant.spec.image.as_deref(), Some(DEFAULT_MINIO_IMAGE));
        assert_eq!(tenant.mount_path(), "/export");
        assert!(tenant.tls_enabled());
        assert_eq!(tenant.spec.pools[0].name, "pool-0");
    }

    #[test]
    fn test_pool_endpoint() {
        let tenant = crate::tests::create_test_tenant(None, None);
        let pool = &tenant.spec.pools[0];
        assert_eq!(
            tenant.pool_endpoint(pool, "cluster.local"),
            "https://test-tenant-pool-0-{0...3}.test-tenant-hl.default.svc.cluster.local/export{0...3}"
        );
    }

    #[test]
    fn test_pool_endpoint_with_sub_path_and_plain_http() {
        let mut tenant = crate::tests::create_test_tenant(None, None);
        tenant.spec.request_auto_cert = Some(false);
        tenant.spec.mount_path = Some("/data/".to_string());
        tenant.spec.sub_path = Some("/minio/".to_string());
        let pool = &tenant.spec.pools[0];
        assert_eq!(
            tenant.pool_endpoint(pool, "example.org"),
            "http://test-tenant-pool-0-{0...3}.test-tenant-hl.default.svc.example.org/data{0...3}/minio"
        );
    }

    #[test]
    fn test_server_url_variants() {
        let mut tenant = crate::tests::create_test_tenant(None, None);
        assert_eq!(
            tenant.server_url("cluster.local"),
            "https://minio.default.svc.cluster.local:443"
        );

        tenant.spec.features = Some(Features {
            bucket_dns: false,
            domains: Some(Domains {
                minio: vec!["s3.example.com".to_string()],
                console: Some("http://console.example.com".to_string()),
            }),
        });
        assert_eq!(tenant.server_url("cluster.local"), "https://s3.example.com");
        assert_eq!(
            tenant.browser_redirect_url().as_deref(),
            Some("http://console.example.com")
        );

        tenant.spec.features = Some(Features {
            bucket_dns: false,
            domains: Some(Domains {
                minio: vec!["http://s3.example.com:9000".to_string()],
                console: None,
            }),
        });
        assert_eq!(tenant.server_url("cluster.local"), "http://s3.example.com:9000");
        assert_eq!(tenant.browser_redirect_url(), None);
    }

    #[test]
    fn test_validate_returns_layouts() {
        let tenant = crate::tests::create_test_tenant(None, None);
        let layouts = tenant.validate("cluster.local").unwrap();
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0].set_size, 16);
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let mut tenant = crate::tests::create_test_tenant(None, None);
        tenant.spec.pools[0].servers = 17;
        tenant.spec.pools[0].volumes_per_server = 1;
        assert!(matches!(
            tenant.validate("cluster.local"),
            Err(types::error::Error::PoolTopology { .. })
        ));

        tenant.spec.pools[0].servers = 0;
        assert!(matches!(
            tenant.validate("cluster.local"),
            Err(types::error::Error::InvalidPool { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_pools() {
        let mut tenant = crate::tests::create_test_tenant(None, None);
        let pool = tenant.spec.pools[0].clone();
        tenant.spec.pools.push(pool);
        assert!(matches!(
            tenant.validate("cluster.local"),
            Err(types::error::Error::DuplicatePool { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_root_credentials_in_env() {
        let mut tenant = crate::tests::create_test_tenant(None, None);
        tenant.spec.env.push(corev1::EnvVar {
            name: "MINIO_ROOT_PASSWORD".to_string(),
            value: Some("nope".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            tenant.validate("cluster.local"),
            Err(types::error::Error::ForbiddenEnv { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_invalid_env_names() {
        for name in ["X=\"1\"\nexport MINIO_ROOT_USER", "1ABC", "WITH SPACE", ""] {
            let mut tenant = crate::tests::create_test_tenant(None, None);
            tenant.spec.env.push(corev1::EnvVar {
                name: name.to_string(),
                value: Some("attacker".to_string()),
                ..Default::default()
            });
            assert!(
                matches!(
                    tenant.validate("cluster.local"),
                    Err(types::error::Error::InvalidEnvName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_kes_endpoint() {
        let mut tenant = crate::tests::create_test_tenant(None, None);
        assert_eq!(tenant.kes_service_endpoint("cluster.local"), None);

        tenant.spec.kes = Some(KesConfig {
            key_name: "my-key".to_string(),
            ..Default::default()
        });
        assert_eq!(
            tenant.kes_service_endpoint("cluster.local").as_deref(),
            Some("https://test-tenant-kes-hl-svc.default.svc.cluster.local:7373")
        );
    }

    #[test]
    fn test_bucket_base_domain() {
        let tenant = crate::tests::create_test_tenant(None, None);
        assert_eq!(
            tenant.bucket_base_domain("cluster.local"),
            "default.svc.cluster.local"
        );
    }
}
