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

//! Builds the env file the storage server loads through `MINIO_CONFIG_ENV_FILE`.
//!
//! Three layers are merged, highest precedence first: the seed secret's
//! `config.env`, `spec.env`, then the variables the operator derives from the
//! tenant. The output is sorted by name so identical inputs produce identical bytes.

pub mod env;
pub mod seed;

pub use env::{EnvValue, References};
pub use seed::Seed;

use crate::settings::WEBHOOK_PORT;
use crate::topology;
use crate::types::v2::tenant::{MINIO_CERT_PATH, Tenant};
use k8s_openapi::api::core::v1 as corev1;
use sha2::{Digest, Sha256};
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Key inside the seed secret that holds the export lines.
pub const CONFIG_ENV_KEY: &str = "config.env";
pub const MINISIGN_PUBKEY: &str = "RWTx5Zr1tiHQLwG9keckT0c45M3AGeHD6IvimQHpyRywVWGbP1aVSGav";
pub const STORAGE_CLASS_STANDARD: &str = "MINIO_STORAGE_CLASS_STANDARD";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("tenant '{}' does not reference a configuration secret", tenant))]
    NoConfigurationRef { tenant: String },

    #[snafu(display("configuration secret '{}' not found", name))]
    MissingSeedSecret { name: String },

    #[snafu(display("pool '{}' cannot be laid out: {}", pool, source))]
    Topology {
        pool: String,
        source: topology::Error,
    },
}

/// Rendered env file plus the root-credential gate derived from the seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedConfig {
    pub content: String,
    pub root_user_present: bool,
    pub root_password_present: bool,
}

impl GeneratedConfig {
    pub fn has_root_credentials(&self) -> bool {
        self.root_user_present && self.root_password_present
    }

    /// Lowercase hex SHA-256 of the file content.
    pub fn hash(&self) -> String {
        content_hash(&self.content)
    }
}

pub fn content_hash(content: &str) -> String {
    Sha256::digest(content.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Looks up the seed secret named by `spec.configuration` in `secrets`.
pub fn seed_for(
    tenant: &Tenant,
    secrets: &BTreeMap<String, corev1::Secret>,
) -> Result<Seed, Error> {
    let reference = tenant
        .spec
        .configuration
        .as_ref()
        .filter(|r| !r.name.is_empty())
        .context(NoConfigurationRefSnafu {
            tenant: tenant.name(),
        })?;

    let secret = secrets
        .get(&reference.name)
        .context(MissingSeedSecretSnafu {
            name: reference.name.clone(),
        })?;

    Ok(env::secret_value(secret, CONFIG_ENV_KEY)
        .map(|content| Seed::parse(&content))
        .unwrap_or_default())
}

/// Renders the env file for `tenant`.
///
/// `config_maps` and `secrets` must hold every object named by [`References::of`];
/// a missing seed secret is an error, any other missing object only drops the
/// variable that points at it.
pub fn generate_config(
    tenant: &Tenant,
    config_maps: &BTreeMap<String, corev1::ConfigMap>,
    secrets: &BTreeMap<String, corev1::Secret>,
    cluster_domain: &str,
) -> Result<GeneratedConfig, Error> {
    let seed = seed_for(tenant, secrets)?;
    compose(tenant, &seed, config_maps, secrets, cluster_domain)
}

/// Same as [`generate_config`] with an already parsed seed.
pub fn compose(
    tenant: &Tenant,
    seed: &Seed,
    config_maps: &BTreeMap<String, corev1::ConfigMap>,
    secrets: &BTreeMap<String, corev1::Secret>,
    cluster_domain: &str,
) -> Result<GeneratedConfig, Error> {
    let layouts = pool_layouts(tenant, cluster_domain)?;
    check_storage_class(tenant, seed, &layouts);

    let mut vars: BTreeMap<String, EnvValue> = builtin_env(tenant, cluster_domain)
        .into_iter()
        .map(|(name, value)| (name, EnvValue::Literal(value)))
        .collect();
    vars.extend(env::tenant_env(tenant));
    vars.extend(
        seed.vars
            .iter()
            .map(|(name, value)| (name.clone(), EnvValue::Literal(value.clone()))),
    );

    let mut content = String::new();
    for (name, value) in &vars {
        match value.resolve(config_maps, secrets) {
            Some(resolved) => content.push_str(&env::export_line(name, &resolved)),
            None => warn!(
                tenant = %tenant.name(),
                name = %name,
                reference = ?value,
                "skipping variable with unresolved reference"
            ),
        }
    }

    debug!(tenant = %tenant.name(), vars = vars.len(), "generated configuration");

    Ok(GeneratedConfig {
        content,
        root_user_present: seed.root_user_present(),
        root_password_present: seed.root_password_present(),
    })
}

fn pool_layouts(
    tenant: &Tenant,
    cluster_domain: &str,
) -> Result<Vec<(String, topology::SetLayout)>, Error> {
    tenant
        .spec
        .pools
        .iter()
        .map(|pool| {
            topology::resolve(&[tenant.pool_endpoint(pool, cluster_domain)])
                .map(|layout| (pool.name.clone(), layout))
                .context(TopologySnafu {
                    pool: pool.name.clone(),
                })
        })
        .collect()
}

/// Warns when the requested standard parity is outside what a pool's sets support.
fn check_storage_class(tenant: &Tenant, seed: &Seed, layouts: &[(String, topology::SetLayout)]) {
    let Some(storage_class) = seed.get(STORAGE_CLASS_STANDARD) else {
        return;
    };
    if !storage_class.starts_with("EC:") {
        return;
    }

    for (pool, layout) in layouts {
        if !layout.parity_list().iter().any(|p| p == storage_class) {
            warn!(
                tenant = %tenant.name(),
                pool = %pool,
                storage_class,
                set_size = layout.set_size,
                "storage class parity is not supported by the pool's erasure sets"
            );
        }
    }
}

/// Variables derived from the tenant spec.
fn builtin_env(tenant: &Tenant, cluster_domain: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    let mut set = |name: &str, value: String| {
        env.insert(name.to_owned(), value);
    };

    set("MINIO_UPDATE", "on".to_owned());
    set("MINIO_UPDATE_MINISIGN_PUBKEY", MINISIGN_PUBKEY.to_owned());
    set(
        "MINIO_PROMETHEUS_JOB_ID",
        tenant.prometheus_config_job_name().to_owned(),
    );

    if tenant.uses_crun() {
        set("HOME", "/".to_owned());
    }

    let mut domains = Vec::new();
    if tenant.bucket_dns_enabled() {
        domains.push(tenant.bucket_base_domain(cluster_domain));
        set(
            "MINIO_DNS_WEBHOOK_ENDPOINT",
            format!(
                "http://127.0.0.1:{WEBHOOK_PORT}/webhook/v1/bucketsrv/{}/{}",
                tenant.metadata.namespace.as_deref().unwrap_or_default(),
                tenant.name()
            ),
        );
    }
    domains.extend(tenant.minio_domains().iter().map(|d| domain_host(d)));
    if !domains.is_empty() {
        set("MINIO_DOMAIN", domains.join(","));
    }

    set("MINIO_SERVER_URL", tenant.server_url(cluster_domain));
    if let Some(url) = tenant.browser_redirect_url() {
        set("MINIO_BROWSER_REDIRECT_URL", url);
    }

    if let (Some(kes), Some(endpoint)) = (&tenant.spec.kes, tenant.kes_service_endpoint(cluster_domain)) {
        let ca = format!("{MINIO_CERT_PATH}/CAs/kes.crt");
        set("MINIO_KMS_KES_ENDPOINT", endpoint);
        set("MINIO_KMS_KES_CERT_FILE", format!("{MINIO_CERT_PATH}/client.crt"));
        set("MINIO_KMS_KES_KEY_FILE", format!("{MINIO_CERT_PATH}/client.key"));
        set("MINIO_KMS_KES_CA_PATH", ca.clone());
        set("MINIO_KMS_KES_CAPATH", ca);
        set("MINIO_KMS_KES_KEY_NAME", kes.key_name.clone());
        set("MINIO_KMS_KES_ENCLAVE", kes.enclave.clone().unwrap_or_default());
    }

    set("MINIO_ARGS", tenant.endpoint_args(cluster_domain).join(" "));

    env
}

/// Host part of a configured domain, which may be given as a URL.
fn domain_host(domain: &str) -> String {
    if domain.contains("://")
        && let Ok(uri) = domain.parse::<http::Uri>()
        && let Some(host) = uri.host()
    {
        return host.to_owned();
    }
    domain.to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{seed_secret, seeded_tenant};
    use crate::types::v2::features::{Domains, Features};
    use crate::types::v2::kes::KesConfig;

    const SEED: &str = "export MINIO_ROOT_USER=\"minio\"\n\
                        export MINIO_ROOT_PASSWORD=\"minio123\"\n\
                        export MINIO_STORAGE_CLASS_STANDARD=\"EC:2\"\n\
                        export MINIO_BROWSER=\"on\"\n";

    fn test_env(name: &str, value: &str) -> corev1::EnvVar {
        corev1::EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_tenant_with_user_env() {
        let mut tenant = seeded_tenant(None, None);
        tenant.spec.pools.clear();
        tenant.spec.env = vec![test_env("TEST", "value")];
        tenant.ensure_defaults();
        let secrets = seed_secret(SEED);

        let config = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();

        assert_eq!(
            config.content,
            "export MINIO_ARGS=\"\"\n\
             export MINIO_BROWSER=\"on\"\n\
             export MINIO_PROMETHEUS_JOB_ID=\"minio-job\"\n\
             export MINIO_ROOT_PASSWORD=\"minio123\"\n\
             export MINIO_ROOT_USER=\"minio\"\n\
             export MINIO_SERVER_URL=\"https://minio..svc.cluster.local:443\"\n\
             export MINIO_STORAGE_CLASS_STANDARD=\"EC:2\"\n\
             export MINIO_UPDATE=\"on\"\n\
             export MINIO_UPDATE_MINISIGN_PUBKEY=\"RWTx5Zr1tiHQLwG9keckT0c45M3AGeHD6IvimQHpyRywVWGbP1aVSGav\"\n\
             export TEST=\"value\"\n"
        );
        assert!(config.has_root_credentials());
    }

    #[test]
    fn test_one_pool_tenant_with_console_domain() {
        let mut tenant = seeded_tenant(Some("tenant"), Some("ns-x"));
        tenant.spec.features = Some(Features {
            bucket_dns: false,
            domains: Some(Domains {
                minio: vec![],
                console: Some("http://console.minio".to_string()),
            }),
        });
        tenant.ensure_defaults();
        let secrets = seed_secret(SEED);

        let config = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();

        let lines: Vec<_> = config.content.lines().collect();
        assert!(lines.contains(
            &"export MINIO_ARGS=\"https://tenant-pool-0-{0...3}.tenant-hl.ns-x.svc.cluster.local/export{0...3}\""
        ));
        assert!(lines.contains(&"export MINIO_SERVER_URL=\"https://minio.ns-x.svc.cluster.local:443\""));
        assert!(lines.contains(&"export MINIO_BROWSER_REDIRECT_URL=\"http://console.minio\""));
    }

    #[test]
    fn test_seed_wins_over_env_and_builtins() {
        let mut tenant = seeded_tenant(None, None);
        tenant.spec.env = vec![
            test_env("MINIO_BROWSER", "off"),
            test_env("MINIO_UPDATE", "off"),
            test_env("MINIO_SERVER_URL", "http://from-env"),
        ];
        tenant.ensure_defaults();
        let secrets = seed_secret(&format!("{SEED}export MINIO_UPDATE=\"seeded\"\n"));

        let config = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();

        assert!(config.content.contains("export MINIO_BROWSER=\"on\"\n"));
        assert!(config.content.contains("export MINIO_UPDATE=\"seeded\"\n"));
        assert!(config.content.contains("export MINIO_SERVER_URL=\"http://from-env\"\n"));
        assert_eq!(config.content.matches("MINIO_UPDATE=").count(), 1);
    }

    #[test]
    fn test_env_names_cannot_inject_lines() {
        let mut tenant = seeded_tenant(None, None);
        tenant.spec.env = vec![
            test_env("X=\"1\"\nexport MINIO_ROOT_USER", "attacker"),
            test_env("BAD NAME", "attacker"),
            test_env("GOOD_NAME", "kept"),
        ];
        tenant.ensure_defaults();
        let secrets = seed_secret(SEED);

        let config = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();

        assert!(!config.content.contains("attacker"));
        assert_eq!(config.content.matches("MINIO_ROOT_USER=").count(), 1);
        assert!(config.content.contains("export MINIO_ROOT_USER=\"minio\"\n"));
        assert!(config.content.contains("export GOOD_NAME=\"kept\"\n"));
        assert!(config.content.lines().all(|line| line.starts_with("export ")));
    }

    #[test]
    fn test_output_is_sorted_and_deterministic() {
        let mut tenant = seeded_tenant(None, None);
        tenant.spec.env = vec![test_env("ZZZ", "1"), test_env("AAA", "2")];
        tenant.ensure_defaults();
        let secrets = seed_secret(SEED);

        let first = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();
        let second = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash(), second.hash());
        assert_eq!(first.hash().len(), 64);

        let names: Vec<_> = first
            .content
            .lines()
            .map(|l| l.trim_start_matches("export ").split('=').next().unwrap())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(first.content.ends_with("\"\n"));
    }

    #[test]
    fn test_missing_seed_secret_is_an_error() {
        let mut tenant = seeded_tenant(None, None);
        tenant.ensure_defaults();
        let err = generate_config(&tenant, &BTreeMap::new(), &BTreeMap::new(), "cluster.local")
            .unwrap_err();
        assert!(matches!(err, Error::MissingSeedSecret { ref name } if name == "test-tenant-env-configuration"));

        tenant.spec.configuration = None;
        let err = generate_config(&tenant, &BTreeMap::new(), &BTreeMap::new(), "cluster.local")
            .unwrap_err();
        assert!(matches!(err, Error::NoConfigurationRef { .. }));
    }

    #[test]
    fn test_root_gate_follows_seed() {
        let mut tenant = seeded_tenant(None, None);
        tenant.ensure_defaults();
        let secrets = seed_secret("export MINIO_ROOT_USER=\"minio\"\n");

        let config = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();
        assert!(config.root_user_present);
        assert!(!config.root_password_present);
        assert!(!config.has_root_credentials());
    }

    #[test]
    fn test_unresolved_reference_is_skipped() {
        let mut tenant = seeded_tenant(None, None);
        tenant.spec.env = vec![corev1::EnvVar {
            name: "FROM_SECRET".to_string(),
            value_from: Some(corev1::EnvVarSource {
                secret_key_ref: Some(corev1::SecretKeySelector {
                    name: "not-there".to_string(),
                    key: "k".to_string(),
                    optional: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }];
        tenant.ensure_defaults();
        let secrets = seed_secret(SEED);

        let config = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();
        assert!(!config.content.contains("FROM_SECRET"));
    }

    #[test]
    fn test_bucket_dns_domains_and_webhook() {
        let mut tenant = seeded_tenant(Some("tenant"), Some("ns-x"));
        tenant.spec.features = Some(Features {
            bucket_dns: true,
            domains: Some(Domains {
                minio: vec!["https://s3.example.com:9000".to_string(), "s3.internal".to_string()],
                console: None,
            }),
        });
        tenant.ensure_defaults();
        let secrets = seed_secret(SEED);

        let config = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap();
        assert!(config.content.contains(
            "export MINIO_DNS_WEBHOOK_ENDPOINT=\"http://127.0.0.1:4222/webhook/v1/bucketsrv/ns-x/tenant\"\n"
        ));
        assert!(config.content.contains(
            "export MINIO_DOMAIN=\"ns-x.svc.cluster.local,s3.example.com,s3.internal\"\n"
        ));
        assert!(config.content.contains("export MINIO_SERVER_URL=\"https://s3.example.com:9000\"\n"));
    }

    #[test]
    fn test_kes_and_crun_builtins() {
        let mut tenant = seeded_tenant(Some("tenant"), Some("ns-x"));
        tenant.spec.kes = Some(KesConfig {
            key_name: "my-key".to_string(),
            ..Default::default()
        });
        tenant.spec.pools[0].runtime_class_name = Some("crun".to_string());
        tenant.ensure_defaults();

        let env = builtin_env(&tenant, "cluster.local");
        assert_eq!(env["HOME"], "/");
        assert_eq!(
            env["MINIO_KMS_KES_ENDPOINT"],
            "https://tenant-kes-hl-svc.ns-x.svc.cluster.local:7373"
        );
        assert_eq!(env["MINIO_KMS_KES_CERT_FILE"], "/tmp/certs/client.crt");
        assert_eq!(env["MINIO_KMS_KES_KEY_FILE"], "/tmp/certs/client.key");
        assert_eq!(env["MINIO_KMS_KES_CA_PATH"], "/tmp/certs/CAs/kes.crt");
        assert_eq!(env["MINIO_KMS_KES_CAPATH"], "/tmp/certs/CAs/kes.crt");
        assert_eq!(env["MINIO_KMS_KES_KEY_NAME"], "my-key");
        assert_eq!(env["MINIO_KMS_KES_ENCLAVE"], "");
        assert_eq!(env.keys().filter(|k| k.starts_with("MINIO_KMS_KES_")).count(), 7);
    }

    #[test]
    fn test_invalid_pool_geometry_is_an_error() {
        let mut tenant = seeded_tenant(None, None);
        tenant.spec.pools[0].servers = 17;
        tenant.spec.pools[0].volumes_per_server = 1;
        tenant.ensure_defaults();
        let secrets = seed_secret(SEED);

        let err = generate_config(&tenant, &BTreeMap::new(), &secrets, "cluster.local").unwrap_err();
        assert!(matches!(err, Error::Topology { ref pool, .. } if pool == "pool-0"));
    }

    #[test]
    fn test_domain_host() {
        assert_eq!(domain_host("https://s3.example.com:9000"), "s3.example.com");
        assert_eq!(domain_host("s3.example.com"), "s3.example.com");
    }
}
