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

//! One-shot configuration writer run as an init container, before the sidecar starts.

use crate::configuration::{self, GeneratedConfig, References, Seed};
use crate::settings::Settings;
use crate::types::v2::tenant::Tenant;
use crate::utils;
use crate::utils::fs::write_atomically;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1 as corev1;
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const MINIO_ARGS: &str = "MINIO_ARGS";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to build kubernetes client: {}", source))]
    Client { source: utils::client::Error },

    #[snafu(display("failed to get tenant '{}/{}': {}", namespace, name, source))]
    GetTenant {
        namespace: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("tenant '{}/{}' not found", namespace, name))]
    TenantNotFound { namespace: String, name: String },

    #[snafu(display("failed to get {} '{}': {}", kind, name, source))]
    Fetch {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("failed to read '{}': {}", path.display(), source))]
    ReadTmpConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to generate configuration: {}", source))]
    Configuration { source: configuration::Error },

    #[snafu(display("tenant '{}' has no root credentials in its configuration", tenant))]
    MissingRootCredentials { tenant: String },

    #[snafu(display("failed to write configuration to '{}': {}", path.display(), source))]
    WriteConfig {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A configuration file left by an earlier boot stage.
#[derive(Clone, Debug, Default)]
pub struct TmpConfig {
    pub seed: Seed,
    /// File content without any `MINIO_ARGS` line.
    pub content: String,
}

impl TmpConfig {
    pub fn root_user_present(&self) -> bool {
        self.seed.root_user_present()
    }

    pub fn root_password_present(&self) -> bool {
        self.seed.root_password_present()
    }
}

pub async fn read_tmp_config(path: &Path) -> Result<TmpConfig, Error> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .context(ReadTmpConfigSnafu { path })?;

    let content = strip_minio_args(&raw);
    let seed = Seed::parse(&content);
    debug!(
        path = %path.display(),
        root_user = seed.root_user_present(),
        root_password = seed.root_password_present(),
        "read temporary configuration"
    );

    Ok(TmpConfig { seed, content })
}

/// Drops user supplied server arguments; those are always derived from the tenant.
fn strip_minio_args(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
            !line
                .strip_prefix(MINIO_ARGS)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        })
        .map(|line| format!("{line}\n"))
        .collect()
}

pub async fn run(
    settings: Settings,
    tenant_name: String,
    tmp_config: Option<PathBuf>,
) -> Result<(), Error> {
    let client = utils::client::client().await.context(ClientSnafu)?;
    let namespace = utils::client::namespace().await;
    info!(%namespace, tenant = %tenant_name, "validating tenant configuration");

    let mut tenant = Api::<Tenant>::namespaced(client.clone(), &namespace)
        .get_opt(&tenant_name)
        .await
        .context(GetTenantSnafu {
            namespace: namespace.clone(),
            name: tenant_name.clone(),
        })?
        .context(TenantNotFoundSnafu {
            namespace: namespace.clone(),
            name: tenant_name.clone(),
        })?;
    tenant.ensure_defaults();

    let refs = References::of(&tenant);
    let secrets = fetch_all::<corev1::Secret>(&client, &namespace, &refs.secrets).await?;
    let config_maps = fetch_all::<corev1::ConfigMap>(&client, &namespace, &refs.config_maps).await?;

    let config = match tmp_config {
        Some(path) if tenant.spec.configuration.is_none() => {
            let tmp = read_tmp_config(&path).await?;
            configuration::compose(
                &tenant,
                &tmp.seed,
                &config_maps,
                &secrets,
                &settings.cluster_domain,
            )
        }
        tmp => {
            if let Some(path) = tmp {
                debug!(path = %path.display(), "tenant has a configuration secret, ignoring temporary file");
            }
            configuration::generate_config(&tenant, &config_maps, &secrets, &settings.cluster_domain)
        }
    }
    .context(ConfigurationSnafu)?;

    write_config(&tenant_name, &config, &settings.config_path).await
}

/// Writes `config` to `path` once the root-credential gate passes.
async fn write_config(tenant: &str, config: &GeneratedConfig, path: &Path) -> Result<(), Error> {
    if !config.has_root_credentials() {
        error!(
            %tenant,
            root_user = config.root_user_present,
            root_password = config.root_password_present,
            "Missing root credentials"
        );
        return MissingRootCredentialsSnafu { tenant }.fail();
    }

    write_atomically(path, config.content.as_bytes())
        .await
        .context(WriteConfigSnafu { path })?;

    info!(%tenant, path = %path.display(), hash = %config.hash(), "configuration written");
    Ok(())
}

async fn fetch_all<K>(
    client: &kube::Client,
    namespace: &str,
    names: &BTreeSet<String>,
) -> Result<BTreeMap<String, K>, Error>
where
    K: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let kind = K::kind(&Default::default()).into_owned();

    let mut objects = BTreeMap::new();
    for name in names {
        match api.get_opt(name).await.context(FetchSnafu {
            kind: kind.clone(),
            name: name.clone(),
        })? {
            Some(object) => {
                objects.insert(name.clone(), object);
            }
            None => warn!(%kind, %name, "referenced object not found"),
        }
    }

    Ok(objects)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_minio_args() {
        let content = "export MINIO_ROOT_USER=minio\n\
                       export MINIO_ARGS=\"http://elsewhere/data{1...4}\"\n\
                       MINIO_ARGS = x\n\
                       export MINIO_ARGS_EXTRA=kept\n";

        assert_eq!(
            strip_minio_args(content),
            "export MINIO_ROOT_USER=minio\nexport MINIO_ARGS_EXTRA=kept\n"
        );
    }

    #[tokio::test]
    async fn test_read_tmp_config_reports_root_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.env");
        tokio::fs::write(
            &path,
            "export MINIO_ROOT_USER=minio\nexport MINIO_ARGS=\"x\"\nexport MINIO_BROWSER=on\n",
        )
        .await
        .unwrap();

        let tmp = read_tmp_config(&path).await.unwrap();
        assert!(tmp.root_user_present());
        assert!(!tmp.root_password_present());
        assert_eq!(tmp.seed.get("MINIO_BROWSER"), Some("on"));
        assert!(tmp.seed.get(MINIO_ARGS).is_none());
        assert!(!tmp.content.contains(MINIO_ARGS));
    }

    #[tokio::test]
    async fn test_read_tmp_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_tmp_config(&dir.path().join("missing")).await;
        assert!(matches!(result, Err(Error::ReadTmpConfig { .. })));
    }

    #[tokio::test]
    async fn test_write_config_requires_root_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.env");
        let config = GeneratedConfig {
            content: "export MINIO_ROOT_USER=\"minio\"\n".to_string(),
            root_user_present: true,
            root_password_present: false,
        };

        let result = write_config("tenant", &config, &path).await;
        assert!(matches!(result, Err(Error::MissingRootCredentials { .. })));
        assert!(!path.exists());

        let config = GeneratedConfig {
            root_password_present: true,
            ..config
        };
        write_config("tenant", &config, &path).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            config.content
        );
    }

    #[tokio::test]
    async fn test_compose_with_tmp_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.env");
        tokio::fs::write(
            &path,
            "export MINIO_ROOT_USER=minio\nexport MINIO_ROOT_PASSWORD=minio123\n",
        )
        .await
        .unwrap();

        let mut tenant = crate::tests::create_test_tenant(None, None);
        tenant.spec.configuration = None;
        tenant.ensure_defaults();

        let tmp = read_tmp_config(&path).await.unwrap();
        let config = configuration::compose(
            &tenant,
            &tmp.seed,
            &BTreeMap::new(),
            &BTreeMap::new(),
            "cluster.local",
        )
        .unwrap();

        assert!(config.has_root_credentials());
        assert!(config.content.contains("export MINIO_ROOT_PASSWORD=\"minio123\"\n"));
        assert!(config.content.contains("export MINIO_ARGS="));
    }
}
