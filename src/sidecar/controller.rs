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

use super::{ConfigurationSnafu, Error, MissingRootCredentialsSnafu, WriteConfigSnafu};
use crate::configuration::{self, References};
use crate::settings::Settings;
use crate::types::v2::tenant::Tenant;
use crate::utils::fs::write_atomically;
use k8s_openapi::api::core::v1 as corev1;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Resource, ResourceExt};
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Resource versions of the objects the last regeneration read, keyed by name.
/// `None` marks a referenced object that did not exist at the time.
#[derive(Debug, Default)]
struct Registry {
    secrets: BTreeMap<String, Option<String>>,
    config_maps: BTreeMap<String, Option<String>>,
}

struct State {
    tenant: Tenant,
    registry: Registry,
    ready: bool,
    hash: Option<String>,
}

/// Keeps the configuration file in sync with the tenant and the objects it references.
///
/// All regenerations and registry updates happen under one lock, so the registry
/// always describes the file on disk.
pub struct Controller {
    settings: Settings,
    namespace: String,
    tenant_name: String,
    secrets: Store<corev1::Secret>,
    config_maps: Store<corev1::ConfigMap>,
    state: Mutex<State>,
}

fn collect<K>(store: &Store<K>, names: &BTreeSet<String>, namespace: &str) -> BTreeMap<String, K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    names
        .iter()
        .filter_map(|name| {
            store
                .get(&ObjectRef::new(name).within(namespace))
                .map(|obj| (name.clone(), obj.as_ref().clone()))
        })
        .collect()
}

fn versions<K: Resource>(
    kind: &str,
    names: &BTreeSet<String>,
    found: &BTreeMap<String, K>,
) -> BTreeMap<String, Option<String>> {
    names
        .iter()
        .map(|name| {
            let version = found.get(name).and_then(|obj| obj.meta().resource_version.clone());
            if version.is_none() {
                warn!(kind, name = %name, "referenced object not found, skipping its variables");
            }
            (name.clone(), version)
        })
        .collect()
}

fn current_version<K>(store: &Store<K>, name: &str, namespace: &str) -> Option<String>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    store
        .get(&ObjectRef::new(name).within(namespace))
        .and_then(|obj| obj.meta().resource_version.clone())
}

impl Controller {
    pub fn new(
        settings: Settings,
        namespace: String,
        mut tenant: Tenant,
        secrets: Store<corev1::Secret>,
        config_maps: Store<corev1::ConfigMap>,
    ) -> Self {
        tenant.ensure_defaults();
        Self {
            settings,
            namespace,
            tenant_name: tenant.name(),
            secrets,
            config_maps,
            state: Mutex::new(State {
                tenant,
                registry: Registry::default(),
                ready: false,
                hash: None,
            }),
        }
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }

    /// SHA-256 of the last written file, `None` until the first write.
    pub async fn current_hash(&self) -> Option<String> {
        self.state.lock().await.hash.clone()
    }

    pub async fn regenerate(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        self.regenerate_locked(&mut state).await
    }

    async fn regenerate_locked(&self, state: &mut State) -> Result<(), Error> {
        let refs = References::of(&state.tenant);
        let secrets = collect(&self.secrets, &refs.secrets, &self.namespace);
        let config_maps = collect(&self.config_maps, &refs.config_maps, &self.namespace);

        state.registry = Registry {
            secrets: versions("Secret", &refs.secrets, &secrets),
            config_maps: versions("ConfigMap", &refs.config_maps, &config_maps),
        };

        let config = configuration::generate_config(
            &state.tenant,
            &config_maps,
            &secrets,
            &self.settings.cluster_domain,
        )
        .context(ConfigurationSnafu)?;

        if !config.has_root_credentials() {
            error!(
                tenant = %self.tenant_name,
                root_user = config.root_user_present,
                root_password = config.root_password_present,
                "Missing root credentials"
            );
            return MissingRootCredentialsSnafu {
                tenant: self.tenant_name.clone(),
            }
            .fail();
        }

        write_atomically(&self.settings.config_path, config.content.as_bytes())
            .await
            .context(WriteConfigSnafu {
                path: self.settings.config_path.clone(),
            })?;

        let hash = config.hash();
        info!(
            tenant = %self.tenant_name,
            path = %self.settings.config_path.display(),
            %hash,
            "configuration written"
        );
        state.hash = Some(hash);
        state.ready = true;

        Ok(())
    }

    pub async fn on_tenant(&self, mut tenant: Tenant) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if tenant.resource_version() == state.tenant.resource_version() {
            return Ok(());
        }

        debug!(tenant = %self.tenant_name, version = ?tenant.resource_version(), "tenant changed");
        tenant.ensure_defaults();
        state.tenant = tenant;

        if !state.ready {
            return Ok(());
        }
        self.regenerate_locked(&mut state).await
    }

    pub async fn on_secret(&self, secret: &corev1::Secret) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let seen = state.registry.secrets.get(&secret.name_any());
        if !state.ready || !changed(seen, secret.resource_version()) {
            return Ok(());
        }

        debug!(tenant = %self.tenant_name, secret = %secret.name_any(), "referenced secret changed");
        self.regenerate_locked(&mut state).await
    }

    pub async fn on_config_map(&self, config_map: &corev1::ConfigMap) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let seen = state.registry.config_maps.get(&config_map.name_any());
        if !state.ready || !changed(seen, config_map.resource_version()) {
            return Ok(());
        }

        debug!(
            tenant = %self.tenant_name,
            config_map = %config_map.name_any(),
            "referenced configmap changed"
        );
        self.regenerate_locked(&mut state).await
    }

    /// Regenerates when the caches disagree with the registry, which also catches deletions.
    pub async fn resync(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if !state.ready {
            return Ok(());
        }

        let stale = state
            .registry
            .secrets
            .iter()
            .any(|(name, seen)| current_version(&self.secrets, name, &self.namespace) != *seen)
            || state
                .registry
                .config_maps
                .iter()
                .any(|(name, seen)| current_version(&self.config_maps, name, &self.namespace) != *seen);

        if !stale {
            debug!(tenant = %self.tenant_name, "resync found no drift");
            return Ok(());
        }

        info!(tenant = %self.tenant_name, "resync found drift, regenerating");
        self.regenerate_locked(&mut state).await
    }
}

/// Only registered objects with a new resource version trigger a regeneration.
fn changed(seen: Option<&Option<String>>, current: Option<String>) -> bool {
    matches!(seen, Some(seen) if *seen != current)
}
