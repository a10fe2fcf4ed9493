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

use crate::context::Context;
use crate::reconcile::{error_policy, reconcile_tenant};
use crate::settings::Settings;
use crate::types::v2::tenant::Tenant;
use futures::StreamExt;
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::Api;
use kube::CustomResourceExt;
use kube::runtime::{Controller, watcher};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

pub mod configuration;
mod context;
pub mod reconcile;
pub mod settings;
pub mod sidecar;
pub mod topology;
pub mod types;
pub mod utils;
pub mod validator;

#[cfg(test)]
mod tests;

pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let client = utils::client::client().await?;
    let tenant_client = Api::<Tenant>::all(client.clone());

    info!(
        cluster_domain = %settings.cluster_domain,
        operator_image = %settings.operator_image,
        "starting tenant controller"
    );

    let context = Context::new(client.clone(), settings);
    Controller::new(tenant_client, watcher::Config::default())
        .owns(
            Api::<corev1::Service>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<corev1::ServiceAccount>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<rbacv1::Role>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<rbacv1::RoleBinding>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<appsv1::StatefulSet>::all(client.clone()),
            watcher::Config::default(),
        )
        .shutdown_on_signal()
        .run(reconcile_tenant, error_policy, Arc::new(context))
        .for_each(|res| async move {
            match res {
                Ok((tenant, _)) => info!(tenant = %tenant.name, "reconciled successful"),
                Err(e) => warn!(error = %e, "reconcile failed"),
            }
        })
        .await;

    Ok(())
}

pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    writer
        .write_all(serde_yaml_ng::to_string(&Tenant::crd())?.as_bytes())
        .await?;
    writer.flush().await?;

    Ok(())
}
