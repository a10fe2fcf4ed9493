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

//! Per-pod companion of the storage server.
//!
//! Keeps the configuration file in step with the tenant and the objects it
//! references, and serves the bucket DNS webhook, the control endpoint and
//! the readiness probe.

pub mod control;
mod controller;
pub mod probe;
pub mod webhook;

pub use controller::Controller;

use crate::configuration;
use crate::settings::{CONTROL_PORT, PROBE_PORT, Settings, WEBHOOK_PORT};
use crate::types::v2::tenant::{MINIO_PORT, Tenant};
use crate::utils;
use axum::Router;
use futures::StreamExt;
use k8s_openapi::api::core::v1 as corev1;
use kube::Api;
use kube::runtime::{WatchStreamExt, reflector, watcher};
use snafu::{ResultExt, Snafu};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const CACHE_SYNC_TIMEOUT: Duration = Duration::from_secs(120);
const RESYNC_PERIOD: Duration = Duration::from_secs(3600);
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to build kubernetes client: {}", source))]
    Client { source: utils::client::Error },

    #[snafu(display("failed to get tenant '{}/{}': {}", namespace, name, source))]
    GetTenant {
        namespace: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("informer caches did not sync within {:?}", timeout))]
    CacheSync { timeout: Duration },

    #[snafu(display("failed to generate configuration: {}", source))]
    Configuration { source: configuration::Error },

    #[snafu(display("tenant '{}' has no root credentials in its configuration", tenant))]
    MissingRootCredentials { tenant: String },

    #[snafu(display("failed to write configuration to '{}': {}", path.display(), source))]
    WriteConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{} watch stream closed", kind))]
    WatchClosed { kind: &'static str },

    #[snafu(display("failed to bind {}: {}", addr, source))]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[snafu(display("server on {} failed: {}", addr, source))]
    Serve {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[snafu(display("failed to build probe client: {}", source))]
    ProbeClient { source: reqwest::Error },

    #[snafu(display("sidecar task panicked: {}", source))]
    Join { source: tokio::task::JoinError },
}

pub async fn run(settings: Settings, tenant_name: String) -> Result<(), Error> {
    let client = utils::client::client().await.context(ClientSnafu)?;
    let namespace = utils::client::namespace().await;
    info!(%namespace, tenant = %tenant_name, "starting sidecar");

    let tenants: Api<Tenant> = Api::namespaced(client.clone(), &namespace);
    let tenant = tenants.get(&tenant_name).await.context(GetTenantSnafu {
        namespace: namespace.clone(),
        name: tenant_name.clone(),
    })?;

    let probe = probe::Probe::new(
        &tenant.minio_fqdn_service_name(&settings.cluster_domain),
        tenant.tls_enabled(),
        SocketAddr::from((Ipv4Addr::LOCALHOST, MINIO_PORT as u16)),
    )
    .context(ProbeClientSnafu)?;

    let (secrets, secret_writer) = reflector::store::<corev1::Secret>();
    let (config_maps, config_map_writer) = reflector::store::<corev1::ConfigMap>();
    let controller = Arc::new(Controller::new(
        settings,
        namespace.clone(),
        tenant,
        secrets.clone(),
        config_maps.clone(),
    ));

    let token = CancellationToken::new();
    let mut tasks = JoinSet::new();

    tasks.spawn(watch(
        controller.clone(),
        tenants,
        Api::namespaced(client.clone(), &namespace),
        Api::namespaced(client.clone(), &namespace),
        secret_writer,
        config_map_writer,
        token.clone(),
    ));

    let synced = tokio::time::timeout(CACHE_SYNC_TIMEOUT, async {
        secrets.wait_until_ready().await.is_ok() && config_maps.wait_until_ready().await.is_ok()
    })
    .await;
    if !matches!(synced, Ok(true)) {
        error!(timeout = ?CACHE_SYNC_TIMEOUT, "informer caches did not sync");
        token.cancel();
        return CacheSyncSnafu {
            timeout: CACHE_SYNC_TIMEOUT,
        }
        .fail();
    }

    if let Err(error) = controller.regenerate().await {
        token.cancel();
        return Err(error);
    }

    tasks.spawn(serve(
        SocketAddr::from((Ipv4Addr::LOCALHOST, WEBHOOK_PORT)),
        webhook::router(client),
        token.clone(),
    ));
    tasks.spawn(serve(
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, CONTROL_PORT)),
        control::router(controller),
        token.clone(),
    ));
    tasks.spawn(serve(
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, PROBE_PORT)),
        probe::router(probe),
        token.clone(),
    ));

    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = shutdown_signal() => {
                    info!("shutdown signal received");
                    token.cancel();
                }
            }
        });
    }

    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        // Any task ending brings the others down with it.
        token.cancel();
        let outcome = joined.context(JoinSnafu).and_then(|r| r);
        if let Err(error) = outcome {
            error!(%error, "sidecar task failed");
            if result.is_ok() {
                result = Err(error);
            }
        }
    }

    info!("sidecar stopped");
    result
}

async fn watch(
    controller: Arc<Controller>,
    tenants: Api<Tenant>,
    secrets: Api<corev1::Secret>,
    config_maps: Api<corev1::ConfigMap>,
    secret_writer: reflector::store::Writer<corev1::Secret>,
    config_map_writer: reflector::store::Writer<corev1::ConfigMap>,
    token: CancellationToken,
) -> Result<(), Error> {
    let tenant_config =
        watcher::Config::default().fields(&format!("metadata.name={}", controller.tenant_name()));
    let mut tenant_events = std::pin::pin!(
        watcher(tenants, tenant_config)
            .default_backoff()
            .applied_objects()
    );
    let mut secret_events = std::pin::pin!(
        watcher(secrets, watcher::Config::default())
            .default_backoff()
            .reflect(secret_writer)
            .applied_objects()
    );
    let mut config_map_events = std::pin::pin!(
        watcher(config_maps, watcher::Config::default())
            .default_backoff()
            .reflect(config_map_writer)
            .applied_objects()
    );

    let mut resync =
        tokio::time::interval_at(tokio::time::Instant::now() + RESYNC_PERIOD, RESYNC_PERIOD);

    let result = loop {
        let handled = tokio::select! {
            _ = token.cancelled() => break Ok(()),
            event = tenant_events.next() => match event {
                Some(Ok(tenant)) => controller.on_tenant(tenant).await,
                Some(Err(error)) => {
                    warn!(%error, "tenant watch error");
                    Ok(())
                }
                None => WatchClosedSnafu { kind: "Tenant" }.fail(),
            },
            event = secret_events.next() => match event {
                Some(Ok(secret)) => controller.on_secret(&secret).await,
                Some(Err(error)) => {
                    warn!(%error, "secret watch error");
                    Ok(())
                }
                None => WatchClosedSnafu { kind: "Secret" }.fail(),
            },
            event = config_map_events.next() => match event {
                Some(Ok(config_map)) => controller.on_config_map(&config_map).await,
                Some(Err(error)) => {
                    warn!(%error, "configmap watch error");
                    Ok(())
                }
                None => WatchClosedSnafu { kind: "ConfigMap" }.fail(),
            },
            _ = resync.tick() => controller.resync().await,
        };

        if let Err(error) = handled {
            break Err(error);
        }
    };

    token.cancel();
    result
}

async fn serve(addr: SocketAddr, router: Router, token: CancellationToken) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await.context(BindSnafu { addr })?;
    info!(%addr, "listening");

    let app = router
        .layer(TimeoutLayer::new(HTTP_TIMEOUT))
        .layer(TraceLayer::new_for_http());

    axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await
        .context(ServeSnafu { addr })
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(error) => {
                warn!(%error, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let token = CancellationToken::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = tokio::spawn(serve(
            addr,
            Router::new().route("/", get(|| async { "ok" })),
            token.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = serve(addr, Router::new(), CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Bind { .. })));
    }
}
