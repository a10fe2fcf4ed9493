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
use crate::topology::SetLayout;
use crate::types::v2::status::Status;
use crate::types::v2::status::pool::{Pool, PoolState};
use crate::types::v2::status::state::{HealthStatus, State};
use crate::types::v2::tenant::Tenant;
use crate::{context, types};
use k8s_openapi::api::apps::v1 as appsv1;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use snafu::Snafu;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

pub async fn reconcile_tenant(tenant: Arc<Tenant>, ctx: Arc<Context>) -> Result<Action, Error> {
    let ns = tenant.namespace()?;
    let mut latest_tenant = ctx.get::<Tenant>(&tenant.name(), &ns).await?;

    if latest_tenant.metadata.deletion_timestamp.is_some() {
        debug!(
            tenant = %tenant.name(),
            deletion_timestamp = ?latest_tenant.metadata.deletion_timestamp,
            "tenant is being deleted"
        );
        return Ok(Action::await_change());
    }

    latest_tenant.ensure_defaults();

    let layouts = match latest_tenant.validate(&ctx.settings.cluster_domain) {
        Ok(layouts) => layouts,
        Err(error) => {
            warn!(tenant = %latest_tenant.name(), %error, "tenant spec rejected");
            ctx.record(
                &latest_tenant,
                EventType::Warning,
                "InvalidConfiguration",
                &error.to_string(),
            )
            .await?;
            ctx.update_status(&latest_tenant, |status| {
                status.current_state = State::InvalidConfiguration.to_string();
                status.last_update = Some(chrono::Utc::now().to_rfc3339());
            })
            .await?;
            return Ok(Action::await_change());
        }
    };

    // 1. RBAC, unless a custom service account is brought without asking for it
    if should_create_rbac(&latest_tenant) {
        let role = ctx.apply(&latest_tenant.new_role(), &ns).await?;

        let sa_name = if latest_tenant.spec.service_account_name.is_none() {
            ctx.apply(&latest_tenant.new_service_account(), &ns)
                .await?
                .name_any()
        } else {
            latest_tenant.service_account_name()
        };
        ctx.apply(&latest_tenant.new_role_binding(&sa_name, &role), &ns)
            .await?;
    }

    // 2. Services
    ctx.apply(&latest_tenant.new_io_service(), &ns).await?;
    ctx.apply(&latest_tenant.new_console_service(), &ns).await?;
    ctx.apply(&latest_tenant.new_headless_service(), &ns)
        .await?;

    // 3. One StatefulSet per pool
    let mut statefulsets = Vec::with_capacity(latest_tenant.spec.pools.len());
    for pool in &latest_tenant.spec.pools {
        let statefulset = ctx
            .apply(&latest_tenant.new_statefulset(pool, &ctx.settings)?, &ns)
            .await?;
        statefulsets.push(statefulset);
    }

    // 4. Status
    let now = chrono::Utc::now().to_rfc3339();
    let updated = ctx
        .update_status(&latest_tenant, |status| {
            update_status(status, &latest_tenant, &layouts, &statefulsets, &now)
        })
        .await?;

    let ready = updated
        .status
        .as_ref()
        .is_some_and(|status| status.current_state == State::Ready.to_string());
    info!(tenant = %latest_tenant.name(), ready, "tenant reconciled");

    if ready {
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(Duration::from_secs(10)))
    }
}

pub fn error_policy(tenant: Arc<Tenant>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_not_found() {
        debug!(tenant = %tenant.name(), "tenant is gone");
        return Action::await_change();
    }

    error!(tenant = %tenant.name(), %error, "reconcile failed");
    Action::requeue(Duration::from_secs(5))
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Context {
                source: context::Error::Kube { source }
            } if context::is_not_found(source)
        )
    }
}

fn should_create_rbac(tenant: &Tenant) -> bool {
    let custom_sa = tenant.spec.service_account_name.is_some();
    let create_rbac = tenant.spec.create_service_account_rbac.unwrap_or(false);
    !custom_sa || create_rbac
}

fn ready_replicas(statefulset: &appsv1::StatefulSet) -> i32 {
    statefulset
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0)
}

/// Folds what the API server returned for the pools into `status`.
fn update_status(
    status: &mut Status,
    tenant: &Tenant,
    layouts: &[SetLayout],
    statefulsets: &[appsv1::StatefulSet],
    now: &str,
) {
    let desired = tenant.servers_total();
    let available: i32 = statefulsets.iter().map(ready_replicas).sum();

    status.pools = tenant
        .spec
        .pools
        .iter()
        .zip(layouts)
        .zip(statefulsets)
        .map(|((pool, layout), statefulset)| Pool {
            ss_name: statefulset.name_any(),
            state: if ready_replicas(statefulset) >= pool.servers {
                PoolState::Initialized
            } else {
                PoolState::Created
            },
            set_size: i32::try_from(layout.set_size).unwrap_or(i32::MAX),
        })
        .collect();

    status.available_replicas = available;
    status.health_status = Some(HealthStatus::from_replicas(available, desired));
    status.drives_total = tenant.drives_total();
    status.current_state = if desired > 0 && available >= desired {
        State::Ready
    } else {
        State::WaitingForReadiness
    }
    .to_string();

    if status.observed_generation != tenant.metadata.generation {
        status.revision += 1;
        status.observed_generation = tenant.metadata.generation;
    }
    status.last_update = Some(now.to_owned());
}
