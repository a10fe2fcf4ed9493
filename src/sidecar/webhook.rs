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

//! Bucket DNS webhook: the server calls it to create or drop the Service named after a bucket.

use crate::context::is_conflict;
use crate::types::v2::tenant::Tenant;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use k8s_openapi::api::core::v1 as corev1;
use kube::Api;
use kube::api::{DeleteParams, PostParams};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tracing::{info, warn};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("missing bucket name"))]
    MissingBucket,

    #[snafu(display("invalid bucket name '{}': bucket names with '.' are not supported", bucket))]
    InvalidBucket { bucket: String },

    #[snafu(display("failed to delete service for bucket '{}': {}", bucket, source))]
    DeleteService { bucket: String, source: kube::Error },

    #[snafu(display("failed to get tenant '{}/{}': {}", namespace, name, source))]
    GetTenant {
        namespace: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("failed to create service for bucket '{}': {}", bucket, source))]
    CreateService { bucket: String, source: kube::Error },
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let error = match &self {
            Error::MissingBucket | Error::InvalidBucket { .. } => "InvalidBucket",
            Error::DeleteService { .. } => "DeleteService",
            Error::GetTenant { .. } => "GetTenant",
            Error::CreateService { .. } => "CreateService",
        };
        warn!(%error, message = %self, "bucket webhook request failed");

        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: error.to_owned(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct BucketQuery {
    #[serde(default)]
    bucket: String,

    #[serde(default)]
    delete: bool,
}

pub fn router(client: kube::Client) -> Router {
    Router::new()
        .route(
            "/webhook/v1/bucketsrv/{namespace}/{name}",
            post(bucket_service),
        )
        .with_state(client)
}

async fn bucket_service(
    State(client): State<kube::Client>,
    Path((namespace, name)): Path<(String, String)>,
    Query(query): Query<BucketQuery>,
) -> Result<StatusCode, Error> {
    let bucket = query.bucket;
    if bucket.is_empty() {
        return MissingBucketSnafu.fail();
    }

    let services: Api<corev1::Service> = Api::namespaced(client.clone(), &namespace);

    if query.delete {
        services
            .delete(&bucket, &DeleteParams::default())
            .await
            .context(DeleteServiceSnafu {
                bucket: bucket.clone(),
            })?;
        info!(%namespace, tenant = %name, %bucket, "bucket service deleted");
        return Ok(StatusCode::OK);
    }

    if bucket.contains('.') {
        return InvalidBucketSnafu { bucket }.fail();
    }

    let tenant = Api::<Tenant>::namespaced(client, &namespace)
        .get(&name)
        .await
        .context(GetTenantSnafu {
            namespace: namespace.clone(),
            name: name.clone(),
        })?;

    match services
        .create(&PostParams::default(), &tenant.new_bucket_service(&bucket))
        .await
    {
        Ok(_) => {
            info!(%namespace, tenant = %name, %bucket, "bucket service created");
            Ok(StatusCode::OK)
        }
        Err(error) if is_conflict(&error) => {
            info!(%namespace, tenant = %name, %bucket, "bucket service already exists");
            Ok(StatusCode::OK)
        }
        Err(source) => Err(Error::CreateService { bucket, source }),
    }
}
