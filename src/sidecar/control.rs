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

use super::Controller;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ConfigQuery {
    c: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigHash {
    pub hash: String,
    /// The caller's hash differs from the file on disk.
    pub changed: bool,
}

pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/sidecar/v1/config", post(config_hash))
        .with_state(controller)
}

async fn config_hash(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<ConfigQuery>,
) -> Response {
    match controller.current_hash().await {
        Some(hash) => Json(ConfigHash {
            changed: query.c.as_deref() != Some(hash.as_str()),
            hash,
        })
        .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "configuration not written yet").into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::configuration::CONFIG_ENV_KEY;
    use crate::settings::Settings;
    use crate::tests::{SEED_SECRET_NAME, secret, seeded_tenant};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use kube::runtime::{reflector, watcher};
    use tower::ServiceExt;

    async fn post(controller: Arc<Controller>, uri: &str) -> Response {
        router(controller)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_config_hash_round() {
        let dir = tempfile::tempdir().unwrap();
        let (secrets, mut writer) = reflector::store();
        let (config_maps, _cm_writer) = reflector::store();
        writer.apply_watcher_event(&watcher::Event::Apply(secret(
            SEED_SECRET_NAME,
            &[(
                CONFIG_ENV_KEY,
                "export MINIO_ROOT_USER=minio\nexport MINIO_ROOT_PASSWORD=minio123\n",
            )],
        )));
        let controller = Arc::new(Controller::new(
            Settings {
                config_path: dir.path().join("config.env"),
                ..Default::default()
            },
            "default".to_string(),
            seeded_tenant(None, Some("default")),
            secrets,
            config_maps,
        ));

        let response = post(controller.clone(), "/sidecar/v1/config?c=abc").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        controller.regenerate().await.unwrap();
        let current = controller.current_hash().await.unwrap();

        let response = post(controller.clone(), "/sidecar/v1/config?c=abc").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let reply: ConfigHash = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            reply,
            ConfigHash {
                hash: current.clone(),
                changed: true
            }
        );

        let response = post(controller, &format!("/sidecar/v1/config?c={current}")).await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let reply: ConfigHash = serde_json::from_slice(&body).unwrap();
        assert!(!reply.changed);
    }
}
