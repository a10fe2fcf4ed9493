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

//! Readiness endpoint that forwards to the co-located server's liveness check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Router;
use axum::routing::get;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const LIVENESS_PATH: &str = "/minio/health/live";

#[derive(Clone, Debug)]
pub struct Probe {
    client: reqwest::Client,
    url: String,
}

impl Probe {
    /// Probes `upstream` while presenting `server_name` for SNI and the Host header.
    /// The certificate is not verified: it is issued for the service name, not the pod.
    pub fn new(server_name: &str, tls: bool, upstream: SocketAddr) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .resolve(server_name, upstream)
            .build()?;

        let scheme = if tls { "https" } else { "http" };
        let url = format!("{scheme}://{server_name}:{}{LIVENESS_PATH}", upstream.port());

        Ok(Self { client, url })
    }
}

pub fn router(probe: Probe) -> Router {
    Router::new().route("/ready", get(ready)).with_state(probe)
}

/// 200 as soon as the server answered at all, with its status code as the body.
async fn ready(State(probe): State<Probe>) -> (StatusCode, String) {
    match probe.client.head(&probe.url).send().await {
        Ok(response) => (StatusCode::OK, response.status().as_u16().to_string()),
        Err(error) => {
            debug!(url = %probe.url, %error, "liveness request failed");
            (StatusCode::SERVICE_UNAVAILABLE, error.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn upstream(status: StatusCode) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(LIVENESS_PATH, get(move || async move { status }));
        tokio::spawn(async move { axum::serve(listener, app).await });
        addr
    }

    async fn probe(addr: SocketAddr) -> (StatusCode, String) {
        let probe = Probe::new("minio.ns.svc.cluster.local", false, addr).unwrap();
        let response = router(probe)
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_ready_when_upstream_is_healthy() {
        let addr = upstream(StatusCode::OK).await;
        assert_eq!(probe(addr).await, (StatusCode::OK, "200".to_string()));
    }

    #[tokio::test]
    async fn test_ready_reports_upstream_failure_status() {
        let addr = upstream(StatusCode::SERVICE_UNAVAILABLE).await;
        assert_eq!(probe(addr).await, (StatusCode::OK, "503".to_string()));
    }

    #[tokio::test]
    async fn test_not_ready_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (status, _) = probe(addr).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_url_uses_service_name() {
        let probe = Probe::new(
            "minio.ns.svc.cluster.local",
            true,
            "127.0.0.1:9000".parse().unwrap(),
        )
        .unwrap();
        assert_eq!(
            probe.url,
            "https://minio.ns.svc.cluster.local:9000/minio/health/live"
        );
    }
}
