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

//! Client and namespace discovery for the in-pod entry points.

use snafu::{ResultExt, Snafu};
use std::path::Path;
use tracing::{debug, info};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
pub const NAMESPACE_FILE: &str = const_str::concat!(SERVICE_ACCOUNT_DIR, "/namespace");

/// Set for local development against `kubectl proxy`.
pub const DEV_NAMESPACE_ENV: &str = "DEV_NAMESPACE";
const DEV_PROXY_URL: &str = "http://localhost:8001";
const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid proxy url '{}': {}", url, source))]
    ProxyUrl {
        url: String,
        source: http::uri::InvalidUri,
    },

    #[snafu(transparent)]
    Kube { source: kube::Error },
}

fn dev_namespace() -> Option<String> {
    std::env::var(DEV_NAMESPACE_ENV)
        .ok()
        .filter(|ns| !ns.trim().is_empty())
}

/// Namespace the process runs in.
pub async fn namespace() -> String {
    match dev_namespace() {
        Some(ns) => ns,
        None => read_namespace(Path::new(NAMESPACE_FILE)).await,
    }
}

pub async fn read_namespace(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(ns) if !ns.trim().is_empty() => ns.trim().to_owned(),
        Ok(_) => DEFAULT_NAMESPACE.to_owned(),
        Err(error) => {
            debug!(path = %path.display(), %error, "cannot read namespace file");
            DEFAULT_NAMESPACE.to_owned()
        }
    }
}

/// In-cluster or kubeconfig client, or a `kubectl proxy` client when `DEV_NAMESPACE` is set.
pub async fn client() -> Result<kube::Client, Error> {
    if dev_namespace().is_some() {
        info!(url = DEV_PROXY_URL, "using development proxy");
        let url = DEV_PROXY_URL.parse().context(ProxyUrlSnafu { url: DEV_PROXY_URL })?;
        return Ok(kube::Client::try_from(kube::Config::new(url))?);
    }

    Ok(kube::Client::try_default().await?)
}
