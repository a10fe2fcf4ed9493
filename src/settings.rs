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

//! Process-wide settings resolved from flags and the environment.

use crate::types::v2::tenant::DEFAULT_CLUSTER_DOMAIN;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/tmp/minio/config.env";
pub const DEFAULT_OPERATOR_IMAGE: &str = "minio/operator:latest";

/// Bucket DNS webhook, bound to loopback.
pub const WEBHOOK_PORT: u16 = 4222;
/// Control endpoint reporting the hash of the configuration on disk.
pub const CONTROL_PORT: u16 = 4333;
/// Readiness probe proxied to the server's liveness endpoint.
pub const PROBE_PORT: u16 = 4444;

#[derive(Clone, Debug)]
pub struct Settings {
    pub cluster_domain: String,
    /// Target of every configuration write; the server reads it through `MINIO_CONFIG_ENV_FILE`.
    pub config_path: PathBuf,
    pub operator_image: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_owned(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            operator_image: DEFAULT_OPERATOR_IMAGE.to_owned(),
        }
    }
}

impl Settings {
    /// Directory holding the configuration file, shared between containers of a pod.
    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let settings = Settings::default();
        assert_eq!(settings.config_dir(), Path::new("/tmp/minio"));

        let settings = Settings {
            config_path: PathBuf::from("config.env"),
            ..Default::default()
        };
        assert_eq!(settings.config_dir(), Path::new(""));
    }
}
