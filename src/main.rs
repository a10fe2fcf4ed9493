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

use clap::{Args, Parser, Subcommand};
use minio_operator::settings::{DEFAULT_CONFIG_PATH, DEFAULT_OPERATOR_IMAGE, Settings};
use minio_operator::types::v2::tenant::DEFAULT_CLUSTER_DOMAIN;
use minio_operator::{crd, run, sidecar, validator};
use shadow_rs::shadow;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

shadow!(build);

#[derive(Parser)]
#[command(name = "minio-operator")]
#[command(about = "MinIO Kubernetes Operator CLI", long_about = None)]
#[command(version = build::CLAP_LONG_VERSION)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SettingsArgs {
    /// Kubernetes cluster domain used to build service FQDNs
    #[arg(long, global = true, env = "CLUSTER_DOMAIN", default_value = DEFAULT_CLUSTER_DOMAIN)]
    cluster_domain: String,

    /// Path of the generated configuration file
    #[arg(long, global = true, env = "MINIO_CONFIG_ENV_FILE", default_value = DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    /// Image used for the sidecar and init containers
    #[arg(long, global = true, env = "OPERATOR_IMAGE", default_value = DEFAULT_OPERATOR_IMAGE)]
    operator_image: String,
}

impl From<SettingsArgs> for Settings {
    fn from(args: SettingsArgs) -> Self {
        Settings {
            cluster_domain: args.cluster_domain,
            config_path: args.config_path,
            operator_image: args.operator_image,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Output CRDs in YAML
    Crd {
        /// Optional output path. If not set, the output will be written to stdout.
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Run the controller
    Server {},

    /// Keep a pod's configuration file in sync with its tenant
    Sidecar {
        /// Name of the tenant this pod belongs to
        #[arg(short, long)]
        tenant: String,
    },

    /// Write the configuration file once and exit
    Validate {
        /// Name of the tenant this pod belongs to
        #[arg(short, long)]
        tenant: String,

        /// Configuration left by an earlier boot stage
        #[arg(long)]
        tmp_config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let settings = Settings::from(cli.settings);
    match cli.command {
        Commands::Crd { file } => crd(file).await?,
        Commands::Server {} => run(settings).await?,
        Commands::Sidecar { tenant } => sidecar::run(settings, tenant).await?,
        Commands::Validate { tenant, tmp_config } => {
            validator::run(settings, tenant, tmp_config).await?
        }
    }

    Ok(())
}
