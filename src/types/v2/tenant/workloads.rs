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

use super::{CONSOLE_PORT, MINIO_CERT_PATH, MINIO_PORT, Tenant};
use crate::settings::{PROBE_PORT, Settings};
use crate::types;
use crate::types::v2::pool::Pool;
use k8s_openapi::api::apps::v1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use k8s_openapi::apimachinery::pkg::util::intstr;

pub const MINIO_CONTAINER_NAME: &str = "minio";
pub const SIDECAR_CONTAINER_NAME: &str = "sidecar";
pub const VALIDATE_CONTAINER_NAME: &str = "validate-arguments";

const VOLUME_CLAIM_TEMPLATE_PREFIX: &str = "data";
const CFG_VOLUME_NAME: &str = "cfg-vol";
const CERT_VOLUME_NAME: &str = "minio-certs";

fn volume_claim_template_name(index: i32) -> String {
    format!("{VOLUME_CLAIM_TEMPLATE_PREFIX}{index}")
}

fn env(name: &str, value: impl Into<String>) -> corev1::EnvVar {
    corev1::EnvVar {
        name: name.to_owned(),
        value: Some(value.into()),
        ..Default::default()
    }
}

impl Tenant {
    fn volume_claim_templates(&self, pool: &Pool) -> Vec<corev1::PersistentVolumeClaim> {
        let template = pool.volume_claim_template.clone().unwrap_or_else(|| {
            corev1::PersistentVolumeClaim {
                spec: Some(corev1::PersistentVolumeClaimSpec {
                    access_modes: Some(vec!["ReadWriteOnce".to_owned()]),
                    resources: Some(corev1::VolumeResourceRequirements {
                        requests: Some(
                            [("storage".to_owned(), Quantity("10Gi".to_owned()))]
                                .into_iter()
                                .collect(),
                        ),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }
        });

        let mut labels = self.pool_labels(pool);
        if let Some(user_labels) = &template.metadata.labels {
            labels.extend(user_labels.clone());
        }

        (0..pool.volumes_per_server)
            .map(|i| corev1::PersistentVolumeClaim {
                metadata: metav1::ObjectMeta {
                    name: Some(volume_claim_template_name(i)),
                    labels: Some(labels.clone()),
                    annotations: template.metadata.annotations.clone(),
                    ..Default::default()
                },
                spec: template.spec.clone(),
                ..Default::default()
            })
            .collect()
    }

    /// Secrets projected into the certificate directory of the server.
    fn cert_volume(&self) -> Option<corev1::Volume> {
        let mut sources = Vec::new();

        if self.auto_cert_enabled() {
            sources.push(corev1::VolumeProjection {
                secret: Some(corev1::SecretProjection {
                    name: self.tls_secret_name(),
                    items: Some(vec![
                        corev1::KeyToPath {
                            key: "public.crt".to_owned(),
                            path: "public.crt".to_owned(),
                            ..Default::default()
                        },
                        corev1::KeyToPath {
                            key: "private.key".to_owned(),
                            path: "private.key".to_owned(),
                            ..Default::default()
                        },
                    ]),
                    optional: Some(true),
                }),
                ..Default::default()
            });
        }

        for (index, cert) in self.spec.external_cert_secret.iter().enumerate() {
            let (crt, key) = cert.key_names();
            let dir = if self.auto_cert_enabled() || index > 0 {
                format!("{}/", cert.name)
            } else {
                String::new()
            };
            sources.push(corev1::VolumeProjection {
                secret: Some(corev1::SecretProjection {
                    name: cert.name.clone(),
                    items: Some(vec![
                        corev1::KeyToPath {
                            key: crt.to_owned(),
                            path: format!("{dir}public.crt"),
                            ..Default::default()
                        },
                        corev1::KeyToPath {
                            key: key.to_owned(),
                            path: format!("{dir}private.key"),
                            ..Default::default()
                        },
                    ]),
                    optional: None,
                }),
                ..Default::default()
            });
        }

        (!sources.is_empty()).then(|| corev1::Volume {
            name: CERT_VOLUME_NAME.to_owned(),
            projected: Some(corev1::ProjectedVolumeSource {
                sources: Some(sources),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn operator_container(
        &self,
        name: &str,
        args: Vec<String>,
        settings: &Settings,
        cfg_mount: &corev1::VolumeMount,
    ) -> corev1::Container {
        corev1::Container {
            name: name.to_owned(),
            image: Some(settings.operator_image.clone()),
            args: Some(args),
            env: Some(vec![
                env("CLUSTER_DOMAIN", settings.cluster_domain.as_str()),
                env(
                    "MINIO_CONFIG_ENV_FILE",
                    settings.config_path.to_string_lossy(),
                ),
            ]),
            volume_mounts: Some(vec![cfg_mount.clone()]),
            image_pull_policy: self
                .spec
                .image_pull_policy
                .as_ref()
                .map(ToString::to_string),
            ..Default::default()
        }
    }

    pub fn new_statefulset(
        &self,
        pool: &Pool,
        settings: &Settings,
    ) -> Result<v1::StatefulSet, types::error::Error> {
        let namespace = self.namespace()?;
        let labels = self.pool_labels(pool);
        let selector_labels = self.pool_selector_labels(pool);

        let cfg_mount = corev1::VolumeMount {
            name: CFG_VOLUME_NAME.to_owned(),
            mount_path: settings.config_dir().to_string_lossy().into_owned(),
            ..Default::default()
        };

        let mount_path = self.mount_path().trim_end_matches('/');
        let mut volume_mounts: Vec<_> = (0..pool.volumes_per_server)
            .map(|i| corev1::VolumeMount {
                name: volume_claim_template_name(i),
                mount_path: format!("{mount_path}{i}"),
                ..Default::default()
            })
            .collect();
        volume_mounts.push(cfg_mount.clone());

        let mut pod_volumes = vec![corev1::Volume {
            name: CFG_VOLUME_NAME.to_owned(),
            empty_dir: Some(corev1::EmptyDirVolumeSource {
                medium: Some("Memory".to_owned()),
                ..Default::default()
            }),
            ..Default::default()
        }];

        if let Some(cert_volume) = self.cert_volume() {
            pod_volumes.push(cert_volume);
            volume_mounts.push(corev1::VolumeMount {
                name: CERT_VOLUME_NAME.to_owned(),
                mount_path: MINIO_CERT_PATH.to_owned(),
                ..Default::default()
            });
        }

        let console_address = format!(":{CONSOLE_PORT}");
        let minio = corev1::Container {
            name: MINIO_CONTAINER_NAME.to_owned(),
            image: self.spec.image.clone(),
            args: Some(
                [
                    "server",
                    "--certs-dir",
                    MINIO_CERT_PATH,
                    "--console-address",
                    console_address.as_str(),
                ]
                .map(str::to_owned)
                .to_vec(),
            ),
            env: Some(vec![env(
                "MINIO_CONFIG_ENV_FILE",
                settings.config_path.to_string_lossy(),
            )]),
            ports: Some(vec![
                corev1::ContainerPort {
                    container_port: MINIO_PORT,
                    name: Some(format!("{}-minio", self.scheme())),
                    protocol: Some("TCP".to_owned()),
                    ..Default::default()
                },
                corev1::ContainerPort {
                    container_port: CONSOLE_PORT,
                    name: Some(format!("{}-console", self.scheme())),
                    protocol: Some("TCP".to_owned()),
                    ..Default::default()
                },
            ]),
            readiness_probe: Some(corev1::Probe {
                http_get: Some(corev1::HTTPGetAction {
                    path: Some("/ready".to_owned()),
                    port: intstr::IntOrString::Int(i32::from(PROBE_PORT)),
                    scheme: Some("HTTP".to_owned()),
                    ..Default::default()
                }),
                initial_delay_seconds: Some(5),
                period_seconds: Some(5),
                failure_threshold: Some(1),
                ..Default::default()
            }),
            volume_mounts: Some(volume_mounts),
            resources: pool.resources.clone(),
            image_pull_policy: self
                .spec
                .image_pull_policy
                .as_ref()
                .map(ToString::to_string),
            ..Default::default()
        };

        let name = self.name();
        let sidecar = self.operator_container(
            SIDECAR_CONTAINER_NAME,
            ["sidecar", "--tenant", name.as_str()].map(str::to_owned).to_vec(),
            settings,
            &cfg_mount,
        );
        let validate = self.operator_container(
            VALIDATE_CONTAINER_NAME,
            ["validate", "--tenant", name.as_str()].map(str::to_owned).to_vec(),
            settings,
            &cfg_mount,
        );

        Ok(v1::StatefulSet {
            metadata: metav1::ObjectMeta {
                name: Some(self.statefulset_name(pool)),
                namespace: Some(namespace),
                owner_references: Some(vec![self.new_owner_ref()]),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(v1::StatefulSetSpec {
                replicas: Some(pool.servers),
                service_name: Some(self.headless_service_name()),
                pod_management_policy: self
                    .spec
                    .pod_management_policy
                    .as_ref()
                    .map(ToString::to_string),
                selector: metav1::LabelSelector {
                    match_labels: Some(selector_labels),
                    ..Default::default()
                },
                template: corev1::PodTemplateSpec {
                    metadata: Some(metav1::ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(corev1::PodSpec {
                        service_account_name: Some(self.service_account_name()),
                        init_containers: Some(vec![validate]),
                        containers: vec![minio, sidecar],
                        volumes: Some(pod_volumes),
                        image_pull_secrets: self.spec.image_pull_secret.clone().map(|s| vec![s]),
                        scheduler_name: self.spec.scheduler.clone(),
                        runtime_class_name: pool.runtime_class_name.clone(),
                        node_selector: pool.node_selector.clone(),
                        affinity: pool.affinity.clone(),
                        tolerations: pool.tolerations.clone(),
                        ..Default::default()
                    }),
                },
                volume_claim_templates: Some(self.volume_claim_templates(pool)),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
