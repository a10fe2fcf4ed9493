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

use super::{CONSOLE_PORT, MINIO_PORT, MINIO_SERVICE_NAME, Tenant};
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use k8s_openapi::apimachinery::pkg::util::intstr;

impl Tenant {
    fn service_meta(&self, name: String) -> metav1::ObjectMeta {
        metav1::ObjectMeta {
            name: Some(name),
            namespace: self.namespace().ok(),
            owner_references: Some(vec![self.new_owner_ref()]),
            labels: Some(self.common_labels()),
            ..Default::default()
        }
    }

    fn minio_service_port_spec(&self) -> corev1::ServicePort {
        corev1::ServicePort {
            port: self.minio_service_port(),
            target_port: Some(intstr::IntOrString::Int(MINIO_PORT)),
            name: Some(format!("{}-minio", self.scheme())),
            ..Default::default()
        }
    }

    /// a new io Service for tenant
    pub fn new_io_service(&self) -> corev1::Service {
        corev1::Service {
            metadata: self.service_meta(MINIO_SERVICE_NAME.to_owned()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(self.selector_labels()),
                ports: Some(vec![self.minio_service_port_spec()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// a new console Service for tenant
    pub fn new_console_service(&self) -> corev1::Service {
        corev1::Service {
            metadata: self.service_meta(self.console_service_name()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(self.selector_labels()),
                ports: Some(vec![corev1::ServicePort {
                    port: self.console_service_port(),
                    target_port: Some(intstr::IntOrString::Int(CONSOLE_PORT)),
                    name: Some(format!("{}-console", self.scheme())),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// a new headless Service for tenant
    pub fn new_headless_service(&self) -> corev1::Service {
        corev1::Service {
            metadata: self.service_meta(self.headless_service_name()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                cluster_ip: Some("None".to_owned()),
                publish_not_ready_addresses: Some(true),
                selector: Some(self.selector_labels()),
                ports: Some(vec![corev1::ServicePort {
                    port: MINIO_PORT,
                    name: Some(format!("{}-minio", self.scheme())),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Service named after `bucket`, so `<bucket>.<namespace>.svc.<domain>` reaches the tenant.
    pub fn new_bucket_service(&self, bucket: &str) -> corev1::Service {
        corev1::Service {
            metadata: self.service_meta(bucket.to_owned()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(self.selector_labels()),
                ports: Some(vec![self.minio_service_port_spec()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
