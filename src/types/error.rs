// Copyright 2025 MinIO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::topology;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("object has no namespace associated"))]
    NoNamespace,

    #[snafu(display("tenant has no pools configured"))]
    NoPools,

    #[snafu(display("pool #{} has no name", ordinal))]
    UnnamedPool { ordinal: usize },

    #[snafu(display("pool name '{}' is used more than once", name))]
    DuplicatePool { name: String },

    #[snafu(display("pool '{}' is invalid: {}", pool, reason))]
    InvalidPool { pool: String, reason: String },

    #[snafu(display("pool '{}' has an unsupported topology: {}", pool, source))]
    PoolTopology {
        pool: String,
        source: topology::Error,
    },

    #[snafu(display(
        "'{}' cannot be set through spec.env, root credentials belong in the configuration secret",
        name
    ))]
    ForbiddenEnv { name: String },

    #[snafu(display("spec.env name {:?} is not a valid shell identifier", name))]
    InvalidEnvName { name: String },
}
