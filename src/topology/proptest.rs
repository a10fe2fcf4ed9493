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

//! Property-based tests for the erasure-set resolver.
//!
//! 1. **Soundness**: accepted layouts cover every drive with sets of 4 to 16.
//! 2. **Symmetry**: the chosen set size divides, or is divided by, every range.
//! 3. **Completeness**: layouts of power-of-two geometry are always accepted.

use proptest::prelude::*;

use super::{Error, Pattern, SET_SIZES, resolve, resolve_patterns};

fn pool_pattern(servers: usize, volumes: usize) -> String {
    format!(
        "https://tenant-pool-0-{{0...{}}}.tenant-hl.ns.svc.cluster.local/export{{0...{}}}",
        servers - 1,
        volumes - 1
    )
}

/// Servers and drives per server, including shapes the resolver must reject.
fn geometry_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=32, 1usize..=16)
}

fn power_of_two_strategy() -> impl Strategy<Value = (usize, usize)> {
    (2u32..=5, 2u32..=4).prop_map(|(s, v)| (1usize << s, 1usize << v))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: an accepted layout splits each pattern's drives into supported sets.
    #[test]
    fn prop_accepted_layout_is_sound((servers, volumes) in geometry_strategy()) {
        let arg = pool_pattern(servers, volumes);
        if let Ok(layout) = resolve(&[&arg]) {
            prop_assert_eq!(layout.sets.len(), 1);
            prop_assert_eq!(layout.sets[0].iter().sum::<usize>(), servers * volumes);
            prop_assert!(layout.sets[0].iter().all(|s| SET_SIZES.contains(s)));
        }
    }

    /// Property: the chosen set size is symmetric against both axes.
    #[test]
    fn prop_accepted_layout_is_symmetric((servers, volumes) in geometry_strategy()) {
        let pattern: Pattern = pool_pattern(servers, volumes).parse()?;
        if let Ok(layout) = resolve_patterns(std::slice::from_ref(&pattern)) {
            let s = layout.set_size;
            for range in pattern.ranges() {
                prop_assert!(range.len() % s == 0 || s % range.len() == 0);
            }
        }
    }

    /// Property: rejections only ever name a topology failure, never a parse failure.
    #[test]
    fn prop_generated_patterns_parse((servers, volumes) in geometry_strategy()) {
        let result = resolve(&[pool_pattern(servers, volumes)]);
        let parse_failure = matches!(result, Err(Error::InvalidRange { .. }));
        prop_assert!(!parse_failure, "generated pattern failed to parse");
    }

    /// Property: power-of-two geometries with at least four drives always resolve.
    #[test]
    fn prop_power_of_two_geometry_resolves((servers, volumes) in power_of_two_strategy()) {
        let layout = resolve(&[pool_pattern(servers, volumes)])?;
        prop_assert_eq!(layout.set_size, 16);
        prop_assert_eq!(layout.total_drives(), servers * volumes);
    }

    /// Property: resolution is deterministic.
    #[test]
    fn prop_resolution_is_deterministic((servers, volumes) in geometry_strategy()) {
        let arg = pool_pattern(servers, volumes);
        prop_assert_eq!(resolve(&[&arg]), resolve(&[&arg]));
    }
}
