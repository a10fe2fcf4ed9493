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

//! Erasure-set layout for pool endpoint arguments.
//!
//! Every pool is described to the storage server as an ellipses pattern such as
//! `https://t-pool-0-{0...3}.t-hl.ns.svc.cluster.local/export{0...3}`. The number of
//! drives is the product of the range cardinalities, and the server splits those
//! drives into erasure sets of 4 to 16 drives. This module decides which set size
//! the server will pick, so that the operator can reject geometries the server
//! would refuse to boot with.

pub mod ellipses;

#[cfg(test)]
mod proptest;

pub use ellipses::{Pattern, Range};

use snafu::Snafu;

/// Erasure-set sizes accepted by the storage server.
pub const SET_SIZES: [usize; 13] = [4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

/// Smallest erasure set the server accepts.
pub const MIN_SET_SIZE: usize = SET_SIZES[0];

/// Lowest parity offered for any set size.
const MIN_PARITY: usize = 2;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid ellipses range '{}' in '{}': {}", range, pattern, reason))]
    InvalidRange {
        pattern: String,
        range: String,
        reason: String,
    },

    #[snafu(display(
        "'{}' expands to {} drives, at least {} are required",
        pattern,
        count,
        MIN_SET_SIZE
    ))]
    BelowMinimumDriveCount { pattern: String, count: usize },

    #[snafu(display(
        "drive counts {:?} are not divisible by any supported erasure set size",
        counts
    ))]
    NoCommonDivisor { counts: Vec<usize> },

    #[snafu(display(
        "drive counts {:?} admit no erasure set size that divides every range evenly",
        counts
    ))]
    NoSymmetricSetSize { counts: Vec<usize> },
}

/// The erasure-set layout chosen for one group of endpoint patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLayout {
    /// Drives per erasure set.
    pub set_size: usize,

    /// For each input pattern, one entry per erasure set.
    pub sets: Vec<Vec<usize>>,
}

impl SetLayout {
    pub fn max_parity(&self) -> usize {
        self.set_size / 2
    }

    /// Storage-class parity strings from the highest usable parity down to `EC:2`.
    pub fn parity_list(&self) -> Vec<String> {
        parity_list(self.set_size)
    }

    pub fn total_drives(&self) -> usize {
        self.sets.iter().flatten().sum()
    }
}

pub fn parity_list(set_size: usize) -> Vec<String> {
    (MIN_PARITY..=set_size / 2)
        .rev()
        .map(|parity| format!("EC:{parity}"))
        .collect()
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Resolves a group of patterns that must share one erasure-set size.
pub fn resolve<S: AsRef<str>>(args: &[S]) -> Result<SetLayout, Error> {
    let patterns = args
        .iter()
        .map(|arg| arg.as_ref().parse::<Pattern>())
        .collect::<Result<Vec<_>, _>>()?;

    resolve_patterns(&patterns)
}

/// Resolves every pool on its own. Sets are never shared across pools, so each
/// pool may end up with a different set size.
pub fn resolve_pools<S: AsRef<str>>(pools: &[S]) -> Result<Vec<SetLayout>, Error> {
    pools.iter().map(|pool| resolve(&[pool])).collect()
}

pub fn resolve_patterns(patterns: &[Pattern]) -> Result<SetLayout, Error> {
    let totals: Vec<usize> = patterns.iter().map(Pattern::total_size).collect();

    // No drives means no common divisor, even though the symmetry filter alone would accept anything.
    if totals.is_empty() {
        return NoCommonDivisorSnafu { counts: totals }.fail();
    }

    if let Some((pattern, &count)) = patterns
        .iter()
        .zip(&totals)
        .find(|(_, count)| **count < MIN_SET_SIZE)
    {
        return BelowMinimumDriveCountSnafu {
            pattern: pattern.to_string(),
            count,
        }
        .fail();
    }

    let common = totals.iter().copied().fold(0, gcd);
    if common < MIN_SET_SIZE {
        return NoCommonDivisorSnafu { counts: totals }.fail();
    }

    let candidates: Vec<usize> = SET_SIZES
        .iter()
        .copied()
        .filter(|size| common % size == 0)
        .collect();
    if candidates.is_empty() {
        return NoCommonDivisorSnafu { counts: totals }.fail();
    }

    let set_size = candidates
        .into_iter()
        .filter(|&size| is_symmetric(patterns, size))
        .min_by_key(|&size| (common / size, std::cmp::Reverse(size)))
        .ok_or_else(|| Error::NoSymmetricSetSize {
            counts: totals.clone(),
        })?;

    let sets = totals
        .iter()
        .map(|total| vec![set_size; total / set_size])
        .collect();

    Ok(SetLayout { set_size, sets })
}

/// Every range of every pattern must either be a multiple of the set size or
/// divide it, so that hosts and drives spread evenly over the sets.
fn is_symmetric(patterns: &[Pattern], set_size: usize) -> bool {
    patterns.iter().flat_map(Pattern::ranges).all(|range| {
        let len = range.len();
        len % set_size == 0 || set_size % len == 0
    })
}
