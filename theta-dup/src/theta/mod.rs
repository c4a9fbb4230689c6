// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Theta sketch with duplicate counting and deletions.
//!
//! Unlike the classic theta sketch, every retained entry carries a
//! multiplicity, so the same element can be inserted repeatedly and later
//! removed with [`UpdateThetaDupSketch::remove`]. The estimate is still the
//! number of *distinct* elements; the counts exist only to make deletion
//! work.
//!
//! [`UpdateThetaDupSketch`] is the mutable form built from input data.
//! [`CompactThetaDupSketch`] is an immutable snapshot used for storage,
//! transport and the set operations [`ThetaDupUnion`],
//! [`ThetaDupIntersection`] and [`ThetaDupANotB`]. [`ThetaDupSketch`] is the
//! tagged form a generic deserializer returns.

mod a_not_b;
mod compact;
pub(crate) mod hash_table;
mod intersection;
pub(crate) mod serialization;
mod sketch;
mod union;

pub use a_not_b::ThetaDupANotB;
pub use compact::CompactThetaDupSketch;
pub use hash_table::DEFAULT_LG_K;
pub use hash_table::MAX_LG_K;
pub use hash_table::MAX_THETA;
pub use hash_table::MIN_LG_K;
pub use intersection::ThetaDupIntersection;
pub use sketch::ThetaDupSketch;
pub use sketch::UpdateThetaDupSketch;
pub use sketch::UpdateThetaDupSketchBuilder;
pub use union::ThetaDupUnion;
pub use union::ThetaDupUnionBuilder;

use crate::common::NumStdDev;
use crate::common::binomial_bounds;

/// Query surface shared by update sketches, compact sketches and the tagged
/// [`ThetaDupSketch`]. Set operations accept any implementation.
pub trait ThetaDupSketchView {
    /// True if the sketch represents an empty stream. Not the same as having
    /// no retained entries: theta screening and removals can drain the table
    /// of a non-empty stream.
    fn is_empty(&self) -> bool;

    /// True if retained entries iterate in ascending hash order.
    fn is_ordered(&self) -> bool;

    /// Theta as a positive integer in `[0, MAX_THETA]`.
    fn theta64(&self) -> u64;

    /// Number of retained entries.
    fn num_retained(&self) -> u32;

    /// 16-bit fingerprint of the hash seed this sketch was built with.
    fn seed_hash(&self) -> u16;

    /// Iterate retained entries as `(hash, multiplicity)` pairs.
    fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_;

    /// Theta as a fraction from 0 to 1 (effective sampling rate).
    fn theta(&self) -> f64 {
        self.theta64() as f64 / MAX_THETA as f64
    }

    /// True if the sketch is in estimation mode (as opposed to exact mode).
    fn is_estimation_mode(&self) -> bool {
        self.theta64() < MAX_THETA && !self.is_empty()
    }

    /// Estimate of the distinct count of the input stream.
    fn estimate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.num_retained() as f64 / self.theta()
    }

    /// Approximate lower error bound given a number of standard deviations.
    fn lower_bound(&self, num_std_devs: NumStdDev) -> f64 {
        if !self.is_estimation_mode() {
            return self.num_retained() as f64;
        }
        // Estimation mode guarantees theta in (0, 1).
        binomial_bounds::lower_bound(self.num_retained() as u64, self.theta(), num_std_devs)
            .expect("theta is positive in estimation mode")
    }

    /// Approximate upper error bound given a number of standard deviations.
    fn upper_bound(&self, num_std_devs: NumStdDev) -> f64 {
        if !self.is_estimation_mode() {
            return self.num_retained() as f64;
        }
        // Estimation mode guarantees theta in (0, 1).
        binomial_bounds::upper_bound(self.num_retained() as u64, self.theta(), num_std_devs)
            .expect("theta is positive in estimation mode")
    }
}
