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

//! Union of theta-dup sketches.

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::CompactThetaDupSketch;
use crate::theta::ThetaDupSketchView;
use crate::theta::hash_table::DEFAULT_LG_K;
use crate::theta::hash_table::Entry;
use crate::theta::hash_table::MAX_LG_K;
use crate::theta::hash_table::MIN_LG_K;
use crate::theta::hash_table::ThetaDupHashTable;

/// Stateful union operator.
///
/// Absorbs any number of input sketches and produces a compact result whose
/// theta is the minimum across the inputs (and the internal gadget, should
/// it overflow its nominal size). Input multiplicities are not meaningful
/// across a union; retained entries in the result carry a count of one.
///
/// # Examples
///
/// ```
/// use theta_dup::theta::ThetaDupSketchView;
/// use theta_dup::theta::ThetaDupUnion;
/// use theta_dup::theta::UpdateThetaDupSketch;
///
/// let mut a = UpdateThetaDupSketch::builder().build().unwrap();
/// let mut b = UpdateThetaDupSketch::builder().build().unwrap();
/// a.update("x");
/// b.update("y");
///
/// let mut union = ThetaDupUnion::builder().build().unwrap();
/// union.update(&a).unwrap();
/// union.update(&b).unwrap();
/// assert_eq!(union.result(true).estimate(), 2.0);
/// ```
#[derive(Debug)]
pub struct ThetaDupUnion {
    table: ThetaDupHashTable,
    union_theta: u64,
}

impl ThetaDupUnion {
    /// Create a new builder with default parameters.
    pub fn builder() -> ThetaDupUnionBuilder {
        ThetaDupUnionBuilder::default()
    }

    /// Absorb a sketch into the union.
    ///
    /// # Errors
    ///
    /// `SeedMismatch` if a non-empty input was built with a different seed.
    pub fn update<S: ThetaDupSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        if !sketch.is_empty() && sketch.seed_hash() != self.table.seed_hash() {
            return Err(Error::seed_mismatch(
                self.table.seed_hash(),
                sketch.seed_hash(),
            ));
        }
        if sketch.is_empty() {
            return Ok(());
        }

        self.table.set_empty(false);
        self.union_theta = self.union_theta.min(sketch.theta64());
        for (hash, _) in sketch.iter() {
            if hash >= self.union_theta {
                if sketch.is_ordered() {
                    break; // early stop for ordered sketches
                }
                continue;
            }
            self.table.insert_hash(hash);
        }
        Ok(())
    }

    /// The union of everything absorbed so far, as a compact sketch.
    pub fn result(&self, ordered: bool) -> CompactThetaDupSketch {
        let theta = self.union_theta.min(self.table.theta());
        let mut entries: Vec<Entry> = self
            .table
            .iter()
            .filter(|e| e.0 < theta)
            .map(|e| (e.0, 1))
            .collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaDupSketch::from_parts(
            theta,
            entries,
            self.table.seed_hash(),
            self.table.is_empty(),
            ordered,
        )
    }
}

/// Builder for [`ThetaDupUnion`].
#[derive(Debug)]
pub struct ThetaDupUnionBuilder {
    lg_k: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    seed: u64,
}

impl Default for ThetaDupUnionBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            resize_factor: ResizeFactor::X8,
            sampling_probability: 1.0,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaDupUnionBuilder {
    /// Set log2(k), the nominal entry count of the internal gadget.
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        self.lg_k = lg_k;
        self
    }

    /// Set the resize factor of the internal gadget.
    pub fn resize_factor(mut self, resize_factor: ResizeFactor) -> Self {
        self.resize_factor = resize_factor;
        self
    }

    /// Set the sampling probability (initial theta).
    pub fn sampling_probability(mut self, p: f32) -> Self {
        self.sampling_probability = p;
        self
    }

    /// Set the hash seed inputs must have been built with.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the union operator.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `lg_k` is outside `[5, 26]` or the sampling
    /// probability is outside `(0, 1]`.
    pub fn build(self) -> Result<ThetaDupUnion, Error> {
        if !(MIN_LG_K..=MAX_LG_K).contains(&self.lg_k) {
            return Err(Error::invalid_argument("lg_k out of range")
                .with_context("lg_k", self.lg_k)
                .with_context("min", MIN_LG_K)
                .with_context("max", MAX_LG_K));
        }
        if !(self.sampling_probability > 0.0 && self.sampling_probability <= 1.0) {
            return Err(Error::invalid_argument("sampling probability out of range")
                .with_context("p", self.sampling_probability));
        }
        let table = ThetaDupHashTable::new(
            self.lg_k,
            self.resize_factor,
            self.sampling_probability,
            self.seed,
        );
        let union_theta = table.theta();
        Ok(ThetaDupUnion { table, union_theta })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theta::MAX_THETA;
    use crate::theta::UpdateThetaDupSketch;

    fn sketch_with_range(start: u64, count: u64) -> UpdateThetaDupSketch {
        let mut sketch = UpdateThetaDupSketch::builder().build().unwrap();
        for i in 0..count {
            sketch.update(start + i);
        }
        sketch
    }

    #[test]
    fn test_empty_union() {
        let union = ThetaDupUnion::builder().build().unwrap();
        let result = union.result(true);
        assert!(result.is_empty());
        assert_eq!(result.estimate(), 0.0);
        assert_eq!(result.theta64(), MAX_THETA);
    }

    #[test]
    fn test_union_of_empty_inputs_is_empty() {
        let a = UpdateThetaDupSketch::builder().build().unwrap();
        let mut union = ThetaDupUnion::builder().build().unwrap();
        union.update(&a).unwrap();
        union.update(&a.compact(true)).unwrap();
        assert!(union.result(true).is_empty());
    }

    #[test]
    fn test_exact_overlap() {
        let a = sketch_with_range(0, 1000);
        let b = sketch_with_range(500, 1000);

        let mut union = ThetaDupUnion::builder().build().unwrap();
        union.update(&a).unwrap();
        union.update(&b).unwrap();

        let result = union.result(true);
        assert!(!result.is_empty());
        assert!(!result.is_estimation_mode());
        assert_eq!(result.estimate(), 1500.0);
        assert!(result.iter().all(|e| e.1 == 1));
    }

    #[test]
    fn test_accepts_compact_inputs() {
        let a = sketch_with_range(0, 100);
        let b = sketch_with_range(50, 100);

        let mut union = ThetaDupUnion::builder().build().unwrap();
        union.update(&a.compact(true)).unwrap();
        union.update(&b.compact(false)).unwrap();
        assert_eq!(union.result(true).estimate(), 150.0);
    }

    #[test]
    fn test_seed_mismatch() {
        let mut other_seed = UpdateThetaDupSketch::builder().seed(2).build().unwrap();
        other_seed.update("x");

        let mut union = ThetaDupUnion::builder().build().unwrap();
        let err = union.update(&other_seed).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SeedMismatch);

        // empty sketches are not seed-checked
        let empty_other_seed = UpdateThetaDupSketch::builder().seed(2).build().unwrap();
        union.update(&empty_other_seed).unwrap();
    }

    #[test]
    fn test_non_empty_input_with_no_retained_keys() {
        let mut sparse = UpdateThetaDupSketch::builder()
            .sampling_probability(0.001)
            .build()
            .unwrap();
        sparse.update(1u64);

        let mut union = ThetaDupUnion::builder().build().unwrap();
        union.update(&sparse).unwrap();

        let result = union.result(true);
        assert!(!result.is_empty());
        assert!(result.is_estimation_mode());
        assert_eq!(result.estimate(), 0.0);
        assert!((result.theta() - 0.001).abs() < 1e-6);
    }

    #[test]
    fn test_result_ordering_flag() {
        let a = sketch_with_range(0, 64);
        let mut union = ThetaDupUnion::builder().build().unwrap();
        union.update(&a).unwrap();

        let ordered = union.result(true);
        assert!(ordered.is_ordered());
        let hashes: Vec<u64> = ordered.iter().map(|e| e.0).collect();
        assert!(hashes.is_sorted());
        assert!(!union.result(false).is_ordered());
    }
}
