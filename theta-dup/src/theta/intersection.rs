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

//! Intersection of theta-dup sketches.

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::CompactThetaDupSketch;
use crate::theta::ThetaDupSketchView;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::REBUILD_THRESHOLD;
use crate::theta::hash_table::ThetaDupHashTable;
use crate::theta::hash_table::lg_size_from_count;

/// Stateful intersection operator.
///
/// The intersection can be viewed as starting from the "universe" set;
/// every [`update`](Self::update) reduces the current set to the
/// overlapping subset. Before the first update the result is undefined; use
/// [`has_result`](Self::has_result) to check.
#[derive(Debug)]
pub struct ThetaDupIntersection {
    is_valid: bool,
    table: ThetaDupHashTable,
}

impl ThetaDupIntersection {
    /// Creates a new intersection operator for the given `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            is_valid: false,
            table: ThetaDupHashTable::from_raw_parts(
                0,
                0,
                ResizeFactor::X1,
                1.0,
                MAX_THETA,
                seed,
                false,
            ),
        }
    }

    /// Creates a new intersection operator with the default seed.
    pub fn new_with_default_seed() -> Self {
        Self::new(DEFAULT_UPDATE_SEED)
    }

    /// Intersect the current state with a given sketch.
    ///
    /// # Errors
    ///
    /// `SeedMismatch` if a non-empty input was built with a different seed;
    /// `InvalidArgument` or `LogicFault` if an input sketch turns out to be
    /// internally inconsistent.
    pub fn update<S: ThetaDupSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        let new_default_table = |table: &ThetaDupHashTable| {
            ThetaDupHashTable::from_raw_parts(
                0,
                0,
                ResizeFactor::X1,
                1.0,
                table.theta(),
                table.hash_seed(),
                table.is_empty(),
            )
        };

        // an empty intersection is terminal
        if self.table.is_empty() {
            return Ok(());
        }

        if !sketch.is_empty() && sketch.seed_hash() != self.table.seed_hash() {
            return Err(Error::seed_mismatch(
                self.table.seed_hash(),
                sketch.seed_hash(),
            ));
        }

        self.table
            .set_empty(self.table.is_empty() || sketch.is_empty());
        let theta = if self.table.is_empty() {
            MAX_THETA
        } else {
            self.table.theta().min(sketch.theta64())
        };
        self.table.set_theta(theta);

        if self.is_valid && self.table.num_retained() == 0 {
            return Ok(());
        }

        if sketch.num_retained() == 0 {
            self.is_valid = true;
            self.table = new_default_table(&self.table);
            return Ok(());
        }

        if !self.is_valid {
            // first update, copy the incoming sketch
            self.is_valid = true;
            let lg_size =
                lg_size_from_count(sketch.num_retained() as usize, REBUILD_THRESHOLD);
            self.table = ThetaDupHashTable::from_raw_parts(
                lg_size,
                lg_size - 1,
                ResizeFactor::X1,
                1.0,
                self.table.theta(),
                self.table.hash_seed(),
                self.table.is_empty(),
            );
            for (hash, _) in sketch.iter() {
                self.table.load_entry(hash, 1)?;
            }
            // Safety check.
            if self.table.num_retained() != sketch.num_retained() {
                return Err(Error::invalid_argument(
                    "num entries mismatch, possibly corrupted input sketch",
                ));
            }
        } else {
            let max_matches = self.table.num_retained().min(sketch.num_retained()) as usize;
            let mut matched_entries = Vec::with_capacity(max_matches);
            let mut count = 0u32;
            for (hash, _) in sketch.iter() {
                if hash < self.table.theta() {
                    if self.table.contains_hash(hash) {
                        if matched_entries.len() == max_matches {
                            return Err(Error::invalid_argument(
                                "max matches exceeded, possibly corrupted input sketch",
                            ));
                        }
                        matched_entries.push(hash);
                    }
                } else if sketch.is_ordered() {
                    break; // early stop for ordered sketches
                }
                count += 1;
            }
            // Safety check.
            if count > sketch.num_retained() {
                return Err(Error::invalid_argument(
                    "more keys than expected, possibly corrupted input sketch",
                ));
            } else if !sketch.is_ordered() && count < sketch.num_retained() {
                return Err(Error::invalid_argument(
                    "fewer keys than expected, possibly corrupted input sketch",
                ));
            }
            if matched_entries.is_empty() {
                self.table = new_default_table(&self.table);
                if self.table.theta() == MAX_THETA {
                    self.table.set_empty(true);
                }
            } else {
                let lg_size = lg_size_from_count(matched_entries.len(), REBUILD_THRESHOLD);
                self.table = ThetaDupHashTable::from_raw_parts(
                    lg_size,
                    lg_size - 1,
                    ResizeFactor::X1,
                    1.0,
                    self.table.theta(),
                    self.table.hash_seed(),
                    self.table.is_empty(),
                );
                for hash in matched_entries {
                    self.table.load_entry(hash, 1)?;
                }
            }
        }
        Ok(())
    }

    /// Returns whether this operator has received at least one update.
    pub fn has_result(&self) -> bool {
        self.is_valid
    }

    /// Returns the intersection result as a compact sketch.
    ///
    /// # Panics
    ///
    /// Panics if called before the first [`update`](Self::update).
    pub fn result(&self, ordered: bool) -> CompactThetaDupSketch {
        assert!(
            self.is_valid,
            "ThetaDupIntersection::result() called before first update()"
        );
        let mut entries: Vec<(u64, u64)> = self.table.iter().map(|e| (e.0, 1)).collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaDupSketch::from_parts(
            self.table.theta(),
            entries,
            self.table.seed_hash(),
            self.table.is_empty(),
            ordered,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theta::UpdateThetaDupSketch;

    #[test]
    fn test_has_result_state_machine() {
        let mut a = UpdateThetaDupSketch::builder().build().unwrap();
        a.update("x");

        let mut intersection = ThetaDupIntersection::new_with_default_seed();
        assert!(!intersection.has_result());
        intersection.update(&a).unwrap();
        assert!(intersection.has_result());
        assert_eq!(intersection.result(true).estimate(), 1.0);
    }

    #[test]
    fn test_result_before_update_panics() {
        let intersection = ThetaDupIntersection::new(123);
        let result = std::panic::catch_unwind(|| {
            let _ = intersection.result(true);
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_terminal_empty_state_ignores_future_updates() {
        let empty = UpdateThetaDupSketch::builder().build().unwrap();
        let mut non_empty = UpdateThetaDupSketch::builder().build().unwrap();
        non_empty.update("x");

        let mut intersection = ThetaDupIntersection::new_with_default_seed();
        intersection.update(&empty).unwrap();
        intersection.update(&non_empty).unwrap();

        let result = intersection.result(true);
        assert!(result.is_empty());
        assert_eq!(result.estimate(), 0.0);
    }

    #[test]
    fn test_seed_mismatch_for_non_empty_input() {
        let mut other_seed = UpdateThetaDupSketch::builder().seed(2).build().unwrap();
        other_seed.update("value");
        let mut intersection = ThetaDupIntersection::new(1);
        let err = intersection.update(&other_seed).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SeedMismatch);
    }

    #[test]
    fn test_empty_sketch_with_other_seed_is_accepted() {
        let empty_other_seed = UpdateThetaDupSketch::builder().seed(2).build().unwrap();
        let mut intersection = ThetaDupIntersection::new(1);
        intersection.update(&empty_other_seed).unwrap();
        assert!(intersection.has_result());
        assert!(intersection.result(true).is_empty());
    }
}
