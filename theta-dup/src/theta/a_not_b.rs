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

//! Set difference of theta-dup sketches.

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::CompactThetaDupSketch;
use crate::theta::ThetaDupSketchView;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::REBUILD_THRESHOLD;
use crate::theta::hash_table::ThetaDupHashTable;
use crate::theta::hash_table::lg_size_from_count;

/// Computes A-not-B: the entries of sketch A that are not in sketch B,
/// restricted to hashes below the smaller of the two thetas.
#[derive(Debug)]
pub struct ThetaDupANotB {
    seed: u64,
}

impl ThetaDupANotB {
    /// Creates a new operator for the given `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Creates a new operator with the default seed.
    pub fn new_with_default_seed() -> Self {
        Self::new(DEFAULT_UPDATE_SEED)
    }

    /// Compute the difference of two sketches as a compact sketch.
    ///
    /// # Errors
    ///
    /// `SeedMismatch` if a non-empty input was built with a different seed;
    /// `InvalidArgument` or `LogicFault` if an input sketch turns out to be
    /// internally inconsistent.
    pub fn compute<A, B>(
        &self,
        a: &A,
        b: &B,
        ordered: bool,
    ) -> Result<CompactThetaDupSketch, Error>
    where
        A: ThetaDupSketchView,
        B: ThetaDupSketchView,
    {
        let seed_hash = compute_seed_hash(self.seed);
        if !a.is_empty() && a.seed_hash() != seed_hash {
            return Err(Error::seed_mismatch(seed_hash, a.seed_hash()));
        }
        if !b.is_empty() && b.seed_hash() != seed_hash {
            return Err(Error::seed_mismatch(seed_hash, b.seed_hash()));
        }

        if a.is_empty() {
            return Ok(CompactThetaDupSketch::from_parts(
                MAX_THETA,
                Vec::new(),
                seed_hash,
                true,
                ordered,
            ));
        }

        let theta = a.theta64().min(b.theta64());
        let b_hashes: Vec<u64> = b.iter().map(|e| e.0).filter(|&h| h < theta).collect();

        let mut entries: Vec<(u64, u64)> = if b_hashes.is_empty() {
            a.iter().filter(|e| e.0 < theta).map(|e| (e.0, 1)).collect()
        } else {
            // probe-table membership over B's retained hashes
            let lg_size = lg_size_from_count(b_hashes.len(), REBUILD_THRESHOLD);
            let mut b_table = ThetaDupHashTable::from_raw_parts(
                lg_size,
                lg_size - 1,
                ResizeFactor::X1,
                1.0,
                MAX_THETA,
                self.seed,
                false,
            );
            for hash in b_hashes {
                b_table.load_entry(hash, 1)?;
            }
            a.iter()
                .filter(|e| e.0 < theta && !b_table.contains_hash(e.0))
                .map(|e| (e.0, 1))
                .collect()
        };
        if ordered {
            entries.sort_unstable();
        }

        Ok(CompactThetaDupSketch::from_parts(
            theta, entries, seed_hash, false, ordered,
        ))
    }
}
