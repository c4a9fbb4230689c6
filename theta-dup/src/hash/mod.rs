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

//! Hashing of input values.
//!
//! Sketches retain the high half of a 128-bit MurmurHash3, shifted right by
//! one so the value stays positive under a signed interpretation. Input
//! types are reduced to a canonical byte image first, following the
//! conventions shared by the Java and C++ sketch implementations, so that
//! the same logical value always lands on the same entry no matter which
//! integer width it arrived in.

mod murmurhash;

pub use murmurhash::murmur_hash3_x64_128;

use crate::common::canonical_double;

/// Default hash seed shared by sketches that do not configure their own.
pub const DEFAULT_UPDATE_SEED: u64 = 9001;

/// 16-bit fingerprint of a hash seed, stored in serialized headers so that
/// sketches built with incompatible seeds cannot be mixed.
pub fn compute_seed_hash(seed: u64) -> u16 {
    let (h1, _) = murmur_hash3_x64_128(&seed.to_le_bytes(), 0);
    h1 as u16
}

#[inline]
fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    let (h1, _) = murmur_hash3_x64_128(bytes, seed);
    // Logical shift keeps the value positive in the signed interpretation.
    h1 >> 1
}

/// Values accepted by sketch `update` and `remove`.
///
/// Integers are sign-widened to 64 bits and hashed as their little-endian
/// image, so `7u8`, `7i32` and `7i64` are the same element. Floats are
/// canonicalized first (`-0.0` equals `0.0`, all NaNs coincide). The empty
/// string produces no hash at all: feeding it to a sketch is a no-op.
pub trait Hashable {
    /// 63-bit hash of the canonical byte image, or `None` for inputs that do
    /// not participate.
    fn sketch_hash(&self, seed: u64) -> Option<u64>;
}

impl Hashable for u64 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        Some(hash_bytes(&self.to_le_bytes(), seed))
    }
}

impl Hashable for i64 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        Some(hash_bytes(&self.to_le_bytes(), seed))
    }
}

impl Hashable for u32 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        (*self as i32 as i64).sketch_hash(seed)
    }
}

impl Hashable for i32 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        (*self as i64).sketch_hash(seed)
    }
}

impl Hashable for u16 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        (*self as i16 as i64).sketch_hash(seed)
    }
}

impl Hashable for i16 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        (*self as i64).sketch_hash(seed)
    }
}

impl Hashable for u8 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        (*self as i8 as i64).sketch_hash(seed)
    }
}

impl Hashable for i8 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        (*self as i64).sketch_hash(seed)
    }
}

impl Hashable for f64 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        canonical_double(*self).sketch_hash(seed)
    }
}

impl Hashable for f32 {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        (*self as f64).sketch_hash(seed)
    }
}

impl Hashable for &str {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        Some(hash_bytes(self.as_bytes(), seed))
    }
}

impl Hashable for String {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        self.as_str().sketch_hash(seed)
    }
}

impl Hashable for &String {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        self.as_str().sketch_hash(seed)
    }
}

impl Hashable for &[u8] {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        Some(hash_bytes(self, seed))
    }
}

impl Hashable for Vec<u8> {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        self.as_slice().sketch_hash(seed)
    }
}

impl<const N: usize> Hashable for [u8; N] {
    fn sketch_hash(&self, seed: u64) -> Option<u64> {
        self.as_slice().sketch_hash(seed)
    }
}
