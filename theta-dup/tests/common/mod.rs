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

//! Seeded data-stream generators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use theta_dup::common::random::RandomSource;
use theta_dup::common::random::XorShift64;

/// Random string stream: alphanumeric strings with lengths drawn uniformly
/// from `[min_len, max_len]`.
pub struct GenString {
    rng: XorShift64,
    min_len: usize,
    max_len: usize,
    pool: Vec<u8>,
}

impl GenString {
    pub fn new() -> Self {
        Self::with_params(1, 6, 20)
    }

    pub fn with_params(seed: u64, min_len: usize, max_len: usize) -> Self {
        let mut pool = Vec::new();
        pool.extend(b'0'..=b'9');
        pool.extend(b'A'..=b'Z');
        pool.extend(b'a'..=b'z');
        Self {
            rng: XorShift64::seeded(seed),
            min_len,
            max_len,
            pool,
        }
    }

    /// Returns the next random string of the stream.
    pub fn next(&mut self) -> String {
        let span = (self.max_len - self.min_len + 1) as u64;
        let len = self.min_len + (self.rng.next_u64() % span) as usize;
        let mut out = String::with_capacity(len);
        for _ in 0..len {
            let idx = (self.rng.next_u64() % self.pool.len() as u64) as usize;
            out.push(self.pool[idx] as char);
        }
        out
    }
}

/// Mixed add/delete stream over a bounded pool of integers, tracking the
/// true multiset so tests can compare estimates against ground truth.
pub struct GenDataStream {
    rng: XorShift64,
    pool_size: u64,
    // count per live element
    current_distinct: HashMap<u64, u64>,
    // every live occurrence, duplicates included
    all_elements: Vec<u64>,
}

impl GenDataStream {
    pub fn new(pool_size: u64, seed: u64) -> Self {
        Self {
            rng: XorShift64::seeded(seed),
            pool_size,
            current_distinct: HashMap::new(),
            all_elements: Vec::new(),
        }
    }

    /// Generate `num` additions and return them.
    pub fn add_batch(&mut self, num: usize) -> Vec<u64> {
        let mut stream = Vec::with_capacity(num);
        for _ in 0..num {
            let x = 1 + self.rng.next_u64() % self.pool_size;
            self.all_elements.push(x);
            *self.current_distinct.entry(x).or_insert(0) += 1;
            stream.push(x);
        }
        stream
    }

    /// Pick `num` live occurrences at random, delete them from the tracked
    /// multiset and return them.
    pub fn delete_batch(&mut self, num: usize) -> Vec<u64> {
        let mut stream = Vec::with_capacity(num);
        for _ in 0..num {
            if self.all_elements.is_empty() {
                break;
            }
            let idx = (self.rng.next_u64() % self.all_elements.len() as u64) as usize;
            let x = self.all_elements.swap_remove(idx);
            match self.current_distinct.get_mut(&x) {
                Some(count) if *count > 1 => *count -= 1,
                _ => {
                    self.current_distinct.remove(&x);
                }
            }
            stream.push(x);
        }
        stream
    }

    /// True number of distinct live elements.
    pub fn num_distinct(&self) -> usize {
        self.current_distinct.len()
    }
}
