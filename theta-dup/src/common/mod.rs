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

//! Common types shared across the sketch and its set operations.

pub mod binomial_bounds;
pub mod random;

/// Number of standard deviations for confidence bounds.
///
/// Corresponds to approximately 68%, 95% and 99.7% confidence intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumStdDev {
    One = 1,
    Two = 2,
    Three = 3,
}

impl NumStdDev {
    /// The number of standard deviations as a float.
    pub fn value(self) -> f64 {
        self as i32 as f64
    }
}

/// Growth ratio applied when the internal hash table resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFactor {
    /// Grow by the minimum step (one doubling at a time).
    X1 = 0,
    /// Double the table on each resize.
    X2 = 1,
    /// Quadruple the table on each resize.
    X4 = 2,
    /// Grow the table eightfold on each resize.
    #[default]
    X8 = 3,
}

impl ResizeFactor {
    /// log2 of the growth ratio.
    pub fn lg_value(self) -> u8 {
        self as u8
    }

    /// Decode from the two-bit field of the serialized preamble.
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => ResizeFactor::X1,
            1 => ResizeFactor::X2,
            2 => ResizeFactor::X4,
            _ => ResizeFactor::X8,
        }
    }
}

/// Canonical 64-bit image of a double, compatible with Java's
/// `Double.doubleToLongBits` conventions used across sketch implementations:
/// `-0.0` collapses to `0.0` and every NaN collapses to the single pattern
/// `0x7ff8000000000000`.
pub fn canonical_double(value: f64) -> i64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        0x7ff8000000000000
    } else {
        value.to_bits() as i64
    }
}
