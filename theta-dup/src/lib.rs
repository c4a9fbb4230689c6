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
//! A probabilistic estimator of the number of distinct items in a stream
//! that, unlike the classic theta sketch, also supports removing items. It
//! retains at most about `2^lg_k` sampled entries, each a
//! `(hash, multiplicity)` pair, so memory stays sublinear in the stream
//! size while insertions of already-present elements can later be undone.
//!
//! # Example
//!
//! ```
//! use theta_dup::theta::ThetaDupSketchView;
//! use theta_dup::theta::UpdateThetaDupSketch;
//!
//! let mut sketch = UpdateThetaDupSketch::builder().lg_k(12).build().unwrap();
//! for i in 0..1000 {
//!     sketch.update(i);
//! }
//! sketch.update(0); // a duplicate does not change the estimate
//! assert_eq!(sketch.estimate(), 1000.0);
//!
//! sketch.remove(0); // one copy of 0 is still present
//! assert_eq!(sketch.estimate(), 1000.0);
//! sketch.remove(0);
//! assert_eq!(sketch.estimate(), 999.0);
//! ```
//!
//! Compact snapshots serialize to a versioned little-endian format and feed
//! the [`theta::ThetaDupUnion`], [`theta::ThetaDupIntersection`] and
//! [`theta::ThetaDupANotB`] set operations.

mod codec;
pub mod common;
pub mod error;
pub mod hash;
pub mod theta;
