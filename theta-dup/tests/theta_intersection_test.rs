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

use googletest::assert_that;
use googletest::prelude::near;
use theta_dup::theta::CompactThetaDupSketch;
use theta_dup::theta::ThetaDupIntersection;
use theta_dup::theta::ThetaDupSketchView;
use theta_dup::theta::UpdateThetaDupSketch;

fn sketch_with_range(lg_k: u8, start: u64, count: u64) -> UpdateThetaDupSketch {
    let mut sketch = UpdateThetaDupSketch::builder().lg_k(lg_k).build().unwrap();
    for i in 0..count {
        sketch.update(start + i);
    }
    sketch
}

#[test]
fn test_exact_mode_intersection() {
    let a = sketch_with_range(15, 0, 10000);
    let b = sketch_with_range(15, 2000, 10000);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a).unwrap();
    intersection.update(&b).unwrap();

    let result = intersection.result(true);
    assert!(!result.is_empty());
    assert!(!result.is_estimation_mode());
    assert_eq!(result.estimate(), 8000.0);
}

#[test]
fn test_estimation_mode_intersection() {
    let a = sketch_with_range(12, 0, 10000);
    let b = sketch_with_range(12, 2000, 10000);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a).unwrap();
    intersection.update(&b).unwrap();

    let result = intersection.result(true);
    assert!(!result.is_empty());
    assert!(result.is_estimation_mode());
    assert_that!(result.estimate(), near(8000.0, 200.0));
}

#[test]
fn test_exact_half_overlap() {
    let a = sketch_with_range(12, 0, 1000);
    let b = sketch_with_range(12, 500, 1000);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a).unwrap();
    intersection.update(&b).unwrap();
    assert_eq!(intersection.result(true).estimate(), 500.0);
}

#[test]
fn test_exact_disjoint() {
    let a = sketch_with_range(12, 0, 1000);
    let b = sketch_with_range(12, 1000, 1000);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a).unwrap();
    intersection.update(&b).unwrap();

    let result = intersection.result(true);
    assert!(result.is_empty());
    assert!(!result.is_estimation_mode());
    assert_eq!(result.estimate(), 0.0);
}

#[test]
fn test_estimation_disjoint_is_not_marked_empty() {
    let a = sketch_with_range(12, 0, 10000);
    let b = sketch_with_range(12, 10000, 10000);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a).unwrap();
    intersection.update(&b).unwrap();

    let result = intersection.result(true);
    // theta stayed below the maximum, so this zero is an estimate
    assert!(!result.is_empty());
    assert!(result.is_estimation_mode());
    assert_eq!(result.estimate(), 0.0);
}

#[test]
fn test_ordered_compact_inputs() {
    let a = sketch_with_range(12, 0, 10000);
    let b = sketch_with_range(12, 5000, 10000);
    let ca = CompactThetaDupSketch::deserialize(&a.compact(true).serialize()).unwrap();
    let cb = CompactThetaDupSketch::deserialize(&b.compact(true).serialize()).unwrap();

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&ca).unwrap();
    intersection.update(&cb).unwrap();

    let result = intersection.result(true);
    assert!(result.is_estimation_mode());
    assert_that!(result.estimate(), near(5000.0, 5000.0 * 0.02));
}

#[test]
fn test_unordered_compact_inputs() {
    let a = sketch_with_range(12, 0, 1000);
    let b = sketch_with_range(12, 500, 1000);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a.compact(false)).unwrap();
    intersection.update(&b.compact(false)).unwrap();
    assert_eq!(intersection.result(true).estimate(), 500.0);
}

#[test]
fn test_result_ordering_flag() {
    let a = sketch_with_range(12, 0, 64);
    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a).unwrap();

    let ordered = intersection.result(true);
    assert!(ordered.is_ordered());
    let hashes: Vec<u64> = ordered.iter().map(|e| e.0).collect();
    assert!(hashes.is_sorted());
    assert!(!intersection.result(false).is_ordered());
}

#[test]
fn test_non_empty_input_with_no_retained_keys() {
    let mut sparse = UpdateThetaDupSketch::builder()
        .sampling_probability(0.001)
        .build()
        .unwrap();
    sparse.update(1u64);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&sparse).unwrap();

    let result = intersection.result(true);
    assert_eq!(result.num_retained(), 0);
    assert!(!result.is_empty());
    assert!(result.is_estimation_mode());
    assert!((result.theta() - 0.001).abs() < 1e-6);
    assert_eq!(result.estimate(), 0.0);
}

#[test]
fn test_intersection_result_round_trips() {
    let a = sketch_with_range(12, 0, 10000);
    let b = sketch_with_range(12, 2000, 10000);

    let mut intersection = ThetaDupIntersection::new_with_default_seed();
    intersection.update(&a).unwrap();
    intersection.update(&b).unwrap();

    let result = intersection.result(true);
    let restored = CompactThetaDupSketch::deserialize(&result.serialize()).unwrap();
    assert!(result.equals(&restored));
    assert_eq!(result.estimate(), restored.estimate());
}
