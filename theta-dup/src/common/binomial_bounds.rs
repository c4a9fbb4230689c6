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

//! Confidence bounds for the number of distinct items, treating the retained
//! count as the number of successes in a binomial experiment with success
//! probability theta.
//!
//! The bounds use the classic continuity-corrected formulas: solve for the
//! population size at which the observed count sits the requested number of
//! standard deviations from the mean of `Binomial(n, theta)`.

use crate::common::NumStdDev;
use crate::error::Error;

fn check_theta(theta: f64) -> Result<(), Error> {
    if !(theta > 0.0 && theta <= 1.0) {
        return Err(
            Error::invalid_argument("theta must be in (0, 1]").with_context("theta", theta)
        );
    }
    Ok(())
}

fn cont_classic_lb(num_samples: f64, theta: f64, num_std_devs: f64) -> f64 {
    let n_hat = (num_samples - 0.5) / theta;
    let b = num_std_devs * ((1.0 - theta) / theta).sqrt();
    let d = 0.5 * b * (b * b + 4.0 * n_hat).sqrt();
    let center = n_hat + 0.5 * (b * b);
    center - d
}

fn cont_classic_ub(num_samples: f64, theta: f64, num_std_devs: f64) -> f64 {
    let n_hat = (num_samples + 0.5) / theta;
    let b = num_std_devs * ((1.0 - theta) / theta).sqrt();
    let d = 0.5 * b * (b * b + 4.0 * n_hat).sqrt();
    let center = n_hat + 0.5 * (b * b);
    center + d
}

/// Approximate lower bound on the number of distinct items.
///
/// # Errors
///
/// Returns `InvalidArgument` if `theta` is outside `(0, 1]`.
pub fn lower_bound(num_samples: u64, theta: f64, num_std_devs: NumStdDev) -> Result<f64, Error> {
    check_theta(theta)?;
    if theta == 1.0 || num_samples == 0 {
        return Ok(num_samples as f64);
    }
    let raw = cont_classic_lb(num_samples as f64, theta, num_std_devs.value());
    // Each retained entry is a real distinct item, so the truth is never
    // below the observed count.
    Ok(raw.max(num_samples as f64))
}

/// Approximate upper bound on the number of distinct items.
///
/// # Errors
///
/// Returns `InvalidArgument` if `theta` is outside `(0, 1]`.
pub fn upper_bound(num_samples: u64, theta: f64, num_std_devs: NumStdDev) -> Result<f64, Error> {
    check_theta(theta)?;
    if theta == 1.0 {
        return Ok(num_samples as f64);
    }
    Ok(cont_classic_ub(num_samples as f64, theta, num_std_devs.value()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_theta_collapses() {
        assert_eq!(lower_bound(100, 1.0, NumStdDev::Two).unwrap(), 100.0);
        assert_eq!(upper_bound(100, 1.0, NumStdDev::Two).unwrap(), 100.0);
    }

    #[test]
    fn test_bounds_bracket_estimate() {
        for &(n, theta) in &[(100u64, 0.5), (1000, 0.1), (5000, 0.01), (1, 0.9)] {
            let estimate = n as f64 / theta;
            for ns in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
                let lb = lower_bound(n, theta, ns).unwrap();
                let ub = upper_bound(n, theta, ns).unwrap();
                assert!(lb <= estimate, "lb {lb} > estimate {estimate}");
                assert!(ub >= estimate, "ub {ub} < estimate {estimate}");
                assert!(lb >= n as f64);
            }
        }
    }

    #[test]
    fn test_wider_interval_for_more_std_devs() {
        let lb1 = lower_bound(1000, 0.1, NumStdDev::One).unwrap();
        let lb3 = lower_bound(1000, 0.1, NumStdDev::Three).unwrap();
        let ub1 = upper_bound(1000, 0.1, NumStdDev::One).unwrap();
        let ub3 = upper_bound(1000, 0.1, NumStdDev::Three).unwrap();
        assert!(lb3 <= lb1);
        assert!(ub3 >= ub1);
    }

    #[test]
    fn test_zero_samples() {
        assert_eq!(lower_bound(0, 0.5, NumStdDev::Two).unwrap(), 0.0);
        assert!(upper_bound(0, 0.5, NumStdDev::Two).unwrap() >= 0.0);
    }

    #[test]
    fn test_invalid_theta() {
        assert!(lower_bound(10, 0.0, NumStdDev::One).is_err());
        assert!(upper_bound(10, 1.5, NumStdDev::One).is_err());
    }
}
