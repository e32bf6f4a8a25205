/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Candidate sampling for a fixed decimal digit length.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;

use crate::error::CertificationError;

/// The closed interval `[10^(d-1), 10^d - 1]` of integers with exactly `d`
/// decimal digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitRange {
    digits: u32,
    low: BigUint,
    high: BigUint,
    /// `high + 1`, the exclusive bound handed to the sampler.
    high_exclusive: BigUint,
}

impl DigitRange {
    pub fn new(digits: u32) -> Result<Self, CertificationError> {
        if digits == 0 {
            return Err(CertificationError::InvalidDigitCount(digits));
        }
        let ten = BigUint::from(10u32);
        let low = ten.pow(digits - 1);
        let high_exclusive = ten.pow(digits);
        let high = &high_exclusive - BigUint::one();
        Ok(Self {
            digits,
            low,
            high,
            high_exclusive,
        })
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn low(&self) -> &BigUint {
        &self.low
    }

    pub fn high(&self) -> &BigUint {
        &self.high
    }

    pub fn contains(&self, value: &BigUint) -> bool {
        value >= &self.low && value <= &self.high
    }

    /// Draws a uniformly random odd value in the range.
    ///
    /// An even draw is bumped to the next odd number. If that leaves the
    /// range the draw is discarded and repeated, never clamped.
    pub fn sample_odd<R: Rng + ?Sized>(&self, rng: &mut R) -> BigUint {
        loop {
            let mut candidate = rng.gen_biguint_range(&self.low, &self.high_exclusive);
            if candidate.is_even() {
                candidate += 1u32;
            }
            if candidate <= self.high {
                return candidate;
            }
        }
    }
}
