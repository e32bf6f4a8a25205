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

//! Trial division and the Miller–Rabin probable-prime test.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

/// Primes used for the cheap screen that runs before Miller–Rabin.
pub const SMALL_PRIMES: [u32; 15] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47];

/// Outcome of trial division by [`SMALL_PRIMES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// The value is itself one of the small primes.
    Prime,
    /// A small prime divides the value.
    Composite,
    /// Nothing conclusive; run the full test.
    Inconclusive,
}

pub fn small_prime_screen(n: &BigUint) -> Screen {
    for &p in SMALL_PRIMES.iter() {
        if *n == BigUint::from(p) {
            return Screen::Prime;
        }
        if (n % p).is_zero() {
            return Screen::Composite;
        }
    }
    Screen::Inconclusive
}

/// Runs `rounds` Miller–Rabin rounds with independently drawn random bases
/// in `[2, n - 2]`.
///
/// Requires an odd `n > 4`. A composite survives all rounds with probability
/// at most `4^-rounds`.
pub fn miller_rabin<R: Rng + ?Sized>(n: &BigUint, rounds: u32, rng: &mut R) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let n_minus_one = n - &one;

    // n - 1 = d * 2^s with d odd
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..rounds {
        let base = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = base.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Full check: small values, trial division, then Miller–Rabin.
pub fn is_probable_prime<R: Rng + ?Sized>(n: &BigUint, rounds: u32, rng: &mut R) -> bool {
    if *n < BigUint::from(2u32) {
        return false;
    }
    match small_prime_screen(n) {
        Screen::Prime => true,
        Screen::Composite => false,
        Screen::Inconclusive => {
            debug_assert!(n.is_odd());
            miller_rabin(n, rounds, rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn check(value: u64) -> bool {
        let mut rng = StdRng::seed_from_u64(42);
        is_probable_prime(&BigUint::from(value), 40, &mut rng)
    }

    #[test]
    fn test_small_values() {
        assert!(!check(0));
        assert!(!check(1));
        assert!(check(2));
        assert!(check(3));
        assert!(!check(4));
        assert!(check(47));
        assert!(!check(49));
        assert!(check(53));
    }

    #[test]
    fn test_screen() {
        assert_eq!(small_prime_screen(&BigUint::from(13u32)), Screen::Prime);
        assert_eq!(small_prime_screen(&BigUint::from(91u32)), Screen::Composite);
        assert_eq!(small_prime_screen(&BigUint::from(2209u32)), Screen::Composite);
        assert_eq!(small_prime_screen(&BigUint::from(53u32)), Screen::Inconclusive);
    }

    #[test]
    fn test_known_primes() {
        for p in [
            1_000_000_007u64,
            999_999_999_989,
            2_305_843_009_213_693_951,
            18_446_744_073_709_551_557,
        ] {
            assert!(check(p), "{p} should be prime");
        }
    }

    #[test]
    fn test_carmichael_numbers_and_strong_pseudoprimes_rejected() {
        // 3215031751 is a strong pseudoprime to bases 2, 3, 5 and 7
        for c in [561u64, 41_041, 825_265, 321_197_185, 3_215_031_751, 3_825_123_056_546_413_051] {
            assert!(!check(c), "{c} should be composite");
        }
    }

    #[test]
    fn test_product_of_large_primes_rejected() {
        let p = BigUint::from(1_000_000_007u64);
        let q = BigUint::from(999_999_999_989u64);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!is_probable_prime(&(p * q), 40, &mut rng));
    }

    #[test]
    fn test_large_mersenne_prime() {
        // 2^127 - 1
        let m127 = (BigUint::one() << 127u32) - BigUint::one();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(is_probable_prime(&m127, 40, &mut rng));
        // 2^128 + 1 = 59649589127497217 * 5704689200685129054721
        let f7 = (BigUint::one() << 128u32) + BigUint::one();
        assert!(!is_probable_prime(&f7, 40, &mut rng));
    }
}
