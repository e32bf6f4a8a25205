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

//! # Certification Engine
//!
//! Generates random primes with an exact number of decimal digits.
//!
//! Each attempt draws a uniformly random odd candidate from
//! `[10^(d-1), 10^d - 1]` using the operating system CSPRNG, discards it if a
//! prime up to 47 divides it, and otherwise runs Miller–Rabin with `rounds`
//! freshly drawn random bases. Attempts repeat until a candidate passes.
//!
//! ## Guarantees
//!
//! The result is a *probable* prime. A composite passes `rounds` independent
//! Miller–Rabin rounds with probability at most `4^-rounds`; with the default
//! of 40 rounds that is `2^-80`. The test is not deterministic and the result
//! is not a proof of primality.
//!
//! There is no cap on the number of candidates tried. By the prime number
//! theorem roughly one in `2.3 * d / 2` odd `d`-digit numbers is prime, so
//! the expected number of attempts is small, but the worst case is unbounded.

pub mod candidate;
pub mod miller_rabin;

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::Rng;
use tracing::trace;

use crate::error::CertificationError;
use candidate::DigitRange;

/// Miller–Rabin rounds used by [`CertificationEngine::default`].
pub const DEFAULT_ROUNDS: u32 = 40;

/// Anything that can produce certified primes of a given digit length.
///
/// The worker obtains primes through this trait, so tests can substitute a
/// scripted source.
pub trait PrimeSource: Send + Sync {
    /// Returns a prime with exactly `digits` decimal digits.
    ///
    /// This call may block for a while and should run off the async runtime.
    fn generate(&self, digits: u32) -> Result<BigUint, CertificationError>;
}

/// Random probable-prime generator backed by Miller–Rabin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificationEngine {
    rounds: u32,
}

impl Default for CertificationEngine {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
        }
    }
}

impl CertificationEngine {
    /// Creates an engine that runs `rounds` Miller–Rabin rounds per candidate.
    pub fn new(rounds: u32) -> Result<Self, CertificationError> {
        if rounds == 0 {
            return Err(CertificationError::InvalidRounds);
        }
        Ok(Self { rounds })
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// `k` such that a composite is accepted with probability at most `2^-k`.
    pub fn false_positive_exponent(&self) -> u32 {
        self.rounds.saturating_mul(2)
    }

    /// Generates a probable prime with exactly `digit_count` decimal digits.
    ///
    /// # Errors
    /// [`CertificationError::InvalidDigitCount`] if `digit_count` is zero.
    pub fn generate_prime(&self, digit_count: u32) -> Result<BigUint, CertificationError> {
        self.generate_prime_with(digit_count, &mut OsRng)
    }

    /// [`generate_prime`](Self::generate_prime) with a caller-supplied RNG.
    pub fn generate_prime_with<R: Rng + ?Sized>(
        &self,
        digit_count: u32,
        rng: &mut R,
    ) -> Result<BigUint, CertificationError> {
        let range = DigitRange::new(digit_count)?;
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            let candidate = range.sample_odd(rng);
            if miller_rabin::is_probable_prime(&candidate, self.rounds, rng) {
                trace!(
                    digits = digit_count,
                    attempts,
                    "Certified probable prime"
                );
                return Ok(candidate);
            }
        }
    }

    /// The engine's own primality check, using the OS CSPRNG for bases.
    pub fn is_probable_prime(&self, n: &BigUint) -> bool {
        miller_rabin::is_probable_prime(n, self.rounds, &mut OsRng)
    }
}

impl PrimeSource for CertificationEngine {
    fn generate(&self, digits: u32) -> Result<BigUint, CertificationError> {
        self.generate_prime(digits)
    }
}
