// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Small collection of generators used as stream sources.
//! They feed [`crate::stream::RngStream`] for the command line tool and the
//! crate's own tests; the battery itself makes no assumption about them.

use rand::{RngCore, SeedableRng};

/// General trait for PRNGs
pub trait RNG {
    /// Initialize with specified seed.
    fn new(seed: u64) -> Self;
    /// Generate u32 and advance the state one step.
    fn next_u32(&mut self) -> u32;
    /// Generate u64 and advance the state one step.
    /// For generators that dont support full u64 might advance
    /// state more than one step.
    fn next(&mut self) -> u64;
    /// Reset to inital state, equivalent to replacing with ::new(seed).
    fn reseed(&mut self, seed: u64);
}

/// The rand crates standard generator.
pub struct ReferenceRand {
    rng: rand::rngs::StdRng,
}

impl RNG for ReferenceRand {
    fn new(seed: u64) -> Self {
        ReferenceRand {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = rand::rngs::StdRng::seed_from_u64(seed);
    }
}

// Xorshift PRNGs
pub mod xorshift {
    use super::RNG;
    #[derive(Debug, Copy, Clone)]
    pub struct XorShift128 {
        state: [u32; 4],
    }

    fn initial_state(seed: u64) -> [u32; 4] {
        // An all zero state never leaves zero.
        let seed = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        [
            seed as u32,
            (seed >> 32) as u32,
            seed as u32,
            (seed >> 32) as u32,
        ]
    }

    impl RNG for XorShift128 {
        fn new(seed: u64) -> Self {
            XorShift128 {
                state: initial_state(seed),
            }
        }

        fn next_u32(&mut self) -> u32 {
            let mut t: u32 = self.state[3];
            let s: u32 = self.state[0];
            self.state[3] = self.state[2];
            self.state[2] = self.state[1];
            self.state[1] = s;
            t ^= t << 11;
            t ^= t >> 8;
            self.state[0] = t ^ s ^ (s >> 19);
            self.state[0]
        }

        fn next(&mut self) -> u64 {
            let a: u64 = self.next_u32() as u64;
            let b: u64 = self.next_u32() as u64;
            (a << 32) | b
        }

        fn reseed(&mut self, seed: u64) {
            self.state = initial_state(seed);
        }
    }
}

// Linear congruential generators
pub mod lcg {
    use super::RNG;
    /// Ill concieved early LCG, that fails the spectral test badly.
    /// Only has output space of 0-2**31-1.
    /// The .next() method uses three RANDU calls to fill the 64 bit output space,
    /// The .next_u32() method uses two RANDU calls.
    #[derive(Debug, Copy, Clone)]
    pub struct Randu {
        state: u32,
    }

    impl RNG for Randu {
        fn new(seed: u64) -> Self {
            Randu {
                state: seed as u32 | 1,
            }
        }

        fn next_u32(&mut self) -> u32 {
            let a: u32 = self.next_small();
            let b: u32 = self.next_small();
            a << 15 | (b & 0xffff)
        }

        fn next(&mut self) -> u64 {
            let a: u64 = self.next_small() as u64;
            let b: u64 = self.next_small() as u64;
            let c: u64 = self.next_small() as u64;
            (a << 42) | ((b & 0x3fffff) << 20) | (c & 0xfffff)
        }

        fn reseed(&mut self, seed: u64) {
            self.state = seed as u32 | 1;
        }
    }
    impl Randu {
        /// Generate a number in the original reduced output space of 0 to 2**31 - 1.
        fn next_small(&mut self) -> u32 {
            self.state = self.state.wrapping_mul(65539) & 0x7fffffff;
            self.state
        }
    }
}

/// Degenerate generators that every test in the battery should reject.
pub mod testgens {
    use super::RNG;

    pub struct OnlyOne {}
    impl RNG for OnlyOne {
        fn new(_seed: u64) -> Self {
            OnlyOne {}
        }

        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }

        fn next(&mut self) -> u64 {
            u64::MAX
        }

        fn reseed(&mut self, _seed: u64) {}
    }

    pub struct OnlyZero {}
    impl RNG for OnlyZero {
        fn new(_seed: u64) -> Self {
            OnlyZero {}
        }

        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next(&mut self) -> u64 {
            0
        }

        fn reseed(&mut self, _seed: u64) {}
    }

    pub struct AlternatingBytes {}
    impl RNG for AlternatingBytes {
        fn new(_seed: u64) -> Self {
            AlternatingBytes {}
        }

        fn next_u32(&mut self) -> u32 {
            0xff00ff00
        }

        fn next(&mut self) -> u64 {
            0xff00ff00ff00ff00
        }

        fn reseed(&mut self, _seed: u64) {}
    }
}
