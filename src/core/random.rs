//! MT19937 with a serializable state.
//!
//! Every stochastic decision of a simulation draws from one `MersenneTwister`,
//! so that a seed fully determines a trajectory and a saved state resumes it
//! bit for bit. The derived draws intentionally keep the simple mappings of
//! the reference generator: `next_int` reduces by modulo and `next_double`
//! divides by 2^32.

use rand::SeedableRng;
use std::io::{self, Read, Write};

use crate::readwrite::binary::{BinaryRead, BinaryWrite};

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MersenneTwister {
    mt: Box<[u32; N]>,
    mti: usize,
}

impl MersenneTwister {
    /// Seed with the low 32 bits of `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = Self {
            mt: Box::new([0; N]),
            mti: N + 1,
        };
        rng.init_genrand(seed as u32);
        rng
    }

    #[cfg(test)]
    pub fn from_array(key: &[u32]) -> Self {
        let mut rng = Self::new(19_650_218);
        rng.init_by_array(key);
        rng
    }

    fn init_genrand(&mut self, seed: u32) {
        self.mt[0] = seed;
        for i in 1..N {
            let previous = self.mt[i - 1];
            self.mt[i] = 1_812_433_253u32
                .wrapping_mul(previous ^ (previous >> 30))
                .wrapping_add(i as u32);
        }
        self.mti = N;
    }

    #[cfg(test)]
    fn init_by_array(&mut self, key: &[u32]) {
        let mut i = 1;
        let mut j = 0;
        for _ in 0..N.max(key.len()) {
            let previous = self.mt[i - 1];
            self.mt[i] = (self.mt[i] ^ (previous ^ (previous >> 30)).wrapping_mul(1_664_525))
                .wrapping_add(key[j])
                .wrapping_add(j as u32);
            i += 1;
            j += 1;
            if i >= N {
                self.mt[0] = self.mt[N - 1];
                i = 1;
            }
            if j >= key.len() {
                j = 0;
            }
        }
        for _ in 0..N - 1 {
            let previous = self.mt[i - 1];
            self.mt[i] = (self.mt[i] ^ (previous ^ (previous >> 30)).wrapping_mul(1_566_083_941))
                .wrapping_sub(i as u32);
            i += 1;
            if i >= N {
                self.mt[0] = self.mt[N - 1];
                i = 1;
            }
        }
        self.mt[0] = 0x8000_0000;
    }

    fn twist(&mut self) {
        let mag01 = |y: u32| if y & 1 == 0 { 0 } else { MATRIX_A };
        for kk in 0..N - M {
            let y = (self.mt[kk] & UPPER_MASK) | (self.mt[kk + 1] & LOWER_MASK);
            self.mt[kk] = self.mt[kk + M] ^ (y >> 1) ^ mag01(y);
        }
        for kk in N - M..N - 1 {
            let y = (self.mt[kk] & UPPER_MASK) | (self.mt[kk + 1] & LOWER_MASK);
            self.mt[kk] = self.mt[kk + M - N] ^ (y >> 1) ^ mag01(y);
        }
        let y = (self.mt[N - 1] & UPPER_MASK) | (self.mt[0] & LOWER_MASK);
        self.mt[N - 1] = self.mt[M - 1] ^ (y >> 1) ^ mag01(y);
        self.mti = 0;
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.mti >= N {
            if self.mti == N + 1 {
                self.init_genrand(5489);
            }
            self.twist();
        }
        let mut y = self.mt[self.mti];
        self.mti += 1;
        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^= y >> 18;
        y
    }

    /// Uniform integer in `0..bound` by modulo reduction.
    pub fn next_int(&mut self, bound: u32) -> u32 {
        debug_assert!(bound > 0, "next_int bound must be positive");
        self.next_u32() % bound
    }

    /// Uniform index in `0..bound`.
    pub fn next_index(&mut self, bound: usize) -> usize {
        self.next_int(bound as u32) as usize
    }

    /// Uniform double in `[0, 1)` with 32 bits of resolution.
    pub fn next_double(&mut self) -> f64 {
        self.next_u32() as f64 * (1.0 / 4_294_967_296.0)
    }

    pub fn next_float(&mut self) -> f32 {
        self.next_double() as f32
    }

    /// Two draws concatenated, the first in the high word.
    pub fn next_long(&mut self) -> i64 {
        let high = self.next_u32() as u64;
        let low = self.next_u32() as u64;
        ((high << 32) | low) as i64
    }

    /// Fisher-Yates shuffle drawing `next_int(i)` from the back.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (2..=items.len()).rev() {
            let j = self.next_index(i);
            items.swap(i - 1, j);
        }
    }

    pub fn save_state(&self, writer: &mut impl Write) -> io::Result<()> {
        for &word in self.mt.iter() {
            writer.write_i64_be(word as i64)?;
        }
        writer.write_i32_be(self.mti as i32)
    }

    pub fn load_state(&mut self, reader: &mut impl Read) -> io::Result<()> {
        for word in self.mt.iter_mut() {
            *word = reader.read_i64_be()? as u32;
        }
        let mti = reader.read_i32_be()?;
        if mti < 0 || mti as usize > N + 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid generator index {mti}"),
            ));
        }
        self.mti = mti as usize;
        Ok(())
    }
}

impl SeedableRng for MersenneTwister {
    type Seed = [u8; 8];

    /// Little-endian seed bytes; only the low four bytes matter.
    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
