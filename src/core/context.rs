use rand::SeedableRng;
use std::io::{self, Read, Write};

use super::random::MersenneTwister;
use super::tables::ProbabilityTables;
use crate::config::Parameters;
use crate::readwrite::binary::{BinaryRead, BinaryWrite};

/// Everything a simulation shares across components: parameters, derived
/// tables, the single random number generator and the strain id counter.
#[derive(Clone, Debug)]
pub struct SimulationContext {
    pub parameters: Parameters,
    pub tables: ProbabilityTables,
    pub rng: MersenneTwister,
    next_strain_id: u32,
}

impl SimulationContext {
    /// Seeds the generator from `parameters.random_seed` as is.
    pub fn new(parameters: Parameters) -> Self {
        let tables = ProbabilityTables::new(&parameters);
        let rng = MersenneTwister::seed_from_u64(parameters.random_seed);
        Self {
            parameters,
            tables,
            rng,
            next_strain_id: 0,
        }
    }

    pub fn next_strain_id(&mut self) -> u32 {
        let id = self.next_strain_id;
        self.next_strain_id += 1;
        id
    }

    pub fn peek_strain_id(&self) -> u32 {
        self.next_strain_id
    }

    pub fn reseed(&mut self, seed: u64) {
        self.parameters.random_seed = seed;
        self.rng = MersenneTwister::seed_from_u64(seed);
    }

    pub fn save_state(&self, writer: &mut impl Write) -> io::Result<()> {
        self.rng.save_state(writer)?;
        writer.write_u32_be(self.next_strain_id)
    }

    pub fn load_state(&mut self, reader: &mut impl Read) -> io::Result<()> {
        self.rng.load_state(reader)?;
        self.next_strain_id = reader.read_u32_be()?;
        Ok(())
    }
}
