use derive_more::Display;
use std::collections::HashMap;
use std::io::{self, Read, Write};

use super::linked::BucketKey;
use super::strain::{CODONS_PER_EPITOPE, NUM_CODONS, Strain, StrainRef};
use crate::encoding::AminoAcid;
use crate::readwrite::binary::{BinaryRead, BinaryWrite};

/// Days after infection during which a host incubates.
pub const INCUBATION_DAYS: i32 = 2;

/// Days after infection until a host recovers.
pub const SICK_DAYS: i32 = 6;

pub const IMMUNE_HISTORY_BYTES: usize = (NUM_CODONS * AminoAcid::RESIDUES).div_ceil(8);

/// Sentinel written to checkpoints for hosts that were never infected.
pub const NEVER_INFECTED: i32 = i32::MIN;

/// Position of a host: patch index and index within the patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[display("{patch}:{local}")]
pub struct HostId {
    pub patch: u32,
    pub local: u32,
}

impl HostId {
    pub fn new(patch: usize, local: usize) -> Self {
        Self {
            patch: patch as u32,
            local: local as u32,
        }
    }

    /// `(patch << 24) | local`, the identity used for hashing and checkpoints.
    pub fn packed(&self) -> u32 {
        (self.patch << 24) | self.local
    }

    pub fn unpack(packed: u32) -> Self {
        Self {
            patch: packed >> 24,
            local: packed & 0x00ff_ffff,
        }
    }
}

impl BucketKey for HostId {
    fn bucket_hash(&self) -> u32 {
        self.packed()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    Naive,
    Incubating,
    Infectious,
    Recovered,
}

#[derive(Clone, Debug)]
pub struct Host {
    last_infection_date: Option<i32>,
    last_infection_strain: Option<StrainRef>,
    immune_history: [u8; IMMUNE_HISTORY_BYTES],
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

fn immune_bit(epitope: usize, codon: usize, amino_acid: AminoAcid) -> usize {
    epitope * CODONS_PER_EPITOPE * AminoAcid::RESIDUES
        + codon * AminoAcid::RESIDUES
        + amino_acid.index()
}

impl Host {
    pub fn new() -> Self {
        Self {
            last_infection_date: None,
            last_infection_strain: None,
            immune_history: [0; IMMUNE_HISTORY_BYTES],
        }
    }

    /// Forget every infection. Only a host that turns over is reset.
    pub fn reset(&mut self) {
        self.last_infection_date = None;
        self.last_infection_strain = None;
        self.immune_history = [0; IMMUNE_HISTORY_BYTES];
    }

    pub fn last_infection_date(&self) -> Option<i32> {
        self.last_infection_date
    }

    pub fn set_last_infection_date(&mut self, date: i32) {
        self.last_infection_date = Some(date);
    }

    pub fn last_infection_strain(&self) -> Option<&StrainRef> {
        self.last_infection_strain.as_ref()
    }

    fn days_since_infection(&self, date: i32) -> Option<i32> {
        self.last_infection_date.map(|last| date - last)
    }

    pub fn is_incubating(&self, date: i32) -> bool {
        self.days_since_infection(date)
            .is_some_and(|days| days < INCUBATION_DAYS)
    }

    pub fn is_infectious(&self, date: i32) -> bool {
        self.days_since_infection(date)
            .is_some_and(|days| (INCUBATION_DAYS..SICK_DAYS).contains(&days))
    }

    pub fn is_sick(&self, date: i32) -> bool {
        self.days_since_infection(date)
            .is_some_and(|days| days < SICK_DAYS)
    }

    pub fn state(&self, date: i32) -> HostState {
        match self.days_since_infection(date) {
            None => HostState::Naive,
            Some(days) if days < INCUBATION_DAYS => HostState::Incubating,
            Some(days) if days < SICK_DAYS => HostState::Infectious,
            Some(_) => HostState::Recovered,
        }
    }

    /// Infect with `strain` and record its amino acids in the immune history.
    pub fn infect(&mut self, date: i32, strain: &StrainRef) {
        self.last_infection_date = Some(date);
        self.last_infection_strain = Some(strain.clone());
        for (epitope, codon, amino_acid) in strain.phenotype().sites() {
            let bit = immune_bit(epitope, codon, amino_acid);
            self.immune_history[bit / 8] |= 1 << (bit % 8);
        }
    }

    /// An exposure that did not lead to infection moves the last infection
    /// of an immune host to at most `SICK_DAYS` before `date`.
    pub fn boost(&mut self, date: i32) {
        if let Some(last) = self.last_infection_date.as_mut() {
            *last = (*last).max(date - SICK_DAYS);
        }
    }

    /// Number of codons whose amino acid in `strain` this host has never seen.
    pub fn immunity_distance(&self, strain: &Strain) -> u32 {
        strain
            .phenotype()
            .sites()
            .filter(|&(epitope, codon, amino_acid)| {
                let bit = immune_bit(epitope, codon, amino_acid);
                self.immune_history[bit / 8] & (1 << (bit % 8)) == 0
            })
            .count() as u32
    }

    pub fn save_state(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_i32_be(self.last_infection_date.unwrap_or(NEVER_INFECTED))?;
        writer.write_bool(self.last_infection_strain.is_some())?;
        if let Some(strain) = &self.last_infection_strain {
            writer.write_u32_be(strain.id())?;
        }
        writer.write_all(&self.immune_history)
    }

    pub fn load_state(
        &mut self,
        reader: &mut impl Read,
        strains: &HashMap<u32, StrainRef>,
    ) -> io::Result<()> {
        let date = reader.read_i32_be()?;
        self.last_infection_date = (date != NEVER_INFECTED).then_some(date);
        self.last_infection_strain = if reader.read_bool()? {
            let id = reader.read_u32_be()?;
            let strain = strains.get(&id).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("unknown strain {id}"))
            })?;
            Some(strain.clone())
        } else {
            None
        };
        reader.read_exact(&mut self.immune_history)
    }
}
