//! Viral strains: a packed genotype, the phenotype it codes for, and lineage.
//!
//! The genotype covers `NUM_EPITOPES * CODONS_PER_EPITOPE` codons, packed two
//! bits per nucleotide with the first nucleotide in the lowest bits of the
//! first byte. The phenotype is the amino acid of every codon and is derived
//! once at construction.
//!
//! Strains are shared through [`StrainRef`]. The registry in the world and
//! every host that was last infected by a strain hold a reference, and the
//! strain is dropped once none of them does.

use itertools::Itertools;
use std::cell::Cell;
use std::fmt;
use std::io::{self, Read, Write};
use std::rc::Rc;

use super::context::SimulationContext;
use super::linked::BucketKey;
use crate::config::MutationAlgorithm;
use crate::encoding::{AminoAcid, Nucleotide, translate};
use crate::errors::{DriftError, Result};
use crate::readwrite::binary::{BinaryRead, BinaryWrite};
use crate::stats::StrainStats;

pub const NUM_EPITOPES: usize = 4;
pub const CODONS_PER_EPITOPE: usize = 3;
pub const NUM_CODONS: usize = NUM_EPITOPES * CODONS_PER_EPITOPE;
pub const NUM_SITES: usize = NUM_CODONS * 3;
pub const GENOTYPE_BYTES: usize = NUM_SITES.div_ceil(4);

pub type StrainRef = Rc<Strain>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Genotype([u8; GENOTYPE_BYTES]);

impl Genotype {
    pub fn from_bytes(bytes: [u8; GENOTYPE_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; GENOTYPE_BYTES] {
        &self.0
    }

    /// Decode an RNA string of exactly `NUM_SITES` letters.
    pub fn decode(rna: &str) -> Result<Self> {
        let letters: Vec<char> = rna.chars().filter(|c| !c.is_whitespace()).collect();
        if letters.len() != NUM_SITES {
            return Err(DriftError::ReadError(format!(
                "Genotype must have {NUM_SITES} nucleotides, found {}.",
                letters.len()
            )));
        }
        let mut genotype = Self::default();
        for (site, &letter) in letters.iter().enumerate() {
            let nucleotide = Nucleotide::try_decode(letter).ok_or_else(|| {
                DriftError::ReadError(format!("Unable to decode nucleotide '{letter}'."))
            })?;
            genotype.set(site, nucleotide);
        }
        Ok(genotype)
    }

    pub fn get(&self, site: usize) -> Nucleotide {
        Nucleotide::from_bits(self.0[site / 4] >> ((site % 4) * 2))
    }

    pub fn set(&mut self, site: usize, nucleotide: Nucleotide) {
        let shift = (site % 4) * 2;
        self.0[site / 4] = (self.0[site / 4] & !(0x03 << shift)) | (nucleotide.bits() << shift);
    }

    pub fn translate(&self) -> Phenotype {
        let mut epitopes = [[AminoAcid::Stop; CODONS_PER_EPITOPE]; NUM_EPITOPES];
        for (epitope, codons) in epitopes.iter_mut().enumerate() {
            for (codon, amino_acid) in codons.iter_mut().enumerate() {
                let site = site_index(epitope, codon, 0);
                *amino_acid = translate(self.get(site), self.get(site + 1), self.get(site + 2));
            }
        }
        Phenotype(epitopes)
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", (0..NUM_SITES).map(|site| self.get(site)).join(""))
    }
}

pub const fn site_index(epitope: usize, codon: usize, nucleotide: usize) -> usize {
    epitope * CODONS_PER_EPITOPE * 3 + codon * 3 + nucleotide
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Phenotype([[AminoAcid; CODONS_PER_EPITOPE]; NUM_EPITOPES]);

impl Phenotype {
    pub fn amino_acid(&self, epitope: usize, codon: usize) -> AminoAcid {
        self.0[epitope][codon]
    }

    /// Every `(epitope, codon, amino acid)` triple in epitope-major order.
    pub fn sites(&self) -> impl Iterator<Item = (usize, usize, AminoAcid)> + '_ {
        self.0.iter().enumerate().flat_map(|(epitope, codons)| {
            codons
                .iter()
                .enumerate()
                .map(move |(codon, &amino_acid)| (epitope, codon, amino_acid))
        })
    }

    pub fn has_stop(&self) -> bool {
        self.0.iter().flatten().any(|amino_acid| amino_acid.is_stop())
    }
}

impl fmt::Display for Phenotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().flatten().join(""))
    }
}

#[derive(Debug)]
pub struct Strain {
    genotype: Genotype,
    phenotype: Phenotype,
    first_seen_date: i32,
    stats: Cell<StrainStats>,
}

impl BucketKey for StrainRef {
    fn bucket_hash(&self) -> u32 {
        self.id()
    }
}

impl Strain {
    fn with_stats(first_seen_date: i32, genotype: Genotype, stats: StrainStats) -> Self {
        Self {
            genotype,
            phenotype: genotype.translate(),
            first_seen_date,
            stats: Cell::new(stats),
        }
    }

    /// Create a founder strain. Genotypes coding for a stop codon are rejected.
    pub fn new(
        date: i32,
        genotype: Genotype,
        context: &mut SimulationContext,
    ) -> Result<StrainRef> {
        if genotype.translate().has_stop() {
            return Err(DriftError::InitializationError(format!(
                "Genotype {genotype} codes for a stop codon."
            )));
        }
        let stats = StrainStats::new(context.next_strain_id());
        Ok(Rc::new(Self::with_stats(date, genotype, stats)))
    }

    pub fn id(&self) -> u32 {
        self.stats.get().id
    }

    pub fn stats(&self) -> StrainStats {
        self.stats.get()
    }

    pub fn update_stats(&self, update: impl FnOnce(&mut StrainStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    pub fn first_seen_date(&self) -> i32 {
        self.first_seen_date
    }

    pub fn genotype(&self) -> &Genotype {
        &self.genotype
    }

    pub fn phenotype(&self) -> &Phenotype {
        &self.phenotype
    }

    pub fn rna_string(&self) -> String {
        self.genotype.to_string()
    }

    pub fn protein_string(&self) -> String {
        self.phenotype.to_string()
    }

    /// Copy the virus, possibly with mutations.
    ///
    /// Returns a clone of `this` when no mutation occurs or when the mutated
    /// genotype codes for a stop codon. A rejected attempt is not retried.
    pub fn replicate(this: &StrainRef, date: i32, context: &mut SimulationContext) -> StrainRef {
        let n_mutations = match context.parameters.mutation_algorithm {
            MutationAlgorithm::Approximate => {
                let probability = context.parameters.mutation_probability * NUM_SITES as f64;
                if context.rng.next_double() < probability {
                    1
                } else {
                    0
                }
            }
            MutationAlgorithm::Exact => {
                let draw = context.rng.next_double();
                context.tables.draw_mutation_count(draw).min(NUM_SITES)
            }
            MutationAlgorithm::None => 0,
        };

        if n_mutations == 0 {
            return this.clone();
        }

        let mut candidate_sites: Vec<usize> = Vec::new();
        if n_mutations > 1 {
            candidate_sites.extend(0..NUM_SITES);
            context.rng.shuffle(&mut candidate_sites);
        }

        let mut genotype = this.genotype;
        for mutation in 0..n_mutations {
            let site = if n_mutations == 1 {
                let epitope = context.rng.next_index(NUM_EPITOPES);
                let codon = context.rng.next_index(CODONS_PER_EPITOPE);
                let nucleotide = context.rng.next_index(3);
                site_index(epitope, codon, nucleotide)
            } else {
                candidate_sites[mutation]
            };
            let old = this.genotype.get(site).bits();
            let mut new = context.rng.next_int(3) as u8;
            if new >= old {
                new += 1;
            }
            genotype.set(site, Nucleotide::from_bits(new));
        }

        if genotype.translate().has_stop() {
            return this.clone();
        }

        let parent = this.stats();
        let mut stats = StrainStats::new(context.next_strain_id());
        stats.parent_id = Some(parent.id);
        stats.mutations = parent.mutations + n_mutations as u32;
        Rc::new(Self::with_stats(date, genotype, stats))
    }

    pub fn save_state(&self, writer: &mut impl Write) -> io::Result<()> {
        let stats = self.stats();
        writer.write_i32_be(stats.age)?;
        writer.write_u32_be(stats.id)?;
        writer.write_u32_be(stats.incidence)?;
        writer.write_u32_be(stats.infected)?;
        writer.write_u32_be(stats.mutations)?;
        writer.write_i32_be(stats.parent_id.map_or(-1, |id| id as i32))?;
        writer.write_i32_be(self.first_seen_date)?;
        writer.write_all(self.genotype.as_bytes())
    }

    pub fn load_state(reader: &mut impl Read) -> io::Result<StrainRef> {
        let age = reader.read_i32_be()?;
        let id = reader.read_u32_be()?;
        let incidence = reader.read_u32_be()?;
        let infected = reader.read_u32_be()?;
        let mutations = reader.read_u32_be()?;
        let parent_id = reader.read_i32_be()?;
        let first_seen_date = reader.read_i32_be()?;
        let mut bytes = [0u8; GENOTYPE_BYTES];
        reader.read_exact(&mut bytes)?;

        let stats = StrainStats {
            id,
            parent_id: u32::try_from(parent_id).ok(),
            infected,
            incidence,
            mutations,
            age,
        };
        Ok(Rc::new(Self::with_stats(
            first_seen_date,
            Genotype::from_bytes(bytes),
            stats,
        )))
    }
}

impl fmt::Display for Strain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.phenotype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameters;

    const ALL_A: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn context(mutation_algorithm: MutationAlgorithm, mutation_probability: f64) -> SimulationContext {
        let parameters = Parameters {
            mutation_algorithm,
            mutation_probability,
            random_seed: 12345,
            ..Parameters::default()
        };
        SimulationContext::new(parameters)
    }

    #[test]
    fn genotype_round_trip() {
        let rna = "AUGCCGUAGCAUGGCUAACGUAGCUAGCUAGGACUU";
        assert_eq!(Genotype::decode(rna).unwrap().to_string(), rna);
        assert_eq!(Genotype::decode(ALL_A).unwrap().as_bytes(), &[0; GENOTYPE_BYTES]);
        let all_c = "C".repeat(NUM_SITES);
        assert_eq!(
            Genotype::decode(&all_c).unwrap().as_bytes(),
            &[0xff; GENOTYPE_BYTES]
        );
        assert_eq!(Genotype::decode(&all_c).unwrap().to_string(), all_c);
    }

    #[test]
    fn genotype_rejects_bad_input() {
        assert!(Genotype::decode("AAA").is_err());
        assert!(Genotype::decode(&"A".repeat(NUM_SITES + 1)).is_err());
        assert!(Genotype::decode(&"X".repeat(NUM_SITES)).is_err());
    }

    #[test]
    fn phenotype_of_founder() {
        let genotype = Genotype::decode(ALL_A).unwrap();
        let phenotype = genotype.translate();
        assert_eq!(phenotype.to_string(), "KKKKKKKKKKKK");
        assert!(!phenotype.has_stop());
        assert_eq!(phenotype.sites().count(), NUM_CODONS);
    }

    #[test]
    fn founder_with_stop_codon_is_rejected() {
        let mut context = context(MutationAlgorithm::None, 0.0);
        let rna = format!("UAA{}", "A".repeat(NUM_SITES - 3));
        let genotype = Genotype::decode(&rna).unwrap();
        assert!(Strain::new(0, genotype, &mut context).is_err());
    }

    #[test]
    fn ids_increase() {
        let mut context = context(MutationAlgorithm::None, 0.0);
        let genotype = Genotype::decode(ALL_A).unwrap();
        let first = Strain::new(0, genotype, &mut context).unwrap();
        let second = Strain::new(0, genotype, &mut context).unwrap();
        assert_eq!(first.id() + 1, second.id());
        assert_eq!(first.stats().parent_id, None);
    }

    #[test]
    fn no_mutation_returns_same_strain() {
        let mut context = context(MutationAlgorithm::None, 1.0);
        let strain = Strain::new(0, Genotype::decode(ALL_A).unwrap(), &mut context).unwrap();
        let copy = Strain::replicate(&strain, 1, &mut context);
        assert!(Rc::ptr_eq(&strain, &copy));
    }

    #[test]
    fn single_mutation_records_lineage() {
        // probability * sites >= 1 forces exactly one mutation per replication
        let mut context = context(MutationAlgorithm::Approximate, 1.0);
        let strain = Strain::new(0, Genotype::decode(ALL_A).unwrap(), &mut context).unwrap();
        let mutant = (1..100)
            .map(|date| Strain::replicate(&strain, date, &mut context))
            .find(|mutant| !Rc::ptr_eq(&strain, mutant))
            .unwrap();
        assert_eq!(mutant.stats().parent_id, Some(strain.id()));
        assert_eq!(mutant.stats().mutations, 1);
        let differences = (0..NUM_SITES)
            .filter(|&site| mutant.genotype().get(site) != strain.genotype().get(site))
            .count();
        assert_eq!(differences, 1);
        assert!(!mutant.phenotype().has_stop());
    }

    #[test]
    fn stop_codon_mutation_is_rejected() {
        // UAU (Tyr) turns into UAA or UAG for two of the three changes at its
        // third position.
        let mut context = context(MutationAlgorithm::Approximate, 1.0);
        let strain =
            Strain::new(0, Genotype::decode(&"UAU".repeat(NUM_CODONS)).unwrap(), &mut context)
                .unwrap();
        let stats_before = strain.stats();
        let mut rejected = 0;
        for date in 1..200 {
            let copy = Strain::replicate(&strain, date, &mut context);
            if Rc::ptr_eq(&strain, &copy) {
                rejected += 1;
                assert_eq!(copy.genotype(), strain.genotype());
                assert_eq!(copy.stats(), stats_before);
            } else {
                assert!(!copy.phenotype().has_stop());
            }
        }
        assert!(rejected > 0);
    }

    #[test]
    fn exact_mutations_without_replacement() {
        let mut context = context(MutationAlgorithm::Exact, 0.2);
        let strain = Strain::new(0, Genotype::decode(ALL_A).unwrap(), &mut context).unwrap();
        let mut seen_multiple = false;
        for date in 1..200 {
            let mutant = Strain::replicate(&strain, date, &mut context);
            if Rc::ptr_eq(&strain, &mutant) {
                continue;
            }
            let differences = (0..NUM_SITES)
                .filter(|&site| mutant.genotype().get(site) != strain.genotype().get(site))
                .count() as u32;
            assert_eq!(differences, mutant.stats().mutations);
            seen_multiple |= differences > 1;
        }
        assert!(seen_multiple);
    }

    #[test]
    fn save_load_state() {
        let mut context = context(MutationAlgorithm::None, 0.0);
        let strain = Strain::new(7, Genotype::decode(ALL_A).unwrap(), &mut context).unwrap();
        strain.update_stats(|stats| {
            stats.incidence = 4;
            stats.infected = 9;
            stats.age = 3;
        });
        let mut buffer = Vec::new();
        strain.save_state(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 7 * 4 + GENOTYPE_BYTES);

        let loaded = Strain::load_state(&mut buffer.as_slice()).unwrap();
        assert_eq!(loaded.stats(), strain.stats());
        assert_eq!(loaded.genotype(), strain.genotype());
        assert_eq!(loaded.first_seen_date(), 7);
    }
}
