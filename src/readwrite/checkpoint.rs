//! Checkpoint files hold everything needed to continue a run.
//!
//! A header with the shape of the simulation and the algorithms it ran with
//! precedes the state of the world, the generator and the strain id counter.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::binary::{BinaryRead, BinaryWrite};
use crate::config::{
    Connectivity, InfectionAlgorithm, MutationAlgorithm, Parameters, PatchStatsAlgorithm,
};
use crate::core::World;
use crate::errors::{DriftError, Result};

pub const CHECKPOINT_MAGIC: &[u8; 4] = b"DRFT";
pub const CHECKPOINT_VERSION: u32 = 1;

/// Shape of the simulation a checkpoint was written from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckpointHeader {
    pub num_epitopes: u32,
    pub codons_per_epitope: u32,
    pub num_patches: u32,
    pub hosts_per_patch: u32,
    pub neighborhood_radius: f64,
    pub random_seed: u64,
    pub infection_algorithm: InfectionAlgorithm,
    pub mutation_algorithm: MutationAlgorithm,
    pub patch_stats_algorithm: PatchStatsAlgorithm,
    pub connectivity_algorithm: Connectivity,
}

impl CheckpointHeader {
    pub fn from_parameters(parameters: &Parameters) -> Self {
        Self {
            num_epitopes: parameters.num_epitopes as u32,
            codons_per_epitope: parameters.codons_per_epitope as u32,
            num_patches: parameters.num_patches as u32,
            hosts_per_patch: parameters.hosts_per_patch as u32,
            neighborhood_radius: parameters.neighborhood_radius,
            random_seed: parameters.random_seed,
            infection_algorithm: parameters.infection_algorithm,
            mutation_algorithm: parameters.mutation_algorithm,
            patch_stats_algorithm: parameters.patch_stats_algorithm,
            connectivity_algorithm: parameters.connectivity_algorithm,
        }
    }

    /// Fails with the name of the first field that differs from `parameters`.
    /// The seed may differ.
    pub fn check_compatible(&self, parameters: &Parameters) -> Result<()> {
        let expected = Self::from_parameters(parameters);
        let mismatch = if self.num_epitopes != expected.num_epitopes {
            Some("num_epitopes")
        } else if self.codons_per_epitope != expected.codons_per_epitope {
            Some("codons_per_epitope")
        } else if self.hosts_per_patch != expected.hosts_per_patch {
            Some("hosts_per_patch")
        } else if self.num_patches != expected.num_patches {
            Some("num_patches")
        } else if self.neighborhood_radius != expected.neighborhood_radius {
            Some("neighborhood_radius")
        } else {
            None
        };
        match mismatch {
            Some(field) => Err(DriftError::CheckpointError(format!("{field} mismatch"))),
            None => Ok(()),
        }
    }

    /// Algorithms of the checkpointed run that differ from `parameters`, as
    /// `(name, before, after)`. A resumed run may switch algorithms.
    pub fn algorithm_changes(
        &self,
        parameters: &Parameters,
    ) -> Vec<(&'static str, String, String)> {
        let current = Self::from_parameters(parameters);
        let mut changes = Vec::new();
        if self.infection_algorithm != current.infection_algorithm {
            changes.push((
                "infection_algorithm",
                self.infection_algorithm.to_string(),
                current.infection_algorithm.to_string(),
            ));
        }
        if self.mutation_algorithm != current.mutation_algorithm {
            changes.push((
                "mutation_algorithm",
                self.mutation_algorithm.to_string(),
                current.mutation_algorithm.to_string(),
            ));
        }
        if self.patch_stats_algorithm != current.patch_stats_algorithm {
            changes.push((
                "patch_stats_algorithm",
                self.patch_stats_algorithm.to_string(),
                current.patch_stats_algorithm.to_string(),
            ));
        }
        if self.connectivity_algorithm != current.connectivity_algorithm {
            changes.push((
                "connectivity_algorithm",
                self.connectivity_algorithm.to_string(),
                current.connectivity_algorithm.to_string(),
            ));
        }
        changes
    }

    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(CHECKPOINT_MAGIC)?;
        writer.write_u32_be(CHECKPOINT_VERSION)?;
        writer.write_u32_be(self.num_epitopes)?;
        writer.write_u32_be(self.codons_per_epitope)?;
        writer.write_u32_be(self.num_patches)?;
        writer.write_u32_be(self.hosts_per_patch)?;
        writer.write_all(&self.neighborhood_radius.to_be_bytes())?;
        writer.write_i64_be(self.random_seed as i64)?;
        writer.write_all(&[
            self.infection_algorithm.id(),
            self.mutation_algorithm.id(),
            self.patch_stats_algorithm.id(),
            self.connectivity_algorithm.id(),
        ])
    }

    fn read(reader: &mut impl Read) -> Result<Self> {
        let corrupt = |error: io::Error| DriftError::CheckpointError(error.to_string());

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(corrupt)?;
        if &magic != CHECKPOINT_MAGIC {
            return Err(DriftError::CheckpointError(
                "Not a checkpoint file.".to_string(),
            ));
        }
        let version = reader.read_u32_be().map_err(corrupt)?;
        if version != CHECKPOINT_VERSION {
            return Err(DriftError::CheckpointError(format!(
                "Unsupported checkpoint version {version}."
            )));
        }
        let num_epitopes = reader.read_u32_be().map_err(corrupt)?;
        let codons_per_epitope = reader.read_u32_be().map_err(corrupt)?;
        let num_patches = reader.read_u32_be().map_err(corrupt)?;
        let hosts_per_patch = reader.read_u32_be().map_err(corrupt)?;
        let mut radius = [0u8; 8];
        reader.read_exact(&mut radius).map_err(corrupt)?;
        let random_seed = reader.read_i64_be().map_err(corrupt)? as u64;
        let mut algorithms = [0u8; 4];
        reader.read_exact(&mut algorithms).map_err(corrupt)?;
        let unknown = |error: DriftError| match error {
            DriftError::ReadError(message) => DriftError::CheckpointError(message),
            other => other,
        };
        Ok(Self {
            num_epitopes,
            codons_per_epitope,
            num_patches,
            hosts_per_patch,
            neighborhood_radius: f64::from_be_bytes(radius),
            random_seed,
            infection_algorithm: InfectionAlgorithm::try_from(algorithms[0]).map_err(unknown)?,
            mutation_algorithm: MutationAlgorithm::try_from(algorithms[1]).map_err(unknown)?,
            patch_stats_algorithm: PatchStatsAlgorithm::try_from(algorithms[2]).map_err(unknown)?,
            connectivity_algorithm: Connectivity::try_from(algorithms[3]).map_err(unknown)?,
        })
    }
}

pub trait CheckpointIO {
    fn save_checkpoint(&self, writer: &mut impl Write) -> io::Result<()>;
    fn load_checkpoint(&mut self, reader: &mut impl Read) -> Result<CheckpointHeader>;
    fn save_checkpoint_to_file(&self, path: &Path) -> Result<()>;
    fn load_checkpoint_from_file(&mut self, path: &Path) -> Result<CheckpointHeader>;
}

impl CheckpointIO for World {
    fn save_checkpoint(&self, writer: &mut impl Write) -> io::Result<()> {
        CheckpointHeader::from_parameters(&self.context().parameters).write(writer)?;
        self.save_state(writer)?;
        self.context().save_state(writer)?;
        writer.flush()
    }

    /// Restore a checkpoint into this world, which must have the shape
    /// recorded in its header. Returns the header so that the caller can
    /// compare seeds.
    fn load_checkpoint(&mut self, reader: &mut impl Read) -> Result<CheckpointHeader> {
        let header = CheckpointHeader::read(reader)?;
        header.check_compatible(&self.context().parameters)?;
        for (name, before, after) in header.algorithm_changes(&self.context().parameters) {
            log::info!("Resuming with {name} {after} instead of {before}.");
        }
        self.load_state(reader)?;
        self.context_mut()
            .load_state(reader)
            .map_err(|error| DriftError::CheckpointError(error.to_string()))?;
        Ok(header)
    }

    fn save_checkpoint_to_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(fs::File::create(path)?);
        self.save_checkpoint(&mut writer)?;
        log::info!("Saved state on day {} to {}.", self.date(), path.display());
        Ok(())
    }

    fn load_checkpoint_from_file(&mut self, path: &Path) -> Result<CheckpointHeader> {
        let file = fs::File::open(path).map_err(|error| {
            DriftError::CheckpointError(format!("Unable to open {}: {error}", path.display()))
        })?;
        let header = self.load_checkpoint(&mut BufReader::new(file))?;
        log::info!("Loaded state of day {} from {}.", self.date(), path.display());
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::strain::Genotype;
    use crate::core::{Neighborhood, SimulationContext};
    use serial_test::serial;
    use std::rc::Rc;

    fn parameters() -> Parameters {
        Parameters {
            num_patches: 2,
            hosts_per_patch: 80,
            host_lifespan: 200,
            random_seed: 99,
            mutation_algorithm: MutationAlgorithm::Approximate,
            mutation_probability: 0.001,
            infection_algorithm: InfectionAlgorithm::Approximate2,
            ..Parameters::default()
        }
    }

    fn neighborhood(n_hosts: usize) -> Rc<Neighborhood> {
        let lists: Vec<Vec<u32>> = (0..n_hosts)
            .map(|host| {
                vec![
                    ((host + 1) % n_hosts) as u32,
                    ((host + n_hosts - 1) % n_hosts) as u32,
                ]
            })
            .collect();
        Rc::new(Neighborhood::from_lists(&lists).unwrap())
    }

    fn world(parameters: Parameters) -> World {
        let n_hosts = parameters.hosts_per_patch;
        World::new(SimulationContext::new(parameters), neighborhood(n_hosts)).unwrap()
    }

    #[test]
    fn header_round_trip() {
        let header = CheckpointHeader::from_parameters(&parameters());
        let mut buffer = Vec::new();
        header.write(&mut buffer).unwrap();
        assert_eq!(&buffer[..4], b"DRFT");
        assert_eq!(CheckpointHeader::read(&mut buffer.as_slice()).unwrap(), header);
        assert_eq!(&buffer[40..], &[2, 5, 8, 10]);
    }

    #[test]
    fn unknown_algorithm_id() {
        let mut buffer = Vec::new();
        CheckpointHeader::from_parameters(&parameters())
            .write(&mut buffer)
            .unwrap();
        buffer[41] = 4;
        match CheckpointHeader::read(&mut buffer.as_slice()) {
            Err(DriftError::CheckpointError(message)) => {
                assert_eq!(message, "Invalid MutationAlgorithm id: 4")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn switching_algorithms_on_resume() {
        let header = CheckpointHeader::from_parameters(&parameters());
        assert!(header.algorithm_changes(&parameters()).is_empty());
        let switched = Parameters {
            infection_algorithm: InfectionAlgorithm::Exact,
            connectivity_algorithm: Connectivity::Tropics,
            ..parameters()
        };
        assert_eq!(
            header.algorithm_changes(&switched),
            vec![
                ("infection_algorithm", "Approximate2".to_string(), "Exact".to_string()),
                ("connectivity_algorithm", "Flat".to_string(), "Tropics".to_string()),
            ]
        );
    }

    #[test]
    fn resume_continues_trajectory() {
        let mut original = world(parameters());
        original.seed_infection(Genotype::default()).unwrap();
        for _ in 0..30 {
            original.update();
        }
        let mut buffer = Vec::new();
        original.save_checkpoint(&mut buffer).unwrap();

        let mut restored = world(parameters());
        let header = restored.load_checkpoint(&mut buffer.as_slice()).unwrap();
        assert_eq!(header.random_seed, 99);
        assert_eq!(restored.date(), 30);
        assert_eq!(restored.context().peek_strain_id(), original.context().peek_strain_id());

        for _ in 0..30 {
            original.update();
            restored.update();
            assert_eq!(restored.total_sick(), original.total_sick());
        }
        assert_eq!(restored.final_state_hash(), original.final_state_hash());
    }

    #[test]
    fn incompatible_checkpoint() {
        let mut original = world(parameters());
        original.seed_infection(Genotype::default()).unwrap();
        let mut buffer = Vec::new();
        original.save_checkpoint(&mut buffer).unwrap();

        let mut restored = world(Parameters {
            hosts_per_patch: 40,
            ..parameters()
        });
        match restored.load_checkpoint(&mut buffer.as_slice()) {
            Err(DriftError::CheckpointError(message)) => {
                assert_eq!(message, "hosts_per_patch mismatch")
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut restored = world(Parameters {
            random_seed: 5,
            ..parameters()
        });
        assert!(restored.load_checkpoint(&mut buffer.as_slice()).is_ok());
    }

    #[test]
    fn corrupt_checkpoint() {
        let mut original = world(parameters());
        original.seed_infection(Genotype::default()).unwrap();
        let mut buffer = Vec::new();
        original.save_checkpoint(&mut buffer).unwrap();

        let mut restored = world(parameters());
        let truncated = &buffer[..buffer.len() - 1];
        assert!(matches!(
            restored.load_checkpoint(&mut &truncated[..]),
            Err(DriftError::CheckpointError(_))
        ));

        buffer[0] = b'X';
        assert!(matches!(
            restored.load_checkpoint(&mut buffer.as_slice()),
            Err(DriftError::CheckpointError(_))
        ));
    }

    #[test]
    #[serial]
    fn file_round_trip() {
        let path = std::env::temp_dir().join("driftsim-checkpoint-test.bin");
        let mut original = world(parameters());
        original.seed_infection(Genotype::default()).unwrap();
        original.update();
        original.save_checkpoint_to_file(&path).unwrap();

        let mut restored = world(parameters());
        restored.load_checkpoint_from_file(&path).unwrap();
        assert_eq!(restored.date(), 1);
        assert_eq!(restored.total_sick(), original.total_sick());
        fs::remove_file(&path).unwrap();
    }
}
