use serde::{Deserialize, Serialize};
use std::fs;

use super::algorithms::{Connectivity, InfectionAlgorithm, MutationAlgorithm, PatchStatsAlgorithm};
use crate::core::strain::{CODONS_PER_EPITOPE, Genotype, NUM_EPITOPES};
use crate::errors::DriftError;

/// Host ids pack the patch into the upper 8 bits and the host into the lower 24.
pub const MAX_PATCHES: usize = 1 << 8;
pub const MAX_HOSTS_PER_PATCH: usize = 1 << 24;

/// Neighborhoods are precomputed for this radius only.
pub const NEIGHBORHOOD_RADIUS: f64 = 4.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Parameters {
    /// Cross-protection at the maximal immunity distance.
    pub theta0: f64,

    /// Cross-protection at distances between 1 and `nt`.
    pub theta1: f64,

    /// Immunity distance above which cross-protection starts to decline.
    pub nt: f64,

    /// Strength of the short-term, strain-unspecific immunity.
    pub omega: f64,

    /// Decay time in days of the short-term immunity.
    pub tau: f64,

    /// Amplitude of the seasonal forcing of transmission.
    pub seasonality_multiplier: f64,

    /// Radius that defines the neighborhood of a host.
    pub neighborhood_radius: f64,

    /// Probability of a mutation per nucleotide and replication.
    pub mutation_probability: f64,

    pub num_epitopes: usize,

    pub codons_per_epitope: usize,

    pub num_patches: usize,

    pub hosts_per_patch: usize,

    /// Lifespan of a host in days.
    pub host_lifespan: usize,

    pub r0_local: f64,

    pub r0_patch: f64,

    /// Basic reproductive number between any two patches.
    pub r0_global: f64,

    /// Seed of the random number generator. Zero seeds from the clock.
    pub random_seed: u64,

    pub num_days: u32,

    /// Number of hosts that are kept infected to prevent extinction.
    pub min_carriers: u64,

    pub infection_algorithm: InfectionAlgorithm,

    pub mutation_algorithm: MutationAlgorithm,

    pub patch_stats_algorithm: PatchStatsAlgorithm,

    pub connectivity_algorithm: Connectivity,

    /// Write a checkpoint at the end of the run.
    pub save_state: bool,

    /// RNA of the index case, all adenine if not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_genotype: Option<String>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            theta0: 0.25,
            theta1: 0.99,
            nt: 2.,
            omega: 1.,
            tau: 270.,
            seasonality_multiplier: 0.25,
            neighborhood_radius: NEIGHBORHOOD_RADIUS,
            mutation_probability: 1e-6,
            num_epitopes: NUM_EPITOPES,
            codons_per_epitope: CODONS_PER_EPITOPE,
            num_patches: 20,
            hosts_per_patch: 5_000_000,
            host_lifespan: 60 * 365,
            r0_local: 5.,
            r0_patch: 0.4,
            r0_global: 0.02,
            random_seed: 0,
            num_days: 100 * 365,
            min_carriers: 1,
            infection_algorithm: InfectionAlgorithm::Exact,
            mutation_algorithm: MutationAlgorithm::Exact,
            patch_stats_algorithm: PatchStatsAlgorithm::Incidence,
            connectivity_algorithm: Connectivity::Flat,
            save_state: false,
            initial_genotype: None,
        }
    }
}

#[derive(Debug)]
pub enum ParametersError {
    IoError(std::io::Error),
    YamlError(serde_yaml::Error),
}

impl std::fmt::Display for ParametersError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParametersError::IoError(error) => write!(f, "Unable to access parameters: {error}"),
            ParametersError::YamlError(error) => write!(f, "Unable to parse parameters: {error}"),
        }
    }
}

impl std::error::Error for ParametersError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParametersError::IoError(error) => Some(error),
            ParametersError::YamlError(error) => Some(error),
        }
    }
}

impl From<ParametersError> for DriftError {
    fn from(error: ParametersError) -> Self {
        match error {
            ParametersError::IoError(error) => DriftError::IoError(error),
            ParametersError::YamlError(error) => DriftError::ReadError(error.to_string()),
        }
    }
}

impl std::fmt::Display for Parameters {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = vec![];
        self.write(&mut output).map_err(|_| std::fmt::Error)?;
        write!(formatter, "{}", String::from_utf8_lossy(&output))
    }
}

fn invalid(message: String) -> DriftError {
    DriftError::InitializationError(message)
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), DriftError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be between 0 and 1: {value}")))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), DriftError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} can't be negative: {value}")))
    }
}

impl Parameters {
    pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<(), ParametersError> {
        serde_yaml::to_writer(writer, self).map_err(ParametersError::YamlError)
    }

    pub fn read(reader: &mut dyn std::io::Read) -> Result<Parameters, ParametersError> {
        serde_yaml::from_reader(reader).map_err(ParametersError::YamlError)
    }

    pub fn write_to_file(&self, filename: &str) -> Result<(), ParametersError> {
        let file = fs::File::create(filename).map_err(ParametersError::IoError)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)
    }

    pub fn read_from_file(filename: &str) -> Result<Parameters, ParametersError> {
        let file = fs::File::open(filename).map_err(ParametersError::IoError)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read(&mut reader)
    }

    /// Genotype of the index case.
    pub fn initial_genotype(&self) -> Result<Genotype, DriftError> {
        match &self.initial_genotype {
            Some(rna) => Genotype::decode(rna),
            None => Ok(Genotype::default()),
        }
    }

    /// Check every field against its admissible range.
    pub fn validate(&self) -> Result<(), DriftError> {
        match self.connectivity_algorithm {
            Connectivity::Flat if self.num_patches % 2 != 0 => {
                return Err(invalid(format!(
                    "With Flat connectivity, num_patches must be a multiple of 2: {}",
                    self.num_patches
                )));
            }
            Connectivity::Cylindrical if self.num_patches % 4 != 0 => {
                return Err(invalid(format!(
                    "With Cylindrical connectivity, num_patches must be a multiple of 4: {}",
                    self.num_patches
                )));
            }
            Connectivity::Tropics if self.num_patches % 10 != 0 => {
                return Err(invalid(format!(
                    "With Tropics connectivity, num_patches must be a multiple of 10: {}",
                    self.num_patches
                )));
            }
            _ => {}
        }
        if self.neighborhood_radius != NEIGHBORHOOD_RADIUS {
            return Err(invalid(format!(
                "neighborhood_radius must be set to {NEIGHBORHOOD_RADIUS}, but it is currently set to [{}].",
                self.neighborhood_radius
            )));
        }
        if self.num_epitopes != NUM_EPITOPES {
            return Err(invalid(format!(
                "num_epitopes must be set to {NUM_EPITOPES}, but it is currently set to [{}].",
                self.num_epitopes
            )));
        }
        if self.codons_per_epitope != CODONS_PER_EPITOPE {
            return Err(invalid(format!(
                "codons_per_epitope must be set to {CODONS_PER_EPITOPE}, but it is currently set to [{}].",
                self.codons_per_epitope
            )));
        }
        if self.num_patches == 0 || self.num_patches > MAX_PATCHES {
            return Err(invalid(format!(
                "num_patches must be between 1 and {MAX_PATCHES}: {}",
                self.num_patches
            )));
        }
        if self.hosts_per_patch == 0 || self.hosts_per_patch >= MAX_HOSTS_PER_PATCH {
            return Err(invalid(format!(
                "hosts_per_patch must be between 1 and {}: {}",
                MAX_HOSTS_PER_PATCH - 1,
                self.hosts_per_patch
            )));
        }
        if self.host_lifespan == 0 {
            return Err(invalid(format!(
                "host_lifespan must be positive: {}",
                self.host_lifespan
            )));
        }
        check_non_negative("tau", self.tau)?;
        check_non_negative("nt", self.nt)?;
        check_non_negative("r0_local", self.r0_local)?;
        check_non_negative("r0_patch", self.r0_patch)?;
        check_non_negative("r0_global", self.r0_global)?;
        check_non_negative("seasonality_multiplier", self.seasonality_multiplier)?;
        check_non_negative("mutation_probability", self.mutation_probability)?;
        check_unit_interval("omega", self.omega)?;
        check_unit_interval("theta0", self.theta0)?;
        check_unit_interval("theta1", self.theta1)?;
        if self.num_days == 0 {
            return Err(invalid(format!(
                "num_days must be at least 1: {}",
                self.num_days
            )));
        }
        let genotype = self.initial_genotype()?;
        if genotype.translate().has_stop() {
            return Err(invalid(format!(
                "initial_genotype codes for a stop codon: {genotype}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn small() -> Parameters {
        Parameters {
            num_patches: 2,
            hosts_per_patch: 100,
            random_seed: 12345,
            num_days: 30,
            ..Parameters::default()
        }
    }

    #[test]
    fn read_write() {
        let mut buffer = Vec::new();
        let parameters = Parameters {
            initial_genotype: Some("AUG".repeat(12)),
            connectivity_algorithm: Connectivity::Tropics,
            ..small()
        };
        parameters.write(&mut buffer).unwrap();
        let read_parameters = Parameters::read(&mut buffer.as_slice()).unwrap();
        assert_eq!(read_parameters, parameters);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let yaml = "num_patches: 4\nhosts_per_patch: 10\ninfection_algorithm: Approximate3\n";
        let parameters = Parameters::read(&mut yaml.as_bytes()).unwrap();
        assert_eq!(parameters.num_patches, 4);
        assert_eq!(parameters.infection_algorithm, InfectionAlgorithm::Approximate3);
        assert_eq!(parameters.tau, 270.);
        assert_eq!(parameters.initial_genotype, None);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let yaml = "mutation_algorithm: Sometimes\n";
        assert!(Parameters::read(&mut yaml.as_bytes()).is_err());
    }

    #[test]
    #[serial]
    fn read_write_file() {
        let tmp_dir = std::env::temp_dir().join("test_driftsim_parameters.yaml");
        let path = tmp_dir.to_str().unwrap();
        let parameters = small();
        parameters.write_to_file(path).unwrap();
        let read_parameters = Parameters::read_from_file(path).unwrap();
        assert_eq!(read_parameters, parameters);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(Parameters::default().validate().is_ok());
        assert!(small().validate().is_ok());
    }

    #[test]
    fn validation_failures() {
        let cases = [
            Parameters { num_epitopes: 5, ..small() },
            Parameters { codons_per_epitope: 2, ..small() },
            Parameters { neighborhood_radius: 3., ..small() },
            Parameters { num_patches: 3, ..small() },
            Parameters { num_patches: 0, ..small() },
            Parameters { num_patches: 512, ..small() },
            Parameters {
                num_patches: 6,
                connectivity_algorithm: Connectivity::Cylindrical,
                ..small()
            },
            Parameters {
                num_patches: 4,
                connectivity_algorithm: Connectivity::Tropics,
                ..small()
            },
            Parameters { hosts_per_patch: 0, ..small() },
            Parameters { hosts_per_patch: MAX_HOSTS_PER_PATCH, ..small() },
            Parameters { host_lifespan: 0, ..small() },
            Parameters { tau: -1., ..small() },
            Parameters { r0_global: -0.1, ..small() },
            Parameters { omega: 1.5, ..small() },
            Parameters { theta0: -0.5, ..small() },
            Parameters { num_days: 0, ..small() },
            Parameters { initial_genotype: Some("AAA".into()), ..small() },
            Parameters {
                initial_genotype: Some(format!("UAA{}", "A".repeat(33))),
                ..small()
            },
        ];
        for parameters in cases {
            assert!(parameters.validate().is_err(), "{parameters:?}");
        }
    }

    #[test]
    fn error_names_the_field() {
        let error = Parameters { omega: 2., ..small() }.validate().unwrap_err();
        assert!(error.to_string().contains("omega"));
        assert!(error.to_string().contains('2'));
    }
}
