use seq_io::fasta;
use std::path::Path;

use crate::core::Genotype;
use crate::errors::{DriftError, Result};

pub trait GenotypeIO: Sized {
    /// Read the first record of a FASTA file.
    fn load_fasta(path: &Path) -> Result<Self>;
    fn read_fasta(reader: impl std::io::Read) -> Result<Self>;
}

impl GenotypeIO for Genotype {
    fn load_fasta(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|error| {
            DriftError::ReadError(format!("Unable to open {}: {error}", path.display()))
        })?;
        Self::read_fasta(file)
    }

    fn read_fasta(reader: impl std::io::Read) -> Result<Self> {
        let mut reader = fasta::Reader::new(reader);
        let record = reader
            .next()
            .ok_or_else(|| DriftError::ReadError("FASTA file has no records.".to_string()))?
            .map_err(|error| DriftError::ReadError(format!("Unable to read sequence: {error}")))?;
        let sequence: String = record
            .full_seq()
            .iter()
            .map(|&letter| letter as char)
            .collect();
        Genotype::decode(&sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn first_record() {
        let fasta = format!(">founder\n{}\n{}\n>other\nAAA\n", "AUG".repeat(6), "UUU".repeat(6));
        let genotype = Genotype::read_fasta(fasta.as_bytes()).unwrap();
        assert_eq!(genotype.to_string(), format!("{}{}", "AUG".repeat(6), "UUU".repeat(6)));
    }

    #[test]
    fn thymine_reads_as_uracil() {
        let fasta = format!(">dna\n{}\n", "ATG".repeat(12));
        let genotype = Genotype::read_fasta(fasta.as_bytes()).unwrap();
        assert_eq!(genotype.to_string(), "AUG".repeat(12));
    }

    #[test]
    fn invalid_letters() {
        let fasta = format!(">bad\n{}N\n", "A".repeat(35));
        assert!(Genotype::read_fasta(fasta.as_bytes()).is_err());
        assert!(Genotype::read_fasta(">short\nAUG\n".as_bytes()).is_err());
        assert!(Genotype::read_fasta("".as_bytes()).is_err());
    }

    #[test]
    #[serial]
    fn from_file() {
        let path = std::env::temp_dir().join("driftsim-genotype-test.fasta");
        std::fs::write(&path, format!(">founder\n{}\n", "GCA".repeat(12))).unwrap();
        let genotype = Genotype::load_fasta(&path).unwrap();
        assert_eq!(genotype.to_string(), "GCA".repeat(12));
        std::fs::remove_file(&path).unwrap();
    }
}
