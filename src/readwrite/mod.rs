//! IO traits for neighbor files, checkpoints, genotypes and statistics.

pub mod binary;
mod checkpoint;
mod genotype;
mod neighbors;
mod stats_writer;

pub use checkpoint::{CHECKPOINT_MAGIC, CHECKPOINT_VERSION, CheckpointHeader, CheckpointIO};
pub use genotype::GenotypeIO;
pub use neighbors::NeighborhoodIO;
pub use stats_writer::{CsvStatsWriter, StatsWriter};
