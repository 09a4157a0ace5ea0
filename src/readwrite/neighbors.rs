//! Neighbor files describe the contact network shared by all patches.
//!
//! Layout (big-endian): `i32` number of hosts, `i32` length of the neighbor
//! array, one `u8` neighbor count per host, then every host's neighbors as
//! `i32` local indices in host order.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::binary::{BinaryRead, BinaryWrite};
use crate::core::Neighborhood;
use crate::errors::{DriftError, Result};

pub trait NeighborhoodIO: Sized {
    fn read(reader: &mut impl Read, n_hosts: usize) -> Result<Self>;
    fn write(&self, writer: &mut impl Write) -> io::Result<()>;
    fn read_from_file(path: &Path, n_hosts: usize) -> Result<Self>;
    fn write_to_file(&self, path: &Path) -> Result<()>;
}

impl NeighborhoodIO for Neighborhood {
    /// Read a neighbor file that must describe exactly `n_hosts` hosts.
    fn read(reader: &mut impl Read, n_hosts: usize) -> Result<Self> {
        let truncated =
            |error: io::Error| DriftError::ReadError(format!("Invalid neighbor file: {error}"));

        let file_hosts = reader.read_i32_be().map_err(truncated)?;
        if file_hosts < 0 || file_hosts as usize != n_hosts {
            return Err(DriftError::ReadError(format!(
                "File has {file_hosts} hosts, Patch has {n_hosts} hosts"
            )));
        }
        let total = reader.read_i32_be().map_err(truncated)?;
        let total = usize::try_from(total).map_err(|_| {
            DriftError::ReadError(format!("Invalid neighbor array length {total}"))
        })?;

        let mut counts = vec![0u8; n_hosts];
        reader.read_exact(&mut counts).map_err(truncated)?;

        let mut neighbors = Vec::with_capacity(total);
        for _ in 0..total {
            let neighbor = reader.read_i32_be().map_err(truncated)?;
            let neighbor = u32::try_from(neighbor).map_err(|_| {
                DriftError::ReadError(format!("Invalid neighbor index {neighbor}"))
            })?;
            neighbors.push(neighbor);
        }

        let neighborhood = Neighborhood::new(counts, neighbors)?;
        log::debug!(
            "Read neighborhood of {} hosts with {} contacts.",
            neighborhood.n_hosts(),
            neighborhood.total_neighbors()
        );
        Ok(neighborhood)
    }

    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_i32_be(self.n_hosts() as i32)?;
        writer.write_i32_be(self.total_neighbors() as i32)?;
        writer.write_all(self.counts())?;
        for &neighbor in self.all_neighbors() {
            writer.write_i32_be(neighbor as i32)?;
        }
        writer.flush()
    }

    fn read_from_file(path: &Path, n_hosts: usize) -> Result<Self> {
        let file = fs::File::open(path).map_err(|error| {
            DriftError::ReadError(format!("Unable to open {}: {error}", path.display()))
        })?;
        Self::read(&mut BufReader::new(file), n_hosts)
    }

    /// Write to `path`. An existing file is never overwritten.
    fn write_to_file(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Err(DriftError::InitializationError(format!(
                "The file {} already exists; please delete it first.",
                path.display()
            )));
        }
        let mut writer = BufWriter::new(fs::File::create(path)?);
        self.write(&mut writer)?;
        Ok(())
    }
}
