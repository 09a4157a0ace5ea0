//! Generation of neighbor files.
//!
//! Hosts are scattered uniformly over the unit square. Distances are then
//! rescaled so that the mean distance to the nearest host is one unit, and
//! every two hosts closer than the neighborhood radius become contacts.

use itertools::iproduct;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

use crate::config::NEIGHBORHOOD_RADIUS;
use crate::core::{MersenneTwister, Neighborhood};
use crate::errors::{DriftError, Result};
use crate::readwrite::NeighborhoodIO;

/// Bins per axis relative to the square root of the number of hosts.
const BINS_PER_SQRT_HOST: f64 = 0.48;

/// Hosts with this many contacts do not fit the neighbor file.
const MAX_NEIGHBORS: usize = u8::MAX as usize;

pub fn default_path(n_hosts: usize) -> PathBuf {
    PathBuf::from(format!("patch-{n_hosts}.bin"))
}

struct Layout {
    xs: Vec<f32>,
    ys: Vec<f32>,
    n_bins: usize,
    bins: Vec<Vec<u32>>,
}

impl Layout {
    fn scatter(rng: &mut MersenneTwister, n_hosts: usize, n_bins: usize) -> Self {
        let mut layout = Self {
            xs: Vec::with_capacity(n_hosts),
            ys: Vec::with_capacity(n_hosts),
            n_bins,
            bins: vec![Vec::new(); n_bins * n_bins],
        };
        for host in 0..n_hosts {
            let x = rng.next_float();
            let y = rng.next_float();
            layout.xs.push(x);
            layout.ys.push(y);
            let bin = layout.bin(host);
            layout.bins[bin].push(host as u32);
        }
        layout
    }

    fn bin_coordinates(&self, host: usize) -> (usize, usize) {
        let scale = self.n_bins as f32;
        let x = ((self.xs[host] * scale) as usize).min(self.n_bins - 1);
        let y = ((self.ys[host] * scale) as usize).min(self.n_bins - 1);
        (x, y)
    }

    fn bin(&self, host: usize) -> usize {
        let (x, y) = self.bin_coordinates(host);
        x * self.n_bins + y
    }

    fn distance(&self, a: usize, b: usize) -> f64 {
        let dx = (self.xs[a] - self.xs[b]) as f64;
        let dy = (self.ys[a] - self.ys[b]) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Hosts in the bin of `host` and the eight bins around it.
    fn nearby(&self, host: usize) -> impl Iterator<Item = usize> + '_ {
        let (x, y) = self.bin_coordinates(host);
        let range = |center: usize| center.saturating_sub(1)..(center + 2).min(self.n_bins);
        iproduct!(range(x), range(y))
            .flat_map(move |(i, j)| self.bins[i * self.n_bins + j].iter())
            .map(|&other| other as usize)
            .filter(move |&other| other != host)
    }
}

/// Generate the contact network of `n_hosts` hosts from `seed`.
pub fn generate(seed: u64, n_hosts: usize) -> Result<Neighborhood> {
    let n_bins = ((n_hosts as f64).sqrt() * BINS_PER_SQRT_HOST) as usize;
    log::info!("Points = {n_hosts}");
    log::info!("Bins = {n_bins}x{n_bins} = {}", n_bins * n_bins);
    if n_bins == 0 || n_hosts < 4 {
        return Err(DriftError::InitializationError(format!(
            "Too few hosts to lay out a patch: {n_hosts}"
        )));
    }

    let mut rng = MersenneTwister::seed_from_u64(seed);
    let layout = Layout::scatter(&mut rng, n_hosts, n_bins);

    // every other host of the first half
    let samples: Vec<f64> = (0..n_hosts / 2)
        .step_by(2)
        .map(|host| {
            layout
                .nearby(host)
                .map(|other| layout.distance(host, other))
                .fold(2.0, f64::min)
        })
        .collect();
    let average = samples.iter().sum::<f64>() / samples.len() as f64;
    let multiplier = 1.0 / average;
    let bin_coverage = multiplier / n_bins as f64;
    log::info!("Average min dist is {average}, multiplier is {multiplier}.");
    log::info!("Each bin covers {bin_coverage} units per axis.");
    if bin_coverage < NEIGHBORHOOD_RADIUS {
        return Err(DriftError::InitializationError(format!(
            "Bin coverage is too low: {bin_coverage}"
        )));
    }

    let mut lists: Vec<Vec<u32>> = Vec::with_capacity(n_hosts);
    for host in 0..n_hosts {
        let list: Vec<u32> = layout
            .nearby(host)
            .filter(|&other| layout.distance(host, other) * multiplier < NEIGHBORHOOD_RADIUS)
            .map(|other| other as u32)
            .collect();
        if list.len() >= MAX_NEIGHBORS {
            return Err(DriftError::InitializationError(format!(
                "Host {host} has too many neighbors: {}",
                list.len()
            )));
        }
        if (host + 1) % 100_000 == 0 {
            log::debug!(" {}/{n_hosts}   ({})", host + 1, list.len());
        }
        lists.push(list);
    }

    let sizes = lists.iter().map(Vec::len);
    let (min, max) = (sizes.clone().min(), sizes.clone().max());
    let total: usize = sizes.sum();
    log::info!(
        "Min={} | Avg={:.3} | Max={} | Total={total}",
        min.unwrap_or(0),
        total as f64 / n_hosts as f64,
        max.unwrap_or(0)
    );

    Neighborhood::from_lists(&lists)
}

/// Generate a neighbor file in `outdir`. Existing files are never replaced.
pub fn run(seed: u64, n_hosts: usize, outdir: &Path) -> Result<PathBuf> {
    let path = outdir.join(default_path(n_hosts));
    if path.exists() {
        return Err(DriftError::InitializationError(format!(
            "The file {} already exists; please delete it first.",
            path.display()
        )));
    }
    let neighborhood = generate(seed, n_hosts)?;
    neighborhood.write_to_file(&path)?;
    log::info!("Saved neighborhood to {}.", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn contacts_are_symmetric() {
        let neighborhood = generate(1, 1100).unwrap();
        assert_eq!(neighborhood.n_hosts(), 1100);
        for host in 0..1100 {
            for &other in neighborhood.neighbors(host) {
                assert_ne!(other as usize, host);
                assert!(neighborhood.neighbors(other as usize).contains(&(host as u32)));
            }
        }
        let average = neighborhood.total_neighbors() as f64 / 1100.;
        assert!(average > 9. && average < 14., "{average}");
    }

    #[test]
    fn deterministic() {
        assert_eq!(generate(7, 1100).unwrap(), generate(7, 1100).unwrap());
        assert_ne!(generate(7, 1100).unwrap(), generate(8, 1100).unwrap());
    }

    #[test]
    fn too_few_hosts() {
        assert!(generate(1, 3).is_err());
    }

    #[test]
    #[serial]
    fn refuses_to_overwrite() {
        let outdir = std::env::temp_dir().join("driftsim-patchgen-test");
        let _ = fs::remove_dir_all(&outdir);
        fs::create_dir_all(&outdir).unwrap();
        let path = run(1, 1100, &outdir).unwrap();
        assert_eq!(path, outdir.join("patch-1100.bin"));
        assert!(run(1, 1100, &outdir).is_err());
        let neighborhood = Neighborhood::read_from_file(&path, 1100).unwrap();
        assert_eq!(neighborhood, generate(1, 1100).unwrap());
        fs::remove_dir_all(&outdir).unwrap();
    }
}
