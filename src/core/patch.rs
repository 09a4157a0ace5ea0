use std::rc::Rc;

use super::host::Host;
use crate::errors::{DriftError, Result};
use crate::stats::PatchStats;

/// Contact network of the hosts of one patch.
///
/// Every patch has the same spatial layout, so a single neighborhood is
/// shared between all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Neighborhood {
    counts: Vec<u8>,
    offsets: Vec<u32>,
    neighbors: Vec<u32>,
}

impl Neighborhood {
    /// Build from per-host neighbor counts and the flattened neighbor list.
    pub fn new(counts: Vec<u8>, neighbors: Vec<u32>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(counts.len());
        let mut offset = 0u32;
        for &count in &counts {
            offsets.push(offset);
            offset += count as u32;
        }
        if offset as usize != neighbors.len() {
            return Err(DriftError::ReadError(format!(
                "Neighbor counts sum to {offset} but the list has {} entries.",
                neighbors.len()
            )));
        }
        let n_hosts = counts.len() as u32;
        if let Some(&id) = neighbors.iter().find(|&&id| id >= n_hosts) {
            return Err(DriftError::ReadError(format!(
                "Neighbor {id} is out of range for {n_hosts} hosts."
            )));
        }
        Ok(Self {
            counts,
            offsets,
            neighbors,
        })
    }

    pub fn from_lists(lists: &[Vec<u32>]) -> Result<Self> {
        let mut counts = Vec::with_capacity(lists.len());
        for (host, list) in lists.iter().enumerate() {
            let count = u8::try_from(list.len()).map_err(|_| {
                DriftError::InitializationError(format!(
                    "Host {host} has {} neighbors, at most {} are supported.",
                    list.len(),
                    u8::MAX
                ))
            })?;
            counts.push(count);
        }
        Self::new(counts, lists.concat())
    }

    /// Hosts with no contacts at all, for tests and degenerate layouts.
    pub fn isolated(n_hosts: usize) -> Self {
        Self {
            counts: vec![0; n_hosts],
            offsets: vec![0; n_hosts],
            neighbors: Vec::new(),
        }
    }

    pub fn n_hosts(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[u8] {
        &self.counts
    }

    pub fn total_neighbors(&self) -> usize {
        self.neighbors.len()
    }

    pub fn all_neighbors(&self) -> &[u32] {
        &self.neighbors
    }

    pub fn neighbors(&self, host: usize) -> &[u32] {
        let offset = self.offsets[host] as usize;
        &self.neighbors[offset..offset + self.counts[host] as usize]
    }
}

#[derive(Debug)]
pub struct Patch {
    id: usize,
    hosts: Vec<Host>,
    neighborhood: Rc<Neighborhood>,
    pub stats: PatchStats,
}

impl Patch {
    pub fn new(id: usize, neighborhood: Rc<Neighborhood>) -> Self {
        let n_hosts = neighborhood.n_hosts();
        Self {
            id,
            hosts: vec![Host::new(); n_hosts],
            neighborhood,
            stats: PatchStats::new(n_hosts as u32),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, local: usize) -> &Host {
        &self.hosts[local]
    }

    pub fn host_mut(&mut self, local: usize) -> &mut Host {
        &mut self.hosts[local]
    }

    pub fn hosts_mut(&mut self) -> &mut [Host] {
        &mut self.hosts
    }

    pub fn neighborhood(&self) -> &Rc<Neighborhood> {
        &self.neighborhood
    }

    pub fn neighbors(&self, local: usize) -> &[u32] {
        self.neighborhood.neighbors(local)
    }
}
