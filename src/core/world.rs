//! The simulated world: patches of hosts and the registry of circulating strains.
//!
//! [`World::update`] advances the world by one day. Every random decision
//! draws from the generator of the simulation context in a fixed order, so
//! that a seed determines the whole trajectory and a checkpoint resumes it
//! exactly. The order of traversal of the registry and of the carrier sets is
//! part of that contract.

use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::rc::Rc;

use super::context::SimulationContext;
use super::host::{Host, HostId, HostState};
use super::linked::{OrderedMap, OrderedSet};
use super::patch::{Neighborhood, Patch};
use super::strain::{Genotype, NUM_CODONS, Strain, StrainRef};
use super::tables::{DAYS_PER_YEAR, draw_from_distribution, seasonality};
use crate::config::{Connectivity, InfectionAlgorithm, PatchStatsAlgorithm};
use crate::errors::{DriftError, Result};
use crate::readwrite::binary::{BinaryRead, BinaryWrite};
use crate::stats::PatchStats;

/// Carrier sets of every circulating strain.
pub type Registry = OrderedMap<StrainRef, OrderedSet<HostId>>;

type Exposures = SmallVec<[HostId; 32]>;

/// Climate zone of a patch, which sets the phase of its seasonality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deme {
    North,
    Tropics,
    South,
}

impl Deme {
    pub fn day_of_year(self, date: i32) -> usize {
        let days = DAYS_PER_YEAR as i32;
        match self {
            Deme::North => date.rem_euclid(days) as usize,
            // no seasonality, as if it were always April 1
            Deme::Tropics => DAYS_PER_YEAR / 4,
            Deme::South => (date + days / 2).rem_euclid(days) as usize,
        }
    }
}

pub struct World {
    date: i32,
    patches: Vec<Patch>,
    known_strains: Registry,
    context: SimulationContext,
}

impl World {
    /// Create a world without infections. Every patch shares `neighborhood`.
    pub fn new(context: SimulationContext, neighborhood: Rc<Neighborhood>) -> Result<Self> {
        let hosts_per_patch = context.parameters.hosts_per_patch;
        if neighborhood.n_hosts() != hosts_per_patch {
            return Err(DriftError::ReadError(format!(
                "Neighborhood has {} hosts, patches have {hosts_per_patch} hosts.",
                neighborhood.n_hosts()
            )));
        }
        let patches = (0..context.parameters.num_patches)
            .map(|id| Patch::new(id, neighborhood.clone()))
            .collect();
        log::info!(
            "Created world with {} patches of {} hosts.",
            context.parameters.num_patches,
            hosts_per_patch
        );
        Ok(Self {
            date: 0,
            patches,
            known_strains: Registry::new(),
            context,
        })
    }

    pub fn date(&self) -> i32 {
        self.date
    }

    /// The date as `YYYY-MM-DD` with twelve months of 31 days.
    pub fn date_string(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}",
            self.date / 365,
            (self.date % 365) / 31 + 1,
            (self.date % 365 % 31) + 1
        )
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn host(&self, id: HostId) -> &Host {
        self.patches[id.patch as usize].host(id.local as usize)
    }

    fn host_mut(&mut self, id: HostId) -> &mut Host {
        self.patches[id.patch as usize].host_mut(id.local as usize)
    }

    pub fn known_strains(&self) -> &Registry {
        &self.known_strains
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SimulationContext {
        &mut self.context
    }

    pub fn is_extinct(&self) -> bool {
        self.known_strains.is_empty()
    }

    /// Fails once no strain circulates although carriers are enforced.
    pub fn check_extinction(&self) -> Result<()> {
        if self.context.parameters.min_carriers > 0 && self.is_extinct() {
            return Err(DriftError::ExtinctionError {
                date: self.date,
                date_string: self.date_string(),
            });
        }
        Ok(())
    }

    pub fn total_sick(&self) -> u64 {
        self.known_strains
            .iter()
            .map(|(_, carriers)| carriers.len() as u64)
            .sum()
    }

    /// Infect a random host with a founder strain of `genotype`.
    pub fn seed_infection(&mut self, genotype: Genotype) -> Result<HostId> {
        let strain = Strain::new(self.date, genotype, &mut self.context)?;
        let patch = self.context.rng.next_index(self.patches.len());
        let local = self.context.rng.next_index(self.patches[patch].len());
        let id = HostId::new(patch, local);

        let date = self.date;
        self.host_mut(id).infect(date, &strain);
        let mut carriers = OrderedSet::new();
        carriers.add(id);
        self.known_strains.put(strain, carriers);

        let stats = &mut self.patches[patch].stats;
        stats.exposed += 1;
        stats.naive = stats.naive.saturating_sub(1);
        self.update_strain_stats();
        log::info!("Seeded infection in host {id} on {}.", self.date_string());
        Ok(id)
    }

    /// Protection conferred by immune memory at immunity distance `distance`.
    pub fn cross_protection(&self, distance: f64) -> f64 {
        let parameters = &self.context.parameters;
        if distance >= parameters.nt {
            parameters.theta1
                + (parameters.theta0 - parameters.theta1) * (distance - parameters.nt)
                    / (NUM_CODONS as f64 - parameters.nt)
        } else if distance > 0.0 {
            parameters.theta1
        } else {
            1.0
        }
    }

    /// Probability that an exposure of `host` to `strain` today infects it.
    pub fn infection_probability(&self, host: &Host, strain: &Strain) -> f64 {
        match host.last_infection_date() {
            None => 1.0,
            Some(last) => {
                let parameters = &self.context.parameters;
                let general = 1.0
                    - parameters.omega * (-((self.date - last) as f64) / parameters.tau).exp();
                let specific =
                    1.0 - self.cross_protection(host.immunity_distance(strain) as f64);
                general * specific
            }
        }
    }

    pub fn deme(&self, patch: usize) -> Deme {
        let n_patches = self.patches.len();
        match self.context.parameters.connectivity_algorithm {
            Connectivity::Flat | Connectivity::Cylindrical => {
                if patch >= n_patches / 2 {
                    Deme::South
                } else {
                    Deme::North
                }
            }
            Connectivity::Tropics => {
                if patch < n_patches * 4 / 10 {
                    Deme::North
                } else if patch < n_patches * 9 / 10 {
                    Deme::Tropics
                } else {
                    Deme::South
                }
            }
        }
    }

    /// Whether an infection can travel from patch `from` to patch `to`.
    pub fn is_connected(&self, from: usize, to: usize) -> bool {
        match self.context.parameters.connectivity_algorithm {
            Connectivity::Flat | Connectivity::Tropics => true,
            Connectivity::Cylindrical => {
                let per_row = (self.patches.len() / 4) as isize;
                let (row1, col1) = (from as isize / per_row, from as isize % per_row);
                let (row2, col2) = (to as isize / per_row, to as isize % per_row);
                if col1 == col2 && (row1 - row2).abs() == 1 {
                    true
                } else if row1 == row2 {
                    let delta = (per_row + (col1 - col2)) % per_row;
                    delta == 1 || delta == per_row - 1
                } else {
                    false
                }
            }
        }
    }

    /// Advance the world by one day.
    pub fn update(&mut self) {
        self.date += 1;
        self.turnover();
        self.reset_incidence();
        self.mutate();
        let last_recovered = self.transmit();
        self.enforce_min_carriers(last_recovered);
        self.remove_empty_strains();
        if self.context.parameters.patch_stats_algorithm == PatchStatsAlgorithm::All {
            self.count_patch_stats();
        }
        self.update_strain_stats();
    }

    /// Replace the hosts whose lifespan ends today. Sick hosts are spared
    /// while the number of carriers would drop to the minimum.
    fn turnover(&mut self) {
        let lifespan = self.context.parameters.host_lifespan;
        let min_carriers = self.context.parameters.min_carriers;
        let hosts_per_patch = self.context.parameters.hosts_per_patch;
        let mut total_sick = self.total_sick();

        let first = (self.date - 1) as usize % lifespan;
        for local in (first..hosts_per_patch).step_by(lifespan) {
            for patch in 0..self.patches.len() {
                let id = HostId::new(patch, local);
                let host = self.patches[patch].host(local);
                let was_sick = host.is_sick(self.date - 1);
                if was_sick && total_sick <= min_carriers {
                    continue;
                }
                if let Some(strain) = host.last_infection_strain()
                    && let Some(carriers) = self.known_strains.get_mut(strain)
                {
                    carriers.remove(&id);
                }
                if was_sick {
                    total_sick = total_sick.saturating_sub(1);
                }
                self.patches[patch].host_mut(local).reset();
            }
        }
    }

    fn reset_incidence(&mut self) {
        for patch in &mut self.patches {
            patch.stats.incidence = 0;
        }
        for strain in self.known_strains.keys() {
            strain.update_stats(|stats| stats.incidence = 0);
        }
    }

    /// Replicate the virus in every carrier and move mutated hosts to new strains.
    fn mutate(&mut self) {
        let mut new_strains = Registry::new();
        let mut mutated: VecDeque<HostId> = VecDeque::new();
        for strain in self.known_strains.key_vec() {
            let Some(carriers) = self.known_strains.get(&strain).map(OrderedSet::to_vec) else {
                continue;
            };
            mutated.clear();
            for id in carriers {
                let host = self.host(id);
                let (Some(current), Some(infection_date)) = (
                    host.last_infection_strain().cloned(),
                    host.last_infection_date(),
                ) else {
                    continue;
                };
                let replicated = Strain::replicate(&current, self.date, &mut self.context);
                if Rc::ptr_eq(&replicated, &current) {
                    continue;
                }
                mutated.push_front(id);
                self.host_mut(id).infect(infection_date, &replicated);
                if !new_strains.contains(&replicated) {
                    new_strains.put(replicated.clone(), OrderedSet::new());
                }
                if let Some(carriers) = new_strains.get_mut(&replicated) {
                    carriers.add(id);
                }
            }
            if let Some(carriers) = self.known_strains.get_mut(&strain) {
                carriers.remove_all(mutated.iter());
            }
        }
        for (strain, carriers) in new_strains.into_entries() {
            log::trace!(
                "Strain {} emerged from strain {:?}.",
                strain.id(),
                strain.stats().parent_id
            );
            self.known_strains.put(strain, carriers);
        }
    }

    /// Let every infectious host expose others and settle the exposures.
    ///
    /// Returns the hosts that recovered today, most recent first.
    fn transmit(&mut self) -> VecDeque<HostId> {
        let date = self.date;
        let mut last_recovered: VecDeque<HostId> = VecDeque::new();
        let mut extinct: VecDeque<StrainRef> = VecDeque::new();
        let mut new_infections: VecDeque<HostId> = VecDeque::new();
        let mut recovered: VecDeque<HostId> = VecDeque::new();
        let mut exposures = Exposures::new();

        for strain in self.known_strains.key_vec() {
            let Some(carriers) = self.known_strains.get(&strain).map(OrderedSet::to_vec) else {
                continue;
            };
            new_infections.clear();
            recovered.clear();
            for infector in carriers {
                let host = self.host(infector);
                if !host.is_infectious(date) {
                    if !host.is_incubating(date) {
                        recovered.push_front(infector);
                    }
                    continue;
                }
                let Some(infecting) = host.last_infection_strain().cloned() else {
                    continue;
                };

                exposures.clear();
                self.draw_exposures(infector, &mut exposures);

                for &exposed in &exposures {
                    let probability = self.infection_probability(self.host(exposed), &infecting);
                    if self.context.rng.next_double() < probability {
                        let previous = self.host(exposed).last_infection_strain().cloned();
                        if let Some(previous) = previous
                            && !Rc::ptr_eq(&previous, &infecting)
                            && let Some(carriers) = self.known_strains.get_mut(&previous)
                        {
                            carriers.remove(&exposed);
                        }
                        self.host_mut(exposed).infect(date, &infecting);
                        new_infections.push_front(exposed);
                        self.patches[exposed.patch as usize].stats.incidence += 1;
                        infecting.update_stats(|stats| stats.incidence += 1);
                    } else {
                        let host = self.host_mut(exposed);
                        if !host.is_incubating(date) && !host.is_infectious(date) {
                            host.boost(date);
                        }
                    }
                }
            }

            if let Some(carriers) = self.known_strains.get_mut(&strain) {
                carriers.add_all(new_infections.iter().copied());
                carriers.remove_all(recovered.iter());
                if carriers.is_empty() {
                    extinct.push_front(strain.clone());
                }
            }
            for &id in &recovered {
                last_recovered.push_front(id);
            }
        }

        for strain in &extinct {
            log::trace!("Strain {} went extinct.", strain.id());
            self.known_strains.remove(strain);
        }
        last_recovered
    }

    /// Collect the hosts exposed by `infector` today at the global, patch
    /// and neighborhood scale, in this order.
    fn draw_exposures(&mut self, infector: HostId, exposures: &mut Exposures) {
        let patch = infector.patch as usize;
        let local = infector.local as usize;
        let n_patches = self.patches.len();
        let deme = self.deme(patch);
        let day_of_year = deme.day_of_year(self.date);
        let infection_algorithm = self.context.parameters.infection_algorithm;

        let n_global = draw_from_distribution(
            &self.context.tables.poisson_global[day_of_year],
            self.context.rng.next_double(),
        );
        for _ in 0..n_global {
            let mut target = self.context.rng.next_index(n_patches - 1);
            if target >= patch {
                target += 1;
            }
            if self.is_connected(patch, target) {
                let host = self.context.rng.next_index(self.patches[target].len());
                exposures.push(HostId::new(target, host));
            }
        }

        let n_patch = draw_from_distribution(
            &self.context.tables.poisson_patch[day_of_year],
            self.context.rng.next_double(),
        );
        for _ in 0..n_patch {
            let host = self.context.rng.next_index(self.patches[patch].len());
            exposures.push(HostId::new(patch, host));
        }

        let neighbors = self.patches[patch].neighbors(local);
        let n_neighbors = neighbors.len();
        if n_neighbors == 0 {
            return;
        }

        let rng = &mut self.context.rng;
        let tables = &self.context.tables;
        let n_local = match infection_algorithm {
            InfectionAlgorithm::Exact => 0,
            InfectionAlgorithm::Approximate1 => {
                draw_from_distribution(&tables.poisson_local[day_of_year], rng.next_double())
            }
            InfectionAlgorithm::Approximate2 | InfectionAlgorithm::Approximate3 => {
                let expected = tables.infection_local[day_of_year] * n_neighbors as f64;
                if rng.next_double() < expected - expected.trunc() {
                    expected as usize + 1
                } else {
                    expected as usize
                }
            }
        };

        // a single draw without replacement is a draw with replacement
        let sampling = match infection_algorithm {
            InfectionAlgorithm::Approximate3 if n_local <= 1 => InfectionAlgorithm::Approximate2,
            algorithm => algorithm,
        };
        match sampling {
            InfectionAlgorithm::Exact => {
                let mut probability = tables.local_infection_probability;
                if deme != Deme::Tropics {
                    probability *= seasonality(&self.context.parameters, day_of_year);
                }
                for &neighbor in neighbors {
                    if rng.next_double() < probability {
                        exposures.push(HostId::new(patch, neighbor as usize));
                    }
                }
            }
            InfectionAlgorithm::Approximate1 | InfectionAlgorithm::Approximate2 => {
                for _ in 0..n_local {
                    let neighbor = neighbors[rng.next_index(n_neighbors)];
                    exposures.push(HostId::new(patch, neighbor as usize));
                }
            }
            InfectionAlgorithm::Approximate3 => {
                let mut candidates: SmallVec<[u32; 32]> = SmallVec::from_slice(neighbors);
                for _ in 0..n_local.min(n_neighbors) {
                    let neighbor = candidates.remove(rng.next_index(candidates.len()));
                    exposures.push(HostId::new(patch, neighbor as usize));
                }
            }
        }
    }

    /// Keep at least `min_carriers` hosts infected by extending the infection
    /// of the hosts that recovered last.
    fn enforce_min_carriers(&mut self, last_recovered: VecDeque<HostId>) {
        let min_carriers = self.context.parameters.min_carriers;
        let mut total_sick = self.total_sick();
        if total_sick >= min_carriers {
            return;
        }
        let date = self.date;
        for id in last_recovered {
            if total_sick >= min_carriers {
                break;
            }
            total_sick += 1;
            let host = self.host_mut(id);
            host.set_last_infection_date(date);
            let Some(strain) = host.last_infection_strain().cloned() else {
                continue;
            };
            if !self.known_strains.contains(&strain) {
                self.known_strains.put(strain.clone(), OrderedSet::new());
            }
            if let Some(carriers) = self.known_strains.get_mut(&strain) {
                carriers.add(id);
            }
        }
    }

    /// Drop strains whose carriers were all taken over by other strains
    /// after their own turn in today's transmission.
    fn remove_empty_strains(&mut self) {
        let empty: Vec<StrainRef> = self
            .known_strains
            .iter()
            .filter(|(_, carriers)| carriers.is_empty())
            .map(|(strain, _)| strain.clone())
            .collect();
        for strain in &empty {
            self.known_strains.remove(strain);
        }
    }

    fn count_patch_stats(&mut self) {
        let date = self.date;
        for patch in &mut self.patches {
            let mut stats = PatchStats {
                incidence: patch.stats.incidence,
                ..PatchStats::default()
            };
            for host in patch.hosts() {
                match host.state(date) {
                    HostState::Naive => stats.naive += 1,
                    HostState::Incubating => stats.exposed += 1,
                    HostState::Infectious => stats.infectious += 1,
                    HostState::Recovered => stats.recovered += 1,
                }
            }
            patch.stats = stats;
        }
    }

    fn update_strain_stats(&mut self) {
        let date = self.date;
        for (strain, carriers) in self.known_strains.iter() {
            strain.update_stats(|stats| {
                stats.infected = carriers.len() as u32;
                stats.age = date - strain.first_seen_date();
            });
        }
    }

    /// A value identifying the trajectory: the next 64 random bits mixed
    /// with the date and the number of carriers. Consumes two draws.
    pub fn final_state_hash(&mut self) -> i64 {
        let random = self.context.rng.next_long();
        let date = (self.date as i64) << 32;
        random ^ (date | self.total_sick() as i64)
    }

    /// Write date, strains, hosts and registry.
    ///
    /// Registered strains come first, in registry order, followed by strains
    /// that are only remembered by hosts.
    pub fn save_state(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_i32_be(self.date)?;

        let mut other_strains: OrderedSet<StrainRef> = OrderedSet::new();
        for patch in &self.patches {
            for host in patch.hosts() {
                if let Some(strain) = host.last_infection_strain()
                    && !self.known_strains.contains(strain)
                {
                    other_strains.add(strain.clone());
                }
            }
        }
        writer.write_u32_be((self.known_strains.len() + other_strains.len()) as u32)?;
        for strain in self.known_strains.keys().chain(other_strains.iter()) {
            strain.save_state(writer)?;
        }

        for patch in &self.patches {
            for host in patch.hosts() {
                host.save_state(writer)?;
            }
        }

        writer.write_u32_be(self.known_strains.len() as u32)?;
        for (strain, carriers) in self.known_strains.iter() {
            writer.write_u32_be(strain.id())?;
            writer.write_u32_be(carriers.len() as u32)?;
            for id in carriers.iter() {
                writer.write_u32_be(id.packed())?;
            }
        }
        Ok(())
    }

    /// Restore what [`World::save_state`] wrote into a world of the same shape.
    pub fn load_state(&mut self, reader: &mut impl Read) -> Result<()> {
        let corrupt = |error: io::Error| DriftError::CheckpointError(error.to_string());

        self.date = reader.read_i32_be().map_err(corrupt)?;

        let n_strains = reader.read_u32_be().map_err(corrupt)?;
        let mut strains: HashMap<u32, StrainRef> = HashMap::new();
        for _ in 0..n_strains {
            let strain = Strain::load_state(reader).map_err(corrupt)?;
            strains.insert(strain.id(), strain);
        }

        for patch in &mut self.patches {
            for host in patch.hosts_mut() {
                host.load_state(reader, &strains).map_err(corrupt)?;
            }
        }

        let n_registered = reader.read_u32_be().map_err(corrupt)?;
        let mut known_strains = Registry::new();
        for _ in 0..n_registered {
            let strain_id = reader.read_u32_be().map_err(corrupt)?;
            let strain = strains.get(&strain_id).cloned().ok_or_else(|| {
                DriftError::CheckpointError(format!("Registry refers to unknown strain {strain_id}."))
            })?;
            let n_hosts = reader.read_u32_be().map_err(corrupt)?;
            let mut carriers = OrderedSet::new();
            for _ in 0..n_hosts {
                let id = HostId::unpack(reader.read_u32_be().map_err(corrupt)?);
                if id.patch as usize >= self.patches.len()
                    || id.local as usize >= self.patches[id.patch as usize].len()
                {
                    return Err(DriftError::CheckpointError(format!(
                        "Registry refers to unknown host {id}."
                    )));
                }
                carriers.add(id);
            }
            // written head first and read back as a stack
            carriers.reverse();
            known_strains.put(strain, carriers);
        }
        known_strains.reverse();
        self.known_strains = known_strains;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MutationAlgorithm, Parameters};

    /// Hosts on a ring, each in contact with the two hosts on either side.
    fn ring(n_hosts: usize) -> Rc<Neighborhood> {
        let lists: Vec<Vec<u32>> = (0..n_hosts)
            .map(|host| {
                [n_hosts - 2, n_hosts - 1, 1, 2]
                    .iter()
                    .map(|offset| ((host + offset) % n_hosts) as u32)
                    .collect()
            })
            .collect();
        Rc::new(Neighborhood::from_lists(&lists).unwrap())
    }

    fn parameters() -> Parameters {
        Parameters {
            num_patches: 1,
            hosts_per_patch: 100,
            random_seed: 12345,
            mutation_algorithm: MutationAlgorithm::None,
            infection_algorithm: InfectionAlgorithm::Exact,
            min_carriers: 1,
            num_days: 365,
            ..Parameters::default()
        }
    }

    fn seeded_world(parameters: Parameters) -> World {
        let neighborhood = ring(parameters.hosts_per_patch);
        let context = SimulationContext::new(parameters);
        let mut world = World::new(context, neighborhood).unwrap();
        world.seed_infection(Genotype::default()).unwrap();
        world
    }

    /// Registered strains have carriers, and the sick hosts are exactly the
    /// carriers of their own strain.
    fn assert_registry_consistent(world: &World) {
        let mut n_carriers = 0;
        for (strain, carriers) in world.known_strains().iter() {
            assert!(!carriers.is_empty(), "strain {} has no carriers", strain.id());
            for &id in carriers.iter() {
                let host = world.host(id);
                assert!(host.is_sick(world.date()), "host {id} is not sick");
                assert!(Rc::ptr_eq(host.last_infection_strain().unwrap(), strain));
            }
            n_carriers += carriers.len();
        }
        let n_sick = world
            .patches()
            .iter()
            .flat_map(|patch| patch.hosts())
            .filter(|host| host.is_sick(world.date()))
            .count();
        assert_eq!(n_carriers, n_sick);
        assert_eq!(world.total_sick(), n_sick as u64);
    }

    fn snapshot(world: &World) -> Vec<(u32, u32, u32)> {
        world
            .known_strains()
            .keys()
            .map(|strain| {
                let stats = strain.stats();
                (stats.id, stats.infected, stats.incidence)
            })
            .collect()
    }

    #[test]
    fn date_string() {
        let mut world = World::new(SimulationContext::new(parameters()), ring(100)).unwrap();
        assert_eq!(world.date_string(), "0000-01-01");
        world.date = 365 + 40;
        assert_eq!(world.date_string(), "0001-02-10");
    }

    #[test]
    fn neighborhood_must_match() {
        let context = SimulationContext::new(parameters());
        assert!(World::new(context, ring(50)).is_err());
    }

    #[test]
    fn cross_protection() {
        let world = World::new(SimulationContext::new(parameters()), ring(100)).unwrap();
        assert_eq!(world.cross_protection(0.0), 1.0);
        assert_eq!(world.cross_protection(1.0), 0.99);
        assert_eq!(world.cross_protection(2.0), 0.99);
        assert!((world.cross_protection(12.0) - 0.25).abs() < 1e-12);
        assert!((world.cross_protection(7.0) - (0.99 - 0.74 / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn infection_probability() {
        let mut world = seeded_world(parameters());
        let (strain, carriers) = world.known_strains().iter().next().unwrap();
        let strain = strain.clone();
        let infected = *carriers.head().unwrap();
        let naive = HostId::new(0, (infected.local as usize + 50) % 100);

        assert_eq!(world.infection_probability(world.host(naive), &strain), 1.0);
        world.date = 10;
        // same strain: full cross-protection
        assert_eq!(world.infection_probability(world.host(infected), &strain), 0.0);
    }

    #[test]
    fn demes_and_connectivity() {
        let context = SimulationContext::new(Parameters {
            num_patches: 8,
            hosts_per_patch: 10,
            connectivity_algorithm: Connectivity::Cylindrical,
            ..parameters()
        });
        let world = World::new(context, ring(10)).unwrap();
        assert_eq!(world.deme(3), Deme::North);
        assert_eq!(world.deme(4), Deme::South);
        // two patches per row: 0 1 / 2 3 / 4 5 / 6 7
        assert!(world.is_connected(0, 1));
        assert!(world.is_connected(0, 2));
        assert!(!world.is_connected(0, 3));
        assert!(!world.is_connected(0, 4));

        let context = SimulationContext::new(Parameters {
            num_patches: 10,
            hosts_per_patch: 10,
            connectivity_algorithm: Connectivity::Tropics,
            ..parameters()
        });
        let world = World::new(context, ring(10)).unwrap();
        assert_eq!(world.deme(3), Deme::North);
        assert_eq!(world.deme(4), Deme::Tropics);
        assert_eq!(world.deme(9), Deme::South);
        assert!(world.is_connected(0, 9));

        assert_eq!(Deme::North.day_of_year(400), 35);
        assert_eq!(Deme::Tropics.day_of_year(400), 91);
        assert_eq!(Deme::South.day_of_year(400), 217);
    }

    #[test]
    fn seed_infection() {
        let world = seeded_world(parameters());
        assert_eq!(world.known_strains().len(), 1);
        assert_eq!(world.total_sick(), 1);
        assert_eq!(world.patches()[0].stats.exposed, 1);
        assert_eq!(world.patches()[0].stats.naive, 99);
        assert_registry_consistent(&world);
    }

    #[test]
    fn epidemic_persists_and_is_reproducible() {
        let mut first = seeded_world(parameters());
        let mut second = seeded_world(parameters());
        for _ in 1..365 {
            first.check_extinction().unwrap();
            first.update();
            second.update();
            assert_eq!(first.total_sick(), second.total_sick());
            assert_eq!(snapshot(&first), snapshot(&second));
        }
        assert_eq!(first.date(), 364);
        assert_eq!(first.final_state_hash(), second.final_state_hash());
    }

    #[test]
    fn different_seeds_diverge() {
        let mut first = seeded_world(parameters());
        let mut second = seeded_world(Parameters {
            random_seed: 54321,
            ..parameters()
        });
        let mut diverged = false;
        for _ in 0..100 {
            first.update();
            second.update();
            diverged |= first.total_sick() != second.total_sick();
        }
        assert!(diverged);
    }

    #[test]
    fn registry_stays_consistent() {
        let configurations = [
            (InfectionAlgorithm::Exact, Connectivity::Flat, 2),
            (InfectionAlgorithm::Approximate1, Connectivity::Flat, 2),
            (InfectionAlgorithm::Approximate2, Connectivity::Tropics, 10),
            (InfectionAlgorithm::Approximate3, Connectivity::Cylindrical, 8),
        ];
        for (infection_algorithm, connectivity_algorithm, num_patches) in configurations {
            let mut world = seeded_world(Parameters {
                num_patches,
                hosts_per_patch: 60,
                host_lifespan: 40,
                r0_patch: 1.0,
                r0_global: 0.1,
                mutation_algorithm: MutationAlgorithm::Exact,
                mutation_probability: 0.01,
                patch_stats_algorithm: PatchStatsAlgorithm::All,
                infection_algorithm,
                connectivity_algorithm,
                ..parameters()
            });
            for _ in 0..120 {
                world.update();
                assert_registry_consistent(&world);
                assert!(!world.is_extinct());
                let stats = world.patches().iter().map(|patch| {
                    let stats = patch.stats;
                    stats.naive + stats.exposed + stats.infectious + stats.recovered
                });
                assert!(stats.into_iter().all(|n_hosts| n_hosts == 60));
            }
        }
    }

    #[test]
    fn mutants_record_lineage() {
        let mut world = seeded_world(Parameters {
            hosts_per_patch: 200,
            mutation_algorithm: MutationAlgorithm::Approximate,
            mutation_probability: 0.01,
            ..parameters()
        });
        let founder = world.known_strains().head().unwrap().id();
        let mut mutants = Vec::new();
        for _ in 0..60 {
            world.update();
            mutants.extend(
                world
                    .known_strains()
                    .keys()
                    .filter(|strain| strain.id() != founder)
                    .map(|strain| strain.stats()),
            );
        }
        assert!(!mutants.is_empty());
        for stats in mutants {
            assert!(stats.parent_id.is_some());
            assert!(stats.mutations >= 1);
            assert!(stats.id > founder);
        }
    }

    #[test]
    fn turnover_resets_hosts() {
        let mut world = seeded_world(Parameters {
            host_lifespan: 1,
            min_carriers: 0,
            ..parameters()
        });
        // with a lifespan of one day every host is replaced daily
        world.update();
        assert!(world.is_extinct());
        assert!(world.check_extinction().is_ok());
        assert!(
            world
                .patches()
                .iter()
                .flat_map(|patch| patch.hosts())
                .all(|host| host.last_infection_date().is_none() || host.is_incubating(world.date()))
        );
    }

    #[test]
    fn extinction_is_reported() {
        let mut world = World::new(SimulationContext::new(parameters()), ring(100)).unwrap();
        world.date = 400;
        match world.check_extinction() {
            Err(DriftError::ExtinctionError { date, date_string }) => {
                assert_eq!(date, 400);
                assert_eq!(date_string, "0001-02-05");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn checkpoint_round_trip() {
        let parameters = Parameters {
            hosts_per_patch: 150,
            host_lifespan: 90,
            mutation_algorithm: MutationAlgorithm::Exact,
            mutation_probability: 0.005,
            ..parameters()
        };
        let mut original = seeded_world(parameters.clone());
        for _ in 0..40 {
            original.update();
        }

        let mut buffer = Vec::new();
        original.save_state(&mut buffer).unwrap();
        original.context().save_state(&mut buffer).unwrap();

        let context = SimulationContext::new(Parameters {
            random_seed: 1,
            ..parameters
        });
        let mut restored = World::new(context, ring(150)).unwrap();
        let mut reader = buffer.as_slice();
        restored.load_state(&mut reader).unwrap();
        restored.context_mut().load_state(&mut reader).unwrap();
        assert!(reader.is_empty());

        assert_eq!(restored.date(), original.date());
        assert_eq!(snapshot(&restored), snapshot(&original));
        assert_registry_consistent(&restored);
        for (a, b) in original.known_strains().iter().zip(restored.known_strains().iter()) {
            assert_eq!(a.1.to_vec(), b.1.to_vec());
        }

        for _ in 0..40 {
            original.update();
            restored.update();
            assert_eq!(snapshot(&restored), snapshot(&original));
        }
        assert_eq!(original.final_state_hash(), restored.final_state_hash());
    }

    #[test]
    fn truncated_checkpoint_is_rejected() {
        let mut world = seeded_world(parameters());
        world.update();
        let mut buffer = Vec::new();
        world.save_state(&mut buffer).unwrap();
        buffer.truncate(buffer.len() - 3);

        let mut restored = World::new(SimulationContext::new(parameters()), ring(100)).unwrap();
        assert!(matches!(
            restored.load_state(&mut buffer.as_slice()),
            Err(DriftError::CheckpointError(_))
        ));
    }
}
