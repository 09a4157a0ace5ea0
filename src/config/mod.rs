//! Configuration data structures for simulation setups.

mod algorithms;
mod parameters;

pub use algorithms::{Connectivity, InfectionAlgorithm, MutationAlgorithm, PatchStatsAlgorithm};
pub use parameters::{
    MAX_HOSTS_PER_PATCH, MAX_PATCHES, NEIGHBORHOOD_RADIUS, Parameters, ParametersError,
};
