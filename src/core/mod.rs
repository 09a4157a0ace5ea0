//! This module contains the core datatypes of the library.

pub mod context;
pub mod host;
pub mod linked;
pub mod patch;
pub mod random;
pub mod strain;
pub mod tables;
pub mod world;

pub use context::SimulationContext;
pub use host::{Host, HostId, HostState};
pub use linked::{OrderedMap, OrderedSet};
pub use patch::{Neighborhood, Patch};
pub use random::MersenneTwister;
pub use strain::{Genotype, Phenotype, Strain, StrainRef};
pub use world::{Deme, World};
