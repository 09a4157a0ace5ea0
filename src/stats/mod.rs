//! Daily statistics of patches and strains.

use serde::Serialize;

use crate::core::StrainRef;

/// Aggregate host counts of a patch.
///
/// `incidence` is reset every day. The remaining counts are only kept current
/// when every host is recounted at the end of a day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub naive: u32,
    pub exposed: u32,
    pub infectious: u32,
    pub recovered: u32,
    pub incidence: u32,
}

impl PatchStats {
    pub fn new(n_hosts: u32) -> Self {
        Self {
            naive: n_hosts,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrainStats {
    pub id: u32,
    pub parent_id: Option<u32>,
    pub infected: u32,
    pub incidence: u32,
    pub mutations: u32,
    pub age: i32,
}

impl StrainStats {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// One row of `patches.csv`.
#[derive(Debug, Serialize)]
pub struct PatchRecord {
    pub day: i32,
    pub patch: usize,
    pub naive: u32,
    pub exposed: u32,
    pub infectious: u32,
    pub recovered: u32,
    pub incidence: u32,
}

impl PatchRecord {
    pub fn new(day: i32, patch: usize, stats: &PatchStats) -> Self {
        Self {
            day,
            patch,
            naive: stats.naive,
            exposed: stats.exposed,
            infectious: stats.infectious,
            recovered: stats.recovered,
            incidence: stats.incidence,
        }
    }

    pub const HEADER: [&'static str; 7] = [
        "day",
        "patch",
        "naive",
        "exposed",
        "infectious",
        "recovered",
        "incidence",
    ];
}

/// One row of `strains.csv`.
#[derive(Debug, Serialize)]
pub struct StrainRecord {
    pub day: i32,
    pub id: u32,
    pub parent_id: Option<u32>,
    pub rna: String,
    pub protein: String,
    pub infected: u32,
    pub incidence: u32,
    pub mutations: u32,
    pub age: i32,
}

impl StrainRecord {
    pub fn new(day: i32, strain: &StrainRef) -> Self {
        let stats = strain.stats();
        Self {
            day,
            id: stats.id,
            parent_id: stats.parent_id,
            rna: strain.rna_string(),
            protein: strain.protein_string(),
            infected: stats.infected,
            incidence: stats.incidence,
            mutations: stats.mutations,
            age: stats.age,
        }
    }

    pub const HEADER: [&'static str; 9] = [
        "day",
        "id",
        "parent_id",
        "rna",
        "protein",
        "infected",
        "incidence",
        "mutations",
        "age",
    ];
}
