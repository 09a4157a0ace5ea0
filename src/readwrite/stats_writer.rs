use std::fs;
use std::io::Write;
use std::path::Path;

use crate::core::World;
use crate::errors::{DriftError, Result};
use crate::stats::{PatchRecord, StrainRecord};

pub trait StatsWriter {
    /// Record the statistics of the current day of `world`.
    fn record(&mut self, world: &World) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Writes `patches.csv` and `strains.csv`, one block of rows per recorded day.
pub struct CsvStatsWriter<W: Write> {
    patches: csv::Writer<W>,
    strains: csv::Writer<W>,
}

impl CsvStatsWriter<fs::File> {
    pub fn create(outdir: &Path) -> Result<Self> {
        fs::create_dir_all(outdir)?;
        let open = |name: &str| {
            let path = outdir.join(name);
            fs::File::create(&path).map_err(|error| {
                DriftError::InitializationError(format!(
                    "Unable to create {}: {error}",
                    path.display()
                ))
            })
        };
        Self::from_writers(open("patches.csv")?, open("strains.csv")?)
    }
}

impl<W: Write> CsvStatsWriter<W> {
    pub fn from_writers(patches: W, strains: W) -> Result<Self> {
        let mut patches = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(patches);
        patches.write_record(PatchRecord::HEADER).map_err(csv_error)?;
        let mut strains = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(strains);
        strains.write_record(StrainRecord::HEADER).map_err(csv_error)?;
        Ok(Self { patches, strains })
    }

    pub fn into_inner(self) -> Result<(W, W)> {
        let patches = self
            .patches
            .into_inner()
            .map_err(|error| DriftError::IoError(error.into_error()))?;
        let strains = self
            .strains
            .into_inner()
            .map_err(|error| DriftError::IoError(error.into_error()))?;
        Ok((patches, strains))
    }
}

impl<W: Write> StatsWriter for CsvStatsWriter<W> {
    fn record(&mut self, world: &World) -> Result<()> {
        let day = world.date();
        for patch in world.patches() {
            self.patches
                .serialize(PatchRecord::new(day, patch.id(), &patch.stats))
                .map_err(csv_error)?;
        }
        for strain in world.known_strains().keys() {
            self.strains
                .serialize(StrainRecord::new(day, strain))
                .map_err(csv_error)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.patches.flush()?;
        self.strains.flush()?;
        Ok(())
    }
}

fn csv_error(error: csv::Error) -> DriftError {
    DriftError::IoError(error.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MutationAlgorithm, Parameters};
    use crate::core::strain::Genotype;
    use crate::core::{Neighborhood, SimulationContext};
    use serial_test::serial;
    use std::rc::Rc;

    fn world() -> World {
        let parameters = Parameters {
            num_patches: 2,
            hosts_per_patch: 10,
            random_seed: 3,
            mutation_algorithm: MutationAlgorithm::None,
            ..Parameters::default()
        };
        let context = SimulationContext::new(parameters);
        let mut world = World::new(context, Rc::new(Neighborhood::isolated(10))).unwrap();
        world.seed_infection(Genotype::default()).unwrap();
        world
    }

    #[test]
    fn rows_per_day() {
        let world = world();
        let mut writer = CsvStatsWriter::from_writers(Vec::new(), Vec::new()).unwrap();
        writer.record(&world).unwrap();
        let (patches, strains) = writer.into_inner().unwrap();
        let patches = String::from_utf8(patches).unwrap();
        let strains = String::from_utf8(strains).unwrap();

        let mut lines = patches.lines();
        assert_eq!(
            lines.next(),
            Some("day,patch,naive,exposed,infectious,recovered,incidence")
        );
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&"0,0,9,1,0,0,0") || rows.contains(&"0,1,9,1,0,0,0"));

        let founder = format!("0,0,,{},KKKKKKKKKKKK,1,0,0,0", "A".repeat(36));
        assert_eq!(
            strains.lines().collect::<Vec<_>>(),
            vec![
                "day,id,parent_id,rna,protein,infected,incidence,mutations,age",
                founder.as_str(),
            ]
        );
    }

    #[test]
    #[serial]
    fn files_in_outdir() {
        let outdir = std::env::temp_dir().join("driftsim-stats-test");
        let mut writer = CsvStatsWriter::create(&outdir).unwrap();
        writer.record(&world()).unwrap();
        writer.flush().unwrap();
        let patches = fs::read_to_string(outdir.join("patches.csv")).unwrap();
        assert_eq!(patches.lines().count(), 3);
        let strains = fs::read_to_string(outdir.join("strains.csv")).unwrap();
        assert_eq!(strains.lines().count(), 2);
        fs::remove_dir_all(&outdir).unwrap();
    }
}
