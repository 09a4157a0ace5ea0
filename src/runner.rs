use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::args::{Args, Command};
use crate::config::Parameters;
use crate::core::{Genotype, Neighborhood, SimulationContext, World};
use crate::patchgen;
use crate::readwrite::{CheckpointIO, CsvStatsWriter, GenotypeIO, NeighborhoodIO, StatsWriter};

pub const CHECKPOINT_FILE: &str = "checkpoint.bin";
pub const RUNTIME_FILE: &str = "runtime.yaml";
pub const PARAMETERS_FILE: &str = "parameters.yaml";

const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Summary of a finished run, stored next to its statistics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RuntimeInfo {
    pub version: String,
    /// Seconds since the epoch at which the run started.
    pub started: u64,
    pub runtime_seconds: f64,
    pub random_seed: u64,
    pub start_date: i32,
    pub final_date: i32,
    /// Final state of the run this one was resumed from.
    pub initial_state: Option<String>,
    pub final_state: String,
}

impl RuntimeInfo {
    fn new(random_seed: u64) -> Self {
        let started = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            started,
            runtime_seconds: 0.,
            random_seed,
            start_date: 0,
            final_date: 0,
            initial_state: None,
            final_state: String::new(),
        }
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)
            .with_context(|| format!("Unable to open {}", path.display()))?;
        Ok(serde_yaml::from_reader(file)?)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Unable to create {}", path.display()))?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }
}

pub struct Runner {
    args: Args,
    outdir: PathBuf,
    world: World,
    stats: CsvStatsWriter<fs::File>,
    runtime: RuntimeInfo,
    timer: Instant,
}

impl Runner {
    pub fn new(args: Args) -> Result<Runner> {
        let timer = Instant::now();
        let outdir = PathBuf::from(&args.outdir);
        fs::create_dir_all(&outdir)
            .with_context(|| format!("Unable to create {}", outdir.display()))?;

        let (world, runtime) = match &args.command {
            Command::New {
                parameters,
                neighbors,
                sequence,
            } => {
                let parameters = Self::load_parameters(parameters)?;
                let genotype = match sequence {
                    Some(path) => Genotype::load_fasta(Path::new(path))?,
                    None => parameters.initial_genotype()?,
                };
                let runtime = RuntimeInfo::new(parameters.random_seed);
                let mut world = Self::create_world(parameters, neighbors.as_deref())?;
                world.seed_infection(genotype)?;
                (world, runtime)
            }
            Command::Resume {
                checkpoint,
                parameters,
                neighbors,
            } => {
                let parameters = Self::load_parameters(parameters)?;
                let mut runtime = RuntimeInfo::new(parameters.random_seed);
                let mut world = Self::create_world(parameters, neighbors.as_deref())?;
                Self::resume(&mut world, &mut runtime, Path::new(checkpoint))?;
                (world, runtime)
            }
            Command::Patch { .. } => {
                anyhow::bail!("Neighbor files are generated without a simulation.")
            }
        };

        world
            .context()
            .parameters
            .write_to_file(&outdir.join(PARAMETERS_FILE).to_string_lossy())?;
        let stats = CsvStatsWriter::create(&outdir)?;

        Ok(Self {
            args,
            outdir,
            world,
            stats,
            runtime,
            timer,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        self.run()?;
        self.finish()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn runtime(&self) -> &RuntimeInfo {
        &self.runtime
    }

    /// Setup logging level and file
    pub fn setup_logger(args: &Args) {
        let log_level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        simple_logging::log_to_file(args.log_file.as_str(), log_level).unwrap_or_else(|_| {
            eprintln!("Unable to open log file.");
            std::process::exit(1);
        });
    }

    /// Write a neighbor file for `hosts` hosts into the current directory.
    pub fn generate_patch(seed: u64, hosts: usize) -> Result<PathBuf> {
        let path = patchgen::run(seed, hosts, Path::new("."))?;
        println!("Saved neighbor file {}.", path.display());
        Ok(path)
    }

    /// Load parameters from file
    fn load_parameters(path: &str) -> Result<Parameters> {
        let mut parameters = Parameters::read_from_file(path)
            .with_context(|| format!("Unable to read parameters from {path}"))?;
        if parameters.random_seed == 0 {
            parameters.random_seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as u64)
                .unwrap_or(1);
            log::info!("Using random seed {}.", parameters.random_seed);
        }
        parameters.validate()?;
        log::info!("Loaded parameters\n{}", parameters);
        Ok(parameters)
    }

    fn create_world(parameters: Parameters, neighbors: Option<&str>) -> Result<World> {
        let path = match neighbors {
            Some(path) => PathBuf::from(path),
            None => patchgen::default_path(parameters.hosts_per_patch),
        };
        let neighborhood = Neighborhood::read_from_file(&path, parameters.hosts_per_patch)
            .with_context(|| format!("Unable to load neighbor file {}", path.display()))?;
        Ok(World::new(
            SimulationContext::new(parameters),
            Rc::new(neighborhood),
        )?)
    }

    fn resume(world: &mut World, runtime: &mut RuntimeInfo, checkpoint: &Path) -> Result<()> {
        log::info!("Loading state...");
        let header = world.load_checkpoint_from_file(checkpoint)?;
        let seed = world.context().parameters.random_seed;
        if header.random_seed != seed {
            log::info!("Reseeding generator with {seed}.");
            world.context_mut().reseed(seed);
        }

        let previous = checkpoint.with_file_name(RUNTIME_FILE);
        if previous.exists() {
            runtime.initial_state = Some(RuntimeInfo::read_from_file(&previous)?.final_state);
        }

        // the first snapshot is taken after a full day
        log::info!("Updating world...");
        world.update();
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let num_days = self.world.context().parameters.num_days;
        let bar = match self.args.disable_progress_bar {
            true => None,
            false => {
                let bar = ProgressBar::new(num_days as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "[{bar:40}] {pos:>7}/{len:7} [{elapsed_precise} / {duration_precise}] {msg}",
                        )?
                        .progress_chars("=> "),
                );
                Some(bar)
            }
        };

        let start_date = self.world.date();
        self.runtime.start_date = start_date;
        self.stats.record(&self.world)?;

        let mut last_output: Option<(Instant, i32)> = None;
        while self.world.date() - start_date < num_days as i32 - 1 {
            self.world.check_extinction()?;
            self.world.update();
            self.stats.record(&self.world)?;

            let date = self.world.date();
            log::debug!(
                "day={date} strains={} sick={}",
                self.world.known_strains().len(),
                self.world.total_sick()
            );
            if let Some(bar) = bar.as_ref() {
                bar.set_position((date - start_date + 1) as u64);
                bar.set_message(format!(
                    "{} | {} sick",
                    self.world.date_string(),
                    self.world.total_sick()
                ));
            }

            let now = Instant::now();
            let due = match last_output {
                None => true,
                Some((time, _)) => now.duration_since(time) >= PROGRESS_INTERVAL,
            };
            if due {
                let (elapsed, days) = match last_output {
                    None => (0., date - start_date),
                    Some((time, last_date)) => {
                        (now.duration_since(time).as_secs_f64(), date - last_date)
                    }
                };
                log::info!(
                    "Date: {} | Days/Sec: {:.1}",
                    self.world.date_string(),
                    days as f64 / elapsed.max(1.)
                );
                last_output = Some((now, date));
            }
        }

        self.stats.flush()?;
        if let Some(bar) = bar {
            bar.finish_with_message("Done.");
        }
        log::info!("Finished simulation on {}.", self.world.date_string());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.world.context().parameters.save_state {
            log::info!("Saving state...");
            self.world
                .save_checkpoint_to_file(&self.outdir.join(CHECKPOINT_FILE))?;
        }

        let final_state = self.world.final_state_hash();
        log::info!("Final state: {final_state:016x}");

        self.runtime.final_date = self.world.date();
        self.runtime.final_state = format!("{final_state:016x}");
        self.runtime.runtime_seconds = self.timer.elapsed().as_secs_f64();
        self.runtime.write_to_file(&self.outdir.join(RUNTIME_FILE))?;
        Ok(())
    }
}
