use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, name = "driftsim")]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Path to the log file.
    #[clap(long, default_value = "driftsim.log")]
    pub log_file: String,

    /// Increase the log level (Debug, then Trace).
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not draw a progress bar.
    #[clap(long)]
    pub disable_progress_bar: bool,

    /// Directory for statistics, checkpoint and runtime information.
    #[clap(long, short, default_value = "output")]
    pub outdir: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new simulation.
    New {
        /// Path to parameters (yaml file).
        #[clap(long)]
        parameters: String,

        /// Path to the neighbor file [default: patch-<hosts_per_patch>.bin].
        #[clap(long)]
        neighbors: Option<String>,

        /// Path to the initial genotype (fasta file), overrides the parameters.
        #[clap(long)]
        sequence: Option<String>,
    },

    /// Continue a simulation from a checkpoint.
    Resume {
        /// Path to the checkpoint written by a previous run.
        #[clap(long)]
        checkpoint: String,

        /// Path to parameters (yaml file).
        #[clap(long)]
        parameters: String,

        /// Path to the neighbor file [default: patch-<hosts_per_patch>.bin].
        #[clap(long)]
        neighbors: Option<String>,
    },

    /// Generate a neighbor file patch-<hosts>.bin in the current directory.
    Patch {
        /// Random seed of the host layout.
        #[clap(long, default_value_t = 0)]
        seed: u64,

        /// Number of hosts in the patch.
        #[clap(long)]
        hosts: usize,
    },
}
