use clap::Parser;

use driftsim::args::{Args, Command};
use driftsim::runner::Runner;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    Runner::setup_logger(&args);

    match args.command {
        Command::Patch { seed, hosts } => {
            Runner::generate_patch(seed, hosts)?;
        }
        _ => {
            let mut runner = Runner::new(args)?;
            runner.start()?;
        }
    }
    Ok(())
}
