use clap::CommandFactory;
use clap_complete::{Shell, generate_to};
use std::env;
use std::io::Error;

include!("src/args.rs");

/// Writes bash, fish and zsh completions for `driftsim` into `OUT_DIR`.
fn main() -> Result<(), Error> {
    println!("cargo:rerun-if-changed=src/args.rs");
    let Some(out_dir) = env::var_os("OUT_DIR") else {
        return Ok(());
    };

    let mut cmd = Args::command();
    for shell in [Shell::Bash, Shell::Fish, Shell::Zsh] {
        generate_to(shell, &mut cmd, "driftsim", &out_dir)?;
    }
    Ok(())
}
