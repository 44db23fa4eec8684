//! nbmend CLI: repair, validate and survey Jupyter notebooks.
//!
//! Restores the canonical section layout of scrambled notebooks, checks
//! notebooks for structural defects, and reports keyword coverage of a
//! file tree.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
