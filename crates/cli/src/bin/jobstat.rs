// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobstat - print the job catalog, one label per line

use anyhow::Context;
use clap::Parser;
use jobd_catalog::Catalog;
use jobd_cli::{env, output};

#[derive(Parser)]
#[command(name = "jobstat", version, about = "Show jobd catalog status")]
struct Cli {
    /// Verbose logging
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    output::init_logging(cli.verbose);

    if let Err(err) = run() {
        eprintln!("jobstat: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let catalog =
        Catalog::open(&env::db_path()?, true).context("unable to open the database")?;

    println!("{}", output::header("JobID"));
    for label in catalog.list_labels()? {
        println!("{label}");
    }
    Ok(())
}
