// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobcfg - catalog configuration tool

use anyhow::Context;
use clap::{Parser, Subcommand};
use jobd_catalog::Catalog;
use jobd_cli::{env, import, output};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jobcfg", version, about = "Configure the jobd catalog")]
struct Cli {
    /// Verbose logging
    #[arg(short = 'v', global = true)]
    verbose: bool,

    /// For init: the catalog path. For import: a manifest file or a
    /// directory of *.toml manifests (default: stdin).
    #[arg(short = 'f', global = true, value_name = "PATH")]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog database
    Init,
    /// Import job manifests into the catalog
    Import,
}

fn main() {
    let cli = Cli::parse();
    output::init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("jobcfg: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init => {
            let path = match &cli.file {
                Some(path) => path.clone(),
                None => env::db_path()?,
            };
            Catalog::create(&path).context("unable to create the database")?;
            Ok(())
        }
        Commands::Import => {
            let mut catalog =
                Catalog::open(&env::db_path()?, false).context("unable to open the database")?;
            match &cli.file {
                Some(path) => import::import_path(&mut catalog, path),
                None => import::import_stdin(&mut catalog),
            }
        }
    }
}
