pub mod check;
pub mod cli;
pub mod columns;
pub mod data;
pub mod generate;
pub mod io_utils;
pub mod mapping;
pub mod normalize;
pub mod preview;
pub mod probe;
pub mod sql;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_to_sql", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => generate::execute(&args),
        Commands::Probe(args) => probe::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Check(args) => check::execute(&args),
        Commands::Columns(args) => columns::execute(&args),
    }
}
