pub mod cli;
pub mod config;
pub mod data;
pub mod evaluate;
pub mod experiment;
pub mod features;
pub mod io_utils;
pub mod join;
pub mod model;
pub mod records;
pub mod schema;
pub mod split;
pub mod table;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("flight_ontime", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Schema(args) => handle_schema(&args),
        Commands::Split(args) => split::execute(&args),
        Commands::Train(args) => experiment::execute_train(&args),
        Commands::Evaluate(args) => experiment::execute_evaluate(&args),
    }
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let schema = schema::flight_schema();
    match args.output.as_deref() {
        Some(path) if !io_utils::is_dash(path) => {
            schema
                .save(path)
                .with_context(|| format!("Writing schema to {path:?}"))?;
            info!(
                "Flight schema with {} column(s) written to {:?}",
                schema.columns.len(),
                path
            );
        }
        _ => {
            let yaml = schema.to_yaml_string()?;
            let mut writer = io_utils::open_output(None)?;
            writer
                .write_all(yaml.as_bytes())
                .context("Writing schema YAML")?;
            writer.flush().context("Flushing schema YAML")?;
        }
    }
    Ok(())
}
