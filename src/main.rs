mod etl;
mod data;
mod errors;
mod shape;
mod validate;

use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::errors::Result;
use crate::etl::Etl;
use crate::etl::shape_osm::ShapeOsmEtl;
use crate::etl::write_tables::TableFiles;
use crate::shape::ShapeConfig;

#[derive(Deserialize)]
pub struct UserConfig {
    pub data_path: String,
    pub dest_path: String,
    #[serde(default)]
    pub validate: bool,
    pub schema_path: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    pub shape: ShapeConfig,
    #[serde(default)]
    pub tables: TableFiles,
}

/// Convert an OpenStreetMap export into CSV tables for a SQL database.
#[derive(Parser)]
#[command(name = "osm_tables")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(default_value = "config/osm_tables.json")]
    config: PathBuf,

    /// Check every shaped element against the schema (about 10x slower)
    #[arg(long)]
    validate: bool,

    /// Rewrite the tables even when they already exist
    #[arg(long)]
    overwrite: bool,
}

impl Cli {
    /// Command line flags can switch options on, never off.
    fn apply(&self, config: &mut UserConfig) {
        config.validate |= self.validate;
        config.overwrite |= self.overwrite;
    }
}

fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open config file {}: {}", path.display(), err))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let output_dir = PathBuf::from(&config.dest_path);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let mut user_config = load_user_config(&cli.config)?;
    cli.apply(&mut user_config);
    info!(
        config = cli.config.display().to_string().as_str(),
        data_path = user_config.data_path.as_str(),
        validate = user_config.validate;
        "Loaded config"
    );

    let mut etl = ShapeOsmEtl::new(&user_config)?;
    let output_dir = create_output_dir(&user_config)?;
    etl.process(&output_dir, user_config.overwrite)?;

    Ok(())
}
