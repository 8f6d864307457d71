//! Configuration CLI commands.
//!
//! `config path` prints where the configuration file is looked up and
//! `config list` prints the effective settings.

use std::path::Path;

use clap::Subcommand;
use mapgrid::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// List all effective configuration settings
    List,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(config_path),
        ConfigCommands::List => run_list(config_path),
    }
}

fn run_path(config_path: Option<&Path>) -> Result<(), CliError> {
    match config_path.map(Path::to_path_buf).or_else(ConfigFile::default_path) {
        Some(path) => println!("{}", path.display()),
        None => println!("(no configuration directory on this platform)"),
    }
    Ok(())
}

fn run_list(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = match config_path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    for (key, value) in config.entries() {
        println!("{} = {}", key, value);
    }
    Ok(())
}
