//! mapgrid CLI - render map layers to images and UTF-grids
//!
//! Layers are GeoJSON files given with `--layer name=path`. Results are
//! printed to stdout as JSON.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::MapArgs;
use commands::config::ConfigCommands;
use commands::features::FeaturesArgs;
use commands::grid::GridArgs;
use commands::render::RenderArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "mapgrid", version, about = "Render map layers to images and UTF interaction grids")]
struct Cli {
    #[command(flatten)]
    map: MapArgs,

    /// Configuration file (default: <config dir>/mapgrid/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Describe every layer's datasource
    Describe,

    /// List the raw features of a layer
    Features {
        /// Zero-based layer index
        index: usize,

        /// First feature position to include
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Last feature position to include (0 = to the end)
        #[arg(long, default_value_t = 0)]
        end: usize,
    },

    /// Render a layer as a UTF-grid
    Grid {
        /// Layer name or zero-based index
        layer: String,

        /// Map pixels per grid cell
        #[arg(long)]
        resolution: Option<u32>,

        /// Join field identifying features (default: __id__)
        #[arg(long)]
        key: Option<String>,

        /// Comma-separated attributes to include in the grid data
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },

    /// Render the map to an image file
    Render {
        /// Output file
        output: PathBuf,

        /// Image format (png, jpeg, jpeg80, tiff, bmp)
        #[arg(long)]
        format: Option<String>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        map: map_args,
        config,
        verbose,
        command,
    } = cli;

    let command = match command {
        Commands::Config { command } => return commands::config::run(command, config.as_deref()),
        other => other,
    };

    let runner = CliRunner::new(config.as_deref(), verbose)?;
    runner.log_startup(command_name(&command));
    let map = runner.map(&map_args)?;

    match command {
        Commands::Describe => commands::describe::run(&map),
        Commands::Features { index, start, end } => {
            commands::features::run(&map, FeaturesArgs { index, start, end })
        }
        Commands::Grid {
            layer,
            resolution,
            key,
            fields,
        } => commands::grid::run(
            &runner,
            &map,
            GridArgs {
                layer,
                resolution,
                key,
                fields,
            },
        ),
        Commands::Render { output, format } => {
            commands::render::run(&runner, &map, RenderArgs { output, format })
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Describe => "describe",
        Commands::Features { .. } => "features",
        Commands::Grid { .. } => "grid",
        Commands::Render { .. } => "render",
        Commands::Config { .. } => "config",
    }
}
