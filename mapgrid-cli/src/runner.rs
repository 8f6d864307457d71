//! Shared setup for map commands: config, logging, runtime and the map.

use std::path::Path;

use mapgrid::config::ConfigFile;
use mapgrid::executor::{CompletionDispatcher, JobScheduler};
use mapgrid::logging::{self, LoggingGuard};
use mapgrid::MapHandle;
use tokio::runtime::Runtime;
use tracing::info;

use crate::commands::common::{build_map, MapArgs};
use crate::error::CliError;

/// Owns everything a map command needs for its lifetime.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _log_guard: LoggingGuard,
}

impl CliRunner {
    /// Loads the config (explicit path or default location), installs
    /// logging and starts the runtime.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::load_default()?,
        };

        let mut log_settings = config.logging.clone();
        if verbose {
            log_settings.level = "debug".to_string();
        }
        let log_guard = logging::init(&log_settings)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))?;

        Ok(Self {
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = mapgrid::version(),
            command,
            workers = self.config.executor.workers,
            "mapgrid starting"
        );
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Creates a scheduler on this runner's runtime.
    pub fn scheduler(&self) -> (JobScheduler, CompletionDispatcher) {
        JobScheduler::new(self.config.scheduler_config(), self.runtime.handle().clone())
    }

    /// Builds the map described by the command-line layer options.
    pub fn map(&self, args: &MapArgs) -> Result<MapHandle, CliError> {
        let mut map = build_map(args)?;
        map.set_background(self.config.render.background);
        Ok(MapHandle::new(map))
    }
}
