//! INI configuration file.
//!
//! ```ini
//! [executor]
//! workers = 8
//!
//! [grid]
//! resolution = 4
//! join_field = __id__
//!
//! [render]
//! format = png
//! background = #ffffff
//!
//! [logging]
//! level = info
//! file = /var/log/mapgrid.log
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::error::MapError;
use crate::executor::{default_workers, SchedulerConfig};
use crate::grid::{GridOptions, DEFAULT_RESOLUTION, SYNTHETIC_ID_FIELD};
use crate::logging::{LoggingSettings, LOG_LEVELS};
use crate::render::ImageFormat;
use crate::style::Color;

const CONFIG_DIR: &str = "mapgrid";
const CONFIG_FILE: &str = "config.ini";

/// Format used when none is configured.
pub const DEFAULT_FORMAT: &str = "png";

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("failed to write config: {0}")]
    Write(#[from] io::Error),
}

impl ConfigError {
    fn invalid(section: &str, key: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<ConfigError> for MapError {
    fn from(e: ConfigError) -> Self {
        MapError::Configuration(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSettings {
    pub resolution: u32,
    pub join_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub format: String,
    pub background: Option<Color>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub executor: ExecutorSettings,
    pub grid: GridSettings,
    pub render: RenderSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            executor: ExecutorSettings {
                workers: default_workers(),
            },
            grid: GridSettings {
                resolution: DEFAULT_RESOLUTION,
                join_field: SYNTHETIC_ID_FIELD.to_string(),
            },
            render: RenderSettings {
                format: DEFAULT_FORMAT.to_string(),
                background: None,
            },
            logging: LoggingSettings::default(),
        }
    }
}

impl ConfigFile {
    /// `<config dir>/mapgrid/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads the file at `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        debug!(path = %path.display(), "Loading config file");
        Self::parse(&text)
    }

    /// Loads from [`default_path`](Self::default_path).
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parses INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(workers) = read(&ini, "executor", "workers", |v| {
            v.parse::<usize>().ok().filter(|n| *n > 0)
        })? {
            config.executor.workers = workers;
        }

        if let Some(resolution) = read(&ini, "grid", "resolution", |v| {
            v.parse::<u32>().ok().filter(|n| *n > 0)
        })? {
            config.grid.resolution = resolution;
        }
        if let Some(join_field) = read(&ini, "grid", "join_field", non_empty)? {
            config.grid.join_field = join_field;
        }

        if let Some(format) = read(&ini, "render", "format", |v| {
            ImageFormat::from_str(v).ok().map(|_| v.to_string())
        })? {
            config.render.format = format;
        }
        if let Some(background) = read(&ini, "render", "background", |v| v.parse::<Color>().ok())? {
            config.render.background = Some(background);
        }

        if let Some(level) = read(&ini, "logging", "level", |v| {
            let lower = v.to_ascii_lowercase();
            LOG_LEVELS.contains(&lower.as_str()).then_some(lower)
        })? {
            config.logging.level = level;
        }
        if let Some(file) = read(&ini, "logging", "file", |v| non_empty(v).map(PathBuf::from))? {
            config.logging.file = Some(file);
        }

        Ok(config)
    }

    /// Scheduler settings from the `[executor]` section.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default().with_workers(self.executor.workers)
    }

    /// Grid defaults from the `[grid]` section.
    pub fn grid_options(&self) -> GridOptions {
        GridOptions::default()
            .with_resolution(self.grid.resolution)
            .with_join_field(self.grid.join_field.clone())
    }

    /// Flattened `section.key = value` pairs, in file order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("executor.workers".to_string(), self.executor.workers.to_string()),
            ("grid.resolution".to_string(), self.grid.resolution.to_string()),
            ("grid.join_field".to_string(), self.grid.join_field.clone()),
            ("render.format".to_string(), self.render.format.clone()),
        ];
        if let Some(bg) = self.render.background {
            entries.push(("render.background".to_string(), bg.to_string()));
        }
        entries.push(("logging.level".to_string(), self.logging.level.clone()));
        if let Some(file) = &self.logging.file {
            entries.push(("logging.file".to_string(), file.display().to_string()));
        }
        entries
    }

    /// Serializes back to INI text.
    pub fn to_ini_string(&self) -> Result<String, ConfigError> {
        let mut ini = Ini::new();
        for (name, value) in self.entries() {
            if let Some((section, key)) = name.split_once('.') {
                ini.with_section(Some(section)).set(key, value);
            }
        }
        let mut buf = Vec::new();
        ini.write_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Reads and converts one key; `Ok(None)` when absent.
fn read<T>(
    ini: &Ini,
    section: &str,
    key: &str,
    convert: impl FnOnce(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = ini.section(Some(section)).and_then(|s| s.get(key)) else {
        return Ok(None);
    };
    let value = raw.trim();
    convert(value)
        .map(Some)
        .ok_or_else(|| ConfigError::invalid(section, key, value))
}

fn non_empty(v: &str) -> Option<String> {
    (!v.is_empty()).then(|| v.to_string())
}
