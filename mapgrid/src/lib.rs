//! mapgrid - Map layer rendering and UTF interaction grids
//!
//! This library renders map layers into raster images and into UTF-grids:
//! per-pixel feature ids encoded as JSON-safe text rows, with a key table
//! and per-feature attribute data for tile-serving front ends.
//!
//! Rendering runs on a bounded background worker pool; see [`executor`].
//!
//! # Example
//!
//! ```ignore
//! let (scheduler, mut dispatcher) = JobScheduler::new(SchedulerConfig::default(), Handle::current());
//! let map = MapHandle::new(map);
//! let grid = map.render_grid(&scheduler, "cities", GridOptions::default())?.await?;
//! println!("{}", serde_json::to_string(&grid)?);
//! ```

pub mod config;
pub mod datasource;
pub mod draw;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod grid;
pub mod handle;
pub mod logging;
pub mod map;
pub mod projection;
pub mod render;
pub mod style;
pub mod value;

pub use config::{ConfigError, ConfigFile};
pub use error::{ErrorKind, MapError, MapResult};
pub use executor::{CompletionDispatcher, JobHandle, JobScheduler, JobState, SchedulerConfig};
pub use geometry::{Coord, Envelope, Geometry};
pub use grid::{EncodedGrid, GridOptions};
pub use handle::MapHandle;
pub use map::{Layer, LayerSelector, Map};
pub use render::ImageFormat;
pub use value::Value;

/// Library version, for `--version` output and logs.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
