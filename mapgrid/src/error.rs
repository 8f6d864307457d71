//! Error types for map rendering and grid encoding.
//!
//! Every failure surfaced by the library is a [`MapError`]. Errors raised
//! inside a scheduled job are captured as data and handed to the completion
//! side of the job; they carry their message text only.

use thiserror::Error;

use crate::datasource::DatasourceError;
use crate::projection::ProjectionError;

/// Result type used throughout the library.
pub type MapResult<T> = Result<T, MapError>;

/// Errors that can occur while resolving, rendering or encoding a map.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// Bad options or map state (invalid resolution, missing extent, ...).
    #[error("{0}")]
    Configuration(String),

    /// The join field does not name a declared attribute.
    #[error("join_field: '{field}' is not a valid attribute name\nValid fields are: {}", valid.join(" "))]
    Attribute {
        /// The requested join field.
        field: String,
        /// Attribute names the datasource declares.
        valid: Vec<String>,
    },

    /// Layer lookup failed (unknown name or index out of range).
    #[error("{0}")]
    Resolution(String),

    /// Datasource query or datasource failure.
    #[error("{0}")]
    DataSource(String),

    /// Coordinate transform failure.
    #[error("{0}")]
    Projection(String),

    /// Rasterization or grid encoding failure.
    #[error("{0}")]
    Render(String),

    /// Output format unsupported or image encoding failure.
    #[error("{0}")]
    Encoding(String),

    /// Catch-all for failures nobody anticipated.
    #[error("Unknown error occurred, please report: {0}")]
    Unknown(String),
}

/// Coarse classification of a [`MapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resolution,
    DataSource,
    Projection,
    Render,
    Encoding,
    Unknown,
}

impl MapError {
    /// Returns the taxonomy kind of this error.
    ///
    /// [`MapError::Attribute`] is a configuration problem.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::Configuration(_) | MapError::Attribute { .. } => ErrorKind::Configuration,
            MapError::Resolution(_) => ErrorKind::Resolution,
            MapError::DataSource(_) => ErrorKind::DataSource,
            MapError::Projection(_) => ErrorKind::Projection,
            MapError::Render(_) => ErrorKind::Render,
            MapError::Encoding(_) => ErrorKind::Encoding,
            MapError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Layer name lookup failed.
    pub fn layer_not_found(name: &str) -> Self {
        MapError::Resolution(format!("Layer name '{}' not found", name))
    }

    /// Layer index lookup failed.
    pub fn index_out_of_range(index: usize, layer_count: usize) -> Self {
        MapError::Resolution(format!(
            "Zero-based layer index '{}' not valid, only '{}' layers are in map",
            index, layer_count
        ))
    }

    /// The map has no current extent to render.
    pub fn extent_not_set() -> Self {
        MapError::Configuration(
            "map extent is not set; call zoom_all or zoom_to_box first".to_string(),
        )
    }
}

impl From<DatasourceError> for MapError {
    fn from(e: DatasourceError) -> Self {
        MapError::DataSource(e.to_string())
    }
}

impl From<ProjectionError> for MapError {
    fn from(e: ProjectionError) -> Self {
        MapError::Projection(e.to_string())
    }
}

impl From<image::ImageError> for MapError {
    fn from(e: image::ImageError) -> Self {
        MapError::Encoding(e.to_string())
    }
}
