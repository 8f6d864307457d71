//! Shared map handle and the job-based rendering API.
//!
//! [`MapHandle`] is what background jobs pin. Async operations check their
//! arguments on the calling task, take a snapshot of the map, and render
//! the snapshot on the worker pool, so later edits to the map never leak
//! into a job that is already queued.
//!
//! ```text
//! render_grid(layer, options)
//!   ├─ options.validate()          (sync; error returned directly)
//!   ├─ snapshot = map.clone()
//!   └─ scheduler.spawn(handle, || grid::render_grid(&snapshot, ..))
//!                                   (async; error delivered with the job)
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::error::{MapError, MapResult};
use crate::executor::{JobHandle, JobScheduler, JobTicket};
use crate::geometry::Envelope;
use crate::grid::{self, EncodedGrid, GridOptions};
use crate::map::{self, DatasourceDescription, FeatureRecord, LayerSelector, Map};
use crate::render::{self, ImageFormat};

/// Cloneable, thread-safe handle to a [`Map`].
#[derive(Debug, Clone)]
pub struct MapHandle {
    inner: Arc<RwLock<Map>>,
}

impl MapHandle {
    pub fn new(map: Map) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Map> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Map> {
        self.inner.write()
    }

    /// Clones the current map state.
    pub fn snapshot(&self) -> Map {
        self.read().clone()
    }

    /// Number of live handles and jobs holding this map.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    // =========================================================================
    // Async image rendering
    // =========================================================================

    /// Zooms to `extent` and renders the map in the background.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` directly for a non-finite or inverted extent
    /// or an empty format. An unsupported format is reported by the job.
    pub fn render_image(
        &self,
        scheduler: &JobScheduler,
        extent: Envelope,
        format: &str,
    ) -> MapResult<JobHandle<Vec<u8>>> {
        let (snapshot, format) = self.prepare_image(extent, format)?;
        Ok(scheduler.spawn(Arc::clone(&self.inner), "render_image", move || {
            encode_snapshot(&snapshot, &format)
        }))
    }

    /// Callback form of [`render_image`](Self::render_image).
    pub fn render_image_with<C>(
        &self,
        scheduler: &JobScheduler,
        extent: Envelope,
        format: &str,
        on_complete: C,
    ) -> MapResult<JobTicket>
    where
        C: FnOnce(MapResult<Vec<u8>>) + Send + 'static,
    {
        let (snapshot, format) = self.prepare_image(extent, format)?;
        Ok(scheduler.submit(
            Arc::clone(&self.inner),
            "render_image",
            move || encode_snapshot(&snapshot, &format),
            on_complete,
        ))
    }

    fn prepare_image(&self, extent: Envelope, format: &str) -> MapResult<(Map, String)> {
        validate_extent(&extent)?;
        if format.is_empty() {
            return Err(MapError::Configuration(
                "format must be a non-empty string".to_string(),
            ));
        }
        let mut map = self.write();
        map.zoom_to_box(extent);
        Ok((map.clone(), format.to_string()))
    }

    // =========================================================================
    // Async grid rendering
    // =========================================================================

    /// Renders one layer into a UTF-grid in the background.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` directly for invalid options. Layer lookup,
    /// join field and datasource errors are reported by the job.
    pub fn render_grid(
        &self,
        scheduler: &JobScheduler,
        layer: impl Into<LayerSelector>,
        options: GridOptions,
    ) -> MapResult<JobHandle<EncodedGrid>> {
        options.validate()?;
        let selector = layer.into();
        let snapshot = self.snapshot();
        Ok(scheduler.spawn(Arc::clone(&self.inner), "render_grid", move || {
            grid::render_grid(&snapshot, &selector, &options)
        }))
    }

    /// Callback form of [`render_grid`](Self::render_grid).
    pub fn render_grid_with<C>(
        &self,
        scheduler: &JobScheduler,
        layer: impl Into<LayerSelector>,
        options: GridOptions,
        on_complete: C,
    ) -> MapResult<JobTicket>
    where
        C: FnOnce(MapResult<EncodedGrid>) + Send + 'static,
    {
        options.validate()?;
        let selector = layer.into();
        let snapshot = self.snapshot();
        Ok(scheduler.submit(
            Arc::clone(&self.inner),
            "render_grid",
            move || grid::render_grid(&snapshot, &selector, &options),
            on_complete,
        ))
    }

    // =========================================================================
    // Synchronous forms
    // =========================================================================

    /// Renders the map at its current extent on the calling thread.
    pub fn render_image_sync(&self, format: &str) -> MapResult<Vec<u8>> {
        let format: ImageFormat = format.parse()?;
        render::render_encoded(&self.read(), format)
    }

    pub fn render_grid_sync(
        &self,
        layer: impl Into<LayerSelector>,
        options: &GridOptions,
    ) -> MapResult<EncodedGrid> {
        grid::render_grid(&self.read(), &layer.into(), options)
    }

    /// Renders to `path`, guessing the format from its extension when
    /// `format` is `None`.
    pub fn render_file_sync(&self, path: impl AsRef<Path>, format: Option<&str>) -> MapResult<()> {
        let path = path.as_ref();
        let format = match format {
            Some(f) => f.parse()?,
            None => ImageFormat::from_path(path)?,
        };
        let bytes = render::render_encoded(&self.read(), format)?;
        std::fs::write(path, &bytes).map_err(|e| {
            MapError::Encoding(format!("failed to write '{}': {}", path.display(), e))
        })?;
        info!(path = %path.display(), format = %format, bytes = bytes.len(), "Wrote image");
        Ok(())
    }

    pub fn describe_layers(&self) -> MapResult<BTreeMap<String, Option<DatasourceDescription>>> {
        map::describe_layers(&self.read())
    }

    pub fn list_features(
        &self,
        index: usize,
        first: usize,
        last: usize,
    ) -> MapResult<Vec<FeatureRecord>> {
        map::list_features(&self.read(), index, first, last)
    }
}

impl From<Map> for MapHandle {
    fn from(map: Map) -> Self {
        Self::new(map)
    }
}

fn encode_snapshot(map: &Map, format: &str) -> MapResult<Vec<u8>> {
    let format: ImageFormat = format.parse()?;
    render::render_encoded(map, format)
}

fn validate_extent(extent: &Envelope) -> MapResult<()> {
    if !extent.is_finite() {
        return Err(MapError::Configuration(
            "extent must contain four finite numbers".to_string(),
        ));
    }
    if extent.minx >= extent.maxx || extent.miny >= extent.maxy {
        return Err(MapError::Configuration(format!(
            "extent [{}, {}, {}, {}] must have minx < maxx and miny < maxy",
            extent.minx, extent.miny, extent.maxx, extent.maxy
        )));
    }
    Ok(())
}
