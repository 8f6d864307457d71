//! Grid command - render one layer as a UTF-grid.
//!
//! The job is submitted with a completion callback and delivered by the
//! dispatcher, the same path an embedding server would use.

use mapgrid::{EncodedGrid, GridOptions, MapError, MapHandle, MapResult};
use tokio::sync::oneshot;
use tracing::info;

use super::common::parse_selector;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the grid command.
pub struct GridArgs {
    pub layer: String,
    pub resolution: Option<u32>,
    pub key: Option<String>,
    pub fields: Option<Vec<String>>,
}

impl GridArgs {
    /// Command-line values over config defaults.
    fn options(&self, defaults: GridOptions) -> GridOptions {
        let mut options = defaults;
        if let Some(resolution) = self.resolution {
            options = options.with_resolution(resolution);
        }
        if let Some(key) = &self.key {
            options = options.with_join_field(key.clone());
        }
        if let Some(fields) = &self.fields {
            options = options.with_fields(fields.iter().cloned());
        }
        options
    }
}

/// Run the grid command.
pub fn run(runner: &CliRunner, map: &MapHandle, args: GridArgs) -> Result<(), CliError> {
    let options = args.options(runner.config().grid_options());
    let selector = parse_selector(&args.layer);

    let result: MapResult<EncodedGrid> = runner.runtime().block_on(async {
        let (scheduler, mut dispatcher) = runner.scheduler();
        let (tx, rx) = oneshot::channel();
        let ticket = map.render_grid_with(&scheduler, selector, options, move |result| {
            let _ = tx.send(result);
        })?;
        dispatcher.run().await;
        info!(job = %ticket.id(), state = %ticket.state(), "Grid job delivered");
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(MapError::Unknown(
                "grid job completed without a result".to_string(),
            )),
        }
    });
    let grid = result?;

    println!("{}", serde_json::to_string(&grid)?);
    Ok(())
}
