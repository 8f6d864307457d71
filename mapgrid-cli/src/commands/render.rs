//! Render command - render the map to an image file.

use std::path::PathBuf;

use mapgrid::{ImageFormat, MapError, MapHandle, MapResult};
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the render command.
pub struct RenderArgs {
    pub output: PathBuf,
    pub format: Option<String>,
}

/// Run the render command.
///
/// Format precedence: `--format`, then the output extension, then the
/// configured default.
pub fn run(runner: &CliRunner, map: &MapHandle, args: RenderArgs) -> Result<(), CliError> {
    let format = match args.format {
        Some(format) => format,
        None => ImageFormat::from_path(&args.output)
            .map(|f| f.to_string())
            .unwrap_or_else(|_| runner.config().render.format.clone()),
    };
    let extent = map.read().require_extent()?;

    let result: MapResult<Vec<u8>> = runner.runtime().block_on(async {
        let (scheduler, _dispatcher) = runner.scheduler();
        let job = map.render_image(&scheduler, extent, &format)?;
        info!(job = %job.id(), format = %format, "Render job submitted");
        job.await
    });
    let bytes = result?;

    std::fs::write(&args.output, &bytes).map_err(|e| {
        MapError::Encoding(format!("failed to write '{}': {}", args.output.display(), e))
    })?;

    let summary = serde_json::json!({
        "output": args.output.display().to_string(),
        "format": format,
        "bytes": bytes.len(),
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
