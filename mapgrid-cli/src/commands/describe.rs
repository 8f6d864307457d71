//! Describe command - print every layer's datasource description.

use mapgrid::MapHandle;

use crate::error::CliError;

/// Run the describe command.
pub fn run(map: &MapHandle) -> Result<(), CliError> {
    let described = map.describe_layers()?;
    println!("{}", serde_json::to_string_pretty(&described)?);
    Ok(())
}
