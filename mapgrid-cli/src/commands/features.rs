//! Features command - list raw features of one layer.

use mapgrid::MapHandle;

use crate::error::CliError;

/// Arguments for the features command.
pub struct FeaturesArgs {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// Run the features command.
pub fn run(map: &MapHandle, args: FeaturesArgs) -> Result<(), CliError> {
    if args.end != 0 && args.end < args.start {
        return Err(CliError::Args(format!(
            "--end ({}) must not be less than --start ({})",
            args.end, args.start
        )));
    }
    let records = map.list_features(args.index, args.start, args.end)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
