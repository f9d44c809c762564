//! Drives command implementation.

use crate::cli::args::{DrivesArgs, OutputFormat};
use crate::cli::{print_json, AppContext};
use crate::error::Result;

/// Execute the drives command.
///
/// # Errors
///
/// Fails on storage errors.
pub async fn execute(
    ctx: &AppContext,
    args: &DrivesArgs,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let drives = ctx
        .stats
        .drives_between(args.car, &args.after, &args.before)
        .await?;

    match format {
        OutputFormat::Json => print_json(&drives, pretty),
        OutputFormat::Human => {
            if drives.is_empty() {
                println!(
                    "No drives for car {} between {} and {}.",
                    args.car, args.after, args.before
                );
                return Ok(());
            }
            for d in &drives {
                let eff = d
                    .efficiency_wh_km
                    .map_or_else(|| "    -".to_string(), |e| format!("{e:5.0}"));
                println!(
                    "{}  {:>7.1} km  {:>4} min  {eff} Wh/km  {} -> {}",
                    d.start_date, d.distance_km, d.duration_min, d.start_address, d.end_address
                );
            }
            Ok(())
        }
    }
}
