//! Reset command implementation.

use std::io::{self, BufRead, Write};

use crate::cli::args::{OutputFormat, ResetArgs};
use crate::cli::{print_json, AppContext};
use crate::error::Result;

/// Execute the reset command. Deletes all locally synced rows for the
/// vehicle; the next sync starts from scratch.
///
/// # Errors
///
/// Fails on storage errors.
pub async fn execute(
    ctx: &AppContext,
    args: &ResetArgs,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    if !args.yes && !confirm(args.car)? {
        println!("Aborted.");
        return Ok(());
    }

    {
        let mut store = ctx.store.lock().await;
        store.reset_car(args.car)?;
    }

    match format {
        OutputFormat::Json => {
            print_json(&serde_json::json!({ "car_id": args.car, "reset": true }), pretty)
        }
        OutputFormat::Human => {
            println!("Deleted all local data for car {}.", args.car);
            Ok(())
        }
    }
}

fn confirm(car_id: i64) -> Result<bool> {
    print!("Delete all local data for car {car_id}? [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
