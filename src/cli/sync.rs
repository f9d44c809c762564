//! Sync command implementation.

use tokio::time::Duration;

use crate::cli::args::{OutputFormat, SyncArgs};
use crate::cli::{print_json, AppContext};
use crate::error::{Result, TmsError};
use crate::sync::SyncOutcome;

/// Execute the sync command.
///
/// # Errors
///
/// Fails on configuration or storage errors. Remote failures are reported
/// in the output and through the sync state, not as hard errors.
pub async fn execute(
    ctx: &AppContext,
    args: &SyncArgs,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let engine = ctx.sync_engine()?;

    if args.watch {
        if args.interval == 0 {
            return Err(TmsError::Config(
                "watch interval must be greater than 0 seconds".to_string(),
            ));
        }
        let interval = Duration::from_secs(args.interval);
        loop {
            let outcome = engine.sync_car(args.car).await?;
            report(ctx, args.car, outcome, format, pretty).await?;
            tokio::time::sleep(interval).await;
        }
    }

    let outcome = engine.sync_car(args.car).await?;
    report(ctx, args.car, outcome, format, pretty).await
}

async fn report(
    ctx: &AppContext,
    car_id: i64,
    outcome: SyncOutcome,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let state = ctx.stats.sync_state(car_id).await?;
    let progress = ctx.stats.deep_sync_progress(car_id).await?;

    match format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "car_id": car_id,
                "outcome": match outcome {
                    SyncOutcome::Completed => "completed",
                    SyncOutcome::SummariesFailed => "summaries_failed",
                    SyncOutcome::AlreadyRunning => "already_running",
                },
                "deep_sync_progress": progress,
                "state": state,
            });
            print_json(&payload, pretty)
        }
        OutputFormat::Human => {
            match outcome {
                SyncOutcome::Completed => println!("Sync complete for car {car_id}."),
                SyncOutcome::SummariesFailed => {
                    println!("Summary sync failed for car {car_id}; will retry next run.");
                }
                SyncOutcome::AlreadyRunning => {
                    println!("A sync for car {car_id} is already running.");
                }
            }
            if let Some(state) = state {
                println!(
                    "  drives processed:  {}/{}",
                    state.drives_processed, state.drives_total
                );
                println!(
                    "  charges processed: {}/{}",
                    state.charges_processed, state.charges_total
                );
                if let Some(at) = state.last_synced_at {
                    println!("  last synced:       {at}");
                }
                if let Some(err) = state.last_error {
                    println!("  last error:        {err}");
                }
            }
            println!("  detail progress:   {:.0}%", progress * 100.0);
            Ok(())
        }
    }
}
