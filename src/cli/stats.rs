//! Stats, years, and progress command implementations.

use crate::cli::args::{CarArgs, OutputFormat, StatsArgs};
use crate::cli::{print_json, AppContext};
use crate::error::Result;
use crate::stats::{CarStats, DeepStats, QuickStats, YearFilter};
use crate::storage::{AggregateRecord, ChargeSummary, CountryVisit, DriveSummary};

/// Execute the stats command.
///
/// # Errors
///
/// Fails on storage errors.
pub async fn execute(
    ctx: &AppContext,
    args: &StatsArgs,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let year = args.year.map_or(YearFilter::AllTime, YearFilter::Year);
    let stats = ctx.stats.car_stats(args.car, year).await?;

    match format {
        OutputFormat::Json => print_json(&stats, pretty),
        OutputFormat::Human => {
            render_human(&stats);
            Ok(())
        }
    }
}

/// Execute the years command.
///
/// # Errors
///
/// Fails on storage errors.
pub async fn execute_years(
    ctx: &AppContext,
    args: &CarArgs,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let years = ctx.stats.available_years(args.car).await?;
    match format {
        OutputFormat::Json => print_json(&years, pretty),
        OutputFormat::Human => {
            if years.is_empty() {
                println!("No recorded activity for car {}.", args.car);
            } else {
                for y in years {
                    println!("{y}");
                }
            }
            Ok(())
        }
    }
}

/// Execute the progress command.
///
/// # Errors
///
/// Fails on storage errors.
pub async fn execute_progress(
    ctx: &AppContext,
    args: &CarArgs,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let state = ctx.stats.sync_state(args.car).await?;
    let progress = ctx.stats.deep_sync_progress(args.car).await?;
    let in_progress = ctx.stats.is_deep_sync_in_progress(args.car).await?;

    match format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "car_id": args.car,
                "deep_sync_progress": progress,
                "in_progress": in_progress,
                "state": state,
            });
            print_json(&payload, pretty)
        }
        OutputFormat::Human => {
            match state {
                None => println!("Car {} has never been synced.", args.car),
                Some(state) => {
                    println!("Car {} sync state", args.car);
                    println!("  phase:             {}", state.phase.as_str());
                    println!("  detail progress:   {:.0}%", progress * 100.0);
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
            }
            Ok(())
        }
    }
}

fn render_human(stats: &CarStats) {
    match stats.year {
        Some(y) => println!("Car {} statistics for {y}", stats.car_id),
        None => println!("Car {} statistics, all time", stats.car_id),
    }
    println!();
    render_quick(&stats.quick);
    match &stats.deep {
        Some(deep) => {
            println!();
            render_deep(deep);
        }
        None => {
            println!();
            println!(
                "Detail statistics not available yet ({:.0}% processed).",
                stats.deep_sync_progress * 100.0
            );
        }
    }
}

fn render_quick(q: &QuickStats) {
    println!("Driving");
    println!("  drives:            {}", q.drive_count);
    println!("  total distance:    {:.1} km", q.total_distance_km);
    println!("  energy consumed:   {:.1} kWh", q.total_energy_consumed_kwh);
    if let Some(eff) = q.avg_efficiency_wh_km {
        println!("  avg efficiency:    {eff:.0} Wh/km");
    }
    if let Some(speed) = q.max_speed_kmh {
        println!("  max speed:         {speed} km/h");
    }
    if let Some(mins) = q.avg_drive_duration_min {
        println!("  avg duration:      {mins:.0} min");
    }
    if let Some(d) = &q.first_drive_date {
        println!("  first drive:       {d}");
    }
    println!("  driving days:      {}", q.driving_days);
    render_drive("longest drive", q.longest_drive.as_ref(), |d| {
        format!("{:.1} km", d.distance_km)
    });
    render_drive("fastest drive", q.fastest_drive.as_ref(), |d| {
        format!("{} km/h", d.speed_max_kmh)
    });
    render_drive("most efficient", q.most_efficient_drive.as_ref(), |d| {
        d.efficiency_wh_km
            .map_or_else(String::new, |e| format!("{e:.0} Wh/km"))
    });
    render_drive("least efficient", q.least_efficient_drive.as_ref(), |d| {
        d.efficiency_wh_km
            .map_or_else(String::new, |e| format!("{e:.0} Wh/km"))
    });
    render_drive(
        "biggest drain",
        q.biggest_battery_drain_drive.as_ref(),
        |d| format!("{}%", d.start_battery_level - d.end_battery_level),
    );
    if let Some(day) = &q.busiest_day {
        println!("  busiest day:       {} ({} drives)", day.day, day.count);
    }
    if let Some(day) = &q.most_distance_day {
        println!(
            "  most distance day: {} ({:.1} km)",
            day.day, day.distance_km
        );
    }
    if let Some(streak) = &q.longest_driving_streak {
        println!(
            "  longest streak:    {} days ({} to {})",
            streak.streak_days, streak.start_date, streak.end_date
        );
    }
    if let Some(gap) = &q.longest_drive_gap {
        println!(
            "  longest drive gap: {:.1} days ({} to {})",
            gap.gap_days, gap.from_date, gap.to_date
        );
    }

    println!();
    println!("Charging");
    println!("  charges:           {}", q.charge_count);
    println!("  energy added:      {:.1} kWh", q.total_energy_added_kwh);
    println!("  total cost:        {:.2}", q.total_cost);
    if let Some(avg) = q.avg_cost_per_kwh {
        println!("  avg cost per kWh:  {avg:.3}");
    }
    if let Some(mins) = q.avg_charge_duration_min {
        println!("  avg duration:      {mins:.0} min");
    }
    if let Some(d) = &q.first_charge_date {
        println!("  first charge:      {d}");
    }
    render_charge("biggest charge", q.biggest_charge.as_ref(), |c| {
        format!("{:.1} kWh", c.energy_added_kwh)
    });
    render_charge("most expensive", q.most_expensive_charge.as_ref(), |c| {
        c.cost.map_or_else(String::new, |v| format!("{v:.2}"))
    });
    render_charge(
        "priciest per kWh",
        q.most_expensive_per_kwh_charge.as_ref(),
        |c| {
            if c.energy_added_kwh > 0.0 {
                c.cost
                    .map_or_else(String::new, |v| format!("{:.3}/kWh", v / c.energy_added_kwh))
            } else {
                String::new()
            }
        },
    );
    render_charge(
        "biggest gain",
        q.biggest_battery_gain_charge.as_ref(),
        |c| format!("{}%", c.end_battery_level - c.start_battery_level),
    );
    if let Some(gap) = &q.longest_charge_gap {
        println!(
            "  longest gap:       {:.1} days ({} to {})",
            gap.gap_days, gap.from_date, gap.to_date
        );
    }
    if let Some(range) = &q.max_distance_between_charges {
        println!(
            "  best range:        {:.1} km between charges ({} to {})",
            range.distance_km, range.from_date, range.to_date
        );
    }
}

fn render_deep(d: &DeepStats) {
    println!("Details");
    render_record("highest point", d.max_elevation.as_ref(), "m");
    render_record("lowest point", d.min_elevation.as_ref(), "m");
    render_record("most climbing", d.most_elevation_gain.as_ref(), "m");
    render_record("hottest drive", d.hottest_drive.as_ref(), "°C");
    render_record("coldest drive", d.coldest_drive.as_ref(), "°C");
    if let Some(t) = d.max_inside_temp_c {
        println!("  max cabin temp:    {t:.1} °C");
    }
    if let Some(t) = d.min_inside_temp_c {
        println!("  min cabin temp:    {t:.1} °C");
    }
    render_record("hottest charge", d.hottest_charge.as_ref(), "°C");
    render_record("coldest charge", d.coldest_charge.as_ref(), "°C");
    render_record("max charge power", d.max_charge_power.as_ref(), "kW");
    println!(
        "  AC / DC sessions:  {} / {}",
        d.ac_dc_split.ac_count, d.ac_dc_split.dc_count
    );
    println!(
        "  AC / DC energy:    {:.1} / {:.1} kWh",
        d.ac_dc_split.ac_energy_kwh, d.ac_dc_split.dc_energy_kwh
    );
    if !d.countries.is_empty() {
        println!();
        println!("Countries");
        for c in &d.countries {
            println!(
                "  {:<20} {} drives, {:.1} km, {} charges, {:.1} kWh",
                country_label(c),
                c.drive_count,
                c.total_distance_km,
                c.charge_count,
                c.charge_energy_kwh
            );
        }
    }
}

fn render_drive<F: Fn(&DriveSummary) -> String>(
    label: &str,
    drive: Option<&DriveSummary>,
    detail: F,
) {
    if let Some(d) = drive {
        println!("  {:<18} {} ({})", format!("{label}:"), detail(d), d.start_date);
    }
}

fn render_charge<F: Fn(&ChargeSummary) -> String>(
    label: &str,
    charge: Option<&ChargeSummary>,
    detail: F,
) {
    if let Some(c) = charge {
        println!("  {:<18} {} ({})", format!("{label}:"), detail(c), c.start_date);
    }
}

fn render_record(label: &str, record: Option<&AggregateRecord>, unit: &str) {
    if let Some(r) = record {
        println!(
            "  {:<18} {:.1} {unit} ({})",
            format!("{label}:"),
            r.value,
            r.start_date
        );
    }
}

// Geocoding is best-effort, so the display name may be absent even when a
// country code was recorded.
fn country_label(visit: &CountryVisit) -> &str {
    visit.country_name.as_deref().unwrap_or(&visit.country_code)
}
