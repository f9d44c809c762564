//! Read-side analytics assembled from the store.
//!
//! Quick stats come straight from the summary tables and are always
//! available once summaries exist. Deep stats need the materialized
//! per-event aggregates and stay absent until at least one aggregate row
//! exists for the vehicle; `deep_sync_progress` reports how far the detail
//! phases have gotten.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::Result;
use crate::storage::{
    AcDcSplit, AggregateRecord, ChargeSummary, CountryVisit, DayCount, DayDistance, DriveSummary,
    StatsStore, SyncPhase, SyncState, CURRENT_SCHEMA_VERSION,
};

pub mod records;

pub use records::{GapRecord, RangeRecord, StreakRecord};

/// Stats period: all recorded history or one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearFilter {
    AllTime,
    Year(i32),
}

impl YearFilter {
    /// Half-open ISO bounds for the year, `None` for all time.
    #[must_use]
    pub fn bounds(self) -> Option<(String, String)> {
        match self {
            Self::AllTime => None,
            Self::Year(y) => Some((
                format!("{y}-01-01T00:00:00"),
                format!("{}-01-01T00:00:00", y + 1),
            )),
        }
    }
}

/// Summary-level stats, available as soon as summaries are ingested.
#[derive(Debug, Clone, Serialize)]
pub struct QuickStats {
    pub drive_count: i64,
    pub charge_count: i64,
    pub total_distance_km: f64,
    pub total_energy_consumed_kwh: f64,
    pub total_energy_added_kwh: f64,
    pub total_cost: f64,
    pub avg_cost_per_kwh: Option<f64>,
    pub avg_efficiency_wh_km: Option<f64>,
    pub max_speed_kmh: Option<i64>,
    pub avg_drive_duration_min: Option<f64>,
    pub avg_charge_duration_min: Option<f64>,
    pub longest_drive: Option<DriveSummary>,
    pub fastest_drive: Option<DriveSummary>,
    pub most_efficient_drive: Option<DriveSummary>,
    pub least_efficient_drive: Option<DriveSummary>,
    pub biggest_battery_drain_drive: Option<DriveSummary>,
    pub biggest_charge: Option<ChargeSummary>,
    pub most_expensive_charge: Option<ChargeSummary>,
    pub most_expensive_per_kwh_charge: Option<ChargeSummary>,
    pub biggest_battery_gain_charge: Option<ChargeSummary>,
    pub first_drive_date: Option<String>,
    pub first_charge_date: Option<String>,
    pub busiest_day: Option<DayCount>,
    pub most_distance_day: Option<DayDistance>,
    pub driving_days: i64,
    pub longest_driving_streak: Option<StreakRecord>,
    pub longest_drive_gap: Option<GapRecord>,
    pub longest_charge_gap: Option<GapRecord>,
    pub max_distance_between_charges: Option<RangeRecord>,
}

/// Aggregate-backed stats, absent until detail processing has produced rows.
#[derive(Debug, Clone, Serialize)]
pub struct DeepStats {
    pub max_elevation: Option<AggregateRecord>,
    pub min_elevation: Option<AggregateRecord>,
    pub most_elevation_gain: Option<AggregateRecord>,
    pub hottest_drive: Option<AggregateRecord>,
    pub coldest_drive: Option<AggregateRecord>,
    pub max_inside_temp_c: Option<f64>,
    pub min_inside_temp_c: Option<f64>,
    pub hottest_charge: Option<AggregateRecord>,
    pub coldest_charge: Option<AggregateRecord>,
    pub max_charge_power: Option<AggregateRecord>,
    pub ac_dc_split: AcDcSplit,
    pub countries: Vec<CountryVisit>,
}

/// Everything the stats views need for one vehicle and period.
#[derive(Debug, Clone, Serialize)]
pub struct CarStats {
    pub car_id: i64,
    pub year: Option<i32>,
    pub quick: QuickStats,
    pub deep: Option<DeepStats>,
    pub deep_sync_progress: f64,
}

/// Read-side facade over the store.
pub struct StatsEngine {
    store: Arc<AsyncMutex<StatsStore>>,
}

impl StatsEngine {
    #[must_use]
    pub fn new(store: Arc<AsyncMutex<StatsStore>>) -> Self {
        Self { store }
    }

    /// Assemble quick stats, deep stats, and detail progress for a vehicle.
    ///
    /// # Errors
    ///
    /// Fails on storage errors.
    pub async fn car_stats(&self, car_id: i64, year: YearFilter) -> Result<CarStats> {
        let store = self.store.lock().await;
        let bounds = year.bounds();
        let range = bounds.as_ref().map(|(a, b)| (a.as_str(), b.as_str()));

        let quick = Self::quick_stats(&store, car_id, range)?;
        let deep = if store.has_any_aggregates(car_id)? {
            Some(Self::deep_stats(&store, car_id, range)?)
        } else {
            None
        };
        let deep_sync_progress = Self::progress(&store, car_id)?;

        Ok(CarStats {
            car_id,
            year: match year {
                YearFilter::AllTime => None,
                YearFilter::Year(y) => Some(y),
            },
            quick,
            deep,
            deep_sync_progress,
        })
    }

    fn quick_stats(
        store: &StatsStore,
        car_id: i64,
        range: Option<(&str, &str)>,
    ) -> Result<QuickStats> {
        let driving_days = store.distinct_driving_days(car_id, range)?;
        let drive_moments = store.drive_moments(car_id, range)?;
        let charge_moments = store.charge_moments(car_id, range)?;
        let drive_distances = store.drive_distances(car_id)?;

        Ok(QuickStats {
            drive_count: store.drive_count(car_id, range)?,
            charge_count: store.charge_count(car_id, range)?,
            total_distance_km: store.sum_drive_distance(car_id, range)?,
            total_energy_consumed_kwh: store.sum_energy_consumed(car_id, range)?,
            total_energy_added_kwh: store.sum_energy_added(car_id, range)?,
            total_cost: store.sum_cost(car_id, range)?,
            avg_cost_per_kwh: store.avg_cost_per_kwh(car_id, range)?,
            avg_efficiency_wh_km: store.avg_efficiency(car_id, range)?,
            max_speed_kmh: store.max_speed(car_id, range)?,
            avg_drive_duration_min: store.avg_drive_duration_min(car_id, range)?,
            avg_charge_duration_min: store.avg_charge_duration_min(car_id, range)?,
            longest_drive: store.longest_drive(car_id, range)?,
            fastest_drive: store.fastest_drive(car_id, range)?,
            most_efficient_drive: store.most_efficient_drive(car_id, range)?,
            least_efficient_drive: store.least_efficient_drive(car_id, range)?,
            biggest_battery_drain_drive: store.biggest_battery_drain_drive(car_id, range)?,
            biggest_charge: store.biggest_charge(car_id, range)?,
            most_expensive_charge: store.most_expensive_charge(car_id, range)?,
            most_expensive_per_kwh_charge: store.most_expensive_per_kwh_charge(car_id, range)?,
            biggest_battery_gain_charge: store.biggest_battery_gain_charge(car_id, range)?,
            first_drive_date: store.first_drive_date(car_id)?,
            first_charge_date: store.first_charge_date(car_id)?,
            busiest_day: store.busiest_day(car_id, range)?,
            most_distance_day: store.most_distance_day(car_id, range)?,
            driving_days: store.driving_days_count(car_id, range)?,
            longest_driving_streak: records::longest_streak(&driving_days),
            longest_drive_gap: records::longest_gap(&drive_moments),
            longest_charge_gap: records::longest_gap(&charge_moments),
            max_distance_between_charges: records::max_distance_between_charges(
                &charge_moments,
                &drive_distances,
            ),
        })
    }

    fn deep_stats(
        store: &StatsStore,
        car_id: i64,
        range: Option<(&str, &str)>,
    ) -> Result<DeepStats> {
        Ok(DeepStats {
            // Elevation extremes are lifetime records, never year-filtered.
            max_elevation: store.max_elevation_record(car_id, None)?,
            min_elevation: store.min_elevation_record(car_id, None)?,
            most_elevation_gain: store.most_elevation_gain_record(car_id, range)?,
            hottest_drive: store.hottest_drive_record(car_id, range)?,
            coldest_drive: store.coldest_drive_record(car_id, range)?,
            max_inside_temp_c: store.max_inside_temp(car_id)?,
            min_inside_temp_c: store.min_inside_temp(car_id)?,
            hottest_charge: store.hottest_charge_record(car_id, range)?,
            coldest_charge: store.coldest_charge_record(car_id, range)?,
            max_charge_power: store.max_power_record(car_id, range)?,
            ac_dc_split: store.ac_dc_split(car_id, range)?,
            countries: store.country_visits(car_id, range)?,
        })
    }

    /// Fraction of detail rows materialized at the current schema version.
    /// Pinned to 1.0 once the sync state machine has latched Complete, 0.0
    /// with no summaries at all.
    fn progress(store: &StatsStore, car_id: i64) -> Result<f64> {
        if let Some(state) = store.load_sync_state(car_id)? {
            if state.phase == SyncPhase::Complete {
                return Ok(1.0);
            }
        }
        let total = store.drive_count(car_id, None)? + store.charge_count(car_id, None)?;
        if total == 0 {
            return Ok(0.0);
        }
        let processed = store.processed_drive_count(car_id, CURRENT_SCHEMA_VERSION)?
            + store.processed_charge_count(car_id, CURRENT_SCHEMA_VERSION)?;
        #[allow(clippy::cast_precision_loss)]
        Ok((processed as f64 / total as f64).min(1.0))
    }

    /// # Errors
    ///
    /// Fails on storage errors.
    pub async fn deep_sync_progress(&self, car_id: i64) -> Result<f64> {
        let store = self.store.lock().await;
        Self::progress(&store, car_id)
    }

    /// # Errors
    ///
    /// Fails on storage errors.
    pub async fn sync_state(&self, car_id: i64) -> Result<Option<SyncState>> {
        let store = self.store.lock().await;
        store.load_sync_state(car_id)
    }

    /// Whether a detail phase is currently running for the vehicle.
    ///
    /// # Errors
    ///
    /// Fails on storage errors.
    pub async fn is_deep_sync_in_progress(&self, car_id: i64) -> Result<bool> {
        let store = self.store.lock().await;
        Ok(store.load_sync_state(car_id)?.is_some_and(|s| {
            matches!(
                s.phase,
                SyncPhase::SyncingSummaries
                    | SyncPhase::SyncingDriveDetails
                    | SyncPhase::SyncingChargeDetails
            )
        }))
    }

    /// Calendar years with any recorded activity, newest first.
    ///
    /// # Errors
    ///
    /// Fails on storage errors.
    pub async fn available_years(&self, car_id: i64) -> Result<Vec<i32>> {
        let store = self.store.lock().await;
        store.years(car_id)
    }

    /// Drives starting strictly between two instants, ascending.
    ///
    /// # Errors
    ///
    /// Fails on storage errors.
    pub async fn drives_between(
        &self,
        car_id: i64,
        after: &str,
        before: &str,
    ) -> Result<Vec<DriveSummary>> {
        let store = self.store.lock().await;
        store.drives_between(car_id, after, before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_filter_bounds_are_half_open() {
        let (lo, hi) = YearFilter::Year(2024).bounds().unwrap();
        assert_eq!(lo, "2024-01-01T00:00:00");
        assert_eq!(hi, "2025-01-01T00:00:00");
        assert_eq!(YearFilter::AllTime.bounds(), None);
    }
}
