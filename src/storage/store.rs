//! Telemetry database access layer.
//!
//! One [`StatsStore`] owns the SQLite connection and exposes every set-style
//! query the sync engine and stats engine need: watermarks, upserts,
//! unprocessed-id sets, counts, sums, extremes, and group-by-day rollups.
//! Order-sensitive statistics (streaks, gaps, range records) are computed by
//! the stats layer from the pre-sorted fetches this module provides.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;

use crate::error::{Result, TmsError};
use crate::storage::schema::run_migrations;

/// One drive trip summary row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveSummary {
    pub car_id: i64,
    pub drive_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub start_address: String,
    pub end_address: String,
    pub distance_km: f64,
    pub duration_min: i64,
    pub speed_max_kmh: i64,
    pub start_battery_level: i64,
    pub end_battery_level: i64,
    pub energy_consumed_kwh: Option<f64>,
    pub efficiency_wh_km: Option<f64>,
}

/// One charging session summary row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeSummary {
    pub car_id: i64,
    pub charge_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub energy_added_kwh: f64,
    pub cost: Option<f64>,
    pub duration_min: i64,
    pub start_battery_level: i64,
    pub end_battery_level: i64,
    pub odometer_km: Option<f64>,
}

/// Materialized aggregate of one drive's position trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveAggregate {
    pub car_id: i64,
    pub drive_id: i64,
    pub schema_version: i64,
    pub computed_at: String,
    pub max_elevation_m: Option<i64>,
    pub min_elevation_m: Option<i64>,
    pub elevation_gain_m: Option<i64>,
    pub max_inside_temp_c: Option<f64>,
    pub min_inside_temp_c: Option<f64>,
    pub max_outside_temp_c: Option<f64>,
    pub min_outside_temp_c: Option<f64>,
    pub position_count: i64,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
}

/// Materialized aggregate of one charging session's curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeAggregate {
    pub car_id: i64,
    pub charge_id: i64,
    pub schema_version: i64,
    pub computed_at: String,
    pub max_power_kw: Option<i64>,
    pub is_fast_charger: bool,
    pub max_outside_temp_c: Option<f64>,
    pub min_outside_temp_c: Option<f64>,
    pub point_count: i64,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
}

/// Sync phase for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    SyncingSummaries,
    SyncingDriveDetails,
    SyncingChargeDetails,
    Complete,
}

impl SyncPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SyncingSummaries => "syncing_summaries",
            Self::SyncingDriveDetails => "syncing_drive_details",
            Self::SyncingChargeDetails => "syncing_charge_details",
            Self::Complete => "complete",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "syncing_summaries" => Some(Self::SyncingSummaries),
            "syncing_drive_details" => Some(Self::SyncingDriveDetails),
            "syncing_charge_details" => Some(Self::SyncingChargeDetails),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Persisted per-vehicle sync progress. Mutated only by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncState {
    pub car_id: i64,
    pub phase: SyncPhase,
    pub drive_watermark: Option<String>,
    pub charge_watermark: Option<String>,
    pub drives_processed: i64,
    pub drives_total: i64,
    pub charges_processed: i64,
    pub charges_total: i64,
    pub last_synced_at: Option<String>,
    pub last_error: Option<String>,
}

impl SyncState {
    #[must_use]
    pub const fn new(car_id: i64) -> Self {
        Self {
            car_id,
            phase: SyncPhase::Idle,
            drive_watermark: None,
            charge_watermark: None,
            drives_processed: 0,
            drives_total: 0,
            charges_processed: 0,
            charges_total: 0,
            last_synced_at: None,
            last_error: None,
        }
    }
}

/// Event id paired with its start time, used by the linear-pass statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventMoment {
    pub event_id: i64,
    pub start_date: String,
}

/// A record-holding event together with the value that makes it a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    pub event_id: i64,
    pub start_date: String,
    pub value: f64,
}

/// Calendar day with an event count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: String,
    pub count: i64,
}

/// Calendar day with a distance total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayDistance {
    pub day: String,
    pub distance_km: f64,
}

/// AC/DC partition of processed charging sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcDcSplit {
    pub ac_count: i64,
    pub dc_count: i64,
    pub ac_energy_kwh: f64,
    pub dc_energy_kwh: f64,
}

/// Per-country rollup of drives and charges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryVisit {
    pub country_code: String,
    pub country_name: Option<String>,
    pub first_visit: String,
    pub last_visit: String,
    pub drive_count: i64,
    pub total_distance_km: f64,
    pub charge_count: i64,
    pub charge_energy_kwh: f64,
}

/// Half-open `[from, to)` date range on ISO-8601 strings.
pub type DateRange<'a> = Option<(&'a str, &'a str)>;

const DRIVE_COLUMNS: &str = "car_id, drive_id, start_date, end_date, start_address, end_address, \
     distance_km, duration_min, speed_max_kmh, start_battery_level, end_battery_level, \
     energy_consumed_kwh, efficiency_wh_km";

const CHARGE_COLUMNS: &str = "car_id, charge_id, start_date, end_date, address, latitude, longitude, \
     energy_added_kwh, cost, duration_min, start_battery_level, end_battery_level, odometer_km";

/// Telemetry database access layer.
pub struct StatsStore {
    conn: Connection,
}

impl StatsStore {
    /// Create or open a telemetry database at the given path.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the
    /// database cannot be opened, or schema migrations fail.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)
            .map_err(|e| TmsError::Storage(format!("open db {}: {e}", path.display())))?;
        run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| TmsError::Storage(format!("open in-memory db: {e}")))?;
        run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    // === Summary writes ===

    /// Upsert one page of drive summaries in a single transaction.
    pub fn upsert_drive_summaries(&mut self, drives: &[DriveSummary]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO drive_summaries ({DRIVE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ))?;
            for d in drives {
                stmt.execute(params![
                    d.car_id,
                    d.drive_id,
                    d.start_date,
                    d.end_date,
                    d.start_address,
                    d.end_address,
                    d.distance_km,
                    d.duration_min,
                    d.speed_max_kmh,
                    d.start_battery_level,
                    d.end_battery_level,
                    d.energy_consumed_kwh,
                    d.efficiency_wh_km,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Upsert one page of charge summaries in a single transaction.
    pub fn upsert_charge_summaries(&mut self, charges: &[ChargeSummary]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO charge_summaries ({CHARGE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ))?;
            for c in charges {
                stmt.execute(params![
                    c.car_id,
                    c.charge_id,
                    c.start_date,
                    c.end_date,
                    c.address,
                    c.latitude,
                    c.longitude,
                    c.energy_added_kwh,
                    c.cost,
                    c.duration_min,
                    c.start_battery_level,
                    c.end_battery_level,
                    c.odometer_km,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // === Aggregate writes ===

    /// Upsert one drive aggregate row (idempotent per `(car, drive)`).
    pub fn upsert_drive_aggregate(&self, agg: &DriveAggregate) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO drive_detail_aggregates (\
                car_id, drive_id, schema_version, computed_at, \
                max_elevation_m, min_elevation_m, elevation_gain_m, \
                max_inside_temp_c, min_inside_temp_c, max_outside_temp_c, min_outside_temp_c, \
                position_count, country_code, country_name\
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                agg.car_id,
                agg.drive_id,
                agg.schema_version,
                agg.computed_at,
                agg.max_elevation_m,
                agg.min_elevation_m,
                agg.elevation_gain_m,
                agg.max_inside_temp_c,
                agg.min_inside_temp_c,
                agg.max_outside_temp_c,
                agg.min_outside_temp_c,
                agg.position_count,
                agg.country_code,
                agg.country_name,
            ],
        )?;
        Ok(())
    }

    /// Upsert one charge aggregate row (idempotent per `(car, charge)`).
    pub fn upsert_charge_aggregate(&self, agg: &ChargeAggregate) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO charge_detail_aggregates (\
                car_id, charge_id, schema_version, computed_at, \
                max_power_kw, is_fast_charger, max_outside_temp_c, min_outside_temp_c, \
                point_count, country_code, country_name\
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                agg.car_id,
                agg.charge_id,
                agg.schema_version,
                agg.computed_at,
                agg.max_power_kw,
                agg.is_fast_charger,
                agg.max_outside_temp_c,
                agg.min_outside_temp_c,
                agg.point_count,
                agg.country_code,
                agg.country_name,
            ],
        )?;
        Ok(())
    }

    pub fn get_drive_aggregate(&self, car_id: i64, drive_id: i64) -> Result<Option<DriveAggregate>> {
        self.conn
            .query_row(
                "SELECT car_id, drive_id, schema_version, computed_at, \
                    max_elevation_m, min_elevation_m, elevation_gain_m, \
                    max_inside_temp_c, min_inside_temp_c, max_outside_temp_c, min_outside_temp_c, \
                    position_count, country_code, country_name \
                 FROM drive_detail_aggregates WHERE car_id = ?1 AND drive_id = ?2",
                params![car_id, drive_id],
                map_drive_aggregate,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_charge_aggregate(
        &self,
        car_id: i64,
        charge_id: i64,
    ) -> Result<Option<ChargeAggregate>> {
        self.conn
            .query_row(
                "SELECT car_id, charge_id, schema_version, computed_at, \
                    max_power_kw, is_fast_charger, max_outside_temp_c, min_outside_temp_c, \
                    point_count, country_code, country_name \
                 FROM charge_detail_aggregates WHERE car_id = ?1 AND charge_id = ?2",
                params![car_id, charge_id],
                map_charge_aggregate,
            )
            .optional()
            .map_err(Into::into)
    }

    // === Sync bookkeeping ===

    /// Greatest ingested drive start date, the summary-sync watermark.
    pub fn drive_watermark(&self, car_id: i64) -> Result<Option<String>> {
        self.max_start_date("drive_summaries", car_id)
    }

    /// Greatest ingested charge start date.
    pub fn charge_watermark(&self, car_id: i64) -> Result<Option<String>> {
        self.max_start_date("charge_summaries", car_id)
    }

    fn max_start_date(&self, table: &str, car_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row(
                &format!("SELECT MAX(start_date) FROM {table} WHERE car_id = ?1"),
                params![car_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Drive ids with no aggregate row or one tagged below `version`,
    /// ascending.
    pub fn unprocessed_drive_ids(&self, car_id: i64, version: i64) -> Result<Vec<i64>> {
        self.unprocessed_ids("drive", car_id, version)
    }

    /// Charge ids with no aggregate row or one tagged below `version`,
    /// ascending.
    pub fn unprocessed_charge_ids(&self, car_id: i64, version: i64) -> Result<Vec<i64>> {
        self.unprocessed_ids("charge", car_id, version)
    }

    fn unprocessed_ids(&self, kind: &str, car_id: i64, version: i64) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT s.{kind}_id FROM {kind}_summaries s \
             LEFT JOIN {kind}_detail_aggregates a \
               ON s.car_id = a.car_id AND s.{kind}_id = a.{kind}_id \
             WHERE s.car_id = ?1 AND (a.{kind}_id IS NULL OR a.schema_version < ?2) \
             ORDER BY s.{kind}_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![car_id, version], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<i64>>>().map_err(Into::into)
    }

    /// Count of summaries whose aggregate is current (at or above `version`).
    pub fn processed_drive_count(&self, car_id: i64, version: i64) -> Result<i64> {
        self.processed_count("drive", car_id, version)
    }

    pub fn processed_charge_count(&self, car_id: i64, version: i64) -> Result<i64> {
        self.processed_count("charge", car_id, version)
    }

    fn processed_count(&self, kind: &str, car_id: i64, version: i64) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {kind}_summaries s \
             JOIN {kind}_detail_aggregates a \
               ON s.car_id = a.car_id AND s.{kind}_id = a.{kind}_id \
             WHERE s.car_id = ?1 AND a.schema_version >= ?2"
        );
        self.conn
            .query_row(&sql, params![car_id, version], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Whether any aggregate row is tagged below `version`. A schema bump
    /// makes this true, which reopens the detail phases after Complete.
    pub fn has_stale_aggregates(&self, car_id: i64, version: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM drive_detail_aggregates \
                     WHERE car_id = ?1 AND schema_version < ?2) \
                  + (SELECT COUNT(*) FROM charge_detail_aggregates \
                     WHERE car_id = ?1 AND schema_version < ?2)",
            params![car_id, version],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether any aggregate row exists for the car, at any schema version.
    pub fn has_any_aggregates(&self, car_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM drive_detail_aggregates WHERE car_id = ?1) \
                  + (SELECT COUNT(*) FROM charge_detail_aggregates WHERE car_id = ?1)",
            params![car_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn load_sync_state(&self, car_id: i64) -> Result<Option<SyncState>> {
        self.conn
            .query_row(
                "SELECT car_id, phase, drive_watermark, charge_watermark, \
                    drives_processed, drives_total, charges_processed, charges_total, \
                    last_synced_at, last_error \
                 FROM sync_state WHERE car_id = ?1",
                params![car_id],
                |row| {
                    let phase: String = row.get(1)?;
                    Ok(SyncState {
                        car_id: row.get(0)?,
                        phase: SyncPhase::parse(&phase).unwrap_or(SyncPhase::Idle),
                        drive_watermark: row.get(2)?,
                        charge_watermark: row.get(3)?,
                        drives_processed: row.get(4)?,
                        drives_total: row.get(5)?,
                        charges_processed: row.get(6)?,
                        charges_total: row.get(7)?,
                        last_synced_at: row.get(8)?,
                        last_error: row.get(9)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state (\
                car_id, phase, drive_watermark, charge_watermark, \
                drives_processed, drives_total, charges_processed, charges_total, \
                last_synced_at, last_error\
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                state.car_id,
                state.phase.as_str(),
                state.drive_watermark,
                state.charge_watermark,
                state.drives_processed,
                state.drives_total,
                state.charges_processed,
                state.charges_total,
                state.last_synced_at,
                state.last_error,
            ],
        )?;
        Ok(())
    }

    /// Delete every row belonging to one car: summaries, aggregates, and
    /// sync state.
    pub fn reset_car(&mut self, car_id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in [
            "drive_summaries",
            "charge_summaries",
            "drive_detail_aggregates",
            "charge_detail_aggregates",
            "sync_state",
        ] {
            tx.execute(&format!("DELETE FROM {table} WHERE car_id = ?1"), params![car_id])?;
        }
        tx.commit()?;
        Ok(())
    }

    // === Quick stats: counts, sums, extremes ===

    pub fn drive_count(&self, car_id: i64, range: DateRange) -> Result<i64> {
        self.scalar_i64("SELECT COUNT(*) FROM drive_summaries WHERE car_id = ?1{range}", car_id, range)
    }

    pub fn charge_count(&self, car_id: i64, range: DateRange) -> Result<i64> {
        self.scalar_i64("SELECT COUNT(*) FROM charge_summaries WHERE car_id = ?1{range}", car_id, range)
    }

    pub fn sum_drive_distance(&self, car_id: i64, range: DateRange) -> Result<f64> {
        self.scalar_f64(
            "SELECT COALESCE(SUM(distance_km), 0) FROM drive_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    pub fn sum_energy_consumed(&self, car_id: i64, range: DateRange) -> Result<f64> {
        self.scalar_f64(
            "SELECT COALESCE(SUM(energy_consumed_kwh), 0) FROM drive_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    /// Fleet-style average efficiency: total energy over total distance,
    /// not the mean of per-drive ratios.
    pub fn avg_efficiency(&self, car_id: i64, range: DateRange) -> Result<Option<f64>> {
        self.scalar_opt_f64(
            "SELECT SUM(energy_consumed_kwh) * 1000 / NULLIF(SUM(distance_km), 0) \
             FROM drive_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    pub fn max_speed(&self, car_id: i64, range: DateRange) -> Result<Option<i64>> {
        let sql = expand_range(
            "SELECT MAX(speed_max_kmh) FROM drive_summaries WHERE car_id = ?1{range}",
            range,
            "start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn longest_drive(&self, car_id: i64, range: DateRange) -> Result<Option<DriveSummary>> {
        self.top_drive("ORDER BY distance_km DESC", "", car_id, range)
    }

    pub fn fastest_drive(&self, car_id: i64, range: DateRange) -> Result<Option<DriveSummary>> {
        self.top_drive("ORDER BY speed_max_kmh DESC", "", car_id, range)
    }

    /// Lowest Wh/km. Excludes drives with non-positive efficiency or at most
    /// 5 km of distance, where the ratio is noise.
    pub fn most_efficient_drive(&self, car_id: i64, range: DateRange) -> Result<Option<DriveSummary>> {
        self.top_drive(
            "ORDER BY efficiency_wh_km ASC",
            " AND efficiency_wh_km > 0 AND distance_km > 5",
            car_id,
            range,
        )
    }

    pub fn least_efficient_drive(&self, car_id: i64, range: DateRange) -> Result<Option<DriveSummary>> {
        self.top_drive(
            "ORDER BY efficiency_wh_km DESC",
            " AND efficiency_wh_km > 0 AND distance_km > 5",
            car_id,
            range,
        )
    }

    pub fn biggest_battery_drain_drive(
        &self,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<DriveSummary>> {
        self.top_drive(
            "ORDER BY (start_battery_level - end_battery_level) DESC",
            "",
            car_id,
            range,
        )
    }

    fn top_drive(
        &self,
        order: &str,
        extra_where: &str,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<DriveSummary>> {
        let sql = expand_range(
            &format!(
                "SELECT {DRIVE_COLUMNS} FROM drive_summaries \
                 WHERE car_id = ?1{extra_where}{{range}} {order} LIMIT 1"
            ),
            range,
            "start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), map_drive_summary)
            .optional()
            .map_err(Into::into)
    }

    pub fn sum_energy_added(&self, car_id: i64, range: DateRange) -> Result<f64> {
        self.scalar_f64(
            "SELECT COALESCE(SUM(energy_added_kwh), 0) FROM charge_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    pub fn sum_cost(&self, car_id: i64, range: DateRange) -> Result<f64> {
        self.scalar_f64(
            "SELECT COALESCE(SUM(cost), 0) FROM charge_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    pub fn avg_cost_per_kwh(&self, car_id: i64, range: DateRange) -> Result<Option<f64>> {
        self.scalar_opt_f64(
            "SELECT SUM(cost) / NULLIF(SUM(energy_added_kwh), 0) \
             FROM charge_summaries WHERE car_id = ?1 AND cost IS NOT NULL{range}",
            car_id,
            range,
        )
    }

    pub fn biggest_charge(&self, car_id: i64, range: DateRange) -> Result<Option<ChargeSummary>> {
        self.top_charge("ORDER BY energy_added_kwh DESC", "", car_id, range)
    }

    pub fn most_expensive_charge(
        &self,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<ChargeSummary>> {
        self.top_charge("ORDER BY cost DESC", " AND cost IS NOT NULL", car_id, range)
    }

    pub fn most_expensive_per_kwh_charge(
        &self,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<ChargeSummary>> {
        self.top_charge(
            "ORDER BY (cost / energy_added_kwh) DESC",
            " AND cost IS NOT NULL AND energy_added_kwh > 0",
            car_id,
            range,
        )
    }

    pub fn biggest_battery_gain_charge(
        &self,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<ChargeSummary>> {
        self.top_charge(
            "ORDER BY (end_battery_level - start_battery_level) DESC",
            "",
            car_id,
            range,
        )
    }

    fn top_charge(
        &self,
        order: &str,
        extra_where: &str,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<ChargeSummary>> {
        let sql = expand_range(
            &format!(
                "SELECT {CHARGE_COLUMNS} FROM charge_summaries \
                 WHERE car_id = ?1{extra_where}{{range}} {order} LIMIT 1"
            ),
            range,
            "start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), map_charge_summary)
            .optional()
            .map_err(Into::into)
    }

    pub fn avg_drive_duration_min(&self, car_id: i64, range: DateRange) -> Result<Option<f64>> {
        self.scalar_opt_f64(
            "SELECT AVG(duration_min) FROM drive_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    pub fn avg_charge_duration_min(&self, car_id: i64, range: DateRange) -> Result<Option<f64>> {
        self.scalar_opt_f64(
            "SELECT AVG(duration_min) FROM charge_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    /// First drive ever recorded. Always all-time, never year-filtered.
    pub fn first_drive_date(&self, car_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT MIN(start_date) FROM drive_summaries WHERE car_id = ?1",
                params![car_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// First charge ever recorded. Always all-time, never year-filtered.
    pub fn first_charge_date(&self, car_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT MIN(start_date) FROM charge_summaries WHERE car_id = ?1",
                params![car_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn busiest_day(&self, car_id: i64, range: DateRange) -> Result<Option<DayCount>> {
        let sql = expand_range(
            "SELECT DATE(start_date) AS day, COUNT(*) AS n \
             FROM drive_summaries WHERE car_id = ?1{range} \
             GROUP BY DATE(start_date) ORDER BY n DESC LIMIT 1",
            range,
            "start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), |row| {
                Ok(DayCount {
                    day: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .optional()
            .map_err(Into::into)
    }

    pub fn most_distance_day(&self, car_id: i64, range: DateRange) -> Result<Option<DayDistance>> {
        let sql = expand_range(
            "SELECT DATE(start_date) AS day, SUM(distance_km) AS total \
             FROM drive_summaries WHERE car_id = ?1{range} \
             GROUP BY DATE(start_date) ORDER BY total DESC LIMIT 1",
            range,
            "start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), |row| {
                Ok(DayDistance {
                    day: row.get(0)?,
                    distance_km: row.get(1)?,
                })
            })
            .optional()
            .map_err(Into::into)
    }

    pub fn driving_days_count(&self, car_id: i64, range: DateRange) -> Result<i64> {
        self.scalar_i64(
            "SELECT COUNT(DISTINCT DATE(start_date)) FROM drive_summaries WHERE car_id = ?1{range}",
            car_id,
            range,
        )
    }

    /// Distinct calendar days with at least one drive, sorted ascending.
    /// Input to the streak computation.
    pub fn distinct_driving_days(&self, car_id: i64, range: DateRange) -> Result<Vec<String>> {
        let sql = expand_range(
            "SELECT DISTINCT DATE(start_date) AS day FROM drive_summaries \
             WHERE car_id = ?1{range} ORDER BY day ASC",
            range,
            "start_date",
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(car_params(car_id, range)), |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>().map_err(Into::into)
    }

    /// Drive ids with start times, sorted by start time ascending.
    /// Input to the gap computation.
    pub fn drive_moments(&self, car_id: i64, range: DateRange) -> Result<Vec<EventMoment>> {
        self.moments("drive", car_id, range)
    }

    /// Charge ids with start times, sorted by start time ascending.
    pub fn charge_moments(&self, car_id: i64, range: DateRange) -> Result<Vec<EventMoment>> {
        self.moments("charge", car_id, range)
    }

    fn moments(&self, kind: &str, car_id: i64, range: DateRange) -> Result<Vec<EventMoment>> {
        let sql = expand_range(
            &format!(
                "SELECT {kind}_id, start_date FROM {kind}_summaries \
                 WHERE car_id = ?1{{range}} ORDER BY start_date ASC"
            ),
            range,
            "start_date",
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(car_params(car_id, range)), |row| {
            Ok(EventMoment {
                event_id: row.get(0)?,
                start_date: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// All drives' `(start_date, distance_km)` sorted by start time.
    /// Input to the max-distance-between-charges computation, which sums
    /// logged drives rather than trusting odometer deltas.
    pub fn drive_distances(&self, car_id: i64) -> Result<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT start_date, distance_km FROM drive_summaries \
             WHERE car_id = ?1 ORDER BY start_date ASC",
        )?;
        let rows = stmt.query_map(params![car_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Drives whose start falls strictly between two instants, ascending.
    pub fn drives_between(&self, car_id: i64, after: &str, before: &str) -> Result<Vec<DriveSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DRIVE_COLUMNS} FROM drive_summaries \
             WHERE car_id = ?1 AND start_date > ?2 AND start_date < ?3 \
             ORDER BY start_date ASC"
        ))?;
        let rows = stmt.query_map(params![car_id, after, before], map_drive_summary)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Years with at least one drive or charge, descending.
    pub fn years(&self, car_id: i64) -> Result<Vec<i32>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT y FROM (\
                SELECT CAST(strftime('%Y', start_date) AS INTEGER) AS y \
                FROM drive_summaries WHERE car_id = ?1 \
                UNION \
                SELECT CAST(strftime('%Y', start_date) AS INTEGER) AS y \
                FROM charge_summaries WHERE car_id = ?1\
             ) ORDER BY y DESC",
        )?;
        let rows = stmt.query_map(params![car_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<i32>>>().map_err(Into::into)
    }

    // === Deep stats ===

    pub fn max_elevation_record(&self, car_id: i64, range: DateRange) -> Result<Option<AggregateRecord>> {
        self.drive_agg_record("a.max_elevation_m", "DESC", car_id, range)
    }

    pub fn min_elevation_record(&self, car_id: i64, range: DateRange) -> Result<Option<AggregateRecord>> {
        self.drive_agg_record("a.min_elevation_m", "ASC", car_id, range)
    }

    pub fn most_elevation_gain_record(
        &self,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<AggregateRecord>> {
        self.drive_agg_record("a.elevation_gain_m", "DESC", car_id, range)
    }

    pub fn hottest_drive_record(&self, car_id: i64, range: DateRange) -> Result<Option<AggregateRecord>> {
        self.drive_agg_record("a.max_outside_temp_c", "DESC", car_id, range)
    }

    pub fn coldest_drive_record(&self, car_id: i64, range: DateRange) -> Result<Option<AggregateRecord>> {
        self.drive_agg_record("a.min_outside_temp_c", "ASC", car_id, range)
    }

    fn drive_agg_record(
        &self,
        column: &str,
        direction: &str,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<AggregateRecord>> {
        let sql = expand_range(
            &format!(
                "SELECT a.drive_id, d.start_date, {column} \
                 FROM drive_detail_aggregates a \
                 JOIN drive_summaries d ON a.car_id = d.car_id AND a.drive_id = d.drive_id \
                 WHERE a.car_id = ?1 AND {column} IS NOT NULL{{range}} \
                 ORDER BY {column} {direction} LIMIT 1"
            ),
            range,
            "d.start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), map_record)
            .optional()
            .map_err(Into::into)
    }

    /// Hottest cabin temperature across all processed drives.
    pub fn max_inside_temp(&self, car_id: i64) -> Result<Option<f64>> {
        self.conn
            .query_row(
                "SELECT MAX(max_inside_temp_c) FROM drive_detail_aggregates WHERE car_id = ?1",
                params![car_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Coldest cabin temperature across all processed drives.
    pub fn min_inside_temp(&self, car_id: i64) -> Result<Option<f64>> {
        self.conn
            .query_row(
                "SELECT MIN(min_inside_temp_c) FROM drive_detail_aggregates WHERE car_id = ?1",
                params![car_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn hottest_charge_record(&self, car_id: i64, range: DateRange) -> Result<Option<AggregateRecord>> {
        self.charge_agg_record("a.max_outside_temp_c", "DESC", car_id, range)
    }

    pub fn coldest_charge_record(&self, car_id: i64, range: DateRange) -> Result<Option<AggregateRecord>> {
        self.charge_agg_record("a.min_outside_temp_c", "ASC", car_id, range)
    }

    pub fn max_power_record(&self, car_id: i64, range: DateRange) -> Result<Option<AggregateRecord>> {
        self.charge_agg_record("a.max_power_kw", "DESC", car_id, range)
    }

    fn charge_agg_record(
        &self,
        column: &str,
        direction: &str,
        car_id: i64,
        range: DateRange,
    ) -> Result<Option<AggregateRecord>> {
        let sql = expand_range(
            &format!(
                "SELECT a.charge_id, c.start_date, {column} \
                 FROM charge_detail_aggregates a \
                 JOIN charge_summaries c ON a.car_id = c.car_id AND a.charge_id = c.charge_id \
                 WHERE a.car_id = ?1 AND {column} IS NOT NULL{{range}} \
                 ORDER BY {column} {direction} LIMIT 1"
            ),
            range,
            "c.start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), map_record)
            .optional()
            .map_err(Into::into)
    }

    /// AC/DC counts and energy sums. The energy partition is exact:
    /// `ac_energy_kwh + dc_energy_kwh` equals the energy sum over all
    /// processed charges.
    pub fn ac_dc_split(&self, car_id: i64, range: DateRange) -> Result<AcDcSplit> {
        let sql = expand_range(
            "SELECT \
                COALESCE(SUM(CASE WHEN a.is_fast_charger = 0 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN a.is_fast_charger = 1 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN a.is_fast_charger = 0 THEN c.energy_added_kwh ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN a.is_fast_charger = 1 THEN c.energy_added_kwh ELSE 0 END), 0) \
             FROM charge_detail_aggregates a \
             JOIN charge_summaries c ON a.car_id = c.car_id AND a.charge_id = c.charge_id \
             WHERE a.car_id = ?1{range}",
            range,
            "c.start_date",
        );
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), |row| {
                Ok(AcDcSplit {
                    ac_count: row.get(0)?,
                    dc_count: row.get(1)?,
                    ac_energy_kwh: row.get(2)?,
                    dc_energy_kwh: row.get(3)?,
                })
            })
            .map_err(Into::into)
    }

    /// Per-country rollup, ordered by first visit.
    pub fn country_visits(&self, car_id: i64, range: DateRange) -> Result<Vec<CountryVisit>> {
        let drive_part = expand_range(
            "SELECT a.country_code AS code, a.country_name AS name, \
                    MIN(d.start_date) AS first_visit, MAX(d.start_date) AS last_visit, \
                    COUNT(*) AS drive_count, SUM(d.distance_km) AS total_distance \
             FROM drive_detail_aggregates a \
             JOIN drive_summaries d ON a.car_id = d.car_id AND a.drive_id = d.drive_id \
             WHERE a.car_id = ?1 AND a.country_code IS NOT NULL{range} \
             GROUP BY a.country_code",
            range,
            "d.start_date",
        );
        let charge_part = expand_range(
            "SELECT a.country_code AS code, COUNT(*) AS charge_count, \
                    SUM(c.energy_added_kwh) AS charge_energy \
             FROM charge_detail_aggregates a \
             JOIN charge_summaries c ON a.car_id = c.car_id AND a.charge_id = c.charge_id \
             WHERE a.car_id = ?1 AND a.country_code IS NOT NULL{range} \
             GROUP BY a.country_code",
            range,
            "c.start_date",
        );
        let sql = format!(
            "SELECT ds.code, ds.name, ds.first_visit, ds.last_visit, ds.drive_count, \
                    ds.total_distance, COALESCE(cs.charge_count, 0), COALESCE(cs.charge_energy, 0) \
             FROM ({drive_part}) ds \
             LEFT JOIN ({charge_part}) cs ON ds.code = cs.code \
             ORDER BY ds.first_visit ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(car_params(car_id, range)), |row| {
            Ok(CountryVisit {
                country_code: row.get(0)?,
                country_name: row.get(1)?,
                first_visit: row.get(2)?,
                last_visit: row.get(3)?,
                drive_count: row.get(4)?,
                total_distance_km: row.get(5)?,
                charge_count: row.get(6)?,
                charge_energy_kwh: row.get(7)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // === scalar helpers ===

    fn scalar_i64(&self, template: &str, car_id: i64, range: DateRange) -> Result<i64> {
        let sql = expand_range(template, range, "start_date");
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), |row| row.get(0))
            .map_err(Into::into)
    }

    fn scalar_f64(&self, template: &str, car_id: i64, range: DateRange) -> Result<f64> {
        let sql = expand_range(template, range, "start_date");
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), |row| row.get(0))
            .map_err(Into::into)
    }

    fn scalar_opt_f64(&self, template: &str, car_id: i64, range: DateRange) -> Result<Option<f64>> {
        let sql = expand_range(template, range, "start_date");
        self.conn
            .query_row(&sql, params_from_iter(car_params(car_id, range)), |row| row.get(0))
            .map_err(Into::into)
    }
}

/// Substitute the `{range}` marker with a half-open filter on `col`, or
/// nothing for an all-time query.
fn expand_range(template: &str, range: DateRange, col: &str) -> String {
    let clause = if range.is_some() {
        format!(" AND {col} >= ?2 AND {col} < ?3")
    } else {
        String::new()
    };
    template.replace("{range}", &clause)
}

fn car_params(car_id: i64, range: DateRange) -> Vec<Value> {
    match range {
        Some((from, to)) => vec![
            Value::Integer(car_id),
            Value::Text(from.to_string()),
            Value::Text(to.to_string()),
        ],
        None => vec![Value::Integer(car_id)],
    }
}

fn map_drive_summary(row: &Row) -> rusqlite::Result<DriveSummary> {
    Ok(DriveSummary {
        car_id: row.get(0)?,
        drive_id: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        start_address: row.get(4)?,
        end_address: row.get(5)?,
        distance_km: row.get(6)?,
        duration_min: row.get(7)?,
        speed_max_kmh: row.get(8)?,
        start_battery_level: row.get(9)?,
        end_battery_level: row.get(10)?,
        energy_consumed_kwh: row.get(11)?,
        efficiency_wh_km: row.get(12)?,
    })
}

fn map_charge_summary(row: &Row) -> rusqlite::Result<ChargeSummary> {
    Ok(ChargeSummary {
        car_id: row.get(0)?,
        charge_id: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        address: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        energy_added_kwh: row.get(7)?,
        cost: row.get(8)?,
        duration_min: row.get(9)?,
        start_battery_level: row.get(10)?,
        end_battery_level: row.get(11)?,
        odometer_km: row.get(12)?,
    })
}

fn map_drive_aggregate(row: &Row) -> rusqlite::Result<DriveAggregate> {
    Ok(DriveAggregate {
        car_id: row.get(0)?,
        drive_id: row.get(1)?,
        schema_version: row.get(2)?,
        computed_at: row.get(3)?,
        max_elevation_m: row.get(4)?,
        min_elevation_m: row.get(5)?,
        elevation_gain_m: row.get(6)?,
        max_inside_temp_c: row.get(7)?,
        min_inside_temp_c: row.get(8)?,
        max_outside_temp_c: row.get(9)?,
        min_outside_temp_c: row.get(10)?,
        position_count: row.get(11)?,
        country_code: row.get(12)?,
        country_name: row.get(13)?,
    })
}

fn map_charge_aggregate(row: &Row) -> rusqlite::Result<ChargeAggregate> {
    Ok(ChargeAggregate {
        car_id: row.get(0)?,
        charge_id: row.get(1)?,
        schema_version: row.get(2)?,
        computed_at: row.get(3)?,
        max_power_kw: row.get(4)?,
        is_fast_charger: row.get(5)?,
        max_outside_temp_c: row.get(6)?,
        min_outside_temp_c: row.get(7)?,
        point_count: row.get(8)?,
        country_code: row.get(9)?,
        country_name: row.get(10)?,
    })
}

fn map_record(row: &Row) -> rusqlite::Result<AggregateRecord> {
    Ok(AggregateRecord {
        event_id: row.get(0)?,
        start_date: row.get(1)?,
        value: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(car_id: i64, drive_id: i64, start: &str, distance: f64) -> DriveSummary {
        DriveSummary {
            car_id,
            drive_id,
            start_date: start.to_string(),
            end_date: start.to_string(),
            start_address: String::new(),
            end_address: String::new(),
            distance_km: distance,
            duration_min: 30,
            speed_max_kmh: 100,
            start_battery_level: 80,
            end_battery_level: 70,
            energy_consumed_kwh: Some(distance * 0.15),
            efficiency_wh_km: Some(150.0),
        }
    }

    fn charge(car_id: i64, charge_id: i64, start: &str, energy: f64) -> ChargeSummary {
        ChargeSummary {
            car_id,
            charge_id,
            start_date: start.to_string(),
            end_date: start.to_string(),
            address: String::new(),
            latitude: Some(52.52),
            longitude: Some(13.40),
            energy_added_kwh: energy,
            cost: Some(energy * 0.30),
            duration_min: 45,
            start_battery_level: 20,
            end_battery_level: 80,
            odometer_km: None,
        }
    }

    fn drive_agg(car_id: i64, drive_id: i64, version: i64) -> DriveAggregate {
        DriveAggregate {
            car_id,
            drive_id,
            schema_version: version,
            computed_at: "2024-06-01T00:00:00".to_string(),
            max_elevation_m: Some(500),
            min_elevation_m: Some(100),
            elevation_gain_m: Some(250),
            max_inside_temp_c: Some(28.0),
            min_inside_temp_c: Some(18.0),
            max_outside_temp_c: Some(25.0),
            min_outside_temp_c: Some(5.0),
            position_count: 100,
            country_code: Some("DE".to_string()),
            country_name: Some("Germany".to_string()),
        }
    }

    #[test]
    fn upsert_is_idempotent_per_key() {
        let mut store = StatsStore::open_in_memory().unwrap();
        let d = drive(1, 10, "2024-01-01T08:00:00", 24.0);
        store.upsert_drive_summaries(&[d.clone()]).unwrap();
        store.upsert_drive_summaries(&[d]).unwrap();
        assert_eq!(store.drive_count(1, None).unwrap(), 1);
    }

    #[test]
    fn watermark_is_max_start_date() {
        let mut store = StatsStore::open_in_memory().unwrap();
        store
            .upsert_drive_summaries(&[
                drive(1, 1, "2024-01-01T08:00:00", 10.0),
                drive(1, 2, "2024-03-05T09:00:00", 12.0),
            ])
            .unwrap();
        assert_eq!(
            store.drive_watermark(1).unwrap().as_deref(),
            Some("2024-03-05T09:00:00")
        );
        assert_eq!(store.charge_watermark(1).unwrap(), None);
    }

    #[test]
    fn range_filter_is_half_open() {
        let mut store = StatsStore::open_in_memory().unwrap();
        store
            .upsert_drive_summaries(&[
                drive(1, 1, "2023-12-31T23:59:59", 5.0),
                drive(1, 2, "2024-01-01T00:00:00", 6.0),
                drive(1, 3, "2024-12-31T23:59:59", 7.0),
                drive(1, 4, "2025-01-01T00:00:00", 8.0),
            ])
            .unwrap();
        let range = Some(("2024-01-01T00:00:00", "2025-01-01T00:00:00"));
        assert_eq!(store.drive_count(1, range).unwrap(), 2);
        let total = store.sum_drive_distance(1, range).unwrap();
        assert!((total - 13.0).abs() < 1e-9);
    }

    #[test]
    fn unprocessed_ids_include_missing_and_stale() {
        let mut store = StatsStore::open_in_memory().unwrap();
        store
            .upsert_drive_summaries(&[
                drive(1, 1, "2024-01-01T08:00:00", 10.0),
                drive(1, 2, "2024-01-02T08:00:00", 10.0),
                drive(1, 3, "2024-01-03T08:00:00", 10.0),
            ])
            .unwrap();
        store.upsert_drive_aggregate(&drive_agg(1, 1, 1)).unwrap();
        store.upsert_drive_aggregate(&drive_agg(1, 2, 2)).unwrap();

        // Version 2: drive 1 is stale, drive 3 was never processed.
        assert_eq!(store.unprocessed_drive_ids(1, 2).unwrap(), vec![1, 3]);
        // Version 1: only drive 3 is missing.
        assert_eq!(store.unprocessed_drive_ids(1, 1).unwrap(), vec![3]);
        assert_eq!(store.processed_drive_count(1, 2).unwrap(), 1);
    }

    #[test]
    fn efficiency_extremes_exclude_short_drives() {
        let mut store = StatsStore::open_in_memory().unwrap();
        let mut short = drive(1, 1, "2024-01-01T08:00:00", 2.0);
        short.efficiency_wh_km = Some(50.0);
        let mut long = drive(1, 2, "2024-01-02T08:00:00", 30.0);
        long.efficiency_wh_km = Some(160.0);
        store.upsert_drive_summaries(&[short, long]).unwrap();

        let best = store.most_efficient_drive(1, None).unwrap().unwrap();
        assert_eq!(best.drive_id, 2);
    }

    #[test]
    fn ac_dc_energy_partition_is_exact() {
        let mut store = StatsStore::open_in_memory().unwrap();
        store
            .upsert_charge_summaries(&[
                charge(1, 1, "2024-01-01T20:00:00", 30.5),
                charge(1, 2, "2024-01-05T20:00:00", 12.25),
                charge(1, 3, "2024-01-09T20:00:00", 55.75),
            ])
            .unwrap();
        for (id, fast) in [(1, false), (2, false), (3, true)] {
            store
                .upsert_charge_aggregate(&ChargeAggregate {
                    car_id: 1,
                    charge_id: id,
                    schema_version: 1,
                    computed_at: "2024-06-01T00:00:00".to_string(),
                    max_power_kw: Some(if fast { 150 } else { 11 }),
                    is_fast_charger: fast,
                    max_outside_temp_c: None,
                    min_outside_temp_c: None,
                    point_count: 10,
                    country_code: None,
                    country_name: None,
                })
                .unwrap();
        }

        let split = store.ac_dc_split(1, None).unwrap();
        assert_eq!(split.ac_count, 2);
        assert_eq!(split.dc_count, 1);
        let total = store.sum_energy_added(1, None).unwrap();
        assert!((split.ac_energy_kwh + split.dc_energy_kwh - total).abs() < f64::EPSILON);
    }

    #[test]
    fn country_visits_roll_up_drives_and_charges() {
        let mut store = StatsStore::open_in_memory().unwrap();
        store
            .upsert_drive_summaries(&[
                drive(1, 1, "2024-01-01T08:00:00", 10.0),
                drive(1, 2, "2024-02-01T08:00:00", 20.0),
            ])
            .unwrap();
        store.upsert_charge_summaries(&[charge(1, 1, "2024-01-02T20:00:00", 40.0)]).unwrap();
        store.upsert_drive_aggregate(&drive_agg(1, 1, 1)).unwrap();
        store.upsert_drive_aggregate(&drive_agg(1, 2, 1)).unwrap();
        store
            .upsert_charge_aggregate(&ChargeAggregate {
                car_id: 1,
                charge_id: 1,
                schema_version: 1,
                computed_at: "2024-06-01T00:00:00".to_string(),
                max_power_kw: Some(11),
                is_fast_charger: false,
                max_outside_temp_c: None,
                min_outside_temp_c: None,
                point_count: 5,
                country_code: Some("DE".to_string()),
                country_name: Some("Germany".to_string()),
            })
            .unwrap();

        let visits = store.country_visits(1, None).unwrap();
        assert_eq!(visits.len(), 1);
        let de = &visits[0];
        assert_eq!(de.country_code, "DE");
        assert_eq!(de.drive_count, 2);
        assert_eq!(de.charge_count, 1);
        assert!((de.total_distance_km - 30.0).abs() < 1e-9);
        assert_eq!(de.first_visit, "2024-01-01T08:00:00");
        assert_eq!(de.last_visit, "2024-02-01T08:00:00");
    }

    #[test]
    fn sync_state_round_trips() {
        let store = StatsStore::open_in_memory().unwrap();
        assert_eq!(store.load_sync_state(1).unwrap(), None);

        let mut state = SyncState::new(1);
        state.phase = SyncPhase::SyncingDriveDetails;
        state.drives_total = 42;
        state.drives_processed = 17;
        state.last_error = Some("timeout".to_string());
        store.save_sync_state(&state).unwrap();

        assert_eq!(store.load_sync_state(1).unwrap(), Some(state));
    }

    #[test]
    fn reset_clears_only_the_given_car() {
        let mut store = StatsStore::open_in_memory().unwrap();
        store.upsert_drive_summaries(&[drive(1, 1, "2024-01-01T08:00:00", 10.0)]).unwrap();
        store.upsert_drive_summaries(&[drive(2, 1, "2024-01-01T08:00:00", 10.0)]).unwrap();
        store.save_sync_state(&SyncState::new(1)).unwrap();

        store.reset_car(1).unwrap();

        assert_eq!(store.drive_count(1, None).unwrap(), 0);
        assert_eq!(store.drive_count(2, None).unwrap(), 1);
        assert_eq!(store.load_sync_state(1).unwrap(), None);
    }

    #[test]
    fn years_union_both_event_kinds() {
        let mut store = StatsStore::open_in_memory().unwrap();
        store.upsert_drive_summaries(&[drive(1, 1, "2023-06-01T08:00:00", 10.0)]).unwrap();
        store.upsert_charge_summaries(&[charge(1, 1, "2025-01-02T20:00:00", 40.0)]).unwrap();
        assert_eq!(store.years(1).unwrap(), vec![2025, 2023]);
    }
}
