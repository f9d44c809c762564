//! Phased sync orchestrator.
//!
//! One cycle per vehicle walks the state machine
//! Idle → SyncingSummaries → SyncingDriveDetails → SyncingChargeDetails →
//! Complete. The summary phase pages the remote list endpoints from the
//! watermark and commits each page in one transaction; the detail phases
//! materialize aggregates for unprocessed or stale ids in bounded-parallel
//! batches. A failed summary page aborts only that cycle (soft failure,
//! retried on the next trigger); a failed detail item is logged and skipped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::api::{TelemetryClient, PAGE_SIZE};
use crate::core::models::{ChargeData, DriveData};
use crate::error::Result;
use crate::geocode::{Geocoded, Geocoder};
use crate::storage::{
    ChargeSummary, DriveSummary, StatsStore, SyncPhase, SyncState, CURRENT_SCHEMA_VERSION,
};

pub mod detail;

/// Concurrent detail fetches per batch.
pub const BATCH_SIZE: usize = 10;

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The full cycle ran to Complete.
    Completed,
    /// The summary phase failed; recorded as a soft error, retried on the
    /// next trigger.
    SummariesFailed,
    /// Another cycle for this vehicle was already running.
    AlreadyRunning,
}

/// Per-vehicle sync orchestrator.
pub struct SyncEngine {
    store: Arc<AsyncMutex<StatsStore>>,
    client: TelemetryClient,
    geocoder: Arc<Geocoder>,
    fast_charger_threshold_kw: i64,
    active: Mutex<HashSet<i64>>,
}

/// Removes the car from the active set when the cycle ends, normally or not.
struct ActiveGuard<'a> {
    active: &'a Mutex<HashSet<i64>>,
    car_id: i64,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.car_id);
        }
    }
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        store: Arc<AsyncMutex<StatsStore>>,
        client: TelemetryClient,
        geocoder: Arc<Geocoder>,
        fast_charger_threshold_kw: i64,
    ) -> Self {
        Self {
            store,
            client,
            geocoder,
            fast_charger_threshold_kw,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Run one full sync cycle for a vehicle.
    ///
    /// A second concurrent call for the same vehicle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures; remote failures are
    /// reported through [`SyncOutcome`] and `sync_state.last_error`.
    pub async fn sync_car(&self, car_id: i64) -> Result<SyncOutcome> {
        let _guard = {
            let mut active = self
                .active
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if !active.insert(car_id) {
                debug!(car_id, "sync already running, skipping");
                return Ok(SyncOutcome::AlreadyRunning);
            }
            ActiveGuard {
                active: &self.active,
                car_id,
            }
        };

        info!(car_id, "starting sync cycle");
        let mut state = {
            let store = self.store.lock().await;
            store.load_sync_state(car_id)?.unwrap_or_else(|| SyncState::new(car_id))
        };

        let was_complete = state.phase == SyncPhase::Complete;
        state.phase = SyncPhase::SyncingSummaries;
        self.save_state(&state).await?;

        if let Err(e) = self.sync_summaries(car_id, &mut state).await {
            warn!(car_id, error = %e, "summary sync failed");
            state.last_error = Some(e.to_string());
            state.phase = SyncPhase::Idle;
            self.save_state(&state).await?;
            return Ok(SyncOutcome::SummariesFailed);
        }

        // Once complete, detail phases stay closed until a schema bump
        // leaves stale rows behind.
        let reopened = {
            let store = self.store.lock().await;
            store.has_stale_aggregates(car_id, CURRENT_SCHEMA_VERSION)?
        };
        if was_complete && !reopened {
            debug!(car_id, "details already synced");
            state.phase = SyncPhase::Complete;
            state.last_synced_at = Some(now());
            self.save_state(&state).await?;
            return Ok(SyncOutcome::Completed);
        }

        state.phase = SyncPhase::SyncingDriveDetails;
        self.save_state(&state).await?;
        self.sync_drive_details(car_id, &mut state).await?;

        state.phase = SyncPhase::SyncingChargeDetails;
        self.save_state(&state).await?;
        self.sync_charge_details(car_id, &mut state).await?;

        state.phase = SyncPhase::Complete;
        state.last_synced_at = Some(now());
        state.last_error = None;
        self.save_state(&state).await?;
        info!(car_id, "sync cycle complete");
        Ok(SyncOutcome::Completed)
    }

    /// Summary phase: page both list endpoints from the watermarks, one
    /// committed transaction per page.
    async fn sync_summaries(&self, car_id: i64, state: &mut SyncState) -> Result<()> {
        let (drive_since, charge_since) = {
            let store = self.store.lock().await;
            (store.drive_watermark(car_id)?, store.charge_watermark(car_id)?)
        };

        let mut page = 1;
        loop {
            let drives = self
                .client
                .list_drives(car_id, drive_since.as_deref(), page)
                .await?;
            let fetched = drives.len();
            if fetched > 0 {
                let rows: Vec<DriveSummary> = drives
                    .iter()
                    .map(|d| drive_summary_from_wire(car_id, d))
                    .collect();
                let mut store = self.store.lock().await;
                store.upsert_drive_summaries(&rows)?;
            }
            debug!(car_id, page, fetched, "drive summary page");
            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        let mut page = 1;
        loop {
            let charges = self
                .client
                .list_charges(car_id, charge_since.as_deref(), page)
                .await?;
            let fetched = charges.len();
            if fetched > 0 {
                let rows: Vec<ChargeSummary> = charges
                    .iter()
                    .map(|c| charge_summary_from_wire(car_id, c))
                    .collect();
                let mut store = self.store.lock().await;
                store.upsert_charge_summaries(&rows)?;
            }
            debug!(car_id, page, fetched, "charge summary page");
            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        let store = self.store.lock().await;
        state.drive_watermark = store.drive_watermark(car_id)?;
        state.charge_watermark = store.charge_watermark(car_id)?;
        Ok(())
    }

    /// Drive detail phase: fetch traces for unprocessed ids in batches and
    /// materialize one aggregate row each.
    async fn sync_drive_details(&self, car_id: i64, state: &mut SyncState) -> Result<()> {
        let ids = {
            let store = self.store.lock().await;
            store.unprocessed_drive_ids(car_id, CURRENT_SCHEMA_VERSION)?
        };
        state.drives_total = ids.len() as i64;
        state.drives_processed = 0;
        self.save_state(state).await?;
        info!(car_id, total = ids.len(), "processing drive details");

        for batch in ids.chunks(BATCH_SIZE) {
            let fetches = batch
                .iter()
                .map(|&drive_id| async move {
                    (drive_id, self.client.get_drive_detail(car_id, drive_id).await)
                })
                .collect::<Vec<_>>();

            for (drive_id, result) in join_all(fetches).await {
                match result {
                    Ok(detail) => {
                        let country = match detail::first_position_coord(&detail) {
                            Some((lat, lon)) => self.geocode_soft(lat, lon).await,
                            None => None,
                        };
                        let agg = detail::compute_drive_aggregate(
                            car_id,
                            &detail,
                            CURRENT_SCHEMA_VERSION,
                            now(),
                            country.as_ref(),
                        );
                        let store = self.store.lock().await;
                        store.upsert_drive_aggregate(&agg)?;
                        state.drives_processed += 1;
                    }
                    Err(e) => {
                        warn!(car_id, drive_id, error = %e, "drive detail failed, skipping");
                    }
                }
            }
            self.save_state(state).await?;
        }
        Ok(())
    }

    /// Charge detail phase: like the drive phase, with the session's own
    /// summary coordinate used for country attribution.
    async fn sync_charge_details(&self, car_id: i64, state: &mut SyncState) -> Result<()> {
        let ids = {
            let store = self.store.lock().await;
            store.unprocessed_charge_ids(car_id, CURRENT_SCHEMA_VERSION)?
        };
        state.charges_total = ids.len() as i64;
        state.charges_processed = 0;
        self.save_state(state).await?;
        info!(car_id, total = ids.len(), "processing charge details");

        for batch in ids.chunks(BATCH_SIZE) {
            let fetches = batch
                .iter()
                .map(|&charge_id| async move {
                    (charge_id, self.client.get_charge_detail(car_id, charge_id).await)
                })
                .collect::<Vec<_>>();

            for (charge_id, result) in join_all(fetches).await {
                match result {
                    Ok(detail) => {
                        let country = match (detail.latitude, detail.longitude) {
                            (Some(lat), Some(lon)) => self.geocode_soft(lat, lon).await,
                            _ => None,
                        };
                        let agg = detail::compute_charge_aggregate(
                            car_id,
                            &detail,
                            CURRENT_SCHEMA_VERSION,
                            now(),
                            self.fast_charger_threshold_kw,
                            country.as_ref(),
                        );
                        let store = self.store.lock().await;
                        store.upsert_charge_aggregate(&agg)?;
                        state.charges_processed += 1;
                    }
                    Err(e) => {
                        warn!(car_id, charge_id, error = %e, "charge detail failed, skipping");
                    }
                }
            }
            self.save_state(state).await?;
        }
        Ok(())
    }

    /// Geocode failures leave the country unset, never failing the item.
    async fn geocode_soft(&self, lat: f64, lon: f64) -> Option<Geocoded> {
        match self.geocoder.reverse_geocode_with_country(lat, lon).await {
            Ok(geocoded) => Some(geocoded),
            Err(e) => {
                warn!(lat, lon, error = %e, "reverse geocode failed");
                None
            }
        }
    }

    async fn save_state(&self, state: &SyncState) -> Result<()> {
        let store = self.store.lock().await;
        store.save_sync_state(state)
    }

}

fn now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Map a wire drive row to its storage row.
#[must_use]
pub fn drive_summary_from_wire(car_id: i64, d: &DriveData) -> DriveSummary {
    DriveSummary {
        car_id,
        drive_id: d.drive_id,
        start_date: d.start_date.clone().unwrap_or_default(),
        end_date: d.end_date.clone().unwrap_or_default(),
        start_address: d.start_address.clone().unwrap_or_default(),
        end_address: d.end_address.clone().unwrap_or_default(),
        distance_km: d.distance_km().unwrap_or(0.0),
        duration_min: d.duration_min.unwrap_or(0),
        speed_max_kmh: d.speed_max.unwrap_or(0),
        start_battery_level: d
            .battery_details
            .as_ref()
            .and_then(|b| b.start_battery_level)
            .unwrap_or(0),
        end_battery_level: d
            .battery_details
            .as_ref()
            .and_then(|b| b.end_battery_level)
            .unwrap_or(0),
        energy_consumed_kwh: d.energy_consumed_net,
        efficiency_wh_km: d.efficiency_wh_km(),
    }
}

/// Map a wire charge row to its storage row.
#[must_use]
pub fn charge_summary_from_wire(car_id: i64, c: &ChargeData) -> ChargeSummary {
    ChargeSummary {
        car_id,
        charge_id: c.charge_id,
        start_date: c.start_date.clone().unwrap_or_default(),
        end_date: c.end_date.clone().unwrap_or_default(),
        address: c.address.clone().unwrap_or_default(),
        latitude: c.latitude,
        longitude: c.longitude,
        energy_added_kwh: c.charge_energy_added.unwrap_or(0.0),
        cost: c.cost,
        duration_min: c.duration_min.unwrap_or(0),
        start_battery_level: c
            .battery_details
            .as_ref()
            .and_then(|b| b.start_battery_level)
            .unwrap_or(0),
        end_battery_level: c
            .battery_details
            .as_ref()
            .and_then(|b| b.end_battery_level)
            .unwrap_or(0),
        odometer_km: c.odometer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{BatteryDetails, OdometerDetails};

    #[test]
    fn wire_drive_maps_nested_fields() {
        let d = DriveData {
            drive_id: 5,
            start_date: Some("2024-01-01T08:00:00".to_string()),
            end_date: Some("2024-01-01T08:30:00".to_string()),
            start_address: Some("A".to_string()),
            end_address: Some("B".to_string()),
            odometer_details: Some(OdometerDetails {
                odometer_start: None,
                odometer_end: None,
                distance: Some(20.0),
            }),
            duration_min: Some(30),
            speed_max: Some(120),
            speed_avg: None,
            power_max: None,
            power_min: None,
            battery_details: Some(BatteryDetails {
                start_battery_level: Some(90),
                end_battery_level: Some(82),
            }),
            outside_temp_avg: None,
            inside_temp_avg: None,
            energy_consumed_net: Some(4.0),
            consumption_net: None,
        };
        let row = drive_summary_from_wire(3, &d);
        assert_eq!(row.car_id, 3);
        assert_eq!(row.distance_km, 20.0);
        assert_eq!(row.start_battery_level, 90);
        assert_eq!(row.efficiency_wh_km, Some(200.0));
    }

    #[test]
    fn wire_charge_defaults_missing_fields() {
        let c = ChargeData {
            charge_id: 9,
            start_date: None,
            end_date: None,
            address: None,
            charge_energy_added: None,
            charge_energy_used: None,
            cost: None,
            duration_min: None,
            battery_details: None,
            outside_temp_avg: None,
            odometer: None,
            latitude: None,
            longitude: None,
        };
        let row = charge_summary_from_wire(3, &c);
        assert_eq!(row.charge_id, 9);
        assert_eq!(row.energy_added_kwh, 0.0);
        assert_eq!(row.cost, None);
        assert_eq!(row.start_date, "");
    }
}
