//! Aggregate computation over full event traces.
//!
//! Pure functions: given the same remote data, the same row comes out, so
//! reprocessing an event (after a schema bump or a retried failure) is
//! idempotent by construction.

use crate::core::models::{ChargeDetail, DriveDetail};
use crate::geocode::Geocoded;
use crate::storage::{ChargeAggregate, DriveAggregate};

/// Reduce a drive's position trace to its aggregate row.
///
/// Elevation gain is the sum of positive deltas between consecutive samples,
/// with no smoothing; GPS jitter is accepted as-is.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn compute_drive_aggregate(
    car_id: i64,
    detail: &DriveDetail,
    schema_version: i64,
    computed_at: String,
    country: Option<&Geocoded>,
) -> DriveAggregate {
    let positions = detail.positions.as_deref().unwrap_or_default();

    let mut max_elevation: Option<i64> = None;
    let mut min_elevation: Option<i64> = None;
    let mut elevation_gain: i64 = 0;
    let mut prev_elevation: Option<i64> = None;
    let mut max_inside: Option<f64> = None;
    let mut min_inside: Option<f64> = None;
    let mut max_outside: Option<f64> = None;
    let mut min_outside: Option<f64> = None;

    for pos in positions {
        if let Some(elev) = pos.elevation {
            max_elevation = Some(max_elevation.map_or(elev, |m| m.max(elev)));
            min_elevation = Some(min_elevation.map_or(elev, |m| m.min(elev)));
            if let Some(prev) = prev_elevation {
                if elev > prev {
                    elevation_gain += elev - prev;
                }
            }
            prev_elevation = Some(elev);
        }
        if let Some(t) = pos.inside_temp {
            max_inside = Some(max_inside.map_or(t, |m| m.max(t)));
            min_inside = Some(min_inside.map_or(t, |m| m.min(t)));
        }
        if let Some(t) = pos.outside_temp {
            max_outside = Some(max_outside.map_or(t, |m| m.max(t)));
            min_outside = Some(min_outside.map_or(t, |m| m.min(t)));
        }
    }

    DriveAggregate {
        car_id,
        drive_id: detail.drive_id,
        schema_version,
        computed_at,
        max_elevation_m: max_elevation,
        min_elevation_m: min_elevation,
        elevation_gain_m: max_elevation.is_some().then_some(elevation_gain),
        max_inside_temp_c: max_inside,
        min_inside_temp_c: min_inside,
        max_outside_temp_c: max_outside,
        min_outside_temp_c: min_outside,
        position_count: positions.len() as i64,
        country_code: country.and_then(|g| g.country_code.clone()),
        country_name: country.and_then(|g| g.country_name.clone()),
    }
}

/// Reduce a charging session's curve to its aggregate row.
///
/// A session is classified DC ("fast") when its peak instantaneous power
/// exceeds `fast_charger_threshold_kw`. Sessions with no power samples are
/// counted as AC.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn compute_charge_aggregate(
    car_id: i64,
    detail: &ChargeDetail,
    schema_version: i64,
    computed_at: String,
    fast_charger_threshold_kw: i64,
    country: Option<&Geocoded>,
) -> ChargeAggregate {
    let points = detail.points.as_deref().unwrap_or_default();

    let mut max_power: Option<i64> = None;
    let mut max_outside: Option<f64> = None;
    let mut min_outside: Option<f64> = None;

    for point in points {
        if let Some(power) = point.charger_power() {
            max_power = Some(max_power.map_or(power, |m| m.max(power)));
        }
        if let Some(t) = point.outside_temp {
            max_outside = Some(max_outside.map_or(t, |m| m.max(t)));
            min_outside = Some(min_outside.map_or(t, |m| m.min(t)));
        }
    }

    ChargeAggregate {
        car_id,
        charge_id: detail.charge_id,
        schema_version,
        computed_at,
        max_power_kw: max_power,
        is_fast_charger: max_power.is_some_and(|p| p > fast_charger_threshold_kw),
        max_outside_temp_c: max_outside,
        min_outside_temp_c: min_outside,
        point_count: points.len() as i64,
        country_code: country.and_then(|g| g.country_code.clone()),
        country_name: country.and_then(|g| g.country_name.clone()),
    }
}

/// First sampled coordinate of a drive, used for country attribution.
#[must_use]
pub fn first_position_coord(detail: &DriveDetail) -> Option<(f64, f64)> {
    detail
        .positions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find_map(|p| Some((p.latitude?, p.longitude?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ChargePoint, ChargerDetails, DrivePosition};

    fn pos(elevation: Option<i64>) -> DrivePosition {
        DrivePosition {
            elevation,
            ..DrivePosition::default()
        }
    }

    fn drive_with_positions(positions: Vec<DrivePosition>) -> DriveDetail {
        DriveDetail {
            drive_id: 1,
            start_date: None,
            end_date: None,
            positions: Some(positions),
        }
    }

    fn charge_with_powers(powers: &[i64]) -> ChargeDetail {
        ChargeDetail {
            charge_id: 1,
            start_date: None,
            end_date: None,
            latitude: None,
            longitude: None,
            points: Some(
                powers
                    .iter()
                    .map(|&p| ChargePoint {
                        charger_details: Some(ChargerDetails {
                            charger_power: Some(p),
                            ..ChargerDetails::default()
                        }),
                        ..ChargePoint::default()
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn elevation_gain_sums_only_positive_deltas() {
        // 100 -> 150 (+50) -> 120 (-30) -> 180 (+60): gain = 110
        let detail = drive_with_positions(vec![
            pos(Some(100)),
            pos(Some(150)),
            pos(Some(120)),
            pos(Some(180)),
        ]);
        let agg = compute_drive_aggregate(1, &detail, 1, String::new(), None);
        assert_eq!(agg.elevation_gain_m, Some(110));
        assert_eq!(agg.max_elevation_m, Some(180));
        assert_eq!(agg.min_elevation_m, Some(100));
    }

    #[test]
    fn missing_elevation_samples_are_skipped_not_zeroed() {
        let detail = drive_with_positions(vec![pos(Some(100)), pos(None), pos(Some(130))]);
        let agg = compute_drive_aggregate(1, &detail, 1, String::new(), None);
        // The gap does not reset the delta chain: 100 -> 130 = +30.
        assert_eq!(agg.elevation_gain_m, Some(30));
        assert_eq!(agg.position_count, 3);
    }

    #[test]
    fn trace_without_elevation_yields_null_gain() {
        let detail = drive_with_positions(vec![pos(None), pos(None)]);
        let agg = compute_drive_aggregate(1, &detail, 1, String::new(), None);
        assert_eq!(agg.elevation_gain_m, None);
        assert_eq!(agg.max_elevation_m, None);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let detail = drive_with_positions(vec![pos(Some(10)), pos(Some(40))]);
        let a = compute_drive_aggregate(7, &detail, 2, "t".to_string(), None);
        let b = compute_drive_aggregate(7, &detail, 2, "t".to_string(), None);
        assert_eq!(a, b);
    }

    #[test]
    fn fast_charger_threshold_is_strictly_greater() {
        let at_threshold = compute_charge_aggregate(
            1,
            &charge_with_powers(&[11, 22]),
            1,
            String::new(),
            22,
            None,
        );
        assert!(!at_threshold.is_fast_charger);

        let above = compute_charge_aggregate(
            1,
            &charge_with_powers(&[11, 23]),
            1,
            String::new(),
            22,
            None,
        );
        assert!(above.is_fast_charger);
        assert_eq!(above.max_power_kw, Some(23));
    }

    #[test]
    fn charge_without_power_samples_counts_as_ac() {
        let detail = ChargeDetail {
            charge_id: 1,
            start_date: None,
            end_date: None,
            latitude: None,
            longitude: None,
            points: Some(vec![ChargePoint::default()]),
        };
        let agg = compute_charge_aggregate(1, &detail, 1, String::new(), 22, None);
        assert!(!agg.is_fast_charger);
        assert_eq!(agg.max_power_kw, None);
    }

    #[test]
    fn first_coord_skips_positions_without_fix() {
        let mut no_fix = pos(None);
        no_fix.latitude = None;
        let mut with_fix = pos(None);
        with_fix.latitude = Some(48.1);
        with_fix.longitude = Some(11.5);
        let detail = drive_with_positions(vec![no_fix, with_fix]);
        assert_eq!(first_position_coord(&detail), Some((48.1, 11.5)));
    }
}
