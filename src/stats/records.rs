//! Order-sensitive records computed in a single pass over sorted rows.
//!
//! These cover what plain aggregate SQL cannot express cheaply: consecutive
//! calendar-day streaks, the longest interval between adjacent events, and
//! the most distance driven between two adjacent charge sessions.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::storage::EventMoment;

/// Longest run of consecutive driving days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakRecord {
    pub streak_days: i64,
    pub start_date: String,
    pub end_date: String,
}

/// Longest interval between two adjacent events of the same kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapRecord {
    pub from_id: i64,
    pub to_id: i64,
    pub gap_days: f64,
    pub from_date: String,
    pub to_date: String,
}

/// Most distance covered between two adjacent charge sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeRecord {
    pub distance_km: f64,
    pub from_charge_id: i64,
    pub to_charge_id: i64,
    pub from_date: String,
    pub to_date: String,
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_moment(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Longest run of consecutive calendar days in an ascending list of distinct
/// `YYYY-MM-DD` strings. Ties go to the earliest run. Unparseable entries
/// break the run.
#[must_use]
pub fn longest_streak(days: &[String]) -> Option<StreakRecord> {
    let mut best: Option<StreakRecord> = None;
    let mut run_start = 0usize;
    let mut run_len = 0i64;
    let mut prev: Option<NaiveDate> = None;

    for (i, raw) in days.iter().enumerate() {
        let Some(day) = parse_day(raw) else {
            prev = None;
            run_len = 0;
            continue;
        };
        let consecutive = prev.is_some_and(|p| day == p + chrono::Days::new(1));
        if consecutive {
            run_len += 1;
        } else {
            run_start = i;
            run_len = 1;
        }
        prev = Some(day);
        if best.as_ref().is_none_or(|b| run_len > b.streak_days) {
            best = Some(StreakRecord {
                streak_days: run_len,
                start_date: days[run_start].clone(),
                end_date: raw.clone(),
            });
        }
    }
    best
}

/// Longest elapsed time between adjacent events, scanning ascending start
/// dates. Needs at least two parseable moments. Ties go to the earliest pair.
#[must_use]
pub fn longest_gap(moments: &[EventMoment]) -> Option<GapRecord> {
    let mut best: Option<GapRecord> = None;
    let mut prev: Option<(&EventMoment, NaiveDateTime)> = None;

    for m in moments {
        let Some(at) = parse_moment(&m.start_date) else {
            continue;
        };
        if let Some((from, from_at)) = prev {
            let gap_days = (at - from_at).num_seconds() as f64 / 86_400.0;
            if best.as_ref().is_none_or(|b| gap_days > b.gap_days) {
                best = Some(GapRecord {
                    from_id: from.event_id,
                    to_id: m.event_id,
                    gap_days,
                    from_date: from.start_date.clone(),
                    to_date: m.start_date.clone(),
                });
            }
        }
        prev = Some((m, at));
    }
    best
}

/// Most distance summed over drives starting strictly between two adjacent
/// charge starts. Both inputs must be ascending by start date; `drives` pairs
/// each start date with its distance.
#[must_use]
pub fn max_distance_between_charges(
    charges: &[EventMoment],
    drives: &[(String, f64)],
) -> Option<RangeRecord> {
    let mut best: Option<RangeRecord> = None;
    let mut cursor = 0usize;

    for pair in charges.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        while cursor < drives.len() && drives[cursor].0.as_str() <= from.start_date.as_str() {
            cursor += 1;
        }
        let mut i = cursor;
        let mut distance_km = 0.0;
        while i < drives.len() && drives[i].0.as_str() < to.start_date.as_str() {
            distance_km += drives[i].1;
            i += 1;
        }
        if distance_km > 0.0 && best.as_ref().is_none_or(|b| distance_km > b.distance_km) {
            best = Some(RangeRecord {
                distance_km,
                from_charge_id: from.event_id,
                to_charge_id: to.event_id,
                from_date: from.start_date.clone(),
                to_date: to.start_date.clone(),
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moment(id: i64, date: &str) -> EventMoment {
        EventMoment {
            event_id: id,
            start_date: date.to_string(),
        }
    }

    #[test]
    fn streak_finds_longest_run() {
        let days: Vec<String> = ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-05"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let s = longest_streak(&days).unwrap();
        assert_eq!(s.streak_days, 3);
        assert_eq!(s.start_date, "2024-01-01");
        assert_eq!(s.end_date, "2024-01-03");
    }

    #[test]
    fn streak_tie_goes_to_first_run() {
        let days: Vec<String> = ["2024-01-01", "2024-01-02", "2024-02-01", "2024-02-02"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let s = longest_streak(&days).unwrap();
        assert_eq!(s.streak_days, 2);
        assert_eq!(s.start_date, "2024-01-01");
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let days: Vec<String> = ["2024-01-31", "2024-02-01", "2024-02-02"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let s = longest_streak(&days).unwrap();
        assert_eq!(s.streak_days, 3);
    }

    #[test]
    fn streak_empty_is_none() {
        assert_eq!(longest_streak(&[]), None);
    }

    #[test]
    fn gap_picks_widest_adjacent_pair() {
        let moments = vec![
            moment(1, "2024-01-01T00:00:00"),
            moment(2, "2024-01-02T00:00:00"),
            moment(3, "2024-01-10T12:00:00"),
        ];
        let g = longest_gap(&moments).unwrap();
        assert_eq!(g.from_id, 2);
        assert_eq!(g.to_id, 3);
        assert!((g.gap_days - 8.5).abs() < 1e-9);
    }

    #[test]
    fn gap_needs_two_events() {
        assert!(longest_gap(&[moment(1, "2024-01-01T00:00:00")]).is_none());
        assert!(longest_gap(&[]).is_none());
    }

    #[test]
    fn range_sums_drives_strictly_between_charges() {
        let charges = vec![
            moment(10, "2024-01-01T08:00:00"),
            moment(11, "2024-01-03T08:00:00"),
            moment(12, "2024-01-04T08:00:00"),
        ];
        let drives = vec![
            ("2024-01-01T08:00:00".to_string(), 99.0), // same instant as a charge, excluded
            ("2024-01-01T10:00:00".to_string(), 50.0),
            ("2024-01-02T10:00:00".to_string(), 70.0),
            ("2024-01-03T12:00:00".to_string(), 30.0),
        ];
        let r = max_distance_between_charges(&charges, &drives).unwrap();
        assert_eq!(r.from_charge_id, 10);
        assert_eq!(r.to_charge_id, 11);
        assert!((r.distance_km - 120.0).abs() < 1e-9);
    }

    #[test]
    fn range_single_charge_is_none() {
        let charges = vec![moment(10, "2024-01-01T08:00:00")];
        let drives = vec![("2024-01-02T10:00:00".to_string(), 50.0)];
        assert!(max_distance_between_charges(&charges, &drives).is_none());
    }
}
