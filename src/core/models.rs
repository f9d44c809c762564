//! Wire models for the TeslaMate-compatible telemetry API.
//!
//! Field names mirror the JSON documents the server emits. Every field
//! except the record id is optional; older server versions omit whole
//! sub-objects, and a missing value must never abort a sync.

use serde::Deserialize;

/// Envelope for `GET /api/v1/cars/{car_id}/drives`.
#[derive(Debug, Clone, Deserialize)]
pub struct DrivesResponse {
    pub data: Option<DrivesData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrivesData {
    pub drives: Option<Vec<DriveData>>,
}

/// One drive summary row as delivered by the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveData {
    pub drive_id: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub odometer_details: Option<OdometerDetails>,
    pub duration_min: Option<i64>,
    pub speed_max: Option<i64>,
    pub speed_avg: Option<f64>,
    pub power_max: Option<i64>,
    pub power_min: Option<i64>,
    pub battery_details: Option<BatteryDetails>,
    pub outside_temp_avg: Option<f64>,
    pub inside_temp_avg: Option<f64>,
    pub energy_consumed_net: Option<f64>,
    pub consumption_net: Option<f64>,
}

impl DriveData {
    /// Distance driven in km, if the server reported odometer details.
    #[must_use]
    pub fn distance_km(&self) -> Option<f64> {
        self.odometer_details.as_ref().and_then(|o| o.distance)
    }

    /// Net consumption in Wh/km, derived from energy and distance.
    #[must_use]
    pub fn efficiency_wh_km(&self) -> Option<f64> {
        let dist = self.distance_km()?;
        if dist <= 0.0 {
            return None;
        }
        self.energy_consumed_net.map(|kwh| kwh * 1000.0 / dist)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OdometerDetails {
    pub odometer_start: Option<f64>,
    pub odometer_end: Option<f64>,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatteryDetails {
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
}

/// Envelope for `GET /api/v1/cars/{car_id}/drives/{drive_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveDetailResponse {
    pub data: Option<DriveDetail>,
}

/// A full drive record including its GPS position trace.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveDetail {
    pub drive_id: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub positions: Option<Vec<DrivePosition>>,
}

/// One point of a drive's position trace.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrivePosition {
    pub date: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<i64>,
    pub power: Option<i64>,
    pub battery_level: Option<i64>,
    pub elevation: Option<i64>,
    pub inside_temp: Option<f64>,
    pub outside_temp: Option<f64>,
    #[serde(default)]
    pub is_climate_on: Option<bool>,
}

/// Envelope for `GET /api/v1/cars/{car_id}/charges`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargesResponse {
    pub data: Option<ChargesData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargesData {
    pub charges: Option<Vec<ChargeData>>,
}

/// One charging-session summary row as delivered by the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeData {
    pub charge_id: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub address: Option<String>,
    pub charge_energy_added: Option<f64>,
    pub charge_energy_used: Option<f64>,
    pub cost: Option<f64>,
    pub duration_min: Option<i64>,
    pub battery_details: Option<BatteryDetails>,
    pub outside_temp_avg: Option<f64>,
    pub odometer: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Envelope for `GET /api/v1/cars/{car_id}/charges/{charge_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeDetailResponse {
    pub data: Option<ChargeDetailData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeDetailData {
    pub charge: Option<ChargeDetail>,
}

/// A full charging session including its per-point curve.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeDetail {
    pub charge_id: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "charge_details")]
    pub points: Option<Vec<ChargePoint>>,
}

/// One sample of the charging curve.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargePoint {
    pub date: Option<String>,
    pub battery_level: Option<i64>,
    pub charge_energy_added: Option<f64>,
    pub charger_details: Option<ChargerDetails>,
    pub outside_temp: Option<f64>,
}

impl ChargePoint {
    #[must_use]
    pub fn charger_power(&self) -> Option<i64> {
        self.charger_details.as_ref().and_then(|c| c.charger_power)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargerDetails {
    pub charger_power: Option<i64>,
    pub charger_voltage: Option<i64>,
    pub charger_actual_current: Option<i64>,
    pub charger_phases: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_list_parses_nested_details() {
        let json = r#"{
            "data": {
                "drives": [{
                    "drive_id": 42,
                    "start_date": "2024-03-01T08:15:00",
                    "end_date": "2024-03-01T08:45:00",
                    "start_address": "Home",
                    "end_address": "Office",
                    "odometer_details": {"odometer_start": 1000.0, "odometer_end": 1024.5, "distance": 24.5},
                    "duration_min": 30,
                    "speed_max": 110,
                    "battery_details": {"start_battery_level": 80, "end_battery_level": 74},
                    "energy_consumed_net": 4.9
                }]
            }
        }"#;

        let resp: DrivesResponse = serde_json::from_str(json).unwrap();
        let drives = resp.data.unwrap().drives.unwrap();
        assert_eq!(drives.len(), 1);
        let d = &drives[0];
        assert_eq!(d.drive_id, 42);
        assert_eq!(d.distance_km(), Some(24.5));
        let eff = d.efficiency_wh_km().unwrap();
        assert!((eff - 200.0).abs() < 1e-9);
    }

    #[test]
    fn efficiency_is_none_for_zero_distance() {
        let d = DriveData {
            drive_id: 1,
            start_date: None,
            end_date: None,
            start_address: None,
            end_address: None,
            odometer_details: Some(OdometerDetails {
                odometer_start: None,
                odometer_end: None,
                distance: Some(0.0),
            }),
            duration_min: None,
            speed_max: None,
            speed_avg: None,
            power_max: None,
            power_min: None,
            battery_details: None,
            outside_temp_avg: None,
            inside_temp_avg: None,
            energy_consumed_net: Some(5.0),
            consumption_net: None,
        };
        assert_eq!(d.efficiency_wh_km(), None);
    }

    #[test]
    fn charge_detail_reads_points_from_charge_details_key() {
        let json = r#"{
            "data": {
                "charge": {
                    "charge_id": 7,
                    "start_date": "2024-03-02T19:00:00",
                    "latitude": 52.5201,
                    "longitude": 13.4051,
                    "charge_details": [
                        {"charger_details": {"charger_power": 11, "charger_phases": 3}, "outside_temp": 8.5},
                        {"charger_details": {"charger_power": 150}, "outside_temp": 8.0}
                    ]
                }
            }
        }"#;

        let resp: ChargeDetailResponse = serde_json::from_str(json).unwrap();
        let charge = resp.data.unwrap().charge.unwrap();
        let points = charge.points.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].charger_power(), Some(11));
        assert_eq!(points[1].charger_power(), Some(150));
    }

    #[test]
    fn missing_envelope_fields_deserialize_as_none() {
        let resp: DrivesResponse = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert!(resp.data.unwrap().drives.is_none());

        let resp: ChargesResponse = serde_json::from_str(r"{}").unwrap();
        assert!(resp.data.is_none());
    }
}
