use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Ground speed above which a track counts as airborne.
pub const AIRBORNE_GROUND_SPEED_KT: f64 = 40.0;

/// Committed entries keyed by aircraft id.
pub type EntryTable = HashMap<String, Entry>;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAircraft {
    #[serde(default, alias = "id", alias = "callsign")]
    pub aircraft_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64_from_any")]
    pub cid: Option<u64>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub departure: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default, alias = "typeCode")]
    pub aircraft_type: Option<String>,
    #[serde(default, alias = "faaEquipmentSuffix")]
    pub equipment: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string_from_any")]
    pub altitude: Option<String>,
    #[serde(default)]
    pub location: Option<ApiLocation>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub altitude_true: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub ground_speed: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub last_updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ApiLocation {
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub lon: Option<f64>,
}

impl ApiAircraft {
    /// Normalized aircraft id, `None` when blank.
    pub fn key(&self) -> Option<String> {
        self.aircraft_id
            .as_deref()
            .map(normalize_aircraft_id)
            .filter(|id| !id.is_empty())
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        let location = self.location.as_ref()?;
        match (location.lat, location.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flightplan {
    pub route: String,
    pub departure: String,
    pub destination: String,
    pub aircraft_type: String,
    pub equipment: String,
    pub altitude: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub lat: f64,
    pub lon: f64,
    pub altitude_true: Option<i64>,
    pub ground_speed: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AarProcedure {
    pub aar_id: String,
    pub triggered_fix: String,
    pub amendment: String,
    pub route: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceFixDistance {
    pub fix: String,
    pub bearing_deg: u16,
    pub distance_nm: u16,
}

impl ReferenceFixDistance {
    /// Fix-radial-distance string, e.g. `BOS090012`.
    pub fn frd(&self) -> String {
        format!("{}{:03}{:03}", self.fix, self.bearing_deg % 360, self.distance_nm.min(999))
    }
}

/// Controller acknowledgement mark on a list row. Wire form is `-1 | 0 | 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum AckStatus {
    #[default]
    Unacknowledged,
    Acknowledged,
    Active,
}

impl From<AckStatus> for i8 {
    fn from(status: AckStatus) -> Self {
        match status {
            AckStatus::Unacknowledged => -1,
            AckStatus::Acknowledged => 0,
            AckStatus::Active => 1,
        }
    }
}

impl TryFrom<i8> for AckStatus {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Unacknowledged),
            0 => Ok(Self::Acknowledged),
            1 => Ok(Self::Active),
            other => Err(format!("ack status out of range: {other}")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub aircraft_id: String,
    pub cid: u64,
    pub flightplan: Flightplan,
    pub track: Option<Track>,
    pub in_sector: bool,
    pub acl_display: bool,
    pub acl_deleted: bool,
    pub dep_display: bool,
    pub dep_deleted: bool,
    pub spa: bool,
    // Row marks below are local to this workstation.
    pub vci_status: AckStatus,
    pub dep_status: AckStatus,
    pub acl_highlighted: bool,
    pub dep_highlighted: bool,
    pub free_text: String,
    pub show_free_text: bool,
    pub aar_list: Option<Vec<AarProcedure>>,
    pub reference_fix: Option<ReferenceFixDistance>,
    /// Consecutive successful polls that did not return this aircraft.
    pub missed_polls: u32,
}

impl Entry {
    pub fn new(aircraft_id: impl Into<String>, cid: u64) -> Self {
        Self {
            aircraft_id: aircraft_id.into(),
            cid,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.track.as_ref().map(|t| (t.lat, t.lon))
    }

    pub fn is_airborne(&self) -> bool {
        self.track
            .as_ref()
            .and_then(|t| t.ground_speed)
            .is_some_and(|gs| gs > AIRBORNE_GROUND_SPEED_KT)
    }

    /// AAR candidates whose trigger fix appears in the current route.
    pub fn applicable_aars(&self) -> Vec<&AarProcedure> {
        let Some(list) = self.aar_list.as_ref() else {
            return Vec::new();
        };
        let fixes: Vec<&str> = route_fixes(&self.flightplan.route).collect();
        list.iter()
            .filter(|aar| fixes.contains(&aar.triggered_fix.trim()))
            .collect()
    }
}

/// Splits a route string on whitespace and dots into fix/airway tokens.
pub fn route_fixes(route: &str) -> impl Iterator<Item = &str> {
    route
        .split(|c: char| c.is_whitespace() || c == '.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn normalize_aircraft_id(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

/// Parses a poll body record by record so one malformed aircraft does not
/// sink the whole response. Returns the accepted records and the reject count.
pub fn parse_poll(body: Value) -> Result<(Vec<ApiAircraft>, usize), String> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("aircraft").or_else(|| obj.remove("entries")) {
            Some(Value::Array(items)) => items,
            _ => return Err("poll response has no aircraft array".to_string()),
        },
        other => return Err(format!("unexpected poll response: {other}")),
    };
    let mut accepted = Vec::with_capacity(items.len());
    let mut rejected = 0usize;
    for item in items {
        match serde_json::from_value::<ApiAircraft>(item) {
            Ok(ac) => accepted.push(ac),
            Err(_) => rejected += 1,
        }
    }
    Ok((accepted, rejected))
}

fn de_opt_string_from_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected string, number or null, got {other}"
        ))),
    }
}

fn de_opt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))),
        Value::Number(number) => Ok(number
            .as_i64()
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))),
        _ => Ok(None),
    }
}

fn de_opt_i64_from_any<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Ok(Some(value))
            } else if let Some(value) = number.as_f64() {
                Ok(Some(value as i64))
            } else {
                Ok(None)
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else if let Ok(value) = trimmed.parse::<i64>() {
                Ok(Some(value))
            } else if let Ok(value) = trimmed.parse::<f64>() {
                Ok(Some(value as i64))
            } else {
                Ok(None)
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

fn de_opt_f64_from_any<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected float-compatible number")),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else if let Ok(value) = trimmed.parse::<f64>() {
                Ok(Some(value))
            } else {
                Ok(None)
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

fn de_opt_u64_from_any<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_u64() {
                Ok(Some(value))
            } else if let Some(value) = number.as_f64() {
                Ok(Some(value.max(0.0) as u64))
            } else {
                Ok(None)
            }
        }
        Value::String(text) => Ok(text.trim().parse::<u64>().ok()),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_poll, AarProcedure, ApiAircraft, Entry, ReferenceFixDistance, Track};
    use serde_json::json;

    const MOCK: &str = r#"[
        {
            "aircraftId": "aal123 ",
            "cid": "412",
            "route": "BOS.J79.JFK",
            "departure": "KBOS",
            "destination": "KJFK",
            "aircraftType": "B738",
            "equipment": "L",
            "altitude": 350,
            "location": { "lat": 42.1, "lon": "-71.2" },
            "altitudeTrue": 34975,
            "groundSpeed": 451.5,
            "lastUpdatedAt": "2024-03-01T12:00:00Z"
        },
        { "id": "DAL9", "cid": 77 },
        { "aircraftId": "BAD1", "cid": 5, "location": "unknown" }
    ]"#;

    #[test]
    fn parse_mock_poll() {
        let body: serde_json::Value = serde_json::from_str(MOCK).unwrap();
        let (records, rejected) = parse_poll(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(rejected, 1);

        let first = &records[0];
        assert_eq!(first.key().as_deref(), Some("AAL123"));
        assert_eq!(first.cid, Some(412));
        assert_eq!(first.altitude.as_deref(), Some("350"));
        assert_eq!(first.position(), Some((42.1, -71.2)));
        assert!(first.last_updated_at.is_some());

        let second = &records[1];
        assert_eq!(second.key().as_deref(), Some("DAL9"));
        assert_eq!(second.position(), None);
    }

    #[test]
    fn parse_poll_accepts_wrapped_object() {
        let (records, rejected) =
            parse_poll(json!({ "aircraft": [{ "aircraftId": "N1", "cid": 1 }] })).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(rejected, 0);
        assert!(parse_poll(json!("nope")).is_err());
    }

    #[test]
    fn blank_id_has_no_key() {
        let ac = ApiAircraft {
            aircraft_id: Some("   ".to_string()),
            ..ApiAircraft::default()
        };
        assert_eq!(ac.key(), None);
    }

    #[test]
    fn airborne_threshold() {
        let mut entry = Entry::new("N1", 1);
        assert!(!entry.is_airborne());
        entry.track = Some(Track {
            lat: 0.0,
            lon: 0.0,
            altitude_true: None,
            ground_speed: Some(40.0),
            last_updated: None,
        });
        assert!(!entry.is_airborne());
        if let Some(track) = entry.track.as_mut() {
            track.ground_speed = Some(41.0);
        }
        assert!(entry.is_airborne());
    }

    #[test]
    fn applicable_aars_follow_route() {
        let mut entry = Entry::new("N1", 1);
        entry.flightplan.route = "BOS.J79.HTO".to_string();
        entry.aar_list = Some(vec![
            AarProcedure {
                aar_id: "A1".to_string(),
                triggered_fix: "HTO".to_string(),
                ..AarProcedure::default()
            },
            AarProcedure {
                aar_id: "A2".to_string(),
                triggered_fix: "CCC".to_string(),
                ..AarProcedure::default()
            },
        ]);
        let ids: Vec<&str> = entry
            .applicable_aars()
            .iter()
            .map(|aar| aar.aar_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A1"]);
    }

    #[test]
    fn frd_is_zero_padded() {
        let rf = ReferenceFixDistance {
            fix: "BOS".to_string(),
            bearing_deg: 90,
            distance_nm: 12,
        };
        assert_eq!(rf.frd(), "BOS090012");
    }
}
