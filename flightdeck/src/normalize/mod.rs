//! Provider payload normalization.
//!
//! Turns a [`RawStatusPayload`] into canonical UTC timestamps and the
//! canonical state vocabulary. This is the only place provider vocabulary
//! is interpreted; the merge engine consumes the output without looking
//! back at raw fields.

pub mod time;

pub use time::{local_string, parse_timestamp};

use crate::model::{Position, RawStatus, StatusState};
use crate::provider::mapping::map_state;
use crate::provider::types::{RawPosition, RawStatusPayload};
use chrono::{DateTime, Utc};

/// A provider status after timestamp and vocabulary normalization.
///
/// Timezone fields carry the provider's own zone names when present,
/// falling back to the hints supplied by the caller (directory lookups).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedStatus {
    pub provider: String,
    pub state: StatusState,
    /// The provider's untranslated state string.
    pub provider_state: Option<String>,
    pub dep_scheduled: Option<DateTime<Utc>>,
    pub dep_estimated: Option<DateTime<Utc>>,
    pub dep_actual: Option<DateTime<Utc>>,
    pub arr_scheduled: Option<DateTime<Utc>>,
    pub arr_estimated: Option<DateTime<Utc>>,
    pub arr_actual: Option<DateTime<Utc>>,
    pub dep_iata: Option<String>,
    pub arr_iata: Option<String>,
    pub dep_tz: Option<String>,
    pub arr_tz: Option<String>,
    pub dep_airport_name: Option<String>,
    pub dep_airport_city: Option<String>,
    pub arr_airport_name: Option<String>,
    pub arr_airport_city: Option<String>,
    pub terminal_dep: Option<String>,
    pub gate_dep: Option<String>,
    pub terminal_arr: Option<String>,
    pub gate_arr: Option<String>,
    pub airline_name: Option<String>,
    pub airline_logo_url: Option<String>,
    pub aircraft_type: Option<String>,
    pub position: Option<Position>,
    /// Verbatim snapshot kept on the record for diagnostics.
    pub raw: RawStatus,
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn clean_upper(value: &Option<String>) -> Option<String> {
    clean(value).map(|s| s.to_uppercase())
}

fn parse_opt(raw: &Option<String>, tz: Option<&str>) -> Option<DateTime<Utc>> {
    raw.as_deref().and_then(|s| parse_timestamp(s, tz))
}

/// Convert a raw provider position into the canonical form. Requires
/// coordinates; everything else is optional.
pub fn position_from_raw(provider: &str, raw: &RawPosition) -> Option<Position> {
    let lat = raw.lat?;
    let lon = raw.lon?;
    Some(Position {
        lat,
        lon,
        altitude_m: raw.altitude,
        speed_kts: raw.ground_speed,
        heading_deg: raw.track,
        timestamp: raw.timestamp.as_deref().and_then(|s| parse_timestamp(s, None)),
        provider: provider.to_string(),
    })
}

/// Normalize one provider payload.
///
/// `dep_tz_hint`/`arr_tz_hint` are the airport zones known from the
/// directory; the provider's own zone names take precedence when present.
pub fn normalize(
    payload: &RawStatusPayload,
    dep_tz_hint: Option<&str>,
    arr_tz_hint: Option<&str>,
) -> NormalizedStatus {
    let dep_tz = clean(&payload.dep_tz).or_else(|| dep_tz_hint.map(str::to_string));
    let arr_tz = clean(&payload.arr_tz).or_else(|| arr_tz_hint.map(str::to_string));

    let raw = RawStatus {
        provider: payload.provider.clone(),
        state: clean(&payload.state),
        dep_scheduled: payload.dep_scheduled.clone(),
        dep_estimated: payload.dep_estimated.clone(),
        dep_actual: payload.dep_actual.clone(),
        arr_scheduled: payload.arr_scheduled.clone(),
        arr_estimated: payload.arr_estimated.clone(),
        arr_actual: payload.arr_actual.clone(),
    };

    NormalizedStatus {
        provider: payload.provider.clone(),
        state: map_state(payload.state.as_deref()),
        provider_state: clean(&payload.state),
        dep_scheduled: parse_opt(&payload.dep_scheduled, dep_tz.as_deref()),
        dep_estimated: parse_opt(&payload.dep_estimated, dep_tz.as_deref()),
        dep_actual: parse_opt(&payload.dep_actual, dep_tz.as_deref()),
        arr_scheduled: parse_opt(&payload.arr_scheduled, arr_tz.as_deref()),
        arr_estimated: parse_opt(&payload.arr_estimated, arr_tz.as_deref()),
        arr_actual: parse_opt(&payload.arr_actual, arr_tz.as_deref()),
        dep_iata: clean_upper(&payload.dep_iata),
        arr_iata: clean_upper(&payload.arr_iata),
        dep_tz,
        arr_tz,
        dep_airport_name: clean(&payload.dep_airport_name),
        dep_airport_city: clean(&payload.dep_airport_city),
        arr_airport_name: clean(&payload.arr_airport_name),
        arr_airport_city: clean(&payload.arr_airport_city),
        terminal_dep: clean(&payload.terminal_dep),
        gate_dep: clean(&payload.gate_dep),
        terminal_arr: clean(&payload.terminal_arr),
        gate_arr: clean(&payload.gate_arr),
        airline_name: clean(&payload.airline_name),
        airline_logo_url: clean(&payload.airline_logo_url),
        aircraft_type: clean(&payload.aircraft_type),
        position: payload
            .position
            .as_ref()
            .and_then(|p| position_from_raw(&payload.provider, p)),
        raw,
    }
}

/// Recompute a leg's airport-local display strings from its UTC fields.
pub fn refresh_local_strings(leg: &mut crate::model::Leg) {
    let tz = leg.airport.tz.clone();
    leg.scheduled_local = leg.scheduled.and_then(|dt| local_string(dt, tz.as_deref()));
    leg.estimated_local = leg.estimated.and_then(|dt| local_string(dt, tz.as_deref()));
    leg.actual_local = leg.actual.and_then(|dt| local_string(dt, tz.as_deref()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload() -> RawStatusPayload {
        let mut p = RawStatusPayload::new("aviationstack");
        p.state = Some("active".to_string());
        p.dep_scheduled = Some("2024-06-10T09:00:00+02:00".to_string());
        p.dep_actual = Some("2024-06-10 09:18:00".to_string());
        p.arr_scheduled = Some("2024-06-10T13:05:00+02:00".to_string());
        p.dep_iata = Some("cph".to_string());
        p.arr_iata = Some("AGP".to_string());
        p.dep_tz = Some("Europe/Copenhagen".to_string());
        p.gate_dep = Some(" A12 ".to_string());
        p
    }

    #[test]
    fn test_state_and_timestamps_normalize() {
        let n = normalize(&payload(), None, Some("Europe/Madrid"));
        assert_eq!(n.state, StatusState::EnRoute);
        assert_eq!(n.provider_state.as_deref(), Some("active"));
        assert_eq!(
            n.dep_scheduled,
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 7, 0, 0).unwrap())
        );
        // Naive actual interpreted in the provider-supplied zone.
        assert_eq!(
            n.dep_actual,
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 7, 18, 0).unwrap())
        );
        assert_eq!(n.dep_iata.as_deref(), Some("CPH"));
        assert_eq!(n.gate_dep.as_deref(), Some("A12"));
        // The hint fills the missing arrival zone.
        assert_eq!(n.arr_tz.as_deref(), Some("Europe/Madrid"));
    }

    #[test]
    fn test_naive_timestamp_with_unknown_zone_stays_null() {
        let mut p = RawStatusPayload::new("airlabs");
        p.arr_estimated = Some("2024-06-10T13:22:00".to_string());
        let n = normalize(&p, None, None);
        assert!(n.arr_estimated.is_none());
        // The raw string survives for diagnostics.
        assert_eq!(n.raw.arr_estimated.as_deref(), Some("2024-06-10T13:22:00"));
    }

    #[test]
    fn test_provider_zone_wins_over_hint() {
        let mut p = RawStatusPayload::new("airlabs");
        p.dep_scheduled = Some("2024-06-10T09:00:00".to_string());
        p.dep_tz = Some("Asia/Kolkata".to_string());
        let n = normalize(&p, Some("Europe/Paris"), None);
        assert_eq!(
            n.dep_scheduled,
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 3, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_position_requires_coordinates() {
        let mut p = RawStatusPayload::new("flightradar24");
        p.position = Some(RawPosition {
            lat: Some(52.3),
            lon: None,
            ..RawPosition::default()
        });
        assert!(normalize(&p, None, None).position.is_none());

        p.position = Some(RawPosition {
            lat: Some(52.3),
            lon: Some(13.2),
            altitude: Some(38000.0),
            ground_speed: Some(470.0),
            track: Some(305.0),
            timestamp: Some("2024-05-01T12:00:00Z".to_string()),
        });
        let pos = normalize(&p, None, None).position.unwrap();
        assert_eq!(pos.provider, "flightradar24");
        assert_eq!(
            pos.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_refresh_local_strings() {
        let mut leg = crate::model::Leg::default();
        leg.airport = crate::model::AirportRef::from_iata("DEL");
        leg.airport.tz = Some("Asia/Kolkata".to_string());
        leg.scheduled = Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        refresh_local_strings(&mut leg);
        assert_eq!(
            leg.scheduled_local.as_deref(),
            Some("2024-05-01T13:30:00+05:30")
        );
        assert!(leg.estimated_local.is_none());
    }
}
