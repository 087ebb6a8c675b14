//! Bundled static directory data.
//!
//! A small built-in table covering common airports, used when every provider
//! misses or is blocked. Extend over time; keep it small and useful.

use super::types::AirportRecord;

/// IATA code → IANA timezone.
const AIRPORT_TZ: &[(&str, &str)] = &[
    // India
    ("DEL", "Asia/Kolkata"),
    ("BOM", "Asia/Kolkata"),
    ("BLR", "Asia/Kolkata"),
    ("MAA", "Asia/Kolkata"),
    ("HYD", "Asia/Kolkata"),
    ("CCU", "Asia/Kolkata"),
    ("AMD", "Asia/Kolkata"),
    // Nordics / Europe
    ("CPH", "Europe/Copenhagen"),
    ("ARN", "Europe/Stockholm"),
    ("GOT", "Europe/Stockholm"),
    ("OSL", "Europe/Oslo"),
    ("HEL", "Europe/Helsinki"),
    ("FRA", "Europe/Berlin"),
    ("MUC", "Europe/Berlin"),
    ("LHR", "Europe/London"),
    ("LGW", "Europe/London"),
    ("MAD", "Europe/Madrid"),
    ("BCN", "Europe/Madrid"),
    ("AGP", "Europe/Madrid"),
    ("CDG", "Europe/Paris"),
    ("AMS", "Europe/Amsterdam"),
    ("ZRH", "Europe/Zurich"),
    // US
    ("LAX", "America/Los_Angeles"),
    ("ATL", "America/New_York"),
    ("ORD", "America/Chicago"),
    ("BOS", "America/New_York"),
    // China
    ("CAN", "Asia/Shanghai"),
    // UAE
    ("DXB", "Asia/Dubai"),
];

/// IATA code → (name, city, IANA timezone) for airports with full entries.
const AIRPORT_INFO: &[(&str, &str, &str, &str)] = &[
    (
        "CDG",
        "Paris Charles de Gaulle Airport",
        "Paris",
        "Europe/Paris",
    ),
    ("CPH", "Copenhagen Airport", "Copenhagen", "Europe/Copenhagen"),
    ("AGP", "Malaga Airport", "Malaga", "Europe/Madrid"),
    (
        "ATL",
        "Hartsfield-Jackson Atlanta International Airport",
        "Atlanta",
        "America/New_York",
    ),
    (
        "ORD",
        "Chicago O'Hare International Airport",
        "Chicago",
        "America/Chicago",
    ),
    ("BOS", "Logan International Airport", "Boston", "America/New_York"),
    (
        "CAN",
        "Guangzhou Baiyun International Airport",
        "Guangzhou",
        "Asia/Shanghai",
    ),
    ("DXB", "Dubai International Airport", "Dubai", "Asia/Dubai"),
];

/// Built-in timezone for an airport, when known.
pub fn static_airport_tz(iata: &str) -> Option<&'static str> {
    let code = iata.trim().to_uppercase();
    AIRPORT_TZ
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, tz)| *tz)
}

/// Built-in static record for an airport. Falls back to a tz-only record
/// when the airport is in the timezone table but not the info table.
pub fn static_airport(iata: &str) -> Option<AirportRecord> {
    let code = iata.trim().to_uppercase();
    if code.is_empty() {
        return None;
    }

    if let Some((_, name, city, tz)) = AIRPORT_INFO.iter().find(|(key, _, _, _)| *key == code) {
        return Some(AirportRecord {
            iata: code,
            name: Some((*name).to_string()),
            city: Some((*city).to_string()),
            country: None,
            tz: Some((*tz).to_string()),
            fetched_at: None,
        });
    }

    static_airport_tz(&code).map(|tz| AirportRecord {
        tz: Some(tz.to_string()),
        ..AirportRecord::code_only(&code)
    })
}
