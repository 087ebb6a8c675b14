//! Stable flight identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder used when the departure airport is not yet known (e.g. at
/// preview time). Keeps the key stable so a later enrichment pass can still
/// address the record.
const UNKNOWN_AIRPORT: &str = "XXX";

/// Deterministic identity for one logical flight instance.
///
/// Derived from airline code, flight number, departure airport and departure
/// date (`YYYY-MM-DD`): `AF-1234-CDG-2024-05-01`. Stable across refreshes;
/// used for dedup and addressing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightKey(String);

impl FlightKey {
    /// Build a key from its components. `dep_iata` may be unknown; a fixed
    /// placeholder keeps the key stable until the route is resolved.
    pub fn build(airline_code: &str, flight_number: &str, dep_iata: Option<&str>, date: &str) -> Self {
        let dep = dep_iata
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_AIRPORT.to_string());
        Self(format!(
            "{}-{}-{}-{}",
            airline_code.trim().to_uppercase(),
            flight_number.trim(),
            dep,
            date.trim()
        ))
    }

    /// Wrap an already-formatted key, e.g. one read back from the store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FlightKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let a = FlightKey::build("AI", "157", Some("DEL"), "2024-05-01");
        let b = FlightKey::build("ai", "157", Some("del"), "2024-05-01");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "AI-157-DEL-2024-05-01");
    }

    #[test]
    fn test_key_with_unknown_airport_uses_placeholder() {
        let key = FlightKey::build("AF", "2", None, "2024-06-10");
        assert_eq!(key.as_str(), "AF-2-XXX-2024-06-10");

        let empty = FlightKey::build("AF", "2", Some("  "), "2024-06-10");
        assert_eq!(empty, key);
    }

    #[test]
    fn test_key_serde_is_transparent() {
        let key = FlightKey::build("LH", "400", Some("FRA"), "2024-07-01");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"LH-400-FRA-2024-07-01\"");
        let back: FlightKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
