//! Mock provider backed by bundled fixtures.
//!
//! Fixtures are keyed `{AIRLINE}{NUMBER}|{YYYY-MM-DD}` and hold canonical-ish
//! flight objects. Useful for tests and for driving the full pipeline without
//! credentials.

use super::json::first_str;
use super::types::{FlightQuery, ProviderError, RawStatusPayload, StatusProvider};
use serde_json::Value;
use std::collections::HashMap;

pub const PROVIDER_NAME: &str = "mock";

const BUNDLED_FIXTURES: &str = include_str!("mock_flights.json");

/// Canned status/schedule source.
pub struct MockProvider {
    fixtures: HashMap<String, Value>,
}

impl MockProvider {
    /// Provider loaded with the bundled fixture set.
    pub fn bundled() -> Self {
        // The bundled file is part of the crate; a parse failure is a build
        // defect, not a runtime condition.
        let fixtures = serde_json::from_str(BUNDLED_FIXTURES).unwrap_or_default();
        Self { fixtures }
    }

    /// Provider with caller-supplied fixtures.
    pub fn with_fixtures(fixtures: HashMap<String, Value>) -> Self {
        Self { fixtures }
    }

    fn lookup(&self, query: &FlightQuery) -> Option<&Value> {
        let date = query.date.clone().or_else(|| {
            query
                .scheduled_departure
                .map(|dt| dt.format("%Y-%m-%d").to_string())
        })?;
        self.fixtures
            .get(&format!("{}|{}", query.flight_iata(), date))
    }
}

fn leg_str(record: &Value, leg: &str, key: &str) -> Option<String> {
    record.get(leg).map(|l| first_str(l, &[key])).unwrap_or(None)
}

fn airport_str(record: &Value, leg: &str, key: &str) -> Option<String> {
    record
        .get(leg)
        .and_then(|l| l.get("airport"))
        .map(|a| first_str(a, &[key]))
        .unwrap_or(None)
}

fn map_record(record: &Value) -> RawStatusPayload {
    let mut payload = RawStatusPayload::new(PROVIDER_NAME);
    payload.state = first_str(record, &["status_state"]).or(Some("scheduled".to_string()));
    payload.dep_scheduled = leg_str(record, "dep", "scheduled");
    payload.dep_estimated = leg_str(record, "dep", "estimated");
    payload.dep_actual = leg_str(record, "dep", "actual");
    payload.arr_scheduled = leg_str(record, "arr", "scheduled");
    payload.arr_estimated = leg_str(record, "arr", "estimated");
    payload.arr_actual = leg_str(record, "arr", "actual");
    payload.terminal_dep = leg_str(record, "dep", "terminal");
    payload.gate_dep = leg_str(record, "dep", "gate");
    payload.terminal_arr = leg_str(record, "arr", "terminal");
    payload.gate_arr = leg_str(record, "arr", "gate");
    payload.dep_iata = airport_str(record, "dep", "iata");
    payload.arr_iata = airport_str(record, "arr", "iata");
    payload.dep_tz = airport_str(record, "dep", "tz");
    payload.arr_tz = airport_str(record, "arr", "tz");
    payload.dep_airport_name = airport_str(record, "dep", "name");
    payload.dep_airport_city = airport_str(record, "dep", "city");
    payload.arr_airport_name = airport_str(record, "arr", "name");
    payload.arr_airport_city = airport_str(record, "arr", "city");
    payload.airline_name = first_str(record, &["airline_name"]);
    payload.airline_logo_url = first_str(record, &["airline_logo_url"]);
    payload.aircraft_type = first_str(record, &["aircraft_type"]);
    payload
}

impl StatusProvider for MockProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_status(
        &self,
        query: &FlightQuery,
    ) -> Result<Option<RawStatusPayload>, ProviderError> {
        Ok(self.lookup(query).map(map_record))
    }

    async fn fetch_schedule(
        &self,
        query: &FlightQuery,
    ) -> Result<Vec<RawStatusPayload>, ProviderError> {
        Ok(self.lookup(query).map(map_record).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(airline: &str, number: &str, date: &str) -> FlightQuery {
        let mut q = FlightQuery::new(airline, number);
        q.date = Some(date.to_string());
        q
    }

    #[tokio::test]
    async fn test_bundled_fixture_lookup() {
        let p = MockProvider::bundled();
        let out = p
            .fetch_status(&query("AI", "157", "2024-05-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.provider, "mock");
        assert_eq!(out.state.as_deref(), Some("scheduled"));
        assert_eq!(out.dep_iata.as_deref(), Some("DEL"));
        assert_eq!(out.arr_iata.as_deref(), Some("CDG"));
        assert_eq!(out.dep_tz.as_deref(), Some("Asia/Kolkata"));
        assert_eq!(out.dep_scheduled.as_deref(), Some("2024-05-01T13:30:00+05:30"));
    }

    #[tokio::test]
    async fn test_unknown_key_is_a_miss() {
        let p = MockProvider::bundled();
        let out = p
            .fetch_status(&query("ZZ", "999", "2024-01-01"))
            .await
            .unwrap();
        assert!(out.is_none());

        // Known flight, wrong date.
        let out = p
            .fetch_status(&query("AI", "157", "2024-05-02"))
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_custom_fixtures() {
        let mut fixtures = HashMap::new();
        fixtures.insert(
            "XX1|2030-01-01".to_string(),
            json!({
                "status_state": "cancelled",
                "dep": {"airport": {"iata": "AAA"}},
                "arr": {"airport": {"iata": "BBB"}}
            }),
        );
        let p = MockProvider::with_fixtures(fixtures);
        let out = p
            .fetch_status(&query("XX", "1", "2030-01-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.state.as_deref(), Some("cancelled"));
    }
}
