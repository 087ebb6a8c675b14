//! Core provider types: errors, queries, and the raw payload contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

use crate::model::FlightRecord;

/// Error taxonomy shared by every external data provider.
///
/// Rate-limit and quota variants carry the provider's `Retry-After` when one
/// was supplied; the gateway translates them into provider blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport failure, timeout, or a 5xx answer.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// Too many requests in the current window (HTTP 429/402 or an
    /// in-band rate-limit error code).
    #[error("rate limited{}", reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    RateLimited {
        retry_after_secs: Option<u64>,
        reason: Option<String>,
    },
    /// The account's quota for the billing period is exhausted.
    #[error("quota exceeded")]
    QuotaExceeded { retry_after_secs: Option<u64> },
    /// Invalid, expired, or missing credentials.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The provider rejected the request shape.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The provider answered but the body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether this error should create a provider block.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::QuotaExceeded { .. }
        )
    }
}

/// What the gateway needs to identify one flight at a provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightQuery {
    pub airline_code: String,
    pub flight_number: String,
    /// Departure date `YYYY-MM-DD`, when known.
    pub date: Option<String>,
    /// Route hints used to pick the best row from multi-row answers.
    pub dep_iata: Option<String>,
    pub arr_iata: Option<String>,
    pub scheduled_departure: Option<DateTime<Utc>>,
}

impl FlightQuery {
    pub fn new(airline_code: &str, flight_number: &str) -> Self {
        Self {
            airline_code: airline_code.trim().to_uppercase(),
            flight_number: flight_number.trim().to_string(),
            ..Self::default()
        }
    }

    /// Combined IATA designator, e.g. `AI157`.
    pub fn flight_iata(&self) -> String {
        format!("{}{}", self.airline_code, self.flight_number)
    }

    /// Build a query for a tracked record, carrying its route and schedule
    /// so the provider can disambiguate.
    pub fn from_record(record: &FlightRecord) -> Self {
        Self {
            airline_code: record.airline_code.clone(),
            flight_number: record.flight_number.clone(),
            date: record
                .dep
                .scheduled
                .map(|dt| dt.format("%Y-%m-%d").to_string()),
            dep_iata: record.dep.airport.iata.clone(),
            arr_iata: record.arr.airport.iata.clone(),
            scheduled_departure: record.dep.scheduled,
        }
    }
}

/// Live position as a provider reports it, prior to normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawPosition {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude: Option<f64>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub timestamp: Option<String>,
}

/// Provider-agnostic status payload.
///
/// Every concrete provider maps its wire format into this field bag;
/// timestamps stay verbatim strings here, the normalizer owns their
/// interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawStatusPayload {
    pub provider: String,
    /// Provider's own state vocabulary, untranslated.
    pub state: Option<String>,
    pub dep_scheduled: Option<String>,
    pub dep_estimated: Option<String>,
    pub dep_actual: Option<String>,
    pub arr_scheduled: Option<String>,
    pub arr_estimated: Option<String>,
    pub arr_actual: Option<String>,
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
    pub delay_minutes: Option<i64>,
    pub position: Option<RawPosition>,
}

impl RawStatusPayload {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            ..Self::default()
        }
    }
}

/// One departure/arrival pair offered by a schedule lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub dep_iata: Option<String>,
    pub arr_iata: Option<String>,
}

/// Result of a schedule lookup across the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// A single usable schedule payload.
    Found(RawStatusPayload),
    /// Several rows with distinct routes and no hint to pick one.
    Ambiguous { candidates: Vec<RouteCandidate> },
    /// No provider had a row for this flight and date.
    NotFound,
}

/// Live flight status source.
///
/// Implementations return `Ok(None)` when the provider has no row for the
/// flight; errors are reserved for transport, auth, and limit conditions.
pub trait StatusProvider: Send + Sync {
    /// Stable provider name used for blocks, logs and raw snapshots.
    fn name(&self) -> &'static str;

    /// Fetch the current status for one flight.
    fn fetch_status(
        &self,
        query: &FlightQuery,
    ) -> impl Future<Output = Result<Option<RawStatusPayload>, ProviderError>> + Send;

    /// Fetch all schedule rows matching airline + number + date.
    ///
    /// Multi-row answers are returned in provider order; the gateway decides
    /// between found, ambiguous, and not-found.
    fn fetch_schedule(
        &self,
        query: &FlightQuery,
    ) -> impl Future<Output = Result<Vec<RawStatusPayload>, ProviderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlightKey;
    use chrono::TimeZone;

    #[test]
    fn test_flight_iata_concatenation() {
        let q = FlightQuery::new(" ai ", " 157 ");
        assert_eq!(q.flight_iata(), "AI157");
    }

    #[test]
    fn test_query_from_record_carries_route_and_date() {
        let key = FlightKey::build("AF", "1234", Some("CDG"), "2024-05-01");
        let mut record = FlightRecord::new(key, "AF", "1234");
        record.dep.airport = crate::model::AirportRef::from_iata("CDG");
        record.arr.airport = crate::model::AirportRef::from_iata("JFK");
        record.dep.scheduled = Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 30, 0).unwrap());

        let q = FlightQuery::from_record(&record);
        assert_eq!(q.dep_iata.as_deref(), Some("CDG"));
        assert_eq!(q.arr_iata.as_deref(), Some("JFK"));
        assert_eq!(q.date.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_limit_errors_are_blockable() {
        assert!(ProviderError::RateLimited {
            retry_after_secs: Some(60),
            reason: None
        }
        .is_limit());
        assert!(ProviderError::QuotaExceeded {
            retry_after_secs: None
        }
        .is_limit());
        assert!(!ProviderError::Auth("bad key".to_string()).is_limit());
        assert!(!ProviderError::Unavailable("timeout".to_string()).is_limit());
    }
}
