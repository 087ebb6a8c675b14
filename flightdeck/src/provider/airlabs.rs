//! AirLabs status and schedule provider.
//!
//! Endpoint: `https://airlabs.co/api/v9/flight?api_key=…&flight_iata=…`.
//! AirLabs reports limit conditions in-band through error codes, each tied
//! to a known reset window.

use super::http::{AsyncHttpClient, HttpResponse};
use super::json::{first_i64, first_str};
use super::types::{FlightQuery, ProviderError, RawStatusPayload, StatusProvider};
use serde_json::Value;
use tracing::debug;

const BASE_URL: &str = "https://airlabs.co/api/v9";

pub const PROVIDER_NAME: &str = "airlabs";

/// AirLabs flight API client.
pub struct AirLabsProvider<C> {
    client: C,
    api_key: String,
}

impl<C: AsyncHttpClient> AirLabsProvider<C> {
    pub fn new(client: C, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.trim().to_string(),
        }
    }

    async fn fetch(&self, query: &FlightQuery) -> Result<Option<RawStatusPayload>, ProviderError> {
        let url = format!(
            "{}/flight?api_key={}&flight_iata={}",
            BASE_URL,
            self.api_key,
            query.flight_iata()
        );
        let response = self.client.get(&url).await?;

        if matches!(response.status, 429 | 402) {
            return Err(ProviderError::RateLimited {
                retry_after_secs: response.retry_after_secs,
                reason: None,
            });
        }

        let payload: Value = serde_json::from_slice(&response.body)
            .map_err(|e| ProviderError::InvalidResponse(format!("AirLabs JSON: {}", e)))?;

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            return match classify_error(error, &response) {
                Classified::NoMatch => Ok(None),
                Classified::Err(e) => Err(e),
            };
        }

        let Some(row) = payload.get("response").filter(|r| r.is_object()) else {
            debug!(flight = %query.flight_iata(), "AirLabs returned no flight object");
            return Ok(None);
        };

        Ok(Some(map_row(row)))
    }
}

enum Classified {
    NoMatch,
    Err(ProviderError),
}

/// Map an AirLabs error object onto the shared taxonomy.
///
/// The minute/hour/month limit codes carry implicit reset windows that the
/// API does not repeat in a `Retry-After` header.
fn classify_error(error: &Value, response: &HttpResponse) -> Classified {
    let (code, message) = match error {
        Value::Object(_) => (
            first_str(error, &["code"]).unwrap_or_default(),
            first_str(error, &["message"]).unwrap_or_default(),
        ),
        other => (String::new(), other.to_string()),
    };
    let code_l = code.to_lowercase();
    let msg_l = message.to_lowercase();

    let retry_after = response.retry_after_secs.or(match code_l.as_str() {
        "minute_limit_exceeded" => Some(60),
        "hour_limit_exceeded" => Some(60 * 60),
        "month_limit_exceeded" => Some(24 * 60 * 60),
        _ => None,
    });

    if code_l == "not_found" {
        return Classified::NoMatch;
    }
    if matches!(code_l.as_str(), "minute_limit_exceeded" | "hour_limit_exceeded")
        || msg_l.contains("rate")
        || msg_l.contains("limit")
    {
        return Classified::Err(ProviderError::RateLimited {
            retry_after_secs: retry_after,
            reason: Some(code).filter(|c| !c.is_empty()),
        });
    }
    if code_l == "month_limit_exceeded" || msg_l.contains("quota") {
        return Classified::Err(ProviderError::QuotaExceeded {
            retry_after_secs: retry_after,
        });
    }
    if matches!(code_l.as_str(), "unknown_api_key" | "expired_api_key")
        || msg_l.contains("api key")
    {
        return Classified::Err(ProviderError::Auth(message));
    }
    if matches!(code_l.as_str(), "wrong_params" | "unknown_method") {
        return Classified::Err(ProviderError::BadRequest(message));
    }
    Classified::Err(ProviderError::Unavailable(format!(
        "AirLabs error {}: {}",
        code, message
    )))
}

fn map_row(row: &Value) -> RawStatusPayload {
    let mut payload = RawStatusPayload::new(PROVIDER_NAME);
    payload.state = first_str(row, &["status"]).map(|s| s.to_lowercase());
    payload.dep_scheduled = first_str(row, &["dep_scheduled", "dep_time_utc", "dep_time"]);
    payload.arr_scheduled = first_str(row, &["arr_scheduled", "arr_time_utc", "arr_time"]);
    payload.dep_estimated = first_str(row, &["dep_estimated_utc", "dep_estimated"]);
    payload.dep_actual = first_str(row, &["dep_actual_utc", "dep_actual"]);
    payload.arr_estimated = first_str(row, &["arr_estimated_utc", "arr_estimated"]);
    payload.arr_actual = first_str(row, &["arr_actual_utc", "arr_actual"]);
    payload.dep_iata = first_str(row, &["dep_iata", "departure_iata"]);
    payload.arr_iata = first_str(row, &["arr_iata", "arrival_iata"]);
    payload.airline_name = first_str(row, &["airline_name"]);
    payload.terminal_dep = first_str(row, &["dep_terminal"]);
    payload.gate_dep = first_str(row, &["dep_gate"]);
    payload.terminal_arr = first_str(row, &["arr_terminal"]);
    payload.gate_arr = first_str(row, &["arr_gate"]);
    payload.delay_minutes = first_i64(row, &["delay"]);
    payload.aircraft_type = first_str(row, &["aircraft_icao", "aircraft_iata"]);
    payload
}

impl<C: AsyncHttpClient> StatusProvider for AirLabsProvider<C> {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_status(
        &self,
        query: &FlightQuery,
    ) -> Result<Option<RawStatusPayload>, ProviderError> {
        self.fetch(query).await
    }

    async fn fetch_schedule(
        &self,
        query: &FlightQuery,
    ) -> Result<Vec<RawStatusPayload>, ProviderError> {
        // The flight endpoint answers with at most one row.
        Ok(self.fetch(query).await?.into_iter().collect())
    }
}
