//! Aviationstack status and schedule provider.
//!
//! Endpoint: `http://api.aviationstack.com/v1/flights?access_key=…&flight_iata=…`.
//! Free plans are HTTP-only, so the plain scheme is used by default. Answers
//! carry multiple rows per flight designator (one per service day/route);
//! status picks the row matching the tracked route, schedule returns all.

use super::http::AsyncHttpClient;
use super::json::{first_i64, first_str};
use super::types::{FlightQuery, ProviderError, RawStatusPayload, StatusProvider};
use serde_json::Value;
use tracing::debug;

const BASE_URL: &str = "http://api.aviationstack.com/v1";

pub const PROVIDER_NAME: &str = "aviationstack";

/// Aviationstack flights API client.
pub struct AviationstackProvider<C> {
    client: C,
    access_key: String,
}

impl<C: AsyncHttpClient> AviationstackProvider<C> {
    pub fn new(client: C, access_key: &str) -> Self {
        Self {
            client,
            access_key: access_key.trim().to_string(),
        }
    }

    async fn fetch_rows(&self, query: &FlightQuery) -> Result<Vec<Value>, ProviderError> {
        let mut url = format!(
            "{}/flights?access_key={}&flight_iata={}&limit=10",
            BASE_URL,
            self.access_key,
            query.flight_iata()
        );
        if let Some(date) = &query.date {
            url.push_str(&format!("&flight_date={}", date));
        }

        let response = self.client.get(&url).await?;

        if matches!(response.status, 429 | 402) {
            return Err(ProviderError::RateLimited {
                retry_after_secs: response.retry_after_secs,
                reason: None,
            });
        }

        let payload: Value = serde_json::from_slice(&response.body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Aviationstack JSON: {}", e)))?;

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            return Err(classify_error(error, response.retry_after_secs));
        }

        let rows = payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if rows.is_empty() {
            debug!(flight = %query.flight_iata(), "Aviationstack returned no rows");
        }
        Ok(rows)
    }
}

fn classify_error(error: &Value, retry_after: Option<u64>) -> ProviderError {
    let code = first_str(error, &["code", "type"]).unwrap_or_default();
    let message = first_str(error, &["info", "message"]).unwrap_or_else(|| error.to_string());
    let code_l = code.to_lowercase();
    let msg_l = message.to_lowercase();

    if code_l == "rate_limit_reached" || msg_l.contains("rate limit") {
        return ProviderError::RateLimited {
            retry_after_secs: retry_after.or(Some(60)),
            reason: Some(code).filter(|c| !c.is_empty()),
        };
    }
    if code_l == "usage_limit_reached" || msg_l.contains("quota") || msg_l.contains("limit") {
        return ProviderError::QuotaExceeded {
            retry_after_secs: retry_after.or(Some(24 * 60 * 60)),
        };
    }
    if matches!(
        code_l.as_str(),
        "invalid_access_key" | "missing_access_key" | "inactive_user"
    ) || msg_l.contains("access key")
    {
        return ProviderError::Auth(message);
    }
    if matches!(
        code_l.as_str(),
        "function_access_restricted" | "invalid_api_function" | "404_not_found"
    ) {
        return ProviderError::BadRequest(message);
    }
    ProviderError::Unavailable(format!("Aviationstack error {}: {}", code, message))
}

fn map_row(row: &Value) -> RawStatusPayload {
    let dep = row.get("departure").cloned().unwrap_or(Value::Null);
    let arr = row.get("arrival").cloned().unwrap_or(Value::Null);

    let mut payload = RawStatusPayload::new(PROVIDER_NAME);
    payload.state = first_str(row, &["flight_status"]).map(|s| s.to_lowercase());
    payload.dep_scheduled = first_str(&dep, &["scheduled"]);
    payload.dep_estimated = first_str(&dep, &["estimated"]);
    payload.dep_actual = first_str(&dep, &["actual"]);
    payload.arr_scheduled = first_str(&arr, &["scheduled"]);
    payload.arr_estimated = first_str(&arr, &["estimated"]);
    payload.arr_actual = first_str(&arr, &["actual"]);
    payload.dep_iata = first_str(&dep, &["iata"]);
    payload.arr_iata = first_str(&arr, &["iata"]);
    payload.dep_tz = first_str(&dep, &["timezone"]);
    payload.arr_tz = first_str(&arr, &["timezone"]);
    payload.dep_airport_name = first_str(&dep, &["airport"]);
    payload.arr_airport_name = first_str(&arr, &["airport"]);
    payload.terminal_dep = first_str(&dep, &["terminal"]);
    payload.gate_dep = first_str(&dep, &["gate"]);
    payload.terminal_arr = first_str(&arr, &["terminal"]);
    payload.gate_arr = first_str(&arr, &["gate"]);
    payload.delay_minutes = first_i64(&dep, &["delay"]).or(first_i64(&arr, &["delay"]));
    payload.airline_name = row
        .get("airline")
        .map(|a| first_str(a, &["name"]))
        .unwrap_or(None);
    payload.aircraft_type = row
        .get("aircraft")
        .map(|a| first_str(a, &["icao", "iata"]))
        .unwrap_or(None);
    payload
}

/// Pick the row matching the tracked route when one exists, else the first.
fn best_row<'a>(rows: &'a [Value], query: &FlightQuery) -> Option<&'a Value> {
    if let (Some(dep), Some(arr)) = (&query.dep_iata, &query.arr_iata) {
        for row in rows {
            let row_dep = row
                .get("departure")
                .map(|d| first_str(d, &["iata"]))
                .unwrap_or(None);
            let row_arr = row
                .get("arrival")
                .map(|a| first_str(a, &["iata"]))
                .unwrap_or(None);
            if row_dep.as_deref() == Some(dep) && row_arr.as_deref() == Some(arr) {
                return Some(row);
            }
        }
    }
    rows.first()
}

impl<C: AsyncHttpClient> StatusProvider for AviationstackProvider<C> {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_status(
        &self,
        query: &FlightQuery,
    ) -> Result<Option<RawStatusPayload>, ProviderError> {
        let rows = self.fetch_rows(query).await?;
        Ok(best_row(&rows, query).map(map_row))
    }

    async fn fetch_schedule(
        &self,
        query: &FlightQuery,
    ) -> Result<Vec<RawStatusPayload>, ProviderError> {
        let rows = self.fetch_rows(query).await?;
        Ok(rows.iter().map(map_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::http::tests::MockAsyncHttpClient;
    use super::*;

    fn provider(mock: MockAsyncHttpClient) -> AviationstackProvider<MockAsyncHttpClient> {
        AviationstackProvider::new(mock, "test-key")
    }

    const TWO_ROUTES: &str = r#"{
        "data": [
            {
                "flight_status": "scheduled",
                "departure": {"iata": "CPH", "scheduled": "2024-06-10T09:00:00+00:00", "timezone": "Europe/Copenhagen"},
                "arrival": {"iata": "LHR", "scheduled": "2024-06-10T10:30:00+00:00", "timezone": "Europe/London"},
                "airline": {"name": "Scandinavian Airlines"}
            },
            {
                "flight_status": "scheduled",
                "departure": {"iata": "ARN", "scheduled": "2024-06-10T15:00:00+00:00"},
                "arrival": {"iata": "OSL", "scheduled": "2024-06-10T16:05:00+00:00"}
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_status_prefers_matching_route() {
        let p = provider(MockAsyncHttpClient::ok(TWO_ROUTES));
        let mut query = FlightQuery::new("SK", "501");
        query.dep_iata = Some("ARN".to_string());
        query.arr_iata = Some("OSL".to_string());

        let out = p.fetch_status(&query).await.unwrap().unwrap();
        assert_eq!(out.dep_iata.as_deref(), Some("ARN"));
        assert_eq!(out.arr_iata.as_deref(), Some("OSL"));
    }

    #[tokio::test]
    async fn test_status_falls_back_to_first_row() {
        let p = provider(MockAsyncHttpClient::ok(TWO_ROUTES));
        let out = p
            .fetch_status(&FlightQuery::new("SK", "501"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.dep_iata.as_deref(), Some("CPH"));
        assert_eq!(out.dep_tz.as_deref(), Some("Europe/Copenhagen"));
        assert_eq!(out.airline_name.as_deref(), Some("Scandinavian Airlines"));
    }

    #[tokio::test]
    async fn test_schedule_returns_all_rows() {
        let p = provider(MockAsyncHttpClient::ok(TWO_ROUTES));
        let rows = p
            .fetch_schedule(&FlightQuery::new("SK", "501"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_date_is_forwarded() {
        let p = provider(MockAsyncHttpClient::ok(r#"{"data": []}"#));
        let mut query = FlightQuery::new("SK", "501");
        query.date = Some("2024-06-10".to_string());
        let _ = p.fetch_schedule(&query).await.unwrap();

        let requests = p.client.requests.lock().unwrap();
        assert!(requests[0].contains("flight_date=2024-06-10"));
        assert!(requests[0].contains("flight_iata=SK501"));
    }

    #[tokio::test]
    async fn test_usage_limit_maps_to_quota() {
        let body = r#"{"error": {"code": "usage_limit_reached", "info": "monthly usage"}}"#;
        let p = provider(MockAsyncHttpClient::ok(body));
        let err = p.fetch_status(&FlightQuery::new("SK", "501")).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::QuotaExceeded {
                retry_after_secs: Some(24 * 60 * 60),
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_key_maps_to_auth() {
        let body = r#"{"error": {"code": "invalid_access_key", "info": "bad access key"}}"#;
        let p = provider(MockAsyncHttpClient::ok(body));
        let err = p.fetch_status(&FlightQuery::new("SK", "501")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn test_empty_data_is_a_miss() {
        let p = provider(MockAsyncHttpClient::ok(r#"{"data": []}"#));
        let out = p.fetch_status(&FlightQuery::new("SK", "501")).await.unwrap();
        assert!(out.is_none());
    }
}
