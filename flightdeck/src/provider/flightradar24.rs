//! Flightradar24 status and schedule provider.
//!
//! Official FR24 API: Bearer auth plus an `Accept-Version` header, base
//! `https://fr24api.flightradar24.com`. Sandbox keys use the same endpoints
//! rewritten from `/api/…` to `/sandbox/api/…`.
//!
//! FR24 summaries expose takeoff/landing rather than a state string, so the
//! state is derived: landed when a landing time exists, active after takeoff,
//! otherwise scheduled. Live positions come from a second endpoint and are
//! only fetched for airborne flights.

use super::http::AsyncHttpClient;
use super::json::{first_str, get_f64};
use super::types::{FlightQuery, ProviderError, RawPosition, RawStatusPayload, StatusProvider};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, warn};

const BASE_URL: &str = "https://fr24api.flightradar24.com";

pub const PROVIDER_NAME: &str = "flightradar24";

/// Flightradar24 API client.
pub struct Flightradar24Provider<C> {
    client: C,
    api_key: String,
    use_sandbox: bool,
    api_version: String,
}

impl<C: AsyncHttpClient> Flightradar24Provider<C> {
    pub fn new(client: C, api_key: &str, use_sandbox: bool, api_version: &str) -> Self {
        Self {
            client,
            api_key: api_key.trim().to_string(),
            use_sandbox,
            api_version: api_version.trim().to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        let path = if self.use_sandbox && path.starts_with("/api/") {
            format!("/sandbox{}", path)
        } else {
            path.to_string()
        };
        format!("{}{}", BASE_URL, path)
    }

    async fn get_json(&self, path_and_query: &str) -> Result<Value, ProviderError> {
        let url = self.url(path_and_query);
        let bearer = format!("Bearer {}", self.api_key);
        let headers = [
            ("Authorization", bearer.as_str()),
            ("Accept-Version", self.api_version.as_str()),
        ];
        let response = self.client.get_with_headers(&url, &headers).await?;

        if matches!(response.status, 429 | 402) {
            return Err(ProviderError::RateLimited {
                retry_after_secs: response.retry_after_secs,
                reason: None,
            });
        }
        if matches!(response.status, 401 | 403) {
            return Err(ProviderError::Auth(format!("HTTP {}", response.status)));
        }
        if !response.is_success() {
            let snippet = String::from_utf8_lossy(&response.body);
            return Err(ProviderError::Unavailable(format!(
                "HTTP {}: {}",
                response.status,
                snippet.chars().take(300).collect::<String>()
            )));
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| ProviderError::InvalidResponse(format!("FR24 JSON: {}", e)))
    }

    /// Wide query window around the scheduled departure, avoiding timezone
    /// and day-boundary ambiguity.
    fn window(query: &FlightQuery) -> (DateTime<Utc>, DateTime<Utc>) {
        let anchor = query
            .scheduled_departure
            .or_else(|| {
                query.date.as_deref().and_then(|d| {
                    NaiveDate::parse_from_str(d, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                })
            })
            .unwrap_or_else(Utc::now);
        (anchor - Duration::hours(12), anchor + Duration::hours(24))
    }

    async fn fetch_summary(
        &self,
        query: &FlightQuery,
    ) -> Result<Vec<RawStatusPayload>, ProviderError> {
        let (from, to) = Self::window(query);
        let path = format!(
            "/api/flight-summary/full?flight_datetime_from={}&flight_datetime_to={}&flights={}",
            from.format("%Y-%m-%dT%H:%M:%S"),
            to.format("%Y-%m-%dT%H:%M:%S"),
            query.flight_iata()
        );
        let data = self.get_json(&path).await?;

        let rows = data
            .get("data")
            .or_else(|| data.get("result"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if rows.is_empty() {
            debug!(flight = %query.flight_iata(), "FR24 summary returned no rows");
        }
        Ok(rows.iter().map(map_summary_row).collect())
    }

    async fn fetch_live_position(&self, query: &FlightQuery) -> Option<RawPosition> {
        let path = format!(
            "/api/live/flight-positions/light?flights={}",
            query.flight_iata()
        );
        let data = match self.get_json(&path).await {
            Ok(data) => data,
            Err(e) => {
                // Position is an enrichment; a failed fetch never fails status.
                warn!(flight = %query.flight_iata(), error = %e, "FR24 position fetch failed");
                return None;
            }
        };
        let row = data.get("data").and_then(Value::as_array)?.first()?.clone();
        let lat = get_f64(&row, "lat")?;
        let lon = get_f64(&row, "lon")?;
        Some(RawPosition {
            lat: Some(lat),
            lon: Some(lon),
            altitude: get_f64(&row, "alt"),
            ground_speed: get_f64(&row, "gspeed"),
            track: get_f64(&row, "track"),
            timestamp: first_str(&row, &["timestamp"]),
        })
    }

    /// Pick the summary row matching the tracked route when one exists.
    fn best<'a>(
        rows: &'a [RawStatusPayload],
        query: &FlightQuery,
    ) -> Option<&'a RawStatusPayload> {
        if let (Some(dep), Some(arr)) = (&query.dep_iata, &query.arr_iata) {
            if let Some(row) = rows
                .iter()
                .find(|r| r.dep_iata.as_deref() == Some(dep) && r.arr_iata.as_deref() == Some(arr))
            {
                return Some(row);
            }
        }
        rows.first()
    }
}

fn map_summary_row(row: &Value) -> RawStatusPayload {
    let takeoff = first_str(row, &["datetime_takeoff"]);
    let landed = first_str(row, &["datetime_landed"]);

    let state = if landed.is_some() {
        "landed"
    } else if takeoff.is_some() {
        "active"
    } else {
        "scheduled"
    };

    let mut payload = RawStatusPayload::new(PROVIDER_NAME);
    payload.state = Some(state.to_string());
    payload.dep_actual = takeoff;
    payload.arr_actual = landed;
    payload.dep_iata = first_str(row, &["orig_iata", "origin_iata"]);
    payload.arr_iata = first_str(row, &["dest_iata", "destination_iata"]);
    payload.aircraft_type = first_str(row, &["type", "aircraft_type"]);
    payload
}

impl<C: AsyncHttpClient> StatusProvider for Flightradar24Provider<C> {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_status(
        &self,
        query: &FlightQuery,
    ) -> Result<Option<RawStatusPayload>, ProviderError> {
        let rows = self.fetch_summary(query).await?;
        let Some(mut payload) = Self::best(&rows, query).cloned() else {
            return Ok(None);
        };
        if payload.state.as_deref() == Some("active") {
            payload.position = self.fetch_live_position(query).await;
        }
        Ok(Some(payload))
    }

    async fn fetch_schedule(
        &self,
        query: &FlightQuery,
    ) -> Result<Vec<RawStatusPayload>, ProviderError> {
        self.fetch_summary(query).await
    }
}
