//! Provider-backed directory lookups.
//!
//! AirLabs and Aviationstack both expose airport and airline endpoints;
//! answers are mapped into partial records and merged over the static
//! dataset by the directory service.

use super::types::{AirlineRecord, AirportRecord};
use crate::provider::http::AsyncHttpClient;
use crate::provider::json::first_str;
use crate::provider::types::ProviderError;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

/// Directory capability of an external provider.
pub trait DirectorySource: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_airport(
        &self,
        iata: &str,
    ) -> impl Future<Output = Result<Option<AirportRecord>, ProviderError>> + Send;

    fn fetch_airline(
        &self,
        iata: &str,
    ) -> impl Future<Output = Result<Option<AirlineRecord>, ProviderError>> + Send;
}

fn parse_body(provider: &str, body: &[u8]) -> Result<Value, ProviderError> {
    serde_json::from_slice(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("{} JSON: {}", provider, e)))
}

/// AirLabs `/airports` and `/airlines` endpoints.
pub struct AirLabsDirectory<C> {
    client: C,
    api_key: String,
}

impl<C: AsyncHttpClient> AirLabsDirectory<C> {
    pub fn new(client: C, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.trim().to_string(),
        }
    }

    async fn first_row(&self, endpoint: &str, iata: &str) -> Result<Option<Value>, ProviderError> {
        let url = format!(
            "https://airlabs.co/api/v9/{}?api_key={}&iata_code={}",
            endpoint,
            self.api_key,
            iata.to_uppercase()
        );
        let response = self.client.get(&url).await?;
        if matches!(response.status, 429 | 402) {
            return Err(ProviderError::RateLimited {
                retry_after_secs: response.retry_after_secs,
                reason: None,
            });
        }
        let payload = parse_body("AirLabs", &response.body)?;
        if payload.get("error").filter(|e| !e.is_null()).is_some() {
            debug!(endpoint = endpoint, iata = iata, "AirLabs directory error answer");
            return Ok(None);
        }
        Ok(payload
            .get("response")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .cloned())
    }
}

impl<C: AsyncHttpClient> DirectorySource for AirLabsDirectory<C> {
    fn name(&self) -> &'static str {
        "airlabs"
    }

    async fn fetch_airport(&self, iata: &str) -> Result<Option<AirportRecord>, ProviderError> {
        let Some(row) = self.first_row("airports", iata).await? else {
            return Ok(None);
        };
        Ok(Some(AirportRecord {
            iata: first_str(&row, &["iata_code"]).unwrap_or_else(|| iata.to_uppercase()),
            name: first_str(&row, &["name", "airport_name"]),
            city: first_str(&row, &["city", "city_name"]),
            country: first_str(&row, &["country_code", "country"]),
            tz: first_str(&row, &["timezone"]),
            fetched_at: None,
        }))
    }

    async fn fetch_airline(&self, iata: &str) -> Result<Option<AirlineRecord>, ProviderError> {
        let Some(row) = self.first_row("airlines", iata).await? else {
            return Ok(None);
        };
        Ok(Some(AirlineRecord {
            iata: first_str(&row, &["iata_code"]).unwrap_or_else(|| iata.to_uppercase()),
            name: first_str(&row, &["name", "airline_name"]),
            logo_url: first_str(&row, &["logo", "logo_url"]),
            fetched_at: None,
        }))
    }
}

/// Aviationstack `/airports` and `/airlines` endpoints.
pub struct AviationstackDirectory<C> {
    client: C,
    access_key: String,
}

impl<C: AsyncHttpClient> AviationstackDirectory<C> {
    pub fn new(client: C, access_key: &str) -> Self {
        Self {
            client,
            access_key: access_key.trim().to_string(),
        }
    }

    async fn first_row(&self, endpoint: &str, iata: &str) -> Result<Option<Value>, ProviderError> {
        let url = format!(
            "http://api.aviationstack.com/v1/{}?access_key={}&iata_code={}&limit=5",
            endpoint,
            self.access_key,
            iata.to_uppercase()
        );
        let response = self.client.get(&url).await?;
        if matches!(response.status, 429 | 402) {
            return Err(ProviderError::RateLimited {
                retry_after_secs: response.retry_after_secs,
                reason: None,
            });
        }
        let payload = parse_body("Aviationstack", &response.body)?;
        if payload.get("error").filter(|e| !e.is_null()).is_some() {
            debug!(endpoint = endpoint, iata = iata, "Aviationstack directory error answer");
            return Ok(None);
        }
        Ok(payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .cloned())
    }
}

impl<C: AsyncHttpClient> DirectorySource for AviationstackDirectory<C> {
    fn name(&self) -> &'static str {
        "aviationstack"
    }

    async fn fetch_airport(&self, iata: &str) -> Result<Option<AirportRecord>, ProviderError> {
        let Some(row) = self.first_row("airports", iata).await? else {
            return Ok(None);
        };
        Ok(Some(AirportRecord {
            iata: first_str(&row, &["iata_code"]).unwrap_or_else(|| iata.to_uppercase()),
            name: first_str(&row, &["airport_name", "name"]),
            city: first_str(&row, &["city", "city_name"]),
            country: first_str(&row, &["country_name", "country"]),
            tz: first_str(&row, &["timezone"]),
            fetched_at: None,
        }))
    }

    async fn fetch_airline(&self, iata: &str) -> Result<Option<AirlineRecord>, ProviderError> {
        let Some(row) = self.first_row("airlines", iata).await? else {
            return Ok(None);
        };
        Ok(Some(AirlineRecord {
            iata: first_str(&row, &["iata_code"]).unwrap_or_else(|| iata.to_uppercase()),
            name: first_str(&row, &["airline_name", "name"]),
            logo_url: first_str(&row, &["logo", "logo_url"]),
            fetched_at: None,
        }))
    }
}

/// Enum dispatch over concrete directory sources; the trait is not
/// object-safe with native async methods.
pub enum DirectorySourceKind<C> {
    AirLabs(AirLabsDirectory<C>),
    Aviationstack(AviationstackDirectory<C>),
}

impl<C: AsyncHttpClient> DirectorySourceKind<C> {
    pub fn name(&self) -> &'static str {
        match self {
            DirectorySourceKind::AirLabs(s) => s.name(),
            DirectorySourceKind::Aviationstack(s) => s.name(),
        }
    }

    pub async fn fetch_airport(&self, iata: &str) -> Result<Option<AirportRecord>, ProviderError> {
        match self {
            DirectorySourceKind::AirLabs(s) => s.fetch_airport(iata).await,
            DirectorySourceKind::Aviationstack(s) => s.fetch_airport(iata).await,
        }
    }

    pub async fn fetch_airline(&self, iata: &str) -> Result<Option<AirlineRecord>, ProviderError> {
        match self {
            DirectorySourceKind::AirLabs(s) => s.fetch_airline(iata).await,
            DirectorySourceKind::Aviationstack(s) => s.fetch_airline(iata).await,
        }
    }
}
