//! Airport/airline directory with a TTL'd cache.
//!
//! Lookup order: cache (fresh and complete) → configured directory sources
//! (skipping blocked providers) → bundled static dataset. Provider answers
//! are merged over the static fallback without overwriting non-null fields,
//! then written through to the store. Lookups never fail; a total miss
//! yields a code-only record.

pub mod dataset;
pub mod source;
mod types;

pub use source::{AirLabsDirectory, AviationstackDirectory, DirectorySource, DirectorySourceKind};
pub use types::{AirlineRecord, AirportRecord, DirectoryCache};

use crate::config::TrackerOptions;
use crate::provider::blocks::ProviderBlocks;
use crate::provider::http::AsyncHttpClient;
use crate::store::Store;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Lightweight logo URL for an airline IATA code.
pub fn airline_logo_url(iata: &str) -> Option<String> {
    let code = iata.trim().to_uppercase();
    if code.is_empty() {
        return None;
    }
    Some(format!("https://pics.avs.io/64/64/{}.png", code))
}

/// Short timezone label (e.g. `CEST`) for an IANA zone at a given instant.
pub fn tz_short(tz_name: &str, at: DateTime<Utc>) -> Option<String> {
    let zone: Tz = tz_name.trim().parse().ok()?;
    Some(at.with_timezone(&zone).format("%Z").to_string())
}

/// Directory lookups with cache, provider sources, and static fallback.
pub struct DirectoryService<C, S> {
    sources: Vec<DirectorySourceKind<C>>,
    store: S,
    blocks: Arc<ProviderBlocks>,
    cache: Mutex<DirectoryCache>,
    ttl_days: i64,
}

impl<C: AsyncHttpClient + Clone, S: Store> DirectoryService<C, S> {
    /// Wire the service from options, hydrating the cache from the store.
    pub async fn new(
        options: &TrackerOptions,
        client: C,
        store: S,
        blocks: Arc<ProviderBlocks>,
    ) -> Self {
        let creds = &options.credentials;
        let mut sources = Vec::new();
        if let Some(key) = creds.aviationstack() {
            sources.push(DirectorySourceKind::Aviationstack(
                AviationstackDirectory::new(client.clone(), key),
            ));
        }
        if let Some(key) = creds.airlabs() {
            sources.push(DirectorySourceKind::AirLabs(AirLabsDirectory::new(
                client.clone(),
                key,
            )));
        }

        let cache = match store.load_directory().await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Directory cache load failed, starting empty");
                DirectoryCache::default()
            }
        };

        Self {
            sources,
            store,
            blocks,
            cache: Mutex::new(cache),
            ttl_days: options.cache_ttl_days,
        }
    }

    fn cached_airport(&self, iata: &str, now: DateTime<Utc>) -> Option<AirportRecord> {
        let cache = self.cache.lock().unwrap();
        cache
            .airports
            .get(iata)
            .filter(|a| a.is_fresh(self.ttl_days, now) && a.is_complete())
            .cloned()
    }

    fn cached_airline(&self, iata: &str, now: DateTime<Utc>) -> Option<AirlineRecord> {
        let cache = self.cache.lock().unwrap();
        cache
            .airlines
            .get(iata)
            .filter(|a| a.is_fresh(self.ttl_days, now))
            .cloned()
    }

    async fn write_through(&self, apply: impl FnOnce(&mut DirectoryCache)) {
        let snapshot = {
            let mut cache = self.cache.lock().unwrap();
            apply(&mut cache);
            cache.clone()
        };
        if let Err(e) = self.store.save_directory(snapshot).await {
            warn!(error = %e, "Directory cache persist failed");
        }
    }

    /// Resolve an airport. Never errors; a total miss yields a record
    /// carrying only the code.
    pub async fn airport(&self, iata: &str) -> AirportRecord {
        let code = iata.trim().to_uppercase();
        if code.is_empty() {
            return AirportRecord::default();
        }
        let now = Utc::now();

        if let Some(cached) = self.cached_airport(&code, now) {
            return cached;
        }

        for source in &self.sources {
            let name = source.name();
            if self.blocks.is_blocked(name) {
                continue;
            }
            match source.fetch_airport(&code).await {
                Ok(Some(fetched)) => {
                    self.blocks.record_success(name);
                    let base = dataset::static_airport(&code)
                        .unwrap_or_else(|| AirportRecord::code_only(&code));
                    let mut merged = base.merged_over(&fetched);
                    merged.fetched_at = Some(now);
                    let record = merged.clone();
                    self.write_through(move |cache| {
                        cache.airports.insert(code, merged);
                    })
                    .await;
                    return record;
                }
                Ok(None) => self.blocks.record_success(name),
                Err(e) => {
                    debug!(provider = name, iata = %code, error = %e, "Directory airport lookup failed");
                    self.blocks.record_error(name, &e);
                }
            }
        }

        if let Some(mut fallback) = dataset::static_airport(&code) {
            fallback.fetched_at = Some(now);
            let record = fallback.clone();
            self.write_through(move |cache| {
                cache.airports.insert(code, fallback);
            })
            .await;
            return record;
        }

        AirportRecord::code_only(&code)
    }

    /// Resolve an airline. The logo URL falls back to the hosted icon set
    /// when no provider supplies one.
    pub async fn airline(&self, iata: &str) -> AirlineRecord {
        let code = iata.trim().to_uppercase();
        if code.is_empty() {
            return AirlineRecord::default();
        }
        let now = Utc::now();

        if let Some(cached) = self.cached_airline(&code, now) {
            return cached;
        }

        for source in &self.sources {
            let name = source.name();
            if self.blocks.is_blocked(name) {
                continue;
            }
            match source.fetch_airline(&code).await {
                Ok(Some(mut fetched)) => {
                    self.blocks.record_success(name);
                    if fetched.logo_url.is_none() {
                        fetched.logo_url = airline_logo_url(&code);
                    }
                    fetched.fetched_at = Some(now);
                    let record = fetched.clone();
                    self.write_through(move |cache| {
                        cache.airlines.insert(code, fetched);
                    })
                    .await;
                    return record;
                }
                Ok(None) => self.blocks.record_success(name),
                Err(e) => {
                    debug!(provider = name, iata = %code, error = %e, "Directory airline lookup failed");
                    self.blocks.record_error(name, &e);
                }
            }
        }

        AirlineRecord {
            iata: code.clone(),
            name: None,
            logo_url: airline_logo_url(&code),
            fetched_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::http::tests::{json_response, MockAsyncHttpClient};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn options_with_airlabs() -> TrackerOptions {
        TrackerOptions {
            credentials: crate::config::Credentials {
                airlabs_api_key: Some("key".to_string()),
                ..Default::default()
            },
            ..TrackerOptions::default()
        }
    }

    async fn service(
        options: &TrackerOptions,
        client: MockAsyncHttpClient,
        store: Arc<MemoryStore>,
    ) -> DirectoryService<Arc<MockAsyncHttpClient>, Arc<MemoryStore>> {
        DirectoryService::new(
            options,
            Arc::new(client),
            store,
            Arc::new(ProviderBlocks::new()),
        )
        .await
    }

    #[tokio::test]
    async fn test_provider_answer_merges_over_static_and_caches() {
        let body = r#"{"response": [{
            "iata_code": "CDG",
            "name": "Charles de Gaulle",
            "country_code": "FR"
        }]}"#;
        let client = MockAsyncHttpClient::ok("{}")
            .with_rule("airlabs.co/api/v9/airports", Ok(json_response(200, body)));
        let store = Arc::new(MemoryStore::new());
        let svc = service(&options_with_airlabs(), client, Arc::clone(&store)).await;

        let airport = svc.airport("cdg").await;
        // Provider name wins, static fills city and tz.
        assert_eq!(airport.name.as_deref(), Some("Charles de Gaulle"));
        assert_eq!(airport.city.as_deref(), Some("Paris"));
        assert_eq!(airport.tz.as_deref(), Some("Europe/Paris"));
        assert!(airport.fetched_at.is_some());

        // Written through to the store.
        let persisted = store.load_directory().await.unwrap();
        assert!(persisted.airports.contains_key("CDG"));
    }

    #[tokio::test]
    async fn test_fresh_complete_cache_short_circuits() {
        let client = MockAsyncHttpClient::unavailable("must not be called");
        let store = Arc::new(MemoryStore::new());
        let mut cache = DirectoryCache::default();
        cache.airports.insert(
            "CPH".to_string(),
            AirportRecord {
                iata: "CPH".to_string(),
                name: Some("Copenhagen Airport".to_string()),
                city: Some("Copenhagen".to_string()),
                country: Some("DK".to_string()),
                tz: Some("Europe/Copenhagen".to_string()),
                fetched_at: Some(Utc::now()),
            },
        );
        store.save_directory(cache).await.unwrap();

        let svc = service(&options_with_airlabs(), client, store).await;
        let airport = svc.airport("CPH").await;
        assert_eq!(airport.city.as_deref(), Some("Copenhagen"));
    }

    #[tokio::test]
    async fn test_static_fallback_when_provider_misses() {
        let client = MockAsyncHttpClient::ok(r#"{"response": []}"#);
        let store = Arc::new(MemoryStore::new());
        let svc = service(&options_with_airlabs(), client, store).await;

        let airport = svc.airport("DXB").await;
        assert_eq!(airport.name.as_deref(), Some("Dubai International Airport"));
        assert_eq!(airport.tz.as_deref(), Some("Asia/Dubai"));
    }

    #[tokio::test]
    async fn test_total_miss_yields_code_only_record() {
        let client = MockAsyncHttpClient::ok(r#"{"response": []}"#);
        let store = Arc::new(MemoryStore::new());
        let svc = service(&options_with_airlabs(), client, store).await;

        let airport = svc.airport("ZZZ").await;
        assert_eq!(airport.iata, "ZZZ");
        assert!(airport.name.is_none());
        assert!(airport.tz.is_none());
    }

    #[tokio::test]
    async fn test_airline_logo_fallback() {
        let client = MockAsyncHttpClient::ok(r#"{"response": []}"#);
        let store = Arc::new(MemoryStore::new());
        let svc = service(&options_with_airlabs(), client, store).await;

        let airline = svc.airline("af").await;
        assert_eq!(
            airline.logo_url.as_deref(),
            Some("https://pics.avs.io/64/64/AF.png")
        );
    }

    #[test]
    fn test_tz_short_labels() {
        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(tz_short("Europe/Paris", summer).as_deref(), Some("CEST"));
        assert_eq!(tz_short("Europe/Paris", winter).as_deref(), Some("CET"));
        assert_eq!(tz_short("Asia/Kolkata", summer).as_deref(), Some("IST"));
        assert!(tz_short("Not/AZone", summer).is_none());
    }

    #[test]
    fn test_logo_url_helper() {
        assert_eq!(
            airline_logo_url(" sk ").as_deref(),
            Some("https://pics.avs.io/64/64/SK.png")
        );
        assert!(airline_logo_url("  ").is_none());
    }
}
