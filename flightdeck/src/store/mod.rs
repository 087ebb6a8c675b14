//! Persistence abstraction.
//!
//! Three independent keys: the canonical flight list, the current preview,
//! and the directory cache. Flight-list writers serialize through the
//! scheduler's write lock; the service owns the preview slot; the
//! directory service owns its cache. [`MemoryStore`] backs tests and
//! in-process embedding.

use crate::directory::DirectoryCache;
use crate::model::{FlightRecord, Preview};
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store payload invalid: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Async persistence contract.
pub trait Store: Send + Sync {
    fn load_flights(&self) -> impl Future<Output = Result<Vec<FlightRecord>, StoreError>> + Send;

    fn save_flights(
        &self,
        flights: Vec<FlightRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_preview(&self) -> impl Future<Output = Result<Option<Preview>, StoreError>> + Send;

    fn save_preview(
        &self,
        preview: Option<Preview>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_directory(&self) -> impl Future<Output = Result<DirectoryCache, StoreError>> + Send;

    fn save_directory(
        &self,
        cache: DirectoryCache,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: Store> Store for std::sync::Arc<S> {
    async fn load_flights(&self) -> Result<Vec<FlightRecord>, StoreError> {
        self.as_ref().load_flights().await
    }

    async fn save_flights(&self, flights: Vec<FlightRecord>) -> Result<(), StoreError> {
        self.as_ref().save_flights(flights).await
    }

    async fn load_preview(&self) -> Result<Option<Preview>, StoreError> {
        self.as_ref().load_preview().await
    }

    async fn save_preview(&self, preview: Option<Preview>) -> Result<(), StoreError> {
        self.as_ref().save_preview(preview).await
    }

    async fn load_directory(&self) -> Result<DirectoryCache, StoreError> {
        self.as_ref().load_directory().await
    }

    async fn save_directory(&self, cache: DirectoryCache) -> Result<(), StoreError> {
        self.as_ref().save_directory(cache).await
    }
}

#[derive(Default)]
struct MemoryInner {
    flights: Vec<FlightRecord>,
    preview: Option<Preview>,
    directory: DirectoryCache,
}

/// In-memory store. State lives behind a mutex; nothing awaits while the
/// lock is held.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn load_flights(&self) -> Result<Vec<FlightRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().flights.clone())
    }

    async fn save_flights(&self, flights: Vec<FlightRecord>) -> Result<(), StoreError> {
        self.inner.lock().unwrap().flights = flights;
        Ok(())
    }

    async fn load_preview(&self) -> Result<Option<Preview>, StoreError> {
        Ok(self.inner.lock().unwrap().preview.clone())
    }

    async fn save_preview(&self, preview: Option<Preview>) -> Result<(), StoreError> {
        self.inner.lock().unwrap().preview = preview;
        Ok(())
    }

    async fn load_directory(&self) -> Result<DirectoryCache, StoreError> {
        Ok(self.inner.lock().unwrap().directory.clone())
    }

    async fn save_directory(&self, cache: DirectoryCache) -> Result<(), StoreError> {
        self.inner.lock().unwrap().directory = cache;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FlightKey, FlightRecord};

    #[tokio::test]
    async fn test_flights_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load_flights().await.unwrap().is_empty());

        let key = FlightKey::build("AI", "157", Some("DEL"), "2024-05-01");
        let record = FlightRecord::new(key.clone(), "AI", "157");
        store.save_flights(vec![record]).await.unwrap();

        let flights = store.load_flights().await.unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].flight_key, key);
    }

    #[tokio::test]
    async fn test_preview_slot_clears() {
        let store = MemoryStore::new();
        let key = FlightKey::build("SK", "1429", Some("CPH"), "2024-06-10");
        let record = FlightRecord::new(key, "SK", "1429");
        let preview = Preview {
            ready: true,
            flight: Some(record),
            ..Preview::default()
        };

        store.save_preview(Some(preview.clone())).await.unwrap();
        assert_eq!(store.load_preview().await.unwrap(), Some(preview));

        store.save_preview(None).await.unwrap();
        assert!(store.load_preview().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directory_is_independent_of_flights() {
        let store = MemoryStore::new();
        let mut cache = DirectoryCache::default();
        cache.airports.insert(
            "CDG".to_string(),
            crate::directory::AirportRecord::code_only("CDG"),
        );
        store.save_directory(cache.clone()).await.unwrap();

        assert_eq!(store.load_directory().await.unwrap(), cache);
        assert!(store.load_flights().await.unwrap().is_empty());
    }
}
