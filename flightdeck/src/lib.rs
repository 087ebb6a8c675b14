//! FlightDeck - flight status tracking core
//!
//! This library tracks a small set of user-registered flights and keeps a
//! normalized, continuously refreshed status record for each one while
//! rationing calls to rate-limited external data providers.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use flightdeck::config::TrackerOptions;
//! use flightdeck::provider::AsyncReqwestClient;
//! use flightdeck::service::{FlightDeckService, FlightRequest};
//! use flightdeck::store::MemoryStore;
//! use std::sync::Arc;
//!
//! let options = TrackerOptions::default();
//! let client = AsyncReqwestClient::new()?;
//! let store = Arc::new(MemoryStore::new());
//! let service = FlightDeckService::new(options, client, store).await;
//!
//! // Look up a flight and persist it
//! let record = service
//!     .add_flight(&FlightRequest::from_query("AI 157", "2024-05-01"))
//!     .await?;
//! ```

pub mod config;
pub mod directory;
pub mod logging;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod scheduler;
pub mod service;
pub mod store;

/// Version of the FlightDeck library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
