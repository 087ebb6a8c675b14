//! High-level service facade.
//!
//! Wires the provider gateway, directory, scheduler, and store behind a
//! simplified API: preview/confirm flows, direct adds, manual record
//! management, and refresh control.
//!
//! # Example
//!
//! ```ignore
//! use flightdeck::config::TrackerOptions;
//! use flightdeck::provider::AsyncReqwestClient;
//! use flightdeck::service::{FlightDeckService, FlightRequest};
//! use flightdeck::store::MemoryStore;
//! use std::sync::Arc;
//!
//! let service = FlightDeckService::new(
//!     TrackerOptions::default(),
//!     AsyncReqwestClient::new()?,
//!     Arc::new(MemoryStore::new()),
//! ).await;
//!
//! let preview = service
//!     .preview_flight(&FlightRequest::from_query("AI 157", "2024-05-01"))
//!     .await?;
//! if preview.ready {
//!     service.confirm_add().await?;
//! }
//! ```

mod error;
mod facade;
mod query;

pub use error::ServiceError;
pub use facade::{FlightDeckService, FlightRequest};
pub use query::{normalize_travellers, parse_query};
