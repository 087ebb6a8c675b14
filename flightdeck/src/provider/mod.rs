//! External flight data providers and the gateway in front of them.
//!
//! Each provider maps its wire format into [`RawStatusPayload`]; the
//! [`gateway::ProviderGateway`] owns preference order, fallbacks, timeouts,
//! and limit blocks. Nothing outside this module talks to a provider
//! directly.

pub mod airlabs;
pub mod aviationstack;
pub mod blocks;
pub mod flightradar24;
pub mod gateway;
pub mod http;
pub(crate) mod json;
pub mod mapping;
pub mod mock;
pub mod types;

pub use blocks::{BlockStatus, ProviderBlocks};
pub use gateway::{GatewayError, ProviderGateway, ProviderKind};
pub use http::{AsyncHttpClient, AsyncReqwestClient, HttpResponse};
pub use mapping::map_state;
pub use types::{
    FlightQuery, ProviderError, RawPosition, RawStatusPayload, RouteCandidate, ScheduleOutcome,
    StatusProvider,
};
