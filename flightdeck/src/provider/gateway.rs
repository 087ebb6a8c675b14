//! Provider gateway: preference order, fallbacks, blocks, and timeouts.
//!
//! The gateway is the only component that talks to concrete providers. It
//! consults the block table before every call, translates limit errors into
//! blocks, and bounds every fetch with a timeout so a stuck provider can
//! never stall a refresh cycle.

use super::airlabs::AirLabsProvider;
use super::aviationstack::AviationstackProvider;
use super::blocks::{BlockStatus, ProviderBlocks};
use super::flightradar24::Flightradar24Provider;
use super::http::AsyncHttpClient;
use super::mock::MockProvider;
use super::types::{
    FlightQuery, ProviderError, RawPosition, RawStatusPayload, RouteCandidate, ScheduleOutcome,
    StatusProvider,
};
use crate::config::{PositionChoice, ProviderChoice, TrackerOptions};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced to the service layer.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No provider is configured for the requested operation.
    #[error("no provider configured")]
    NoProvider,
    /// Every eligible provider failed; carries the last failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Enum dispatch over the concrete providers.
///
/// The provider trait uses native async methods and is not object-safe, so
/// the gateway dispatches through this enum instead of trait objects.
pub enum ProviderKind<C> {
    AirLabs(AirLabsProvider<C>),
    Aviationstack(AviationstackProvider<C>),
    Flightradar24(Flightradar24Provider<C>),
    Mock(MockProvider),
}

impl<C: AsyncHttpClient> ProviderKind<C> {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::AirLabs(p) => p.name(),
            ProviderKind::Aviationstack(p) => p.name(),
            ProviderKind::Flightradar24(p) => p.name(),
            ProviderKind::Mock(p) => p.name(),
        }
    }

    async fn fetch_status(
        &self,
        query: &FlightQuery,
    ) -> Result<Option<RawStatusPayload>, ProviderError> {
        match self {
            ProviderKind::AirLabs(p) => p.fetch_status(query).await,
            ProviderKind::Aviationstack(p) => p.fetch_status(query).await,
            ProviderKind::Flightradar24(p) => p.fetch_status(query).await,
            ProviderKind::Mock(p) => p.fetch_status(query).await,
        }
    }

    async fn fetch_schedule(
        &self,
        query: &FlightQuery,
    ) -> Result<Vec<RawStatusPayload>, ProviderError> {
        match self {
            ProviderKind::AirLabs(p) => p.fetch_schedule(query).await,
            ProviderKind::Aviationstack(p) => p.fetch_schedule(query).await,
            ProviderKind::Flightradar24(p) => p.fetch_schedule(query).await,
            ProviderKind::Mock(p) => p.fetch_schedule(query).await,
        }
    }
}

/// Fallback order for status fetches when the selection is `Auto`.
const STATUS_AUTO_ORDER: &[ProviderChoice] = &[
    ProviderChoice::Flightradar24,
    ProviderChoice::Aviationstack,
    ProviderChoice::AirLabs,
];

/// Fallback order for schedule lookups when the selection is `Auto`.
/// The mock fixtures sit last so real providers win when configured.
const SCHEDULE_AUTO_ORDER: &[ProviderChoice] = &[
    ProviderChoice::Aviationstack,
    ProviderChoice::AirLabs,
    ProviderChoice::Flightradar24,
    ProviderChoice::Mock,
];

/// Facade over the configured providers.
pub struct ProviderGateway<C> {
    status_providers: Vec<ProviderKind<C>>,
    schedule_providers: Vec<ProviderKind<C>>,
    position_providers: Vec<ProviderKind<C>>,
    blocks: Arc<ProviderBlocks>,
    timeout: Duration,
}

impl<C: AsyncHttpClient + Clone> ProviderGateway<C> {
    /// Wire the gateway from options: one provider list per operation,
    /// restricted to providers with usable credentials.
    pub fn from_options(options: &TrackerOptions, client: C, blocks: Arc<ProviderBlocks>) -> Self {
        let status_providers = build_order(options, &client, options.status_provider, STATUS_AUTO_ORDER);
        let schedule_providers =
            build_order(options, &client, options.schedule_provider, SCHEDULE_AUTO_ORDER);
        let position_providers = match options.position_provider {
            // Same-as-status positions ride on the status payload itself.
            PositionChoice::SameAsStatus | PositionChoice::Disabled => Vec::new(),
            PositionChoice::Provider(choice) => {
                build_order(options, &client, choice, STATUS_AUTO_ORDER)
            }
        };

        info!(
            status = ?status_providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            schedule = ?schedule_providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "Provider gateway configured"
        );

        Self {
            status_providers,
            schedule_providers,
            position_providers,
            blocks,
            timeout: Duration::from_secs(options.request_timeout_secs),
        }
    }

    pub fn has_schedule_provider(&self) -> bool {
        !self.schedule_providers.is_empty()
    }

    pub fn has_status_provider(&self) -> bool {
        !self.status_providers.is_empty()
    }

    /// Active provider blocks, for diagnostics.
    pub fn block_snapshot(&self) -> Vec<BlockStatus> {
        self.blocks.snapshot()
    }

    async fn call_one(
        &self,
        provider: &ProviderKind<C>,
        query: &FlightQuery,
    ) -> Result<Option<RawStatusPayload>, ProviderError> {
        match tokio::time::timeout(self.timeout, provider.fetch_status(query)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Unavailable(format!(
                "{} timed out after {:?}",
                provider.name(),
                self.timeout
            ))),
        }
    }

    /// Fetch the current status, trying providers in preference order.
    ///
    /// Blocked providers are skipped. Limit errors block the provider and
    /// fall through to the next one. `Ok(None)` means every eligible
    /// provider answered without a row.
    pub async fn fetch_status(
        &self,
        query: &FlightQuery,
    ) -> Result<Option<RawStatusPayload>, GatewayError> {
        if self.status_providers.is_empty() {
            return Err(GatewayError::NoProvider);
        }

        let mut last_error: Option<ProviderError> = None;
        for provider in &self.status_providers {
            let name = provider.name();
            if self.blocks.is_blocked(name) {
                debug!(provider = name, "Skipping blocked provider");
                continue;
            }
            match self.call_one(provider, query).await {
                Ok(Some(payload)) => {
                    self.blocks.record_success(name);
                    return Ok(Some(payload));
                }
                Ok(None) => {
                    self.blocks.record_success(name);
                    debug!(provider = name, flight = %query.flight_iata(), "No status row");
                }
                Err(e) => {
                    warn!(provider = name, error = %e, "Status fetch failed");
                    self.blocks.record_error(name, &e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(GatewayError::Provider(e)),
            None => Ok(None),
        }
    }

    /// Look up the schedule for airline + number + date.
    pub async fn lookup_schedule(
        &self,
        query: &FlightQuery,
    ) -> Result<ScheduleOutcome, GatewayError> {
        if self.schedule_providers.is_empty() {
            return Err(GatewayError::NoProvider);
        }

        let mut last_error: Option<ProviderError> = None;
        for provider in &self.schedule_providers {
            let name = provider.name();
            if self.blocks.is_blocked(name) {
                debug!(provider = name, "Skipping blocked provider");
                continue;
            }
            let rows = match tokio::time::timeout(self.timeout, provider.fetch_schedule(query))
                .await
            {
                Ok(Ok(rows)) => {
                    self.blocks.record_success(name);
                    rows
                }
                Ok(Err(e)) => {
                    warn!(provider = name, error = %e, "Schedule lookup failed");
                    self.blocks.record_error(name, &e);
                    last_error = Some(e);
                    continue;
                }
                Err(_) => {
                    let e = ProviderError::Unavailable(format!("{} timed out", name));
                    self.blocks.record_error(name, &e);
                    last_error = Some(e);
                    continue;
                }
            };
            if rows.is_empty() {
                continue;
            }
            return Ok(resolve_rows(rows, query));
        }

        match last_error {
            Some(e) => Err(GatewayError::Provider(e)),
            None => Ok(ScheduleOutcome::NotFound),
        }
    }

    /// Fetch a live position from the dedicated position provider, when one
    /// is configured. Failures degrade to `None`; position is enrichment.
    pub async fn fetch_position(&self, query: &FlightQuery) -> Option<(String, RawPosition)> {
        for provider in &self.position_providers {
            let name = provider.name();
            if self.blocks.is_blocked(name) {
                continue;
            }
            match self.call_one(provider, query).await {
                Ok(Some(payload)) => {
                    self.blocks.record_success(name);
                    if let Some(position) = payload.position {
                        return Some((name.to_string(), position));
                    }
                }
                Ok(None) => self.blocks.record_success(name),
                Err(e) => {
                    warn!(provider = name, error = %e, "Position fetch failed");
                    self.blocks.record_error(name, &e);
                }
            }
        }
        None
    }
}

/// Turn a non-empty row set into a schedule outcome.
///
/// Route hints pick among rows directly; without hints, one distinct route
/// resolves to it and several distinct routes surface as ambiguity.
fn resolve_rows(rows: Vec<RawStatusPayload>, query: &FlightQuery) -> ScheduleOutcome {
    if let (Some(dep), Some(arr)) = (&query.dep_iata, &query.arr_iata) {
        if let Some(row) = rows
            .iter()
            .find(|r| r.dep_iata.as_deref() == Some(dep) && r.arr_iata.as_deref() == Some(arr))
        {
            return ScheduleOutcome::Found(row.clone());
        }
    }

    let mut candidates: Vec<RouteCandidate> = Vec::new();
    for row in &rows {
        let candidate = RouteCandidate {
            dep_iata: row.dep_iata.clone(),
            arr_iata: row.arr_iata.clone(),
        };
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    if candidates.len() <= 1 {
        ScheduleOutcome::Found(rows.into_iter().next().unwrap_or_default())
    } else {
        ScheduleOutcome::Ambiguous { candidates }
    }
}

/// Provider list for one operation, in preference order.
fn build_order<C: AsyncHttpClient + Clone>(
    options: &TrackerOptions,
    client: &C,
    choice: ProviderChoice,
    auto_order: &[ProviderChoice],
) -> Vec<ProviderKind<C>> {
    let order: Vec<ProviderChoice> = match choice {
        ProviderChoice::Auto => auto_order.to_vec(),
        explicit => vec![explicit],
    };

    let creds = &options.credentials;
    let mut providers = Vec::new();
    for choice in order {
        match choice {
            ProviderChoice::AirLabs => {
                if let Some(key) = creds.airlabs() {
                    providers.push(ProviderKind::AirLabs(AirLabsProvider::new(
                        client.clone(),
                        key,
                    )));
                }
            }
            ProviderChoice::Aviationstack => {
                if let Some(key) = creds.aviationstack() {
                    providers.push(ProviderKind::Aviationstack(AviationstackProvider::new(
                        client.clone(),
                        key,
                    )));
                }
            }
            ProviderChoice::Flightradar24 => {
                if let Some(key) = creds.fr24_active() {
                    providers.push(ProviderKind::Flightradar24(Flightradar24Provider::new(
                        client.clone(),
                        key,
                        creds.fr24_use_sandbox,
                        creds.fr24_version(),
                    )));
                }
            }
            ProviderChoice::Mock => providers.push(ProviderKind::Mock(MockProvider::bundled())),
            ProviderChoice::Auto => {}
        }
    }
    providers
}
