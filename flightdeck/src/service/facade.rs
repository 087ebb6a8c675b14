//! FlightDeck service facade implementation.

use super::error::ServiceError;
use super::query::{normalize_travellers, parse_query};
use crate::config::TrackerOptions;
use crate::directory::{airline_logo_url, tz_short, DirectoryService};
use crate::merge::{apply_status, compute_delay, compute_durations};
use crate::model::{FlightKey, FlightRecord, Leg, Preview, PreviewInput, Source};
use crate::normalize::{normalize, refresh_local_strings};
use crate::provider::blocks::{BlockStatus, ProviderBlocks};
use crate::provider::gateway::ProviderGateway;
use crate::provider::http::AsyncHttpClient;
use crate::provider::types::{FlightQuery, RawStatusPayload, RouteCandidate, ScheduleOutcome};
use crate::scheduler::{RefreshScheduler, TickOutcome};
use crate::store::Store;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Caller inputs for preview and add operations.
///
/// Either `query` or `airline` + `flight_number` identifies the flight;
/// explicit fields win over the parsed query.
#[derive(Debug, Clone, Default)]
pub struct FlightRequest {
    pub query: Option<String>,
    pub airline: Option<String>,
    pub flight_number: Option<String>,
    /// Departure date `YYYY-MM-DD`.
    pub date: String,
    /// Departure airport hint, used to disambiguate multi-route flights.
    pub dep_iata: Option<String>,
    pub travellers: Vec<String>,
    pub notes: Option<String>,
}

impl FlightRequest {
    pub fn from_query(query: &str, date: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            date: date.to_string(),
            ..Self::default()
        }
    }
}

/// High-level facade wiring the gateway, directory, scheduler, and store.
///
/// All tracked state lives in the store; the facade never caches flight
/// records itself, so concurrent callers observe a single source of truth.
pub struct FlightDeckService<C, S> {
    options: TrackerOptions,
    gateway: Arc<ProviderGateway<C>>,
    directory: Arc<DirectoryService<C, S>>,
    scheduler: RefreshScheduler<C, S>,
    store: S,
    /// Shared with the scheduler; every load-modify-save of the flight
    /// list happens under it so overlapping writers cannot lose updates.
    flights_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<C: AsyncHttpClient + Clone, S: Store + Clone> FlightDeckService<C, S> {
    /// Create a service from configuration, wiring all components.
    pub async fn new(options: TrackerOptions, client: C, store: S) -> Self {
        let blocks = Arc::new(ProviderBlocks::new());
        let gateway = Arc::new(ProviderGateway::from_options(
            &options,
            client.clone(),
            Arc::clone(&blocks),
        ));
        let directory = Arc::new(
            DirectoryService::new(&options, client, store.clone(), Arc::clone(&blocks)).await,
        );
        let scheduler = RefreshScheduler::new(
            &options,
            Arc::clone(&gateway),
            Arc::clone(&directory),
            store.clone(),
        );
        let flights_lock = scheduler.flights_lock();
        Self {
            options,
            gateway,
            directory,
            scheduler,
            store,
            flights_lock,
        }
    }

    fn resolve_designator(request: &FlightRequest) -> Option<(String, String)> {
        let airline = request
            .airline
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        let number = request
            .flight_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let (Some(airline), Some(number)) = (airline.clone(), number.clone()) {
            return Some((airline, number));
        }
        let parsed = request.query.as_deref().and_then(parse_query);
        let (q_airline, q_number) = parsed?;
        Some((airline.unwrap_or(q_airline), number.unwrap_or(q_number)))
    }

    fn schedule_query(&self, airline: &str, number: &str, request: &FlightRequest) -> FlightQuery {
        let mut query = FlightQuery::new(airline, number);
        query.date = Some(request.date.clone());
        query.dep_iata = request
            .dep_iata
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        query
    }

    async fn enrich_leg(&self, leg: &mut Leg) {
        let Some(iata) = leg.airport.iata.clone() else {
            return;
        };
        if leg.airport.name.is_none() || leg.airport.city.is_none() || leg.airport.tz.is_none() {
            let info = self.directory.airport(&iata).await;
            leg.airport.name = leg.airport.name.take().or(info.name);
            leg.airport.city = leg.airport.city.take().or(info.city);
            leg.airport.tz = leg.airport.tz.take().or(info.tz);
        }
        if leg.airport.tz_short.is_none() {
            if let Some(tz) = leg.airport.tz.as_deref() {
                let at = leg.scheduled.unwrap_or_else(Utc::now);
                leg.airport.tz_short = tz_short(tz, at);
            }
        }
        refresh_local_strings(leg);
    }

    /// Fill airport and airline details the schedule payload did not carry.
    async fn enrich_record(&self, record: &mut FlightRecord) {
        self.enrich_leg(&mut record.dep).await;
        self.enrich_leg(&mut record.arr).await;

        if record.airline_name.is_none() {
            let airline = self.directory.airline(&record.airline_code).await;
            record.airline_name = airline.name;
            if record.airline_logo_url.is_none() {
                record.airline_logo_url = airline.logo_url;
            }
        }
        if record.airline_logo_url.is_none() {
            record.airline_logo_url = airline_logo_url(&record.airline_code);
        }
    }

    /// Build a full record from a schedule payload.
    async fn record_from_schedule(
        &self,
        airline: &str,
        number: &str,
        request: &FlightRequest,
        payload: RawStatusPayload,
    ) -> FlightRecord {
        let dep_iata = payload
            .dep_iata
            .clone()
            .or_else(|| request.dep_iata.clone());
        let key = FlightKey::build(airline, number, dep_iata.as_deref(), &request.date);
        let mut record = FlightRecord::new(key, airline, number);
        record.source = Source::Manual;
        record.travellers = normalize_travellers(&request.travellers);
        record.notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let dep_hint = match payload.dep_iata.as_deref() {
            Some(iata) => self.directory.airport(iata).await.tz,
            None => None,
        };
        let arr_hint = match payload.arr_iata.as_deref() {
            Some(iata) => self.directory.airport(iata).await.tz,
            None => None,
        };
        let status = normalize(&payload, dep_hint.as_deref(), arr_hint.as_deref());
        apply_status(
            &mut record,
            &status,
            self.options.delay_grace_minutes,
            Utc::now(),
        );
        self.enrich_record(&mut record).await;
        record
    }

    /// Minimum fields a preview needs before it can be confirmed.
    fn preview_complete(record: &FlightRecord) -> Result<(), String> {
        let dep_iata = record.dep.airport.iata.as_deref();
        let arr_iata = record.arr.airport.iata.as_deref();
        if dep_iata.is_none() || arr_iata.is_none() {
            return Err(
                "Missing departure/arrival airport. Try another provider or verify the date."
                    .to_string(),
            );
        }
        if record.dep.scheduled.is_none() || record.arr.scheduled.is_none() {
            return Err(
                "Missing scheduled departure/arrival time. Try another provider or verify the date."
                    .to_string(),
            );
        }
        // Name or city plus zone per side; a missing city alone is only a warning.
        let dep_air = &record.dep.airport;
        if (dep_air.name.is_none() && dep_air.city.is_none()) || dep_air.tz.is_none() {
            return Err(format!(
                "Missing departure airport details for {}. Check directory provider keys.",
                dep_iata.unwrap_or("?")
            ));
        }
        let arr_air = &record.arr.airport;
        if (arr_air.name.is_none() && arr_air.city.is_none()) || arr_air.tz.is_none() {
            return Err(format!(
                "Missing arrival airport details for {}. Check directory provider keys.",
                arr_iata.unwrap_or("?")
            ));
        }
        Ok(())
    }

    fn preview_warnings(record: &mut FlightRecord) -> Option<String> {
        let mut warnings: Vec<String> = Vec::new();
        if record.airline_logo_url.is_none() {
            record.airline_logo_url = airline_logo_url(&record.airline_code);
        }
        if record.airline_logo_url.is_none() {
            warnings.push("Airline logo not available.".to_string());
        }
        let mut missing_city = Vec::new();
        for airport in [&record.dep.airport, &record.arr.airport] {
            if let Some(iata) = airport.iata.as_deref() {
                if airport.city.is_none() {
                    missing_city.push(iata.to_string());
                }
            }
        }
        if !missing_city.is_empty() {
            warnings.push(format!("Airport city missing for: {}", missing_city.join(", ")));
        }
        if warnings.is_empty() {
            None
        } else {
            Some(warnings.join(" "))
        }
    }

    fn ambiguous_hint(candidates: &[RouteCandidate]) -> String {
        let routes: Vec<String> = candidates
            .iter()
            .map(|c| {
                format!(
                    "{}-{}",
                    c.dep_iata.as_deref().unwrap_or("?"),
                    c.arr_iata.as_deref().unwrap_or("?")
                )
            })
            .collect();
        format!(
            "Multiple routes match; provide a departure airport. Candidates: {}",
            routes.join(", ")
        )
    }

    /// Look up a flight and store the result as the current preview.
    ///
    /// Lookup failures are never fatal: the returned preview carries an
    /// error code and a human hint instead.
    pub async fn preview_flight(&self, request: &FlightRequest) -> Result<Preview, ServiceError> {
        let travellers = normalize_travellers(&request.travellers);
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let designator = Self::resolve_designator(request);
        let date = request.date.trim().to_string();

        let mut preview = Preview {
            input: PreviewInput {
                airline: designator.as_ref().map(|d| d.0.clone()).unwrap_or_default(),
                flight_number: designator.as_ref().map(|d| d.1.clone()).unwrap_or_default(),
                date: date.clone(),
                travellers: travellers.clone(),
                notes: notes.clone(),
            },
            ..Preview::default()
        };

        if date.is_empty() {
            preview.error = Some("bad_date".to_string());
            preview.hint = Some("Provide a date in YYYY-MM-DD.".to_string());
            self.store.save_preview(Some(preview.clone())).await?;
            return Ok(preview);
        }
        let Some((airline, number)) = designator else {
            preview.error = Some("bad_query".to_string());
            preview.hint =
                Some("Provide airline + flight_number or a query like 'AI 157'.".to_string());
            self.store.save_preview(Some(preview.clone())).await?;
            return Ok(preview);
        };

        if !self.gateway.has_schedule_provider() {
            preview.error = Some("no_match_or_no_provider".to_string());
            preview.hint = Some(
                "Either no match was found for that date, or no provider API is configured/available."
                    .to_string(),
            );
            self.store.save_preview(Some(preview.clone())).await?;
            return Ok(preview);
        }

        let query = self.schedule_query(&airline, &number, request);
        match self.gateway.lookup_schedule(&query).await {
            Ok(ScheduleOutcome::Found(payload)) => {
                let mut record = self
                    .record_from_schedule(&airline, &number, request, payload)
                    .await;
                match Self::preview_complete(&record) {
                    Ok(()) => {
                        preview.ready = true;
                        preview.warning = Self::preview_warnings(&mut record);
                    }
                    Err(hint) => {
                        preview.error = Some("incomplete".to_string());
                        preview.hint = Some(hint);
                    }
                }
                preview.flight = Some(record);
            }
            Ok(ScheduleOutcome::Ambiguous { candidates }) => {
                preview.error = Some("ambiguous_route".to_string());
                preview.hint = Some(Self::ambiguous_hint(&candidates));
            }
            Ok(ScheduleOutcome::NotFound) => {
                preview.error = Some("no_match_or_no_provider".to_string());
                preview.hint = Some(
                    "Either no match was found for that date, or no provider API is configured/available."
                        .to_string(),
                );
            }
            Err(e) => {
                warn!(airline = %airline, number = %number, error = %e, "Schedule lookup failed");
                preview.error = Some("provider_error".to_string());
                preview.hint = Some(e.to_string());
            }
        }

        info!(
            airline = %preview.input.airline,
            number = %preview.input.flight_number,
            date = %preview.input.date,
            ready = preview.ready,
            "Preview updated"
        );
        self.store.save_preview(Some(preview.clone())).await?;
        Ok(preview)
    }

    /// Persist the current ready preview as a manual flight and clear it.
    pub async fn confirm_add(&self) -> Result<FlightRecord, ServiceError> {
        let preview = self.store.load_preview().await?;
        let flight = match preview {
            Some(p) if p.ready => p.flight,
            _ => None,
        };
        let Some(record) = flight else {
            return Err(ServiceError::PreviewNotReady);
        };
        let saved = self.upsert(record).await?;
        self.store.save_preview(None).await?;
        info!(flight_key = %saved.flight_key, "Preview confirmed and saved");
        Ok(saved)
    }

    pub async fn preview(&self) -> Result<Option<Preview>, ServiceError> {
        Ok(self.store.load_preview().await?)
    }

    pub async fn clear_preview(&self) -> Result<(), ServiceError> {
        self.store.save_preview(None).await?;
        Ok(())
    }

    /// Look up and persist a flight in one step, without the preview stage.
    pub async fn add_flight(&self, request: &FlightRequest) -> Result<FlightRecord, ServiceError> {
        let date = request.date.trim();
        if date.is_empty() {
            return Err(ServiceError::BadDate);
        }
        let Some((airline, number)) = Self::resolve_designator(request) else {
            return Err(ServiceError::BadQuery);
        };

        let query = self.schedule_query(&airline, &number, request);
        let outcome = self
            .gateway
            .lookup_schedule(&query)
            .await
            .map_err(|e| ServiceError::NotFound(e.to_string()))?;
        match outcome {
            ScheduleOutcome::Found(payload) => {
                let record = self
                    .record_from_schedule(&airline, &number, request, payload)
                    .await;
                self.upsert(record).await
            }
            ScheduleOutcome::Ambiguous { candidates } => {
                Err(ServiceError::NotFound(Self::ambiguous_hint(&candidates)))
            }
            ScheduleOutcome::NotFound => Err(ServiceError::NotFound(format!(
                "no match for {} {} on {}",
                airline, number, date
            ))),
        }
    }

    /// Insert or replace a caller-supplied record, recomputing derived
    /// fields so manual edits stay consistent.
    pub async fn add_manual_flight(
        &self,
        mut record: FlightRecord,
    ) -> Result<FlightKey, ServiceError> {
        record.source = Source::Manual;
        record.travellers = normalize_travellers(&record.travellers);
        self.enrich_record(&mut record).await;
        let (delay_status, delay_minutes) = compute_delay(&record, self.options.delay_grace_minutes);
        record.delay_status = delay_status;
        record.delay_minutes = delay_minutes;
        compute_durations(&mut record);
        let saved = self.upsert(record).await?;
        Ok(saved.flight_key)
    }

    pub async fn remove_manual_flight(&self, key: &FlightKey) -> Result<bool, ServiceError> {
        let _write = self.flights_lock.lock().await;
        let mut flights = self.store.load_flights().await?;
        let before = flights.len();
        flights.retain(|f| &f.flight_key != key);
        let removed = flights.len() < before;
        if removed {
            self.store.save_flights(flights).await?;
            info!(flight_key = %key, "Flight removed");
        }
        Ok(removed)
    }

    pub async fn clear_manual_flights(&self) -> Result<usize, ServiceError> {
        let _write = self.flights_lock.lock().await;
        let flights = self.store.load_flights().await?;
        let cleared = flights.len();
        if cleared > 0 {
            self.store.save_flights(Vec::new()).await?;
            info!(cleared = cleared, "All flights cleared");
        }
        Ok(cleared)
    }

    pub async fn flights(&self) -> Result<Vec<FlightRecord>, ServiceError> {
        Ok(self.store.load_flights().await?)
    }

    /// Run one scheduler pass at the regular cadence.
    pub async fn tick(&self) -> Result<TickOutcome, ServiceError> {
        Ok(self.scheduler.tick().await?)
    }

    /// Force an immediate refresh of one flight, or all of them.
    pub async fn refresh_now(&self, key: Option<&FlightKey>) -> Result<TickOutcome, ServiceError> {
        Ok(self.scheduler.refresh_now(key).await?)
    }

    /// Remove landed and cancelled flights older than the cutoff. Defaults
    /// to the configured auto-remove window.
    pub async fn prune_landed(&self, hours: Option<i64>) -> Result<usize, ServiceError> {
        let hours = hours.unwrap_or_else(|| self.options.effective_auto_remove_hours());
        Ok(self.scheduler.prune_landed(hours).await?)
    }

    /// Active provider blocks, for diagnostics surfaces.
    pub fn provider_blocks(&self) -> Vec<BlockStatus> {
        self.gateway.block_snapshot()
    }

    fn upsert_record(flights: &mut Vec<FlightRecord>, record: FlightRecord) {
        match flights
            .iter_mut()
            .find(|f| f.flight_key == record.flight_key)
        {
            Some(existing) => *existing = record,
            None => flights.push(record),
        }
    }

    async fn upsert(&self, record: FlightRecord) -> Result<FlightRecord, ServiceError> {
        let _write = self.flights_lock.lock().await;
        let mut flights = self.store.load_flights().await?;
        Self::upsert_record(&mut flights, record.clone());
        self.store.save_flights(flights).await?;
        Ok(record)
    }
}
