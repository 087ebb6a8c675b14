//! Canonical data model for tracked flights.
//!
//! Every timestamp stored on a [`FlightRecord`] is canonical UTC. Airport-local
//! variants are derived strings, computed only when the relevant airport
//! timezone is known. Records are mutated exclusively through the merge
//! engine so that status transitions stay monotone.

mod key;

pub use key::FlightKey;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical flight lifecycle state.
///
/// Transitions are monotone under the ordering
/// `Scheduled < EnRoute < {Arrived, Cancelled, Diverted}` unless an explicit
/// manual reset occurs. `Unknown` ranks below everything and never displaces
/// a meaningful state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StatusState {
    Scheduled,
    EnRoute,
    Arrived,
    Cancelled,
    Diverted,
    #[default]
    Unknown,
}

impl StatusState {
    /// Monotone ordering rank. Higher ranks never regress to lower ones
    /// through automatic merges.
    pub fn rank(self) -> u8 {
        match self {
            StatusState::Unknown => 0,
            StatusState::Scheduled => 1,
            StatusState::EnRoute => 2,
            StatusState::Arrived | StatusState::Cancelled | StatusState::Diverted => 3,
        }
    }

    /// Whether the flight has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    /// Display string matching the canonical UI vocabulary.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusState::Scheduled => "Scheduled",
            StatusState::EnRoute => "En Route",
            StatusState::Arrived => "Arrived",
            StatusState::Cancelled => "Cancelled",
            StatusState::Diverted => "Diverted",
            StatusState::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for StatusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived delay classification, recomputed after every merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DelayStatus {
    OnTime,
    Delayed,
    Cancelled,
    #[default]
    Unknown,
}

/// Where a record originated. Manual core fields (travellers, notes) are
/// never overwritten by provider merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Manual,
    Provider,
}

/// Airport identity attached to a leg. Fields may be unresolved; the
/// directory cache fills them in as lookups succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AirportRef {
    pub iata: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    /// IANA timezone name, e.g. `Europe/Paris`.
    pub tz: Option<String>,
    /// Short timezone label at the relevant time, e.g. `CEST`.
    pub tz_short: Option<String>,
}

impl AirportRef {
    /// An airport reference carrying only the IATA code.
    pub fn from_iata(iata: impl Into<String>) -> Self {
        Self {
            iata: Some(iata.into().trim().to_uppercase()),
            ..Self::default()
        }
    }
}

/// One side of a flight: departure or arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Leg {
    pub airport: AirportRef,
    /// Canonical UTC timestamps.
    pub scheduled: Option<DateTime<Utc>>,
    pub estimated: Option<DateTime<Utc>>,
    pub actual: Option<DateTime<Utc>>,
    /// Airport-local renderings of the UTC timestamps, RFC 3339 with offset.
    pub scheduled_local: Option<String>,
    pub estimated_local: Option<String>,
    pub actual_local: Option<String>,
    pub terminal: Option<String>,
    pub gate: Option<String>,
}

impl Leg {
    /// Freshest known time: actual, else estimated, else scheduled.
    pub fn best_known(&self) -> Option<DateTime<Utc>> {
        self.actual.or(self.estimated).or(self.scheduled)
    }

    /// Actual if present, else estimated. Used by delay computation.
    pub fn actual_or_estimated(&self) -> Option<DateTime<Utc>> {
        self.actual.or(self.estimated)
    }
}

/// Live position snapshot, when a position provider supplies one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: Option<f64>,
    pub speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub provider: String,
}

/// Verbatim provider snapshot kept for diagnostics.
///
/// Never used for display logic directly; the normalizer is the only
/// component that interprets provider vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawStatus {
    pub provider: String,
    /// The provider's original state string, untranslated.
    pub state: Option<String>,
    pub dep_scheduled: Option<String>,
    pub dep_estimated: Option<String>,
    pub dep_actual: Option<String>,
    pub arr_scheduled: Option<String>,
    pub arr_estimated: Option<String>,
    pub arr_actual: Option<String>,
}

/// The single normalized representation of a flight after merging all
/// sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_key: FlightKey,
    pub source: Source,
    pub airline_code: String,
    pub flight_number: String,
    pub airline_name: Option<String>,
    pub airline_logo_url: Option<String>,
    pub aircraft_type: Option<String>,
    /// Manual-editable: never touched by provider merges.
    pub travellers: Vec<String>,
    /// Manual-editable: never touched by provider merges.
    pub notes: Option<String>,
    pub status_state: StatusState,
    pub dep: Leg,
    pub arr: Leg,
    pub delay_status: DelayStatus,
    pub delay_minutes: Option<i64>,
    pub duration_scheduled_minutes: Option<i64>,
    pub duration_estimated_minutes: Option<i64>,
    pub duration_actual_minutes: Option<i64>,
    /// Best available duration: actual, else estimated, else scheduled.
    pub duration_minutes: Option<i64>,
    /// UTC timestamp of the last status merge that changed the record.
    pub status_updated_at: Option<DateTime<Utc>>,
    pub raw_status: Option<RawStatus>,
    pub position: Option<Position>,
    /// Set when the flight was diverted and the provider arrival airport
    /// differs from the planned one.
    pub diverted_to: Option<AirportRef>,
    /// Warning flag: the scheduler forced `Arrived` because no provider
    /// update was received past the expected arrival time.
    pub assumed_arrival: bool,
}

impl FlightRecord {
    /// Create a minimal record for the given identity. Everything else
    /// starts unresolved.
    pub fn new(flight_key: FlightKey, airline_code: &str, flight_number: &str) -> Self {
        Self {
            flight_key,
            source: Source::Manual,
            airline_code: airline_code.trim().to_uppercase(),
            flight_number: flight_number.trim().to_string(),
            airline_name: None,
            airline_logo_url: None,
            aircraft_type: None,
            travellers: Vec::new(),
            notes: None,
            status_state: StatusState::Unknown,
            dep: Leg::default(),
            arr: Leg::default(),
            delay_status: DelayStatus::Unknown,
            delay_minutes: None,
            duration_scheduled_minutes: None,
            duration_estimated_minutes: None,
            duration_actual_minutes: None,
            duration_minutes: None,
            status_updated_at: None,
            raw_status: None,
            position: None,
            diverted_to: None,
            assumed_arrival: false,
        }
    }
}

/// Input echoed back on a preview so the UI can re-render the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PreviewInput {
    pub airline: String,
    pub flight_number: String,
    pub date: String,
    pub travellers: Vec<String>,
    pub notes: Option<String>,
}

/// A read-only lookup result awaiting confirmation.
///
/// Stored as a single "current preview" slot; `confirm_add` persists the
/// contained flight as a canonical manual record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Preview {
    pub ready: bool,
    pub error: Option<String>,
    pub hint: Option<String>,
    pub warning: Option<String>,
    pub input: PreviewInput,
    pub flight: Option<FlightRecord>,
}
