//! Tracker configuration.
//!
//! All recognized options with their defaults. Schedule, status and position
//! providers are independently selectable; credentials are carried per
//! provider so an instance can mix sources.

use serde::{Deserialize, Serialize};

/// Selectable external data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderChoice {
    /// Try configured providers in priority order.
    #[default]
    Auto,
    AirLabs,
    Aviationstack,
    Flightradar24,
    /// Canned fixtures, for tests and demos.
    Mock,
}

impl ProviderChoice {
    /// Canonical provider name used in blocks, logs and raw snapshots.
    pub fn name(self) -> &'static str {
        match self {
            ProviderChoice::Auto => "auto",
            ProviderChoice::AirLabs => "airlabs",
            ProviderChoice::Aviationstack => "aviationstack",
            ProviderChoice::Flightradar24 => "flightradar24",
            ProviderChoice::Mock => "mock",
        }
    }
}

/// Position source selection. Position data rides on status payloads, so it
/// can either reuse the status provider's answer or poll a different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionChoice {
    #[default]
    SameAsStatus,
    Provider(ProviderChoice),
    Disabled,
}

/// Per-provider credentials. Empty strings are treated as unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Credentials {
    pub airlabs_api_key: Option<String>,
    pub aviationstack_access_key: Option<String>,
    pub fr24_api_key: Option<String>,
    pub fr24_sandbox_key: Option<String>,
    pub fr24_use_sandbox: bool,
    /// FR24 `Accept-Version` header value.
    pub fr24_api_version: Option<String>,
}

impl Credentials {
    fn cleaned(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn airlabs(&self) -> Option<&str> {
        Self::cleaned(&self.airlabs_api_key)
    }

    pub fn aviationstack(&self) -> Option<&str> {
        Self::cleaned(&self.aviationstack_access_key)
    }

    /// The active FR24 key: the sandbox key when sandbox mode is enabled and
    /// one is configured, otherwise the production key.
    pub fn fr24_active(&self) -> Option<&str> {
        if self.fr24_use_sandbox {
            if let Some(key) = Self::cleaned(&self.fr24_sandbox_key) {
                return Some(key);
            }
        }
        Self::cleaned(&self.fr24_api_key)
    }

    pub fn fr24_version(&self) -> &str {
        Self::cleaned(&self.fr24_api_version).unwrap_or("v1")
    }
}

/// Recognized tracker options with their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerOptions {
    pub schedule_provider: ProviderChoice,
    pub status_provider: ProviderChoice,
    pub position_provider: PositionChoice,
    pub credentials: Credentials,
    /// Directory cache freshness window, in days.
    pub cache_ttl_days: i64,
    /// Late arrivals/departures under this many minutes are still on-time.
    pub delay_grace_minutes: i64,
    /// Scheduled departures within this window are treated as the same
    /// flight by the dedup engine.
    pub merge_tolerance_hours: i64,
    /// Landed/cancelled records older than this are auto-pruned. Floor 1.
    pub auto_remove_hours: i64,
    /// Per-call timeout for provider fetches, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            schedule_provider: ProviderChoice::Auto,
            status_provider: ProviderChoice::Auto,
            position_provider: PositionChoice::SameAsStatus,
            credentials: Credentials::default(),
            cache_ttl_days: 180,
            delay_grace_minutes: 10,
            merge_tolerance_hours: 6,
            auto_remove_hours: 24,
            request_timeout_secs: 25,
        }
    }
}

impl TrackerOptions {
    /// Auto-remove cutoff with the 1 hour floor applied, so an
    /// assumed-arrival flight is never pruned prematurely.
    pub fn effective_auto_remove_hours(&self) -> i64 {
        self.auto_remove_hours.max(1)
    }
}
