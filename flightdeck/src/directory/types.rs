//! Directory record types and the cached form they persist in.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Airport directory entry. Partial records are allowed; completeness is
/// checked before a cached entry short-circuits a provider lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AirportRecord {
    pub iata: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// IANA zone name, e.g. `Europe/Paris`.
    pub tz: Option<String>,
    /// When this entry was fetched from a provider; `None` for static or
    /// code-only records, which never count as fresh.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl AirportRecord {
    /// A record carrying nothing but the code, for total directory misses.
    pub fn code_only(iata: &str) -> Self {
        Self {
            iata: iata.trim().to_uppercase(),
            ..Self::default()
        }
    }

    /// Complete enough to satisfy a lookup without consulting providers.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.city.is_some() && self.tz.is_some()
    }

    pub fn is_fresh(&self, ttl_days: i64, now: DateTime<Utc>) -> bool {
        match self.fetched_at {
            Some(fetched) => now - fetched <= Duration::days(ttl_days),
            None => false,
        }
    }

    /// Overlay `other` onto `self`, keeping existing values where the other
    /// side is null. Used to merge provider answers over static fallbacks.
    pub fn merged_over(mut self, other: &AirportRecord) -> Self {
        if let Some(name) = &other.name {
            self.name = Some(name.clone());
        }
        if let Some(city) = &other.city {
            self.city = Some(city.clone());
        }
        if let Some(country) = &other.country {
            self.country = Some(country.clone());
        }
        if let Some(tz) = &other.tz {
            self.tz = Some(tz.clone());
        }
        self
    }
}

/// Airline directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AirlineRecord {
    pub iata: String,
    pub name: Option<String>,
    pub logo_url: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl AirlineRecord {
    pub fn is_fresh(&self, ttl_days: i64, now: DateTime<Utc>) -> bool {
        match self.fetched_at {
            Some(fetched) => now - fetched <= Duration::days(ttl_days),
            None => false,
        }
    }
}

/// The persisted directory cache: both tables keyed by upper-case IATA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DirectoryCache {
    pub airports: HashMap<String, AirportRecord>,
    pub airlines: HashMap<String, AirlineRecord>,
}
