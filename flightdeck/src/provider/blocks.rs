//! Per-provider block bookkeeping.
//!
//! A block marks a provider as off-limits until a deadline. Blocks are
//! created when a provider reports a rate-limit or quota condition, or when
//! transient failures pile up fast enough to suggest an outage. Expiry is
//! lazy: a block simply stops matching once its deadline passes.

use super::types::ProviderError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

/// Fallback block length when a rate-limited provider gave no `Retry-After`.
pub const DEFAULT_RATE_LIMIT_BLOCK_SECS: u64 = 900;

/// Fallback block length for exhausted quotas (one billing day).
pub const DEFAULT_QUOTA_BLOCK_SECS: u64 = 24 * 60 * 60;

/// Transient failures within [`FAILURE_WINDOW_SECS`] needed to trip a block.
const FAILURE_STREAK_THRESHOLD: u32 = 3;
const FAILURE_WINDOW_SECS: i64 = 120;
const FAILURE_BLOCK_SECS: u64 = 300;

/// Diagnostic view of one active block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStatus {
    pub provider: String,
    pub remaining_secs: u64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
struct BlockEntry {
    until: DateTime<Utc>,
    reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct FailureStreak {
    count: u32,
    first: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct BlocksInner {
    blocks: HashMap<String, BlockEntry>,
    streaks: HashMap<String, FailureStreak>,
}

/// Shared block table, safe to consult from concurrent refreshes.
#[derive(Debug, Default)]
pub struct ProviderBlocks {
    inner: Mutex<BlocksInner>,
}

impl ProviderBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `provider` is currently blocked.
    pub fn is_blocked(&self, provider: &str) -> bool {
        self.is_blocked_at(provider, Utc::now())
    }

    pub fn is_blocked_at(&self, provider: &str, now: DateTime<Utc>) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .blocks
            .get(provider)
            .map(|b| now < b.until)
            .unwrap_or(false)
    }

    /// Block `provider` for `seconds` from now.
    pub fn set_block(&self, provider: &str, seconds: u64, reason: Option<&str>) {
        self.set_block_at(provider, seconds, reason, Utc::now());
    }

    pub fn set_block_at(
        &self,
        provider: &str,
        seconds: u64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let until = now + Duration::seconds(seconds as i64);
        info!(
            provider = provider,
            seconds = seconds,
            reason = reason.unwrap_or("unspecified"),
            "Provider blocked"
        );
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.insert(
            provider.to_string(),
            BlockEntry {
                until,
                reason: reason.map(str::to_string),
            },
        );
        inner.streaks.remove(provider);
    }

    /// Translate a provider error into block bookkeeping.
    ///
    /// Limit errors block immediately, honoring the provider's retry hint.
    /// Transient errors count toward a failure streak that trips a shorter
    /// block when failures cluster.
    pub fn record_error(&self, provider: &str, error: &ProviderError) {
        self.record_error_at(provider, error, Utc::now());
    }

    pub fn record_error_at(&self, provider: &str, error: &ProviderError, now: DateTime<Utc>) {
        match error {
            ProviderError::RateLimited {
                retry_after_secs,
                reason,
            } => {
                let secs = retry_after_secs.unwrap_or(DEFAULT_RATE_LIMIT_BLOCK_SECS);
                self.set_block_at(
                    provider,
                    secs,
                    Some(reason.as_deref().unwrap_or("rate_limited")),
                    now,
                );
            }
            ProviderError::QuotaExceeded { retry_after_secs } => {
                let secs = retry_after_secs.unwrap_or(DEFAULT_QUOTA_BLOCK_SECS);
                self.set_block_at(provider, secs, Some("quota_exceeded"), now);
            }
            ProviderError::Unavailable(_) => {
                let tripped = {
                    let mut inner = self.inner.lock().unwrap();
                    let streak = inner.streaks.entry(provider.to_string()).or_default();
                    match streak.first {
                        Some(first)
                            if (now - first).num_seconds() <= FAILURE_WINDOW_SECS =>
                        {
                            streak.count += 1;
                        }
                        _ => {
                            streak.first = Some(now);
                            streak.count = 1;
                        }
                    }
                    streak.count >= FAILURE_STREAK_THRESHOLD
                };
                if tripped {
                    self.set_block_at(provider, FAILURE_BLOCK_SECS, Some("failure_streak"), now);
                } else {
                    debug!(provider = provider, "Transient provider failure recorded");
                }
            }
            // Auth and request-shape errors will not heal with time.
            _ => {}
        }
    }

    /// Reset the failure streak after a successful call.
    pub fn record_success(&self, provider: &str) {
        self.inner.lock().unwrap().streaks.remove(provider);
    }

    /// Active blocks with remaining seconds, for diagnostics.
    pub fn snapshot(&self) -> Vec<BlockStatus> {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Vec<BlockStatus> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<BlockStatus> = inner
            .blocks
            .iter()
            .filter(|(_, b)| now < b.until)
            .map(|(provider, b)| BlockStatus {
                provider: provider.clone(),
                remaining_secs: (b.until - now).num_seconds().max(0) as u64,
                reason: b.reason.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.provider.cmp(&b.provider));
        out
    }
}
