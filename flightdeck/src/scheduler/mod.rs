//! Refresh scheduler.
//!
//! Owns the polling cadence per flight and fans out due fetches
//! concurrently. Every rewrite of the stored flight list happens under a
//! shared write lock (see [`RefreshScheduler::flights_lock`]), and per-key
//! in-progress markers keep a forced refresh from double-submitting a
//! flight that a tick is already fetching.

pub mod phase;

pub use phase::{phase_and_interval, Phase};

use crate::directory::DirectoryService;
use crate::merge::{apply_status, compute_delay, compute_durations, dedup};
use crate::model::{FlightKey, FlightRecord, Position, StatusState};
use crate::normalize::{normalize, position_from_raw, NormalizedStatus};
use crate::provider::gateway::ProviderGateway;
use crate::provider::http::AsyncHttpClient;
use crate::provider::types::FlightQuery;
use crate::store::{Store, StoreError};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Grace period past the best known arrival before a silent flight is
/// assumed to have arrived.
const ASSUMED_ARRIVAL_GRACE_MINUTES: i64 = 15;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one scheduler pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// Flights fetched this pass.
    pub refreshed: usize,
    /// Flights whose record changed.
    pub changed: usize,
    /// Terminal flights auto-pruned.
    pub pruned: usize,
    /// Earliest pending per-flight check, for driving the next tick.
    pub next_wakeup: Option<DateTime<Utc>>,
}

pub struct RefreshScheduler<C, S> {
    gateway: Arc<ProviderGateway<C>>,
    directory: Arc<DirectoryService<C, S>>,
    store: S,
    grace_minutes: i64,
    merge_tolerance_hours: i64,
    auto_remove_hours: i64,
    in_progress: Mutex<HashSet<FlightKey>>,
    next_check: Mutex<HashMap<FlightKey, DateTime<Utc>>>,
    /// Serializes every load-modify-save of the flight list. Held across
    /// the whole pass, including fetches; see [`Self::flights_lock`].
    write_lock: Arc<AsyncMutex<()>>,
}

impl<C: AsyncHttpClient + Clone, S: Store> RefreshScheduler<C, S> {
    pub fn new(
        options: &crate::config::TrackerOptions,
        gateway: Arc<ProviderGateway<C>>,
        directory: Arc<DirectoryService<C, S>>,
        store: S,
    ) -> Self {
        Self {
            gateway,
            directory,
            store,
            grace_minutes: options.delay_grace_minutes,
            merge_tolerance_hours: options.merge_tolerance_hours,
            auto_remove_hours: options.effective_auto_remove_hours(),
            in_progress: Mutex::new(HashSet::new()),
            next_check: Mutex::new(HashMap::new()),
            write_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Lock guarding the stored flight list against lost updates.
    ///
    /// The scheduler holds it for every load-modify-save pass. Anything
    /// else that rewrites the list (manual adds, removals) must hold the
    /// same lock across its own load and save, or a concurrent pass will
    /// save a stale snapshot over it.
    pub fn flights_lock(&self) -> Arc<AsyncMutex<()>> {
        Arc::clone(&self.write_lock)
    }

    /// Periodic pass: refresh due flights, then prune and reschedule.
    pub async fn tick(&self) -> Result<TickOutcome, SchedulerError> {
        self.tick_at(Utc::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome, SchedulerError> {
        self.run(None, false, now).await
    }

    /// Force a refresh regardless of cadence; `None` refreshes everything.
    /// Blocked providers and in-progress flights are still honored.
    pub async fn refresh_now(&self, key: Option<&FlightKey>) -> Result<TickOutcome, SchedulerError> {
        self.refresh_now_at(key, Utc::now()).await
    }

    pub async fn refresh_now_at(
        &self,
        key: Option<&FlightKey>,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, SchedulerError> {
        self.run(key, true, now).await
    }

    /// Select due flights and claim their in-progress markers under one
    /// lock acquisition, so a concurrent trigger cannot select the same
    /// flight between the check and the claim.
    fn claim_due(
        &self,
        flights: &[FlightRecord],
        filter: Option<&FlightKey>,
        force: bool,
        now: DateTime<Utc>,
    ) -> Vec<FlightRecord> {
        let mut in_progress = self.in_progress.lock().unwrap();
        let next_check = self.next_check.lock().unwrap();
        let due: Vec<FlightRecord> = flights
            .iter()
            .filter(|f| {
                if let Some(filter) = filter {
                    if &f.flight_key != filter {
                        return false;
                    }
                }
                if in_progress.contains(&f.flight_key) {
                    debug!(flight_key = %f.flight_key, "Refresh already in progress, skipping");
                    return false;
                }
                if force {
                    return true;
                }
                match next_check.get(&f.flight_key) {
                    Some(t) => now >= *t,
                    // Never scheduled: fetch only if the phase table wants
                    // polling at all.
                    None => phase_and_interval(f, now).1.is_some(),
                }
            })
            .cloned()
            .collect();
        for record in &due {
            in_progress.insert(record.flight_key.clone());
        }
        due
    }

    #[cfg(test)]
    fn mark_in_progress(&self, key: &FlightKey) {
        self.in_progress.lock().unwrap().insert(key.clone());
    }

    async fn tz_hint(&self, known: &Option<String>, iata: Option<&str>) -> Option<String> {
        if let Some(tz) = known {
            return Some(tz.clone());
        }
        let iata = iata?;
        self.directory.airport(iata).await.tz
    }

    /// Fetch and normalize one flight. The second element carries a
    /// position obtained without a status answer.
    async fn refresh_one(
        &self,
        record: &FlightRecord,
    ) -> (Option<NormalizedStatus>, Option<Position>) {
        let query = FlightQuery::from_record(record);

        let payload = match self.gateway.fetch_status(&query).await {
            Ok(found) => found,
            Err(e) => {
                warn!(flight_key = %record.flight_key, error = %e, "Status refresh failed");
                None
            }
        };

        let mut normalized = match payload {
            Some(payload) => {
                let dep_tz = self
                    .tz_hint(
                        &record.dep.airport.tz,
                        payload
                            .dep_iata
                            .as_deref()
                            .or(record.dep.airport.iata.as_deref()),
                    )
                    .await;
                let arr_tz = self
                    .tz_hint(
                        &record.arr.airport.tz,
                        payload
                            .arr_iata
                            .as_deref()
                            .or(record.arr.airport.iata.as_deref()),
                    )
                    .await;
                Some(normalize(&payload, dep_tz.as_deref(), arr_tz.as_deref()))
            }
            None => None,
        };

        let mut orphan_position = None;
        let already_has_position = normalized
            .as_ref()
            .map_or(false, |n| n.position.is_some());
        if !already_has_position {
            if let Some((provider, raw)) = self.gateway.fetch_position(&query).await {
                if let Some(position) = position_from_raw(&provider, &raw) {
                    match normalized.as_mut() {
                        Some(n) => n.position = Some(position),
                        None => orphan_position = Some(position),
                    }
                }
            }
        }

        (normalized, orphan_position)
    }

    /// Force `Arrived` on flights that went silent past their arrival time.
    fn assume_arrivals(&self, flights: &mut [FlightRecord], now: DateTime<Utc>) -> usize {
        let grace = Duration::minutes(ASSUMED_ARRIVAL_GRACE_MINUTES);
        let mut assumed = 0;
        for record in flights.iter_mut() {
            if record.status_state.is_terminal() {
                continue;
            }
            let Some(arr) = record.arr.best_known() else {
                continue;
            };
            // An actively tracked flight keeps moving its arrival estimate
            // forward, so only truly silent flights land here.
            if now < arr + grace {
                continue;
            }
            info!(
                flight_key = %record.flight_key,
                arrival = %arr,
                "No update past expected arrival, assuming Arrived"
            );
            record.status_state = StatusState::Arrived;
            record.assumed_arrival = true;
            let (delay_status, delay_minutes) = compute_delay(record, self.grace_minutes);
            record.delay_status = delay_status;
            record.delay_minutes = delay_minutes;
            compute_durations(record);
            record.status_updated_at = Some(now);
            assumed += 1;
        }
        assumed
    }

    fn reschedule(&self, flights: &[FlightRecord], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut next_check = self.next_check.lock().unwrap();
        next_check.retain(|key, _| flights.iter().any(|f| &f.flight_key == key));
        for record in flights {
            match phase_and_interval(record, now).1 {
                Some(interval) => {
                    next_check.insert(record.flight_key.clone(), now + interval);
                }
                None => {
                    next_check.remove(&record.flight_key);
                }
            }
        }
        next_check.values().min().copied()
    }

    async fn run(
        &self,
        filter: Option<&FlightKey>,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, SchedulerError> {
        // A second pass started mid-flight would otherwise re-save the
        // list it loaded before this one's merge, losing the update.
        let _write = self.write_lock.lock().await;

        let mut flights = self.store.load_flights().await?;
        let due = self.claim_due(&flights, filter, force, now);

        let fetches = due.iter().map(|record| async {
            let result = self.refresh_one(record).await;
            (record.flight_key.clone(), result)
        });
        let results = join_all(fetches).await;

        {
            let mut in_progress = self.in_progress.lock().unwrap();
            for record in &due {
                in_progress.remove(&record.flight_key);
            }
        }

        let mut changed = 0;
        for (key, (normalized, orphan_position)) in results {
            let Some(record) = flights.iter_mut().find(|f| f.flight_key == key) else {
                continue;
            };
            if let Some(status) = normalized {
                if apply_status(record, &status, self.grace_minutes, now) {
                    changed += 1;
                }
            } else if let Some(position) = orphan_position {
                record.position = Some(position);
                changed += 1;
            }
        }

        changed += self.assume_arrivals(&mut flights, now);

        let merged = dedup(flights, self.merge_tolerance_hours, self.grace_minutes);
        let (kept, pruned) = prune(merged, self.auto_remove_hours, now);
        let next_wakeup = self.reschedule(&kept, now);

        self.store.save_flights(kept).await?;

        Ok(TickOutcome {
            refreshed: due.len(),
            changed,
            pruned,
            next_wakeup,
        })
    }

    /// Remove Arrived/Cancelled flights whose arrival is older than the
    /// cutoff. The 1 hour floor keeps just-assumed arrivals visible.
    pub async fn prune_landed(&self, hours: i64) -> Result<usize, SchedulerError> {
        self.prune_landed_at(hours, Utc::now()).await
    }

    pub async fn prune_landed_at(
        &self,
        hours: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, SchedulerError> {
        let _write = self.write_lock.lock().await;

        let flights = self.store.load_flights().await?;
        let (kept, removed) = prune(flights, hours, now);
        if removed > 0 {
            self.reschedule(&kept, now);
            self.store.save_flights(kept).await?;
        }
        Ok(removed)
    }
}

fn prune(flights: Vec<FlightRecord>, hours: i64, now: DateTime<Utc>) -> (Vec<FlightRecord>, usize) {
    let cutoff = now - Duration::hours(hours.max(1));
    let before = flights.len();
    let kept: Vec<FlightRecord> = flights
        .into_iter()
        .filter(|f| {
            if !f.status_state.is_terminal() || f.status_state == StatusState::Diverted {
                return true;
            }
            match f.arr.best_known() {
                Some(arr) => arr > cutoff,
                None => true,
            }
        })
        .collect();
    let removed = before - kept.len();
    if removed > 0 {
        info!(removed = removed, "Pruned landed flights");
    }
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, TrackerOptions};
    use crate::model::FlightKey;
    use crate::provider::blocks::ProviderBlocks;
    use crate::provider::http::tests::{json_response, MockAsyncHttpClient};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn options() -> TrackerOptions {
        TrackerOptions {
            credentials: Credentials {
                aviationstack_access_key: Some("key".to_string()),
                ..Credentials::default()
            },
            ..TrackerOptions::default()
        }
    }

    async fn scheduler(
        client: MockAsyncHttpClient,
        store: Arc<MemoryStore>,
    ) -> RefreshScheduler<Arc<MockAsyncHttpClient>, Arc<MemoryStore>> {
        let opts = options();
        let client = Arc::new(client);
        let blocks = Arc::new(ProviderBlocks::new());
        let gateway = Arc::new(ProviderGateway::from_options(
            &opts,
            Arc::clone(&client),
            Arc::clone(&blocks),
        ));
        let directory = Arc::new(
            DirectoryService::new(&opts, Arc::clone(&client), Arc::clone(&store), blocks).await,
        );
        RefreshScheduler::new(&opts, gateway, directory, store)
    }

    fn record(dep_h: u32) -> FlightRecord {
        let key = FlightKey::build("SK", "1429", Some("CPH"), "2024-06-10");
        let mut r = FlightRecord::new(key, "SK", "1429");
        r.dep.airport = crate::model::AirportRef::from_iata("CPH");
        r.arr.airport = crate::model::AirportRef::from_iata("AGP");
        r.dep.scheduled = Some(Utc.with_ymd_and_hms(2024, 6, 10, dep_h, 0, 0).unwrap());
        r.arr.scheduled = Some(Utc.with_ymd_and_hms(2024, 6, 10, dep_h + 4, 0, 0).unwrap());
        r.status_state = StatusState::Scheduled;
        r
    }

    const ACTIVE_BODY: &str = r#"{"data": [{
        "flight_status": "active",
        "departure": {"iata": "CPH", "scheduled": "2024-06-10T09:00:00+02:00", "actual": "2024-06-10T09:18:00+02:00", "timezone": "Europe/Copenhagen"},
        "arrival": {"iata": "AGP", "scheduled": "2024-06-10T13:05:00+02:00", "estimated": "2024-06-10T13:22:00+02:00", "timezone": "Europe/Madrid"}
    }]}"#;

    #[tokio::test]
    async fn test_tick_refreshes_due_flight_and_reschedules() {
        let store = Arc::new(MemoryStore::new());
        store.save_flights(vec![record(7)]).await.unwrap(); // 09:00 CEST
        let client =
            MockAsyncHttpClient::ok("{}").with_rule("aviationstack.com", Ok(json_response(200, ACTIVE_BODY)));
        let sched = scheduler(client, Arc::clone(&store)).await;

        // In the air at 08:00 UTC.
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let outcome = sched.tick_at(now).await.unwrap();
        assert_eq!(outcome.refreshed, 1);
        assert_eq!(outcome.changed, 1);
        // Active phase: next check in 15 minutes.
        assert_eq!(outcome.next_wakeup, Some(now + Duration::minutes(15)));

        let flights = store.load_flights().await.unwrap();
        assert_eq!(flights[0].status_state, StatusState::EnRoute);
        assert_eq!(flights[0].delay_minutes, Some(17));
    }

    #[tokio::test]
    async fn test_flight_not_due_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        store.save_flights(vec![record(7)]).await.unwrap();
        let client = MockAsyncHttpClient::unavailable("must not fetch");
        let sched = scheduler(client, Arc::clone(&store)).await;

        // 20 hours before departure: Idle, no polling.
        let now = Utc.with_ymd_and_hms(2024, 6, 9, 11, 0, 0).unwrap();
        let outcome = sched.tick_at(now).await.unwrap();
        assert_eq!(outcome.refreshed, 0);
        assert!(outcome.next_wakeup.is_none());
    }

    #[tokio::test]
    async fn test_refresh_now_forces_idle_flight() {
        let store = Arc::new(MemoryStore::new());
        store.save_flights(vec![record(7)]).await.unwrap();
        let client =
            MockAsyncHttpClient::ok("{}").with_rule("aviationstack.com", Ok(json_response(200, ACTIVE_BODY)));
        let sched = scheduler(client, Arc::clone(&store)).await;

        let now = Utc.with_ymd_and_hms(2024, 6, 9, 11, 0, 0).unwrap();
        let key = FlightKey::build("SK", "1429", Some("CPH"), "2024-06-10");
        let outcome = sched.refresh_now_at(Some(&key), now).await.unwrap();
        assert_eq!(outcome.refreshed, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_known_good() {
        let store = Arc::new(MemoryStore::new());
        let mut r = record(7);
        r.status_state = StatusState::EnRoute;
        store.save_flights(vec![r]).await.unwrap();
        let client = MockAsyncHttpClient::unavailable("provider down");
        let sched = scheduler(client, Arc::clone(&store)).await;

        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let outcome = sched.tick_at(now).await.unwrap();
        assert_eq!(outcome.refreshed, 1);
        assert_eq!(outcome.changed, 0);

        let flights = store.load_flights().await.unwrap();
        assert_eq!(flights[0].status_state, StatusState::EnRoute);
    }

    #[tokio::test]
    async fn test_assumed_arrival_sets_warning_flag() {
        let store = Arc::new(MemoryStore::new());
        let mut r = record(7);
        r.status_state = StatusState::EnRoute;
        store.save_flights(vec![r]).await.unwrap();
        // Provider returns no rows anymore.
        let client = MockAsyncHttpClient::ok(r#"{"data": []}"#);
        let sched = scheduler(client, Arc::clone(&store)).await;

        // 20 minutes past scheduled arrival (11:00 UTC).
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 11, 20, 0).unwrap();
        let outcome = sched.tick_at(now).await.unwrap();
        assert_eq!(outcome.changed, 1);

        let flights = store.load_flights().await.unwrap();
        assert_eq!(flights[0].status_state, StatusState::Arrived);
        assert!(flights[0].assumed_arrival);
        assert_eq!(flights[0].status_updated_at, Some(now));
    }

    #[tokio::test]
    async fn test_in_progress_markers_do_not_leak_between_runs() {
        let store = Arc::new(MemoryStore::new());
        store.save_flights(vec![record(7)]).await.unwrap();
        let client =
            MockAsyncHttpClient::ok("{}").with_rule("aviationstack.com", Ok(json_response(200, ACTIVE_BODY)));
        let sched = scheduler(client, Arc::clone(&store)).await;

        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let key = FlightKey::build("SK", "1429", Some("CPH"), "2024-06-10");
        // A second forced refresh must find the flight eligible again: the
        // marker set during the first run was cleared when it finished.
        assert_eq!(sched.refresh_now_at(Some(&key), now).await.unwrap().refreshed, 1);
        assert_eq!(sched.refresh_now_at(Some(&key), now).await.unwrap().refreshed, 1);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_preserve_both_updates() {
        let store = Arc::new(MemoryStore::new());
        let a = record(7);
        let mut b = record(7);
        b.flight_key = FlightKey::build("SK", "1430", Some("CPH"), "2024-06-10");
        b.flight_number = "1430".to_string();
        store.save_flights(vec![a, b]).await.unwrap();

        // Slow answers make the two passes overlap in time.
        let client = MockAsyncHttpClient::ok("{}")
            .with_rule("aviationstack.com", Ok(json_response(200, ACTIVE_BODY)))
            .with_delay(std::time::Duration::from_millis(20));
        let sched = scheduler(client, Arc::clone(&store)).await;

        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let key_a = FlightKey::build("SK", "1429", Some("CPH"), "2024-06-10");
        let key_b = FlightKey::build("SK", "1430", Some("CPH"), "2024-06-10");
        let (ra, rb) = tokio::join!(
            sched.refresh_now_at(Some(&key_a), now),
            sched.refresh_now_at(Some(&key_b), now),
        );
        assert_eq!(ra.unwrap().refreshed, 1);
        assert_eq!(rb.unwrap().refreshed, 1);

        // Neither pass saved over the other's merge.
        let flights = store.load_flights().await.unwrap();
        assert_eq!(flights.len(), 2);
        for f in &flights {
            assert_eq!(f.status_state, StatusState::EnRoute, "{}", f.flight_key);
        }
    }

    #[tokio::test]
    async fn test_claimed_flight_is_not_double_submitted() {
        let store = Arc::new(MemoryStore::new());
        store.save_flights(vec![record(7)]).await.unwrap();
        let client = MockAsyncHttpClient::unavailable("must not fetch");
        let sched = scheduler(client, Arc::clone(&store)).await;

        let key = FlightKey::build("SK", "1429", Some("CPH"), "2024-06-10");
        sched.mark_in_progress(&key);

        // Even a forced refresh honors an outstanding claim.
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let outcome = sched.refresh_now_at(Some(&key), now).await.unwrap();
        assert_eq!(outcome.refreshed, 0);
    }

    #[tokio::test]
    async fn test_prune_landed_respects_floor() {
        let store = Arc::new(MemoryStore::new());
        let mut r = record(7);
        r.status_state = StatusState::Arrived;
        r.arr.actual = Some(Utc.with_ymd_and_hms(2024, 6, 10, 11, 10, 0).unwrap());
        store.save_flights(vec![r]).await.unwrap();
        let sched = scheduler(MockAsyncHttpClient::ok("{}"), Arc::clone(&store)).await;

        // 30 minutes after arrival: even prune(0) keeps it (1 h floor).
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 11, 40, 0).unwrap();
        assert_eq!(sched.prune_landed_at(0, now).await.unwrap(), 0);

        // Two hours after arrival it goes.
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 13, 20, 0).unwrap();
        assert_eq!(sched.prune_landed_at(1, now).await.unwrap(), 1);
        assert!(store.load_flights().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tick_auto_prunes_old_terminal_flights() {
        let store = Arc::new(MemoryStore::new());
        let mut r = record(7);
        r.status_state = StatusState::Cancelled;
        store.save_flights(vec![r]).await.unwrap();
        let sched = scheduler(MockAsyncHttpClient::ok(r#"{"data": []}"#), Arc::clone(&store)).await;

        // Two days later: past the default 24 h auto-remove window.
        let now = Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap();
        let outcome = sched.tick_at(now).await.unwrap();
        assert_eq!(outcome.pruned, 1);
        assert!(store.load_flights().await.unwrap().is_empty());
    }
}
