//! Refresh phase and polling interval derivation.

use crate::model::FlightRecord;
use chrono::{DateTime, Duration, Utc};

/// Where a flight sits in its polling lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// More than 6 hours before departure: no polling yet.
    Idle,
    /// 2-6 hours before departure.
    Approaching,
    /// Under 2 hours before departure.
    Imminent,
    /// Within an hour of departure through arrival.
    Active,
    /// Terminal state reached, still within the post-arrival window.
    PostArrival,
    /// No further polling; scheduling state can be dropped.
    Stopped,
}

/// Phase plus the polling interval for it. `None` means no timer is set.
///
/// Note the table is not monotone around departure: the Active tier polls
/// less often (15 min) than Imminent (10 min), because in-air changes are
/// rarer than gate changes just before boarding.
pub fn phase_and_interval(record: &FlightRecord, now: DateTime<Utc>) -> (Phase, Option<Duration>) {
    let dep = record.dep.best_known();
    let arr = record.arr.best_known();

    if dep.is_none() && arr.is_none() {
        return (Phase::Stopped, None);
    }

    // Far in the past: drop scheduling state entirely.
    if let Some(arr) = arr {
        if now > arr + Duration::hours(6) {
            return (Phase::Stopped, None);
        }
    }

    if record.status_state.is_terminal() {
        // Keep an occasional check shortly after arrival, stop an hour past.
        if let Some(arr) = arr {
            if now > arr + Duration::hours(1) {
                return (Phase::Stopped, None);
            }
        }
        return (Phase::PostArrival, Some(Duration::hours(3)));
    }

    if let Some(dep) = dep {
        let within_leg = now >= dep - Duration::hours(1) && arr.map_or(true, |a| now <= a);
        if within_leg {
            return (Phase::Active, Some(Duration::minutes(15)));
        }
        if now < dep {
            let until_dep = dep - now;
            if until_dep > Duration::hours(6) {
                return (Phase::Idle, None);
            }
            if until_dep > Duration::hours(2) {
                return (Phase::Approaching, Some(Duration::minutes(30)));
            }
            return (Phase::Imminent, Some(Duration::minutes(10)));
        }
    }

    // Past the arrival estimate but not terminal yet: keep checking hourly.
    (Phase::PostArrival, Some(Duration::hours(1)))
}
