//! Delay and duration derivation.

use crate::model::{DelayStatus, FlightRecord, StatusState};
use chrono::{DateTime, Utc};

/// Delay classification with signed minutes.
///
/// The arrival pair (scheduled vs actual-or-estimated) is preferred; the
/// departure pair is the fallback. Within the grace window a late flight is
/// still on time.
pub fn compute_delay(record: &FlightRecord, grace_minutes: i64) -> (DelayStatus, Option<i64>) {
    if record.status_state == StatusState::Cancelled {
        return (DelayStatus::Cancelled, None);
    }

    let pair = match (record.arr.scheduled, record.arr.actual_or_estimated()) {
        (Some(sched), Some(best)) => Some((sched, best)),
        _ => match (record.dep.scheduled, record.dep.actual_or_estimated()) {
            (Some(sched), Some(best)) => Some((sched, best)),
            _ => None,
        },
    };

    let Some((sched, best)) = pair else {
        return (DelayStatus::Unknown, None);
    };

    let minutes = (best - sched).num_minutes();
    if minutes > grace_minutes {
        (DelayStatus::Delayed, Some(minutes))
    } else {
        (DelayStatus::OnTime, Some(minutes))
    }
}

fn duration_minutes(dep: Option<DateTime<Utc>>, arr: Option<DateTime<Utc>>) -> Option<i64> {
    let minutes = (arr? - dep?).num_minutes();
    if minutes < 0 {
        return None;
    }
    Some(minutes)
}

/// Recompute all duration fields in place: per-kind pairs plus the best
/// available (actual, else estimated, else scheduled).
pub fn compute_durations(record: &mut FlightRecord) {
    record.duration_scheduled_minutes =
        duration_minutes(record.dep.scheduled, record.arr.scheduled);
    record.duration_estimated_minutes = duration_minutes(
        record.dep.actual_or_estimated(),
        record.arr.actual_or_estimated(),
    );
    record.duration_actual_minutes = duration_minutes(record.dep.actual, record.arr.actual);
    record.duration_minutes = record
        .duration_actual_minutes
        .or(record.duration_estimated_minutes)
        .or(record.duration_scheduled_minutes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlightKey;
    use chrono::TimeZone;

    fn record() -> FlightRecord {
        let key = FlightKey::build("SK", "1429", Some("CPH"), "2024-06-10");
        FlightRecord::new(key, "SK", "1429")
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_cancelled_short_circuits() {
        let mut r = record();
        r.status_state = StatusState::Cancelled;
        r.arr.scheduled = Some(at(13, 5));
        r.arr.estimated = Some(at(14, 0));
        assert_eq!(compute_delay(&r, 10), (DelayStatus::Cancelled, None));
    }

    #[test]
    fn test_arrival_pair_preferred_and_grace_applies() {
        let mut r = record();
        r.dep.scheduled = Some(at(9, 0));
        r.dep.actual = Some(at(10, 0)); // departure 60 min late
        r.arr.scheduled = Some(at(13, 5));
        r.arr.estimated = Some(at(13, 12)); // arrival only 7 min late

        let (status, minutes) = compute_delay(&r, 10);
        assert_eq!(status, DelayStatus::OnTime);
        assert_eq!(minutes, Some(7));

        r.arr.estimated = Some(at(13, 30));
        let (status, minutes) = compute_delay(&r, 10);
        assert_eq!(status, DelayStatus::Delayed);
        assert_eq!(minutes, Some(25));
    }

    #[test]
    fn test_departure_pair_fallback() {
        let mut r = record();
        r.dep.scheduled = Some(at(9, 0));
        r.dep.estimated = Some(at(9, 45));
        let (status, minutes) = compute_delay(&r, 10);
        assert_eq!(status, DelayStatus::Delayed);
        assert_eq!(minutes, Some(45));
    }

    #[test]
    fn test_no_usable_pair_is_unknown() {
        let mut r = record();
        r.arr.scheduled = Some(at(13, 5));
        assert_eq!(compute_delay(&r, 10), (DelayStatus::Unknown, None));
    }

    #[test]
    fn test_early_arrival_is_negative_minutes() {
        let mut r = record();
        r.arr.scheduled = Some(at(13, 5));
        r.arr.actual = Some(at(12, 50));
        let (status, minutes) = compute_delay(&r, 10);
        assert_eq!(status, DelayStatus::OnTime);
        assert_eq!(minutes, Some(-15));
    }

    #[test]
    fn test_durations_prefer_actuals() {
        let mut r = record();
        r.dep.scheduled = Some(at(9, 0));
        r.arr.scheduled = Some(at(13, 5));
        compute_durations(&mut r);
        assert_eq!(r.duration_scheduled_minutes, Some(245));
        assert_eq!(r.duration_minutes, Some(245));

        r.dep.actual = Some(at(9, 18));
        r.arr.estimated = Some(at(13, 22));
        compute_durations(&mut r);
        assert_eq!(r.duration_estimated_minutes, Some(244));
        assert_eq!(r.duration_actual_minutes, None);
        assert_eq!(r.duration_minutes, Some(244));

        r.arr.actual = Some(at(13, 25));
        compute_durations(&mut r);
        assert_eq!(r.duration_actual_minutes, Some(247));
        assert_eq!(r.duration_minutes, Some(247));
    }

    #[test]
    fn test_negative_duration_is_discarded() {
        let mut r = record();
        r.dep.scheduled = Some(at(13, 0));
        r.arr.scheduled = Some(at(9, 0));
        compute_durations(&mut r);
        assert_eq!(r.duration_scheduled_minutes, None);
        assert_eq!(r.duration_minutes, None);
    }
}
