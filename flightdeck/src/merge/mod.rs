//! Merge/dedup engine.
//!
//! The only code path that mutates flight records. [`apply_status`] folds a
//! normalized provider snapshot into a record field by field; [`dedup`]
//! collapses duplicate entries for the same physical flight. Both keep
//! manual-editable fields (travellers, notes) untouched.

pub mod delay;

pub use delay::{compute_delay, compute_durations};

use crate::directory::tz_short;
use crate::model::{AirportRef, FlightRecord, Leg, StatusState};
use crate::normalize::{refresh_local_strings, NormalizedStatus};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

fn fill_missing(target: &mut Option<String>, source: &Option<String>) {
    if target.is_none() {
        if let Some(value) = source {
            *target = Some(value.clone());
        }
    }
}

fn overwrite_if_present<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}

fn refresh_tz_short(leg: &mut Leg, now: DateTime<Utc>) {
    let at = leg.scheduled.unwrap_or(now);
    leg.airport.tz_short = leg.airport.tz.as_deref().and_then(|tz| tz_short(tz, at));
}

/// Resolve the state transition under the monotone guard.
///
/// `Unknown` never displaces a meaningful state, and terminal states are
/// never left through automatic merges.
fn next_state(current: StatusState, incoming: StatusState) -> StatusState {
    if incoming == StatusState::Unknown {
        return current;
    }
    if current.is_terminal() && incoming != current {
        return current;
    }
    if incoming.rank() >= current.rank() {
        incoming
    } else {
        current
    }
}

/// Apply a normalized provider snapshot to a record.
///
/// Provider values win for schedule, status, position, terminals and gates;
/// enrichment (airline, airport names, aircraft type) fills only missing
/// fields. Returns whether the record changed; `status_updated_at` moves
/// only on change, so re-applying the same snapshot is a no-op.
pub fn apply_status(
    record: &mut FlightRecord,
    status: &NormalizedStatus,
    grace_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    let before = record.clone();

    let resolved = next_state(record.status_state, status.state);
    if resolved != record.status_state {
        debug!(
            flight_key = %record.flight_key,
            from = %record.status_state,
            to = %resolved,
            provider = %status.provider,
            "Status state transition"
        );
    }
    record.status_state = resolved;

    overwrite_if_present(&mut record.dep.airport.tz, &status.dep_tz);
    overwrite_if_present(&mut record.arr.airport.tz, &status.arr_tz);
    fill_missing(&mut record.dep.airport.iata, &status.dep_iata);
    fill_missing(&mut record.arr.airport.iata, &status.arr_iata);

    overwrite_if_present(&mut record.dep.scheduled, &status.dep_scheduled);
    overwrite_if_present(&mut record.dep.estimated, &status.dep_estimated);
    overwrite_if_present(&mut record.dep.actual, &status.dep_actual);
    overwrite_if_present(&mut record.arr.scheduled, &status.arr_scheduled);
    overwrite_if_present(&mut record.arr.estimated, &status.arr_estimated);
    overwrite_if_present(&mut record.arr.actual, &status.arr_actual);

    overwrite_if_present(&mut record.dep.terminal, &status.terminal_dep);
    overwrite_if_present(&mut record.dep.gate, &status.gate_dep);
    overwrite_if_present(&mut record.arr.terminal, &status.terminal_arr);
    overwrite_if_present(&mut record.arr.gate, &status.gate_arr);

    fill_missing(&mut record.airline_name, &status.airline_name);
    fill_missing(&mut record.airline_logo_url, &status.airline_logo_url);
    fill_missing(&mut record.aircraft_type, &status.aircraft_type);
    fill_missing(&mut record.dep.airport.name, &status.dep_airport_name);
    fill_missing(&mut record.dep.airport.city, &status.dep_airport_city);
    fill_missing(&mut record.arr.airport.name, &status.arr_airport_name);
    fill_missing(&mut record.arr.airport.city, &status.arr_airport_city);

    if let Some(position) = &status.position {
        record.position = Some(position.clone());
    }

    // Diverted destination: only when the state is Diverted and the provider
    // arrival differs from the planned one.
    let planned_arr = record.arr.airport.iata.as_deref();
    record.diverted_to = match (&record.status_state, &status.arr_iata) {
        (StatusState::Diverted, Some(arr_iata)) if Some(arr_iata.as_str()) != planned_arr => {
            Some(AirportRef {
                iata: Some(arr_iata.clone()),
                name: status.arr_airport_name.clone(),
                city: status.arr_airport_city.clone(),
                tz: status.arr_tz.clone(),
                tz_short: None,
            })
        }
        _ => None,
    };

    record.raw_status = Some(status.raw.clone());

    refresh_local_strings(&mut record.dep);
    refresh_local_strings(&mut record.arr);
    refresh_tz_short(&mut record.dep, now);
    refresh_tz_short(&mut record.arr, now);

    let (delay_status, delay_minutes) = compute_delay(record, grace_minutes);
    record.delay_status = delay_status;
    record.delay_minutes = delay_minutes;
    compute_durations(record);

    let changed = *record != before;
    if changed {
        record.status_updated_at = Some(now);
    }
    changed
}

fn union_travellers(existing: &mut Vec<String>, other: &[String]) {
    for traveller in other {
        if !existing.iter().any(|t| t.eq_ignore_ascii_case(traveller)) {
            existing.push(traveller.clone());
        }
    }
}

fn same_flight(a: &FlightRecord, b: &FlightRecord, tolerance: Duration) -> bool {
    if a.flight_key == b.flight_key {
        return true;
    }
    if a.airline_code != b.airline_code
        || a.flight_number != b.flight_number
        || a.dep.airport.iata != b.dep.airport.iata
        || a.arr.airport.iata != b.arr.airport.iata
    {
        return false;
    }
    match (a.dep.scheduled, b.dep.scheduled) {
        (Some(x), Some(y)) => (x - y).abs() <= tolerance,
        _ => false,
    }
}

fn fill_leg(target: &mut Leg, source: &Leg) {
    fill_missing(&mut target.airport.iata, &source.airport.iata);
    fill_missing(&mut target.airport.name, &source.airport.name);
    fill_missing(&mut target.airport.city, &source.airport.city);
    fill_missing(&mut target.airport.tz, &source.airport.tz);
    fill_missing(&mut target.airport.tz_short, &source.airport.tz_short);
    if target.scheduled.is_none() {
        target.scheduled = source.scheduled;
    }
    if target.estimated.is_none() {
        target.estimated = source.estimated;
    }
    if target.actual.is_none() {
        target.actual = source.actual;
    }
    fill_missing(&mut target.terminal, &source.terminal);
    fill_missing(&mut target.gate, &source.gate);
}

/// Fold `duplicate` into `keeper`: travellers union, manual fields
/// preserved, provider fields filled from the richer side, the more
/// advanced status wins.
fn absorb(keeper: &mut FlightRecord, duplicate: &FlightRecord, grace_minutes: i64) {
    union_travellers(&mut keeper.travellers, &duplicate.travellers);
    fill_missing(&mut keeper.notes, &duplicate.notes);

    if duplicate.status_state.rank() > keeper.status_state.rank() {
        keeper.status_state = duplicate.status_state;
    }

    fill_leg(&mut keeper.dep, &duplicate.dep);
    fill_leg(&mut keeper.arr, &duplicate.arr);
    fill_missing(&mut keeper.airline_name, &duplicate.airline_name);
    fill_missing(&mut keeper.airline_logo_url, &duplicate.airline_logo_url);
    fill_missing(&mut keeper.aircraft_type, &duplicate.aircraft_type);

    if keeper.position.is_none() {
        keeper.position = duplicate.position.clone();
    }
    if keeper.raw_status.is_none() {
        keeper.raw_status = duplicate.raw_status.clone();
    }
    if keeper.status_updated_at.is_none() {
        keeper.status_updated_at = duplicate.status_updated_at;
    }
    keeper.assumed_arrival = keeper.assumed_arrival || duplicate.assumed_arrival;

    refresh_local_strings(&mut keeper.dep);
    refresh_local_strings(&mut keeper.arr);
    let (delay_status, delay_minutes) = compute_delay(keeper, grace_minutes);
    keeper.delay_status = delay_status;
    keeper.delay_minutes = delay_minutes;
    compute_durations(keeper);
}

/// Collapse records describing the same physical flight.
///
/// Two records match when they share the key, or share airline + number +
/// route with scheduled departures inside the tolerance window. The first
/// occurrence is kept; later duplicates are absorbed into it.
pub fn dedup(
    flights: Vec<FlightRecord>,
    tolerance_hours: i64,
    grace_minutes: i64,
) -> Vec<FlightRecord> {
    let tolerance = Duration::hours(tolerance_hours);
    let mut out: Vec<FlightRecord> = Vec::new();
    for candidate in flights {
        if let Some(keeper) = out.iter_mut().find(|r| same_flight(r, &candidate, tolerance)) {
            debug!(
                keeper = %keeper.flight_key,
                duplicate = %candidate.flight_key,
                "Merging duplicate flight"
            );
            absorb(keeper, &candidate, grace_minutes);
        } else {
            out.push(candidate);
        }
    }
    out
}
