//! Timestamp interpretation.
//!
//! Providers emit a mix of offset-carrying RFC 3339 strings, `Z`-suffixed
//! strings, space-separated variants, a doubled `+00:00+00:00` quirk, and
//! naive local strings. Offset-carrying strings are authoritative; naive
//! strings are interpreted in the relevant airport's IANA zone. A naive
//! string with no known zone cannot be placed on the UTC timeline and
//! normalizes to `None`.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;

fn offset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(Z|[+-]\d{2}:?\d{2})$").unwrap())
}

/// Whether the string carries an explicit UTC offset (or `Z`).
pub fn has_offset(raw: &str) -> bool {
    offset_re().is_match(raw.trim())
}

fn cleaned(raw: &str) -> String {
    let mut s = raw.trim().replace(' ', "T");
    // Seen in the wild: a UTC offset applied twice.
    if let Some(stripped) = s.strip_suffix("+00:00+00:00") {
        s = format!("{}+00:00", stripped);
    }
    // Colon-less offsets like `+0530`; RFC 3339 requires `+05:30`.
    if s.len() >= 5 {
        let tail = &s.as_bytes()[s.len() - 5..];
        if (tail[0] == b'+' || tail[0] == b'-') && tail[1..].iter().all(u8::is_ascii_digit) {
            s.insert(s.len() - 2, ':');
        }
    }
    s
}

/// Parse a provider timestamp into canonical UTC.
///
/// `tz` is the airport IANA zone used for naive strings; ambiguous local
/// times (DST fold) resolve to the earlier instant.
pub fn parse_timestamp(raw: &str, tz: Option<&str>) -> Option<DateTime<Utc>> {
    let s = cleaned(raw);
    if s.is_empty() {
        return None;
    }

    if has_offset(&s) {
        return DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }

    let zone: Tz = tz?.trim().parse().ok()?;
    let naive: NaiveDateTime = s.parse().ok()?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render a canonical UTC timestamp as an airport-local RFC 3339 string.
pub fn local_string(utc: DateTime<Utc>, tz: Option<&str>) -> Option<String> {
    let zone: Tz = tz?.trim().parse().ok()?;
    Some(
        utc.with_timezone(&zone)
            .to_rfc3339_opts(SecondsFormat::Secs, false),
    )
}
