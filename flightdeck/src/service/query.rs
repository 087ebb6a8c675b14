//! Free-form flight query parsing.

use regex::Regex;
use std::sync::OnceLock;

fn spaced_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z0-9]{2,3})\s+([0-9]{1,4}[A-Z]?)$").unwrap())
}

fn compact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Lazy airline group so `AI157` splits as AI + 157, not AI1 + 57.
    RE.get_or_init(|| Regex::new(r"^([A-Z0-9]{2,3}?)([0-9]{1,4}[A-Z]?)$").unwrap())
}

/// Parse an airline + flight number query like `AI 157`, `AI157`, or `AF-2`.
///
/// Space-separated input is preferred because 2- and 3-character airline
/// codes are ambiguous in the compact form.
pub fn parse_query(query: &str) -> Option<(String, String)> {
    let q = query.trim().to_uppercase().replace(['-', '/'], " ");
    if q.is_empty() {
        return None;
    }
    if let Some(caps) = spaced_re().captures(&q) {
        return Some((caps[1].to_string(), caps[2].to_string()));
    }
    let compact = q.replace(' ', "");
    let caps = compact_re().captures(&compact)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Trim traveller entries, split comma-joined ones, and drop empties.
pub fn normalize_travellers(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_separated_query() {
        assert_eq!(
            parse_query("AI 157"),
            Some(("AI".to_string(), "157".to_string()))
        );
        assert_eq!(
            parse_query("  ba 2490 "),
            Some(("BA".to_string(), "2490".to_string()))
        );
    }

    #[test]
    fn test_compact_and_separator_forms() {
        assert_eq!(
            parse_query("AI157"),
            Some(("AI".to_string(), "157".to_string()))
        );
        assert_eq!(parse_query("AF-2"), Some(("AF".to_string(), "2".to_string())));
        assert_eq!(
            parse_query("U2/8401"),
            Some(("U2".to_string(), "8401".to_string()))
        );
    }

    #[test]
    fn test_letter_suffix_flight_number() {
        assert_eq!(
            parse_query("BA 2490A"),
            Some(("BA".to_string(), "2490A".to_string()))
        );
    }

    #[test]
    fn test_unparseable_queries() {
        assert_eq!(parse_query(""), None);
        assert_eq!(parse_query("flight 157 tomorrow"), None);
        assert_eq!(parse_query("A"), None);
    }

    #[test]
    fn test_travellers_normalization() {
        let values = vec![
            " Alice ".to_string(),
            "Bob, Carol".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(normalize_travellers(&values), vec!["Alice", "Bob", "Carol"]);
        assert!(normalize_travellers(&[]).is_empty());
    }
}
