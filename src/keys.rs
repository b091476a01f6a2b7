//! Canonical integer keys for fiscal notes.
//!
//! The ERP stores note numbers as fixed-width codes with a four-character
//! series prefix ("00014532"), the spreadsheet as "series/number" pairs
//! ("001/4532") or plain numbers that may have been typed as floats
//! ("4532.0"). Both converge on the bare note number.
//!
//! Anything unparseable maps to [`UNKNOWN_KEY`]. All such records share that
//! key and therefore match each other across sources.

/// Sentinel for a note number that could not be parsed.
pub const UNKNOWN_KEY: i64 = 0;

const SERIES_PREFIX_LEN: usize = 4;

pub fn normalize_db_key(raw: &str) -> i64 {
    let s = raw.trim();
    let digits = if s.len() > SERIES_PREFIX_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
        &s[SERIES_PREFIX_LEN..]
    } else {
        s
    };
    digits.parse().unwrap_or(UNKNOWN_KEY)
}

pub fn normalize_sheet_key(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return UNKNOWN_KEY;
    };
    let s = raw.trim();
    if s.contains('/') {
        return s
            .split('/')
            .nth(1)
            .and_then(|number| number.trim().parse().ok())
            .unwrap_or(UNKNOWN_KEY);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.abs() < i64::MAX as f64 => f.trunc() as i64,
        _ => UNKNOWN_KEY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_key_short_codes_parse_whole() {
        assert_eq!(normalize_db_key("7"), 7);
        assert_eq!(normalize_db_key("0042"), 42);
        assert_eq!(normalize_db_key("4532"), 4532);
    }

    #[test]
    fn test_db_key_strips_series_prefix() {
        assert_eq!(normalize_db_key("00014532"), 4532);
        assert_eq!(normalize_db_key("12345"), 5);
        assert_eq!(normalize_db_key("  20250000100 "), 100);
        assert_eq!(normalize_db_key("00000"), 0);
    }

    #[test]
    fn test_db_key_non_numeric_is_unknown() {
        assert_eq!(normalize_db_key(""), UNKNOWN_KEY);
        assert_eq!(normalize_db_key("   "), UNKNOWN_KEY);
        assert_eq!(normalize_db_key("NF-123"), UNKNOWN_KEY);
        assert_eq!(normalize_db_key("12a45"), UNKNOWN_KEY);
    }

    #[test]
    fn test_db_key_prefix_only_applies_to_pure_digits() {
        // Not all digits, so no prefix is removed and the whole string is parsed.
        assert_eq!(normalize_db_key("-12345"), -12345);
        assert_eq!(normalize_db_key("+1234"), 1234);
    }

    #[test]
    fn test_db_key_overflow_is_unknown() {
        assert_eq!(normalize_db_key("0001999999999999999999999"), UNKNOWN_KEY);
    }

    #[test]
    fn test_sheet_key_series_number() {
        assert_eq!(normalize_sheet_key(Some("001/4532")), 4532);
        assert_eq!(normalize_sheet_key(Some(" 1 / 77 ")), 77);
        assert_eq!(normalize_sheet_key(Some("1/2/3")), 2);
        assert_eq!(normalize_sheet_key(Some("001/")), UNKNOWN_KEY);
        assert_eq!(normalize_sheet_key(Some("001/ABC")), UNKNOWN_KEY);
    }

    #[test]
    fn test_sheet_key_float_values_truncate() {
        assert_eq!(normalize_sheet_key(Some("4532.0")), 4532);
        assert_eq!(normalize_sheet_key(Some("4532")), 4532);
        assert_eq!(normalize_sheet_key(Some("4532.9")), 4532);
    }

    #[test]
    fn test_sheet_key_missing_or_garbage_is_unknown() {
        assert_eq!(normalize_sheet_key(None), UNKNOWN_KEY);
        assert_eq!(normalize_sheet_key(Some("")), UNKNOWN_KEY);
        assert_eq!(normalize_sheet_key(Some("pendente")), UNKNOWN_KEY);
        assert_eq!(normalize_sheet_key(Some("NaN")), UNKNOWN_KEY);
        assert_eq!(normalize_sheet_key(Some("inf")), UNKNOWN_KEY);
    }

    #[test]
    fn test_both_sources_converge() {
        assert_eq!(normalize_db_key("00014532"), normalize_sheet_key(Some("001/4532")));
        assert_eq!(normalize_db_key("4532"), normalize_sheet_key(Some("4532.0")));
    }
}
