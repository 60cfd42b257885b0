//! Lenient date parsing for CSV cells and text columns mapped onto date fields.

use crate::error::{OrmError, OrmResult};
use chrono::NaiveDate;

// Tried in order. `%B` also accepts the abbreviated month name when parsing.
const FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%d %B %Y",
];

/// Parse a date written in one of the common layouts:
/// `2023-01-15`, `15-01-2023`, `01/15/2023`, `2023/01/15`, `20230115`,
/// `Jan 15, 2023`, `January 15, 2023` and `15 Jan 2023`.
///
/// Surrounding whitespace is ignored.
pub fn parse_date(input: &str) -> OrmResult<NaiveDate> {
    let s = input.trim();

    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return compact(s).ok_or_else(|| invalid(input));
    }

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| invalid(input))
}

/// Whether `input` parses as a date under [`parse_date`].
pub fn is_date(input: &str) -> bool {
    parse_date(input).is_ok()
}

fn compact(s: &str) -> Option<NaiveDate> {
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn invalid(input: &str) -> OrmError {
    OrmError::validation(format!("Unrecognized date format: '{input}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()
    }

    #[test]
    fn accepts_common_layouts() {
        for s in [
            "2023-01-15",
            "15-01-2023",
            "01/15/2023",
            "2023/01/15",
            "20230115",
            "Jan 15, 2023",
            "January 15, 2023",
            "15 Jan 2023",
        ] {
            assert_eq!(parse_date(s).unwrap(), jan15(), "{s}");
        }
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(parse_date("  2023-01-15  ").unwrap(), jan15());
    }

    #[test]
    fn rejects_garbage_and_impossible_dates() {
        assert!(parse_date("invalid-date").unwrap_err().is_validation());
        assert!(parse_date("").is_err());
        assert!(parse_date("20231340").is_err());
        assert!(parse_date("2023-02-30").is_err());
        assert!(!is_date("3.5"));
    }
}
