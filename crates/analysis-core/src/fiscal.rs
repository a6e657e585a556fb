//! Indian fiscal-year helpers (1 April to 31 March).

use chrono::{Datelike, NaiveDate};

/// First and last day of the fiscal year containing `today`.
pub fn fiscal_year_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start_year = if today.month() >= 4 {
        today.year()
    } else {
        today.year() - 1
    };
    let start = NaiveDate::from_ymd_opt(start_year, 4, 1).unwrap_or(today);
    let end = NaiveDate::from_ymd_opt(start_year + 1, 3, 31).unwrap_or(today);
    (start, end)
}

/// Parse a quarter label like "Jun 2025" into the first day of that month.
pub fn parse_quarter_label(label: &str) -> Option<NaiveDate> {
    let mut parts = label.split_whitespace();
    let month = match parts.next()? {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    let year: i32 = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Quarter labels that fall inside the fiscal year containing `today`, in input order.
/// Labels that cannot be parsed are dropped.
pub fn current_fiscal_quarters(labels: &[String], today: NaiveDate) -> Vec<String> {
    let (start, end) = fiscal_year_bounds(today);
    labels
        .iter()
        .filter(|label| {
            parse_quarter_label(label).is_some_and(|date| date >= start && date <= end)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fiscal_year_bounds() {
        assert_eq!(fiscal_year_bounds(date(2025, 10, 16)), (date(2025, 4, 1), date(2026, 3, 31)));
        assert_eq!(fiscal_year_bounds(date(2026, 2, 1)), (date(2025, 4, 1), date(2026, 3, 31)));
        assert_eq!(fiscal_year_bounds(date(2025, 4, 1)), (date(2025, 4, 1), date(2026, 3, 31)));
    }

    #[test]
    fn test_parse_quarter_label() {
        assert_eq!(parse_quarter_label("Jun 2025"), Some(date(2025, 6, 1)));
        assert_eq!(parse_quarter_label("  Dec   2024 "), Some(date(2024, 12, 1)));
        assert_eq!(parse_quarter_label("June 2025"), None);
        assert_eq!(parse_quarter_label("Jun"), None);
    }

    #[test]
    fn test_current_fiscal_quarters() {
        let quarters = labels(&["Dec 2024", "Mar 2025", "Jun 2025", "Sep 2025"]);
        let current = current_fiscal_quarters(&quarters, date(2025, 10, 16));
        assert_eq!(current, labels(&["Jun 2025", "Sep 2025"]));

        // Q4 results land in the next fiscal year's calendar
        let current = current_fiscal_quarters(&quarters, date(2025, 3, 20));
        assert_eq!(current, labels(&["Dec 2024", "Mar 2025"]));
    }
}
