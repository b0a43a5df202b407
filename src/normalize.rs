//! Field normalization shared by every aggregation.
//!
//! Records arrive with loosely-typed and sentinel-laden fields. Everything the
//! aggregator needs to know about a record is derived here, once, into a
//! [`RecordView`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::models::{LooseValue, PlacementRecord, StoredRecord};

pub const UNKNOWN: &str = "Unknown";
pub const ABSENT_MARKER: &str = "0";
const PLACED: &str = "placed";

pub fn is_placed(status: Option<&str>) -> bool {
    status
        .map(|value| value.trim().eq_ignore_ascii_case(PLACED))
        .unwrap_or(false)
}

/// Returns the package only when it parses to a finite number above zero.
pub fn parse_compensation(value: &LooseValue) -> Option<f64> {
    let parsed = match value {
        LooseValue::Number(number) => Some(*number),
        LooseValue::Text(text) => parse_leading_number(text),
        LooseValue::Absent => None,
    };
    parsed.filter(|number| number.is_finite() && *number > 0.0)
}

/// Parses the longest numeric prefix of `text`, so `"12.5 LPA"` yields 12.5.
pub fn parse_leading_number(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count()
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let integer_digits = digits_from(end);
    end += integer_digits;
    let mut fraction_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction_digits = digits_from(end + 1);
        if integer_digits + fraction_digits > 0 {
            end += 1 + fraction_digits;
        }
    }
    if integer_digits + fraction_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits = digits_from(exponent_end);
        if exponent_digits > 0 {
            end = exponent_end + exponent_digits;
        }
    }

    trimmed[..end].parse::<f64>().ok()
}

/// The employer name, or `None` for the "no employer" sentinels.
pub fn valid_company(company: Option<&str>) -> Option<&str> {
    company.filter(|name| {
        let trimmed = name.trim();
        !trimmed.is_empty() && trimmed != ABSENT_MARKER
    })
}

pub fn branch_key(branch: Option<&str>) -> &str {
    match branch {
        Some(name) if !name.trim().is_empty() => name,
        _ => UNKNOWN,
    }
}

pub fn year_label(value: &LooseValue) -> String {
    match value {
        LooseValue::Number(number) => number.to_string(),
        LooseValue::Text(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn numeric_year(value: &LooseValue) -> Option<f64> {
    let year = match value {
        LooseValue::Number(number) => Some(*number),
        LooseValue::Text(text) => parse_leading_number(text),
        LooseValue::Absent => None,
    };
    year.filter(|number| number.is_finite())
}

/// Orders records by batch year, latest first. Records without a numeric
/// year go last; ties keep their existing order.
pub fn newest_batch_first(records: &mut [StoredRecord]) {
    records.sort_by(|a, b| {
        match (
            numeric_year(&a.record.batch_year),
            numeric_year(&b.record.batch_year),
        ) {
            (Some(left), Some(right)) => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum YearFilter {
    #[default]
    All,
    Exact(String),
}

impl YearFilter {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Exact(year) => year == label,
        }
    }
}

impl FromStr for YearFilter {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Ok(YearFilter::All)
        } else {
            Ok(YearFilter::Exact(trimmed.to_string()))
        }
    }
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearFilter::All => f.write_str("all years"),
            YearFilter::Exact(year) => write!(f, "batch {year}"),
        }
    }
}

/// A record reduced to the facts the aggregator groups and counts on.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordView<'a> {
    pub institution_id: &'a str,
    pub branch: &'a str,
    pub company: Option<&'a str>,
    pub year: String,
    pub placed: bool,
    /// Present only for placed records with a valid package.
    pub package: Option<f64>,
}

impl<'a> RecordView<'a> {
    pub fn classify(record: &'a PlacementRecord) -> Self {
        let placed = is_placed(record.status.as_deref());
        let package = if placed {
            parse_compensation(&record.compensation)
        } else {
            None
        };

        Self {
            institution_id: &record.institution_id,
            branch: branch_key(record.branch.as_deref()),
            company: valid_company(record.company.as_deref()),
            year: year_label(&record.batch_year),
            placed,
            package,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_comparison_ignores_case_and_padding() {
        assert!(is_placed(Some("Placed")));
        assert!(is_placed(Some(" placed ")));
        assert!(is_placed(Some("PLACED")));
        assert!(!is_placed(Some("Not Placed")));
        assert!(!is_placed(Some("intern")));
        assert!(!is_placed(Some("0")));
        assert!(!is_placed(Some("")));
        assert!(!is_placed(None));
    }

    #[test]
    fn compensation_parses_leniently_and_rejects_non_positive() {
        assert_eq!(parse_compensation(&LooseValue::Number(12.0)), Some(12.0));
        assert_eq!(parse_compensation(&"10".into()), Some(10.0));
        assert_eq!(parse_compensation(&"12.5 LPA".into()), Some(12.5));
        assert_eq!(parse_compensation(&" 7.25".into()), Some(7.25));
        assert_eq!(parse_compensation(&"abc".into()), None);
        assert_eq!(parse_compensation(&"0".into()), None);
        assert_eq!(parse_compensation(&"-4".into()), None);
        assert_eq!(parse_compensation(&LooseValue::Number(0.0)), None);
        assert_eq!(parse_compensation(&LooseValue::Number(f64::NAN)), None);
        assert_eq!(parse_compensation(&"inf".into()), None);
        assert_eq!(parse_compensation(&LooseValue::Absent), None);
    }

    #[test]
    fn leading_number_handles_fractions_and_exponents() {
        assert_eq!(parse_leading_number(".5"), Some(0.5));
        assert_eq!(parse_leading_number("5."), Some(5.0));
        assert_eq!(parse_leading_number("1e1x"), Some(10.0));
        assert_eq!(parse_leading_number("3e"), Some(3.0));
        assert_eq!(parse_leading_number("+2.5"), Some(2.5));
        assert_eq!(parse_leading_number("."), None);
        assert_eq!(parse_leading_number("-"), None);
        assert_eq!(parse_leading_number(""), None);
    }

    #[test]
    fn sentinel_companies_are_not_employers() {
        assert_eq!(valid_company(Some("Acme")), Some("Acme"));
        assert_eq!(valid_company(Some("0")), None);
        assert_eq!(valid_company(Some("")), None);
        assert_eq!(valid_company(Some("  ")), None);
        assert_eq!(valid_company(None), None);
    }

    #[test]
    fn missing_branch_and_year_fall_back_to_unknown() {
        assert_eq!(branch_key(None), UNKNOWN);
        assert_eq!(branch_key(Some("")), UNKNOWN);
        assert_eq!(branch_key(Some("CS")), "CS");
        assert_eq!(year_label(&LooseValue::Number(2024.0)), "2024");
        assert_eq!(year_label(&" 2023 ".into()), "2023");
        assert_eq!(year_label(&LooseValue::Absent), UNKNOWN);
    }

    #[test]
    fn year_filter_treats_all_as_no_filter() {
        assert_eq!("all".parse::<YearFilter>().unwrap(), YearFilter::All);
        assert_eq!("ALL".parse::<YearFilter>().unwrap(), YearFilter::All);
        let filter: YearFilter = "2024".parse().unwrap();
        assert!(filter.matches("2024"));
        assert!(!filter.matches("2023"));
        assert!(YearFilter::All.matches("anything"));
    }

    #[test]
    fn records_list_latest_batch_first() {
        use chrono::{TimeZone, Utc};
        use uuid::Uuid;

        let stored = |name: &str, year: LooseValue| StoredRecord {
            id: Uuid::new_v4(),
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            record: PlacementRecord {
                institution_id: "IITB".to_string(),
                batch_year: year,
                student_name: name.to_string(),
                branch: None,
                company: None,
                compensation: LooseValue::Absent,
                status: None,
            },
        };
        let mut records = vec![
            stored("Avery Lee", LooseValue::Number(2022.0)),
            stored("Jules Moreno", LooseValue::Absent),
            stored("Kiara Patel", "2024".into()),
            stored("Rohan Mehta", LooseValue::Number(2023.0)),
            stored("Sana Iyer", "2024".into()),
        ];

        newest_batch_first(&mut records);
        let names: Vec<&str> = records
            .iter()
            .map(|stored| stored.record.student_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Kiara Patel", "Sana Iyer", "Rohan Mehta", "Avery Lee", "Jules Moreno"]
        );
    }

    #[test]
    fn unplaced_records_carry_no_package() {
        let record = PlacementRecord {
            institution_id: "IITB".to_string(),
            batch_year: LooseValue::Number(2024.0),
            student_name: "Avery Lee".to_string(),
            branch: Some("CS".to_string()),
            company: Some("Acme".to_string()),
            compensation: "18".into(),
            status: Some("Intern".to_string()),
        };
        let view = RecordView::classify(&record);
        assert!(!view.placed);
        assert_eq!(view.package, None);
        assert_eq!(view.company, Some("Acme"));
        assert_eq!(view.year, "2024");
    }
}
