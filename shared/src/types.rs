//! Reporting period filters

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// Errors raised while interpreting date filter parameters
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateFilterError {
    #[error("Invalid year: {0}")]
    InvalidYear(String),

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Period selected by the `filter_type` request parameter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    /// Current ISO week, Monday first
    Week,
    Month {
        year: i32,
        month: u32,
    },
    Year(i32),
    /// Inclusive calendar dates; either side may be open
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

/// Half-open timestamp window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateBounds {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Raw filter parameters as they arrive on the query string
#[derive(Debug, Clone, Default)]
pub struct DateFilterParams<'a> {
    pub filter_type: Option<&'a str>,
    pub year: Option<&'a str>,
    pub month: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_year(value: Option<&str>, today: NaiveDate) -> Result<i32, DateFilterError> {
    match non_empty(value) {
        None => Ok(today.year()),
        Some(raw) => raw
            .parse::<i32>()
            .ok()
            .filter(|y| (1900..=9999).contains(y))
            .ok_or_else(|| DateFilterError::InvalidYear(raw.to_string())),
    }
}

fn parse_month(value: Option<&str>, today: NaiveDate) -> Result<u32, DateFilterError> {
    match non_empty(value) {
        None => Ok(today.month()),
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| DateFilterError::InvalidMonth(raw.to_string())),
    }
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>, DateFilterError> {
    non_empty(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| DateFilterError::InvalidDate(raw.to_string()))
        })
        .transpose()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn first_of_next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        first_of_month(year + 1, 1)
    } else {
        first_of_month(year, month + 1)
    }
}

impl DateFilter {
    /// Interpret request parameters. Unknown filter types mean "all".
    pub fn parse(params: &DateFilterParams<'_>, today: NaiveDate) -> Result<Self, DateFilterError> {
        let kind = non_empty(params.filter_type)
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();

        match kind.as_str() {
            "today" | "daily" => Ok(DateFilter::Today),
            "week" | "weekly" => Ok(DateFilter::Week),
            "month" | "monthly" => Ok(DateFilter::Month {
                year: parse_year(params.year, today)?,
                month: parse_month(params.month, today)?,
            }),
            "year" | "yearly" => Ok(DateFilter::Year(parse_year(params.year, today)?)),
            "custom" | "range" => {
                let start = parse_date(params.start_date)?;
                let end = parse_date(params.end_date)?;
                if let (Some(s), Some(e)) = (start, end) {
                    if s > e {
                        return Err(DateFilterError::InvertedRange { start: s, end: e });
                    }
                }
                Ok(DateFilter::Custom { start, end })
            }
            _ => Ok(DateFilter::All),
        }
    }

    /// Resolve to concrete timestamp bounds relative to `today`
    pub fn bounds(&self, today: NaiveDate) -> DateBounds {
        match self {
            DateFilter::All => DateBounds::default(),
            DateFilter::Today => DateBounds {
                start: Some(midnight(today)),
                end: Some(midnight(today + Duration::days(1))),
            },
            DateFilter::Week => {
                let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
                DateBounds {
                    start: Some(midnight(monday)),
                    end: Some(midnight(monday + Duration::days(7))),
                }
            }
            DateFilter::Month { year, month } => DateBounds {
                start: first_of_month(*year, *month).map(midnight),
                end: first_of_next_month(*year, *month).map(midnight),
            },
            DateFilter::Year(year) => DateBounds {
                start: NaiveDate::from_ymd_opt(*year, 1, 1).map(midnight),
                end: NaiveDate::from_ymd_opt(*year + 1, 1, 1).map(midnight),
            },
            DateFilter::Custom { start, end } => DateBounds {
                start: start.map(midnight),
                end: end.map(|d| midnight(d + Duration::days(1))),
            },
        }
    }

    /// Suffix appended to report titles, e.g. "January 2024"
    pub fn describe(&self, today: NaiveDate) -> Option<String> {
        match self {
            DateFilter::All => None,
            DateFilter::Today => Some(today.format("%b %d, %Y").to_string()),
            DateFilter::Week => {
                let bounds = self.bounds(today);
                let start = bounds.start?.date();
                let end = bounds.end?.date() - Duration::days(1);
                Some(format!("Week of {} - {}", start.format("%b %d, %Y"), end.format("%b %d, %Y")))
            }
            DateFilter::Month { year, month } => {
                first_of_month(*year, *month).map(|d| d.format("%B %Y").to_string())
            }
            DateFilter::Year(year) => Some(year.to_string()),
            DateFilter::Custom { start, end } => match (start, end) {
                (Some(s), Some(e)) => Some(format!("{} - {}", s.format("%b %d, %Y"), e.format("%b %d, %Y"))),
                (Some(s), None) => Some(format!("From {}", s.format("%b %d, %Y"))),
                (None, Some(e)) => Some(format!("Until {}", e.format("%b %d, %Y"))),
                (None, None) => None,
            },
        }
    }
}

impl DateBounds {
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    /// Same half-open test the SQL applies: `start <= at < end`
    fn within(bounds: &DateBounds, at: NaiveDateTime) -> bool {
        bounds.start.map_or(true, |s| at >= s) && bounds.end.map_or(true, |e| at < e)
    }

    #[test]
    fn test_year_filter_covers_whole_year() {
        let params = DateFilterParams {
            filter_type: Some("year"),
            year: Some("2023"),
            ..Default::default()
        };
        let bounds = DateFilter::parse(&params, today()).unwrap().bounds(today());
        assert!(within(&bounds, at(2023, 1, 1, 0)));
        assert!(within(&bounds, at(2023, 12, 31, 23)));
        assert!(!within(&bounds, at(2024, 1, 1, 0)));
        assert!(!within(&bounds, at(2022, 12, 31, 23)));
    }

    #[test]
    fn test_month_filter_defaults_to_current_month() {
        let params = DateFilterParams {
            filter_type: Some("month"),
            ..Default::default()
        };
        let filter = DateFilter::parse(&params, today()).unwrap();
        assert_eq!(filter, DateFilter::Month { year: 2024, month: 3 });
        assert_eq!(filter.describe(today()).as_deref(), Some("March 2024"));
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let bounds = DateFilter::Month { year: 2023, month: 12 }.bounds(today());
        assert_eq!(bounds.end, Some(at(2024, 1, 1, 0)));
    }

    #[test]
    fn test_week_starts_on_monday() {
        let bounds = DateFilter::Week.bounds(today());
        assert_eq!(bounds.start, Some(at(2024, 3, 11, 0)));
        assert_eq!(bounds.end, Some(at(2024, 3, 18, 0)));
    }

    #[test]
    fn test_custom_end_date_is_inclusive() {
        let params = DateFilterParams {
            filter_type: Some("custom"),
            start_date: Some("2024-02-01"),
            end_date: Some("2024-02-29"),
            ..Default::default()
        };
        let bounds = DateFilter::parse(&params, today()).unwrap().bounds(today());
        assert!(within(&bounds, at(2024, 2, 29, 23)));
        assert!(!within(&bounds, at(2024, 3, 1, 0)));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let bad_month = DateFilterParams {
            filter_type: Some("month"),
            month: Some("13"),
            ..Default::default()
        };
        assert_eq!(
            DateFilter::parse(&bad_month, today()),
            Err(DateFilterError::InvalidMonth("13".into()))
        );

        let inverted = DateFilterParams {
            filter_type: Some("custom"),
            start_date: Some("2024-05-01"),
            end_date: Some("2024-04-01"),
            ..Default::default()
        };
        assert!(matches!(
            DateFilter::parse(&inverted, today()),
            Err(DateFilterError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_unknown_filter_type_means_all() {
        let params = DateFilterParams {
            filter_type: Some("fortnight"),
            ..Default::default()
        };
        let filter = DateFilter::parse(&params, today()).unwrap();
        assert_eq!(filter, DateFilter::All);
        assert!(filter.bounds(today()).is_unbounded());
    }
}
