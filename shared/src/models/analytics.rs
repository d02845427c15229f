//! Analytics vocabulary and the depletion projection

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONSUMPTION_WINDOW_DAYS: i64 = 30;
pub const CRITICAL_DAYS: i64 = 7;
pub const WARNING_DAYS: i64 = 30;

/// Grouping used by the trend chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
}

impl TrendPeriod {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("daily") | Some("day") => TrendPeriod::Daily,
            Some("weekly") | Some("week") => TrendPeriod::Weekly,
            _ => TrendPeriod::Monthly,
        }
    }

    /// Unit passed to `date_trunc`
    pub fn trunc_unit(&self) -> &'static str {
        match self {
            TrendPeriod::Daily => "day",
            TrendPeriod::Weekly => "week",
            TrendPeriod::Monthly => "month",
        }
    }

    /// Label format for a truncated period start
    pub fn label_format(&self) -> &'static str {
        match self {
            TrendPeriod::Daily => "%Y-%m-%d",
            TrendPeriod::Weekly => "%G-W%V",
            TrendPeriod::Monthly => "%Y-%m",
        }
    }

    /// Default look-back window in days
    pub fn default_window_days(&self) -> i64 {
        match self {
            TrendPeriod::Daily => 30,
            TrendPeriod::Weekly => 84,
            TrendPeriod::Monthly => 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    OutOfStock,
    Critical,
    Warning,
    Ok,
}

/// Linear run-rate projection for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepletionForecast {
    pub daily_rate: f64,
    pub days_remaining: Option<i64>,
    pub depletion_date: Option<NaiveDate>,
    pub status: ForecastStatus,
}

/// Days-to-zero from current stock and the average daily consumption over
/// the last `window_days`
pub fn project_depletion(
    stock: i64,
    consumed_in_window: i64,
    window_days: i64,
    today: NaiveDate,
) -> DepletionForecast {
    let window = window_days.max(1) as f64;
    let rate = consumed_in_window.max(0) as f64 / window;
    let daily_rate = (rate * 100.0).round() / 100.0;

    if stock <= 0 {
        return DepletionForecast {
            daily_rate,
            days_remaining: Some(0),
            depletion_date: Some(today),
            status: ForecastStatus::OutOfStock,
        };
    }

    // No consumption in the window: nothing to project
    if rate <= 0.0 {
        return DepletionForecast {
            daily_rate,
            days_remaining: None,
            depletion_date: None,
            status: ForecastStatus::Ok,
        };
    }

    let days = (stock as f64 / rate).floor() as i64;
    let status = if days < CRITICAL_DAYS {
        ForecastStatus::Critical
    } else if days < WARNING_DAYS {
        ForecastStatus::Warning
    } else {
        ForecastStatus::Ok
    };

    DepletionForecast {
        daily_rate,
        days_remaining: Some(days),
        depletion_date: today.checked_add_signed(Duration::days(days)),
        status,
    }
}

/// Percentage change from `previous` to `current`, rounded to one decimal
pub fn percent_change(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    let change = (current - previous) as f64 / previous as f64 * 100.0;
    Some((change * 10.0).round() / 10.0)
}
