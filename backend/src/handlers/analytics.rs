//! Analytics handler, dispatching on `action`

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Local, Months, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{Category, TrendPeriod, DEFAULT_CONSUMPTION_WINDOW_DAYS};

use crate::error::{AppError, AppResult};
use crate::handlers::params::{days_param, int_param};
use crate::middleware::CurrentUser;
use crate::services::AnalyticsService;
use crate::AppState;

const DEFAULT_HEATMAP_DAYS: i64 = 90;
const DEFAULT_TOP_ITEMS: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub action: Option<String>,
    pub period: Option<String>,
    pub days: Option<String>,
    pub months: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
}

impl AnalyticsQuery {
    fn category(&self) -> AppResult<Option<Category>> {
        match self.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            None => Ok(None),
            Some(raw) => Category::parse(raw)
                .map(Some)
                .ok_or_else(|| AppError::ValidationError(format!("Unknown category: {}", raw))),
        }
    }

    /// Start of the trend window: `months` wins over `days`, otherwise the
    /// period's default window
    fn trend_since(&self, period: TrendPeriod, today: NaiveDate) -> AppResult<NaiveDate> {
        if let Some(months) = self.months.as_deref().filter(|m| !m.trim().is_empty()) {
            let months = int_param(Some(months), "months", 12)?;
            let months = u32::try_from(months)
                .ok()
                .filter(|m| (1..=120).contains(m))
                .ok_or_else(|| AppError::ValidationError("months must be between 1 and 120".into()))?;
            return today
                .checked_sub_months(Months::new(months))
                .ok_or_else(|| AppError::ValidationError("months is out of range".into()));
        }
        let days = days_param(self.days.as_deref(), period.default_window_days())?;
        Ok(today - Duration::days(days))
    }
}

/// Analytics entry point
pub async fn analytics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<Value>> {
    let service = AnalyticsService::new(state.db.clone(), state.config.reports.low_stock_threshold);
    let today = Local::now().date_naive();
    let action = query.action.as_deref().unwrap_or("dashboard");

    let body = match action {
        "dashboard" => json!({
            "success": true,
            "dashboard": service.dashboard(user.user_id, today).await?,
        }),
        "trend" => {
            let period = TrendPeriod::parse(query.period.as_deref());
            let since = query.trend_since(period, today)?;
            json!({
                "success": true,
                "trend": service.trend(period, since, query.category()?).await?,
            })
        }
        "distribution" => json!({
            "success": true,
            "distribution": service.distribution(query.category()?).await?,
        }),
        "top_items" => {
            let days = days_param(query.days.as_deref(), DEFAULT_CONSUMPTION_WINDOW_DAYS)?;
            let limit = int_param(query.limit.as_deref(), "limit", DEFAULT_TOP_ITEMS)?.clamp(1, 100);
            json!({
                "success": true,
                "top_items": service.top_items(days, limit, query.category()?, today).await?,
            })
        }
        "comparison" => json!({
            "success": true,
            "comparison": service.comparison(today).await?,
        }),
        "predict" => {
            let days = days_param(query.days.as_deref(), DEFAULT_CONSUMPTION_WINDOW_DAYS)?;
            json!({
                "success": true,
                "predictions": service.predict(days, query.category()?, today).await?,
            })
        }
        "heatmap" => {
            let days = days_param(query.days.as_deref(), DEFAULT_HEATMAP_DAYS)?;
            json!({
                "success": true,
                "heatmap": service.heatmap(days, query.category()?, today).await?,
            })
        }
        "report" => json!({
            "success": true,
            "report": service.report(user.user_id, today).await?,
        }),
        other => return Err(AppError::InvalidAction(other.to_string())),
    };

    Ok(Json(body))
}
