//! HTTP handler for notification actions
//!
//! GET and POST share one entry point and dispatch on `action`.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{parse_flag, validate_threshold, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::params::{days_param, int_param};
use crate::middleware::{require_role, CurrentUser};
use crate::services::NotificationService;
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub action: Option<String>,
    pub id: Option<String>,
    pub unread_only: Option<String>,
    pub limit: Option<String>,
    pub threshold: Option<String>,
    pub days: Option<String>,
}

impl NotificationQuery {
    fn notification_id(&self) -> AppResult<Uuid> {
        let raw = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::MissingParameter("id".to_string()))?;
        Uuid::parse_str(raw).map_err(|_| AppError::ValidationError(format!("Invalid notification id: {}", raw)))
    }
}

/// Notification entry point
pub async fn notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Value>> {
    let service = NotificationService::new(state.db.clone());
    let defaults = &state.config.notifications;
    let action = query.action.as_deref().unwrap_or("list");

    let body = match action {
        "list" => {
            let limit = int_param(query.limit.as_deref(), "limit", DEFAULT_LIST_LIMIT)?.clamp(1, 200);
            let unread_only = parse_flag(query.unread_only.as_deref());
            json!({
                "success": true,
                "notifications": service.list(user.user_id, unread_only, limit).await?,
                "unread_count": service.unread_count(user.user_id).await?,
            })
        }
        "unread_count" => json!({
            "success": true,
            "count": service.unread_count(user.user_id).await?,
        }),
        "mark_read" => {
            service.mark_read(user.user_id, query.notification_id()?).await?;
            json!({ "success": true })
        }
        "mark_all_read" => json!({
            "success": true,
            "updated": service.mark_all_read(user.user_id).await?,
        }),
        "dismiss" => {
            service.dismiss(user.user_id, query.notification_id()?).await?;
            json!({ "success": true })
        }
        "check_low_stock" => {
            require_role(&user, Role::Admin)?;
            let threshold = int_param(query.threshold.as_deref(), "threshold", defaults.low_stock_threshold)?;
            let threshold = validate_threshold(threshold).map_err(|e| AppError::ValidationError(e.to_string()))?;
            let outcome = service.check_low_stock(threshold).await?;
            json!({
                "success": true,
                "matched": outcome.matched,
                "created": outcome.created,
            })
        }
        "check_pending_returns" => {
            require_role(&user, Role::Admin)?;
            let days = days_param(query.days.as_deref(), defaults.pending_return_days)?;
            let outcome = service
                .check_pending_returns(days, Local::now().date_naive())
                .await?;
            json!({
                "success": true,
                "matched": outcome.matched,
                "created": outcome.created,
            })
        }
        other => return Err(AppError::InvalidAction(other.to_string())),
    };

    Ok(Json(body))
}
