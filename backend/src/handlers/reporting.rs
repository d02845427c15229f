//! Report generation handler
//!
//! The report endpoint always answers 200; failures travel in the body as
//! `{success: false, message}`.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use shared::ReportFailure;

use crate::middleware::CurrentUser;
use crate::services::reporting::{ReportParams, ReportQuery, ReportingService};
use crate::AppState;

/// Generate a report
pub async fn generate_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> Response {
    let today = Local::now().date_naive();

    let result = match ReportParams::from_query(query, today) {
        Ok(params) => {
            ReportingService::new(state.db.clone(), state.config.reports.clone())
                .generate(&params)
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            if err.is_internal() {
                tracing::error!(user_id = %user.user_id, error = ?err, "Report generation failed");
            } else {
                tracing::debug!(user_id = %user.user_id, error = %err, "Report request rejected");
            }
            Json(ReportFailure::new(err.public_message())).into_response()
        }
    }
}
