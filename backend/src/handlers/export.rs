//! Export download handler

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use shared::{ExportFormat, ExportTable, Role};

use crate::error::{AppError, AppResult};
use crate::handlers::params::{bracketed, param, required, RawParams};
use crate::middleware::{require_role, CurrentUser};
use crate::services::ExportService;
use crate::AppState;

/// Download an allowlisted table as CSV or spreadsheet
pub async fn export(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pairs): Query<RawParams>,
) -> AppResult<Response> {
    let name = required(&pairs, "table")?;
    let table = ExportTable::parse(name).ok_or_else(|| AppError::TableNotAllowed(name.to_string()))?;
    let format_param = param(&pairs, "format");
    let format = ExportFormat::parse(format_param).ok_or_else(|| {
        AppError::ValidationError(format!("Unsupported export format: {}", format_param.unwrap_or_default()))
    })?;

    if table == ExportTable::Users {
        require_role(&user, Role::Admin)?;
    }

    let file = ExportService::new(state.db.clone(), state.config.reports.max_records)
        .export(table, format, &bracketed(&pairs, "filters"))
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.body,
    )
        .into_response())
}
