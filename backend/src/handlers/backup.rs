//! Backup management handlers (admin only)

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::Role;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{require_role, CurrentUser};
use crate::services::BackupManager;
use crate::AppState;

fn manager(state: &AppState) -> BackupManager {
    BackupManager::new(
        state.db.clone(),
        state.config.database.url.clone(),
        state.config.backup.clone(),
    )
}

/// List backups, newest first
pub async fn list_backups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    require_role(&user, Role::Admin)?;
    let backups = manager(&state).list_backups().await?;
    Ok(Json(json!({ "success": true, "backups": backups })))
}

/// Take a backup now
pub async fn create_backup(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    require_role(&user, Role::Admin)?;
    let backup = manager(&state).create_backup(Some(user.user_id)).await?;
    Ok(Json(json!({ "success": true, "backup": backup })))
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    pub max_age_days: Option<i64>,
    pub min_keep: Option<usize>,
}

/// Prune old backups
pub async fn cleanup_backups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CleanupQuery>,
) -> AppResult<Json<Value>> {
    require_role(&user, Role::Admin)?;
    let manager = manager(&state);
    let policy = manager
        .retention()
        .with_overrides(query.max_age_days, query.min_keep)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let outcome = manager.cleanup_old_backups(policy).await?;
    Ok(Json(json!({
        "success": true,
        "deleted": outcome.deleted,
        "kept": outcome.kept,
    })))
}

/// Delete one backup
pub async fn delete_backup(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_role(&user, Role::Admin)?;
    manager(&state).delete_backup(id).await?;
    Ok(Json(json!({ "success": true })))
}
