//! Search handler, dispatching on `action`

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};
use shared::{parse_flag, validate_search_query, SearchOptions, SearchTable, SortDirection, MAX_SEARCH_LIMIT};

use crate::error::{AppError, AppResult};
use crate::handlers::params::{bracketed, int_param, param, required, RawParams};
use crate::middleware::CurrentUser;
use crate::services::search::resolve_tables;
use crate::services::SearchService;
use crate::AppState;

fn search_term(pairs: &RawParams) -> AppResult<&str> {
    validate_search_query(required(pairs, "q")?).map_err(|e| AppError::ValidationError(e.to_string()))
}

/// Options common to every action
pub fn search_options(pairs: &RawParams, default_limit: i64) -> AppResult<SearchOptions> {
    Ok(SearchOptions {
        limit: int_param(param(pairs, "limit"), "limit", default_limit)?,
        offset: int_param(param(pairs, "offset"), "offset", 0)?,
        fuzzy: !parse_flag(param(pairs, "exact")),
        order_by: param(pairs, "order_by").map(str::to_string),
        order_dir: SortDirection::parse(param(pairs, "order_dir")).unwrap_or(SortDirection::Desc),
        filters: bracketed(pairs, "filters"),
    })
}

/// Search entry point
pub async fn search(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pairs): Query<RawParams>,
) -> AppResult<Json<Value>> {
    let service = SearchService::new(state.db.clone());
    let settings = &state.config.search;
    let action = param(&pairs, "action").unwrap_or("search");

    let body = match action {
        "search" | "global" => {
            let term = search_term(&pairs)?;
            let options = search_options(&pairs, settings.default_limit)?;
            let tables = resolve_tables(param(&pairs, "tables"))?;
            let results = service.global(term, &options, &tables).await?;

            if action == "search" {
                service.log_search(user.user_id, term, results.total_results).await?;
            }
            json!({ "success": true, "results": results })
        }
        "table" => {
            let name = required(&pairs, "table")?;
            let table = SearchTable::find(name).ok_or_else(|| AppError::TableNotAllowed(name.to_string()))?;
            let term = match param(&pairs, "q") {
                Some(q) => Some(validate_search_query(q).map_err(|e| AppError::ValidationError(e.to_string()))?),
                None => None,
            };
            let options = search_options(&pairs, settings.default_limit)?;
            json!({
                "success": true,
                "results": service.search_table(&table, term, &options).await?,
            })
        }
        "suggestions" => {
            let term = search_term(&pairs)?;
            let limit = int_param(param(&pairs, "limit"), "limit", settings.default_limit)?.clamp(1, MAX_SEARCH_LIMIT);
            json!({
                "success": true,
                "suggestions": service.suggestions(term, limit).await?,
            })
        }
        "recent" => {
            let limit = int_param(param(&pairs, "limit"), "limit", settings.default_limit)?.clamp(1, MAX_SEARCH_LIMIT);
            json!({
                "success": true,
                "searches": service.recent(user.user_id, limit).await?,
            })
        }
        "popular" => {
            let limit = int_param(param(&pairs, "limit"), "limit", settings.default_limit)?.clamp(1, MAX_SEARCH_LIMIT);
            json!({
                "success": true,
                "searches": service.popular(settings.popular_window_days, limit).await?,
            })
        }
        other => return Err(AppError::InvalidAction(other.to_string())),
    };

    Ok(Json(body))
}
