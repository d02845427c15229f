//! Search across the allowlisted inventory tables and the search history

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use shared::{
    prefix_pattern, Category, GlobalSearchResult, SearchOptions, SearchTable, SortDirection,
    TableSearchResult,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

use super::query::FilteredQuery;

/// Search service
#[derive(Clone)]
pub struct SearchService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecentSearch {
    pub query: String,
    pub searched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PopularSearch {
    pub query: String,
    pub count: i64,
}

/// Resolve a comma separated table list against the allowlist. An absent
/// or blank list means every table.
pub fn resolve_tables(tables: Option<&str>) -> AppResult<Vec<SearchTable>> {
    let requested: Vec<&str> = tables
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if requested.is_empty() {
        return Ok(SearchTable::allowlist());
    }

    requested
        .into_iter()
        .map(|name| SearchTable::find(name).ok_or_else(|| AppError::TableNotAllowed(name.to_string())))
        .collect()
}

/// Build the statement for one table. Column names are checked against the
/// table's allowlist before they reach the SQL text.
pub fn table_query(table: &SearchTable, term: Option<&str>, options: &SearchOptions) -> AppResult<FilteredQuery<'static>> {
    let mut query = FilteredQuery::new(format!("SELECT to_jsonb(r) AS row FROM {} r", table.name));

    if let Some(term) = term {
        let columns: Vec<String> = table.searchable.iter().map(|c| format!("r.{}", c)).collect();
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        query.any_column_matches(&columns, term, options.fuzzy);
    }

    for (column, value) in &options.filters {
        if !table.has_column(column) {
            return Err(AppError::ValidationError(format!(
                "Unknown filter column '{}' for {}",
                column, table.name
            )));
        }
        query.equals_text(&format!("r.{}", column), value);
    }

    let order_by = options.order_by.as_deref().unwrap_or("id");
    if !table.has_column(order_by) {
        return Err(AppError::ValidationError(format!(
            "Cannot order {} by '{}'",
            table.name, order_by
        )));
    }
    let mut order = vec![(format!("r.{}", order_by), options.order_dir)];
    if order_by != "id" {
        order.push(("r.id".to_string(), SortDirection::Desc));
    }

    query.order_by(&order).limit(options.limit).offset(options.offset);
    Ok(query)
}

impl SearchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn run(&self, table: &SearchTable, term: Option<&str>, options: &SearchOptions) -> AppResult<TableSearchResult> {
        let mut builder = table_query(table, term, options)?.into_builder();
        let rows = builder
            .build_query_scalar::<serde_json::Value>()
            .fetch_all(&self.db)
            .await?;

        Ok(TableSearchResult {
            table: table.name.to_string(),
            label: table.label(),
            count: rows.len(),
            rows,
        })
    }

    /// Fan a query out over several tables; tables without matches are left
    /// out of the result
    pub async fn global(&self, term: &str, options: &SearchOptions, tables: &[SearchTable]) -> AppResult<GlobalSearchResult> {
        options.validate()?;

        let mut results = Vec::with_capacity(tables.len());
        for table in tables {
            results.push(self.run(table, Some(term), options).await?);
        }

        let result = GlobalSearchResult::new(term.to_string(), results);
        tracing::debug!(query = term, total = result.total_results, "Global search");
        Ok(result)
    }

    /// Search or browse a single table
    pub async fn search_table(&self, table: &SearchTable, term: Option<&str>, options: &SearchOptions) -> AppResult<TableSearchResult> {
        options.validate()?;
        self.run(table, term, options).await
    }

    pub async fn log_search(&self, user_id: Uuid, query: &str, results_count: usize) -> AppResult<()> {
        sqlx::query("INSERT INTO search_log (user_id, query, results_count) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(query)
            .bind(i32::try_from(results_count).unwrap_or(i32::MAX))
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Prefix matches from past searches and item names
    pub async fn suggestions(&self, prefix: &str, limit: i64) -> AppResult<Vec<String>> {
        let pattern = prefix_pattern(prefix);

        let mut found = sqlx::query_scalar::<_, String>(
            r#"
            SELECT query
            FROM search_log
            WHERE query ILIKE $1
            GROUP BY query
            ORDER BY COUNT(*) DESC, query
            LIMIT $2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        for category in Category::ALL {
            let tables = category.tables();
            let sql = format!(
                "SELECT {item} FROM {master} WHERE {item} ILIKE $1 ORDER BY {item} LIMIT $2",
                item = tables.item_column,
                master = tables.master,
            );
            let names = sqlx::query_scalar::<_, String>(&sql)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(&self.db)
                .await?;
            found.extend(names);
        }

        Ok(merge_suggestions(found, limit))
    }

    /// The caller's most recent distinct queries
    pub async fn recent(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<RecentSearch>> {
        let searches = sqlx::query_as::<_, RecentSearch>(
            r#"
            SELECT query, MAX(searched_at) AS searched_at
            FROM search_log
            WHERE user_id = $1
            GROUP BY query
            ORDER BY searched_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(searches)
    }

    /// Most frequent queries over the last `window_days`
    pub async fn popular(&self, window_days: i64, limit: i64) -> AppResult<Vec<PopularSearch>> {
        let since = Utc::now() - Duration::days(window_days);
        let searches = sqlx::query_as::<_, PopularSearch>(
            r#"
            SELECT LOWER(query) AS query, COUNT(*) AS count
            FROM search_log
            WHERE searched_at >= $1
            GROUP BY LOWER(query)
            ORDER BY count DESC, query
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(searches)
    }
}

/// Case-insensitive dedup keeping first occurrence, capped at `limit`
pub fn merge_suggestions(candidates: Vec<String>, limit: i64) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.trim().to_lowercase()))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}
