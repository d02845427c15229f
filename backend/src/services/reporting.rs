//! Report composer
//!
//! Turns request parameters into one or more filtered statements per report
//! kind, runs them, and shapes the rows into a display table with summary
//! aggregates.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use shared::format::MISSING;
use shared::{
    AdvancedFilters, Category, CategoryTables, DateBounds, DateFilter, DateFilterParams, ReportKind,
    ReportResponse, ReportSummary, SortDirection, SortField, SortKey, TableRole,
};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use crate::config::ReportsConfig;
use crate::error::AppResult;

use super::provenance::{IssueIndex, ReceiptIndex};
use super::query::FilteredQuery;
use super::report_layout::{self as layout, CellFormat, GroupRow, LifecycleEvent, TotalsRow};
use super::report_sources::{
    apply_filters, date_column, order_terms, quantity_expression, select_sql, value_expression,
    IssuingRow, MasterRow, ReceivingRow, ReturnRow,
};
use super::timeline::{merge_newest_first, Stamped};

/// Raw report request parameters
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub report_type: Option<String>,
    pub filter_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub supplier: Option<String>,
    pub item: Option<String>,
    pub is_code: Option<String>,
    pub lot: Option<String>,
    pub division: Option<String>,
    pub sort_by: Option<String>,
    pub category: Option<String>,
}

/// Validated report request
#[derive(Debug, Clone)]
pub struct ReportParams {
    pub kind: ReportKind,
    pub date_filter: DateFilter,
    pub bounds: DateBounds,
    pub period: Option<String>,
    pub filters: AdvancedFilters,
    pub sort: SortKey,
    /// Narrows cross-category reports
    pub category: Option<Category>,
}

impl ReportParams {
    pub fn from_query(query: ReportQuery, today: NaiveDate) -> AppResult<Self> {
        let date_filter = DateFilter::parse(
            &DateFilterParams {
                filter_type: query.filter_type.as_deref(),
                year: query.year.as_deref(),
                month: query.month.as_deref(),
                start_date: query.start_date.as_deref(),
                end_date: query.end_date.as_deref(),
            },
            today,
        )?;

        Ok(Self {
            kind: ReportKind::parse(query.report_type.as_deref()),
            bounds: date_filter.bounds(today),
            period: date_filter.describe(today),
            date_filter,
            filters: AdvancedFilters {
                supplier: AdvancedFilters::clean(query.supplier),
                item: AdvancedFilters::clean(query.item),
                code: AdvancedFilters::clean(query.is_code),
                lot: AdvancedFilters::clean(query.lot),
                division: AdvancedFilters::clean(query.division),
            },
            sort: SortKey::parse(query.sort_by.as_deref()),
            category: query.category.as_deref().and_then(Category::parse),
        })
    }

    /// Report title with the period appended when one is selected
    pub fn title(&self) -> String {
        match (&self.period, self.kind) {
            // Stock reports show current levels whatever the period
            (_, ReportKind::StockSummary | ReportKind::LowStock) | (None, _) => self.kind.title(),
            (Some(period), _) => format!("{} - {}", self.kind.title(), period),
        }
    }

    fn categories(&self) -> Vec<Category> {
        Category::selection(self.category)
    }
}

/// Columns, formatted rows and aggregates of one report
#[derive(Debug)]
struct ReportTable {
    columns: Vec<String>,
    records: Vec<Vec<String>>,
    summary: ReportSummary,
}

/// Report composer
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
    settings: ReportsConfig,
}

impl ReportingService {
    pub fn new(db: PgPool, settings: ReportsConfig) -> Self {
        Self { db, settings }
    }

    fn format(&self) -> CellFormat {
        CellFormat::new(self.settings.currency_symbol.clone())
    }

    /// Build the report selected by `params`
    pub async fn generate(&self, params: &ReportParams) -> AppResult<ReportResponse> {
        let table = match params.kind {
            ReportKind::Receiving(category) => self.receiving_report(category, params).await?,
            ReportKind::Issuing(category) => self.issuing_report(category, params).await?,
            ReportKind::Return(category) => self.return_report(category, params).await?,
            ReportKind::Lifecycle(category) => self.lifecycle_report(category, params).await?,
            ReportKind::AllInventory => self.all_inventory_report(params).await?,
            ReportKind::StockSummary => self.stock_summary_report(params).await?,
            ReportKind::LowStock => self.low_stock_report(params).await?,
            ReportKind::SupplierSummary => self.supplier_summary_report(params).await?,
            ReportKind::DivisionSummary => self.division_summary_report(params).await?,
            ReportKind::TransactionSummary => self.transaction_summary_report(params).await?,
        };

        tracing::info!(
            report_type = %params.kind.key(),
            filter = ?params.date_filter,
            windowed = !params.bounds.is_unbounded(),
            advanced = !params.filters.is_empty(),
            records = table.records.len(),
            "Report generated"
        );

        Ok(ReportResponse::new(
            params.kind,
            params.title(),
            table.columns,
            table.records,
            table.summary,
        ))
    }

    async fn fetch<T>(&self, query: FilteredQuery<'_>) -> AppResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut builder = query.into_builder();
        let rows = builder.build_query_as::<T>().fetch_all(&self.db).await?;
        Ok(rows)
    }

    /// Rows of one role, ordered by `sort` and capped
    async fn fetch_rows<T>(
        &self,
        tables: &CategoryTables,
        role: TableRole,
        params: &ReportParams,
        sort: SortKey,
    ) -> AppResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let query = report_statement(tables, role, params, sort, self.settings.max_records);
        self.fetch(query).await
    }

    /// Receipts that may answer the receipt ladder for the given rows
    async fn receipts_for(
        &self,
        tables: &CategoryTables,
        lots: Vec<String>,
        models: Vec<String>,
    ) -> AppResult<Vec<ReceivingRow>> {
        if lots.is_empty() && models.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE LOWER(TRIM(r.lot_no)) = ANY($1) OR LOWER(TRIM(r.{})) = ANY($2)",
            select_sql(tables, TableRole::Receiving),
            tables.item_column,
        );
        let rows = sqlx::query_as::<_, ReceivingRow>(&sql)
            .bind(lots)
            .bind(models)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Issuances that may answer the issue ladder for the given returns
    async fn issues_for(
        &self,
        tables: &CategoryTables,
        codes: Vec<String>,
        lots: Vec<String>,
    ) -> AppResult<Vec<IssuingRow>> {
        if codes.is_empty() && lots.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE LOWER(TRIM(r.code)) = ANY($1) OR LOWER(TRIM(r.lot_no)) = ANY($2)",
            select_sql(tables, TableRole::Issuing),
        );
        let rows = sqlx::query_as::<_, IssuingRow>(&sql)
            .bind(codes)
            .bind(lots)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn receiving_report(&self, category: Category, params: &ReportParams) -> AppResult<ReportTable> {
        let tables = category.tables();
        let rows: Vec<ReceivingRow> = self
            .fetch_rows(tables, TableRole::Receiving, params, params.sort)
            .await?;
        let fmt = self.format();

        Ok(ReportTable {
            columns: layout::receiving_columns(category),
            records: rows.iter().map(|r| layout::receiving_record(r, &fmt)).collect(),
            summary: layout::receiving_summary(&rows, &fmt),
        })
    }

    async fn issuing_report(&self, category: Category, params: &ReportParams) -> AppResult<ReportTable> {
        let tables = category.tables();
        let rows: Vec<IssuingRow> = self
            .fetch_rows(tables, TableRole::Issuing, params, params.sort)
            .await?;

        let receipts = self
            .receipts_for(
                tables,
                lookup_keys(rows.iter().map(|r| r.lot_no.as_deref())),
                lookup_keys(rows.iter().map(|r| Some(r.item.as_str()))),
            )
            .await?;
        let receipt_index = ReceiptIndex::build(&receipts);

        Ok(ReportTable {
            columns: layout::issuing_columns(category),
            records: rows
                .iter()
                .map(|r| layout::issuing_record(r, &receipt_index))
                .collect(),
            summary: layout::issuing_summary(&rows),
        })
    }

    async fn return_report(&self, category: Category, params: &ReportParams) -> AppResult<ReportTable> {
        let tables = category.tables();
        let rows: Vec<ReturnRow> = self
            .fetch_rows(tables, TableRole::Return, params, params.sort)
            .await?;

        let lots = lookup_keys(rows.iter().map(|r| r.lot_no.as_deref()));
        let receipts = self
            .receipts_for(
                tables,
                lots.clone(),
                lookup_keys(rows.iter().map(|r| Some(r.item.as_str()))),
            )
            .await?;
        let issues = self
            .issues_for(tables, lookup_keys(rows.iter().map(|r| r.code.as_deref())), lots)
            .await?;
        let receipt_index = ReceiptIndex::build(&receipts);
        let issue_index = IssueIndex::build(&issues);

        Ok(ReportTable {
            columns: layout::return_columns(category),
            records: rows
                .iter()
                .map(|r| layout::return_record(r, &issue_index, &receipt_index))
                .collect(),
            summary: layout::return_summary(&rows),
        })
    }

    /// Receiving, issuing and returns of one category as a single timeline
    async fn lifecycle_report(&self, category: Category, params: &ReportParams) -> AppResult<ReportTable> {
        let tables = category.tables();
        let newest = SortKey::default();

        let received: Vec<ReceivingRow> = self
            .fetch_rows(tables, TableRole::Receiving, params, newest)
            .await?;
        let issued: Vec<IssuingRow> = self
            .fetch_rows(tables, TableRole::Issuing, params, newest)
            .await?;
        let returned: Vec<ReturnRow> = self
            .fetch_rows(tables, TableRole::Return, params, newest)
            .await?;

        let mut events = merge_newest_first(vec![
            received
                .into_iter()
                .map(|r| Stamped::new(r.event_date, LifecycleEvent::Received(r)))
                .collect(),
            issued
                .into_iter()
                .map(|r| Stamped::new(r.event_date, LifecycleEvent::Issued(r)))
                .collect(),
            returned
                .into_iter()
                .map(|r| Stamped::new(r.event_date, LifecycleEvent::Returned(r)))
                .collect(),
        ]);
        events.truncate(self.cap());

        let fmt = self.format();
        Ok(ReportTable {
            columns: layout::lifecycle_columns(category),
            records: events.iter().map(|e| layout::lifecycle_record(e, &fmt)).collect(),
            summary: layout::lifecycle_summary(&events),
        })
    }

    /// Receipts of every selected category as a single timeline
    async fn all_inventory_report(&self, params: &ReportParams) -> AppResult<ReportTable> {
        let mut streams = Vec::new();
        for category in params.categories() {
            let rows: Vec<ReceivingRow> = self
                .fetch_rows(category.tables(), TableRole::Receiving, params, SortKey::default())
                .await?;
            streams.push(
                rows.into_iter()
                    .map(|r| Stamped::new(r.event_date, (category, r)))
                    .collect(),
            );
        }

        let mut receipts = merge_newest_first(streams);
        receipts.truncate(self.cap());

        let fmt = self.format();
        Ok(ReportTable {
            columns: layout::all_inventory_columns(),
            records: receipts
                .iter()
                .map(|r| layout::all_inventory_record(r, &fmt))
                .collect(),
            summary: layout::all_inventory_summary(&receipts, &fmt),
        })
    }

    async fn stock_summary_report(&self, params: &ReportParams) -> AppResult<ReportTable> {
        let mut rows = Vec::new();
        for category in params.categories() {
            let master: Vec<MasterRow> = self
                .fetch_rows(category.tables(), TableRole::Master, params, params.sort)
                .await?;
            rows.extend(master.into_iter().map(|r| (category, r)));
        }
        sort_master_rows(&mut rows, params.sort);
        rows.truncate(self.cap());

        let threshold = self.settings.low_stock_threshold;
        let fmt = self.format();
        Ok(ReportTable {
            columns: layout::stock_columns(),
            records: rows
                .iter()
                .map(|(c, r)| layout::stock_record(*c, r, threshold, &fmt))
                .collect(),
            summary: layout::stock_summary(&rows, threshold, &fmt),
        })
    }

    /// Items whose combined stock is at or below the threshold, emptiest first
    async fn low_stock_report(&self, params: &ReportParams) -> AppResult<ReportTable> {
        let threshold = self.settings.low_stock_threshold;

        let mut rows = Vec::new();
        for category in params.categories() {
            let query = low_stock_statement(category.tables(), params, threshold, self.settings.max_records);
            let master: Vec<MasterRow> = self.fetch(query).await?;
            rows.extend(master.into_iter().map(|r| (category, r)));
        }
        rows.sort_by(|(_, a), (_, b)| a.total().cmp(&b.total()));
        rows.truncate(self.cap());

        Ok(ReportTable {
            columns: layout::low_stock_columns(),
            records: rows
                .iter()
                .map(|(c, r)| layout::low_stock_record(*c, r, threshold))
                .collect(),
            summary: layout::low_stock_summary(&rows, threshold),
        })
    }

    /// Aggregate one role per `name_expression` for every selected category
    async fn grouped(
        &self,
        role: TableRole,
        params: &ReportParams,
        name_column: &str,
    ) -> AppResult<Vec<(Category, GroupRow)>> {
        let mut groups = Vec::new();
        for category in params.categories() {
            let tables = category.tables();
            let name = format!("COALESCE(NULLIF(TRIM(r.{}), ''), '{}')", name_column, MISSING);
            let select = format!(
                "SELECT {name} AS name, COUNT(*) AS transactions, COUNT(DISTINCT r.{item_id}) AS items, \
                 COALESCE(SUM({quantity}), 0)::BIGINT AS quantity, \
                 COALESCE(SUM({value}), 0)::NUMERIC AS value, \
                 MAX({date}) AS last_date \
                 FROM {table} r",
                item_id = tables.item_id_column,
                quantity = quantity_expression(role),
                value = value_expression(role),
                date = date_column(role),
                table = tables.table(role),
            );
            let mut query = filtered_statement(tables, role, params, select);
            query.group_by(&name).limit(self.settings.max_records);
            let rows: Vec<GroupRow> = self.fetch(query).await?;
            groups.extend(rows.into_iter().map(|g| (category, g)));
        }
        sort_groups(&mut groups, params.sort);
        groups.truncate(self.cap());
        Ok(groups)
    }

    async fn supplier_summary_report(&self, params: &ReportParams) -> AppResult<ReportTable> {
        let groups = self.grouped(TableRole::Receiving, params, "supplier").await?;
        let fmt = self.format();
        Ok(ReportTable {
            columns: layout::supplier_columns(),
            records: groups
                .iter()
                .map(|(c, g)| layout::supplier_record(*c, g, &fmt))
                .collect(),
            summary: layout::supplier_summary(&groups, &fmt),
        })
    }

    async fn division_summary_report(&self, params: &ReportParams) -> AppResult<ReportTable> {
        let groups = self.grouped(TableRole::Issuing, params, "division").await?;
        Ok(ReportTable {
            columns: layout::division_columns(),
            records: groups
                .iter()
                .map(|(c, g)| layout::division_record(*c, g))
                .collect(),
            summary: layout::division_summary(&groups),
        })
    }

    /// Count and totals per category and transaction table
    async fn transaction_summary_report(&self, params: &ReportParams) -> AppResult<ReportTable> {
        let mut rows = Vec::new();
        for category in params.categories() {
            let tables = category.tables();
            for role in [TableRole::Receiving, TableRole::Issuing, TableRole::Return] {
                let select = format!(
                    "SELECT COUNT(*) AS transactions, \
                     COALESCE(SUM({quantity}), 0)::BIGINT AS quantity, \
                     COALESCE(SUM({value}), 0)::NUMERIC AS value \
                     FROM {table} r",
                    quantity = quantity_expression(role),
                    value = value_expression(role),
                    table = tables.table(role),
                );
                let mut builder = filtered_statement(tables, role, params, select).into_builder();
                let totals = builder
                    .build_query_as::<TotalsRow>()
                    .fetch_one(&self.db)
                    .await?;
                rows.push((category, role, totals));
            }
        }

        let fmt = self.format();
        Ok(ReportTable {
            columns: layout::transaction_columns(),
            records: rows
                .iter()
                .map(|(c, role, t)| layout::transaction_record(*c, *role, t, &fmt))
                .collect(),
            summary: layout::transaction_summary(&rows, &fmt),
        })
    }

    fn cap(&self) -> usize {
        usize::try_from(self.settings.max_records).unwrap_or(0)
    }
}

/// SELECT over one role with the report window and advanced filters.
/// Master rows carry current levels and ignore the window.
pub fn filtered_statement(
    tables: &CategoryTables,
    role: TableRole,
    params: &ReportParams,
    select: String,
) -> FilteredQuery<'static> {
    let mut query = FilteredQuery::new(select);
    if role != TableRole::Master {
        query.date_bounds(&date_column(role), &params.bounds);
    }
    if !params.filters.is_empty() {
        apply_filters(&mut query, tables, role, &params.filters);
    }
    query
}

/// Row listing for one role, ordered by `sort` and capped at `max_records`
pub fn report_statement(
    tables: &CategoryTables,
    role: TableRole,
    params: &ReportParams,
    sort: SortKey,
    max_records: i64,
) -> FilteredQuery<'static> {
    let mut query = filtered_statement(tables, role, params, select_sql(tables, role));
    query
        .order_by(&order_terms(tables, role, sort))
        .limit(max_records);
    query
}

/// Master rows at or below `threshold`, emptiest first
pub fn low_stock_statement(
    tables: &CategoryTables,
    params: &ReportParams,
    threshold: i64,
    max_records: i64,
) -> FilteredQuery<'static> {
    let total = quantity_expression(TableRole::Master);
    let mut query = filtered_statement(tables, TableRole::Master, params, select_sql(tables, TableRole::Master));
    query
        .at_most(&total, threshold)
        .order_by(&[
            (total.clone(), SortDirection::Asc),
            (format!("r.{}", tables.item_column), SortDirection::Asc),
        ])
        .limit(max_records);
    query
}

/// Distinct trimmed, lowercased lookup keys
fn lookup_keys<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    values
        .flatten()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Order master rows gathered from several categories by one sort key
pub fn sort_master_rows(rows: &mut [(Category, MasterRow)], sort: SortKey) {
    rows.sort_by(|(_, a), (_, b)| {
        let ordering = match sort.field {
            SortField::Date => a.updated_at.cmp(&b.updated_at),
            SortField::Quantity => a.total().cmp(&b.total()),
            SortField::Value => a.value().cmp(&b.value()),
            SortField::Item => a.item.to_lowercase().cmp(&b.item.to_lowercase()),
        };
        directed(ordering, sort.direction)
    });
}

/// Order aggregated groups by one sort key; value falls back to quantity
/// where the group has no priced rows
pub fn sort_groups(groups: &mut [(Category, GroupRow)], sort: SortKey) {
    groups.sort_by(|(_, a), (_, b)| {
        let ordering = match sort.field {
            SortField::Date => a.last_date.cmp(&b.last_date),
            SortField::Quantity => a.quantity.cmp(&b.quantity),
            SortField::Value => a.value.cmp(&b.value),
            SortField::Item => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        directed(ordering, sort.direction)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 20).unwrap()
    }

    #[test]
    fn test_params_from_query() {
        let query = ReportQuery {
            report_type: Some("papers_receiving".into()),
            filter_type: Some("year".into()),
            year: Some("2024".into()),
            sort_by: Some("value_desc".into()),
            supplier: Some("  ".into()),
            is_code: Some("RC-7".into()),
            ..Default::default()
        };
        let params = ReportParams::from_query(query, today()).unwrap();
        assert_eq!(params.kind, ReportKind::Receiving(Category::Papers));
        assert_eq!(params.date_filter, DateFilter::Year(2024));
        assert_eq!(params.sort.field, SortField::Value);
        assert_eq!(params.filters.supplier, None);
        assert_eq!(params.filters.code.as_deref(), Some("RC-7"));
        assert_eq!(params.title(), "Papers Receiving Report - 2024");
    }

    #[test]
    fn test_stock_titles_ignore_period() {
        let query = ReportQuery {
            report_type: Some("low_stock".into()),
            filter_type: Some("today".into()),
            ..Default::default()
        };
        let params = ReportParams::from_query(query, today()).unwrap();
        assert_eq!(params.title(), "Low Stock Report");
    }

    #[test]
    fn test_bad_month_is_rejected() {
        let query = ReportQuery {
            filter_type: Some("month".into()),
            month: Some("0".into()),
            ..Default::default()
        };
        assert!(ReportParams::from_query(query, today()).is_err());
    }

    #[test]
    fn test_lookup_keys_are_distinct_and_normalized() {
        let keys = lookup_keys([Some(" L-1"), Some("l-1"), None, Some(""), Some("L-2")].into_iter());
        assert_eq!(keys, vec!["l-1".to_string(), "l-2".to_string()]);
    }
}
