//! Analytics service: stock aggregates, movement trends and depletion
//! projections for the dashboard charts

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    percent_change, project_depletion, Category, DateBounds, DateFilter, DepletionForecast, TableRole,
    TrendPeriod,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

use super::notification::NotificationService;
use super::query::FilteredQuery;
use super::report_sources::{date_column, quantity_expression, select_sql, MasterRow};

/// Stock position of one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category: Category,
    pub item_count: i64,
    pub jct_stock: i64,
    pub uct_stock: i64,
    pub total_stock: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub stock_value: Decimal,
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub received_today: i64,
    pub issued_today: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MasterTotals {
    item_count: i64,
    jct_stock: i64,
    uct_stock: i64,
    stock_value: Decimal,
    low_stock: i64,
    out_of_stock: i64,
}

/// Dashboard headline numbers
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub categories: Vec<CategoryStats>,
    pub total_items: i64,
    pub total_stock: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
    pub unread_notifications: i64,
}

/// Quantities moved during one period
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub received: i64,
    pub issued: i64,
    pub returned: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub period: TrendPeriod,
    pub since: NaiveDate,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemShare {
    pub item: String,
    pub total: i64,
    pub share_percent: f64,
}

/// Stock of one category split by pool and by item
#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    pub category: Category,
    pub jct_stock: i64,
    pub uct_stock: i64,
    pub total: i64,
    pub items: Vec<ItemShare>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopItem {
    #[sqlx(skip)]
    pub category: Option<Category>,
    pub item: String,
    pub quantity: i64,
    pub issuances: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Movement {
    pub received: i64,
    pub issued: i64,
    pub returned: i64,
}

/// Current month against the previous one
#[derive(Debug, Clone, Serialize)]
pub struct CategoryComparison {
    pub category: Category,
    pub current: Movement,
    pub previous: Movement,
    pub received_change: Option<f64>,
    pub issued_change: Option<f64>,
    pub returned_change: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct ConsumptionRow {
    item_id: i32,
    item: String,
    stock: i64,
    consumed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemForecast {
    pub category: Category,
    pub item_id: i32,
    pub item: String,
    pub stock: i64,
    pub consumed: i64,
    #[serde(flatten)]
    pub forecast: DepletionForecast,
}

/// Issued quantity by ISO weekday (1 = Monday) and hour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub weekday: i32,
    pub hour: i32,
    pub quantity: i64,
}

/// Everything the analytics page shows at once
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub dashboard: DashboardStats,
    pub trend: TrendReport,
    pub top_items: Vec<TopItem>,
    pub predictions: Vec<ItemForecast>,
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

const MOVEMENT_ROLES: [TableRole; 3] = [TableRole::Receiving, TableRole::Issuing, TableRole::Return];

/// Analytics service
#[derive(Clone)]
pub struct AnalyticsService {
    db: PgPool,
    low_stock_threshold: i64,
}

impl AnalyticsService {
    pub fn new(db: PgPool, low_stock_threshold: i64) -> Self {
        Self {
            db,
            low_stock_threshold,
        }
    }

    /// Sum of quantities of one role inside a window
    async fn moved(&self, category: Category, role: TableRole, bounds: &DateBounds) -> AppResult<i64> {
        let tables = category.tables();
        let mut query = FilteredQuery::new(format!(
            "SELECT COALESCE(SUM({}), 0)::BIGINT FROM {} r",
            quantity_expression(role),
            tables.table(role)
        ));
        query.date_bounds(&date_column(role), bounds);
        let mut builder = query.into_builder();
        let total = builder.build_query_scalar::<i64>().fetch_one(&self.db).await?;
        Ok(total)
    }

    async fn count_in(&self, category: Category, role: TableRole, bounds: &DateBounds) -> AppResult<i64> {
        let mut query = FilteredQuery::new(format!("SELECT COUNT(*) FROM {} r", category.tables().table(role)));
        query.date_bounds(&date_column(role), bounds);
        let mut builder = query.into_builder();
        let count = builder.build_query_scalar::<i64>().fetch_one(&self.db).await?;
        Ok(count)
    }

    pub async fn dashboard(&self, user_id: Uuid, today: NaiveDate) -> AppResult<DashboardStats> {
        let today_bounds = DateFilter::Today.bounds(today);
        let mut categories = Vec::with_capacity(Category::ALL.len());

        for category in Category::ALL {
            let sql = format!(
                r#"
                SELECT
                    COUNT(*) AS item_count,
                    COALESCE(SUM(jct_stock), 0)::BIGINT AS jct_stock,
                    COALESCE(SUM(uct_stock), 0)::BIGINT AS uct_stock,
                    COALESCE(SUM((jct_stock + uct_stock) * unit_price), 0)::NUMERIC AS stock_value,
                    COUNT(*) FILTER (WHERE jct_stock + uct_stock <> 0 AND jct_stock + uct_stock <= $1) AS low_stock,
                    COUNT(*) FILTER (WHERE jct_stock + uct_stock = 0) AS out_of_stock
                FROM {}
                "#,
                category.tables().master
            );
            let totals = sqlx::query_as::<_, MasterTotals>(&sql)
                .bind(self.low_stock_threshold)
                .fetch_one(&self.db)
                .await?;

            categories.push(CategoryStats {
                category,
                item_count: totals.item_count,
                jct_stock: totals.jct_stock,
                uct_stock: totals.uct_stock,
                total_stock: totals.jct_stock + totals.uct_stock,
                stock_value: totals.stock_value,
                low_stock: totals.low_stock,
                out_of_stock: totals.out_of_stock,
                received_today: self.count_in(category, TableRole::Receiving, &today_bounds).await?,
                issued_today: self.count_in(category, TableRole::Issuing, &today_bounds).await?,
            });
        }

        let unread_notifications = NotificationService::new(self.db.clone())
            .unread_count(user_id)
            .await?;

        Ok(DashboardStats {
            total_items: categories.iter().map(|c| c.item_count).sum(),
            total_stock: categories.iter().map(|c| c.total_stock).sum(),
            total_value: categories.iter().map(|c| c.stock_value).sum(),
            categories,
            unread_notifications,
        })
    }

    /// Received, issued and returned quantities per period since `since`
    pub async fn trend(
        &self,
        period: TrendPeriod,
        since: NaiveDate,
        category: Option<Category>,
    ) -> AppResult<TrendReport> {
        let mut buckets: BTreeMap<NaiveDateTime, TrendPoint> = BTreeMap::new();

        for category in Category::selection(category) {
            let tables = category.tables();
            for role in MOVEMENT_ROLES {
                let date = date_column(role);
                let mut query = FilteredQuery::new(format!(
                    "SELECT DATE_TRUNC('{unit}', {date}) AS bucket, COALESCE(SUM({qty}), 0)::BIGINT AS quantity \
                     FROM {table} r",
                    unit = period.trunc_unit(),
                    qty = quantity_expression(role),
                    table = tables.table(role),
                ));
                query.since(&date, midnight(since)).group_by("bucket");
                let mut builder = query.into_builder();
                let rows = builder
                    .build_query_as::<(NaiveDateTime, i64)>()
                    .fetch_all(&self.db)
                    .await?;

                for (bucket, quantity) in rows {
                    let point = buckets.entry(bucket).or_insert_with(|| TrendPoint {
                        period: bucket.format(period.label_format()).to_string(),
                        ..Default::default()
                    });
                    match role {
                        TableRole::Receiving => point.received += quantity,
                        TableRole::Issuing => point.issued += quantity,
                        _ => point.returned += quantity,
                    }
                }
            }
        }

        Ok(TrendReport {
            period,
            since,
            points: buckets.into_values().collect(),
        })
    }

    pub async fn distribution(&self, category: Option<Category>) -> AppResult<Vec<Distribution>> {
        let mut out = Vec::new();
        for category in Category::selection(category) {
            let tables = category.tables();
            let sql = format!("{} ORDER BY (r.jct_stock + r.uct_stock) DESC, r.id", select_sql(tables, TableRole::Master));
            let rows = sqlx::query_as::<_, MasterRow>(&sql).fetch_all(&self.db).await?;
            out.push(distribution_of(category, &rows));
        }
        Ok(out)
    }

    /// Most issued items over the last `days`
    pub async fn top_items(
        &self,
        days: i64,
        limit: i64,
        category: Option<Category>,
        today: NaiveDate,
    ) -> AppResult<Vec<TopItem>> {
        let since = midnight(today - Duration::days(days));
        let mut items = Vec::new();

        for category in Category::selection(category) {
            let tables = category.tables();
            let mut query = FilteredQuery::new(format!(
                "SELECT r.{item} AS item, COALESCE(SUM(r.quantity), 0)::BIGINT AS quantity, COUNT(*) AS issuances \
                 FROM {table} r",
                item = tables.item_column,
                table = tables.issuing,
            ));
            query
                .since("r.issue_date", since)
                .group_by(&format!("r.{}", tables.item_column))
                .raw(" ORDER BY quantity DESC")
                .limit(limit);
            let mut builder = query.into_builder();
            let rows = builder.build_query_as::<TopItem>().fetch_all(&self.db).await?;
            items.extend(rows.into_iter().map(|mut item| {
                item.category = Some(category);
                item
            }));
        }

        items.sort_by(|a, b| b.quantity.cmp(&a.quantity));
        items.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(items)
    }

    /// This month against last month, per category
    pub async fn comparison(&self, today: NaiveDate) -> AppResult<Vec<CategoryComparison>> {
        let current = DateFilter::Month {
            year: today.year(),
            month: today.month(),
        }
        .bounds(today);
        let (prev_year, prev_month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        let previous = DateFilter::Month {
            year: prev_year,
            month: prev_month,
        }
        .bounds(today);

        let mut out = Vec::new();
        for category in Category::ALL {
            let now = self.movement(category, &current).await?;
            let before = self.movement(category, &previous).await?;
            out.push(CategoryComparison {
                category,
                received_change: percent_change(now.received, before.received),
                issued_change: percent_change(now.issued, before.issued),
                returned_change: percent_change(now.returned, before.returned),
                current: now,
                previous: before,
            });
        }
        Ok(out)
    }

    async fn movement(&self, category: Category, bounds: &DateBounds) -> AppResult<Movement> {
        Ok(Movement {
            received: self.moved(category, TableRole::Receiving, bounds).await?,
            issued: self.moved(category, TableRole::Issuing, bounds).await?,
            returned: self.moved(category, TableRole::Return, bounds).await?,
        })
    }

    /// Depletion projection per item from consumption over the last `days`
    pub async fn predict(
        &self,
        days: i64,
        category: Option<Category>,
        today: NaiveDate,
    ) -> AppResult<Vec<ItemForecast>> {
        let since = midnight(today - Duration::days(days));
        let mut forecasts = Vec::new();

        for category in Category::selection(category) {
            let tables = category.tables();
            let sql = format!(
                r#"
                SELECT
                    m.id AS item_id,
                    m.{item} AS item,
                    (m.jct_stock + m.uct_stock)::BIGINT AS stock,
                    COALESCE(SUM(i.quantity), 0)::BIGINT AS consumed
                FROM {master} m
                LEFT JOIN {issuing} i ON i.{item_id} = m.id AND i.issue_date >= $1
                GROUP BY m.id
                "#,
                item = tables.item_column,
                master = tables.master,
                issuing = tables.issuing,
                item_id = tables.item_id_column,
            );
            let rows = sqlx::query_as::<_, ConsumptionRow>(&sql)
                .bind(since)
                .fetch_all(&self.db)
                .await?;

            forecasts.extend(rows.into_iter().map(|row| ItemForecast {
                category,
                forecast: project_depletion(row.stock, row.consumed, days, today),
                item_id: row.item_id,
                item: row.item,
                stock: row.stock,
                consumed: row.consumed,
            }));
        }

        sort_by_urgency(&mut forecasts);
        Ok(forecasts)
    }

    pub async fn heatmap(&self, days: i64, category: Option<Category>, today: NaiveDate) -> AppResult<Vec<HeatmapCell>> {
        let since = midnight(today - Duration::days(days));
        let mut cells: BTreeMap<(i32, i32), i64> = BTreeMap::new();

        for category in Category::selection(category) {
            let mut query = FilteredQuery::new(format!(
                "SELECT EXTRACT(ISODOW FROM r.issue_date)::INT AS weekday, \
                 EXTRACT(HOUR FROM r.issue_date)::INT AS hour, \
                 COALESCE(SUM(r.quantity), 0)::BIGINT AS quantity \
                 FROM {} r",
                category.tables().issuing
            ));
            query.since("r.issue_date", since).group_by("1, 2");
            let mut builder = query.into_builder();
            let rows = builder
                .build_query_as::<(i32, i32, i64)>()
                .fetch_all(&self.db)
                .await?;
            for (weekday, hour, quantity) in rows {
                *cells.entry((weekday, hour)).or_default() += quantity;
            }
        }

        Ok(cells
            .into_iter()
            .map(|((weekday, hour), quantity)| HeatmapCell { weekday, hour, quantity })
            .collect())
    }

    pub async fn report(&self, user_id: Uuid, today: NaiveDate) -> AppResult<AnalyticsReport> {
        let period = TrendPeriod::default();
        let since = today - Duration::days(period.default_window_days());
        Ok(AnalyticsReport {
            dashboard: self.dashboard(user_id, today).await?,
            trend: self.trend(period, since, None).await?,
            top_items: self.top_items(shared::DEFAULT_CONSUMPTION_WINDOW_DAYS, 10, None, today).await?,
            predictions: self
                .predict(shared::DEFAULT_CONSUMPTION_WINDOW_DAYS, None, today)
                .await?,
        })
    }
}

/// Pool split and per-item share of one category's stock
pub fn distribution_of(category: Category, rows: &[MasterRow]) -> Distribution {
    let jct_stock: i64 = rows.iter().map(|r| r.jct_stock as i64).sum();
    let uct_stock: i64 = rows.iter().map(|r| r.uct_stock as i64).sum();
    let total = jct_stock + uct_stock;

    let items = rows
        .iter()
        .map(|r| {
            let share = if total > 0 {
                (r.total() as f64 / total as f64 * 1000.0).round() / 10.0
            } else {
                0.0
            };
            ItemShare {
                item: r.item.clone(),
                total: r.total(),
                share_percent: share,
            }
        })
        .collect();

    Distribution {
        category,
        jct_stock,
        uct_stock,
        total,
        items,
    }
}

/// Soonest depletion first; items that never deplete last
pub fn sort_by_urgency(forecasts: &mut [ItemForecast]) {
    forecasts.sort_by(|a, b| {
        let key = |f: &ItemForecast| f.forecast.days_remaining.unwrap_or(i64::MAX);
        key(a).cmp(&key(b)).then_with(|| a.item.cmp(&b.item))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ForecastStatus;

    fn master(id: i32, item: &str, jct: i32, uct: i32) -> MasterRow {
        MasterRow {
            id,
            item: item.into(),
            jct_stock: jct,
            uct_stock: uct,
            unit_price: Decimal::ONE,
            updated_at: midnight(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        }
    }

    #[test]
    fn test_distribution_shares() {
        let rows = vec![master(1, "A4", 30, 45), master(2, "Legal", 20, 5)];
        let dist = distribution_of(Category::Papers, &rows);
        assert_eq!((dist.jct_stock, dist.uct_stock, dist.total), (50, 50, 100));
        assert_eq!(dist.items[0].share_percent, 75.0);
        assert_eq!(dist.items[1].share_percent, 25.0);
    }

    #[test]
    fn test_distribution_of_empty_stock() {
        let dist = distribution_of(Category::Toner, &[master(1, "TN-1", 0, 0)]);
        assert_eq!(dist.items[0].share_percent, 0.0);
    }

    #[test]
    fn test_urgent_items_first() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let forecast = |item: &str, stock: i64, consumed: i64| ItemForecast {
            category: Category::Ribbons,
            item_id: 1,
            item: item.into(),
            stock,
            consumed,
            forecast: project_depletion(stock, consumed, 30, today),
        };
        let mut list = vec![forecast("idle", 50, 0), forecast("slow", 100, 30), forecast("fast", 10, 60)];
        sort_by_urgency(&mut list);
        let order: Vec<_> = list.iter().map(|f| f.item.as_str()).collect();
        assert_eq!(order, vec!["fast", "slow", "idle"]);
        assert_eq!(list[2].forecast.status, ForecastStatus::Ok);
        assert_eq!(list[2].forecast.days_remaining, None);
    }
}
