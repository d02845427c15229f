//! Notification service for in-app alerts
//!
//! Supports:
//! - Per-user notification inbox (list, read, dismiss)
//! - Low stock and pending return threshold checks
//! - Admin broadcast with deduplication by key

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use shared::format::{format_date, or_missing};
use shared::{
    low_stock_key, pending_return_key, stock_status, Category, NotificationKind, TableRole,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::report_sources::{select_sql, IssuingRow, MasterRow};

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
}

/// In-app notification
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub dedup_key: Option<String>,
    pub link: Option<String>,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Alert raised for every admin
#[derive(Debug, Clone, PartialEq)]
pub struct AdminAlert {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub dedup_key: Option<String>,
    pub link: Option<String>,
}

/// Outcome of a threshold check
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CheckOutcome {
    /// Rows that crossed the threshold
    pub matched: usize,
    /// Notifications actually inserted
    pub created: u64,
}

impl NotificationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Inbox
    // ========================================================================

    /// Get notifications for a user, newest first
    pub async fn list(&self, user_id: Uuid, unread_only: bool, limit: i64) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, kind, title, message, dedup_key, link,
                   is_read, is_dismissed, created_at, read_at
            FROM notifications
            WHERE user_id = $1
              AND is_dismissed = false
              AND ($2 = false OR is_read = false)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE user_id = $1 AND is_read = false AND is_dismissed = false
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification".to_string()));
        }

        Ok(())
    }

    /// Returns the number of notifications marked
    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = NOW()
            WHERE user_id = $1 AND is_read = false
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn dismiss(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_dismissed = true
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification".to_string()));
        }

        Ok(())
    }

    // ========================================================================
    // Broadcast
    // ========================================================================

    /// Insert the alert for every admin who has no undismissed notification
    /// with the same dedup key. Returns the number inserted.
    pub async fn notify_admins(&self, alert: &AdminAlert) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, title, message, dedup_key, link)
            SELECT u.id, $1, $2, $3, $4, $5
            FROM users u
            WHERE u.role = 'admin'
              AND ($4::text IS NULL OR NOT EXISTS (
                  SELECT 1 FROM notifications n
                  WHERE n.user_id = u.id AND n.dedup_key = $4 AND n.is_dismissed = false
              ))
            "#,
        )
        .bind(alert.kind.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(&alert.dedup_key)
        .bind(&alert.link)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // Threshold Checks
    // ========================================================================

    /// Raise an alert for every item whose combined stock is at or below
    /// `threshold`
    pub async fn check_low_stock(&self, threshold: i64) -> AppResult<CheckOutcome> {
        let mut outcome = CheckOutcome::default();

        for category in Category::ALL {
            let sql = format!(
                "{} WHERE (r.jct_stock + r.uct_stock) <= $1 ORDER BY r.id",
                select_sql(category.tables(), TableRole::Master)
            );
            let rows = sqlx::query_as::<_, MasterRow>(&sql)
                .bind(threshold)
                .fetch_all(&self.db)
                .await?;

            outcome.matched += rows.len();
            for row in &rows {
                outcome.created += self.notify_admins(&low_stock_alert(category, row, threshold)).await?;
            }
        }

        tracing::info!(
            threshold,
            matched = outcome.matched,
            created = outcome.created,
            "Low stock check finished"
        );
        Ok(outcome)
    }

    /// Raise an alert for every coded issuance older than `days` that has no
    /// return with the same code and item
    pub async fn check_pending_returns(&self, days: i64, today: NaiveDate) -> AppResult<CheckOutcome> {
        let cutoff = (today - Duration::days(days)).and_time(NaiveTime::MIN);
        let mut outcome = CheckOutcome::default();

        for category in Category::ALL {
            let tables = category.tables();
            let sql = format!(
                r#"
                {select}
                WHERE r.code IS NOT NULL AND TRIM(r.code) <> ''
                  AND r.issue_date < $1
                  AND NOT EXISTS (
                      SELECT 1 FROM {returns} x
                      WHERE x.code = r.code AND x.{item_id} IS NOT DISTINCT FROM r.{item_id}
                  )
                ORDER BY r.issue_date
                "#,
                select = select_sql(tables, TableRole::Issuing),
                returns = tables.returns,
                item_id = tables.item_id_column,
            );
            let rows = sqlx::query_as::<_, IssuingRow>(&sql)
                .bind(cutoff)
                .fetch_all(&self.db)
                .await?;

            outcome.matched += rows.len();
            for row in &rows {
                outcome.created += self
                    .notify_admins(&pending_return_alert(category, row, days))
                    .await?;
            }
        }

        tracing::info!(
            days,
            matched = outcome.matched,
            created = outcome.created,
            "Pending return check finished"
        );
        Ok(outcome)
    }
}

/// Alert text for an item at or under the threshold
pub fn low_stock_alert(category: Category, row: &MasterRow, threshold: i64) -> AdminAlert {
    let status = stock_status(row.total(), threshold);
    AdminAlert {
        kind: NotificationKind::LowStock,
        title: format!("{}: {}", status, row.item),
        message: format!(
            "{} {} has {} left (JCT {}, UCT {}); threshold is {}.",
            category.label(),
            row.item,
            row.total(),
            row.jct_stock,
            row.uct_stock,
            threshold
        ),
        dedup_key: Some(low_stock_key(category, row.id)),
        link: Some(format!("/reports?report_type=low_stock&category={}", category.as_str())),
    }
}

/// Alert text for an issuance still waiting for its return
pub fn pending_return_alert(category: Category, row: &IssuingRow, days: i64) -> AdminAlert {
    AdminAlert {
        kind: NotificationKind::PendingReturn,
        title: format!("Pending return: {}", row.item),
        message: format!(
            "{} {} issued to {} on {} (code {}) has not been returned after {} days.",
            category.label(),
            row.item,
            or_missing(row.division.as_deref()),
            format_date(row.event_date),
            or_missing(row.code.as_deref()),
            days
        ),
        dedup_key: Some(pending_return_key(category, row.id)),
        link: Some(format!("/reports?report_type={}_issuing", category.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_low_stock_alert_text() {
        let row = MasterRow {
            id: 12,
            item: "TN-2380".into(),
            jct_stock: 0,
            uct_stock: 0,
            unit_price: Decimal::ZERO,
            updated_at: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        };
        let alert = low_stock_alert(Category::Toner, &row, 10);
        assert_eq!(alert.title, "Out of Stock: TN-2380");
        assert_eq!(alert.dedup_key.as_deref(), Some("low_stock:toner:12"));
    }

    #[test]
    fn test_pending_return_alert_text() {
        let row = IssuingRow {
            id: 5,
            event_date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap().and_hms_opt(14, 0, 0).unwrap(),
            item_id: Some(2),
            item: "Epson LX-310".into(),
            lot_no: None,
            division: None,
            receiver_name: None,
            receiver_id: None,
            quantity: 1,
            code: Some("RB-77".into()),
        };
        let alert = pending_return_alert(Category::Ribbons, &row, 30);
        assert_eq!(alert.dedup_key.as_deref(), Some("pending_return:ribbons:5"));
        assert!(alert.message.contains("issued to N/A on Jan 09, 2024 (code RB-77)"));
    }
}
