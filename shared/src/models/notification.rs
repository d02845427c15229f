//! Notification kinds and deduplication keys

use serde::{Deserialize, Serialize};

use super::Category;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;
pub const DEFAULT_PENDING_RETURN_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LowStock,
    PendingReturn,
    Backup,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::LowStock => "low_stock",
            NotificationKind::PendingReturn => "pending_return",
            NotificationKind::Backup => "backup",
        }
    }
}

/// Key that keeps a threshold check from raising the same alert twice
pub fn low_stock_key(category: Category, item_id: i32) -> String {
    format!("low_stock:{}:{}", category.as_str(), item_id)
}

pub fn pending_return_key(category: Category, issuing_id: i32) -> String {
    format!("pending_return:{}:{}", category.as_str(), issuing_id)
}

/// Stock level label used by the low stock report and alerts. Only an exact
/// zero reads as out of stock; a negative total is drift and reads as low.
pub fn stock_status(total: i64, threshold: i64) -> &'static str {
    if total == 0 {
        "Out of Stock"
    } else if total <= threshold {
        "Low Stock"
    } else {
        "In Stock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keys_are_scoped_by_category() {
        assert_ne!(low_stock_key(Category::Papers, 4), low_stock_key(Category::Toner, 4));
        assert_eq!(pending_return_key(Category::Ribbons, 12), "pending_return:ribbons:12");
    }

    #[test]
    fn test_stock_status_boundaries() {
        assert_eq!(stock_status(0, 10), "Out of Stock");
        assert_eq!(stock_status(1, 10), "Low Stock");
        assert_eq!(stock_status(10, 10), "Low Stock");
        assert_eq!(stock_status(11, 10), "In Stock");
    }

    #[test]
    fn test_negative_stock_reads_as_low() {
        assert_eq!(stock_status(-2, 10), "Low Stock");
        assert_eq!(stock_status(-1, 0), "Low Stock");
    }
}
