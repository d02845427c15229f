//! Report request vocabulary and response envelope

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Category;

/// Report selected by the `report_type` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportKind {
    Receiving(Category),
    Issuing(Category),
    Return(Category),
    /// Receiving, issuing and returns merged into one timeline
    Lifecycle(Category),
    /// Receiving across every category merged into one timeline
    #[default]
    AllInventory,
    StockSummary,
    LowStock,
    SupplierSummary,
    DivisionSummary,
    TransactionSummary,
}

impl ReportKind {
    /// Parse `report_type`. Anything unrecognised falls back to the
    /// all-inventory report instead of failing.
    pub fn parse(value: Option<&str>) -> Self {
        let raw = match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v.to_ascii_lowercase(),
            None => return ReportKind::default(),
        };

        match raw.as_str() {
            "all_inventory" | "inventory" | "all" => return ReportKind::AllInventory,
            "stock_summary" | "stock" => return ReportKind::StockSummary,
            "low_stock" => return ReportKind::LowStock,
            "supplier_summary" | "suppliers" => return ReportKind::SupplierSummary,
            "division_summary" | "divisions" => return ReportKind::DivisionSummary,
            "transaction_summary" | "transactions" => return ReportKind::TransactionSummary,
            _ => {}
        }

        let Some((prefix, suffix)) = raw.split_once('_') else {
            return ReportKind::default();
        };
        let Some(category) = Category::parse(prefix) else {
            return ReportKind::default();
        };

        match suffix {
            "receiving" | "received" => ReportKind::Receiving(category),
            "issuing" | "issued" => ReportKind::Issuing(category),
            "return" | "returns" => ReportKind::Return(category),
            "combined" | "lifecycle" | "all" => ReportKind::Lifecycle(category),
            _ => ReportKind::default(),
        }
    }

    /// Canonical `report_type` value
    pub fn key(&self) -> String {
        match self {
            ReportKind::Receiving(c) => format!("{}_receiving", c.as_str()),
            ReportKind::Issuing(c) => format!("{}_issuing", c.as_str()),
            ReportKind::Return(c) => format!("{}_return", c.as_str()),
            ReportKind::Lifecycle(c) => format!("{}_combined", c.as_str()),
            ReportKind::AllInventory => "all_inventory".to_string(),
            ReportKind::StockSummary => "stock_summary".to_string(),
            ReportKind::LowStock => "low_stock".to_string(),
            ReportKind::SupplierSummary => "supplier_summary".to_string(),
            ReportKind::DivisionSummary => "division_summary".to_string(),
            ReportKind::TransactionSummary => "transaction_summary".to_string(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            ReportKind::Receiving(c) => format!("{} Receiving Report", c.label()),
            ReportKind::Issuing(c) => format!("{} Issuing Report", c.label()),
            ReportKind::Return(c) => format!("{} Returns Report", c.label()),
            ReportKind::Lifecycle(c) => format!("{} Complete Transaction Report", c.label()),
            ReportKind::AllInventory => "All Inventory Report".to_string(),
            ReportKind::StockSummary => "Stock Summary Report".to_string(),
            ReportKind::LowStock => "Low Stock Report".to_string(),
            ReportKind::SupplierSummary => "Supplier Summary Report".to_string(),
            ReportKind::DivisionSummary => "Division Consumption Report".to_string(),
            ReportKind::TransactionSummary => "Transaction Summary Report".to_string(),
        }
    }

    /// Every report the composer knows how to build
    pub fn all() -> Vec<ReportKind> {
        let mut kinds = Vec::with_capacity(18);
        for category in Category::ALL {
            kinds.push(ReportKind::Receiving(category));
            kinds.push(ReportKind::Issuing(category));
            kinds.push(ReportKind::Return(category));
            kinds.push(ReportKind::Lifecycle(category));
        }
        kinds.extend([
            ReportKind::AllInventory,
            ReportKind::StockSummary,
            ReportKind::LowStock,
            ReportKind::SupplierSummary,
            ReportKind::DivisionSummary,
            ReportKind::TransactionSummary,
        ]);
        kinds
    }
}

/// Abstract ordering requested by `sort_by`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Date,
    Quantity,
    Value,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value?.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortKey {
    fn default() -> Self {
        Self {
            field: SortField::Date,
            direction: SortDirection::Desc,
        }
    }
}

impl SortKey {
    /// Parse keys such as `value_desc`; unknown keys sort newest first
    pub fn parse(value: Option<&str>) -> Self {
        let Some(raw) = value.map(|v| v.trim().to_ascii_lowercase()) else {
            return SortKey::default();
        };
        let Some((field, direction)) = raw.rsplit_once('_') else {
            return SortKey::default();
        };
        let field = match field {
            "date" => SortField::Date,
            "quantity" | "qty" => SortField::Quantity,
            "value" | "amount" => SortField::Value,
            "item" | "name" | "model" => SortField::Item,
            _ => return SortKey::default(),
        };
        match SortDirection::parse(Some(direction)) {
            Some(direction) => SortKey { field, direction },
            None => SortKey::default(),
        }
    }
}

/// Optional substring filters from the advanced filter panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedFilters {
    pub supplier: Option<String>,
    pub item: Option<String>,
    pub code: Option<String>,
    pub lot: Option<String>,
    pub division: Option<String>,
}

impl AdvancedFilters {
    /// Blank values are treated as absent
    pub fn clean(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.supplier.is_none()
            && self.item.is_none()
            && self.code.is_none()
            && self.lot.is_none()
            && self.division.is_none()
    }
}

/// Aggregates shown under the report table. Only the fields relevant to
/// the report are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_receipts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_issuances: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_returns: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_jct: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_uct: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_quantity: Option<i64>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_received: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_issued: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_returned: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_movement: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_suppliers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_divisions: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_transactions: Option<i64>,
    /// Display rendering of `total_value`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value_formatted: Option<String>,
}

/// Successful report payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub success: bool,
    pub report_title: String,
    pub report_type: String,
    pub columns: Vec<String>,
    pub records: Vec<Vec<String>>,
    pub summary: ReportSummary,
    pub total_records: usize,
    pub generated_at: DateTime<Utc>,
}

impl ReportResponse {
    /// `total_records` is always derived from `records`
    pub fn new(
        kind: ReportKind,
        report_title: String,
        columns: Vec<String>,
        records: Vec<Vec<String>>,
        summary: ReportSummary,
    ) -> Self {
        Self {
            success: true,
            report_title,
            report_type: kind.key(),
            total_records: records.len(),
            columns,
            records,
            summary,
            generated_at: Utc::now(),
        }
    }
}

/// Failure payload. The report endpoint answers 200 even on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFailure {
    pub success: bool,
    pub message: String,
}

impl ReportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_report_type_falls_back() {
        assert_eq!(ReportKind::parse(Some("inks_receiving")), ReportKind::AllInventory);
        assert_eq!(ReportKind::parse(Some("papers_shredded")), ReportKind::AllInventory);
        assert_eq!(ReportKind::parse(Some("")), ReportKind::AllInventory);
        assert_eq!(ReportKind::parse(None), ReportKind::AllInventory);
    }

    #[test]
    fn test_report_keys_round_trip() {
        let kinds = ReportKind::all();
        assert_eq!(kinds.len(), 18);
        for kind in kinds {
            assert_eq!(ReportKind::parse(Some(&kind.key())), kind);
        }
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(
            SortKey::parse(Some("value_desc")),
            SortKey { field: SortField::Value, direction: SortDirection::Desc }
        );
        assert_eq!(
            SortKey::parse(Some("quantity_asc")),
            SortKey { field: SortField::Quantity, direction: SortDirection::Asc }
        );
        assert_eq!(SortKey::parse(Some("color_desc")), SortKey::default());
        assert_eq!(SortKey::parse(Some("date_sideways")), SortKey::default());
    }
}
