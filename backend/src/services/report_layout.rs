//! Columns, cell rendering and summaries for each report shape
//!
//! Everything here is pure: rows come in already fetched and ordered, and
//! leave as display strings.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::format::{
    badge, format_currency, format_date, format_quantity, or_missing, truncate_text, NOT_AVAILABLE,
    REASON_DISPLAY_CHARS,
};
use shared::{stock_status, Category, ReportSummary, TableRole};
use sqlx::FromRow;

use super::provenance::{IssueIndex, ReceiptIndex};
use super::report_sources::{IssuingRow, MasterRow, ReceivingRow, ReturnRow};
use super::timeline::Stamped;

/// Renders monetary cells with the configured symbol
#[derive(Debug, Clone)]
pub struct CellFormat {
    pub currency_symbol: String,
}

impl CellFormat {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn money(&self, value: Decimal) -> String {
        format_currency(value, &self.currency_symbol)
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

fn item_label(category: Category) -> &'static str {
    match category {
        Category::Papers => "Paper Type",
        Category::Toner => "Toner Model",
        Category::Ribbons => "Ribbon Model",
    }
}

fn category_badge(category: Category) -> String {
    let tone = match category {
        Category::Papers => "primary",
        Category::Toner => "dark",
        Category::Ribbons => "secondary",
    };
    badge(category.label(), tone)
}

fn role_badge(role: TableRole) -> String {
    let tone = match role {
        TableRole::Receiving => "success",
        TableRole::Issuing => "warning",
        TableRole::Return => "info",
        TableRole::Master => "secondary",
    };
    badge(role.label(), tone)
}

/// Cell for a best-effort lookup: `Not Available` when the ladder found no
/// row, `N/A` when it found one lacking the field
fn looked_up<T>(row: Option<&T>, field: impl Fn(&T) -> Option<&str>) -> String {
    match row {
        Some(row) => or_missing(field(row)),
        None => NOT_AVAILABLE.to_string(),
    }
}

// Receiving

pub fn receiving_columns(category: Category) -> Vec<String> {
    let mut cols = columns(&["Date", item_label(category)]);
    cols.extend(columns(&[
        "Lot No.",
        "Supplier",
        "JCT Qty",
        "UCT Qty",
        "Total Qty",
        "Unit Price",
        "Total Value",
        "Invoice No.",
        "PR No.",
    ]));
    cols
}

pub fn receiving_record(row: &ReceivingRow, fmt: &CellFormat) -> Vec<String> {
    vec![
        format_date(row.event_date),
        row.item.clone(),
        or_missing(row.lot_no.as_deref()),
        or_missing(row.supplier.as_deref()),
        format_quantity(row.jct_quantity as i64),
        format_quantity(row.uct_quantity as i64),
        format_quantity(row.quantity()),
        fmt.money(row.unit_price),
        fmt.money(row.value()),
        or_missing(row.invoice_no.as_deref()),
        or_missing(row.pr_no.as_deref()),
    ]
}

pub fn receiving_summary(rows: &[ReceivingRow], fmt: &CellFormat) -> ReportSummary {
    let total_value: Decimal = rows.iter().map(ReceivingRow::value).sum();
    ReportSummary {
        total_receipts: Some(rows.len() as i64),
        total_jct: Some(rows.iter().map(|r| r.jct_quantity as i64).sum()),
        total_uct: Some(rows.iter().map(|r| r.uct_quantity as i64).sum()),
        total_quantity: Some(rows.iter().map(ReceivingRow::quantity).sum()),
        total_value: Some(total_value),
        total_value_formatted: Some(fmt.money(total_value)),
        ..Default::default()
    }
}

// Issuing

pub fn issuing_columns(category: Category) -> Vec<String> {
    let mut cols = columns(&["Date", item_label(category)]);
    cols.extend(columns(&[
        "Lot No.",
        "Supplier",
        "Division",
        "Receiver",
        "Receiver ID",
        "Quantity",
        "Code",
    ]));
    cols
}

pub fn issuing_record(row: &IssuingRow, receipts: &ReceiptIndex<'_>) -> Vec<String> {
    let receipt = receipts.resolve(row.lot_no.as_deref(), row.item_id, &row.item);
    vec![
        format_date(row.event_date),
        row.item.clone(),
        or_missing(row.lot_no.as_deref()),
        looked_up(receipt.row, |r| r.supplier.as_deref()),
        or_missing(row.division.as_deref()),
        or_missing(row.receiver_name.as_deref()),
        or_missing(row.receiver_id.as_deref()),
        format_quantity(row.quantity as i64),
        or_missing(row.code.as_deref()),
    ]
}

pub fn issuing_summary(rows: &[IssuingRow]) -> ReportSummary {
    let mut divisions: Vec<String> = rows
        .iter()
        .filter_map(|r| r.division.as_deref())
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect();
    divisions.sort();
    divisions.dedup();

    ReportSummary {
        total_issuances: Some(rows.len() as i64),
        total_quantity: Some(rows.iter().map(|r| r.quantity as i64).sum()),
        total_divisions: Some(divisions.len() as i64),
        ..Default::default()
    }
}

// Returns

pub fn return_columns(category: Category) -> Vec<String> {
    let mut cols = columns(&["Date", item_label(category)]);
    cols.extend(columns(&[
        "Lot No.",
        "Code",
        "Quantity",
        "Returned By",
        "Reason",
        "Division",
        "Supplier",
    ]));
    cols
}

pub fn return_record(row: &ReturnRow, issues: &IssueIndex<'_>, receipts: &ReceiptIndex<'_>) -> Vec<String> {
    let issue = issues.resolve(row.code.as_deref(), row.lot_no.as_deref(), row.item_id);
    let receipt = receipts.resolve(row.lot_no.as_deref(), row.item_id, &row.item);
    let reason = row
        .reason
        .as_deref()
        .map(|r| truncate_text(r.trim(), REASON_DISPLAY_CHARS));

    vec![
        format_date(row.event_date),
        row.item.clone(),
        or_missing(row.lot_no.as_deref()),
        or_missing(row.code.as_deref()),
        format_quantity(row.quantity as i64),
        or_missing(row.returned_by.as_deref()),
        or_missing(reason.as_deref()),
        looked_up(issue.row, |r| r.division.as_deref()),
        looked_up(receipt.row, |r| r.supplier.as_deref()),
    ]
}

pub fn return_summary(rows: &[ReturnRow]) -> ReportSummary {
    ReportSummary {
        total_returns: Some(rows.len() as i64),
        total_quantity: Some(rows.iter().map(|r| r.quantity as i64).sum()),
        ..Default::default()
    }
}

// Lifecycle

/// One row of a category's full transaction history
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Received(ReceivingRow),
    Issued(IssuingRow),
    Returned(ReturnRow),
}

impl LifecycleEvent {
    pub fn role(&self) -> TableRole {
        match self {
            LifecycleEvent::Received(_) => TableRole::Receiving,
            LifecycleEvent::Issued(_) => TableRole::Issuing,
            LifecycleEvent::Returned(_) => TableRole::Return,
        }
    }

    pub fn at(&self) -> NaiveDateTime {
        match self {
            LifecycleEvent::Received(r) => r.event_date,
            LifecycleEvent::Issued(r) => r.event_date,
            LifecycleEvent::Returned(r) => r.event_date,
        }
    }

    pub fn quantity(&self) -> i64 {
        match self {
            LifecycleEvent::Received(r) => r.quantity(),
            LifecycleEvent::Issued(r) => r.quantity as i64,
            LifecycleEvent::Returned(r) => r.quantity as i64,
        }
    }
}

pub fn lifecycle_columns(category: Category) -> Vec<String> {
    let mut cols = columns(&["Date", "Type", item_label(category)]);
    cols.extend(columns(&[
        "Lot No.",
        "Quantity",
        "Supplier / Division / Returned By",
        "Reference",
        "Value",
        "Reason",
    ]));
    cols
}

pub fn lifecycle_record(event: &Stamped<LifecycleEvent>, fmt: &CellFormat) -> Vec<String> {
    let missing = || or_missing(None);
    let (item, lot, party, reference, value, reason) = match &event.row {
        LifecycleEvent::Received(r) => (
            &r.item,
            &r.lot_no,
            or_missing(r.supplier.as_deref()),
            or_missing(r.invoice_no.as_deref()),
            fmt.money(r.value()),
            missing(),
        ),
        LifecycleEvent::Issued(r) => (
            &r.item,
            &r.lot_no,
            or_missing(r.division.as_deref()),
            or_missing(r.code.as_deref()),
            missing(),
            missing(),
        ),
        LifecycleEvent::Returned(r) => (
            &r.item,
            &r.lot_no,
            or_missing(r.returned_by.as_deref()),
            or_missing(r.code.as_deref()),
            missing(),
            or_missing(
                r.reason
                    .as_deref()
                    .map(|text| truncate_text(text.trim(), REASON_DISPLAY_CHARS))
                    .as_deref(),
            ),
        ),
    };

    vec![
        format_date(event.at),
        role_badge(event.row.role()),
        item.clone(),
        or_missing(lot.as_deref()),
        format_quantity(event.row.quantity()),
        party,
        reference,
        value,
        reason,
    ]
}

pub fn lifecycle_summary(events: &[Stamped<LifecycleEvent>]) -> ReportSummary {
    let total_for = |role: TableRole| -> i64 {
        events
            .iter()
            .filter(|e| e.row.role() == role)
            .map(|e| e.row.quantity())
            .sum()
    };
    let received = total_for(TableRole::Receiving);
    let issued = total_for(TableRole::Issuing);
    let returned = total_for(TableRole::Return);

    ReportSummary {
        total_transactions: Some(events.len() as i64),
        total_received: Some(received),
        total_issued: Some(issued),
        total_returned: Some(returned),
        net_movement: Some(received - issued + returned),
        ..Default::default()
    }
}

// All inventory

pub fn all_inventory_columns() -> Vec<String> {
    columns(&[
        "Date",
        "Category",
        "Item",
        "Lot No.",
        "Supplier",
        "JCT Qty",
        "UCT Qty",
        "Total Qty",
        "Unit Price",
        "Total Value",
    ])
}

pub fn all_inventory_record(receipt: &Stamped<(Category, ReceivingRow)>, fmt: &CellFormat) -> Vec<String> {
    let (category, row) = &receipt.row;
    vec![
        format_date(receipt.at),
        category_badge(*category),
        row.item.clone(),
        or_missing(row.lot_no.as_deref()),
        or_missing(row.supplier.as_deref()),
        format_quantity(row.jct_quantity as i64),
        format_quantity(row.uct_quantity as i64),
        format_quantity(row.quantity()),
        fmt.money(row.unit_price),
        fmt.money(row.value()),
    ]
}

pub fn all_inventory_summary(receipts: &[Stamped<(Category, ReceivingRow)>], fmt: &CellFormat) -> ReportSummary {
    let total_value: Decimal = receipts.iter().map(|r| r.row.1.value()).sum();
    ReportSummary {
        total_receipts: Some(receipts.len() as i64),
        total_quantity: Some(receipts.iter().map(|r| r.row.1.quantity()).sum()),
        total_value: Some(total_value),
        total_value_formatted: Some(fmt.money(total_value)),
        ..Default::default()
    }
}

// Stock

pub fn stock_columns() -> Vec<String> {
    columns(&[
        "Category",
        "Item",
        "JCT Stock",
        "UCT Stock",
        "Total",
        "Unit Price",
        "Stock Value",
        "Status",
        "Last Updated",
    ])
}

pub fn stock_record(category: Category, row: &MasterRow, threshold: i64, fmt: &CellFormat) -> Vec<String> {
    vec![
        category.label().to_string(),
        row.item.clone(),
        format_quantity(row.jct_stock as i64),
        format_quantity(row.uct_stock as i64),
        format_quantity(row.total()),
        fmt.money(row.unit_price),
        fmt.money(row.value()),
        stock_status(row.total(), threshold).to_string(),
        format_date(row.updated_at),
    ]
}

pub fn stock_summary(rows: &[(Category, MasterRow)], threshold: i64, fmt: &CellFormat) -> ReportSummary {
    let total_value: Decimal = rows.iter().map(|(_, r)| r.value()).sum();
    let out_of_stock = rows.iter().filter(|(_, r)| r.total() == 0).count() as i64;
    let low_stock = rows
        .iter()
        .filter(|(_, r)| r.total() != 0 && r.total() <= threshold)
        .count() as i64;

    ReportSummary {
        total_items: Some(rows.len() as i64),
        total_jct: Some(rows.iter().map(|(_, r)| r.jct_stock as i64).sum()),
        total_uct: Some(rows.iter().map(|(_, r)| r.uct_stock as i64).sum()),
        total_quantity: Some(rows.iter().map(|(_, r)| r.total()).sum()),
        total_value: Some(total_value),
        total_value_formatted: Some(fmt.money(total_value)),
        out_of_stock: Some(out_of_stock),
        low_stock: Some(low_stock),
        threshold: Some(threshold),
        ..Default::default()
    }
}

pub fn low_stock_columns() -> Vec<String> {
    columns(&["Category", "Item", "JCT Stock", "UCT Stock", "Total", "Status", "Last Updated"])
}

pub fn low_stock_record(category: Category, row: &MasterRow, threshold: i64) -> Vec<String> {
    vec![
        category.label().to_string(),
        row.item.clone(),
        format_quantity(row.jct_stock as i64),
        format_quantity(row.uct_stock as i64),
        format_quantity(row.total()),
        stock_status(row.total(), threshold).to_string(),
        format_date(row.updated_at),
    ]
}

pub fn low_stock_summary(rows: &[(Category, MasterRow)], threshold: i64) -> ReportSummary {
    let out_of_stock = rows.iter().filter(|(_, r)| r.total() == 0).count() as i64;
    ReportSummary {
        total_items: Some(rows.len() as i64),
        out_of_stock: Some(out_of_stock),
        low_stock: Some(rows.len() as i64 - out_of_stock),
        total_quantity: Some(rows.iter().map(|(_, r)| r.total()).sum()),
        threshold: Some(threshold),
        ..Default::default()
    }
}

// Grouped summaries

/// One aggregated group (a supplier or a division) within a category
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct GroupRow {
    pub name: String,
    pub transactions: i64,
    pub items: i64,
    pub quantity: i64,
    pub value: Decimal,
    pub last_date: Option<NaiveDateTime>,
}

fn last_date_cell(at: Option<NaiveDateTime>) -> String {
    at.map(format_date).unwrap_or_else(|| or_missing(None))
}

pub fn supplier_columns() -> Vec<String> {
    columns(&[
        "Supplier",
        "Category",
        "Deliveries",
        "Items",
        "Total Qty",
        "Total Value",
        "Last Delivery",
    ])
}

pub fn supplier_record(category: Category, group: &GroupRow, fmt: &CellFormat) -> Vec<String> {
    vec![
        group.name.clone(),
        category.label().to_string(),
        format_quantity(group.transactions),
        format_quantity(group.items),
        format_quantity(group.quantity),
        fmt.money(group.value),
        last_date_cell(group.last_date),
    ]
}

fn distinct_names(groups: &[(Category, GroupRow)]) -> i64 {
    let mut names: Vec<String> = groups.iter().map(|(_, g)| g.name.to_lowercase()).collect();
    names.sort();
    names.dedup();
    names.len() as i64
}

pub fn supplier_summary(groups: &[(Category, GroupRow)], fmt: &CellFormat) -> ReportSummary {
    let total_value: Decimal = groups.iter().map(|(_, g)| g.value).sum();
    ReportSummary {
        total_suppliers: Some(distinct_names(groups)),
        total_receipts: Some(groups.iter().map(|(_, g)| g.transactions).sum()),
        total_quantity: Some(groups.iter().map(|(_, g)| g.quantity).sum()),
        total_value: Some(total_value),
        total_value_formatted: Some(fmt.money(total_value)),
        ..Default::default()
    }
}

pub fn division_columns() -> Vec<String> {
    columns(&["Division", "Category", "Issuances", "Items", "Total Qty", "Last Issue"])
}

pub fn division_record(category: Category, group: &GroupRow) -> Vec<String> {
    vec![
        group.name.clone(),
        category.label().to_string(),
        format_quantity(group.transactions),
        format_quantity(group.items),
        format_quantity(group.quantity),
        last_date_cell(group.last_date),
    ]
}

pub fn division_summary(groups: &[(Category, GroupRow)]) -> ReportSummary {
    ReportSummary {
        total_divisions: Some(distinct_names(groups)),
        total_issuances: Some(groups.iter().map(|(_, g)| g.transactions).sum()),
        total_quantity: Some(groups.iter().map(|(_, g)| g.quantity).sum()),
        ..Default::default()
    }
}

/// Count and totals for one table over the report window
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TotalsRow {
    pub transactions: i64,
    pub quantity: i64,
    pub value: Decimal,
}

pub fn transaction_columns() -> Vec<String> {
    columns(&["Category", "Type", "Transactions", "Total Qty", "Total Value"])
}

pub fn transaction_record(category: Category, role: TableRole, totals: &TotalsRow, fmt: &CellFormat) -> Vec<String> {
    let value = if role == TableRole::Receiving {
        fmt.money(totals.value)
    } else {
        or_missing(None)
    };
    vec![
        category.label().to_string(),
        role_badge(role),
        format_quantity(totals.transactions),
        format_quantity(totals.quantity),
        value,
    ]
}

pub fn transaction_summary(rows: &[(Category, TableRole, TotalsRow)], fmt: &CellFormat) -> ReportSummary {
    let quantity_for = |role: TableRole| -> i64 {
        rows.iter()
            .filter(|(_, r, _)| *r == role)
            .map(|(_, _, t)| t.quantity)
            .sum()
    };
    let received_value: Decimal = rows
        .iter()
        .filter(|(_, r, _)| *r == TableRole::Receiving)
        .map(|(_, _, t)| t.value)
        .sum();
    let received = quantity_for(TableRole::Receiving);
    let issued = quantity_for(TableRole::Issuing);
    let returned = quantity_for(TableRole::Return);

    ReportSummary {
        total_transactions: Some(rows.iter().map(|(_, _, t)| t.transactions).sum()),
        total_received: Some(received),
        total_issued: Some(issued),
        total_returned: Some(returned),
        net_movement: Some(received - issued + returned),
        total_value: Some(received_value),
        total_value_formatted: Some(fmt.money(received_value)),
        ..Default::default()
    }
}
