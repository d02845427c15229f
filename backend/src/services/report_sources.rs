//! Row sources for the report composer
//!
//! Each per-category table role has one row shape, one SELECT list that
//! aliases the category's column names onto that shape, and one mapping from
//! abstract sort keys and filters to concrete expressions.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::{AdvancedFilters, CategoryTables, SortDirection, SortField, SortKey, TableRole};
use sqlx::FromRow;

use super::query::FilteredQuery;

/// Alias used for the primary table in every report statement
pub const ALIAS: &str = "r";

/// A receipt of stock
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReceivingRow {
    pub id: i32,
    pub event_date: NaiveDateTime,
    pub item_id: Option<i32>,
    pub item: String,
    pub lot_no: Option<String>,
    pub supplier: Option<String>,
    pub jct_quantity: i32,
    pub uct_quantity: i32,
    pub unit_price: Decimal,
    pub invoice_no: Option<String>,
    pub pr_no: Option<String>,
}

impl ReceivingRow {
    pub fn quantity(&self) -> i64 {
        self.jct_quantity as i64 + self.uct_quantity as i64
    }

    pub fn value(&self) -> Decimal {
        Decimal::from(self.quantity()) * self.unit_price
    }
}

/// An allocation of stock to a division
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IssuingRow {
    pub id: i32,
    pub event_date: NaiveDateTime,
    pub item_id: Option<i32>,
    pub item: String,
    pub lot_no: Option<String>,
    pub division: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_id: Option<String>,
    pub quantity: i32,
    pub code: Option<String>,
}

/// Stock handed back
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReturnRow {
    pub id: i32,
    pub event_date: NaiveDateTime,
    pub item_id: Option<i32>,
    pub item: String,
    pub lot_no: Option<String>,
    pub code: Option<String>,
    pub quantity: i32,
    pub returned_by: Option<String>,
    pub reason: Option<String>,
}

/// Current stock for one item
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MasterRow {
    pub id: i32,
    pub item: String,
    pub jct_stock: i32,
    pub uct_stock: i32,
    pub unit_price: Decimal,
    pub updated_at: NaiveDateTime,
}

impl MasterRow {
    pub fn total(&self) -> i64 {
        self.jct_stock as i64 + self.uct_stock as i64
    }

    pub fn value(&self) -> Decimal {
        Decimal::from(self.total()) * self.unit_price
    }
}

/// SELECT list for a role, with columns aliased onto the row shape
pub fn select_sql(tables: &CategoryTables, role: TableRole) -> String {
    let item_id = tables.item_id_column;
    let item = tables.item_column;
    match role {
        TableRole::Master => format!(
            "SELECT r.id, r.{item} AS item, r.jct_stock, r.uct_stock, r.unit_price, r.updated_at \
             FROM {table} r",
            table = tables.master,
        ),
        TableRole::Receiving => format!(
            "SELECT r.id, r.receive_date AS event_date, r.{item_id} AS item_id, r.{item} AS item, \
             r.lot_no, r.supplier, r.jct_quantity, r.uct_quantity, r.unit_price, r.invoice_no, r.pr_no \
             FROM {table} r",
            table = tables.receiving,
        ),
        TableRole::Issuing => format!(
            "SELECT r.id, r.issue_date AS event_date, r.{item_id} AS item_id, r.{item} AS item, \
             r.lot_no, r.division, r.receiver_name, r.receiver_id, r.quantity, r.code \
             FROM {table} r",
            table = tables.issuing,
        ),
        TableRole::Return => format!(
            "SELECT r.id, r.return_date AS event_date, r.{item_id} AS item_id, r.{item} AS item, \
             r.lot_no, r.code, r.quantity, r.returned_by, r.reason \
             FROM {table} r",
            table = tables.returns,
        ),
    }
}

/// Qualified date column for a role
pub fn date_column(role: TableRole) -> String {
    format!("{}.{}", ALIAS, role.date_column())
}

/// Quantity expression for a role
pub fn quantity_expression(role: TableRole) -> String {
    match role {
        TableRole::Master => "(r.jct_stock + r.uct_stock)".to_string(),
        TableRole::Receiving => "(r.jct_quantity + r.uct_quantity)".to_string(),
        TableRole::Issuing | TableRole::Return => "r.quantity".to_string(),
    }
}

/// Value expression; roles without a unit price fall back to quantity
pub fn value_expression(role: TableRole) -> String {
    match role {
        TableRole::Master => "((r.jct_stock + r.uct_stock) * r.unit_price)".to_string(),
        TableRole::Receiving => "((r.jct_quantity + r.uct_quantity) * r.unit_price)".to_string(),
        TableRole::Issuing | TableRole::Return => quantity_expression(role),
    }
}

/// Translate an abstract sort key into ORDER BY terms. The row id breaks
/// ties in the same direction.
pub fn order_terms(tables: &CategoryTables, role: TableRole, sort: SortKey) -> Vec<(String, SortDirection)> {
    let primary = match sort.field {
        SortField::Date => date_column(role),
        SortField::Quantity => quantity_expression(role),
        SortField::Value => value_expression(role),
        SortField::Item => format!("{}.{}", ALIAS, tables.item_column),
    };
    vec![
        (primary, sort.direction),
        (format!("{}.id", ALIAS), sort.direction),
    ]
}

/// Correlated subquery reaching receipts of the same lot and item
fn receipts_for_lot(tables: &CategoryTables) -> String {
    format!(
        "SELECT 1 FROM {receiving} x WHERE x.lot_no = r.lot_no AND x.{id} = r.{id}",
        receiving = tables.receiving,
        id = tables.item_id_column,
    )
}

/// Correlated subquery reaching issuances of the same lot and item
fn issues_for_lot(tables: &CategoryTables) -> String {
    format!(
        "SELECT 1 FROM {issuing} x WHERE x.lot_no = r.lot_no AND x.{id} = r.{id}",
        issuing = tables.issuing,
        id = tables.item_id_column,
    )
}

/// Correlated subquery reaching the issuance a return came back from
fn issues_for_code(tables: &CategoryTables) -> String {
    format!(
        "SELECT 1 FROM {issuing} x WHERE x.code = r.code AND x.{id} = r.{id}",
        issuing = tables.issuing,
        id = tables.item_id_column,
    )
}

fn receipts_for_item(tables: &CategoryTables) -> String {
    format!(
        "SELECT 1 FROM {receiving} x WHERE x.{id} = r.id",
        receiving = tables.receiving,
        id = tables.item_id_column,
    )
}

fn issues_for_item(tables: &CategoryTables) -> String {
    format!(
        "SELECT 1 FROM {issuing} x WHERE x.{id} = r.id",
        issuing = tables.issuing,
        id = tables.item_id_column,
    )
}

/// Apply the advanced filters to a statement over `role`. Filters on
/// columns the role lacks go through the table that owns the column.
pub fn apply_filters(
    query: &mut FilteredQuery<'_>,
    tables: &CategoryTables,
    role: TableRole,
    filters: &AdvancedFilters,
) {
    let item = format!("{}.{}", ALIAS, tables.item_column);
    query.contains(&item, filters.item.as_deref());

    let supplier = filters.supplier.as_deref();
    let lot = filters.lot.as_deref();
    let code = filters.code.as_deref();
    let division = filters.division.as_deref();

    match role {
        TableRole::Master => {
            query
                .exists_containing(&receipts_for_item(tables), "x.supplier", supplier)
                .exists_containing(&receipts_for_item(tables), "x.lot_no", lot)
                .exists_containing(&issues_for_item(tables), "x.code", code)
                .exists_containing(&issues_for_item(tables), "x.division", division);
        }
        TableRole::Receiving => {
            query
                .contains("r.supplier", supplier)
                .contains("r.lot_no", lot)
                .exists_containing(&issues_for_lot(tables), "x.code", code)
                .exists_containing(&issues_for_lot(tables), "x.division", division);
        }
        TableRole::Issuing => {
            query
                .exists_containing(&receipts_for_lot(tables), "x.supplier", supplier)
                .contains("r.lot_no", lot)
                .contains("r.code", code)
                .contains("r.division", division);
        }
        TableRole::Return => {
            query
                .exists_containing(&receipts_for_lot(tables), "x.supplier", supplier)
                .contains("r.lot_no", lot)
                .contains("r.code", code)
                .exists_containing(&issues_for_code(tables), "x.division", division);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Category;

    #[test]
    fn test_value_sort_uses_unit_price_only_where_it_exists() {
        let tables = Category::Papers.tables();
        let key = SortKey { field: SortField::Value, direction: SortDirection::Desc };

        let receiving = order_terms(tables, TableRole::Receiving, key);
        assert_eq!(receiving[0].0, "((r.jct_quantity + r.uct_quantity) * r.unit_price)");

        let issuing = order_terms(tables, TableRole::Issuing, key);
        assert_eq!(issuing[0].0, "r.quantity");
        assert_eq!(issuing[1], ("r.id".to_string(), SortDirection::Desc));
    }

    #[test]
    fn test_select_aliases_category_columns() {
        let sql = select_sql(Category::Toner.tables(), TableRole::Issuing);
        assert!(sql.contains("r.toner_id AS item_id"));
        assert!(sql.contains("r.toner_model AS item"));
        assert!(sql.ends_with("FROM toner_issuing r"));
    }

    #[test]
    fn test_supplier_filter_on_issuing_goes_through_receipts() {
        let tables = Category::Ribbons.tables();
        let mut query = FilteredQuery::new(select_sql(tables, TableRole::Issuing));
        let filters = AdvancedFilters {
            supplier: Some("Acme".into()),
            ..Default::default()
        };
        apply_filters(&mut query, tables, TableRole::Issuing, &filters);
        assert!(query.sql().contains(
            "EXISTS (SELECT 1 FROM ribbons_receiving x WHERE x.lot_no = r.lot_no AND x.ribbon_id = r.ribbon_id AND x.supplier ILIKE $1)"
        ));
    }
}
