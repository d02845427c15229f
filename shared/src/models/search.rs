//! Search allowlist and option types

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Category, CategoryTables, SortDirection, TableRole};

pub const DEFAULT_SEARCH_LIMIT: i64 = 10;
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// A table that may be searched, with the columns the search may touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTable {
    pub name: &'static str,
    pub category: Category,
    pub role: TableRole,
    /// Text columns matched against the query
    pub searchable: Vec<&'static str>,
    /// Columns accepted for `order_by` and `filters[...]`
    pub columns: Vec<&'static str>,
}

impl SearchTable {
    pub fn for_role(tables: &'static CategoryTables, role: TableRole) -> Self {
        let item = tables.item_column;
        let item_id = tables.item_id_column;
        let (searchable, columns) = match role {
            TableRole::Master => (
                vec![item],
                vec!["id", item, "jct_stock", "uct_stock", "unit_price", "updated_at"],
            ),
            TableRole::Receiving => (
                vec![item, "lot_no", "supplier", "invoice_no", "pr_no"],
                vec![
                    "id",
                    "receive_date",
                    item_id,
                    item,
                    "lot_no",
                    "supplier",
                    "jct_quantity",
                    "uct_quantity",
                    "unit_price",
                    "invoice_no",
                    "pr_no",
                ],
            ),
            TableRole::Issuing => (
                vec![item, "lot_no", "division", "receiver_name", "receiver_id", "code"],
                vec![
                    "id",
                    "issue_date",
                    item_id,
                    item,
                    "lot_no",
                    "division",
                    "receiver_name",
                    "receiver_id",
                    "quantity",
                    "code",
                ],
            ),
            TableRole::Return => (
                vec![item, "lot_no", "code", "returned_by", "reason"],
                vec![
                    "id",
                    "return_date",
                    item_id,
                    item,
                    "lot_no",
                    "code",
                    "quantity",
                    "returned_by",
                    "reason",
                ],
            ),
        };

        Self {
            name: tables.table(role),
            category: tables.category,
            role,
            searchable,
            columns,
        }
    }

    /// Human readable label, e.g. "Toner Issuing"
    pub fn label(&self) -> String {
        format!("{} {}", self.category.label(), self.role.label())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
    }

    /// Every searchable table, in a stable order
    pub fn allowlist() -> Vec<SearchTable> {
        Category::ALL
            .iter()
            .flat_map(|category| {
                TableRole::ALL
                    .iter()
                    .map(move |role| SearchTable::for_role(category.tables(), *role))
            })
            .collect()
    }

    pub fn find(name: &str) -> Option<SearchTable> {
        CategoryTables::lookup(name.trim()).map(|(tables, role)| SearchTable::for_role(tables, role))
    }
}

/// Options shared by global and single-table search
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchOptions {
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,

    #[validate(range(min = 0))]
    pub offset: i64,

    /// Substring match when true, equality when false
    pub fuzzy: bool,

    pub order_by: Option<String>,

    pub order_dir: SortDirection,

    /// Equality filters on allowlisted columns
    #[serde(default)]
    pub filters: Vec<(String, String)>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
            fuzzy: true,
            order_by: None,
            order_dir: SortDirection::Desc,
            filters: Vec::new(),
        }
    }
}

/// Matches from one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSearchResult {
    pub table: String,
    pub label: String,
    pub count: usize,
    pub rows: Vec<serde_json::Value>,
}

/// Matches across the allowlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSearchResult {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<TableSearchResult>,
}

impl GlobalSearchResult {
    /// Tables without matches are dropped
    pub fn new(query: String, results: Vec<TableSearchResult>) -> Self {
        let results: Vec<TableSearchResult> = results.into_iter().filter(|r| r.count > 0).collect();
        Self {
            query,
            total_results: results.iter().map(|r| r.count).sum(),
            results,
        }
    }
}
