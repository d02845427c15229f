//! Consumable categories and the table layout each one maps to
//!
//! Every category stores the same four row shapes (master, receiving, issuing,
//! return) under different table and column names. Services never spell those
//! names out; they look them up here.

use serde::{Deserialize, Serialize};

/// Consumable category tracked by the stock room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Papers,
    Toner,
    Ribbons,
}

/// Physical table and column names for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTables {
    pub category: Category,
    pub master: &'static str,
    pub receiving: &'static str,
    pub issuing: &'static str,
    pub returns: &'static str,
    /// Foreign key from transactional rows back to the master row
    pub item_id_column: &'static str,
    /// Model / type name column
    pub item_column: &'static str,
}

const PAPERS: CategoryTables = CategoryTables {
    category: Category::Papers,
    master: "papers_master",
    receiving: "papers_receiving",
    issuing: "papers_issuing",
    returns: "papers_return",
    item_id_column: "paper_id",
    item_column: "paper_type",
};

const TONER: CategoryTables = CategoryTables {
    category: Category::Toner,
    master: "toner_master",
    receiving: "toner_receiving",
    issuing: "toner_issuing",
    returns: "toner_return",
    item_id_column: "toner_id",
    item_column: "toner_model",
};

const RIBBONS: CategoryTables = CategoryTables {
    category: Category::Ribbons,
    master: "ribbons_master",
    receiving: "ribbons_receiving",
    issuing: "ribbons_issuing",
    returns: "ribbons_return",
    item_id_column: "ribbon_id",
    item_column: "ribbon_model",
};

impl Category {
    pub const ALL: [Category; 3] = [Category::Papers, Category::Toner, Category::Ribbons];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Papers => "papers",
            Category::Toner => "toner",
            Category::Ribbons => "ribbons",
        }
    }

    /// Human readable label used in report titles and badges
    pub fn label(&self) -> &'static str {
        match self {
            Category::Papers => "Papers",
            Category::Toner => "Toner",
            Category::Ribbons => "Ribbons",
        }
    }

    pub fn tables(&self) -> &'static CategoryTables {
        match self {
            Category::Papers => &PAPERS,
            Category::Toner => &TONER,
            Category::Ribbons => &RIBBONS,
        }
    }

    /// Parse a category key, accepting singular forms used by older links
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "papers" | "paper" => Some(Category::Papers),
            "toner" | "toners" => Some(Category::Toner),
            "ribbons" | "ribbon" => Some(Category::Ribbons),
            _ => None,
        }
    }

    /// Either the requested category alone, or all of them
    pub fn selection(filter: Option<Category>) -> Vec<Category> {
        match filter {
            Some(category) => vec![category],
            None => Category::ALL.to_vec(),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the four per-category row shapes a table holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    Master,
    Receiving,
    Issuing,
    Return,
}

impl TableRole {
    pub const ALL: [TableRole; 4] = [
        TableRole::Master,
        TableRole::Receiving,
        TableRole::Issuing,
        TableRole::Return,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TableRole::Master => "Stock",
            TableRole::Receiving => "Receiving",
            TableRole::Issuing => "Issuing",
            TableRole::Return => "Return",
        }
    }

    /// Semantic event date column for the role
    pub fn date_column(&self) -> &'static str {
        match self {
            TableRole::Master => "updated_at",
            TableRole::Receiving => "receive_date",
            TableRole::Issuing => "issue_date",
            TableRole::Return => "return_date",
        }
    }
}

impl CategoryTables {
    pub fn table(&self, role: TableRole) -> &'static str {
        match role {
            TableRole::Master => self.master,
            TableRole::Receiving => self.receiving,
            TableRole::Issuing => self.issuing,
            TableRole::Return => self.returns,
        }
    }

    /// Resolve a physical table name back to its category and role
    pub fn lookup(table: &str) -> Option<(&'static CategoryTables, TableRole)> {
        Category::ALL.iter().find_map(|category| {
            let tables = category.tables();
            TableRole::ALL
                .iter()
                .find(|role| tables.table(**role) == table)
                .map(|role| (tables, *role))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_singular_forms() {
        assert_eq!(Category::parse("paper"), Some(Category::Papers));
        assert_eq!(Category::parse(" Ribbons "), Some(Category::Ribbons));
        assert_eq!(Category::parse("ink"), None);
    }

    #[test]
    fn test_every_table_resolves_to_its_owner() {
        for category in Category::ALL {
            let tables = category.tables();
            for role in TableRole::ALL {
                let (found, found_role) = CategoryTables::lookup(tables.table(role)).unwrap();
                assert_eq!(found.category, category);
                assert_eq!(found_role, role);
            }
        }
        assert!(CategoryTables::lookup("users").is_none());
    }
}
