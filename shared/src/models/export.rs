//! Export allowlist and formats

use serde::{Deserialize, Serialize};

use super::Category;

/// Tables that may be exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportTable {
    PapersMaster,
    TonerMaster,
    RibbonsMaster,
    Users,
}

impl ExportTable {
    pub const ALL: [ExportTable; 4] = [
        ExportTable::PapersMaster,
        ExportTable::TonerMaster,
        ExportTable::RibbonsMaster,
        ExportTable::Users,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|t| t.table_name() == value)
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            ExportTable::PapersMaster => Category::Papers.tables().master,
            ExportTable::TonerMaster => Category::Toner.tables().master,
            ExportTable::RibbonsMaster => Category::Ribbons.tables().master,
            ExportTable::Users => "users",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ExportTable::PapersMaster => "Papers Stock",
            ExportTable::TonerMaster => "Toner Stock",
            ExportTable::RibbonsMaster => "Ribbons Stock",
            ExportTable::Users => "Users",
        }
    }

    /// Exported columns. Credential columns never appear here.
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            ExportTable::PapersMaster | ExportTable::TonerMaster | ExportTable::RibbonsMaster => {
                let category = match self {
                    ExportTable::PapersMaster => Category::Papers,
                    ExportTable::TonerMaster => Category::Toner,
                    _ => Category::Ribbons,
                };
                vec![
                    "id",
                    category.tables().item_column,
                    "jct_stock",
                    "uct_stock",
                    "unit_price",
                    "updated_at",
                ]
            }
            ExportTable::Users => vec!["id", "username", "full_name", "role", "created_at"],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().iter().any(|c| *c == column)
    }
}

/// Output format for downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    /// HTML table workbook that spreadsheet applications open directly
    Excel,
}

impl ExportFormat {
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("csv") => Some(ExportFormat::Csv),
            Some("excel") | Some("xls") | Some("xlsx") => Some(ExportFormat::Excel),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Excel => "application/vnd.ms-excel; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_four_tables_are_exportable() {
        assert_eq!(ExportTable::parse("toner_master"), Some(ExportTable::TonerMaster));
        assert_eq!(ExportTable::parse("users"), Some(ExportTable::Users));
        assert_eq!(ExportTable::parse("toner_issuing"), None);
        assert_eq!(ExportTable::parse("notifications"), None);
    }

    #[test]
    fn test_users_export_never_includes_credentials() {
        assert!(!ExportTable::Users.has_column("password_hash"));
        assert!(ExportTable::Users.has_column("username"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(ExportFormat::parse(None), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse(Some("XLSX")), Some(ExportFormat::Excel));
        assert_eq!(ExportFormat::parse(Some("pdf")), None);
    }
}
