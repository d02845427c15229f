//! Report composer tests
//!
//! Covers the pure parts of report composition:
//! - timeline merging for lifecycle and all-inventory reports
//! - provenance lookups behind issuing and return rows
//! - stock classification and cross-category sorting
//! - request parameter parsing

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use psi_backend::services::provenance::{IssueIndex, MatchTier, ReceiptIndex};
use psi_backend::services::report_layout::{
    low_stock_summary, stock_columns, stock_record, stock_summary, CellFormat,
};
use psi_backend::services::report_sources::{select_sql, IssuingRow, MasterRow, ReceivingRow};
use psi_backend::services::reporting::{
    low_stock_statement, report_statement, sort_master_rows, ReportParams, ReportQuery,
};
use psi_backend::services::timeline::{merge_newest_first, Stamped};
use rust_decimal::Decimal;
use shared::{Category, ReportKind, ReportResponse, ReportSummary, SortDirection, SortField, SortKey, TableRole};

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, d)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn receipt(id: i32, at: NaiveDateTime, item_id: Option<i32>, item: &str, lot: Option<&str>, supplier: &str) -> ReceivingRow {
    ReceivingRow {
        id,
        event_date: at,
        item_id,
        item: item.to_string(),
        lot_no: lot.map(str::to_string),
        supplier: Some(supplier.to_string()),
        jct_quantity: 5,
        uct_quantity: 5,
        unit_price: Decimal::new(2500, 2),
        invoice_no: None,
        pr_no: None,
    }
}

fn issue(id: i32, at: NaiveDateTime, item_id: Option<i32>, code: Option<&str>, lot: Option<&str>) -> IssuingRow {
    IssuingRow {
        id,
        event_date: at,
        item_id,
        item: "A4 Bond".to_string(),
        lot_no: lot.map(str::to_string),
        division: Some("Finance".to_string()),
        receiver_name: None,
        receiver_id: None,
        quantity: 3,
        code: code.map(str::to_string),
    }
}

fn report_params(query: ReportQuery) -> ReportParams {
    ReportParams::from_query(query, NaiveDate::from_ymd_opt(2024, 8, 20).unwrap()).unwrap()
}

fn master(id: i32, item: &str, jct: i32, uct: i32, price: i64) -> MasterRow {
    MasterRow {
        id,
        item: item.to_string(),
        jct_stock: jct,
        uct_stock: uct,
        unit_price: Decimal::new(price, 0),
        updated_at: day(1),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Eighteen report kinds, each with a distinct key that parses back
    #[test]
    fn test_report_kinds_round_trip_through_keys() {
        let kinds = ReportKind::all();
        assert_eq!(kinds.len(), 18);

        for kind in kinds {
            assert_eq!(ReportKind::parse(Some(&kind.key())), kind);
        }
    }

    #[test]
    fn test_unknown_report_type_falls_back_to_all_inventory() {
        assert_eq!(ReportKind::parse(Some("bogus")), ReportKind::AllInventory);
        assert_eq!(ReportKind::parse(Some("ink_receiving")), ReportKind::AllInventory);
        assert_eq!(ReportKind::parse(None), ReportKind::AllInventory);
    }

    #[test]
    fn test_total_records_matches_records() {
        let records = vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]];
        let response = ReportResponse::new(
            ReportKind::StockSummary,
            "Stock Summary Report".into(),
            vec!["Item".into()],
            records,
            ReportSummary::default(),
        );

        assert!(response.success);
        assert_eq!(response.total_records, 3);
        assert_eq!(response.report_type, "stock_summary");
    }

    #[test]
    fn test_stock_report_title_omits_period() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
        let query = ReportQuery {
            report_type: Some("stock_summary".into()),
            filter_type: Some("year".into()),
            year: Some("2024".into()),
            ..Default::default()
        };
        let params = ReportParams::from_query(query, today).unwrap();
        assert_eq!(params.title(), "Stock Summary Report");
    }

    #[test]
    fn test_unknown_category_is_ignored() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
        let query = ReportQuery {
            report_type: Some("low_stock".into()),
            category: Some("crayons".into()),
            ..Default::default()
        };
        let params = ReportParams::from_query(query, today).unwrap();
        assert_eq!(params.category, None);
    }

    #[test]
    fn test_receiving_statement_for_year_sorted_by_value() {
        let params = report_params(ReportQuery {
            report_type: Some("papers_receiving".into()),
            filter_type: Some("year".into()),
            year: Some("2024".into()),
            sort_by: Some("value_desc".into()),
            ..Default::default()
        });
        let tables = Category::Papers.tables();
        let query = report_statement(tables, TableRole::Receiving, &params, params.sort, 5000);

        let expected = format!(
            "{} WHERE r.receive_date >= $1 AND r.receive_date < $2 \
             ORDER BY ((r.jct_quantity + r.uct_quantity) * r.unit_price) DESC, r.id DESC LIMIT $3",
            select_sql(tables, TableRole::Receiving)
        );
        assert_eq!(query.sql(), expected);
        assert!(!query.sql().contains("2024"));
    }

    #[test]
    fn test_receiving_statement_with_advanced_filters() {
        let params = report_params(ReportQuery {
            report_type: Some("papers_receiving".into()),
            supplier: Some("Acme".into()),
            division: Some("Finance".into()),
            ..Default::default()
        });
        let tables = Category::Papers.tables();
        let sql = report_statement(tables, TableRole::Receiving, &params, params.sort, 50)
            .sql()
            .to_string();

        assert!(sql.contains(" WHERE r.supplier ILIKE $1 AND EXISTS (SELECT 1 FROM papers_issuing x"));
        assert!(sql.contains("x.division ILIKE $2)"));
        assert!(sql.ends_with("r.id DESC LIMIT $3"));
        assert!(!sql.contains("Acme"));
    }

    #[test]
    fn test_low_stock_statement_caps_total_at_threshold() {
        let params = report_params(ReportQuery {
            report_type: Some("low_stock".into()),
            filter_type: Some("year".into()),
            year: Some("2024".into()),
            ..Default::default()
        });
        let tables = Category::Toner.tables();
        let query = low_stock_statement(tables, &params, 10, 5000);

        // Master rows ignore the period, so the threshold is the first bind
        let expected = format!(
            "{} WHERE (r.jct_stock + r.uct_stock) <= $1 \
             ORDER BY (r.jct_stock + r.uct_stock) ASC, r.toner_model ASC LIMIT $2",
            select_sql(tables, TableRole::Master)
        );
        assert_eq!(query.sql(), expected);
    }

    #[test]
    fn test_receipt_ladder() {
        let receipts = vec![
            receipt(1, day(1), Some(7), "A4 Bond", Some("LOT-1"), "Acme"),
            receipt(2, day(3), Some(8), "A4 Bond", Some("LOT-1"), "Globex"),
            receipt(3, day(2), Some(9), "Legal Bond", None, "Initech"),
        ];
        let index = ReceiptIndex::build(&receipts);

        let direct = index.resolve(Some("lot-1 "), Some(7), "A4 Bond");
        assert_eq!(direct.tier, MatchTier::Direct);
        assert_eq!(direct.row.map(|r| r.id), Some(1));

        // Lot alone picks the newest receipt in the lot
        let by_lot = index.resolve(Some("LOT-1"), Some(99), "A4 Bond");
        assert_eq!(by_lot.tier, MatchTier::LotFallback);
        assert_eq!(by_lot.row.map(|r| r.id), Some(2));

        let by_model = index.resolve(None, None, "legal bond");
        assert_eq!(by_model.tier, MatchTier::ModelFallback);
        assert_eq!(by_model.row.map(|r| r.id), Some(3));

        let missing = index.resolve(Some("LOT-9"), None, "Cardstock");
        assert_eq!(missing.tier, MatchTier::NotAvailable);
        assert!(missing.row.is_none());
    }

    #[test]
    fn test_issue_ladder_requires_item_id() {
        let issues = vec![
            issue(10, day(4), Some(7), Some("IS-1"), Some("LOT-1")),
            issue(11, day(5), Some(7), Some("IS-2"), Some("LOT-1")),
        ];
        let index = IssueIndex::build(&issues);

        assert_eq!(index.resolve(Some("is-1"), None, Some(7)).row.map(|r| r.id), Some(10));

        let by_lot = index.resolve(Some("IS-404"), Some("LOT-1"), Some(7));
        assert_eq!(by_lot.tier, MatchTier::LotFallback);
        assert_eq!(by_lot.row.map(|r| r.id), Some(11));

        assert_eq!(index.resolve(Some("IS-1"), Some("LOT-1"), None).tier, MatchTier::NotAvailable);
    }

    #[test]
    fn test_stock_record_status_column() {
        let fmt = CellFormat::new("₱");
        let columns = stock_columns();
        let status_at = columns.iter().position(|c| c == "Status").unwrap();

        let empty = stock_record(Category::Toner, &master(1, "TN-2380", 0, 0, 100), 10, &fmt);
        let low = stock_record(Category::Toner, &master(2, "TN-2380", 3, 4, 100), 10, &fmt);
        let fine = stock_record(Category::Toner, &master(3, "TN-2380", 30, 4, 100), 10, &fmt);

        assert_eq!(empty.len(), columns.len());
        assert_eq!(empty[status_at], "Out of Stock");
        assert_eq!(low[status_at], "Low Stock");
        assert_eq!(fine[status_at], "In Stock");
    }

    #[test]
    fn test_negative_stock_counts_as_low_not_out() {
        let fmt = CellFormat::new("₱");
        let rows = vec![
            (Category::Papers, master(1, "A4", 0, 0, 5)),
            (Category::Papers, master(2, "Legal", -3, 1, 5)),
            (Category::Papers, master(3, "Letter", 40, 0, 5)),
        ];

        let summary = stock_summary(&rows, 10, &fmt);
        assert_eq!(summary.out_of_stock, Some(1));
        assert_eq!(summary.low_stock, Some(1));

        let low = low_stock_summary(&rows[..2], 10);
        assert_eq!(low.out_of_stock, Some(1));
        assert_eq!(low.low_stock, Some(1));

        let record = stock_record(Category::Papers, &rows[1].1, 10, &fmt);
        assert!(record.iter().any(|cell| cell == "Low Stock"));
    }

    #[test]
    fn test_sort_master_rows_by_value_desc() {
        let mut rows = vec![
            (Category::Papers, master(1, "A4", 10, 0, 1)),
            (Category::Toner, master(2, "TN", 2, 0, 100)),
            (Category::Ribbons, master(3, "RB", 5, 0, 10)),
        ];
        sort_master_rows(
            &mut rows,
            SortKey {
                field: SortField::Value,
                direction: SortDirection::Desc,
            },
        );
        let ids: Vec<i32> = rows.iter().map(|(_, r)| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn stamped_streams_strategy() -> impl Strategy<Value = Vec<Vec<(u32, usize)>>> {
    prop::collection::vec(prop::collection::vec((1u32..28, 0usize..1000), 0..15), 1..4)
}

fn stock_rows_strategy() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::vec((-5i32..50, -5i32..50), 0..40)
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Merged timelines keep every row and never put an older row first
        #[test]
        fn prop_merge_is_newest_first(streams in stamped_streams_strategy()) {
            let expected: usize = streams.iter().map(Vec::len).sum();
            let streams: Vec<Vec<Stamped<usize>>> = streams
                .into_iter()
                .map(|s| s.into_iter().map(|(d, v)| Stamped::new(day(d), v)).collect())
                .collect();

            let merged = merge_newest_first(streams);

            prop_assert_eq!(merged.len(), expected);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].at >= pair[1].at);
            }
        }

        /// Every item is exactly one of out of stock, low, or in stock
        #[test]
        fn prop_stock_summary_partitions_items(levels in stock_rows_strategy(), threshold in 0i64..40) {
            let fmt = CellFormat::new("₱");
            let rows: Vec<(Category, MasterRow)> = levels
                .iter()
                .enumerate()
                .map(|(i, (jct, uct))| (Category::Papers, master(i as i32, "A4", *jct, *uct, 2)))
                .collect();

            let summary = stock_summary(&rows, threshold, &fmt);
            let in_stock = rows.iter().filter(|(_, r)| r.total() > threshold).count() as i64;

            prop_assert_eq!(summary.total_items, Some(rows.len() as i64));
            prop_assert_eq!(
                summary.out_of_stock.unwrap() + summary.low_stock.unwrap() + in_stock,
                rows.len() as i64
            );
            prop_assert_eq!(
                summary.total_quantity,
                Some(rows.iter().map(|(_, r)| r.total()).sum::<i64>())
            );
        }

        /// Low stock summary counts agree with the rows it was given
        #[test]
        fn prop_low_stock_summary_counts(levels in stock_rows_strategy(), threshold in 0i64..40) {
            let rows: Vec<(Category, MasterRow)> = levels
                .iter()
                .enumerate()
                .map(|(i, (jct, uct))| (Category::Toner, master(i as i32, "TN", *jct, *uct, 2)))
                .filter(|(_, r)| r.total() <= threshold)
                .collect();

            let summary = low_stock_summary(&rows, threshold);
            prop_assert_eq!(summary.out_of_stock.unwrap() + summary.low_stock.unwrap(), rows.len() as i64);
            prop_assert_eq!(summary.threshold, Some(threshold));
        }
    }
}
