//! Best-effort lookup of the receipt or issuance behind a transaction row
//!
//! Issuing and return rows only loosely reference the rows they came from.
//! Lookups walk a fixed ladder of tiers and report which tier answered, so
//! the fallback order stays visible and testable:
//!
//! * receipts: lot + item id, then lot alone, then the most recent receipt
//!   of the same model
//! * issuances: code + item id, then lot + item id
//!
//! Within a tier the most recent candidate wins.

use std::collections::HashMap;

use serde::Serialize;

use super::report_sources::{IssuingRow, ReceivingRow};

/// Which rung of the ladder produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Direct,
    LotFallback,
    ModelFallback,
    NotAvailable,
}

/// Outcome of a lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'a, T> {
    pub tier: MatchTier,
    pub row: Option<&'a T>,
}

impl<'a, T> Resolved<'a, T> {
    fn found(tier: MatchTier, row: &'a T) -> Self {
        Self { tier, row: Some(row) }
    }

    fn missing() -> Self {
        Self {
            tier: MatchTier::NotAvailable,
            row: None,
        }
    }
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn normalize_opt(value: Option<&str>) -> Option<String> {
    value.and_then(normalize)
}

/// Receipts indexed for the receipt ladder
#[derive(Debug, Default)]
pub struct ReceiptIndex<'a> {
    by_lot_item: HashMap<(String, i32), &'a ReceivingRow>,
    by_lot: HashMap<String, &'a ReceivingRow>,
    by_model: HashMap<String, &'a ReceivingRow>,
}

impl<'a> ReceiptIndex<'a> {
    pub fn build(receipts: &'a [ReceivingRow]) -> Self {
        let mut newest_first: Vec<&ReceivingRow> = receipts.iter().collect();
        newest_first.sort_by(|a, b| b.event_date.cmp(&a.event_date).then(b.id.cmp(&a.id)));

        let mut index = Self::default();
        for receipt in newest_first {
            if let Some(lot) = normalize_opt(receipt.lot_no.as_deref()) {
                if let Some(item_id) = receipt.item_id {
                    index.by_lot_item.entry((lot.clone(), item_id)).or_insert(receipt);
                }
                index.by_lot.entry(lot).or_insert(receipt);
            }
            if let Some(model) = normalize(&receipt.item) {
                index.by_model.entry(model).or_insert(receipt);
            }
        }
        index
    }

    pub fn resolve(&self, lot_no: Option<&str>, item_id: Option<i32>, model: &str) -> Resolved<'a, ReceivingRow> {
        let lot = normalize_opt(lot_no);

        if let (Some(lot), Some(item_id)) = (lot.as_ref(), item_id) {
            if let Some(row) = self.by_lot_item.get(&(lot.clone(), item_id)) {
                return Resolved::found(MatchTier::Direct, row);
            }
        }

        if let Some(row) = lot.as_ref().and_then(|lot| self.by_lot.get(lot)) {
            return Resolved::found(MatchTier::LotFallback, row);
        }

        if let Some(row) = normalize(model).and_then(|model| self.by_model.get(&model)) {
            return Resolved::found(MatchTier::ModelFallback, row);
        }

        Resolved::missing()
    }
}

/// Issuances indexed for the issue ladder
#[derive(Debug, Default)]
pub struct IssueIndex<'a> {
    by_code_item: HashMap<(String, i32), &'a IssuingRow>,
    by_lot_item: HashMap<(String, i32), &'a IssuingRow>,
}

impl<'a> IssueIndex<'a> {
    pub fn build(issues: &'a [IssuingRow]) -> Self {
        let mut newest_first: Vec<&IssuingRow> = issues.iter().collect();
        newest_first.sort_by(|a, b| b.event_date.cmp(&a.event_date).then(b.id.cmp(&a.id)));

        let mut index = Self::default();
        for issue in newest_first {
            let Some(item_id) = issue.item_id else {
                continue;
            };
            if let Some(code) = normalize_opt(issue.code.as_deref()) {
                index.by_code_item.entry((code, item_id)).or_insert(issue);
            }
            if let Some(lot) = normalize_opt(issue.lot_no.as_deref()) {
                index.by_lot_item.entry((lot, item_id)).or_insert(issue);
            }
        }
        index
    }

    pub fn resolve(&self, code: Option<&str>, lot_no: Option<&str>, item_id: Option<i32>) -> Resolved<'a, IssuingRow> {
        let Some(item_id) = item_id else {
            return Resolved::missing();
        };

        if let Some(row) = normalize_opt(code).and_then(|code| self.by_code_item.get(&(code, item_id))) {
            return Resolved::found(MatchTier::Direct, row);
        }

        if let Some(row) = normalize_opt(lot_no).and_then(|lot| self.by_lot_item.get(&(lot, item_id))) {
            return Resolved::found(MatchTier::LotFallback, row);
        }

        Resolved::missing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn receipt(id: i32, day: u32, item_id: i32, item: &str, lot: &str, supplier: &str) -> ReceivingRow {
        ReceivingRow {
            id,
            event_date: at(day),
            item_id: Some(item_id),
            item: item.to_string(),
            lot_no: Some(lot.to_string()),
            supplier: Some(supplier.to_string()),
            jct_quantity: 10,
            uct_quantity: 5,
            unit_price: Decimal::from(100),
            invoice_no: None,
            pr_no: None,
        }
    }

    fn sample() -> Vec<ReceivingRow> {
        vec![
            receipt(1, 1, 7, "A4 Bond", "L-100", "Old Supplier"),
            receipt(2, 3, 7, "A4 Bond", "L-200", "Newer Supplier"),
            receipt(3, 2, 9, "Legal Bond", "L-100", "Legal Supplier"),
        ]
    }

    #[test]
    fn test_direct_match_wins() {
        let receipts = sample();
        let index = ReceiptIndex::build(&receipts);
        let found = index.resolve(Some("L-100"), Some(7), "A4 Bond");
        assert_eq!(found.tier, MatchTier::Direct);
        assert_eq!(found.row.unwrap().id, 1);
    }

    #[test]
    fn test_lot_fallback_picks_most_recent_in_lot() {
        let receipts = sample();
        let index = ReceiptIndex::build(&receipts);
        // Item 8 never arrived in L-100; receipts 1 and 3 share the lot
        let found = index.resolve(Some("l-100 "), Some(8), "Unknown");
        assert_eq!(found.tier, MatchTier::LotFallback);
        assert_eq!(found.row.unwrap().id, 3);
    }

    #[test]
    fn test_model_fallback_picks_most_recent_receipt() {
        let receipts = sample();
        let index = ReceiptIndex::build(&receipts);
        let found = index.resolve(Some("L-999"), Some(7), "a4 bond");
        assert_eq!(found.tier, MatchTier::ModelFallback);
        assert_eq!(found.row.unwrap().id, 2);
    }

    #[test]
    fn test_exhausted_ladder_is_not_available() {
        let receipts = sample();
        let index = ReceiptIndex::build(&receipts);
        let found = index.resolve(None, None, "Thermal Roll");
        assert_eq!(found.tier, MatchTier::NotAvailable);
        assert!(found.row.is_none());
    }

    #[test]
    fn test_issue_ladder() {
        let issue = |id: i32, code: &str, lot: &str| IssuingRow {
            id,
            event_date: at(id as u32),
            item_id: Some(4),
            item: "Ribbon".into(),
            lot_no: Some(lot.into()),
            division: Some(format!("Division {}", id)),
            receiver_name: None,
            receiver_id: None,
            quantity: 1,
            code: Some(code.into()),
        };
        let issues = vec![issue(1, "C-1", "L-1"), issue(2, "C-2", "L-1")];
        let index = IssueIndex::build(&issues);

        let direct = index.resolve(Some("C-1"), None, Some(4));
        assert_eq!((direct.tier, direct.row.unwrap().id), (MatchTier::Direct, 1));

        let by_lot = index.resolve(Some("C-9"), Some("L-1"), Some(4));
        assert_eq!((by_lot.tier, by_lot.row.unwrap().id), (MatchTier::LotFallback, 2));

        let none = index.resolve(Some("C-1"), Some("L-1"), Some(5));
        assert_eq!(none.tier, MatchTier::NotAvailable);
    }
}
