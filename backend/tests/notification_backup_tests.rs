//! Notification and backup job tests
//!
//! Tests for the scheduled jobs including:
//! - alert text and dedup keys for threshold checks
//! - compressed dump packing
//! - retention never dropping the newest backups

use std::io::Read;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use flate2::read::GzDecoder;
use proptest::prelude::*;
use psi_backend::services::backup::{discard_orphan, dump_table_count, pack_dump, write_dump};
use psi_backend::services::notification::{low_stock_alert, pending_return_alert};
use psi_backend::services::report_sources::{IssuingRow, MasterRow};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use shared::{backup_file_name, stock_status, Category, NotificationKind, RetentionPolicy};

fn toner(total_jct: i32, total_uct: i32) -> MasterRow {
    MasterRow {
        id: 42,
        item: "TN-2380".into(),
        jct_stock: total_jct,
        uct_stock: total_uct,
        unit_price: Decimal::new(125000, 2),
        updated_at: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap().and_hms_opt(8, 0, 0).unwrap(),
    }
}

const DUMP: &str = "--\n-- PostgreSQL database dump\n--\n\
CREATE TABLE public.papers_master (\n    id integer NOT NULL\n);\n\
CREATE TABLE public.toner_master (\n    id integer NOT NULL\n);\n\
-- CREATE TABLE inside a comment does not count\n";

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_low_stock_alert() {
        let alert = low_stock_alert(Category::Toner, &toner(2, 1), 10);

        assert_eq!(alert.kind, NotificationKind::LowStock);
        assert_eq!(alert.title, "Low Stock: TN-2380");
        assert!(alert.message.contains("has 3 left"));
        assert_eq!(alert.dedup_key.as_deref(), Some("low_stock:toner:42"));
    }

    #[test]
    fn test_out_of_stock_alert_title() {
        let alert = low_stock_alert(Category::Toner, &toner(0, 0), 10);
        assert_eq!(alert.title, "Out of Stock: TN-2380");
    }

    #[test]
    fn test_negative_stock_alert_is_low_stock() {
        let alert = low_stock_alert(Category::Toner, &toner(-4, 2), 10);
        assert_eq!(alert.title, "Low Stock: TN-2380");
        assert!(alert.message.contains("has -2 left"));
    }

    #[test]
    fn test_pending_return_alert() {
        let row = IssuingRow {
            id: 9,
            event_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(10, 0, 0).unwrap(),
            item_id: Some(3),
            item: "Ribbon ERC-38".into(),
            lot_no: None,
            division: None,
            receiver_name: Some("J. Cruz".into()),
            receiver_id: None,
            quantity: 2,
            code: Some("IS-0091".into()),
        };
        let alert = pending_return_alert(Category::Ribbons, &row, 30);

        assert_eq!(alert.kind, NotificationKind::PendingReturn);
        assert!(alert.message.contains("issued to N/A"));
        assert!(alert.message.contains("code IS-0091"));
        assert!(alert.message.contains("after 30 days"));
        assert_eq!(alert.dedup_key.as_deref(), Some("pending_return:ribbons:9"));
    }

    #[test]
    fn test_dump_table_count() {
        assert_eq!(dump_table_count(DUMP.as_bytes()), 2);
        assert_eq!(dump_table_count(b""), 0);
    }

    #[test]
    fn test_pack_dump_round_trip_and_checksum() {
        let packed = pack_dump(DUMP.as_bytes()).unwrap();

        let mut restored = String::new();
        GzDecoder::new(packed.bytes.as_slice())
            .read_to_string(&mut restored)
            .unwrap();
        assert_eq!(restored, DUMP);

        assert_eq!(packed.table_count, 2);
        assert_eq!(packed.checksum.len(), 64);
        assert_eq!(packed.checksum, format!("{:x}", Sha256::digest(&packed.bytes)));
    }

    #[test]
    fn test_write_dump_creates_directory_and_file() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("nested").join("backups");
        let filename = "backup_20240630_230509.sql.gz";

        let packed = tokio_test::block_on(write_dump(&directory, filename, DUMP.as_bytes().to_vec())).unwrap();

        let written = std::fs::read(directory.join(filename)).unwrap();
        assert_eq!(written, packed.bytes);
        assert_eq!(packed.table_count, 2);
    }

    #[test]
    fn test_discard_orphan_removes_unrecorded_dump() {
        let root = tempfile::tempdir().unwrap();
        let filename = "backup_20240630_230509.sql.gz";
        tokio_test::block_on(write_dump(root.path(), filename, DUMP.as_bytes().to_vec())).unwrap();
        let path = root.path().join(filename);
        assert!(path.exists());

        assert!(tokio_test::block_on(discard_orphan(&path)));
        assert!(!path.exists());

        // Already gone counts as discarded
        assert!(tokio_test::block_on(discard_orphan(&path)));
    }

    #[test]
    fn test_backup_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 6, 30, 23, 5, 9).unwrap();
        assert_eq!(backup_file_name(at), "backup_20240630_230509.sql.gz");
    }

    #[test]
    fn test_retention_keeps_minimum_even_when_old() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let ages = [400i64, 300, 200, 100];
        let policy = RetentionPolicy {
            max_age_days: 30,
            min_keep: 2,
        };

        let expired = policy.expired(&ages, |days| now - Duration::days(*days), now);
        let mut expired: Vec<i64> = expired.into_iter().copied().collect();
        expired.sort();
        assert_eq!(expired, vec![300, 400]);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Alerts carry the same status label the stock report shows
        #[test]
        fn prop_alert_title_matches_status(jct in -3i32..20, uct in -3i32..20, threshold in 0i64..30) {
            let row = toner(jct, uct);
            let alert = low_stock_alert(Category::Toner, &row, threshold);
            let prefix = format!("{}: ", stock_status(row.total(), threshold));
            prop_assert!(alert.title.starts_with(&prefix));
        }

        /// Retention never removes one of the newest `min_keep` backups and
        /// never removes anything younger than the cutoff
        #[test]
        fn prop_retention_respects_floor_and_cutoff(
            ages in prop::collection::vec(0i64..120, 0..25),
            max_age_days in 0i64..90,
            min_keep in 0usize..8
        ) {
            let now = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
            let policy = RetentionPolicy { max_age_days, min_keep };
            let expired = policy.expired(&ages, |days| now - Duration::days(*days), now);

            prop_assert!(expired.len() <= ages.len().saturating_sub(min_keep));
            for age in &expired {
                prop_assert!(**age > max_age_days);
            }
        }
    }
}
