//! Backup retention policy

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_AGE_DAYS: i64 = 30;
pub const DEFAULT_MIN_KEEP: usize = 5;

/// How long backups live, and how many survive regardless of age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_age_days: i64,
    pub min_keep: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            min_keep: DEFAULT_MIN_KEEP,
        }
    }
}

impl RetentionPolicy {
    /// Reject a negative age; zero means everything outside `min_keep` goes
    pub fn validate(self) -> Result<Self, &'static str> {
        if self.max_age_days < 0 {
            return Err("max_age_days must not be negative");
        }
        Ok(self)
    }

    /// Layer caller overrides on top of this policy and validate the result
    pub fn with_overrides(self, max_age_days: Option<i64>, min_keep: Option<usize>) -> Result<Self, &'static str> {
        Self {
            max_age_days: max_age_days.unwrap_or(self.max_age_days),
            min_keep: min_keep.unwrap_or(self.min_keep),
        }
        .validate()
    }

    /// Items to delete: older than the cutoff and outside the newest
    /// `min_keep`. Input order does not matter.
    pub fn expired<'a, T, F>(&self, items: &'a [T], created_at: F, now: DateTime<Utc>) -> Vec<&'a T>
    where
        F: Fn(&T) -> DateTime<Utc>,
    {
        let cutoff = now - Duration::days(self.max_age_days.max(0));
        let mut newest_first: Vec<&T> = items.iter().collect();
        newest_first.sort_by_key(|item| std::cmp::Reverse(created_at(item)));

        newest_first
            .into_iter()
            .skip(self.min_keep)
            .filter(|item| created_at(item) < cutoff)
            .collect()
    }
}

/// File name for a backup taken at `at`
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("backup_{}.sql.gz", at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::days(days)
    }

    #[test]
    fn test_min_keep_protects_old_backups() {
        let now = Utc::now();
        let ages = vec![days_ago(now, 90), days_ago(now, 60), days_ago(now, 45)];
        let policy = RetentionPolicy { max_age_days: 30, min_keep: 2 };
        let expired = policy.expired(&ages, |a| *a, now);
        assert_eq!(expired, vec![&ages[0]]);
    }

    #[test]
    fn test_recent_backups_survive() {
        let now = Utc::now();
        let ages = vec![days_ago(now, 1), days_ago(now, 2), days_ago(now, 40)];
        let policy = RetentionPolicy { max_age_days: 30, min_keep: 0 };
        let expired = policy.expired(&ages, |a| *a, now);
        assert_eq!(expired.len(), 1);
        assert_eq!(*expired[0], ages[2]);
    }

    #[test]
    fn test_overrides_are_validated() {
        let base = RetentionPolicy::default();
        assert_eq!(
            base.with_overrides(Some(7), None),
            Ok(RetentionPolicy { max_age_days: 7, min_keep: DEFAULT_MIN_KEEP })
        );
        assert_eq!(base.with_overrides(None, None), Ok(base));
        assert!(base.with_overrides(Some(-1), Some(2)).is_err());
        assert!(RetentionPolicy { max_age_days: -3, min_keep: 0 }.validate().is_err());
    }

    #[test]
    fn test_file_name_format() {
        let at = DateTime::parse_from_rfc3339("2024-06-01T02:30:05Z").unwrap().with_timezone(&Utc);
        assert_eq!(backup_file_name(at), "backup_20240601_023005.sql.gz");
    }

    proptest! {
        #[test]
        fn prop_never_drops_below_min_keep(
            ages in prop::collection::vec(0i64..400, 0..40),
            max_age in 0i64..120,
            min_keep in 0usize..10,
        ) {
            let now = Utc::now();
            let stamps: Vec<DateTime<Utc>> = ages.iter().map(|d| days_ago(now, *d)).collect();
            let policy = RetentionPolicy { max_age_days: max_age, min_keep };
            let expired = policy.expired(&stamps, |a| *a, now);

            prop_assert!(stamps.len() - expired.len() >= min_keep.min(stamps.len()));
            for item in &expired {
                prop_assert!(**item < now - Duration::days(max_age));
            }
        }
    }
}
