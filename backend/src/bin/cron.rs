//! Scheduled maintenance jobs
//!
//! Meant to be driven by cron or a systemd timer. Each subcommand runs one
//! job and exits non-zero when it fails.

use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use psi_backend::{
    init_tracing,
    services::{notification::AdminAlert, BackupManager, NotificationService},
    AppError, AppResult, Config,
};
use shared::{validate_days, validate_threshold, NotificationKind};
use sqlx::{postgres::PgPoolOptions, PgPool};

#[derive(Parser)]
#[command(name = "psi-cron")]
#[command(about = "Scheduled jobs for the print supplies inventory")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the database to a compressed backup
    Backup {
        /// Tell admins the backup finished
        #[arg(long)]
        notify: bool,
    },

    /// Delete backups past the retention window
    Cleanup {
        /// Override the configured maximum age
        #[arg(long)]
        max_age_days: Option<i64>,

        /// Override the configured minimum kept
        #[arg(long)]
        min_keep: Option<usize>,
    },

    /// Alert admins about items at or below the stock threshold
    CheckLowStock {
        #[arg(long)]
        threshold: Option<i64>,
    },

    /// Alert admins about issued items not returned in time
    CheckPendingReturns {
        #[arg(long)]
        days: Option<i64>,
    },

    /// Backup, cleanup and both checks in sequence
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = Config::load()?;

    let filter = if cli.verbose { "psi_backend=debug,psi_cron=debug" } else { "psi_backend=info,psi_cron=info" };
    init_tracing(filter, config.is_production());

    let db = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    let jobs = Jobs { db, config };
    match cli.command {
        Commands::Backup { notify } => jobs.backup(notify).await?,
        Commands::Cleanup { max_age_days, min_keep } => jobs.cleanup(max_age_days, min_keep).await?,
        Commands::CheckLowStock { threshold } => jobs.check_low_stock(threshold).await?,
        Commands::CheckPendingReturns { days } => jobs.check_pending_returns(days).await?,
        Commands::All => jobs.all().await?,
    }

    Ok(())
}

/// Same rejection the HTTP handlers give for out-of-range parameters
fn invalid(message: &'static str) -> AppError {
    AppError::ValidationError(message.to_string())
}

struct Jobs {
    db: PgPool,
    config: Config,
}

impl Jobs {
    fn backups(&self) -> BackupManager {
        BackupManager::new(self.db.clone(), self.config.database.url.clone(), self.config.backup.clone())
    }

    fn notifications(&self) -> NotificationService {
        NotificationService::new(self.db.clone())
    }

    async fn backup(&self, notify: bool) -> AppResult<()> {
        match self.backups().create_backup(None).await {
            Ok(record) => {
                if notify {
                    let alert = AdminAlert {
                        kind: NotificationKind::Backup,
                        title: "Backup completed".to_string(),
                        message: format!("{} ({} bytes, {} tables)", record.filename, record.size_bytes, record.table_count),
                        dedup_key: None,
                        link: None,
                    };
                    self.notifications().notify_admins(&alert).await?;
                }
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "Scheduled backup failed");
                if notify {
                    let alert = AdminAlert {
                        kind: NotificationKind::Backup,
                        title: "Backup failed".to_string(),
                        message: err.public_message(),
                        dedup_key: None,
                        link: None,
                    };
                    self.notifications().notify_admins(&alert).await?;
                }
                Err(err)
            }
        }
    }

    async fn cleanup(&self, max_age_days: Option<i64>, min_keep: Option<usize>) -> AppResult<()> {
        let manager = self.backups();
        let policy = manager
            .retention()
            .with_overrides(max_age_days, min_keep)
            .map_err(invalid)?;

        let outcome = manager.cleanup_old_backups(policy).await?;
        tracing::info!(deleted = outcome.deleted.len(), kept = outcome.kept, "Backup cleanup finished");
        Ok(())
    }

    async fn check_low_stock(&self, threshold: Option<i64>) -> AppResult<()> {
        let threshold = validate_threshold(threshold.unwrap_or(self.config.notifications.low_stock_threshold))
            .map_err(invalid)?;
        let outcome = self.notifications().check_low_stock(threshold).await?;
        tracing::info!(threshold, matched = outcome.matched, created = outcome.created, "Low stock check finished");
        Ok(())
    }

    async fn check_pending_returns(&self, days: Option<i64>) -> AppResult<()> {
        let days = validate_days(days.unwrap_or(self.config.notifications.pending_return_days)).map_err(invalid)?;
        let outcome = self
            .notifications()
            .check_pending_returns(days, Local::now().date_naive())
            .await?;
        tracing::info!(days, matched = outcome.matched, created = outcome.created, "Pending return check finished");
        Ok(())
    }

    /// Runs every job even when one fails; reports the first failure
    async fn all(&self) -> AppResult<()> {
        let results = [
            self.backup(true).await,
            self.cleanup(None, None).await,
            self.check_low_stock(None).await,
            self.check_pending_returns(None).await,
        ];
        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::RetentionPolicy;

    #[test]
    fn test_cleanup_overrides_parse() {
        let cli = Cli::try_parse_from(["psi-cron", "cleanup", "--max-age-days=-4", "--min-keep", "2"]).unwrap();
        let Commands::Cleanup { max_age_days, min_keep } = cli.command else {
            panic!("expected cleanup");
        };
        assert_eq!((max_age_days, min_keep), (Some(-4), Some(2)));

        let err = RetentionPolicy::default()
            .with_overrides(max_age_days, min_keep)
            .map_err(invalid)
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_check_overrides_use_handler_bounds() {
        let cli = Cli::try_parse_from(["psi-cron", "check-low-stock", "--threshold=-1"]).unwrap();
        let Commands::CheckLowStock { threshold: Some(threshold) } = cli.command else {
            panic!("expected check-low-stock");
        };
        assert!(matches!(validate_threshold(threshold).map_err(invalid), Err(AppError::ValidationError(_))));

        let cli = Cli::try_parse_from(["psi-cron", "check-pending-returns", "--days", "0"]).unwrap();
        let Commands::CheckPendingReturns { days: Some(days) } = cli.command else {
            panic!("expected check-pending-returns");
        };
        assert!(validate_days(days).is_err());
        assert_eq!(validate_days(30), Ok(30));
    }
}
