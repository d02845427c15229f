//! Database backups: compressed `pg_dump` snapshots plus their metadata

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sha2::{Digest, Sha256};
use shared::{backup_file_name, RetentionPolicy};
use sqlx::{FromRow, PgPool};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::BackupConfig;
use crate::error::{AppError, AppResult};

/// Stored backup metadata
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BackupRecord {
    pub id: Uuid,
    pub filename: String,
    pub size_bytes: i64,
    pub table_count: i32,
    pub checksum: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupOutcome {
    pub deleted: Vec<String>,
    pub kept: usize,
}

/// Compressed dump ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PackedDump {
    pub bytes: Vec<u8>,
    pub table_count: i32,
    pub checksum: String,
}

/// Number of `CREATE TABLE` statements in a plain SQL dump
pub fn dump_table_count(dump: &[u8]) -> i32 {
    let count = dump
        .split(|b| *b == b'\n')
        .filter(|line| line.starts_with(b"CREATE TABLE "))
        .count();
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Gzip the dump and checksum the compressed bytes
pub fn pack_dump(dump: &[u8]) -> std::io::Result<PackedDump> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(dump)?;
    let bytes = encoder.finish()?;
    let checksum = format!("{:x}", Sha256::digest(&bytes));

    Ok(PackedDump {
        table_count: dump_table_count(dump),
        checksum,
        bytes,
    })
}

/// Compress `dump` off the async runtime and write it to `directory/filename`
pub async fn write_dump(directory: &Path, filename: &str, dump: Vec<u8>) -> AppResult<PackedDump> {
    tokio::fs::create_dir_all(directory).await?;

    let packed = tokio::task::spawn_blocking(move || pack_dump(&dump))
        .await
        .map_err(|e| AppError::Internal(format!("compression task failed: {}", e)))??;

    tokio::fs::write(directory.join(filename), &packed.bytes).await?;
    Ok(packed)
}

/// Remove a dump whose metadata row was never written. Returns whether the
/// file is gone; a failure is logged and left for the operator.
pub async fn discard_orphan(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove orphaned backup file");
            false
        }
    }
}

/// Creates, lists and prunes backups
#[derive(Clone)]
pub struct BackupManager {
    db: PgPool,
    database_url: String,
    config: BackupConfig,
}

impl BackupManager {
    pub fn new(db: PgPool, database_url: impl Into<String>, config: BackupConfig) -> Self {
        Self {
            db,
            database_url: database_url.into(),
            config,
        }
    }

    fn directory(&self) -> &Path {
        Path::new(&self.config.directory)
    }

    fn path_of(&self, filename: &str) -> PathBuf {
        self.directory().join(filename)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age_days: self.config.max_age_days,
            min_keep: self.config.min_keep,
        }
    }

    /// Run `pg_dump` and return its plain SQL output
    async fn dump(&self) -> AppResult<Vec<u8>> {
        let output = Command::new(&self.config.pg_dump_path)
            .arg("--no-owner")
            .arg("--no-privileges")
            .arg(&self.database_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::BackupFailed(format!("could not start pg_dump: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::BackupFailed(format!(
                "pg_dump exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    /// Dump, compress and record a new backup
    pub async fn create_backup(&self, created_by: Option<Uuid>) -> AppResult<BackupRecord> {
        let started = Utc::now();
        let filename = backup_file_name(started);

        let dump = self.dump().await?;
        let packed = write_dump(self.directory(), &filename, dump).await?;

        let size_bytes = i64::try_from(packed.bytes.len()).unwrap_or(i64::MAX);
        let inserted = sqlx::query_as::<_, BackupRecord>(
            r#"
            INSERT INTO backups (filename, size_bytes, table_count, checksum, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, filename, size_bytes, table_count, checksum, created_by, created_at
            "#,
        )
        .bind(&filename)
        .bind(size_bytes)
        .bind(packed.table_count)
        .bind(&packed.checksum)
        .bind(created_by)
        .bind(started)
        .fetch_one(&self.db)
        .await;

        let record = match inserted {
            Ok(record) => record,
            Err(e) => {
                discard_orphan(&self.path_of(&filename)).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            filename = %record.filename,
            size_bytes = record.size_bytes,
            tables = record.table_count,
            "Backup created"
        );
        Ok(record)
    }

    pub async fn list_backups(&self) -> AppResult<Vec<BackupRecord>> {
        let backups = sqlx::query_as::<_, BackupRecord>(
            r#"
            SELECT id, filename, size_bytes, table_count, checksum, created_by, created_at
            FROM backups
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(backups)
    }

    /// Remove the file (already missing is fine) and its metadata row
    async fn remove(&self, record: &BackupRecord) -> AppResult<()> {
        match tokio::fs::remove_file(self.path_of(&record.filename)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(filename = %record.filename, "Backup file already missing");
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query("DELETE FROM backups WHERE id = $1")
            .bind(record.id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn delete_backup(&self, id: Uuid) -> AppResult<()> {
        let record = sqlx::query_as::<_, BackupRecord>(
            r#"
            SELECT id, filename, size_bytes, table_count, checksum, created_by, created_at
            FROM backups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Backup".to_string()))?;

        self.remove(&record).await?;
        tracing::info!(filename = %record.filename, "Backup deleted");
        Ok(())
    }

    /// Delete backups older than the policy allows, always keeping the
    /// newest `min_keep`
    pub async fn cleanup_old_backups(&self, policy: RetentionPolicy) -> AppResult<CleanupOutcome> {
        let backups = self.list_backups().await?;
        let expired: Vec<BackupRecord> = policy
            .expired(&backups, |b| b.created_at, Utc::now())
            .into_iter()
            .cloned()
            .collect();

        let mut outcome = CleanupOutcome {
            deleted: Vec::with_capacity(expired.len()),
            kept: backups.len() - expired.len(),
        };
        for record in &expired {
            self.remove(record).await?;
            outcome.deleted.push(record.filename.clone());
        }

        tracing::info!(
            deleted = outcome.deleted.len(),
            kept = outcome.kept,
            max_age_days = policy.max_age_days,
            min_keep = policy.min_keep,
            "Backup cleanup finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const DUMP: &[u8] = b"--\n-- PostgreSQL database dump\n--\nCREATE TABLE public.papers_master (\n    id integer\n);\nCREATE TABLE public.users (\n    id uuid\n);\nCREATE INDEX idx ON users (id);\n";

    #[test]
    fn test_table_count() {
        assert_eq!(dump_table_count(DUMP), 2);
        assert_eq!(dump_table_count(b""), 0);
    }

    #[test]
    fn test_packed_dump_decompresses_to_original() {
        let packed = pack_dump(DUMP).unwrap();
        let mut restored = Vec::new();
        GzDecoder::new(packed.bytes.as_slice())
            .read_to_end(&mut restored)
            .unwrap();
        assert_eq!(restored, DUMP);
        assert_eq!(packed.checksum.len(), 64);
        assert_eq!(packed.table_count, 2);
    }
}
