// src/db/backup_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{search_pattern, Page, Pagination},
    },
    models::backup::{AutoBackupPolicy, Backup, BackupFilters, NewBackup, UpdateBackupPolicyPayload},
};

#[async_trait]
pub trait BackupRepository: Send + Sync {
    async fn list(&self, filters: &BackupFilters, pagination: Pagination) -> Result<Page<Backup>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Backup>, AppError>;
    async fn insert(&self, backup: NewBackup) -> Result<Backup, AppError>;
    async fn delete(&self, id: Uuid) -> Result<Option<Backup>, AppError>;
    /// Backups automáticos, mais recentes primeiro.
    async fn list_auto(&self) -> Result<Vec<Backup>, AppError>;

    async fn get_policy(&self) -> Result<AutoBackupPolicy, AppError>;
    async fn update_policy(&self, input: &UpdateBackupPolicyPayload) -> Result<AutoBackupPolicy, AppError>;
    async fn mark_run(&self, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Foto JSON das tabelas de negócio.
    async fn export_snapshot(&self) -> Result<serde_json::Value, AppError>;
}

const BACKUP_COLUMNS: &str = "id, name, description, backup_type, storage_key, size_bytes, created_at";
const POLICY_COLUMNS: &str = "enabled, frequency, time, keep_last, last_run_at";

const FILTER_BACKUPS: &str = r#"
    WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\' OR description ILIKE $1 ESCAPE '\')
      AND ($2::backup_type IS NULL OR backup_type = $2)
"#;

// Tabelas exportadas, na ordem de restauração
const SNAPSHOT_TABLES: &[&str] = &[
    "permission_modules",
    "permissions",
    "roles",
    "role_permissions",
    "users",
    "clients",
    "client_sessions",
    "conclusions",
    "factures",
    "payments",
    "patients",
    "documents",
    "app_settings",
];

#[derive(Clone)]
pub struct PgBackupRepository {
    pool: PgPool,
}

impl PgBackupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BackupRepository for PgBackupRepository {
    async fn list(&self, filters: &BackupFilters, pagination: Pagination) -> Result<Page<Backup>, AppError> {
        let search = search_pattern(filters.search.as_deref());

        let sql = format!(
            "SELECT {BACKUP_COLUMNS} FROM backups {FILTER_BACKUPS} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Backup>(&sql)
            .bind(&search)
            .bind(filters.backup_type)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM backups {FILTER_BACKUPS}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .bind(filters.backup_type)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Backup>, AppError> {
        let sql = format!("SELECT {BACKUP_COLUMNS} FROM backups WHERE id = $1");
        let backup = sqlx::query_as::<_, Backup>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(backup)
    }

    async fn insert(&self, backup: NewBackup) -> Result<Backup, AppError> {
        let sql = format!(
            r#"
            INSERT INTO backups (name, description, backup_type, storage_key, size_bytes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BACKUP_COLUMNS}
            "#
        );
        let backup = sqlx::query_as::<_, Backup>(&sql)
            .bind(&backup.name)
            .bind(&backup.description)
            .bind(backup.backup_type)
            .bind(&backup.storage_key)
            .bind(backup.size_bytes)
            .fetch_one(&self.pool)
            .await?;
        Ok(backup)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Backup>, AppError> {
        let sql = format!("DELETE FROM backups WHERE id = $1 RETURNING {BACKUP_COLUMNS}");
        let backup = sqlx::query_as::<_, Backup>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(backup)
    }

    async fn list_auto(&self) -> Result<Vec<Backup>, AppError> {
        let sql = format!(
            "SELECT {BACKUP_COLUMNS} FROM backups WHERE backup_type = 'auto' ORDER BY created_at DESC"
        );
        let backups = sqlx::query_as::<_, Backup>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(backups)
    }

    async fn get_policy(&self) -> Result<AutoBackupPolicy, AppError> {
        // A migração insere a linha única; o upsert cobre bancos restaurados sem ela
        let sql = format!(
            r#"
            INSERT INTO backup_policy (id) VALUES (TRUE)
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id
            RETURNING {POLICY_COLUMNS}
            "#
        );
        let policy = sqlx::query_as::<_, AutoBackupPolicy>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(policy)
    }

    async fn update_policy(&self, input: &UpdateBackupPolicyPayload) -> Result<AutoBackupPolicy, AppError> {
        let sql = format!(
            r#"
            INSERT INTO backup_policy (id, enabled, frequency, time, keep_last)
            VALUES (TRUE, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                frequency = EXCLUDED.frequency,
                time = EXCLUDED.time,
                keep_last = EXCLUDED.keep_last
            RETURNING {POLICY_COLUMNS}
            "#
        );
        let policy = sqlx::query_as::<_, AutoBackupPolicy>(&sql)
            .bind(input.enabled)
            .bind(input.frequency)
            .bind(&input.time)
            .bind(input.keep_last)
            .fetch_one(&self.pool)
            .await?;
        Ok(policy)
    }

    async fn mark_run(&self, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE backup_policy SET last_run_at = $1 WHERE id")
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn export_snapshot(&self) -> Result<serde_json::Value, AppError> {
        let mut tx = self.pool.begin().await?;
        // Leitura consistente entre as tabelas
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let mut tables = serde_json::Map::new();
        for table in SNAPSHOT_TABLES {
            // Nomes vêm da constante acima, nunca do usuário
            let sql = format!("SELECT COALESCE(json_agg(t), '[]'::json) FROM {table} t");
            let rows: serde_json::Value = sqlx::query_scalar(&sql).fetch_one(&mut *tx).await?;
            tables.insert((*table).to_string(), rows);
        }

        tx.commit().await?;
        Ok(serde_json::Value::Object(tables))
    }
}
