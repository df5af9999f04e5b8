// src/services/backup_service.rs

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        response::{Page, Pagination},
    },
    db::BackupRepository,
    models::{
        backup::{
            AutoBackupPolicy, Backup, BackupFilters, BackupFrequency, BackupType,
            CreateBackupPayload, NewBackup, UpdateBackupPolicyPayload,
        },
        document::DownloadLink,
    },
    services::document_service::{DownloadLinks, DownloadTarget},
    storage::{sanitize_file_name, BlobStorage},
};

/// Intervalo do agendador de backups automáticos.
const SCHEDULER_TICK: StdDuration = StdDuration::from_secs(60);

#[derive(Clone)]
pub struct BackupService {
    repo: Arc<dyn BackupRepository>,
    storage: Arc<dyn BlobStorage>,
    links: DownloadLinks,
}

impl BackupService {
    pub fn new(repo: Arc<dyn BackupRepository>, storage: Arc<dyn BlobStorage>, links: DownloadLinks) -> Self {
        Self { repo, storage, links }
    }

    pub async fn list(&self, filters: &BackupFilters) -> Result<Page<Backup>, AppError> {
        let pagination = Pagination::new(filters.page, filters.rows_per_page);
        self.repo.list(filters, pagination).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Backup, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("backup"))
    }

    pub async fn create_manual(&self, payload: &CreateBackupPayload) -> Result<Backup, AppError> {
        payload.validate()?;
        let backup = self
            .snapshot(payload.name.trim(), payload.description.clone(), BackupType::Manual)
            .await?;
        tracing::info!(backup_id = %backup.id, size = backup.size_bytes, "Backup manual criado");
        Ok(backup)
    }

    // Exporta as tabelas, grava o JSON no storage e registra a linha
    async fn snapshot(
        &self,
        name: &str,
        description: Option<String>,
        backup_type: BackupType,
    ) -> Result<Backup, AppError> {
        let snapshot = self.repo.export_snapshot().await?;
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| anyhow::anyhow!("Falha ao serializar snapshot: {}", e))?;

        let storage_key = format!("backups/{}-{}.json", sanitize_file_name(name), Uuid::new_v4());
        self.storage.put(&storage_key, &bytes).await?;

        let inserted = self
            .repo
            .insert(NewBackup {
                name: name.to_string(),
                description,
                backup_type,
                storage_key: storage_key.clone(),
                size_bytes: bytes.len() as i64,
            })
            .await;

        match inserted {
            Ok(backup) => Ok(backup),
            Err(e) => {
                if let Err(io) = self.storage.delete(&storage_key).await {
                    tracing::error!(key = %storage_key, "Falha ao desfazer snapshot: {}", io);
                }
                Err(e)
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let backup = self
            .repo
            .delete(id)
            .await?
            .ok_or(AppError::NotFound("backup"))?;
        if let Err(e) = self.storage.delete(&backup.storage_key).await {
            tracing::error!(key = %backup.storage_key, "Falha ao remover snapshot: {}", e);
        }
        Ok(())
    }

    pub async fn download_link(&self, id: Uuid) -> Result<DownloadLink, AppError> {
        self.get(id).await?;
        self.links.issue(DownloadTarget::Backup(id))
    }

    pub async fn open(&self, id: Uuid) -> Result<(Backup, Vec<u8>), AppError> {
        let backup = self.get(id).await?;
        let bytes = self.storage.get(&backup.storage_key).await?;
        Ok((backup, bytes))
    }

    // =========================================================================
    //  POLÍTICA DE BACKUP AUTOMÁTICO
    // =========================================================================

    pub async fn get_policy(&self) -> Result<AutoBackupPolicy, AppError> {
        self.repo.get_policy().await
    }

    pub async fn update_policy(&self, payload: &UpdateBackupPolicyPayload) -> Result<AutoBackupPolicy, AppError> {
        payload.validate()?;
        let policy = self.repo.update_policy(payload).await?;
        tracing::info!(
            enabled = policy.enabled,
            frequency = ?policy.frequency,
            time = %policy.time,
            keep_last = policy.keep_last,
            "Política de backup atualizada"
        );
        Ok(policy)
    }

    /// Roda o backup automático se o último horário previsto ainda não foi coberto.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<Option<Backup>, AppError> {
        let policy = self.repo.get_policy().await?;
        if !is_due(&policy, now) {
            return Ok(None);
        }

        let name = format!("auto-{}", now.format("%Y-%m-%d-%H%M"));
        let backup = self.snapshot(&name, None, BackupType::Auto).await?;
        self.repo.mark_run(now).await?;
        tracing::info!(backup_id = %backup.id, "Backup automático criado");

        self.prune(policy.keep_last).await?;
        Ok(Some(backup))
    }

    // Só os automáticos entram na rotação
    async fn prune(&self, keep_last: i32) -> Result<(), AppError> {
        let auto = self.repo.list_auto().await?;
        for backup in select_for_pruning(auto, keep_last) {
            self.delete(backup.id).await?;
            tracing::info!(backup_id = %backup.id, "Backup automático antigo removido");
        }
        Ok(())
    }
}

/// Último horário previsto pela política que já passou (UTC).
/// Diário: todo dia; semanal: segunda-feira; mensal: dia 1.
pub fn most_recent_slot(frequency: BackupFrequency, time: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
    let today = now.date_naive();

    let (candidate, step_back) = match frequency {
        BackupFrequency::Daily => (today, Some(Duration::days(1))),
        BackupFrequency::Weekly => {
            let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            (monday, Some(Duration::weeks(1)))
        }
        BackupFrequency::Monthly => (today.with_day(1)?, None),
    };

    let slot = candidate.and_time(time).and_utc();
    if slot <= now {
        return Some(slot);
    }
    match step_back {
        Some(step) => Some(slot - step),
        None => candidate
            .checked_sub_months(Months::new(1))
            .map(|d| d.and_time(time).and_utc()),
    }
}

pub fn is_due(policy: &AutoBackupPolicy, now: DateTime<Utc>) -> bool {
    if !policy.enabled {
        return false;
    }
    match most_recent_slot(policy.frequency, &policy.time, now) {
        Some(slot) => policy.last_run_at.is_none_or(|last| last < slot),
        None => false,
    }
}

/// Recebe os automáticos do mais novo para o mais antigo; devolve os que passam de `keep_last`.
pub fn select_for_pruning(mut auto_backups: Vec<Backup>, keep_last: i32) -> Vec<Backup> {
    auto_backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let keep = usize::try_from(keep_last.max(1)).unwrap_or(1);
    auto_backups
        .into_iter()
        .filter(|b| b.backup_type == BackupType::Auto)
        .skip(keep)
        .collect()
}

/// Tarefa de fundo: confere a política a cada minuto.
pub fn spawn_scheduler(service: BackupService) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SCHEDULER_TICK);
        tracing::info!("⏰ Agendador de backups iniciado");
        loop {
            interval.tick().await;
            if let Err(e) = service.run_due(Utc::now()).await {
                tracing::error!("Falha no backup automático: {}", e);
            }
        }
    })
}
