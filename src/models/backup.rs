// src/models/backup.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "backup_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "backup_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BackupFrequency {
    Daily,
    Weekly, // Segunda-feira
    Monthly, // Dia 1
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub id: Uuid,
    #[schema(example = "backup-2026-10-17-0200")]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    #[serde(skip_serializing)]
    pub storage_key: String,
    #[serde(rename = "size")]
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoBackupPolicy {
    pub enabled: bool,
    pub frequency: BackupFrequency,
    /// "HH:MM", UTC
    #[schema(example = "02:00")]
    pub time: String,
    #[schema(example = 7)]
    pub keep_last: i32,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Default for AutoBackupPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: BackupFrequency::Daily,
            time: "02:00".to_string(),
            keep_last: 7,
            last_run_at: None,
        }
    }
}

/// Registro pronto para inserção (snapshot já gravado).
#[derive(Debug, Clone)]
pub struct NewBackup {
    pub name: String,
    pub description: Option<String>,
    pub backup_type: BackupType,
    pub storage_key: String,
    pub size_bytes: i64,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBackupPolicyPayload {
    pub enabled: bool,
    pub frequency: BackupFrequency,
    #[validate(custom(function = "validate_hhmm"))]
    #[schema(example = "02:00")]
    pub time: String,
    #[validate(range(min = 1, max = 365, message = "out_of_range"))]
    pub keep_last: i32,
}

pub fn validate_hhmm(value: &str) -> Result<(), ValidationError> {
    chrono::NaiveTime::parse_from_str(value, "%H:%M")
        .map(|_| ())
        .map_err(|_| {
            let mut err = ValidationError::new("invalid_time");
            err.message = Some("invalid_time".into());
            err
        })
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BackupFilters {
    pub page: Option<u32>,
    pub rows_per_page: Option<u32>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub backup_type: Option<BackupType>,
}
