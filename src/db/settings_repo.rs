// src/db/settings_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::settings::{AppSettings, UpdateSettingsRequest},
};

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self) -> Result<AppSettings, AppError>;
    async fn update(&self, input: &UpdateSettingsRequest) -> Result<AppSettings, AppError>;
}

#[derive(Clone)]
pub struct PgSettingsRepository {
    pool: PgPool,
}

impl PgSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn get(&self) -> Result<AppSettings, AppError> {
        // Se ainda não existe, devolve tudo vazio
        let settings = sqlx::query_as::<_, AppSettings>(
            r#"
            SELECT company_name, address, phone, email, logo_url, invoice_footer, updated_at
            FROM app_settings
            WHERE id
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_default())
    }

    async fn update(&self, input: &UpdateSettingsRequest) -> Result<AppSettings, AppError> {
        // UPSERT (Insert or Update) da linha única
        let settings = sqlx::query_as::<_, AppSettings>(
            r#"
            INSERT INTO app_settings (id, company_name, address, phone, email, logo_url, invoice_footer, updated_at)
            VALUES (TRUE, $1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id)
            DO UPDATE SET
                company_name = EXCLUDED.company_name,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                logo_url = EXCLUDED.logo_url,
                invoice_footer = EXCLUDED.invoice_footer,
                updated_at = NOW()
            RETURNING company_name, address, phone, email, logo_url, invoice_footer, updated_at
            "#,
        )
        .bind(&input.company_name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.logo_url)
        .bind(&input.invoice_footer)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }
}
