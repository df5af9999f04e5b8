// src/services/settings_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::SettingsRepository,
    models::settings::{AppSettings, UpdateSettingsRequest},
};

#[derive(Clone)]
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    pub async fn get(&self) -> Result<AppSettings, AppError> {
        self.repo.get().await
    }

    pub async fn update(&self, input: &UpdateSettingsRequest) -> Result<AppSettings, AppError> {
        let settings = self.repo.update(input).await?;
        tracing::info!("Configurações atualizadas");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryDb;

    #[tokio::test]
    async fn starts_empty_and_keeps_last_update() {
        let db = InMemoryDb::seeded();
        let settings = SettingsService::new(db.clone());
        assert!(settings.get().await.unwrap().company_name.is_none());

        settings
            .update(&UpdateSettingsRequest {
                company_name: Some("Atlas Voyages".into()),
                address: None,
                phone: None,
                email: Some("contact@atlas.ma".into()),
                logo_url: None,
                invoice_footer: Some("Merci".into()),
            })
            .await
            .unwrap();

        let current = settings.get().await.unwrap();
        assert_eq!(current.company_name.as_deref(), Some("Atlas Voyages"));
        assert_eq!(current.invoice_footer.as_deref(), Some("Merci"));
        assert!(current.updated_at.is_some());
    }
}
