// src/models/settings.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[schema(example = "Clinique Atlas / Atlas Voyages")]
    pub company_name: Option<String>,

    #[schema(example = "12 Bd Zerktouni, Casablanca")]
    pub address: Option<String>,

    #[schema(example = "+212522000000")]
    pub phone: Option<String>,

    #[schema(example = "contact@atlas.ma")]
    pub email: Option<String>,

    #[schema(example = "https://atlas.ma/logo.png")]
    pub logo_url: Option<String>,

    #[schema(example = "Merci pour votre confiance.")]
    pub invoice_footer: Option<String>,

    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    #[validate(url(message = "invalid_url"))]
    pub logo_url: Option<String>,
    pub invoice_footer: Option<String>,
}
