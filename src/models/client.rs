// src/models/client.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// --- ENUMS ---

// Mapeia o CREATE TYPE client_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "client_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Lead,
    Prospect,
    Client,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

// --- CLIENTE ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(example = "Youssef El Amrani")]
    pub nom: String,
    #[schema(example = "+212600000000")]
    pub numero: String,
    pub email: Option<String>,
    #[schema(example = "VisaCanada")]
    pub service: String,
    pub status: ClientStatus,
    #[schema(example = "dossier_en_cours")]
    pub step: Option<String>,
    /// Comercial responsável. Sem ele não é possível abrir sessão.
    pub assigned_to: Option<Uuid>,
    pub commentaire: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- SESSÃO (engajamento do cliente num serviço) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub client_id: Uuid,
    pub service: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,

    // Preenchido pelo repositório numa segunda consulta
    #[sqlx(skip)]
    #[serde(default)]
    pub conclusions: Vec<Conclusion>,
}

#[cfg(test)]
impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conclusion {
    pub id: Uuid,
    pub session_id: Uuid,
    pub text: String,
    pub reminder_date: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Contadores usados na aba de resumo e na regra de remoção
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub sessions_count: i64,
    pub factures_count: i64,
    pub payments_count: i64,
    #[schema(example = "10000.00")]
    pub total_facture: Decimal,
    #[schema(example = "4000.00")]
    pub total_paye: Decimal,
    #[schema(example = "6000.00")]
    pub total_restant: Decimal,
}

// Tela de detalhe: tudo o que a página carrega em paralelo
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    pub client: Client,
    pub summary: ClientSummary,
    pub sessions: Vec<Session>,
    pub active_session: Option<Session>,
}

// --- PAYLOADS ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientPayload {
    #[validate(length(min = 1, message = "required"))]
    pub nom: String,
    #[validate(length(min = 1, message = "required"))]
    pub numero: String,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub service: String,
    pub status: Option<ClientStatus>,
    pub step: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub commentaire: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientPayload {
    #[validate(length(min = 1, message = "required"))]
    pub nom: String,
    #[validate(length(min = 1, message = "required"))]
    pub numero: String,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub service: String,
    pub step: Option<String>,
    pub commentaire: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientStatusPayload {
    pub status: ClientStatus,
    pub step: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignClientPayload {
    /// `null` remove a atribuição
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "VisaCanada")]
    pub service: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddConclusionPayload {
    pub text: String,
    /// RFC 3339, `YYYY-MM-DDTHH:MM` (UTC) ou `YYYY-MM-DD`
    #[schema(example = "2026-11-02T09:30")]
    pub reminder_date: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ClientFilters {
    pub page: Option<u32>,
    pub rows_per_page: Option<u32>,
    /// Nome, número ou e-mail
    pub search: Option<String>,
    pub status: Option<ClientStatus>,
    pub assigned_to: Option<Uuid>,
    pub service: Option<String>,
}

/// Conclusão já normalizada (lembrete convertido para UTC).
#[derive(Debug, Clone)]
pub struct NewConclusion {
    pub session_id: Uuid,
    pub text: String,
    pub reminder_date: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}
