// src/models/document.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Limite de arquivos por envio múltiplo.
pub const MAX_FILES_PER_UPLOAD: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    #[schema(example = "Passeport")]
    pub title: String,
    #[schema(example = "passeport.pdf")]
    pub file_name: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Arquivo recebido no multipart, ainda não gravado.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A quem os documentos pertencem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentOwner {
    pub client_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

/// Registro pronto para inserção (blob já gravado no storage).
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub owner: DocumentOwner,
    pub title: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    #[schema(example = "http://localhost:3000/api/downloads/eyJ0eXAiOi...")]
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DocumentFilters {
    pub page: Option<u32>,
    pub rows_per_page: Option<u32>,
    /// Título ou nome do arquivo
    pub search: Option<String>,
    pub client_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

/// Formato do multipart de envio (só para a documentação OpenAPI).
/// Envio simples usa `file`/`title`; envio múltiplo repete `files`/`titles`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct UploadDocumentsForm {
    pub client_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
    pub titles: Vec<String>,
}
