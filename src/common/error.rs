// src/common/error.rs

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Cada variante tem: status HTTP, `errorKind` estável e chave de tradução.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Erros de validação feitos à mão (campo -> código)
    #[error("Campos inválidos: {0:?}")]
    FieldErrors(HashMap<String, String>),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Conta suspensa")]
    AccountSuspended,

    #[error("Permissão ausente: {0}")]
    PermissionDenied(String),

    #[error("Recurso não encontrado: {0}")]
    NotFound(&'static str),

    // --- Regras de sessão do cliente ---
    #[error("O cliente precisa de um comercial atribuído")]
    AssignmentRequired,

    #[error("O cliente já possui uma sessão ativa")]
    ActiveSessionExists,

    #[error("A sessão não está ativa")]
    SessionNotActive,

    #[error("Cliente com dependências (sessões: {sessions}, faturas: {factures}, pagamentos: {payments})")]
    ClientHasDependencies {
        sessions: i64,
        factures: i64,
        payments: i64,
    },

    // --- Usuários / cargos ---
    #[error("O cargo SUPERADMIN é protegido")]
    SuperAdminProtected,

    #[error("Cargo de sistema não pode ser removido")]
    SystemRoleProtected,

    // --- Financeiro ---
    #[error("Pagamento excede o saldo da fatura")]
    PaymentExceedsBalance,

    // --- Upload ---
    #[error("Máximo de {max} arquivos por envio")]
    TooManyFiles { max: usize },

    #[error("Quantidade de arquivos ({files}) diferente da quantidade de títulos ({titles})")]
    UploadMismatch { files: usize, titles: usize },

    #[error("Envio acima do limite de tamanho")]
    PayloadTooLarge,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de armazenamento: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("Erro ao gerar PDF: {0}")]
    PdfError(String),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Atalho para um erro de validação de um único campo.
    pub fn field(field: &str, code: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), code.to_string());
        AppError::FieldErrors(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::FieldErrors(_)
            | AppError::TooManyFiles { .. }
            | AppError::UploadMismatch { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::AccountSuspended
            | AppError::PermissionDenied(_)
            | AppError::SuperAdminProtected
            | AppError::SystemRoleProtected => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailAlreadyExists
            | AppError::UniqueConstraintViolation(_)
            | AppError::ActiveSessionExists
            | AppError::SessionNotActive
            | AppError::ClientHasDependencies { .. }
            | AppError::PaymentExceedsBalance => StatusCode::CONFLICT,
            AppError::AssignmentRequired => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Identificador estável consumido pelo frontend (`errorKind`).
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::FieldErrors(_) => "ValidationError",
            AppError::EmailAlreadyExists => "EmailAlreadyExists",
            AppError::UniqueConstraintViolation(_) => "Conflict",
            AppError::InvalidCredentials => "InvalidCredentials",
            AppError::InvalidToken => "Unauthorized",
            AppError::AccountSuspended => "AccountSuspended",
            AppError::PermissionDenied(_) => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::AssignmentRequired => "AssignmentRequired",
            AppError::ActiveSessionExists => "ActiveSessionExists",
            AppError::SessionNotActive => "SessionNotActive",
            AppError::ClientHasDependencies { .. } => "ClientHasDependencies",
            AppError::SuperAdminProtected => "SuperAdminProtected",
            AppError::SystemRoleProtected => "SystemRoleProtected",
            AppError::PaymentExceedsBalance => "PaymentExceedsBalance",
            AppError::TooManyFiles { .. } => "TooManyFiles",
            AppError::UploadMismatch { .. } => "UploadMismatch",
            AppError::PayloadTooLarge => "PayloadTooLarge",
            _ => "InternalError",
        }
    }

    // Chave no catálogo de mensagens (common/i18n.rs)
    fn message_key(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::FieldErrors(_) => "validation_failed",
            AppError::EmailAlreadyExists => "email_already_exists",
            AppError::UniqueConstraintViolation(_) => "unique_violation",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::AccountSuspended => "account_suspended",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::NotFound(_) => "not_found",
            AppError::AssignmentRequired => "assignment_required",
            AppError::ActiveSessionExists => "active_session_exists",
            AppError::SessionNotActive => "session_not_active",
            AppError::ClientHasDependencies { .. } => "client_has_dependencies",
            AppError::SuperAdminProtected => "superadmin_protected",
            AppError::SystemRoleProtected => "system_role_protected",
            AppError::PaymentExceedsBalance => "payment_exceeds_balance",
            AppError::TooManyFiles { .. } => "too_many_files",
            AppError::UploadMismatch { .. } => "upload_mismatch",
            AppError::PayloadTooLarge => "payload_too_large",
            _ => "internal_error",
        }
    }

    fn details(&self) -> Option<HashMap<String, Vec<String>>> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), codes);
                }
                Some(details)
            }
            AppError::FieldErrors(errors) => Some(
                errors
                    .iter()
                    .map(|(field, code)| (field.clone(), vec![code.clone()]))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Converte para a resposta HTTP, traduzindo a mensagem para o idioma do pedido.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Só os erros internos são logados aqui; o cliente recebe a mensagem genérica.
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let mut message = store.translate(&locale.0, self.message_key());
        if let AppError::NotFound(entity) = self {
            message = format!("{message} ({entity})");
        }

        ApiError {
            status,
            kind: self.kind(),
            message,
            details: self.details(),
        }
    }
}

// A rejeição HTTP: sempre o envelope { success: false, message, errorKind, errors? }
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    pub details: Option<HashMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "message": self.message,
            "errorKind": self.kind,
        });
        if let Some(details) = self.details {
            body["errors"] = json!(details);
        }
        (self.status, Json(body)).into_response()
    }
}

// Usado onde não há Locale disponível (ex.: middleware de autenticação).
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), I18nStore::global())
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_refusals_map_to_stable_kinds() {
        assert_eq!(AppError::AssignmentRequired.kind(), "AssignmentRequired");
        assert_eq!(
            AppError::AssignmentRequired.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::ActiveSessionExists.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidToken.kind(), "Unauthorized");
        assert_eq!(AppError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::StorageError(std::io::Error::other("disk")).kind(),
            "InternalError"
        );
    }

    #[test]
    fn field_errors_are_exposed_as_details() {
        let err = AppError::field("titles", "required");
        let api = err.to_api_error(&Locale("fr".into()), I18nStore::global());

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.kind, "ValidationError");
        let details = api.details.unwrap();
        assert_eq!(details["titles"], vec!["required".to_string()]);
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = AppError::InternalServerError(anyhow::anyhow!("pool exploded"));
        let api = err.to_api_error(&Locale("en".into()), I18nStore::global());

        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("pool exploded"));
    }
}
