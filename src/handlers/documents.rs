// src/handlers/documents.rs

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::{
    common::{
        error::{ApiError, AppError},
        response::{ApiResponse, Deleted, Page},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        extract::{PathParams, QueryParams},
        i18n::Locale,
        rbac::{PermDocumentsRead, PermDocumentsWrite, RequirePermission},
    },
    models::document::{
        Document, DocumentFilters, DocumentOwner, DownloadLink, UploadDocumentsForm, UploadFile,
    },
    services::document_service::DownloadTarget,
};

// GET /api/documents
#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "Documents",
    params(DocumentFilters),
    responses((status = 200, description = "Documentos paginados", body = ApiResponse<Page<Document>>)),
    security(("api_jwt" = []))
)]
pub async fn list_documents(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermDocumentsRead>,
    QueryParams(filters): QueryParams<DocumentFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .document_service
        .list(&filters)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(page))))
}

/// Envio simples (`file` + `title`) ou múltiplo (`files` + `titles`, até 10).
/// O lote é atômico: ou todos os documentos entram, ou nenhum.
#[utoipa::path(
    post,
    path = "/api/documents",
    tag = "Documents",
    request_body(content = UploadDocumentsForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Documentos criados", body = ApiResponse<Vec<Document>>),
        (status = 400, description = "Arquivos e títulos não conferem")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_documents(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermDocumentsWrite>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let multipart = multipart
        .map_err(|rejection| AppError::from(rejection).to_api_error(&locale, &app_state.i18n_store))?;
    let (owner, files, titles) = read_upload(multipart)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    let documents = app_state
        .document_service
        .upload(owner, files, titles, Some(user.id))
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(documents))))
}

/// Lê os campos do multipart, na ordem em que chegam.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<(DocumentOwner, Vec<UploadFile>, Vec<String>), AppError> {
    let mut owner = DocumentOwner::default();
    let mut files = Vec::new();
    let mut titles = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("files", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "files" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("files", e))?;
                files.push(UploadFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "title" | "titles" => {
                let title = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("titles", e))?;
                titles.push(title);
            }
            "clientId" => owner.client_id = Some(parse_uuid_field(field, "clientId").await?),
            "patientId" => owner.patient_id = Some(parse_uuid_field(field, "patientId").await?),
            _ => tracing::debug!(field = %name, "Campo de multipart ignorado"),
        }
    }

    Ok((owner, files, titles))
}

// O corte do DefaultBodyLimit aparece aqui, no meio da leitura
fn multipart_error(field: &str, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::field(field, "invalid_multipart")
    }
}

async fn parse_uuid_field(field: Field<'_>, name: &str) -> Result<Uuid, AppError> {
    let raw = field
        .text()
        .await
        .map_err(|e| multipart_error(name, e))?;
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::field(name, "invalid_uuid"))
}

// DELETE /api/documents/{id}
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses(
        (status = 200, description = "Documento removido", body = ApiResponse<Deleted>),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_document(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermDocumentsWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .document_service
        .delete(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(Deleted { id }))))
}

// GET /api/documents/{id}/link
#[utoipa::path(
    get,
    path = "/api/documents/{id}/link",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses((status = 200, description = "Link assinado de curta duração", body = ApiResponse<DownloadLink>)),
    security(("api_jwt" = []))
)]
pub async fn document_link(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermDocumentsRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let link = app_state
        .document_service
        .download_link(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(link))))
}

/// Rota pública: o próprio token autoriza o download (documento ou backup).
#[utoipa::path(
    get,
    path = "/api/downloads/{token}",
    tag = "Documents",
    params(("token" = String, Path, description = "Token assinado do link")),
    responses(
        (status = 200, description = "Conteúdo do arquivo", body = Vec<u8>),
        (status = 401, description = "Token inválido ou expirado")
    )
)]
pub async fn download(
    State(app_state): State<AppState>,
    locale: Locale,
    PathParams(token): PathParams<String>,
) -> Result<Response, ApiError> {
    let reject = |app_err: AppError| app_err.to_api_error(&locale, &app_state.i18n_store);

    let target = app_state
        .document_service
        .links()
        .resolve(&token)
        .map_err(reject)?;

    let (content_type, file_name, bytes) = match target {
        DownloadTarget::Document(id) => {
            let (document, bytes) = app_state.document_service.open(id).await.map_err(reject)?;
            (document.content_type, document.file_name, bytes)
        }
        DownloadTarget::Backup(id) => {
            let (backup, bytes) = app_state.backup_service.open(id).await.map_err(reject)?;
            ("application/json".to_string(), format!("{}.json", backup.name), bytes)
        }
    };

    let headers = [
        (header::CONTENT_TYPE, content_type),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
        ),
    ];
    Ok((StatusCode::OK, headers, bytes).into_response())
}
