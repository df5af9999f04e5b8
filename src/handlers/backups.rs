// src/handlers/backups.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        response::{ApiResponse, Deleted, Page},
    },
    config::AppState,
    middleware::{
        extract::{JsonBody, PathParams, QueryParams},
        i18n::Locale,
        rbac::{PermBackupsRead, PermBackupsWrite, RequirePermission},
    },
    models::{
        backup::{AutoBackupPolicy, Backup, BackupFilters, CreateBackupPayload, UpdateBackupPolicyPayload},
        document::DownloadLink,
    },
};

// GET /api/backups
#[utoipa::path(
    get,
    path = "/api/backups",
    tag = "Backups",
    params(BackupFilters),
    responses((status = 200, description = "Backups paginados", body = ApiResponse<Page<Backup>>)),
    security(("api_jwt" = []))
)]
pub async fn list_backups(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermBackupsRead>,
    QueryParams(filters): QueryParams<BackupFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .backup_service
        .list(&filters)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(page))))
}

/// Backup manual: snapshot JSON das tabelas de negócio.
#[utoipa::path(
    post,
    path = "/api/backups",
    tag = "Backups",
    request_body = CreateBackupPayload,
    responses((status = 201, description = "Backup criado", body = ApiResponse<Backup>)),
    security(("api_jwt" = []))
)]
pub async fn create_backup(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermBackupsWrite>,
    JsonBody(payload): JsonBody<CreateBackupPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let backup = app_state
        .backup_service
        .create_manual(&payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(backup))))
}

// DELETE /api/backups/{id}
#[utoipa::path(
    delete,
    path = "/api/backups/{id}",
    tag = "Backups",
    params(("id" = Uuid, Path, description = "ID do backup")),
    responses((status = 200, description = "Backup removido", body = ApiResponse<Deleted>)),
    security(("api_jwt" = []))
)]
pub async fn delete_backup(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermBackupsWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .backup_service
        .delete(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(Deleted { id }))))
}

// GET /api/backups/{id}/link
#[utoipa::path(
    get,
    path = "/api/backups/{id}/link",
    tag = "Backups",
    params(("id" = Uuid, Path, description = "ID do backup")),
    responses((status = 200, description = "Link assinado", body = ApiResponse<DownloadLink>)),
    security(("api_jwt" = []))
)]
pub async fn backup_link(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermBackupsRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let link = app_state
        .backup_service
        .download_link(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(link))))
}

// GET /api/backups/policy
#[utoipa::path(
    get,
    path = "/api/backups/policy",
    tag = "Backups",
    responses((status = 200, description = "Política de backup automático", body = ApiResponse<AutoBackupPolicy>)),
    security(("api_jwt" = []))
)]
pub async fn get_policy(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermBackupsRead>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = app_state
        .backup_service
        .get_policy()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(policy))))
}

// PUT /api/backups/policy
#[utoipa::path(
    put,
    path = "/api/backups/policy",
    tag = "Backups",
    request_body = UpdateBackupPolicyPayload,
    responses(
        (status = 200, description = "Política atualizada", body = ApiResponse<AutoBackupPolicy>),
        (status = 400, description = "Horário ou retenção inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_policy(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermBackupsWrite>,
    JsonBody(payload): JsonBody<UpdateBackupPolicyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = app_state
        .backup_service
        .update_policy(&payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(policy))))
}
