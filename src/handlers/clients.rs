// src/handlers/clients.rs

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
        rbac::{PermClientsRead, PermClientsWrite, PermSessionsRead, PermSessionsWrite, RequirePermission},
    },
    models::client::{
        AssignClientPayload, Client, ClientDetails, ClientFilters, CreateClientPayload,
        OpenSessionPayload, Session, UpdateClientPayload, UpdateClientStatusPayload,
    },
};

// =============================================================================
//  CLIENTES
// =============================================================================

// GET /api/clients
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    params(ClientFilters),
    responses(
        (status = 200, description = "Clientes paginados", body = ApiResponse<Page<Client>>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsRead>,
    QueryParams(filters): QueryParams<ClientFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .client_service
        .list(&filters)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(page))))
}

// POST /api/clients
#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    request_body = CreateClientPayload,
    responses(
        (status = 201, description = "Cliente criado", body = ApiResponse<Client>),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_client(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsWrite>,
    JsonBody(payload): JsonBody<CreateClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let client = app_state
        .client_service
        .create(&payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(client))))
}

// GET /api/clients/{id}
#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente", body = ApiResponse<Client>),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let client = app_state
        .client_service
        .get(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(client))))
}

/// Ficha completa: cliente, contadores, sessões e sessão ativa.
#[utoipa::path(
    get,
    path = "/api/clients/{id}/details",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Ficha do cliente", body = ApiResponse<ClientDetails>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_client_details(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let details = app_state
        .client_service
        .details(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(details))))
}

// PUT /api/clients/{id}
#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    tag = "Clients",
    request_body = UpdateClientPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente atualizado", body = ApiResponse<Client>)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let client = app_state
        .client_service
        .update(id, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(client))))
}

// PUT /api/clients/{id}/status
#[utoipa::path(
    put,
    path = "/api/clients/{id}/status",
    tag = "Clients",
    request_body = UpdateClientStatusPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Status atualizado", body = ApiResponse<Client>)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_client_status(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateClientStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let client = app_state
        .client_service
        .update_status(id, payload.status, payload.step.as_deref())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(client))))
}

// PUT /api/clients/{id}/assign
#[utoipa::path(
    put,
    path = "/api/clients/{id}/assign",
    tag = "Clients",
    request_body = AssignClientPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Responsável atualizado", body = ApiResponse<Client>),
        (status = 404, description = "Cliente ou administrador inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_client(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<AssignClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let client = app_state
        .client_service
        .assign(id, payload.assigned_to)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(client))))
}

// DELETE /api/clients/{id}
#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente removido", body = ApiResponse<Deleted>),
        (status = 409, description = "Cliente com sessões, faturas ou pagamentos")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_client(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermClientsWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .client_service
        .delete(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(Deleted { id }))))
}

// =============================================================================
//  SESSÕES DO CLIENTE
// =============================================================================

// GET /api/clients/{id}/sessions
#[utoipa::path(
    get,
    path = "/api/clients/{id}/sessions",
    tag = "Sessions",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Sessões com conclusões", body = ApiResponse<Vec<Session>>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_client_sessions(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermSessionsRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = app_state
        .client_service
        .list_sessions(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(sessions))))
}

/// Retorna `data: null` quando o cliente não tem sessão ativa.
#[utoipa::path(
    get,
    path = "/api/clients/{id}/sessions/active",
    tag = "Sessions",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Sessão ativa ou null", body = ApiResponse<Option<Session>>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_active_session(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermSessionsRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .client_service
        .active_session(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(session))))
}

// POST /api/clients/{id}/sessions
#[utoipa::path(
    post,
    path = "/api/clients/{id}/sessions",
    tag = "Sessions",
    request_body = OpenSessionPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 201, description = "Sessão aberta", body = ApiResponse<Session>),
        (status = 409, description = "Cliente já possui sessão ativa"),
        (status = 422, description = "Cliente sem responsável")
    ),
    security(("api_jwt" = []))
)]
pub async fn open_session(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermSessionsWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<OpenSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let session = app_state
        .client_service
        .open_session(id, &payload.service)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(session))))
}
