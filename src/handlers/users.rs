// src/handlers/users.rs

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
        rbac::{PermUsersRead, PermUsersWrite, RequirePermission},
    },
    models::auth::{
        ChangeRolePayload, CreateUserPayload, SuspendUserPayload, UpdateUserPayload, User,
        UserFilters,
    },
};

// GET /api/users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(UserFilters),
    responses(
        (status = 200, description = "Administradores paginados", body = ApiResponse<Page<User>>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermUsersRead>,
    QueryParams(filters): QueryParams<UserFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .user_service
        .list(&filters)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(page))))
}

// GET /api/users/{id}
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "ID do administrador")),
    responses(
        (status = 200, description = "Administrador", body = ApiResponse<User>),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_user(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermUsersRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = app_state
        .user_service
        .get(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(user))))
}

// POST /api/users
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "Administrador criado", body = ApiResponse<User>),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Cargo SUPERADMIN não pode ser concedido"),
        (status = 409, description = "E-mail já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_user(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermUsersWrite>,
    JsonBody(payload): JsonBody<CreateUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let user = app_state
        .user_service
        .create(payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user))))
}

// PUT /api/users/{id}
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    request_body = UpdateUserPayload,
    params(("id" = Uuid, Path, description = "ID do administrador")),
    responses(
        (status = 200, description = "Perfil atualizado", body = ApiResponse<User>)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_user(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermUsersWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let user = app_state
        .user_service
        .update_profile(id, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(user))))
}

// PUT /api/users/{id}/role
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "Users",
    request_body = ChangeRolePayload,
    params(("id" = Uuid, Path, description = "ID do administrador")),
    responses(
        (status = 200, description = "Cargo alterado", body = ApiResponse<User>),
        (status = 403, description = "SUPERADMIN protegido")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_role(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermUsersWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<ChangeRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user = app_state
        .user_service
        .change_role(id, payload.role_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(user))))
}

// PUT /api/users/{id}/suspension
#[utoipa::path(
    put,
    path = "/api/users/{id}/suspension",
    tag = "Users",
    request_body = SuspendUserPayload,
    params(("id" = Uuid, Path, description = "ID do administrador")),
    responses(
        (status = 200, description = "Suspensão alterada", body = ApiResponse<User>),
        (status = 403, description = "SUPERADMIN protegido")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_suspension(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermUsersWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<SuspendUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user = app_state
        .user_service
        .set_suspended(id, payload.is_suspended)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(user))))
}

// DELETE /api/users/{id}
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "ID do administrador")),
    responses(
        (status = 200, description = "Administrador removido", body = ApiResponse<Deleted>),
        (status = 403, description = "SUPERADMIN protegido")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_user(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermUsersWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .user_service
        .delete(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(Deleted { id }))))
}
