// src/handlers/rbac.rs

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
        response::{ApiResponse, Deleted},
    },
    config::AppState,
    middleware::{
        extract::{JsonBody, PathParams},
        i18n::Locale,
        rbac::{PermRolesRead, PermRolesWrite, RequirePermission},
    },
    models::rbac::{
        AssignPermissionPayload, CreateModulePayload, CreatePermissionPayload, CreateRolePayload,
        GenerateResult, Permission, PermissionModule, PermissionPartition, Role, RolePermission,
        RolePermissionsView,
    },
};

// =============================================================================
//  CARGOS
// =============================================================================

// GET /api/roles
#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "RBAC",
    responses((status = 200, description = "Cargos", body = ApiResponse<Vec<Role>>)),
    security(("api_jwt" = []))
)]
pub async fn list_roles(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesRead>,
) -> Result<impl IntoResponse, ApiError> {
    let roles = app_state
        .rbac_service
        .list_roles()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(roles))))
}

// POST /api/roles
#[utoipa::path(
    post,
    path = "/api/roles",
    tag = "RBAC",
    request_body = CreateRolePayload,
    responses(
        (status = 201, description = "Cargo criado", body = ApiResponse<Role>),
        (status = 409, description = "Nome já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_role(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    JsonBody(payload): JsonBody<CreateRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let role = app_state
        .rbac_service
        .create_role(payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(role))))
}

// DELETE /api/roles/{id}
#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses(
        (status = 200, description = "Cargo removido", body = ApiResponse<Deleted>),
        (status = 403, description = "Cargo de sistema"),
        (status = 409, description = "Cargo ainda atribuído")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_role(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .rbac_service
        .delete_role(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(Deleted { id }))))
}

// =============================================================================
//  PERMISSÕES DO CARGO
// =============================================================================

/// Permissões agrupadas por módulo, com o estado de cada uma para o cargo.
#[utoipa::path(
    get,
    path = "/api/roles/{id}/permissions",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses((status = 200, description = "Permissões por módulo", body = ApiResponse<RolePermissionsView>)),
    security(("api_jwt" = []))
)]
pub async fn get_role_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = app_state
        .rbac_service
        .permissions_for_role(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(view))))
}

// GET /api/roles/{id}/permissions/partition
#[utoipa::path(
    get,
    path = "/api/roles/{id}/permissions/partition",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses((status = 200, description = "Atribuídas e disponíveis", body = ApiResponse<PermissionPartition>)),
    security(("api_jwt" = []))
)]
pub async fn get_permission_partition(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let partition = app_state
        .rbac_service
        .partition_for_role(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(partition))))
}

/// Cria as linhas que faltam (desativadas). Chamadas repetidas não duplicam.
#[utoipa::path(
    post,
    path = "/api/roles/{id}/permissions/generate",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses((status = 200, description = "Linhas geradas", body = ApiResponse<GenerateResult>)),
    security(("api_jwt" = []))
)]
pub async fn generate_role_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .rbac_service
        .generate_all(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(result))))
}

// POST /api/roles/{id}/permissions
#[utoipa::path(
    post,
    path = "/api/roles/{id}/permissions",
    tag = "RBAC",
    request_body = AssignPermissionPayload,
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses((status = 200, description = "Permissão ativada", body = ApiResponse<RolePermission>)),
    security(("api_jwt" = []))
)]
pub async fn assign_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<AssignPermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let row = app_state
        .rbac_service
        .assign(id, payload.permission_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(row))))
}

// DELETE /api/roles/{id}/permissions/{permission_id}
#[utoipa::path(
    delete,
    path = "/api/roles/{id}/permissions/{permission_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "ID do cargo"),
        ("permission_id" = Uuid, Path, description = "ID da permissão")
    ),
    responses((status = 200, description = "Permissão desativada", body = ApiResponse<RolePermission>)),
    security(("api_jwt" = []))
)]
pub async fn remove_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    PathParams((id, permission_id)): PathParams<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let row = app_state
        .rbac_service
        .remove(id, permission_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(row))))
}

// PUT /api/role-permissions/{id}/toggle
#[utoipa::path(
    put,
    path = "/api/role-permissions/{id}/toggle",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID da linha cargo/permissão")),
    responses(
        (status = 200, description = "Estado invertido", body = ApiResponse<RolePermission>),
        (status = 404, description = "Linha inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn toggle_role_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = app_state
        .rbac_service
        .toggle(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(row))))
}

// =============================================================================
//  CATÁLOGO (MÓDULOS E PERMISSÕES)
// =============================================================================

// GET /api/permission-modules
#[utoipa::path(
    get,
    path = "/api/permission-modules",
    tag = "RBAC",
    responses((status = 200, description = "Módulos", body = ApiResponse<Vec<PermissionModule>>)),
    security(("api_jwt" = []))
)]
pub async fn list_modules(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesRead>,
) -> Result<impl IntoResponse, ApiError> {
    let modules = app_state
        .rbac_service
        .list_modules()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(modules))))
}

// POST /api/permission-modules
#[utoipa::path(
    post,
    path = "/api/permission-modules",
    tag = "RBAC",
    request_body = CreateModulePayload,
    responses((status = 201, description = "Módulo criado", body = ApiResponse<PermissionModule>)),
    security(("api_jwt" = []))
)]
pub async fn create_module(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    JsonBody(payload): JsonBody<CreateModulePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let module = app_state
        .rbac_service
        .create_module(payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(module))))
}

// GET /api/permissions
#[utoipa::path(
    get,
    path = "/api/permissions",
    tag = "RBAC",
    responses((status = 200, description = "Permissões", body = ApiResponse<Vec<Permission>>)),
    security(("api_jwt" = []))
)]
pub async fn list_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesRead>,
) -> Result<impl IntoResponse, ApiError> {
    let permissions = app_state
        .rbac_service
        .list_permissions()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(permissions))))
}

// POST /api/permissions
#[utoipa::path(
    post,
    path = "/api/permissions",
    tag = "RBAC",
    request_body = CreatePermissionPayload,
    responses(
        (status = 201, description = "Permissão criada", body = ApiResponse<Permission>),
        (status = 400, description = "Slug fora do formato modulo:acao")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermRolesWrite>,
    JsonBody(payload): JsonBody<CreatePermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let permission = app_state
        .rbac_service
        .create_permission(payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(permission))))
}
