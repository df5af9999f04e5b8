// src/handlers/sessions.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::{error::ApiError, response::ApiResponse},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        extract::{JsonBody, PathParams},
        i18n::Locale,
        rbac::{PermSessionsWrite, RequirePermission},
    },
    models::client::{AddConclusionPayload, Conclusion, Session},
};

// PUT /api/sessions/{id}/close
#[utoipa::path(
    put,
    path = "/api/sessions/{id}/close",
    tag = "Sessions",
    params(("id" = Uuid, Path, description = "ID da sessão")),
    responses(
        (status = 200, description = "Sessão fechada", body = ApiResponse<Session>),
        (status = 409, description = "Sessão já fechada")
    ),
    security(("api_jwt" = []))
)]
pub async fn close_session(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermSessionsWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .client_service
        .close_session(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(session))))
}

/// Conclusões só entram em sessões ativas. O autor é o administrador logado.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/conclusions",
    tag = "Sessions",
    request_body = AddConclusionPayload,
    params(("id" = Uuid, Path, description = "ID da sessão")),
    responses(
        (status = 201, description = "Conclusão registrada", body = ApiResponse<Conclusion>),
        (status = 400, description = "Texto vazio ou lembrete inválido"),
        (status = 409, description = "Sessão não está ativa")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_conclusion(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermSessionsWrite>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<AddConclusionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let conclusion = app_state
        .client_service
        .add_conclusion(id, &payload.text, payload.reminder_date.as_deref(), Some(user.id))
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(conclusion))))
}
