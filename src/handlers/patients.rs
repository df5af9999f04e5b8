// src/handlers/patients.rs

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
        rbac::{PermPatientsRead, PermPatientsWrite, RequirePermission},
    },
    models::patient::{Patient, PatientFilters, PatientPayload, UpdateQueueStatusPayload},
};

// GET /api/patients
#[utoipa::path(
    get,
    path = "/api/patients",
    tag = "Patients",
    params(PatientFilters),
    responses((status = 200, description = "Pacientes paginados", body = ApiResponse<Page<Patient>>)),
    security(("api_jwt" = []))
)]
pub async fn list_patients(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsRead>,
    QueryParams(filters): QueryParams<PatientFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .patient_service
        .list(&filters)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(page))))
}

// POST /api/patients
#[utoipa::path(
    post,
    path = "/api/patients",
    tag = "Patients",
    request_body = PatientPayload,
    responses((status = 201, description = "Paciente criado", body = ApiResponse<Patient>)),
    security(("api_jwt" = []))
)]
pub async fn create_patient(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsWrite>,
    JsonBody(payload): JsonBody<PatientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let patient = app_state
        .patient_service
        .create(&payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(patient))))
}

// GET /api/patients/{id}
#[utoipa::path(
    get,
    path = "/api/patients/{id}",
    tag = "Patients",
    params(("id" = Uuid, Path, description = "ID do paciente")),
    responses((status = 200, description = "Paciente", body = ApiResponse<Patient>)),
    security(("api_jwt" = []))
)]
pub async fn get_patient(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let patient = app_state
        .patient_service
        .get(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(patient))))
}

// PUT /api/patients/{id}
#[utoipa::path(
    put,
    path = "/api/patients/{id}",
    tag = "Patients",
    request_body = PatientPayload,
    params(("id" = Uuid, Path, description = "ID do paciente")),
    responses((status = 200, description = "Paciente atualizado", body = ApiResponse<Patient>)),
    security(("api_jwt" = []))
)]
pub async fn update_patient(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<PatientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let patient = app_state
        .patient_service
        .update(id, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(patient))))
}

// DELETE /api/patients/{id}
#[utoipa::path(
    delete,
    path = "/api/patients/{id}",
    tag = "Patients",
    params(("id" = Uuid, Path, description = "ID do paciente")),
    responses((status = 200, description = "Paciente removido", body = ApiResponse<Deleted>)),
    security(("api_jwt" = []))
)]
pub async fn delete_patient(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .patient_service
        .delete(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(Deleted { id }))))
}

/// Fila do dia, por ordem de chegada (a recepção consulta a cada 30 s).
#[utoipa::path(
    get,
    path = "/api/patients/queue",
    tag = "Patients",
    responses((status = 200, description = "Fila atual", body = ApiResponse<Vec<Patient>>)),
    security(("api_jwt" = []))
)]
pub async fn get_queue(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsRead>,
) -> Result<impl IntoResponse, ApiError> {
    let queue = app_state
        .patient_service
        .queue()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(queue))))
}

// POST /api/patients/{id}/check-in
#[utoipa::path(
    post,
    path = "/api/patients/{id}/check-in",
    tag = "Patients",
    params(("id" = Uuid, Path, description = "ID do paciente")),
    responses((status = 200, description = "Paciente na fila", body = ApiResponse<Patient>)),
    security(("api_jwt" = []))
)]
pub async fn check_in(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsWrite>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let patient = app_state
        .patient_service
        .check_in(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(patient))))
}

// PUT /api/patients/{id}/queue-status
#[utoipa::path(
    put,
    path = "/api/patients/{id}/queue-status",
    tag = "Patients",
    request_body = UpdateQueueStatusPayload,
    params(("id" = Uuid, Path, description = "ID do paciente")),
    responses(
        (status = 200, description = "Status da fila alterado", body = ApiResponse<Patient>),
        (status = 400, description = "Transição inválida"),
        (status = 409, description = "Alterado por outro usuário")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_queue_status(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermPatientsWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateQueueStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let patient = app_state
        .patient_service
        .transition(id, payload.queue_status)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(patient))))
}
