// src/handlers/factures.rs

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::{
        error::ApiError,
        response::{ApiResponse, Page},
    },
    config::AppState,
    middleware::{
        extract::{JsonBody, PathParams, QueryParams},
        i18n::Locale,
        rbac::{PermFacturesRead, PermFacturesWrite, RequirePermission},
    },
    models::finance::{
        CreateFacturePayload, Facture, FactureFilters, Payment, PaymentReceipt, RecordPaymentPayload,
    },
};

// GET /api/factures
#[utoipa::path(
    get,
    path = "/api/factures",
    tag = "Factures",
    params(FactureFilters),
    responses(
        (status = 200, description = "Faturas paginadas, status derivado", body = ApiResponse<Page<Facture>>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_factures(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFacturesRead>,
    QueryParams(filters): QueryParams<FactureFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .finance_service
        .list(&filters)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(page))))
}

// POST /api/factures
#[utoipa::path(
    post,
    path = "/api/factures",
    tag = "Factures",
    request_body = CreateFacturePayload,
    responses(
        (status = 201, description = "Fatura emitida", body = ApiResponse<Facture>),
        (status = 400, description = "Montante, datas ou sessão inválidos"),
        (status = 404, description = "Cliente ou sessão inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_facture(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFacturesWrite>,
    JsonBody(payload): JsonBody<CreateFacturePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let facture = app_state
        .finance_service
        .create(&payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(facture))))
}

// GET /api/factures/{id}
#[utoipa::path(
    get,
    path = "/api/factures/{id}",
    tag = "Factures",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 200, description = "Fatura", body = ApiResponse<Facture>),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_facture(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFacturesRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let facture = app_state
        .finance_service
        .get(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(facture))))
}

// GET /api/factures/{id}/payments
#[utoipa::path(
    get,
    path = "/api/factures/{id}/payments",
    tag = "Factures",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses((status = 200, description = "Pagamentos", body = ApiResponse<Vec<Payment>>)),
    security(("api_jwt" = []))
)]
pub async fn list_payments(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFacturesRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = app_state
        .finance_service
        .list_payments(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(payments))))
}

/// O saldo é checado na própria escrita; pagamentos concorrentes não estouram o total.
#[utoipa::path(
    post,
    path = "/api/factures/{id}/payments",
    tag = "Factures",
    request_body = RecordPaymentPayload,
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 201, description = "Pagamento registrado", body = ApiResponse<PaymentReceipt>),
        (status = 422, description = "Pagamento acima do saldo")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFacturesWrite>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<RecordPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = app_state
        .finance_service
        .record_payment(id, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(receipt))))
}

// GET /api/factures/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/factures/{id}/pdf",
    tag = "Factures",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 200, description = "PDF da fatura", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn download_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFacturesRead>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (file_name, bytes) = app_state
        .finance_service
        .render_pdf(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ),
    ];
    Ok((StatusCode::OK, headers, bytes))
}
