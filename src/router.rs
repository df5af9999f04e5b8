// src/router.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn build(app_state: AppState) -> Router {
    // Rotas públicas
    let public_routes = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/downloads/{token}", get(handlers::documents::download));

    let user_routes = Router::new()
        .route("/", get(handlers::users::list_users).post(handlers::users::create_user))
        .route(
            "/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/{id}/role", put(handlers::users::change_role))
        .route("/{id}/suspension", put(handlers::users::set_suspension));

    let client_routes = Router::new()
        .route("/", get(handlers::clients::list_clients).post(handlers::clients::create_client))
        .route(
            "/{id}",
            get(handlers::clients::get_client)
                .put(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        )
        .route("/{id}/details", get(handlers::clients::get_client_details))
        .route("/{id}/status", put(handlers::clients::update_client_status))
        .route("/{id}/assign", put(handlers::clients::assign_client))
        .route(
            "/{id}/sessions",
            get(handlers::clients::list_client_sessions).post(handlers::clients::open_session),
        )
        .route("/{id}/sessions/active", get(handlers::clients::get_active_session));

    let session_routes = Router::new()
        .route("/{id}/close", put(handlers::sessions::close_session))
        .route("/{id}/conclusions", post(handlers::sessions::add_conclusion));

    let rbac_routes = Router::new()
        .route("/api/roles", get(handlers::rbac::list_roles).post(handlers::rbac::create_role))
        .route("/api/roles/{id}", delete(handlers::rbac::delete_role))
        .route(
            "/api/roles/{id}/permissions",
            get(handlers::rbac::get_role_permissions).post(handlers::rbac::assign_permission),
        )
        .route("/api/roles/{id}/permissions/partition", get(handlers::rbac::get_permission_partition))
        .route("/api/roles/{id}/permissions/generate", post(handlers::rbac::generate_role_permissions))
        .route(
            "/api/roles/{id}/permissions/{permission_id}",
            delete(handlers::rbac::remove_permission),
        )
        .route("/api/role-permissions/{id}/toggle", put(handlers::rbac::toggle_role_permission))
        .route(
            "/api/permission-modules",
            get(handlers::rbac::list_modules).post(handlers::rbac::create_module),
        )
        .route(
            "/api/permissions",
            get(handlers::rbac::list_permissions).post(handlers::rbac::create_permission),
        );

    let facture_routes = Router::new()
        .route("/", get(handlers::factures::list_factures).post(handlers::factures::create_facture))
        .route("/{id}", get(handlers::factures::get_facture))
        .route(
            "/{id}/payments",
            get(handlers::factures::list_payments).post(handlers::factures::record_payment),
        )
        .route("/{id}/pdf", get(handlers::factures::download_pdf));

    let document_routes = Router::new()
        .route(
            "/",
            get(handlers::documents::list_documents)
                .post(handlers::documents::upload_documents)
                .layer(DefaultBodyLimit::max(app_state.max_upload_bytes)),
        )
        .route("/{id}", delete(handlers::documents::delete_document))
        .route("/{id}/link", get(handlers::documents::document_link));

    let patient_routes = Router::new()
        .route("/", get(handlers::patients::list_patients).post(handlers::patients::create_patient))
        .route("/queue", get(handlers::patients::get_queue))
        .route(
            "/{id}",
            get(handlers::patients::get_patient)
                .put(handlers::patients::update_patient)
                .delete(handlers::patients::delete_patient),
        )
        .route("/{id}/check-in", post(handlers::patients::check_in))
        .route("/{id}/queue-status", put(handlers::patients::update_queue_status));

    let backup_routes = Router::new()
        .route("/", get(handlers::backups::list_backups).post(handlers::backups::create_backup))
        .route(
            "/policy",
            get(handlers::backups::get_policy).put(handlers::backups::update_policy),
        )
        .route("/{id}", delete(handlers::backups::delete_backup))
        .route("/{id}/link", get(handlers::backups::backup_link));

    let settings_routes = Router::new().route(
        "/",
        get(handlers::settings::get_settings).put(handlers::settings::update_settings),
    );

    // Tudo abaixo exige Bearer válido; as permissões ficam nos extratores dos handlers
    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::get_me))
        .nest("/api/users", user_routes)
        .nest("/api/clients", client_routes)
        .nest("/api/sessions", session_routes)
        .merge(rbac_routes)
        .nest("/api/factures", facture_routes)
        .nest("/api/documents", document_routes)
        .nest("/api/patients", patient_routes)
        .nest("/api/backups", backup_routes)
        .nest("/api/settings", settings_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        models::{auth::SUPERADMIN_ROLE, client::SessionStatus},
        testing::{self, InMemoryDb, InMemoryStorage},
    };

    fn app(db: &Arc<InMemoryDb>) -> (Router, AppState) {
        app_with(db, &testing::config())
    }

    fn app_with(db: &Arc<InMemoryDb>, config: &Config) -> (Router, AppState) {
        let state = AppState::new(config, db.repositories(), Arc::new(InMemoryStorage::default()));
        (build(state.clone()), state)
    }

    const BOUNDARY: &str = "----backoffice-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_request(token: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/pdf\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/documents")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let db = InMemoryDb::seeded();
        let (router, _) = app(&db);

        let response = router
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_gets_unauthorized_envelope() {
        let db = InMemoryDb::seeded();
        let (router, _) = app(&db);

        let response = router
            .oneshot(Request::builder().uri("/api/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorKind"], "Unauthorized");
    }

    #[tokio::test]
    async fn role_without_permission_is_forbidden() {
        let db = InMemoryDb::seeded();
        let (router, state) = app(&db);
        let commercial = db.add_user("amine@atlas.ma", "COMMERCIAL").await;
        let token = state.auth_service.create_token(commercial.id).unwrap();

        let response = router
            .oneshot(authed("GET", "/api/clients", &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["errorKind"], "Forbidden");
    }

    #[tokio::test]
    async fn open_session_without_assignment_is_refused_before_any_write() {
        let db = InMemoryDb::seeded();
        let (router, state) = app(&db);
        let admin = db.add_user("admin@atlas.ma", SUPERADMIN_ROLE).await;
        let token = state.auth_service.create_token(admin.id).unwrap();
        let client = db.add_client("Yassine Tazi", None).await;
        let writes_before = db.writes();

        let response = router
            .oneshot(authed(
                "POST",
                &format!("/api/clients/{}/sessions", client.id),
                &token,
                Some(serde_json::json!({ "service": "VisaCanada" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["errorKind"], "AssignmentRequired");
        assert_eq!(db.writes(), writes_before);
    }

    #[tokio::test]
    async fn active_session_is_wrapped_in_the_envelope() {
        let db = InMemoryDb::seeded();
        let (router, state) = app(&db);
        let admin = db.add_user("admin@atlas.ma", SUPERADMIN_ROLE).await;
        let token = state.auth_service.create_token(admin.id).unwrap();
        let client = db.add_client("Yassine Tazi", Some(admin.id)).await;

        let response = router
            .clone()
            .oneshot(authed(
                "GET",
                &format!("/api/clients/{}/sessions/active", client.id),
                &token,
                None,
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert!(body["data"].is_null());

        let session = db.add_session(client.id, SessionStatus::Active).await;
        let response = router
            .oneshot(authed(
                "GET",
                &format!("/api/clients/{}/sessions/active", client.id),
                &token,
                None,
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["data"]["id"], session.id.to_string());
    }

    #[tokio::test]
    async fn download_with_garbage_token_is_unauthorized() {
        let db = InMemoryDb::seeded();
        let (router, _) = app(&db);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/downloads/not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_ids_and_bodies_come_back_in_the_envelope() {
        let db = InMemoryDb::seeded();
        let (router, state) = app(&db);
        let admin = db.add_user("admin@atlas.ma", SUPERADMIN_ROLE).await;
        let token = state.auth_service.create_token(admin.id).unwrap();
        let client = db.add_client("Yassine Tazi", Some(admin.id)).await;
        let writes_before = db.writes();

        let response = router
            .clone()
            .oneshot(authed(
                "POST",
                "/api/clients/not-a-uuid/sessions",
                &token,
                Some(serde_json::json!({ "service": "VisaCanada" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorKind"], "ValidationError");
        assert!(body["errors"]["path"].is_array());

        // Sem `service`: 400 de validação, nunca o 422 de AssignmentRequired
        let response = router
            .clone()
            .oneshot(authed(
                "POST",
                &format!("/api/clients/{}/sessions", client.id),
                &token,
                Some(serde_json::json!({})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["errorKind"], "ValidationError");
        assert!(body["errors"]["body"].is_array());

        let response = router
            .oneshot(authed("GET", "/api/clients?page=abc", &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["errorKind"], "ValidationError");
        assert_eq!(db.writes(), writes_before);
    }

    #[tokio::test]
    async fn single_upload_then_signed_download() {
        let db = InMemoryDb::seeded();
        let (router, state) = app(&db);
        let admin = db.add_user("admin@atlas.ma", SUPERADMIN_ROLE).await;
        let token = state.auth_service.create_token(admin.id).unwrap();
        let client = db.add_client("Yassine Tazi", Some(admin.id)).await;
        let client_id = client.id.to_string();

        let response = router
            .clone()
            .oneshot(multipart_request(
                &token,
                &[
                    Part::Text("clientId", &client_id),
                    Part::File("file", "passeport.pdf", b"%PDF-1.4 passeport"),
                    Part::Text("title", "Passeport"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["data"][0]["title"], "Passeport");
        assert_eq!(body["data"][0]["clientId"], client_id);
        let document_id = body["data"][0]["id"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(authed("GET", &format!("/api/documents/{document_id}/link"), &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let url = json_body(response).await["data"]["url"]
            .as_str()
            .unwrap()
            .to_string();
        let path = url.strip_prefix("http://localhost:3000").unwrap();

        // O link basta: sem Authorization
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"passeport.pdf\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4 passeport");
    }

    #[tokio::test]
    async fn batch_upload_uses_plural_fields_and_pairs_titles() {
        let db = InMemoryDb::seeded();
        let (router, state) = app(&db);
        let admin = db.add_user("admin@atlas.ma", SUPERADMIN_ROLE).await;
        let token = state.auth_service.create_token(admin.id).unwrap();
        let client = db.add_client("Yassine Tazi", Some(admin.id)).await;
        let client_id = client.id.to_string();

        let response = router
            .clone()
            .oneshot(multipart_request(
                &token,
                &[
                    Part::Text("clientId", &client_id),
                    Part::File("files", "passeport.pdf", b"%PDF passeport"),
                    Part::File("files", "diplome.pdf", b"%PDF diplome"),
                    Part::Text("titles", "Passeport"),
                    Part::Text("titles", "Diplôme"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][1]["title"], "Diplôme");
        assert_eq!(body["data"][1]["fileName"], "diplome.pdf");

        let response = router
            .oneshot(multipart_request(
                &token,
                &[
                    Part::Text("clientId", &client_id),
                    Part::File("files", "a.pdf", b"%PDF a"),
                    Part::File("files", "b.pdf", b"%PDF b"),
                    Part::Text("titles", "Seul titre"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["errorKind"], "UploadMismatch");
        assert_eq!(db.tables.lock().await.documents.len(), 2);
    }

    #[tokio::test]
    async fn upload_with_a_bad_owner_id_is_a_field_error() {
        let db = InMemoryDb::seeded();
        let (router, state) = app(&db);
        let admin = db.add_user("admin@atlas.ma", SUPERADMIN_ROLE).await;
        let token = state.auth_service.create_token(admin.id).unwrap();

        let response = router
            .oneshot(multipart_request(
                &token,
                &[
                    Part::Text("patientId", "patient-42"),
                    Part::File("file", "ordonnance.pdf", b"%PDF"),
                    Part::Text("title", "Ordonnance"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["errorKind"], "ValidationError");
        assert_eq!(body["errors"]["patientId"][0], "invalid_uuid");
        assert!(db.tables.lock().await.documents.is_empty());
    }

    #[tokio::test]
    async fn upload_over_the_body_limit_is_payload_too_large() {
        let db = InMemoryDb::seeded();
        let config = Config {
            max_upload_bytes: 1024,
            ..testing::config()
        };
        let (router, state) = app_with(&db, &config);
        let admin = db.add_user("admin@atlas.ma", SUPERADMIN_ROLE).await;
        let token = state.auth_service.create_token(admin.id).unwrap();
        let client = db.add_client("Yassine Tazi", Some(admin.id)).await;
        let client_id = client.id.to_string();
        let big = vec![b'x'; 8 * 1024];

        let response = router
            .oneshot(multipart_request(
                &token,
                &[
                    Part::Text("clientId", &client_id),
                    Part::Text("title", "Scan"),
                    Part::File("file", "scan.pdf", &big),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["errorKind"], "PayloadTooLarge");
        assert!(db.tables.lock().await.documents.is_empty());
    }
}
