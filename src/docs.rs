// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::common::response::Deleted;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Users ---
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::change_role,
        handlers::users::set_suspension,
        handlers::users::delete_user,

        // --- RBAC ---
        handlers::rbac::list_roles,
        handlers::rbac::create_role,
        handlers::rbac::delete_role,
        handlers::rbac::get_role_permissions,
        handlers::rbac::get_permission_partition,
        handlers::rbac::generate_role_permissions,
        handlers::rbac::assign_permission,
        handlers::rbac::remove_permission,
        handlers::rbac::toggle_role_permission,
        handlers::rbac::list_modules,
        handlers::rbac::create_module,
        handlers::rbac::list_permissions,
        handlers::rbac::create_permission,

        // --- Clients ---
        handlers::clients::list_clients,
        handlers::clients::create_client,
        handlers::clients::get_client,
        handlers::clients::get_client_details,
        handlers::clients::update_client,
        handlers::clients::update_client_status,
        handlers::clients::assign_client,
        handlers::clients::delete_client,

        // --- Sessions ---
        handlers::clients::list_client_sessions,
        handlers::clients::get_active_session,
        handlers::clients::open_session,
        handlers::sessions::close_session,
        handlers::sessions::add_conclusion,

        // --- Factures ---
        handlers::factures::list_factures,
        handlers::factures::create_facture,
        handlers::factures::get_facture,
        handlers::factures::list_payments,
        handlers::factures::record_payment,
        handlers::factures::download_pdf,

        // --- Documents ---
        handlers::documents::list_documents,
        handlers::documents::upload_documents,
        handlers::documents::delete_document,
        handlers::documents::document_link,
        handlers::documents::download,

        // --- Patients ---
        handlers::patients::list_patients,
        handlers::patients::create_patient,
        handlers::patients::get_patient,
        handlers::patients::update_patient,
        handlers::patients::delete_patient,
        handlers::patients::get_queue,
        handlers::patients::check_in,
        handlers::patients::update_queue_status,

        // --- Backups ---
        handlers::backups::list_backups,
        handlers::backups::create_backup,
        handlers::backups::delete_backup,
        handlers::backups::backup_link,
        handlers::backups::get_policy,
        handlers::backups::update_policy,

        // --- Settings ---
        handlers::settings::get_settings,
        handlers::settings::update_settings,
    ),
    components(
        schemas(
            Deleted,

            // --- Auth ---
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::CreateUserPayload,
            models::auth::UpdateUserPayload,
            models::auth::ChangeRolePayload,
            models::auth::SuspendUserPayload,

            // --- RBAC ---
            models::rbac::PermissionModule,
            models::rbac::Permission,
            models::rbac::Role,
            models::rbac::RolePermission,
            models::rbac::RoleScopedPermission,
            models::rbac::ModulePermissions,
            models::rbac::RolePermissionsView,
            models::rbac::PermissionPartition,
            models::rbac::GenerateResult,
            models::rbac::CreateRolePayload,
            models::rbac::CreateModulePayload,
            models::rbac::CreatePermissionPayload,
            models::rbac::AssignPermissionPayload,

            // --- Clients / sessions ---
            models::client::ClientStatus,
            models::client::SessionStatus,
            models::client::Client,
            models::client::Session,
            models::client::Conclusion,
            models::client::ClientSummary,
            models::client::ClientDetails,
            models::client::CreateClientPayload,
            models::client::UpdateClientPayload,
            models::client::UpdateClientStatusPayload,
            models::client::AssignClientPayload,
            models::client::OpenSessionPayload,
            models::client::AddConclusionPayload,

            // --- Finance ---
            models::finance::FactureStatus,
            models::finance::Facture,
            models::finance::Payment,
            models::finance::PaymentReceipt,
            models::finance::CreateFacturePayload,
            models::finance::RecordPaymentPayload,

            // --- Documents ---
            models::document::Document,
            models::document::DownloadLink,
            models::document::UploadDocumentsForm,

            // --- Patients ---
            models::patient::QueueStatus,
            models::patient::Patient,
            models::patient::PatientPayload,
            models::patient::UpdateQueueStatusPayload,

            // --- Backups ---
            models::backup::BackupType,
            models::backup::BackupFrequency,
            models::backup::Backup,
            models::backup::AutoBackupPolicy,
            models::backup::CreateBackupPayload,
            models::backup::UpdateBackupPolicyPayload,

            // --- Settings ---
            models::settings::AppSettings,
            models::settings::UpdateSettingsRequest,
        )
    ),
    tags(
        (name = "Auth", description = "Login e administrador atual"),
        (name = "Users", description = "Administradores do backoffice"),
        (name = "RBAC", description = "Cargos, módulos e permissões"),
        (name = "Clients", description = "Clientes e ficha do cliente"),
        (name = "Sessions", description = "Sessões de atendimento e conclusões"),
        (name = "Factures", description = "Faturas, pagamentos e PDF"),
        (name = "Documents", description = "Documentos e links de download"),
        (name = "Patients", description = "Pacientes e fila de atendimento"),
        (name = "Backups", description = "Backups manuais e automáticos"),
        (name = "Settings", description = "Dados da empresa")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
