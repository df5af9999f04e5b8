// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião). Exige um vínculo *ativo* do cargo com o slug;
/// SUPERADMIN passa direto.
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_header(
            parts
                .headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok()),
        );
        let reject = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

        // A. Extrai Usuário (colocado pelo auth_guard)
        let AuthenticatedUser(user) = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| reject(AppError::InvalidToken))?;

        // B. Verifica no Banco
        let required = T::slug();
        let allowed = app_state
            .rbac_service
            .user_can(&user, required)
            .await
            .map_err(&reject)?;

        if !allowed {
            tracing::warn!(user_id = %user.id, permission = required, "Acesso negado");
            return Err(reject(AppError::PermissionDenied(required.to_string())));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

macro_rules! permissions {
    ($($name:ident => $slug:literal),* $(,)?) => {
        $(
            pub struct $name;
            impl PermissionDef for $name {
                fn slug() -> &'static str { $slug }
            }
        )*
    };
}

permissions! {
    PermClientsRead => "clients:read",
    PermClientsWrite => "clients:write",
    PermSessionsRead => "sessions:read",
    PermSessionsWrite => "sessions:write",
    PermFacturesRead => "factures:read",
    PermFacturesWrite => "factures:write",
    PermDocumentsRead => "documents:read",
    PermDocumentsWrite => "documents:write",
    PermPatientsRead => "patients:read",
    PermPatientsWrite => "patients:write",
    PermUsersRead => "users:read",
    PermUsersWrite => "users:write",
    PermRolesRead => "roles:read",
    PermRolesWrite => "roles:write",
    PermBackupsRead => "backups:read",
    PermBackupsWrite => "backups:write",
    PermSettingsRead => "settings:read",
    PermSettingsWrite => "settings:write",
}
