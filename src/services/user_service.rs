// src/services/user_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{Page, Pagination},
    },
    db::{RbacRepository, UserRepository},
    models::auth::{CreateUserPayload, NewUser, UpdateUserPayload, User, UserFilters, SUPERADMIN_ROLE},
    services::auth::AuthService,
};

#[derive(Clone)]
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    rbac_repo: Arc<dyn RbacRepository>,
    auth_service: AuthService,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        rbac_repo: Arc<dyn RbacRepository>,
        auth_service: AuthService,
    ) -> Self {
        Self {
            user_repo,
            rbac_repo,
            auth_service,
        }
    }

    pub async fn list(&self, filters: &UserFilters) -> Result<Page<User>, AppError> {
        let pagination = Pagination::new(filters.page, filters.rows_per_page);
        self.user_repo.list(filters, pagination).await
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AppError> {
        self.user_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    pub async fn create(&self, payload: CreateUserPayload) -> Result<User, AppError> {
        self.ensure_grantable(payload.role_id).await?;

        let password_hash = self.auth_service.hash_password(&payload.password).await?;
        let user = self
            .user_repo
            .create(NewUser {
                first_name: payload.first_name.trim().to_string(),
                last_name: payload.last_name.trim().to_string(),
                email: payload.email.trim().to_lowercase(),
                password_hash,
                role_id: payload.role_id,
                service: payload.service,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "Usuário criado");
        Ok(user)
    }

    pub async fn update_profile(&self, id: Uuid, payload: &UpdateUserPayload) -> Result<User, AppError> {
        self.user_repo
            .update_profile(id, payload)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    pub async fn change_role(&self, id: Uuid, role_id: Uuid) -> Result<User, AppError> {
        let target = self.get(id).await?;
        if target.is_superadmin() {
            return Err(AppError::SuperAdminProtected);
        }
        self.ensure_grantable(role_id).await?;

        self.user_repo
            .set_role(id, role_id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    pub async fn set_suspended(&self, id: Uuid, is_suspended: bool) -> Result<User, AppError> {
        let target = self.get(id).await?;
        if target.is_superadmin() {
            return Err(AppError::SuperAdminProtected);
        }

        let user = self
            .user_repo
            .set_suspended(id, is_suspended)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        tracing::info!(user_id = %id, is_suspended, "Suspensão alterada");
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let target = self.get(id).await?;
        if target.is_superadmin() {
            return Err(AppError::SuperAdminProtected);
        }
        if !self.user_repo.delete(id).await? {
            // Existe mas não saiu: responde por um cliente com sessão ativa
            self.get(id).await?;
            tracing::warn!(user_id = %id, "Remoção recusada: cliente com sessão ativa");
            return Err(AppError::AssignmentRequired);
        }
        tracing::info!(user_id = %id, "Usuário removido");
        Ok(())
    }

    // O cargo tem que existir e não pode ser o SUPERADMIN
    async fn ensure_grantable(&self, role_id: Uuid) -> Result<(), AppError> {
        let role = self
            .rbac_repo
            .find_role(role_id)
            .await?
            .ok_or(AppError::NotFound("role"))?;
        if role.name == SUPERADMIN_ROLE {
            tracing::warn!(%role_id, "Tentativa de conceder o cargo SUPERADMIN");
            return Err(AppError::SuperAdminProtected);
        }
        Ok(())
    }
}
