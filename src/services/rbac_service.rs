// src/services/rbac_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::RbacRepository,
    models::{
        auth::User,
        rbac::{
            CreateModulePayload, CreatePermissionPayload, CreateRolePayload, GenerateResult,
            ModulePermissions, Permission, PermissionAssignmentRow, PermissionModule,
            PermissionPartition, Role, RolePermission, RolePermissionsView, RoleScopedPermission,
        },
    },
};

#[derive(Clone)]
pub struct RbacService {
    repo: Arc<dyn RbacRepository>,
}

impl RbacService {
    pub fn new(repo: Arc<dyn RbacRepository>) -> Self {
        Self { repo }
    }

    // =========================================================================
    //  CATÁLOGO
    // =========================================================================

    pub async fn list_modules(&self) -> Result<Vec<PermissionModule>, AppError> {
        self.repo.list_modules().await
    }

    pub async fn create_module(&self, payload: CreateModulePayload) -> Result<PermissionModule, AppError> {
        self.repo
            .create_module(payload.name.trim(), payload.description.as_deref())
            .await
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        self.repo.list_permissions().await
    }

    pub async fn create_permission(&self, payload: CreatePermissionPayload) -> Result<Permission, AppError> {
        let slug = payload.slug.trim();
        // Formato "modulo:acao"
        if !slug.contains(':') || slug.starts_with(':') || slug.ends_with(':') {
            return Err(AppError::field("slug", "invalid_slug"));
        }
        self.repo
            .create_permission(payload.module_id, slug, payload.description.trim())
            .await
    }

    // =========================================================================
    //  CARGOS
    // =========================================================================

    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        self.repo.list_roles().await
    }

    pub async fn create_role(&self, payload: CreateRolePayload) -> Result<Role, AppError> {
        let name = payload.name.trim().to_uppercase();
        let role = self
            .repo
            .create_role(&name, payload.description.as_deref())
            .await?;
        tracing::info!(role = %role.name, "Cargo criado");
        Ok(role)
    }

    pub async fn delete_role(&self, role_id: Uuid) -> Result<(), AppError> {
        let role = self.find_role(role_id).await?;
        if role.is_system {
            return Err(AppError::SystemRoleProtected);
        }
        if !self.repo.delete_role(role_id).await? {
            return Err(AppError::NotFound("role"));
        }
        tracing::info!(role = %role.name, "Cargo removido");
        Ok(())
    }

    async fn find_role(&self, role_id: Uuid) -> Result<Role, AppError> {
        self.repo
            .find_role(role_id)
            .await?
            .ok_or(AppError::NotFound("role"))
    }

    // =========================================================================
    //  VÍNCULOS CARGO <-> PERMISSÃO
    // =========================================================================

    /// Todas as permissões agrupadas por módulo, anotadas com o vínculo do cargo.
    pub async fn permissions_for_role(&self, role_id: Uuid) -> Result<RolePermissionsView, AppError> {
        let role = self.find_role(role_id).await?;
        let rows = self.repo.permission_rows_for_role(role_id).await?;
        Ok(RolePermissionsView {
            role,
            modules: group_by_module(rows),
        })
    }

    pub async fn partition_for_role(&self, role_id: Uuid) -> Result<PermissionPartition, AppError> {
        let view = self.permissions_for_role(role_id).await?;
        Ok(partition_permissions(&view.modules))
    }

    pub async fn toggle(&self, role_permission_id: Uuid) -> Result<RolePermission, AppError> {
        self.repo
            .toggle(role_permission_id)
            .await?
            .ok_or(AppError::NotFound("role_permission"))
    }

    /// Materializa (desativados) os vínculos que faltam. Idempotente.
    pub async fn generate_all(&self, role_id: Uuid) -> Result<GenerateResult, AppError> {
        self.find_role(role_id).await?;
        let created = self.repo.insert_missing(role_id).await?;
        let total = self.repo.count_for_role(role_id).await?;
        tracing::info!(%role_id, created, total, "Permissões geradas para o cargo");
        Ok(GenerateResult { created, total })
    }

    /// Garante o vínculo ativo numa única operação (cria ou reativa).
    pub async fn assign(&self, role_id: Uuid, permission_id: Uuid) -> Result<RolePermission, AppError> {
        self.find_role(role_id).await?;
        self.repo.upsert_enabled(role_id, permission_id).await
    }

    /// "Remover" desativa; o vínculo continua existindo.
    pub async fn remove(&self, role_id: Uuid, permission_id: Uuid) -> Result<RolePermission, AppError> {
        self.repo
            .disable(role_id, permission_id)
            .await?
            .ok_or(AppError::NotFound("role_permission"))
    }

    /// Checagem usada pelo guardião de rotas. SUPERADMIN tem tudo.
    pub async fn user_can(&self, user: &User, slug: &str) -> Result<bool, AppError> {
        if user.is_superadmin() {
            return Ok(true);
        }
        self.repo.role_has_permission(user.role_id, slug).await
    }
}

/// Agrupa as linhas planas por módulo, preservando a ordem de chegada.
pub fn group_by_module(rows: Vec<PermissionAssignmentRow>) -> Vec<ModulePermissions> {
    let mut modules: Vec<ModulePermissions> = Vec::new();
    for row in rows {
        let permission = RoleScopedPermission {
            id: row.permission_id,
            module_id: row.module_id,
            slug: row.slug,
            description: row.description,
            role_permission_uuid: row.role_permission_uuid,
            status: row.status.unwrap_or(false),
        };
        match modules.iter_mut().find(|m| m.id == row.module_id) {
            Some(module) => module.permissions.push(permission),
            None => modules.push(ModulePermissions {
                id: row.module_id,
                name: row.module_name,
                description: row.module_description,
                permissions: vec![permission],
            }),
        }
    }
    modules
}

/// Atribuída = o vínculo existe (mesmo desativado); disponível = ainda não existe.
pub fn partition_permissions(modules: &[ModulePermissions]) -> PermissionPartition {
    let (assigned, available) = modules
        .iter()
        .flat_map(|m| m.permissions.iter().cloned())
        .partition(RoleScopedPermission::is_assigned);
    PermissionPartition { assigned, available }
}
