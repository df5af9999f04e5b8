// src/models/rbac.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// O que sai do banco (Tabela permission_modules)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionModule {
    pub id: Uuid,
    #[schema(example = "clients")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// O que sai do banco (Tabela permissions)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: Uuid,
    pub module_id: Uuid,
    #[schema(example = "clients:write")]
    pub slug: String,
    #[schema(example = "Créer et modifier des clients")]
    pub description: String,
}

// O que sai do banco (Tabela roles)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    #[schema(example = "COMMERCIAL")]
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

// Vínculo Cargo <-> Permissão. Só existe depois de "generate" ou "assign".
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePermission {
    pub id: Uuid,
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Linha plana (permissão + vínculo opcional) que o repositório devolve
#[derive(Debug, Clone, FromRow)]
pub struct PermissionAssignmentRow {
    pub module_id: Uuid,
    pub module_name: String,
    pub module_description: Option<String>,
    pub permission_id: Uuid,
    pub slug: String,
    pub description: String,
    pub role_permission_uuid: Option<Uuid>,
    pub status: Option<bool>,
}

// --- Visão da tela de cargos ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleScopedPermission {
    pub id: Uuid,
    pub module_id: Uuid,
    pub slug: String,
    pub description: String,
    /// `null` = disponível mas ainda não materializada para o cargo
    #[serde(rename = "role_permission_uuid")]
    pub role_permission_uuid: Option<Uuid>,
    pub status: bool,
}

impl RoleScopedPermission {
    /// "Atribuída" depende só da existência da linha, não do status.
    pub fn is_assigned(&self) -> bool {
        self.role_permission_uuid.is_some()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModulePermissions {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<RoleScopedPermission>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionsView {
    pub role: Role,
    pub modules: Vec<ModulePermissions>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPartition {
    pub assigned: Vec<RoleScopedPermission>,
    pub available: Vec<RoleScopedPermission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    /// Linhas novas criadas nesta chamada
    pub created: u64,
    /// Linhas do cargo após a chamada
    pub total: u64,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRolePayload {
    #[validate(length(min = 2, message = "required"))]
    #[schema(example = "COMMERCIAL")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateModulePayload {
    #[validate(length(min = 2, message = "required"))]
    #[schema(example = "rapports")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionPayload {
    pub module_id: Uuid,
    #[validate(length(min = 3, message = "required"))]
    #[schema(example = "rapports:read")]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignPermissionPayload {
    pub permission_id: Uuid,
}
