// src/db/rbac_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::rbac::{
    Permission, PermissionAssignmentRow, PermissionModule, Role, RolePermission,
};

#[async_trait]
pub trait RbacRepository: Send + Sync {
    // --- Catálogo ---
    async fn list_modules(&self) -> Result<Vec<PermissionModule>, AppError>;
    async fn create_module(&self, name: &str, description: Option<&str>) -> Result<PermissionModule, AppError>;
    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError>;
    async fn create_permission(
        &self,
        module_id: Uuid,
        slug: &str,
        description: &str,
    ) -> Result<Permission, AppError>;

    // --- Cargos ---
    async fn list_roles(&self) -> Result<Vec<Role>, AppError>;
    async fn find_role(&self, id: Uuid) -> Result<Option<Role>, AppError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError>;
    async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, AppError>;
    async fn delete_role(&self, id: Uuid) -> Result<bool, AppError>;

    // --- Vínculos cargo <-> permissão ---
    /// Todas as permissões, com o vínculo do cargo quando existir.
    async fn permission_rows_for_role(&self, role_id: Uuid) -> Result<Vec<PermissionAssignmentRow>, AppError>;
    /// Inverte o status numa única instrução; `None` se o vínculo não existe.
    async fn toggle(&self, role_permission_id: Uuid) -> Result<Option<RolePermission>, AppError>;
    /// Materializa (desativado) cada vínculo ausente. Devolve quantos foram criados.
    async fn insert_missing(&self, role_id: Uuid) -> Result<u64, AppError>;
    async fn count_for_role(&self, role_id: Uuid) -> Result<u64, AppError>;
    /// Cria ou reativa o vínculo com status = true.
    async fn upsert_enabled(&self, role_id: Uuid, permission_id: Uuid) -> Result<RolePermission, AppError>;
    /// Desativa o vínculo; `None` se ele não existe.
    async fn disable(&self, role_id: Uuid, permission_id: Uuid) -> Result<Option<RolePermission>, AppError>;
    async fn role_has_permission(&self, role_id: Uuid, slug: &str) -> Result<bool, AppError>;
}

const ROLE_PERMISSION_COLUMNS: &str = "id, role_id, permission_id, status, created_at, updated_at";

fn unique_as(message: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::UniqueConstraintViolation(message.into());
            }
        }
        e.into()
    }
}

#[derive(Clone)]
pub struct PgRbacRepository {
    pool: PgPool,
}

impl PgRbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RbacRepository for PgRbacRepository {
    async fn list_modules(&self) -> Result<Vec<PermissionModule>, AppError> {
        let modules = sqlx::query_as::<_, PermissionModule>(
            "SELECT id, name, description, created_at FROM permission_modules ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(modules)
    }

    async fn create_module(&self, name: &str, description: Option<&str>) -> Result<PermissionModule, AppError> {
        sqlx::query_as::<_, PermissionModule>(
            r#"
            INSERT INTO permission_modules (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as("Já existe um módulo com esse nome."))
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT id, module_id, slug, description FROM permissions ORDER BY slug",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    async fn create_permission(
        &self,
        module_id: Uuid,
        slug: &str,
        description: &str,
    ) -> Result<Permission, AppError> {
        sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (module_id, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, module_id, slug, description
            "#,
        )
        .bind(module_id)
        .bind(slug)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return AppError::NotFound("module");
                }
            }
            unique_as("Já existe uma permissão com esse slug.")(e)
        })
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_system, created_at FROM roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn find_role(&self, id: Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_system, created_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_system, created_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, AppError> {
        sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, is_system, created_at
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as("Já existe um cargo com esse nome."))
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1 AND NOT is_system")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                // users.role_id ainda aponta para o cargo
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::UniqueConstraintViolation(
                            "Cargo em uso por usuários.".into(),
                        );
                    }
                }
                AppError::from(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn permission_rows_for_role(&self, role_id: Uuid) -> Result<Vec<PermissionAssignmentRow>, AppError> {
        let rows = sqlx::query_as::<_, PermissionAssignmentRow>(
            r#"
            SELECT m.id AS module_id,
                   m.name AS module_name,
                   m.description AS module_description,
                   p.id AS permission_id,
                   p.slug,
                   p.description,
                   rp.id AS role_permission_uuid,
                   rp.status
            FROM permission_modules m
            JOIN permissions p ON p.module_id = m.id
            LEFT JOIN role_permissions rp
                   ON rp.permission_id = p.id AND rp.role_id = $1
            ORDER BY m.name, p.slug
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn toggle(&self, role_permission_id: Uuid) -> Result<Option<RolePermission>, AppError> {
        let sql = format!(
            r#"
            UPDATE role_permissions
            SET status = NOT status, updated_at = NOW()
            WHERE id = $1
            RETURNING {ROLE_PERMISSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RolePermission>(&sql)
            .bind(role_permission_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_missing(&self, role_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, status)
            SELECT $1, p.id, FALSE
            FROM permissions p
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_for_role(&self, role_id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn upsert_enabled(&self, role_id: Uuid, permission_id: Uuid) -> Result<RolePermission, AppError> {
        let sql = format!(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, status)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (role_id, permission_id)
            DO UPDATE SET status = TRUE, updated_at = NOW()
            RETURNING {ROLE_PERMISSION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, RolePermission>(&sql)
            .bind(role_id)
            .bind(permission_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::NotFound("permission");
                    }
                }
                AppError::from(e)
            })
    }

    async fn disable(&self, role_id: Uuid, permission_id: Uuid) -> Result<Option<RolePermission>, AppError> {
        let sql = format!(
            r#"
            UPDATE role_permissions
            SET status = FALSE, updated_at = NOW()
            WHERE role_id = $1 AND permission_id = $2
            RETURNING {ROLE_PERMISSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RolePermission>(&sql)
            .bind(role_id)
            .bind(permission_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn role_has_permission(&self, role_id: Uuid, slug: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM role_permissions rp
                JOIN permissions p ON rp.permission_id = p.id
                WHERE rp.role_id = $1
                  AND rp.status = TRUE
                  AND p.slug = $2
            )
            "#,
        )
        .bind(role_id)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
