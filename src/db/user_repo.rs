// src/db/user_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{search_pattern, Page, Pagination},
    },
    models::auth::{NewUser, UpdateUserPayload, User, UserFilters},
};

/// Porta de acesso à tabela `users` (administradores do back-office).
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn count(&self) -> Result<i64, AppError>;
    async fn list(&self, filters: &UserFilters, pagination: Pagination) -> Result<Page<User>, AppError>;
    async fn create(&self, user: NewUser) -> Result<User, AppError>;
    async fn update_profile(&self, id: Uuid, input: &UpdateUserPayload) -> Result<Option<User>, AppError>;
    async fn set_role(&self, id: Uuid, role_id: Uuid) -> Result<Option<User>, AppError>;
    async fn set_suspended(&self, id: Uuid, is_suspended: bool) -> Result<Option<User>, AppError>;
    /// Não remove quem responde por um cliente com sessão ativa.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

// Todas as leituras trazem o nome do cargo junto
const SELECT_USER: &str = r#"
    SELECT u.id, u.first_name, u.last_name, u.email, u.password_hash,
           u.role_id, r.name AS role, u.is_suspended, u.service,
           u.created_at, u.updated_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

const FILTER_USERS: &str = r#"
    WHERE ($1::text IS NULL
           OR (u.first_name || ' ' || u.last_name) ILIKE $1 ESCAPE '\'
           OR u.email ILIKE $1 ESCAPE '\')
      AND ($2::uuid IS NULL OR u.role_id = $2)
      AND ($3::bool IS NULL OR u.is_suspended = $3)
"#;

// UPDATE ... RETURNING + JOIN para devolver o usuário completo
fn update_returning(set_clause: &str) -> String {
    format!(
        r#"
        WITH updated AS (
            UPDATE users SET {set_clause}, updated_at = NOW()
            WHERE id = $1
            RETURNING *
        )
        SELECT u.id, u.first_name, u.last_name, u.email, u.password_hash,
               u.role_id, r.name AS role, u.is_suspended, u.service,
               u.created_at, u.updated_at
        FROM updated u
        JOIN roles r ON r.id = u.role_id
        "#
    )
}

// Converte violações de constraint em erros mais amigáveis
fn map_user_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::EmailAlreadyExists;
        }
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound("role");
        }
    }
    e.into()
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("{SELECT_USER} WHERE lower(u.email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("{SELECT_USER} WHERE u.id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list(&self, filters: &UserFilters, pagination: Pagination) -> Result<Page<User>, AppError> {
        let search = search_pattern(filters.search.as_deref());

        let sql = format!("{SELECT_USER} {FILTER_USERS} ORDER BY u.created_at DESC LIMIT $4 OFFSET $5");
        let items = sqlx::query_as::<_, User>(&sql)
            .bind(&search)
            .bind(filters.role_id)
            .bind(filters.is_suspended)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM users u {FILTER_USERS}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .bind(filters.role_id)
            .bind(filters.is_suspended)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            WITH inserted AS (
                INSERT INTO users (first_name, last_name, email, password_hash, role_id, service)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT u.id, u.first_name, u.last_name, u.email, u.password_hash,
                   u.role_id, r.name AS role, u.is_suspended, u.service,
                   u.created_at, u.updated_at
            FROM inserted u
            JOIN roles r ON r.id = u.role_id
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(&user.service)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_error)
    }

    async fn update_profile(&self, id: Uuid, input: &UpdateUserPayload) -> Result<Option<User>, AppError> {
        let sql = update_returning("first_name = $2, last_name = $3, service = $4");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.service)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_role(&self, id: Uuid, role_id: Uuid) -> Result<Option<User>, AppError> {
        let sql = update_returning("role_id = $2");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_error)
    }

    async fn set_suspended(&self, id: Uuid, is_suspended: bool) -> Result<Option<User>, AppError> {
        let sql = update_returning("is_suspended = $2");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(is_suspended)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
              AND NOT EXISTS (
                    SELECT 1
                    FROM clients c
                    JOIN client_sessions s ON s.client_id = c.id
                    WHERE c.assigned_to = $1 AND s.status = 'active')
            "#,
        )
        .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
