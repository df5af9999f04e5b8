// src/db/client_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{search_pattern, Page, Pagination},
    },
    models::client::{
        Client, ClientFilters, ClientStatus, ClientSummary, CreateClientPayload,
        UpdateClientPayload,
    },
};

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn list(&self, filters: &ClientFilters, pagination: Pagination) -> Result<Page<Client>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>, AppError>;
    async fn create(&self, input: &CreateClientPayload) -> Result<Client, AppError>;
    async fn update(&self, id: Uuid, input: &UpdateClientPayload) -> Result<Option<Client>, AppError>;
    async fn update_status(
        &self,
        id: Uuid,
        status: ClientStatus,
        step: Option<&str>,
    ) -> Result<Option<Client>, AppError>;
    /// Desatribuir só grava se o cliente não tiver sessão ativa; `None` caso contrário.
    async fn assign(&self, id: Uuid, assigned_to: Option<Uuid>) -> Result<Option<Client>, AppError>;
    /// Contadores e totais financeiros do cliente.
    async fn summary(&self, id: Uuid) -> Result<ClientSummary, AppError>;
    /// Remove o cliente e os seus documentos. Devolve as chaves de storage dos
    /// documentos removidos, ou `None` se o cliente não existia.
    async fn delete(&self, id: Uuid) -> Result<Option<Vec<String>>, AppError>;
}

const CLIENT_COLUMNS: &str = "id, nom, numero, email, service, status, step, assigned_to, commentaire, created_at, updated_at";

const FILTER_CLIENTS: &str = r#"
    WHERE ($1::text IS NULL OR nom ILIKE $1 ESCAPE '\' OR numero ILIKE $1 ESCAPE '\' OR email ILIKE $1 ESCAPE '\')
      AND ($2::client_status IS NULL OR status = $2)
      AND ($3::uuid IS NULL OR assigned_to = $3)
      AND ($4::text IS NULL OR service = $4)
"#;

// FK de assigned_to -> users
fn map_client_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound("user");
        }
    }
    e.into()
}

#[derive(Clone)]
pub struct PgClientRepository {
    pool: PgPool,
}

impl PgClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for PgClientRepository {
    async fn list(&self, filters: &ClientFilters, pagination: Pagination) -> Result<Page<Client>, AppError> {
        let search = search_pattern(filters.search.as_deref());

        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients {FILTER_CLIENTS} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        );
        let items = sqlx::query_as::<_, Client>(&sql)
            .bind(&search)
            .bind(filters.status)
            .bind(filters.assigned_to)
            .bind(&filters.service)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM clients {FILTER_CLIENTS}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .bind(filters.status)
            .bind(filters.assigned_to)
            .bind(&filters.service)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1");
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    async fn create(&self, input: &CreateClientPayload) -> Result<Client, AppError> {
        let sql = format!(
            r#"
            INSERT INTO clients (nom, numero, email, service, status, step, assigned_to, commentaire)
            VALUES ($1, $2, $3, $4, COALESCE($5, 'lead'::client_status), $6, $7, $8)
            RETURNING {CLIENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Client>(&sql)
            .bind(input.nom.trim())
            .bind(input.numero.trim())
            .bind(&input.email)
            .bind(&input.service)
            .bind(input.status)
            .bind(&input.step)
            .bind(input.assigned_to)
            .bind(&input.commentaire)
            .fetch_one(&self.pool)
            .await
            .map_err(map_client_error)
    }

    async fn update(&self, id: Uuid, input: &UpdateClientPayload) -> Result<Option<Client>, AppError> {
        let sql = format!(
            r#"
            UPDATE clients
            SET nom = $2, numero = $3, email = $4, service = $5, step = $6,
                commentaire = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        );
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(input.nom.trim())
            .bind(input.numero.trim())
            .bind(&input.email)
            .bind(&input.service)
            .bind(&input.step)
            .bind(&input.commentaire)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ClientStatus,
        step: Option<&str>,
    ) -> Result<Option<Client>, AppError> {
        let sql = format!(
            r#"
            UPDATE clients SET status = $2, step = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        );
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(status)
            .bind(step)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    async fn assign(&self, id: Uuid, assigned_to: Option<Uuid>) -> Result<Option<Client>, AppError> {
        let sql = format!(
            r#"
            UPDATE clients SET assigned_to = $2, updated_at = NOW()
            WHERE id = $1
              AND ($2::uuid IS NOT NULL OR NOT EXISTS (
                    SELECT 1 FROM client_sessions
                    WHERE client_id = $1 AND status = 'active'))
            RETURNING {CLIENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(assigned_to)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_client_error)
    }

    async fn summary(&self, id: Uuid) -> Result<ClientSummary, AppError> {
        let summary = sqlx::query_as::<_, ClientSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM client_sessions WHERE client_id = $1) AS sessions_count,
                (SELECT COUNT(*) FROM factures WHERE client_id = $1) AS factures_count,
                (SELECT COUNT(*)
                   FROM payments p
                   JOIN factures f ON f.id = p.facture_id
                  WHERE f.client_id = $1) AS payments_count,
                COALESCE((SELECT SUM(montant_total) FROM factures WHERE client_id = $1), 0) AS total_facture,
                COALESCE((SELECT SUM(montant_paye) FROM factures WHERE client_id = $1), 0) AS total_paye,
                COALESCE((SELECT SUM(montant_total - montant_paye) FROM factures WHERE client_id = $1), 0) AS total_restant
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Vec<String>>, AppError> {
        let mut tx = self.pool.begin().await?;

        let storage_keys: Vec<String> =
            sqlx::query_scalar("DELETE FROM documents WHERE client_id = $1 RETURNING storage_key")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let deleted = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // Sessões/faturas criadas entre a checagem e o DELETE
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::ClientHasDependencies {
                            sessions: 0,
                            factures: 0,
                            payments: 0,
                        };
                    }
                }
                AppError::from(e)
            })?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(storage_keys))
    }
}
