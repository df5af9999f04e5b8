// src/db/session_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::client::{Conclusion, NewConclusion, Session},
};

/// Sessões de atendimento e as suas conclusões.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError>;
    async fn find_active(&self, client_id: Uuid) -> Result<Option<Session>, AppError>;
    /// Sessões do cliente (mais recentes primeiro), com conclusões.
    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<Session>, AppError>;
    /// Cria uma sessão ativa. O índice parcial garante uma única ativa por cliente.
    async fn create(&self, client_id: Uuid, service: &str) -> Result<Session, AppError>;
    /// Fecha somente se ainda estiver ativa; `None` caso contrário.
    async fn close(&self, id: Uuid) -> Result<Option<Session>, AppError>;
    /// Insere somente se a sessão estiver ativa; `None` caso contrário.
    async fn add_conclusion(&self, input: NewConclusion) -> Result<Option<Conclusion>, AppError>;
}

const SESSION_COLUMNS: &str = "id, client_id, service, status, created_at, closed_at";

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Carrega as conclusões de várias sessões numa única consulta
    async fn attach_conclusions(&self, mut sessions: Vec<Session>) -> Result<Vec<Session>, AppError> {
        if sessions.is_empty() {
            return Ok(sessions);
        }
        let ids: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();

        let conclusions = sqlx::query_as::<_, Conclusion>(
            r#"
            SELECT id, session_id, text, reminder_date, created_by, created_at
            FROM conclusions
            WHERE session_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_session: HashMap<Uuid, Vec<Conclusion>> = HashMap::new();
        for conclusion in conclusions {
            by_session
                .entry(conclusion.session_id)
                .or_default()
                .push(conclusion);
        }
        for session in &mut sessions {
            session.conclusions = by_session.remove(&session.id).unwrap_or_default();
        }
        Ok(sessions)
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM client_sessions WHERE id = $1");
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match session {
            Some(session) => Ok(self.attach_conclusions(vec![session]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_active(&self, client_id: Uuid) -> Result<Option<Session>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM client_sessions WHERE client_id = $1 AND status = 'active'"
        );
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;

        match session {
            Some(session) => Ok(self.attach_conclusions(vec![session]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<Session>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM client_sessions WHERE client_id = $1 ORDER BY created_at DESC"
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_conclusions(sessions).await
    }

    async fn create(&self, client_id: Uuid, service: &str) -> Result<Session, AppError> {
        let sql = format!(
            r#"
            INSERT INTO client_sessions (client_id, service, status)
            VALUES ($1, $2, 'active')
            RETURNING {SESSION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Session>(&sql)
            .bind(client_id)
            .bind(service)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // idx_client_sessions_one_active
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return AppError::ActiveSessionExists;
                    }
                }
                AppError::from(e)
            })
    }

    async fn close(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let sql = format!(
            r#"
            UPDATE client_sessions
            SET status = 'closed', closed_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {SESSION_COLUMNS}
            "#
        );
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match session {
            Some(session) => Ok(self.attach_conclusions(vec![session]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn add_conclusion(&self, input: NewConclusion) -> Result<Option<Conclusion>, AppError> {
        let conclusion = sqlx::query_as::<_, Conclusion>(
            r#"
            INSERT INTO conclusions (session_id, text, reminder_date, created_by)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (
                SELECT 1 FROM client_sessions WHERE id = $1 AND status = 'active'
            )
            RETURNING id, session_id, text, reminder_date, created_by, created_at
            "#,
        )
        .bind(input.session_id)
        .bind(&input.text)
        .bind(input.reminder_date)
        .bind(input.created_by)
        .fetch_optional(&self.pool)
        .await?;
        Ok(conclusion)
    }
}
