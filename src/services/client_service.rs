// src/services/client_service.rs

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{Page, Pagination},
    },
    db::{ClientRepository, SessionRepository},
    models::client::{
        Client, ClientDetails, ClientFilters, ClientStatus, Conclusion, CreateClientPayload,
        NewConclusion, Session, UpdateClientPayload,
    },
    storage::BlobStorage,
};

#[derive(Clone)]
pub struct ClientService {
    client_repo: Arc<dyn ClientRepository>,
    session_repo: Arc<dyn SessionRepository>,
    storage: Arc<dyn BlobStorage>,
}

impl ClientService {
    pub fn new(
        client_repo: Arc<dyn ClientRepository>,
        session_repo: Arc<dyn SessionRepository>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            client_repo,
            session_repo,
            storage,
        }
    }

    // =========================================================================
    //  CLIENTES
    // =========================================================================

    pub async fn list(&self, filters: &ClientFilters) -> Result<Page<Client>, AppError> {
        let pagination = Pagination::new(filters.page, filters.rows_per_page);
        self.client_repo.list(filters, pagination).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Client, AppError> {
        self.client_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("client"))
    }

    /// Carrega a tela de detalhe em paralelo: cliente, resumo, sessões e sessão ativa.
    pub async fn details(&self, id: Uuid) -> Result<ClientDetails, AppError> {
        let (client, summary, sessions, active_session) = tokio::try_join!(
            self.get(id),
            self.client_repo.summary(id),
            self.session_repo.list_for_client(id),
            self.session_repo.find_active(id),
        )?;

        Ok(ClientDetails {
            client,
            summary,
            sessions,
            active_session,
        })
    }

    pub async fn create(&self, payload: &CreateClientPayload) -> Result<Client, AppError> {
        let client = self.client_repo.create(payload).await?;
        tracing::info!(client_id = %client.id, "Cliente criado");
        Ok(client)
    }

    pub async fn update(&self, id: Uuid, payload: &UpdateClientPayload) -> Result<Client, AppError> {
        self.client_repo
            .update(id, payload)
            .await?
            .ok_or(AppError::NotFound("client"))
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: ClientStatus,
        step: Option<&str>,
    ) -> Result<Client, AppError> {
        self.client_repo
            .update_status(id, status, step)
            .await?
            .ok_or(AppError::NotFound("client"))
    }

    /// Com sessão ativa o cliente não pode ficar sem comercial.
    pub async fn assign(&self, id: Uuid, assigned_to: Option<Uuid>) -> Result<Client, AppError> {
        let Some(client) = self.client_repo.assign(id, assigned_to).await? else {
            self.get(id).await?;
            tracing::warn!(client_id = %id, "Desatribuição recusada: sessão ativa");
            return Err(AppError::AssignmentRequired);
        };
        tracing::info!(client_id = %id, assigned_to = ?assigned_to, "Atribuição alterada");
        Ok(client)
    }

    /// Só remove clientes sem sessões, faturas ou pagamentos. Os documentos vão junto.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.get(id).await?;

        let summary = self.client_repo.summary(id).await?;
        if summary.sessions_count > 0 || summary.factures_count > 0 || summary.payments_count > 0 {
            tracing::warn!(client_id = %id, "Remoção recusada: cliente com dependências");
            return Err(AppError::ClientHasDependencies {
                sessions: summary.sessions_count,
                factures: summary.factures_count,
                payments: summary.payments_count,
            });
        }

        let storage_keys = self
            .client_repo
            .delete(id)
            .await?
            .ok_or(AppError::NotFound("client"))?;

        // As linhas já foram; um blob órfão não justifica falhar a remoção
        for key in storage_keys {
            if let Err(e) = self.storage.delete(&key).await {
                tracing::error!(%key, "Falha ao remover blob do cliente: {}", e);
            }
        }

        tracing::info!(client_id = %id, "Cliente removido");
        Ok(())
    }

    // =========================================================================
    //  SESSÕES
    // =========================================================================

    pub async fn active_session(&self, client_id: Uuid) -> Result<Option<Session>, AppError> {
        self.get(client_id).await?;
        self.session_repo.find_active(client_id).await
    }

    pub async fn list_sessions(&self, client_id: Uuid) -> Result<Vec<Session>, AppError> {
        self.get(client_id).await?;
        self.session_repo.list_for_client(client_id).await
    }

    /// Abre uma sessão. Sem comercial atribuído, nada é gravado.
    pub async fn open_session(&self, client_id: Uuid, service: &str) -> Result<Session, AppError> {
        let service = service.trim();
        if service.is_empty() {
            return Err(AppError::field("service", "required"));
        }

        let client = self.get(client_id).await?;
        if client.assigned_to.is_none() {
            tracing::warn!(%client_id, "Sessão recusada: cliente sem comercial");
            return Err(AppError::AssignmentRequired);
        }

        // O índice único parcial cobre a corrida entre duas aberturas
        let session = self.session_repo.create(client_id, service).await?;
        tracing::info!(%client_id, session_id = %session.id, "Sessão aberta");
        Ok(session)
    }

    pub async fn close_session(&self, session_id: Uuid) -> Result<Session, AppError> {
        match self.session_repo.close(session_id).await? {
            Some(session) => {
                tracing::info!(%session_id, "Sessão encerrada");
                Ok(session)
            }
            None => Err(self.inactive_or_missing(session_id).await),
        }
    }

    pub async fn add_conclusion(
        &self,
        session_id: Uuid,
        text: &str,
        reminder_date: Option<&str>,
        created_by: Option<Uuid>,
    ) -> Result<Conclusion, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::field("text", "required"));
        }
        let reminder_date = reminder_date
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| parse_reminder(raw).ok_or_else(|| AppError::field("reminderDate", "invalid_date")))
            .transpose()?;

        let conclusion = self
            .session_repo
            .add_conclusion(NewConclusion {
                session_id,
                text: text.to_string(),
                reminder_date,
                created_by,
            })
            .await?;

        match conclusion {
            Some(conclusion) => Ok(conclusion),
            None => Err(self.inactive_or_missing(session_id).await),
        }
    }

    // A escrita condicional não diz por que falhou; a leitura decide
    async fn inactive_or_missing(&self, session_id: Uuid) -> AppError {
        match self.session_repo.find_by_id(session_id).await {
            Ok(Some(_)) => AppError::SessionNotActive,
            Ok(None) => AppError::NotFound("session"),
            Err(e) => e,
        }
    }
}

/// Aceita RFC 3339, `YYYY-MM-DDTHH:MM` (UTC) ou `YYYY-MM-DD` (meia-noite UTC).
pub fn parse_reminder(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
