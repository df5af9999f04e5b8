// src/services/patient_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{Page, Pagination},
    },
    db::PatientRepository,
    models::patient::{Patient, PatientFilters, PatientPayload, QueueStatus},
};

#[derive(Clone)]
pub struct PatientService {
    repo: Arc<dyn PatientRepository>,
}

impl PatientService {
    pub fn new(repo: Arc<dyn PatientRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, filters: &PatientFilters) -> Result<Page<Patient>, AppError> {
        let pagination = Pagination::new(filters.page, filters.rows_per_page);
        self.repo.list(filters, pagination).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Patient, AppError> {
        self.repo.find_by_id(id).await?.ok_or(AppError::NotFound("patient"))
    }

    pub async fn create(&self, payload: &PatientPayload) -> Result<Patient, AppError> {
        self.repo.create(payload).await
    }

    pub async fn update(&self, id: Uuid, payload: &PatientPayload) -> Result<Patient, AppError> {
        self.repo
            .update(id, payload)
            .await?
            .ok_or(AppError::NotFound("patient"))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("patient"));
        }
        Ok(())
    }

    /// Chegada do paciente: entra na fila como `waiting`.
    pub async fn check_in(&self, id: Uuid) -> Result<Patient, AppError> {
        let patient = self
            .repo
            .check_in(id)
            .await?
            .ok_or(AppError::NotFound("patient"))?;
        tracing::info!(patient_id = %id, "Check-in na fila");
        Ok(patient)
    }

    pub async fn transition(&self, id: Uuid, next: QueueStatus) -> Result<Patient, AppError> {
        let patient = self.get(id).await?;
        let current = patient
            .queue_status
            .ok_or_else(|| AppError::field("queueStatus", "not_in_queue"))?;
        if !current.can_move_to(next) {
            return Err(AppError::field("queueStatus", "invalid_transition"));
        }

        // Condicional: outra recepção pode ter mudado o status no meio tempo
        self.repo
            .set_queue_status(id, current, next)
            .await?
            .ok_or_else(|| AppError::UniqueConstraintViolation("Status da fila alterado por outro usuário.".into()))
    }

    /// Fila do dia, por ordem de chegada.
    pub async fn queue(&self) -> Result<Vec<Patient>, AppError> {
        self.repo.queue().await
    }
}
