// src/db/patient_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{search_pattern, Page, Pagination},
    },
    models::patient::{Patient, PatientFilters, PatientPayload, QueueStatus},
};

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn list(&self, filters: &PatientFilters, pagination: Pagination) -> Result<Page<Patient>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, AppError>;
    async fn create(&self, input: &PatientPayload) -> Result<Patient, AppError>;
    async fn update(&self, id: Uuid, input: &PatientPayload) -> Result<Option<Patient>, AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
    /// Coloca o paciente na fila (`waiting`, chegada = agora).
    async fn check_in(&self, id: Uuid) -> Result<Option<Patient>, AppError>;
    /// Troca o status somente se o atual ainda for `expected`.
    async fn set_queue_status(
        &self,
        id: Uuid,
        expected: QueueStatus,
        next: QueueStatus,
    ) -> Result<Option<Patient>, AppError>;
    /// Fila do dia: pacientes com status, por ordem de chegada.
    async fn queue(&self) -> Result<Vec<Patient>, AppError>;
}

const PATIENT_COLUMNS: &str = "id, first_name, last_name, phone, email, birth_date, queue_status, arrived_at, created_at, updated_at";

const FILTER_PATIENTS: &str = r#"
    WHERE ($1::text IS NULL
           OR (first_name || ' ' || last_name) ILIKE $1 ESCAPE '\'
           OR phone ILIKE $1 ESCAPE '\'
           OR email ILIKE $1 ESCAPE '\')
      AND ($2::queue_status IS NULL OR queue_status = $2)
"#;

#[derive(Clone)]
pub struct PgPatientRepository {
    pool: PgPool,
}

impl PgPatientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientRepository for PgPatientRepository {
    async fn list(&self, filters: &PatientFilters, pagination: Pagination) -> Result<Page<Patient>, AppError> {
        let search = search_pattern(filters.search.as_deref());

        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients {FILTER_PATIENTS} ORDER BY last_name, first_name LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Patient>(&sql)
            .bind(&search)
            .bind(filters.queue_status)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM patients {FILTER_PATIENTS}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .bind(filters.queue_status)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, AppError> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1");
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    async fn create(&self, input: &PatientPayload) -> Result<Patient, AppError> {
        let sql = format!(
            r#"
            INSERT INTO patients (first_name, last_name, phone, email, birth_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(input.first_name.trim())
            .bind(input.last_name.trim())
            .bind(&input.phone)
            .bind(&input.email)
            .bind(input.birth_date)
            .fetch_one(&self.pool)
            .await?;
        Ok(patient)
    }

    async fn update(&self, id: Uuid, input: &PatientPayload) -> Result<Option<Patient>, AppError> {
        let sql = format!(
            r#"
            UPDATE patients
            SET first_name = $2, last_name = $3, phone = $4, email = $5,
                birth_date = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .bind(input.first_name.trim())
            .bind(input.last_name.trim())
            .bind(&input.phone)
            .bind(&input.email)
            .bind(input.birth_date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::UniqueConstraintViolation(
                            "Paciente possui documentos.".into(),
                        );
                    }
                }
                AppError::from(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn check_in(&self, id: Uuid) -> Result<Option<Patient>, AppError> {
        let sql = format!(
            r#"
            UPDATE patients
            SET queue_status = 'waiting', arrived_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    async fn set_queue_status(
        &self,
        id: Uuid,
        expected: QueueStatus,
        next: QueueStatus,
    ) -> Result<Option<Patient>, AppError> {
        let sql = format!(
            r#"
            UPDATE patients
            SET queue_status = $3, updated_at = NOW()
            WHERE id = $1 AND queue_status = $2
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .bind(expected)
            .bind(next)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    async fn queue(&self) -> Result<Vec<Patient>, AppError> {
        let sql = format!(
            r#"
            SELECT {PATIENT_COLUMNS} FROM patients
            WHERE queue_status IS NOT NULL
              AND arrived_at >= date_trunc('day', NOW())
            ORDER BY arrived_at ASC
            "#
        );
        let patients = sqlx::query_as::<_, Patient>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(patients)
    }
}
