// src/db/document_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{search_pattern, Page, Pagination},
    },
    models::document::{Document, DocumentFilters, NewDocument},
};

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn list(&self, filters: &DocumentFilters, pagination: Pagination) -> Result<Page<Document>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, AppError>;
    /// Tudo ou nada: um único INSERT falho desfaz o lote inteiro.
    async fn insert_batch(&self, documents: Vec<NewDocument>) -> Result<Vec<Document>, AppError>;
    async fn delete(&self, id: Uuid) -> Result<Option<Document>, AppError>;
}

const DOCUMENT_COLUMNS: &str = "id, client_id, patient_id, title, file_name, content_type, size_bytes, storage_key, uploaded_by, created_at";

const FILTER_DOCUMENTS: &str = r#"
    WHERE ($1::text IS NULL OR title ILIKE $1 ESCAPE '\' OR file_name ILIKE $1 ESCAPE '\')
      AND ($2::uuid IS NULL OR client_id = $2)
      AND ($3::uuid IS NULL OR patient_id = $3)
"#;

#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn list(&self, filters: &DocumentFilters, pagination: Pagination) -> Result<Page<Document>, AppError> {
        let search = search_pattern(filters.search.as_deref());

        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents {FILTER_DOCUMENTS} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        );
        let items = sqlx::query_as::<_, Document>(&sql)
            .bind(&search)
            .bind(filters.client_id)
            .bind(filters.patient_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM documents {FILTER_DOCUMENTS}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .bind(filters.client_id)
            .bind(filters.patient_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(document)
    }

    async fn insert_batch(&self, documents: Vec<NewDocument>) -> Result<Vec<Document>, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO documents
                (id, client_id, patient_id, title, file_name, content_type, size_bytes, storage_key, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );

        let mut inserted = Vec::with_capacity(documents.len());
        for doc in documents {
            let row = sqlx::query_as::<_, Document>(&sql)
                .bind(doc.id)
                .bind(doc.owner.client_id)
                .bind(doc.owner.patient_id)
                .bind(&doc.title)
                .bind(&doc.file_name)
                .bind(&doc.content_type)
                .bind(doc.size_bytes)
                .bind(&doc.storage_key)
                .bind(doc.uploaded_by)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(db_err) = &e {
                        if db_err.is_foreign_key_violation() {
                            return AppError::NotFound("owner");
                        }
                    }
                    AppError::from(e)
                })?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let sql = format!("DELETE FROM documents WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}");
        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(document)
    }
}
