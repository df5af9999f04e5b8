// src/services/document_service.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{Page, Pagination},
    },
    db::DocumentRepository,
    models::document::{
        Document, DocumentFilters, DocumentOwner, DownloadLink, NewDocument, UploadFile,
        MAX_FILES_PER_UPLOAD,
    },
    storage::{sanitize_file_name, BlobStorage},
};

// =========================================================================
//  LINKS DE DOWNLOAD ASSINADOS
// =========================================================================

/// O que um link de download aponta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum DownloadTarget {
    Document(Uuid),
    Backup(Uuid),
}

#[derive(Debug, Serialize, Deserialize)]
struct DownloadClaims {
    target: DownloadTarget,
    exp: usize,
    iat: usize,
}

/// Emite e confere os tokens de download (JWT curto, chave separada da de acesso).
#[derive(Clone)]
pub struct DownloadLinks {
    secret: Arc<str>,
    base_url: Arc<str>,
    ttl_secs: i64,
}

impl DownloadLinks {
    pub fn new(jwt_secret: &str, base_url: &str, ttl_secs: i64) -> Self {
        Self {
            secret: Arc::from(format!("{jwt_secret}:downloads")),
            base_url: Arc::from(base_url.trim_end_matches('/')),
            ttl_secs,
        }
    }

    pub fn issue(&self, target: DownloadTarget) -> Result<DownloadLink, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.ttl_secs);
        let claims = DownloadClaims {
            target,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(DownloadLink {
            url: format!("{}/api/downloads/{}", self.base_url, token),
            expires_at,
        })
    }

    pub fn resolve(&self, token: &str) -> Result<DownloadTarget, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        decode::<DownloadClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims.target)
        .map_err(|_| AppError::InvalidToken)
    }
}

// =========================================================================
//  DOCUMENTOS
// =========================================================================

#[derive(Clone)]
pub struct DocumentService {
    repo: Arc<dyn DocumentRepository>,
    storage: Arc<dyn BlobStorage>,
    links: DownloadLinks,
}

impl DocumentService {
    pub fn new(
        repo: Arc<dyn DocumentRepository>,
        storage: Arc<dyn BlobStorage>,
        jwt_secret: &str,
        public_base_url: &str,
        download_link_ttl_secs: i64,
    ) -> Self {
        Self {
            repo,
            storage,
            links: DownloadLinks::new(jwt_secret, public_base_url, download_link_ttl_secs),
        }
    }

    pub fn links(&self) -> DownloadLinks {
        self.links.clone()
    }

    pub async fn list(&self, filters: &DocumentFilters) -> Result<Page<Document>, AppError> {
        let pagination = Pagination::new(filters.page, filters.rows_per_page);
        self.repo.list(filters, pagination).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Document, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("document"))
    }

    /// Envio em lote: valida tudo, grava os blobs e só então as linhas (numa transação).
    /// Qualquer falha apaga os blobs já gravados.
    pub async fn upload(
        &self,
        owner: DocumentOwner,
        files: Vec<UploadFile>,
        titles: Vec<String>,
        uploaded_by: Option<Uuid>,
    ) -> Result<Vec<Document>, AppError> {
        if owner.client_id.is_none() && owner.patient_id.is_none() {
            return Err(AppError::field("clientId", "required"));
        }
        validate_upload(&files, &titles)?;

        let mut pending = Vec::with_capacity(files.len());
        for (file, title) in files.iter().zip(&titles) {
            let id = Uuid::new_v4();
            pending.push(NewDocument {
                id,
                owner,
                title: title.trim().to_string(),
                file_name: file.file_name.clone(),
                content_type: file.content_type.clone(),
                size_bytes: file.bytes.len() as i64,
                storage_key: format!("documents/{id}/{}", sanitize_file_name(&file.file_name)),
                uploaded_by,
            });
        }

        let mut written: Vec<String> = Vec::with_capacity(pending.len());
        for (doc, file) in pending.iter().zip(&files) {
            if let Err(e) = self.storage.put(&doc.storage_key, &file.bytes).await {
                self.discard(&written).await;
                return Err(e.into());
            }
            written.push(doc.storage_key.clone());
        }

        match self.repo.insert_batch(pending).await {
            Ok(documents) => {
                tracing::info!(count = documents.len(), "Documentos enviados");
                Ok(documents)
            }
            Err(e) => {
                self.discard(&written).await;
                Err(e)
            }
        }
    }

    async fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.storage.delete(key).await {
                tracing::error!(%key, "Falha ao desfazer blob do envio: {}", e);
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let document = self
            .repo
            .delete(id)
            .await?
            .ok_or(AppError::NotFound("document"))?;
        if let Err(e) = self.storage.delete(&document.storage_key).await {
            tracing::error!(key = %document.storage_key, "Falha ao remover blob: {}", e);
        }
        Ok(())
    }

    pub async fn download_link(&self, id: Uuid) -> Result<DownloadLink, AppError> {
        self.get(id).await?;
        self.links.issue(DownloadTarget::Document(id))
    }

    /// Metadados e conteúdo para servir o download.
    pub async fn open(&self, id: Uuid) -> Result<(Document, Vec<u8>), AppError> {
        let document = self.get(id).await?;
        let bytes = self.storage.get(&document.storage_key).await?;
        Ok((document, bytes))
    }
}

/// Regras do envio, checadas antes de tocar no storage ou no banco.
pub fn validate_upload(files: &[UploadFile], titles: &[String]) -> Result<(), AppError> {
    if files.is_empty() {
        return Err(AppError::field("files", "required"));
    }
    if files.len() != titles.len() {
        return Err(AppError::UploadMismatch {
            files: files.len(),
            titles: titles.len(),
        });
    }
    if files.len() > MAX_FILES_PER_UPLOAD {
        return Err(AppError::TooManyFiles {
            max: MAX_FILES_PER_UPLOAD,
        });
    }

    let mut errors = std::collections::HashMap::new();
    for (i, (file, title)) in files.iter().zip(titles).enumerate() {
        if title.trim().is_empty() {
            errors.insert(format!("titles[{i}]"), "required".to_string());
        }
        if file.bytes.is_empty() {
            errors.insert(format!("files[{i}]"), "empty_file".to_string());
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::FieldErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryDb, InMemoryStorage};

    fn file(name: &str) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    fn titles(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn service(db: &Arc<InMemoryDb>, storage: &Arc<InMemoryStorage>) -> DocumentService {
        DocumentService::new(db.clone(), storage.clone(), "test-secret", "http://localhost:3000/", 300)
    }

    fn owner(client_id: Uuid) -> DocumentOwner {
        DocumentOwner {
            client_id: Some(client_id),
            patient_id: None,
        }
    }

    #[tokio::test]
    async fn mismatched_counts_never_reach_storage_or_repository() {
        let db = InMemoryDb::seeded();
        let storage = Arc::new(InMemoryStorage::default());
        let docs = service(&db, &storage);

        let err = docs
            .upload(
                owner(Uuid::new_v4()),
                vec![file("a.pdf"), file("b.pdf")],
                titles(&["Passeport"]),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UploadMismatch { files: 2, titles: 1 }));
        assert_eq!(storage.puts(), 0);
        assert_eq!(db.writes(), 0);
    }

    #[tokio::test]
    async fn blank_title_is_reported_per_index() {
        let db = InMemoryDb::seeded();
        let storage = Arc::new(InMemoryStorage::default());
        let docs = service(&db, &storage);

        let err = docs
            .upload(
                owner(Uuid::new_v4()),
                vec![file("a.pdf"), file("b.pdf")],
                titles(&["Passeport", "  "]),
                None,
            )
            .await
            .unwrap_err();
        match err {
            AppError::FieldErrors(errors) => assert_eq!(errors["titles[1]"], "required"),
            other => panic!("esperava FieldErrors, veio {other:?}"),
        }
        assert_eq!(storage.puts(), 0);
    }

    #[test]
    fn upload_rules() {
        assert!(validate_upload(&[], &[]).is_err());
        let eleven: Vec<UploadFile> = (0..11).map(|i| file(&format!("{i}.pdf"))).collect();
        let eleven_titles: Vec<String> = (0..11).map(|i| format!("Doc {i}")).collect();
        assert!(matches!(
            validate_upload(&eleven, &eleven_titles),
            Err(AppError::TooManyFiles { max: 10 })
        ));

        let ten = &eleven[..10];
        assert!(validate_upload(ten, &eleven_titles[..10]).is_ok());

        let empty = UploadFile {
            bytes: Vec::new(),
            ..file("vide.pdf")
        };
        assert!(validate_upload(&[empty], &titles(&["Vide"])).is_err());
    }

    #[tokio::test]
    async fn batch_upload_stores_blobs_and_rows() {
        let db = InMemoryDb::seeded();
        let storage = Arc::new(InMemoryStorage::default());
        let docs = service(&db, &storage);
        let client = db.add_client("Youssef El Amrani", None).await;

        let uploaded = docs
            .upload(
                owner(client.id),
                vec![file("passeport.pdf"), file("photo d'identité.pdf")],
                titles(&["Passeport", " Photo "]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(uploaded.len(), 2);
        assert_eq!(uploaded[1].title, "Photo");
        assert!(uploaded[1].storage_key.ends_with("photo_d_identit_.pdf"));
        assert_eq!(storage.len().await, 2);

        let page = docs
            .list(&DocumentFilters {
                client_id: Some(client.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn storage_failure_mid_batch_removes_written_blobs() {
        let db = InMemoryDb::seeded();
        let storage = Arc::new(InMemoryStorage::default());
        let docs = service(&db, &storage);
        storage.fail_on_put(2).await;

        let err = docs
            .upload(
                owner(Uuid::new_v4()),
                vec![file("a.pdf"), file("b.pdf"), file("c.pdf")],
                titles(&["A", "B", "C"]),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StorageError(_)));
        assert_eq!(storage.len().await, 0);
        assert_eq!(db.writes(), 0);
    }

    #[tokio::test]
    async fn repository_failure_removes_all_blobs() {
        let db = InMemoryDb::seeded();
        let storage = Arc::new(InMemoryStorage::default());
        let docs = service(&db, &storage);
        db.fail_document_inserts();

        assert!(docs
            .upload(
                owner(Uuid::new_v4()),
                vec![file("a.pdf"), file("b.pdf")],
                titles(&["A", "B"]),
                None,
            )
            .await
            .is_err());
        assert_eq!(storage.puts(), 2);
        assert_eq!(storage.len().await, 0);
        assert!(db.tables.lock().await.documents.is_empty());
    }

    #[tokio::test]
    async fn signed_link_resolves_to_the_document() {
        let db = InMemoryDb::seeded();
        let storage = Arc::new(InMemoryStorage::default());
        let docs = service(&db, &storage);
        let client = db.add_client("Youssef El Amrani", None).await;
        let uploaded = docs
            .upload(owner(client.id), vec![file("a.pdf")], titles(&["A"]), None)
            .await
            .unwrap();

        let link = docs.download_link(uploaded[0].id).await.unwrap();
        assert!(link.url.starts_with("http://localhost:3000/api/downloads/"));
        let token = link.url.rsplit('/').next().unwrap();

        let target = docs.links().resolve(token).unwrap();
        assert_eq!(target, DownloadTarget::Document(uploaded[0].id));

        let (document, bytes) = docs.open(uploaded[0].id).await.unwrap();
        assert_eq!(document.file_name, "a.pdf");
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let links = DownloadLinks::new("test-secret", "http://localhost:3000", -60);
        let expired = links.issue(DownloadTarget::Backup(Uuid::new_v4())).unwrap();
        let token = expired.url.rsplit('/').next().unwrap();
        assert!(matches!(links.resolve(token), Err(AppError::InvalidToken)));

        let other = DownloadLinks::new("another-secret", "http://localhost:3000", 300);
        let link = other.issue(DownloadTarget::Backup(Uuid::new_v4())).unwrap();
        let token = link.url.rsplit('/').next().unwrap();
        assert!(matches!(links.resolve(token), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn delete_removes_row_and_blob() {
        let db = InMemoryDb::seeded();
        let storage = Arc::new(InMemoryStorage::default());
        let docs = service(&db, &storage);
        let client = db.add_client("Youssef El Amrani", None).await;
        let uploaded = docs
            .upload(owner(client.id), vec![file("a.pdf")], titles(&["A"]), None)
            .await
            .unwrap();

        docs.delete(uploaded[0].id).await.unwrap();
        assert_eq!(storage.len().await, 0);
        assert!(matches!(
            docs.delete(uploaded[0].id).await,
            Err(AppError::NotFound("document"))
        ));
    }
}
