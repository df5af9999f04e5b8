// src/storage.rs

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Armazenamento dos binários (documentos enviados e snapshots de backup).
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()>;
    async fn get(&self, key: &str) -> io::Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> io::Result<()>;
}

/// Implementação em disco local: `<root>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // Chaves são sempre relativas e sem ".."
    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let relative = Path::new(key);
        let is_safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_safe {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("chave de storage inválida: {key}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await
    }

    async fn get(&self, key: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_for(key)?).await
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            // Já removido: nada a fazer
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Nome de arquivo seguro para compor a chave (mantém letras, números, '.', '-' e '_').
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn local_storage_round_trip_and_idempotent_delete() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());

        storage.put("documents/a/passeport.pdf", b"%PDF").await.unwrap();
        assert_eq!(storage.get("documents/a/passeport.pdf").await.unwrap(), b"%PDF");

        storage.delete("documents/a/passeport.pdf").await.unwrap();
        storage.delete("documents/a/passeport.pdf").await.unwrap();
        assert!(storage.get("documents/a/passeport.pdf").await.is_err());
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_root() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path().join("blobs"));
        let err = storage.put("../etc/passwd", b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!temp.path().join("etc").exists());
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_file_name("mon passeport (1).pdf"), "mon_passeport__1_.pdf");
        assert_eq!(sanitize_file_name("../../x"), "_.._x");
        assert_eq!(sanitize_file_name("..."), "file");
    }
}
