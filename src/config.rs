// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{
        BackupRepository, ClientRepository, DocumentRepository, FinanceRepository,
        PatientRepository, PgBackupRepository, PgClientRepository, PgDocumentRepository,
        PgFinanceRepository, PgPatientRepository, PgRbacRepository, PgSessionRepository,
        PgSettingsRepository, PgUserRepository, RbacRepository, SessionRepository,
        SettingsRepository, UserRepository,
    },
    services::{
        auth::AuthService, backup_service::BackupService, client_service::ClientService,
        document_service::DocumentService, finance_service::FinanceService,
        patient_service::PatientService, rbac_service::RbacService,
        settings_service::SettingsService, user_service::UserService,
    },
    storage::BlobStorage,
};

// =========================================================================
//  CONFIGURAÇÃO (variáveis de ambiente / .env)
// =========================================================================

/// 10 arquivos por lote cabem com folga.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub storage_dir: PathBuf,
    pub fonts_dir: PathBuf,
    /// Base usada para montar os links de download assinados
    pub public_base_url: String,
    pub download_link_ttl_secs: i64,
    /// (email, senha) do primeiro SUPERADMIN, criado só com a tabela vazia
    pub bootstrap_admin: Option<(String, String)>,
    pub backup_scheduler_enabled: bool,
    /// Teto do corpo no envio de documentos
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let download_link_ttl_secs = match env::var("DOWNLOAD_LINK_TTL_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DOWNLOAD_LINK_TTL_SECS inválido: {raw}"))?,
            Err(_) => 300,
        };

        let backup_scheduler_enabled = match env::var("BACKUP_SCHEDULER_ENABLED") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("BACKUP_SCHEDULER_ENABLED inválido: {raw}"))?,
            Err(_) => true,
        };

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES inválido: {raw}"))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_EMAIL"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some((email, password)),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            storage_dir: PathBuf::from(env_or("STORAGE_DIR", "./storage")),
            fonts_dir: PathBuf::from(env_or("FONTS_DIR", "./fonts")),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            download_link_ttl_secs,
            bootstrap_admin,
            backup_scheduler_enabled,
            max_upload_bytes,
        })
    }

    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&self.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
        Ok(pool)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

// =========================================================================
//  REPOSITÓRIOS
// =========================================================================

// Os handles explícitos que o AppState recebe. Em produção, Postgres;
// nos testes, o banco em memória.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub rbac: Arc<dyn RbacRepository>,
    pub finance: Arc<dyn FinanceRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub backups: Arc<dyn BackupRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            clients: Arc::new(PgClientRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            rbac: Arc::new(PgRbacRepository::new(pool.clone())),
            finance: Arc::new(PgFinanceRepository::new(pool.clone())),
            documents: Arc::new(PgDocumentRepository::new(pool.clone())),
            backups: Arc::new(PgBackupRepository::new(pool.clone())),
            patients: Arc::new(PgPatientRepository::new(pool.clone())),
            settings: Arc::new(PgSettingsRepository::new(pool)),
        }
    }
}

// =========================================================================
//  ESTADO DA APLICAÇÃO
// =========================================================================

#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub client_service: ClientService,
    pub rbac_service: RbacService,
    pub finance_service: FinanceService,
    pub document_service: DocumentService,
    pub backup_service: BackupService,
    pub patient_service: PatientService,
    pub settings_service: SettingsService,
    pub i18n_store: Arc<I18nStore>,
    pub max_upload_bytes: usize,
}

impl AppState {
    // --- Monta o gráfico de dependências ---
    pub fn new(config: &Config, repos: Repositories, storage: Arc<dyn BlobStorage>) -> Self {
        let auth_service = AuthService::new(repos.users.clone(), repos.rbac.clone(), &config.jwt_secret);
        let user_service = UserService::new(repos.users.clone(), repos.rbac.clone(), auth_service.clone());
        let client_service = ClientService::new(
            repos.clients.clone(),
            repos.sessions.clone(),
            storage.clone(),
        );
        let rbac_service = RbacService::new(repos.rbac.clone());
        let finance_service = FinanceService::new(
            repos.finance.clone(),
            repos.clients.clone(),
            repos.sessions.clone(),
            repos.settings.clone(),
            config.fonts_dir.clone(),
        );
        let document_service = DocumentService::new(
            repos.documents.clone(),
            storage.clone(),
            config.jwt_secret.as_str(),
            config.public_base_url.as_str(),
            config.download_link_ttl_secs,
        );
        let backup_service = BackupService::new(repos.backups.clone(), storage, document_service.links());
        let patient_service = PatientService::new(repos.patients.clone());
        let settings_service = SettingsService::new(repos.settings);

        Self {
            auth_service,
            user_service,
            client_service,
            rbac_service,
            finance_service,
            document_service,
            backup_service,
            patient_service,
            settings_service,
            i18n_store: Arc::new(I18nStore::new()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
