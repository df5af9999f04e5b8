// src/testing.rs
//
// Banco e storage em memória para os testes dos serviços e do router.
// Um único `InMemoryDb` implementa todos os traits de repositório sobre as
// mesmas tabelas, imitando as constraints do Postgres que os serviços usam.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{matches_search, Page, Pagination},
    },
    config::{Config, Repositories},
    db::{
        BackupRepository, ClientRepository, DocumentRepository, FinanceRepository,
        PatientRepository, RbacRepository, SessionRepository, SettingsRepository, UserRepository,
    },
    models::{
        auth::{NewUser, UpdateUserPayload, User, UserFilters, SUPERADMIN_ROLE},
        backup::{AutoBackupPolicy, Backup, BackupFilters, BackupType, NewBackup, UpdateBackupPolicyPayload},
        client::{
            Client, ClientFilters, ClientStatus, ClientSummary, Conclusion, CreateClientPayload,
            NewConclusion, Session, SessionStatus, UpdateClientPayload,
        },
        document::{Document, DocumentFilters, NewDocument},
        finance::{Facture, FactureFilters, FactureStatus, NewFacture, Payment, PaymentReceipt},
        patient::{Patient, PatientFilters, PatientPayload, QueueStatus},
        rbac::{Permission, PermissionAssignmentRow, PermissionModule, Role, RolePermission},
        settings::{AppSettings, UpdateSettingsRequest},
    },
    storage::BlobStorage,
};

pub const MODULES: &[&str] = &[
    "clients", "sessions", "factures", "documents", "patients", "users", "roles", "backups",
    "settings",
];

#[derive(Default)]
pub struct Tables {
    pub modules: Vec<PermissionModule>,
    pub permissions: Vec<Permission>,
    pub roles: Vec<Role>,
    pub role_permissions: Vec<RolePermission>,
    pub users: Vec<User>,
    pub clients: Vec<Client>,
    pub sessions: Vec<Session>,
    pub conclusions: Vec<Conclusion>,
    pub factures: Vec<Facture>,
    pub payments: Vec<Payment>,
    pub patients: Vec<Patient>,
    pub documents: Vec<Document>,
    pub backups: Vec<Backup>,
    pub policy: AutoBackupPolicy,
    pub settings: AppSettings,
}

#[derive(Default)]
pub struct InMemoryDb {
    pub tables: Mutex<Tables>,
    writes: AtomicUsize,
    fail_document_inserts: AtomicBool,
}

impl InMemoryDb {
    /// Mesmo seed da migração: módulos, permissões read/write e os cargos
    /// SUPERADMIN (sistema) e COMMERCIAL.
    pub fn seeded() -> Arc<Self> {
        let mut tables = Tables::default();
        for name in MODULES {
            let module = PermissionModule {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: None,
                created_at: Utc::now(),
            };
            for action in ["read", "write"] {
                tables.permissions.push(Permission {
                    id: Uuid::new_v4(),
                    module_id: module.id,
                    slug: format!("{name}:{action}"),
                    description: format!("{action} {name}"),
                });
            }
            tables.modules.push(module);
        }
        tables.roles.push(role(SUPERADMIN_ROLE, true));
        tables.roles.push(role("COMMERCIAL", false));

        Arc::new(Self {
            tables: Mutex::new(tables),
            ..Default::default()
        })
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            users: self.clone(),
            clients: self.clone(),
            sessions: self.clone(),
            rbac: self.clone(),
            finance: self.clone(),
            documents: self.clone(),
            backups: self.clone(),
            patients: self.clone(),
            settings: self.clone(),
        }
    }

    /// Quantas chamadas de escrita chegaram ao "banco".
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_document_inserts(&self) {
        self.fail_document_inserts.store(true, Ordering::SeqCst);
    }

    fn touch(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    // --- helpers de montagem ---

    pub async fn role_named(&self, name: &str) -> Role {
        self.tables
            .lock()
            .await
            .roles
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .expect("role seeded")
    }

    pub async fn permission(&self, slug: &str) -> Permission {
        self.tables
            .lock()
            .await
            .permissions
            .iter()
            .find(|p| p.slug == slug)
            .cloned()
            .expect("permission seeded")
    }

    pub async fn add_user(&self, email: &str, role_name: &str) -> User {
        let role = self.role_named(role_name).await;
        let user = user(email, "unused-hash", &role);
        self.tables.lock().await.users.push(user.clone());
        user
    }

    pub async fn add_client(&self, nom: &str, assigned_to: Option<Uuid>) -> Client {
        let client = client(nom, assigned_to);
        self.tables.lock().await.clients.push(client.clone());
        client
    }

    pub async fn add_session(&self, client_id: Uuid, status: SessionStatus) -> Session {
        let session = Session {
            id: Uuid::new_v4(),
            client_id,
            service: "VisaCanada".to_string(),
            status,
            created_at: Utc::now(),
            closed_at: (status == SessionStatus::Closed).then(Utc::now),
            conclusions: Vec::new(),
        };
        self.tables.lock().await.sessions.push(session.clone());
        session
    }

    pub async fn add_patient(&self, first_name: &str, last_name: &str) -> Patient {
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone: None,
            email: None,
            birth_date: None,
            queue_status: None,
            arrived_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.patients.push(patient.clone());
        patient
    }

    pub async fn add_backup(
        &self,
        name: &str,
        backup_type: BackupType,
        created_at: DateTime<Utc>,
    ) -> Backup {
        let backup = Backup {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            backup_type,
            storage_key: format!("backups/{name}.json"),
            size_bytes: 2,
            created_at,
        };
        self.tables.lock().await.backups.push(backup.clone());
        backup
    }
}

pub fn role(name: &str, is_system: bool) -> Role {
    Role {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        is_system,
        created_at: Utc::now(),
    }
}

pub fn user(email: &str, password_hash: &str, role: &Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        first_name: "Amina".to_string(),
        last_name: "Benali".to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role_id: role.id,
        role: role.name.clone(),
        is_suspended: false,
        service: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn client(nom: &str, assigned_to: Option<Uuid>) -> Client {
    let now = Utc::now();
    Client {
        id: Uuid::new_v4(),
        nom: nom.to_string(),
        numero: "+212600000000".to_string(),
        email: None,
        service: "VisaCanada".to_string(),
        status: ClientStatus::Lead,
        step: None,
        assigned_to,
        commentaire: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: "test-secret".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        storage_dir: std::env::temp_dir(),
        fonts_dir: std::env::temp_dir(),
        public_base_url: "http://localhost:3000".to_string(),
        download_link_ttl_secs: 300,
        bootstrap_admin: None,
        backup_scheduler_enabled: false,
        max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
    }
}

// =========================================================================
//  USERS
// =========================================================================

#[async_trait]
impl UserRepository for InMemoryDb {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn count(&self) -> Result<i64, AppError> {
        Ok(self.tables.lock().await.users.len() as i64)
    }

    async fn list(&self, filters: &UserFilters, pagination: Pagination) -> Result<Page<User>, AppError> {
        let t = self.tables.lock().await;
        let mut items: Vec<User> = t
            .users
            .iter()
            .filter(|u| {
                let full_name = format!("{} {}", u.first_name, u.last_name);
                matches_search(filters.search.as_deref(), &[full_name.as_str(), u.email.as_str()])
                    && filters.role_id.is_none_or(|r| u.role_id == r)
                    && filters.is_suspended.is_none_or(|s| u.is_suspended == s)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pagination.slice(items))
    }

    async fn create(&self, input: NewUser) -> Result<User, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(&input.email)) {
            return Err(AppError::EmailAlreadyExists);
        }
        let role = t
            .roles
            .iter()
            .find(|r| r.id == input.role_id)
            .cloned()
            .ok_or(AppError::NotFound("role"))?;
        let mut created = user(&input.email, &input.password_hash, &role);
        created.first_name = input.first_name;
        created.last_name = input.last_name;
        created.service = input.service;
        t.users.push(created.clone());
        Ok(created)
    }

    async fn update_profile(&self, id: Uuid, input: &UpdateUserPayload) -> Result<Option<User>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let user = t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.first_name = input.first_name.clone();
            u.last_name = input.last_name.clone();
            u.service = input.service.clone();
            u.updated_at = Utc::now();
            u.clone()
        });
        Ok(user)
    }

    async fn set_role(&self, id: Uuid, role_id: Uuid) -> Result<Option<User>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let role = t
            .roles
            .iter()
            .find(|r| r.id == role_id)
            .cloned()
            .ok_or(AppError::NotFound("role"))?;
        let user = t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role_id = role.id;
            u.role = role.name.clone();
            u.clone()
        });
        Ok(user)
    }

    async fn set_suspended(&self, id: Uuid, is_suspended: bool) -> Result<Option<User>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.is_suspended = is_suspended;
            u.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let holds_active_session = t.clients.iter().any(|c| {
            c.assigned_to == Some(id)
                && t.sessions.iter().any(|s| s.client_id == c.id && s.is_active())
        });
        if holds_active_session {
            return Ok(false);
        }
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        for client in t.clients.iter_mut().filter(|c| c.assigned_to == Some(id)) {
            client.assigned_to = None;
        }
        Ok(t.users.len() < before)
    }
}

// =========================================================================
//  CLIENTS
// =========================================================================

#[async_trait]
impl ClientRepository for InMemoryDb {
    async fn list(&self, filters: &ClientFilters, pagination: Pagination) -> Result<Page<Client>, AppError> {
        let t = self.tables.lock().await;
        let mut items: Vec<Client> = t
            .clients
            .iter()
            .filter(|c| {
                matches_search(
                    filters.search.as_deref(),
                    &[c.nom.as_str(), c.numero.as_str(), c.email.as_deref().unwrap_or("")],
                ) && filters.status.is_none_or(|s| c.status == s)
                    && filters.assigned_to.is_none_or(|a| c.assigned_to == Some(a))
                    && filters.service.as_ref().is_none_or(|s| &c.service == s)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pagination.slice(items))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, input: &CreateClientPayload) -> Result<Client, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if let Some(user_id) = input.assigned_to {
            if !t.users.iter().any(|u| u.id == user_id) {
                return Err(AppError::NotFound("user"));
            }
        }
        let mut created = client(input.nom.trim(), input.assigned_to);
        created.numero = input.numero.trim().to_string();
        created.email = input.email.clone();
        created.service = input.service.clone();
        created.status = input.status.unwrap_or(ClientStatus::Lead);
        created.step = input.step.clone();
        created.commentaire = input.commentaire.clone();
        t.clients.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, input: &UpdateClientPayload) -> Result<Option<Client>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.clients.iter_mut().find(|c| c.id == id).map(|c| {
            c.nom = input.nom.trim().to_string();
            c.numero = input.numero.trim().to_string();
            c.email = input.email.clone();
            c.service = input.service.clone();
            c.step = input.step.clone();
            c.commentaire = input.commentaire.clone();
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ClientStatus,
        step: Option<&str>,
    ) -> Result<Option<Client>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.clients.iter_mut().find(|c| c.id == id).map(|c| {
            c.status = status;
            c.step = step.map(str::to_string);
            c.clone()
        }))
    }

    async fn assign(&self, id: Uuid, assigned_to: Option<Uuid>) -> Result<Option<Client>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if let Some(user_id) = assigned_to {
            if !t.users.iter().any(|u| u.id == user_id) {
                return Err(AppError::NotFound("user"));
            }
        }
        if assigned_to.is_none() && t.sessions.iter().any(|s| s.client_id == id && s.is_active()) {
            return Ok(None);
        }
        Ok(t.clients.iter_mut().find(|c| c.id == id).map(|c| {
            c.assigned_to = assigned_to;
            c.clone()
        }))
    }

    async fn summary(&self, id: Uuid) -> Result<ClientSummary, AppError> {
        let t = self.tables.lock().await;
        let factures: Vec<&Facture> = t.factures.iter().filter(|f| f.client_id == id).collect();
        let total_facture: Decimal = factures.iter().map(|f| f.montant_total).sum();
        let total_paye: Decimal = factures.iter().map(|f| f.montant_paye).sum();
        Ok(ClientSummary {
            sessions_count: t.sessions.iter().filter(|s| s.client_id == id).count() as i64,
            factures_count: factures.len() as i64,
            payments_count: t
                .payments
                .iter()
                .filter(|p| factures.iter().any(|f| f.id == p.facture_id))
                .count() as i64,
            total_facture,
            total_paye,
            total_restant: total_facture - total_paye,
        })
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Vec<String>>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if !t.clients.iter().any(|c| c.id == id) {
            return Ok(None);
        }
        // FK: sessões e faturas bloqueiam
        if t.sessions.iter().any(|s| s.client_id == id) || t.factures.iter().any(|f| f.client_id == id) {
            return Err(AppError::ClientHasDependencies {
                sessions: 0,
                factures: 0,
                payments: 0,
            });
        }
        let keys = t
            .documents
            .iter()
            .filter(|d| d.client_id == Some(id))
            .map(|d| d.storage_key.clone())
            .collect();
        t.documents.retain(|d| d.client_id != Some(id));
        t.clients.retain(|c| c.id != id);
        Ok(Some(keys))
    }
}

// =========================================================================
//  SESSIONS
// =========================================================================

fn with_conclusions(t: &Tables, mut session: Session) -> Session {
    session.conclusions = t
        .conclusions
        .iter()
        .filter(|c| c.session_id == session.id)
        .cloned()
        .collect();
    session
}

#[async_trait]
impl SessionRepository for InMemoryDb {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .map(|s| with_conclusions(&t, s)))
    }

    async fn find_active(&self, client_id: Uuid) -> Result<Option<Session>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.sessions
            .iter()
            .find(|s| s.client_id == client_id && s.is_active())
            .cloned()
            .map(|s| with_conclusions(&t, s)))
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<Session>, AppError> {
        let t = self.tables.lock().await;
        let mut sessions: Vec<Session> = t
            .sessions
            .iter()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .map(|s| with_conclusions(&t, s))
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn create(&self, client_id: Uuid, service: &str) -> Result<Session, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        // idx_client_sessions_one_active
        if t.sessions.iter().any(|s| s.client_id == client_id && s.is_active()) {
            return Err(AppError::ActiveSessionExists);
        }
        let session = Session {
            id: Uuid::new_v4(),
            client_id,
            service: service.to_string(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
            closed_at: None,
            conclusions: Vec::new(),
        };
        t.sessions.push(session.clone());
        Ok(session)
    }

    async fn close(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let closed = t
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.is_active())
            .map(|s| {
                s.status = SessionStatus::Closed;
                s.closed_at = Some(Utc::now());
                s.clone()
            });
        Ok(closed.map(|s| with_conclusions(&t, s)))
    }

    async fn add_conclusion(&self, input: NewConclusion) -> Result<Option<Conclusion>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if !t.sessions.iter().any(|s| s.id == input.session_id && s.is_active()) {
            return Ok(None);
        }
        let conclusion = Conclusion {
            id: Uuid::new_v4(),
            session_id: input.session_id,
            text: input.text,
            reminder_date: input.reminder_date,
            created_by: input.created_by,
            created_at: Utc::now(),
        };
        t.conclusions.push(conclusion.clone());
        Ok(Some(conclusion))
    }
}

// =========================================================================
//  RBAC
// =========================================================================

#[async_trait]
impl RbacRepository for InMemoryDb {
    async fn list_modules(&self) -> Result<Vec<PermissionModule>, AppError> {
        Ok(self.tables.lock().await.modules.clone())
    }

    async fn create_module(&self, name: &str, description: Option<&str>) -> Result<PermissionModule, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if t.modules.iter().any(|m| m.name == name) {
            return Err(AppError::UniqueConstraintViolation("module".into()));
        }
        let module = PermissionModule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        t.modules.push(module.clone());
        Ok(module)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        Ok(self.tables.lock().await.permissions.clone())
    }

    async fn create_permission(
        &self,
        module_id: Uuid,
        slug: &str,
        description: &str,
    ) -> Result<Permission, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if !t.modules.iter().any(|m| m.id == module_id) {
            return Err(AppError::NotFound("module"));
        }
        if t.permissions.iter().any(|p| p.slug == slug) {
            return Err(AppError::UniqueConstraintViolation("permission".into()));
        }
        let permission = Permission {
            id: Uuid::new_v4(),
            module_id,
            slug: slug.to_string(),
            description: description.to_string(),
        };
        t.permissions.push(permission.clone());
        Ok(permission)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        Ok(self.tables.lock().await.roles.clone())
    }

    async fn find_role(&self, id: Uuid) -> Result<Option<Role>, AppError> {
        Ok(self.tables.lock().await.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        Ok(self.tables.lock().await.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if t.roles.iter().any(|r| r.name == name) {
            return Err(AppError::UniqueConstraintViolation("role".into()));
        }
        let mut created = role(name, false);
        created.description = description.map(str::to_string);
        t.roles.push(created.clone());
        Ok(created)
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.role_id == id) {
            return Err(AppError::UniqueConstraintViolation("role in use".into()));
        }
        let before = t.roles.len();
        t.roles.retain(|r| r.id != id || r.is_system);
        let deleted = t.roles.len() < before;
        if deleted {
            t.role_permissions.retain(|rp| rp.role_id != id);
        }
        Ok(deleted)
    }

    async fn permission_rows_for_role(&self, role_id: Uuid) -> Result<Vec<PermissionAssignmentRow>, AppError> {
        let t = self.tables.lock().await;
        let mut rows = Vec::new();
        for module in &t.modules {
            for permission in t.permissions.iter().filter(|p| p.module_id == module.id) {
                let link = t
                    .role_permissions
                    .iter()
                    .find(|rp| rp.role_id == role_id && rp.permission_id == permission.id);
                rows.push(PermissionAssignmentRow {
                    module_id: module.id,
                    module_name: module.name.clone(),
                    module_description: module.description.clone(),
                    permission_id: permission.id,
                    slug: permission.slug.clone(),
                    description: permission.description.clone(),
                    role_permission_uuid: link.map(|rp| rp.id),
                    status: link.map(|rp| rp.status),
                });
            }
        }
        Ok(rows)
    }

    async fn toggle(&self, role_permission_id: Uuid) -> Result<Option<RolePermission>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.role_permissions
            .iter_mut()
            .find(|rp| rp.id == role_permission_id)
            .map(|rp| {
                rp.status = !rp.status;
                rp.updated_at = Utc::now();
                rp.clone()
            }))
    }

    async fn insert_missing(&self, role_id: Uuid) -> Result<u64, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let missing: Vec<Uuid> = t
            .permissions
            .iter()
            .filter(|p| {
                !t.role_permissions
                    .iter()
                    .any(|rp| rp.role_id == role_id && rp.permission_id == p.id)
            })
            .map(|p| p.id)
            .collect();
        let now = Utc::now();
        for permission_id in &missing {
            t.role_permissions.push(RolePermission {
                id: Uuid::new_v4(),
                role_id,
                permission_id: *permission_id,
                status: false,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(missing.len() as u64)
    }

    async fn count_for_role(&self, role_id: Uuid) -> Result<u64, AppError> {
        let t = self.tables.lock().await;
        Ok(t.role_permissions.iter().filter(|rp| rp.role_id == role_id).count() as u64)
    }

    async fn upsert_enabled(&self, role_id: Uuid, permission_id: Uuid) -> Result<RolePermission, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        if !t.permissions.iter().any(|p| p.id == permission_id) {
            return Err(AppError::NotFound("permission"));
        }
        if let Some(rp) = t
            .role_permissions
            .iter_mut()
            .find(|rp| rp.role_id == role_id && rp.permission_id == permission_id)
        {
            rp.status = true;
            rp.updated_at = Utc::now();
            return Ok(rp.clone());
        }
        let now = Utc::now();
        let rp = RolePermission {
            id: Uuid::new_v4(),
            role_id,
            permission_id,
            status: true,
            created_at: now,
            updated_at: now,
        };
        t.role_permissions.push(rp.clone());
        Ok(rp)
    }

    async fn disable(&self, role_id: Uuid, permission_id: Uuid) -> Result<Option<RolePermission>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.role_permissions
            .iter_mut()
            .find(|rp| rp.role_id == role_id && rp.permission_id == permission_id)
            .map(|rp| {
                rp.status = false;
                rp.clone()
            }))
    }

    async fn role_has_permission(&self, role_id: Uuid, slug: &str) -> Result<bool, AppError> {
        let t = self.tables.lock().await;
        Ok(t.role_permissions.iter().any(|rp| {
            rp.role_id == role_id
                && rp.status
                && t.permissions
                    .iter()
                    .any(|p| p.id == rp.permission_id && p.slug == slug)
        }))
    }
}

// =========================================================================
//  FINANCE
// =========================================================================

#[async_trait]
impl FinanceRepository for InMemoryDb {
    async fn list(
        &self,
        filters: &FactureFilters,
        pagination: Pagination,
        today: NaiveDate,
    ) -> Result<Page<Facture>, AppError> {
        let t = self.tables.lock().await;
        let mut items: Vec<Facture> = t
            .factures
            .iter()
            .filter(|f| {
                matches_search(filters.search.as_deref(), &[f.numero_facture.as_str()])
                    && filters.client_id.is_none_or(|c| f.client_id == c)
                    && filters.status.is_none_or(|s| {
                        FactureStatus::derive(f.montant_total, f.montant_paye, f.date_echeance, today) == s
                    })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.date_facture.cmp(&a.date_facture));
        Ok(pagination.slice(items))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facture>, AppError> {
        Ok(self.tables.lock().await.factures.iter().find(|f| f.id == id).cloned())
    }

    async fn create(&self, input: NewFacture) -> Result<Facture, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let year = input.date_facture.format("%Y").to_string();
        let sequence = t
            .factures
            .iter()
            .filter(|f| f.date_facture.format("%Y").to_string() == year)
            .count()
            + 1;
        let facture = Facture {
            id: Uuid::new_v4(),
            client_id: input.client_id,
            session_id: input.session_id,
            numero_facture: format!("FAC-{year}-{sequence:05}"),
            montant_total: input.montant_total,
            montant_paye: Decimal::ZERO,
            montant_restant: Decimal::ZERO,
            status: FactureStatus::Pending,
            date_facture: input.date_facture,
            date_echeance: input.date_echeance,
            created_at: Utc::now(),
        };
        t.factures.push(facture.clone());
        Ok(facture)
    }

    async fn record_payment(
        &self,
        facture_id: Uuid,
        montant: Decimal,
        method: Option<&str>,
    ) -> Result<Option<PaymentReceipt>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let Some(facture) = t
            .factures
            .iter_mut()
            .find(|f| f.id == facture_id && f.montant_paye + montant <= f.montant_total)
        else {
            return Ok(None);
        };
        facture.montant_paye += montant;
        let facture = facture.clone();
        let payment = Payment {
            id: Uuid::new_v4(),
            facture_id,
            montant,
            method: method.map(str::to_string),
            paid_at: Utc::now(),
        };
        t.payments.push(payment.clone());
        Ok(Some(PaymentReceipt { payment, facture }))
    }

    async fn list_payments(&self, facture_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.payments.iter().filter(|p| p.facture_id == facture_id).cloned().collect())
    }
}

// =========================================================================
//  DOCUMENTS
// =========================================================================

#[async_trait]
impl DocumentRepository for InMemoryDb {
    async fn list(&self, filters: &DocumentFilters, pagination: Pagination) -> Result<Page<Document>, AppError> {
        let t = self.tables.lock().await;
        let mut items: Vec<Document> = t
            .documents
            .iter()
            .filter(|d| {
                matches_search(filters.search.as_deref(), &[d.title.as_str(), d.file_name.as_str()])
                    && filters.client_id.is_none_or(|c| d.client_id == Some(c))
                    && filters.patient_id.is_none_or(|p| d.patient_id == Some(p))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pagination.slice(items))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        Ok(self.tables.lock().await.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_batch(&self, documents: Vec<NewDocument>) -> Result<Vec<Document>, AppError> {
        self.touch();
        if self.fail_document_inserts.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(anyhow::anyhow!("insert falhou")));
        }
        let mut t = self.tables.lock().await;
        let inserted: Vec<Document> = documents
            .into_iter()
            .map(|d| Document {
                id: d.id,
                client_id: d.owner.client_id,
                patient_id: d.owner.patient_id,
                title: d.title,
                file_name: d.file_name,
                content_type: d.content_type,
                size_bytes: d.size_bytes,
                storage_key: d.storage_key,
                uploaded_by: d.uploaded_by,
                created_at: Utc::now(),
            })
            .collect();
        t.documents.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let position = t.documents.iter().position(|d| d.id == id);
        Ok(position.map(|i| t.documents.remove(i)))
    }
}

// =========================================================================
//  BACKUPS
// =========================================================================

#[async_trait]
impl BackupRepository for InMemoryDb {
    async fn list(&self, filters: &BackupFilters, pagination: Pagination) -> Result<Page<Backup>, AppError> {
        let t = self.tables.lock().await;
        let mut items: Vec<Backup> = t
            .backups
            .iter()
            .filter(|b| {
                matches_search(
                    filters.search.as_deref(),
                    &[b.name.as_str(), b.description.as_deref().unwrap_or("")],
                ) && filters.backup_type.is_none_or(|ty| b.backup_type == ty)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pagination.slice(items))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Backup>, AppError> {
        Ok(self.tables.lock().await.backups.iter().find(|b| b.id == id).cloned())
    }

    async fn insert(&self, backup: NewBackup) -> Result<Backup, AppError> {
        self.touch();
        let created = Backup {
            id: Uuid::new_v4(),
            name: backup.name,
            description: backup.description,
            backup_type: backup.backup_type,
            storage_key: backup.storage_key,
            size_bytes: backup.size_bytes,
            created_at: Utc::now(),
        };
        self.tables.lock().await.backups.push(created.clone());
        Ok(created)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Backup>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let position = t.backups.iter().position(|b| b.id == id);
        Ok(position.map(|i| t.backups.remove(i)))
    }

    async fn list_auto(&self) -> Result<Vec<Backup>, AppError> {
        let t = self.tables.lock().await;
        let mut backups: Vec<Backup> = t
            .backups
            .iter()
            .filter(|b| b.backup_type == BackupType::Auto)
            .cloned()
            .collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    async fn get_policy(&self) -> Result<AutoBackupPolicy, AppError> {
        Ok(self.tables.lock().await.policy.clone())
    }

    async fn update_policy(&self, input: &UpdateBackupPolicyPayload) -> Result<AutoBackupPolicy, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        t.policy.enabled = input.enabled;
        t.policy.frequency = input.frequency;
        t.policy.time = input.time.clone();
        t.policy.keep_last = input.keep_last;
        Ok(t.policy.clone())
    }

    async fn mark_run(&self, at: DateTime<Utc>) -> Result<(), AppError> {
        self.touch();
        self.tables.lock().await.policy.last_run_at = Some(at);
        Ok(())
    }

    async fn export_snapshot(&self) -> Result<serde_json::Value, AppError> {
        let t = self.tables.lock().await;
        Ok(serde_json::json!({
            "clients": t.clients,
            "client_sessions": t.sessions,
            "factures": t.factures,
            "patients": t.patients,
        }))
    }
}

// =========================================================================
//  PATIENTS
// =========================================================================

#[async_trait]
impl PatientRepository for InMemoryDb {
    async fn list(&self, filters: &PatientFilters, pagination: Pagination) -> Result<Page<Patient>, AppError> {
        let t = self.tables.lock().await;
        let mut items: Vec<Patient> = t
            .patients
            .iter()
            .filter(|p| {
                let full_name = format!("{} {}", p.first_name, p.last_name);
                matches_search(
                    filters.search.as_deref(),
                    &[
                        full_name.as_str(),
                        p.phone.as_deref().unwrap_or(""),
                        p.email.as_deref().unwrap_or(""),
                    ],
                ) && filters.queue_status.is_none_or(|s| p.queue_status == Some(s))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(pagination.slice(items))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, AppError> {
        Ok(self.tables.lock().await.patients.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, input: &PatientPayload) -> Result<Patient, AppError> {
        self.touch();
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            birth_date: input.birth_date,
            queue_status: None,
            arrived_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.patients.push(patient.clone());
        Ok(patient)
    }

    async fn update(&self, id: Uuid, input: &PatientPayload) -> Result<Option<Patient>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.patients.iter_mut().find(|p| p.id == id).map(|p| {
            p.first_name = input.first_name.trim().to_string();
            p.last_name = input.last_name.trim().to_string();
            p.phone = input.phone.clone();
            p.email = input.email.clone();
            p.birth_date = input.birth_date;
            p.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        let before = t.patients.len();
        t.patients.retain(|p| p.id != id);
        Ok(t.patients.len() < before)
    }

    async fn check_in(&self, id: Uuid) -> Result<Option<Patient>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.patients.iter_mut().find(|p| p.id == id).map(|p| {
            p.queue_status = Some(QueueStatus::Waiting);
            p.arrived_at = Some(Utc::now());
            p.clone()
        }))
    }

    async fn set_queue_status(
        &self,
        id: Uuid,
        expected: QueueStatus,
        next: QueueStatus,
    ) -> Result<Option<Patient>, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        Ok(t.patients
            .iter_mut()
            .find(|p| p.id == id && p.queue_status == Some(expected))
            .map(|p| {
                p.queue_status = Some(next);
                p.clone()
            }))
    }

    async fn queue(&self) -> Result<Vec<Patient>, AppError> {
        let t = self.tables.lock().await;
        let mut queue: Vec<Patient> = t
            .patients
            .iter()
            .filter(|p| p.queue_status.is_some() && p.arrived_at.is_some())
            .cloned()
            .collect();
        queue.sort_by_key(|p| p.arrived_at);
        Ok(queue)
    }
}

// =========================================================================
//  SETTINGS
// =========================================================================

#[async_trait]
impl SettingsRepository for InMemoryDb {
    async fn get(&self) -> Result<AppSettings, AppError> {
        Ok(self.tables.lock().await.settings.clone())
    }

    async fn update(&self, input: &UpdateSettingsRequest) -> Result<AppSettings, AppError> {
        self.touch();
        let mut t = self.tables.lock().await;
        t.settings = AppSettings {
            company_name: input.company_name.clone(),
            address: input.address.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            logo_url: input.logo_url.clone(),
            invoice_footer: input.invoice_footer.clone(),
            updated_at: Some(Utc::now()),
        };
        Ok(t.settings.clone())
    }
}

// =========================================================================
//  STORAGE
// =========================================================================

#[derive(Default)]
pub struct InMemoryStorage {
    pub blobs: Mutex<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
    /// Falha no N-ésimo `put` (1-based)
    fail_on_put: Mutex<Option<usize>>,
}

impl InMemoryStorage {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn fail_on_put(&self, nth: usize) {
        *self.fail_on_put.lock().await = Some(nth);
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }
}

#[async_trait]
impl BlobStorage for InMemoryStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_put.lock().await == Some(n) {
            return Err(io::Error::other("disco cheio"));
        }
        self.blobs.lock().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> io::Result<Vec<u8>> {
        self.blobs
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, key.to_string()))
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }
}
