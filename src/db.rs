pub mod backup_repo;
pub use backup_repo::{BackupRepository, PgBackupRepository};
pub mod client_repo;
pub use client_repo::{ClientRepository, PgClientRepository};
pub mod document_repo;
pub use document_repo::{DocumentRepository, PgDocumentRepository};
pub mod finance_repo;
pub use finance_repo::{FinanceRepository, PgFinanceRepository};
pub mod patient_repo;
pub use patient_repo::{PatientRepository, PgPatientRepository};
pub mod rbac_repo;
pub use rbac_repo::{PgRbacRepository, RbacRepository};
pub mod session_repo;
pub use session_repo::{PgSessionRepository, SessionRepository};
pub mod settings_repo;
pub use settings_repo::{PgSettingsRepository, SettingsRepository};
pub mod user_repo;
pub use user_repo::{PgUserRepository, UserRepository};
