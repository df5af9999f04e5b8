pub mod auth;
pub mod backup_service;
pub mod client_service;
pub mod document_service;
pub mod facture_pdf;
pub mod finance_service;
pub mod patient_service;
pub mod rbac_service;
pub mod settings_service;
pub mod user_service;
