pub mod auth;
pub mod backups;
pub mod clients;
pub mod documents;
pub mod factures;
pub mod patients;
pub mod rbac;
pub mod sessions;
pub mod settings;
pub mod users;
