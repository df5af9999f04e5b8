pub mod auth;
pub mod backup;
pub mod client;
pub mod document;
pub mod finance;
pub mod patient;
pub mod rbac;
pub mod settings;
