// src/main.rs

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod router;
mod services;
mod storage;

#[cfg(test)]
mod testing;

use crate::config::{AppState, Config, Repositories};
use crate::services::backup_service::spawn_scheduler;
use crate::storage::LocalStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let pool = config.connect().await?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados")?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let storage = Arc::new(LocalStorage::new(config.storage_dir.clone()));
    let app_state = AppState::new(&config, Repositories::postgres(pool), storage);

    if let Some((email, password)) = &config.bootstrap_admin {
        app_state
            .auth_service
            .bootstrap_admin(email, password)
            .await
            .context("Falha ao criar o administrador inicial")?;
    }

    if config.backup_scheduler_enabled {
        spawn_scheduler(app_state.backup_service.clone());
        tracing::info!("Agendador de backups ativo");
    }

    let app = router::build(app_state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Falha ao escutar em {}", config.bind_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;
    Ok(())
}
