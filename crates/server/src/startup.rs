use std::{future::Future, sync::Arc, time::Duration};

use axum::Router;
use configs::{AppConfig, AuthConfig, StoreBackend};
use migration::{Migrator, MigratorTrait};
use service::accounts::{
    password::HashParams,
    repo::seaorm::SeaOrmCredentialStore,
    repository::memory::MemoryCredentialStore,
    AccountConfig, AccountService, CredentialStore,
};
use tower_http::cors::CorsLayer;
use tracing::{info, info_span, warn};

use crate::errors::StartupError;
use crate::routes::{self, auth::ServerState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn account_config(auth: &AuthConfig) -> AccountConfig {
    AccountConfig {
        jwt_secret: auth.effective_secret().to_string(),
        token_issuer: auth.token_issuer.clone(),
        token_ttl: Duration::from_secs(auth.token_ttl_secs),
        min_password_length: auth.min_password_length,
        hash_params: HashParams {
            memory_kib: auth.hash_memory_kib,
            iterations: auth.hash_iterations,
            parallelism: auth.hash_parallelism,
        },
    }
}

async fn build_store(cfg: &AppConfig) -> Result<Arc<dyn CredentialStore>, StartupError> {
    match cfg.store.backend {
        StoreBackend::Memory => {
            warn!(backend = "memory", "accounts are kept in memory and lost on restart");
            Ok(Arc::new(MemoryCredentialStore::new(info_span!("credential_store", backend = "memory"))))
        }
        StoreBackend::Postgres => {
            let db = models::db::connect_with_config(&cfg.database)
                .await
                .map_err(|e| StartupError::Database(e.to_string()))?;
            Migrator::up(&db, None)
                .await
                .map_err(|e| StartupError::Database(format!("migration failed: {e}")))?;
            info!(backend = "postgres", "migrations applied");
            Ok(Arc::new(SeaOrmCredentialStore::new(db, info_span!("credential_store", backend = "postgres"))))
        }
    }
}

/// Wire the credential store and account service from configuration.
pub async fn build_state(cfg: &AppConfig) -> Result<ServerState, StartupError> {
    let store = build_store(cfg).await?;

    if cfg.auth.uses_dev_secret() {
        warn!("JWT_SECRET not configured; signing tokens with the development secret");
    }
    let accounts = AccountService::new(store, account_config(&cfg.auth), info_span!("accounts"))
        .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;

    Ok(ServerState {
        accounts: Arc::new(accounts),
        request_timeout: Duration::from_secs(cfg.server.request_timeout_secs),
    })
}

pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let state = build_state(cfg).await?;
    Ok(routes::build_router(state, build_cors()))
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!(event = "shutdown_signal", "received Ctrl+C, draining connections");
}

/// Build the app and serve until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    run_until(cfg, ctrl_c()).await
}

/// Build the app and serve until `shutdown` resolves; in-flight requests
/// are allowed to finish.
pub async fn run_until<F>(cfg: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_app(&cfg).await?;

    let listener = tokio::net::TcpListener::bind((cfg.server.host.as_str(), cfg.server.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, backend = ?cfg.store.backend, "starting account server");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("account server stopped");
    Ok(())
}
