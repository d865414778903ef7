//! Rollcall Server - HTTP surface for document generation runs
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`auth`]: bearer-token authentication
//! - [`store`]: Postgres `EventStore`
//! - [`routes`]: warp routes, progress streamed as server-sent events

#![warn(unreachable_pub)]

pub mod auth;
pub mod config;
pub mod routes;
pub mod store;

pub use auth::{bearer_token, Authenticator, Principal, StaticTokenAuthenticator, TokenEntry};
pub use config::AppConfig;
pub use routes::{routes, AppState};
pub use store::PgEventStore;

use rollcall_core::{ConfigError, EventStore, RenderLauncher, StorageError, StorageProvider, StoreError};
use rollcall_pipeline::{PipelineError, RunCoordinator};
use rollcall_render::ChromiumServiceLauncher;
use rollcall_storage::DriveClient;
use std::sync::Arc;
use tracing::info;

/// Startup failures
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Event store could not be reached or prepared
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Storage client could not be built
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Coordinator rejected its settings
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Listener could not bind
    #[error("could not bind listener: {0}")]
    Bind(String),
}

/// Build the shared state from configuration
///
/// # Errors
/// - `ServerError::Store` if the database is unreachable or the schema fails
/// - `ServerError::Storage` if the storage client cannot be built
/// - `ServerError::Pipeline` if the pipeline settings are invalid
pub async fn build_state(config: &AppConfig) -> Result<AppState, ServerError> {
    let store = PgEventStore::connect(&config.database).await?;
    if config.database.ensure_schema {
        store.ensure_schema().await?;
    }
    let storage = DriveClient::new(config.drive.clone())?;
    let launcher = ChromiumServiceLauncher::new(config.renderer.clone());

    let coordinator = RunCoordinator::new(
        Arc::new(store) as Arc<dyn EventStore>,
        Arc::new(storage) as Arc<dyn StorageProvider>,
        Arc::new(launcher) as Arc<dyn RenderLauncher>,
        config.pipeline.clone(),
        config.storage.clone(),
    )?;
    let auth = StaticTokenAuthenticator::new(config.auth.tokens.clone());

    Ok(AppState::new(Arc::new(coordinator), Arc::new(auth)))
}

/// Serve until Ctrl-C
///
/// # Errors
/// Any startup failure from [`build_state`], or a bind failure.
pub async fn serve(config: AppConfig) -> Result<(), ServerError> {
    let addr = config.bind_addr()?;
    let state = build_state(&config).await?;

    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async {
            // Ctrl-C errors only if no handler can be installed; shut down then too
            let _ = tokio::signal::ctrl_c().await;
        })
        .map_err(|e| ServerError::Bind(e.to_string()))?;

    info!(addr = %bound, "rollcall server listening");
    server.await;
    info!("rollcall server stopped");
    Ok(())
}
