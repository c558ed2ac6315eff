mod config;
mod db;
mod routes;
mod services;
mod state;

use std::process::ExitCode;

use config::AppConfig;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("database init failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("super admin bootstrap failed: {0}")]
    Bootstrap(#[from] services::user::UserError),
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "examhall exited");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;

    if let Some(admin) = &config.bootstrap_admin {
        let id = services::user::ensure_super_admin(&pool, admin).await?;
        tracing::info!(user_id = %id, "super admin ensured");
    } else {
        tracing::warn!("SUPER_ADMIN_EMAIL/SUPER_ADMIN_PASSWORD not set; skipping super admin bootstrap");
    }

    let port = config.port;
    let state = state::AppState::new(pool, config);

    // Background workers: debounced answer writes, timer expiry, idle sessions.
    let _autosave = services::autosave::spawn_autosave_worker(state.clone());
    let _expiry = services::submission::spawn_expiry_sweeper(state.clone());
    let _sessions = services::session::spawn_session_sweeper(state.pool.clone(), state.config.session_idle_timeout);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "examhall listening");
    axum::serve(listener, app).await?;
    Ok(())
}
