use std::time::Duration;

use anyhow::Context;
use axum::{http::HeaderValue, Router};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::{Any, CorsLayer}};
use tracing_subscriber::EnvFilter;

use delivery_api::config::{AppConfig, DatabaseConfig};
use delivery_api::handlers::AppState;
use delivery_api::repository::RepositoryFactory;
use delivery_api::routes::{app, registrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,axum=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).compact().init();

    let cfg = match AppConfig::load() { Ok(c) => c, Err(e) => { eprintln!("Configuration error: {}", e); std::process::exit(1); } };

    let pool = match &cfg.database {
        Some(db) => connect_postgres(db).await,
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory storage");
            None
        }
    };

    // DI wiring: choose repositories based on DB availability
    let repos = match pool {
        Some(ref p) => RepositoryFactory::postgres(p.clone()),
        None => RepositoryFactory::in_memory(),
    };
    let state = AppState::new(repos, pool);

    let router: Router = app(state, registrations()).layer(
        ServiceBuilder::new()
            .layer(CompressionLayer::new())
            .layer(cors_layer(&cfg.cors_origins)),
    );

    let addr = cfg.socket_addr();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

/// Connect and migrate; `None` means the caller should fall back to memory.
async fn connect_postgres(db: &DatabaseConfig) -> Option<PgPool> {
    let pool = match PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db.url)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "Postgres not available; starting with in-memory storage");
            return None;
        }
    };
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!(error = %e, "migrations failed; starting with in-memory storage");
        return None;
    }
    tracing::info!(max_connections = db.max_connections, "using Postgres storage");
    Some(pool)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => { term.recv().await; }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    tracing::info!("shutdown signal received");
}
