use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use http::HeaderValue;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info};

use storefront_api as api;
use api::config::{AppConfig, CatalogBackend};
use api::repositories::{
    CatalogRepository, FixtureCatalogRepository, InMemoryUserRepository, SeaOrmCatalogRepository,
    SeaOrmUserRepository, UserRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let (catalog_repo, user_repo) = init_repositories(&cfg).await?;
    let state = api::AppState::new(cfg.clone(), catalog_repo, user_repo)
        .context("failed to build application state")?;

    if let Some((email, password)) = cfg.admin_credentials() {
        state
            .auth
            .ensure_admin(&cfg.admin_name, email, password)
            .await
            .context("failed to bootstrap admin account")?;
    }

    let cors_layer = build_cors_layer(&cfg)?;
    let app = api::build_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs)))
        .layer(CompressionLayer::new())
        .layer(cors_layer);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        environment = %cfg.environment,
        catalog = %cfg.catalog_backend,
        "storefront-api listening"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn init_repositories(
    cfg: &AppConfig,
) -> anyhow::Result<(Arc<dyn CatalogRepository>, Arc<dyn UserRepository>)> {
    match cfg.catalog_backend {
        CatalogBackend::Fixtures => {
            let catalog = FixtureCatalogRepository::load(&cfg.fixtures_dir)
                .await
                .with_context(|| {
                    format!("failed to load fixtures from {}", cfg.fixtures_dir.display())
                })?;
            Ok((Arc::new(catalog), Arc::new(InMemoryUserRepository::new())))
        }
        CatalogBackend::Database => {
            let db_pool = api::db::establish_connection_from_app_config(cfg).await?;
            api::db::check_connection(&db_pool)
                .await
                .context("database did not answer a trivial query")?;
            if cfg.auto_migrate {
                api::migrator::run_migrations(&db_pool).await.map_err(|e| {
                    error!("Failed running migrations: {}", e);
                    e
                })?;
            }
            let db = Arc::new(db_pool);
            Ok((
                Arc::new(SeaOrmCatalogRepository::new(db.clone())),
                Arc::new(SeaOrmUserRepository::new(db)),
            ))
        }
    }
}

fn build_cors_layer(cfg: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        return Ok(CorsLayer::permissive());
    }

    error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
    anyhow::bail!(
        "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
