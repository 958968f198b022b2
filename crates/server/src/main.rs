use std::net::SocketAddr;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod forms;
mod middleware;
mod routes;
mod services;


use services::storage::MediaStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trueflame_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env();

    let storage = MediaStorage::new(&config.media_path);
    storage.init().await?;

    // Initialize database
    let db = db::Database::connect(&config.database_url).await?;
    db.run_migrations().await?;

    let state = AppState {
        db,
        config: config.clone(),
        storage,
    };
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    let auth = axum_middleware::from_fn_with_state(state.clone(), middleware::auth::auth_middleware);

    // Owner-side routes share the /projects prefix with the public catalog
    let protected_routes = Router::new()
        .merge(routes::manage::router())
        .merge(routes::contents::router(state.config.max_upload_bytes))
        .route_layer(auth.clone());
    let project_routes = protected_routes.merge(routes::catalog::router());

    let admin_routes = routes::projects::protected_router()
        .route_layer(auth)
        .merge(routes::projects::router());

    // Trailing slashes on the prefixes keep each area's "/" route at ".../"
    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/projects/", project_routes)
        .nest("/admin/projects/", admin_routes);

    let media = ServeDir::new(state.storage.base_path());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .nest_service("/media", media)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
    pub storage: MediaStorage,
}
