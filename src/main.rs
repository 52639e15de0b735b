mod config;
mod error;
mod handlers;
mod models;
mod services;
mod store;
mod validation;

use config::{Config, StoreBackend};
use ntex::web;
use ntex_cors::Cors;
use std::sync::Arc;
use store::{MemoryStore, SqliteStore, Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
}

/// The full application: state, request logging, CORS and routes. Shared by
/// the server and the HTTP tests so both run the same middleware stack.
macro_rules! leaderboard_app {
    ($state:expr) => {
        web::App::new()
            .state($state)
            .wrap(web::middleware::Logger::default())
            .wrap(
                Cors::new()
                    .allowed_origin("*")
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec!["Content-Type"])
                    .max_age(3600)
                    .finish(),
            )
            .configure(routes)
    };
}

#[ntex::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad config: {}", e))
    })?;

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.database_path)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            log::info!("using sqlite store at {}", config.database_path);
            Arc::new(store)
        }
        StoreBackend::Memory => {
            log::warn!("using in-memory store, runs will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let bind = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState { store, config });

    log::info!("Leaderboard server starting on {}", bind);

    web::HttpServer::new(move || leaderboard_app!(state.clone()))
    .bind(bind)?
    .run()
    .await
}

/// CORS preflights are answered by the `Cors` middleware before routing.
fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(health))
        .service(
            web::resource("/api/submit")
                .route(web::post().to(handlers::runs::submit_run))
                .route(web::route().to(handlers::method_not_allowed)),
        )
        .service(
            web::resource("/api/leaderboard")
                .route(web::get().to(handlers::leaderboard::get_leaderboard))
                .route(web::route().to(handlers::method_not_allowed)),
        );
}

async fn health() -> web::HttpResponse {
    web::HttpResponse::Ok().json(&serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
