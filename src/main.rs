//! Van Assignment - Axum server
//!
//! Run with: cargo run
//! Demo mode (no backend needed): VAN_DEMO=SMALL cargo run

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use van_assignment::api::{self, AppState};
use van_assignment::backend::{Backend, HttpBackend, InMemoryBackend};
use van_assignment::config::Config;
use van_assignment::demo_data;
use van_assignment::domain::RosterDate;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    match config.demo {
        Some(demo) => {
            let backend = Arc::new(InMemoryBackend::new());
            let today = RosterDate::new(chrono::Local::now().date_naive());
            demo_data::seed(&backend, demo, today);
            info!(preset = demo.as_str(), %today, "demo mode, in-memory backend seeded");
            serve(backend, config).await;
        }
        None => {
            let backend = Arc::new(HttpBackend::new(config.backend_base_url.clone()));
            serve(backend, config).await;
        }
    }
}

async fn serve<B: Backend + 'static>(backend: Arc<B>, config: Config) {
    let state = Arc::new(AppState::new(
        backend,
        config.dsp_code.clone(),
        config.default_status_id.clone(),
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await.unwrap();
    info!(addr = %config.listen_addr, dsp = %config.dsp_code, "listening");
    axum::serve(listener, app).await.unwrap();
}
