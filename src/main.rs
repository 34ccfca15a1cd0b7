use std::net::SocketAddr;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod labels;
mod locales;
mod model;
mod routes;
mod state;
mod tf;
mod utils;

use config::Config;
use locales::LocaleStore;
use model::{Model, ModelError};
use state::AppState;
use utils::ensure_files_exist;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    if let Err(err) = ensure_files_exist(&config).await {
        error!("Could not fetch model artifacts: {:#}", err);
    }

    let model = {
        let config = config.clone();
        load_or_degrade(move || Model::load(&config)).await
    };

    let shared_state = AppState::new(model, LocaleStore::new(&config.static_dir));
    let app = routes::router(shared_state, config.body_limit_bytes);

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_addr()))?;

    info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}

/// Runs the loader off the async runtime. Any failure, a panic included,
/// leaves the server up without a model so the health check can report it.
async fn load_or_degrade<F>(loader: F) -> Option<Model>
where
    F: FnOnce() -> Result<Model, ModelError> + Send + 'static,
{
    match tokio::task::spawn_blocking(loader).await {
        Ok(Ok(model)) => Some(model),
        Ok(Err(err)) => {
            error!("Could not load model, serving in degraded mode: {}", err);
            None
        }
        Err(err) => {
            error!("Model loading task failed, serving in degraded mode: {}", err);
            None
        }
    }
}
