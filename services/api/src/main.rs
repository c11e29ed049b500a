use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use veritas_api::config::Config;
use veritas_api::{AppState, app};
use veritas_core::catalogue::StaticCatalogue;
use veritas_core::completion;
use veritas_core::engine::{DecisionEngine, EngineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load server configuration")?;

    // RUST_LOG may also carry per-target directives; the parsed level is the fallback.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(config.log_level).into())
                .from_env_lossy(),
        )
        .init();

    let catalogue = match &config.catalogue_path {
        Some(path) => StaticCatalogue::load(path)
            .with_context(|| format!("Failed to load catalogue from {}", path.display()))?,
        None => StaticCatalogue::builtin(),
    };

    let completion = completion::connect(
        config.provider,
        config.openai_api_key.as_ref(),
        config.gemini_api_key.as_ref(),
        &config.chat_model,
    )?;
    let engine = DecisionEngine::new(completion).with_config(EngineConfig {
        completion_timeout: config.completion_timeout,
        ..EngineConfig::default()
    });

    let router = app(AppState {
        catalogue: Arc::new(catalogue),
        engine: Arc::new(engine),
    });

    info!("Starting Veritas API, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    axum::serve(listener, router).await?;

    Ok(())
}
