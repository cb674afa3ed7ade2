use anyhow::{Context, Result};
use pivot_translate::config::Config;
use pivot_translate::models::{ArtifactFetcher, MarianLoader};
use pivot_translate::pipeline::TranslationService;
use pivot_translate::server::{self, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pivot_translate=info".parse()?),
        )
        .init();

    info!("Starting pivot-translate server");

    let config = Config::from_env()?;
    info!(
        "Models from {} (hub {}, revision {}, offline: {})",
        config.models_dir.display(),
        config.model_hub_url,
        config.model_revision,
        config.model_offline
    );

    let fetcher = ArtifactFetcher::new(
        &config.models_dir,
        &config.model_hub_url,
        &config.model_revision,
        config.model_offline,
    );
    let service = TranslationService::with_loader(
        Arc::new(MarianLoader::new(fetcher)),
        config.model_cache_capacity,
        config.max_concurrent_translations,
    );
    let languages: Vec<_> = service
        .registry()
        .list_enabled()
        .iter()
        .map(|lang| lang.english_name)
        .collect();
    info!(
        "✓ Languages: {} (pivot: {})",
        languages.join(", "),
        service.registry().pivot().english_name
    );
    info!(
        "✓ {} models in catalog (cache capacity {}, {} concurrent translations)",
        service.resolver().catalog().len(),
        service.engine().cache().capacity(),
        config.max_concurrent_translations
    );
    if config.api_key.is_some() {
        info!("API key required for /translate");
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    server::serve(listener, AppState::new(Arc::new(service), config.api_key)).await
}
