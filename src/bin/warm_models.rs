//! Download every catalog model's artifacts into `MODELS_DIR` so the server
//! can start with `MODEL_OFFLINE=true`.

use anyhow::{bail, Result};
use pivot_translate::config::Config;
use pivot_translate::models::ArtifactFetcher;
use pivot_translate::routing::ModelCatalog;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pivot_translate=info".parse()?)
                .add_directive("warm=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let catalog = ModelCatalog::opus_mt();
    let models: Vec<_> = catalog.models().into_iter().cloned().collect();
    let total = models.len();
    info!("Warming {} models into {}", total, config.models_dir.display());

    let fetcher = ArtifactFetcher::new(
        &config.models_dir,
        &config.model_hub_url,
        &config.model_revision,
        config.model_offline,
    );
    let results = fetcher
        .ensure_all(models, config.max_concurrent_translations)
        .await;

    let mut failed = 0;
    for (model_id, outcome) in &results {
        match outcome {
            Ok(dir) => info!("✓ {} ({})", model_id, dir.display()),
            Err(e) => {
                failed += 1;
                error!("✗ {}: {:#}", model_id, e);
            }
        }
    }

    info!("Warm-up complete: {} ready, {} failed", total - failed, failed);
    if failed > 0 {
        bail!("{} of {} models failed to download", failed, total);
    }
    Ok(())
}
