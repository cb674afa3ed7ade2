//! Model artifact download.
//!
//! Each model lives in `{models_dir}/{model_id}/`. Missing files are fetched
//! from `{hub_url}/{model_id}/resolve/{revision}/{file}`, streamed into a
//! `.part` file and renamed once complete.

use crate::routing::ModelId;
use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Files a Marian model directory must contain.
pub const REQUIRED_FILES: [&str; 4] = [
    "config.json",
    "model.safetensors",
    "source.spm",
    "vocab.json",
];

#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
    models_dir: PathBuf,
    hub_url: String,
    revision: String,
    offline: bool,
}

impl ArtifactFetcher {
    pub fn new(
        models_dir: impl Into<PathBuf>,
        hub_url: impl Into<String>,
        revision: impl Into<String>,
        offline: bool,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            models_dir: models_dir.into(),
            hub_url: hub_url.into().trim_end_matches('/').to_string(),
            revision: revision.into(),
            offline,
        }
    }

    /// Local directory for a model.
    pub fn model_dir(&self, model_id: &ModelId) -> PathBuf {
        self.models_dir.join(model_id.as_str())
    }

    /// Make sure every required artifact exists locally and return the directory.
    pub async fn ensure_local(&self, model_id: &ModelId) -> Result<PathBuf> {
        let dir = self.model_dir(model_id);
        let missing: Vec<&str> = REQUIRED_FILES
            .iter()
            .copied()
            .filter(|file| !dir.join(file).is_file())
            .collect();

        if missing.is_empty() {
            debug!("All artifacts present for {}", model_id);
            return Ok(dir);
        }

        if self.offline {
            bail!(
                "Model {} is missing {} in {} and downloads are disabled",
                model_id,
                missing.join(", "),
                dir.display()
            );
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for file in missing {
            self.download(model_id, file, &dir).await?;
        }

        Ok(dir)
    }

    /// Fetch artifacts for every model in `models`, at most `concurrency` at a
    /// time. One outcome per model, in completion order.
    pub async fn ensure_all(
        &self,
        models: Vec<ModelId>,
        concurrency: usize,
    ) -> Vec<(ModelId, Result<PathBuf>)> {
        stream::iter(models)
            .map(|model_id| async move {
                let outcome = self.ensure_local(&model_id).await;
                (model_id, outcome)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    fn url_for(&self, model_id: &ModelId, file: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.hub_url, model_id, self.revision, file
        )
    }

    async fn download(&self, model_id: &ModelId, file: &str, dir: &Path) -> Result<()> {
        let url = self.url_for(model_id, file);
        info!("Downloading {}", url);

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Download of {} failed with status {}", url, status);
        }

        let target = dir.join(file);
        let partial = dir.join(format!("{}.part", file));
        let mut out = tokio::fs::File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;

        let mut written = 0usize;
        let streamed = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .with_context(|| format!("Failed to read body of {}", url))?
            {
                out.write_all(&chunk).await?;
                written += chunk.len();
            }
            out.flush().await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = streamed {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        drop(out);

        tokio::fs::rename(&partial, &target)
            .await
            .with_context(|| format!("Failed to move {} into place", partial.display()))?;

        info!("✓ {} ({} bytes)", target.display(), written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const MODEL: &str = "Helsinki-NLP/opus-mt-tr-en";

    fn model() -> ModelId {
        ModelId::new(MODEL)
    }

    async fn mount_all(server: &MockServer) {
        for file in REQUIRED_FILES {
            Mock::given(method("GET"))
                .and(path(format!("/{}/resolve/main/{}", MODEL, file)))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!("contents of {}", file)))
                .expect(1)
                .mount(server)
                .await;
        }
    }

    // ==================== Download Tests ====================

    #[tokio::test]
    async fn test_downloads_missing_files() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let dir = TempDir::new().unwrap();

        let fetcher = ArtifactFetcher::new(dir.path(), server.uri(), "main", false);
        let model_dir = fetcher.ensure_local(&model()).await.unwrap();

        assert_eq!(model_dir, dir.path().join(MODEL));
        for file in REQUIRED_FILES {
            let contents = std::fs::read_to_string(model_dir.join(file)).unwrap();
            assert_eq!(contents, format!("contents of {}", file));
            assert!(!model_dir.join(format!("{}.part", file)).exists());
        }
    }

    #[tokio::test]
    async fn test_present_files_are_not_downloaded_again() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let dir = TempDir::new().unwrap();
        let fetcher = ArtifactFetcher::new(dir.path(), server.uri(), "main", false);

        fetcher.ensure_local(&model()).await.unwrap();
        fetcher.ensure_local(&model()).await.unwrap();
        // `expect(1)` on each mock is verified when the server drops
    }

    #[tokio::test]
    async fn test_only_missing_files_are_fetched() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join(MODEL);
        std::fs::create_dir_all(&model_dir).unwrap();
        for file in ["config.json", "source.spm", "vocab.json"] {
            std::fs::write(model_dir.join(file), "local").unwrap();
        }

        Mock::given(method("GET"))
            .and(path(format!("/{}/resolve/main/model.safetensors", MODEL)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ArtifactFetcher::new(dir.path(), server.uri(), "main", false);
        fetcher.ensure_local(&model()).await.unwrap();

        assert_eq!(std::fs::read(model_dir.join("model.safetensors")).unwrap(), vec![1, 2, 3]);
        assert_eq!(std::fs::read_to_string(model_dir.join("config.json")).unwrap(), "local");
    }

    #[tokio::test]
    async fn test_uses_configured_revision() {
        let server = MockServer::start().await;
        for file in REQUIRED_FILES {
            Mock::given(method("GET"))
                .and(path(format!("/{}/resolve/v1.2/{}", MODEL, file)))
                .respond_with(ResponseTemplate::new(200).set_body_string("x"))
                .mount(&server)
                .await;
        }
        let dir = TempDir::new().unwrap();

        let fetcher = ArtifactFetcher::new(dir.path(), format!("{}/", server.uri()), "v1.2", false);
        assert!(fetcher.ensure_local(&model()).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_all_fetches_each_model_and_reports_failures() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        Mock::given(method("GET"))
            .and(path("/Helsinki-NLP/opus-mt-xx-yy/resolve/main/config.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let fetcher = ArtifactFetcher::new(dir.path(), server.uri(), "main", false);

        let missing = ModelId::new("Helsinki-NLP/opus-mt-xx-yy");
        let mut outcomes = fetcher.ensure_all(vec![model(), missing.clone()], 2).await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, model());
        assert_eq!(outcomes[0].1.as_ref().unwrap(), &dir.path().join(MODEL));
        assert_eq!(outcomes[1].0, missing);
        assert!(outcomes[1].1.is_err());
    }

    // ==================== Failure Tests ====================

    #[tokio::test]
    async fn test_non_success_status_fails_without_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let fetcher = ArtifactFetcher::new(dir.path(), server.uri(), "main", false);
        let err = fetcher.ensure_local(&model()).await.unwrap_err();

        assert!(err.to_string().contains("404"), "{}", err);
        let model_dir = dir.path().join(MODEL);
        assert!(!model_dir.join("config.json").exists());
        assert!(!model_dir.join("config.json.part").exists());
    }

    #[tokio::test]
    async fn test_offline_mode_never_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let fetcher = ArtifactFetcher::new(dir.path(), server.uri(), "main", true);
        let err = fetcher.ensure_local(&model()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("downloads are disabled"), "{}", message);
        assert!(message.contains("model.safetensors"), "{}", message);
    }

    #[tokio::test]
    async fn test_offline_mode_accepts_complete_directory() {
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join(MODEL);
        std::fs::create_dir_all(&model_dir).unwrap();
        for file in REQUIRED_FILES {
            std::fs::write(model_dir.join(file), "local").unwrap();
        }

        let fetcher = ArtifactFetcher::new(dir.path(), "http://127.0.0.1:9", "main", true);
        assert_eq!(fetcher.ensure_local(&model()).await.unwrap(), model_dir);
    }
}
