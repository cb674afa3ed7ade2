//! Request pipeline: validate, resolve a route, load models, translate.
//!
//! `TranslationEngine` runs one model over one text: it makes sure the model
//! is loaded, waits for a generation permit and runs the chunked translator on
//! the blocking pool. `TranslationService` sits on top and walks a request
//! through the route decision (same, direct or bridge).

use crate::bridge::translate_bridged;
use crate::chunking::ChunkedTranslator;
use crate::error::{error_chain, LanguageRole, TranslateError, ValidationError};
use crate::i18n::{Language, LanguageDisplay, LanguageRegistry};
use crate::metrics::TranslationMetrics;
use crate::models::{GenerationConfig, ModelCache, ModelLoader};
use crate::routing::{ModelCatalog, ModelId, RouteDecision, RouteResolver, TranslationMethod};
use anyhow::anyhow;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// A validated translation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub source: Language,
    pub target: Language,
}

impl TranslationRequest {
    /// Validate raw request fields.
    ///
    /// Checks run in order: empty text, missing language, unsupported source,
    /// unsupported target. The first failing check is reported.
    pub fn parse(
        text: &str,
        source_lang: &str,
        target_lang: &str,
        registry: &LanguageRegistry,
    ) -> Result<Self, ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        if source_lang.trim().is_empty() || target_lang.trim().is_empty() {
            return Err(ValidationError::MissingLanguage);
        }

        let source = Language::parse(source_lang, LanguageRole::Source, registry)?;
        let target = Language::parse(target_lang, LanguageRole::Target, registry)?;

        Ok(Self {
            text: text.to_string(),
            source,
            target,
        })
    }
}

/// Successful translation, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    pub input: String,
    pub translated: String,
    pub method: TranslationMethod,
    pub source_language: LanguageDisplay,
    pub target_language: LanguageDisplay,
}

/// Runs a single model over text with bounded generation concurrency.
#[derive(Clone)]
pub struct TranslationEngine {
    cache: Arc<ModelCache>,
    translator: ChunkedTranslator,
    permits: Arc<Semaphore>,
}

impl TranslationEngine {
    /// # Panics
    /// Panics if `max_concurrent` is 0.
    pub fn new(cache: Arc<ModelCache>, translator: ChunkedTranslator, max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be at least 1");
        Self {
            cache,
            translator,
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Load `model_id` if needed and translate `text` with it.
    pub async fn run(&self, model_id: &ModelId, text: &str) -> Result<String, TranslateError> {
        let entry = self.cache.ensure_loaded(model_id).await?;

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| TranslateError::Translation {
                stage: None,
                cause: anyhow!("generation pool closed: {}", e),
            })?;

        let translator = self.translator;
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            translator.translate(&text, &entry)
        })
        .await
        .map_err(|e| TranslateError::Translation {
            stage: None,
            cause: anyhow::Error::new(e).context("Translation task panicked"),
        })?
    }
}

/// Entry point for translation requests.
pub struct TranslationService {
    registry: Arc<LanguageRegistry>,
    resolver: RouteResolver,
    engine: TranslationEngine,
    metrics: Arc<TranslationMetrics>,
}

impl TranslationService {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        resolver: RouteResolver,
        engine: TranslationEngine,
        metrics: Arc<TranslationMetrics>,
    ) -> Self {
        Self {
            registry,
            resolver,
            engine,
            metrics,
        }
    }

    /// Service over the built-in languages and OPUS-MT catalog.
    pub fn with_loader(
        loader: Arc<dyn ModelLoader>,
        cache_capacity: usize,
        max_concurrent: usize,
    ) -> Self {
        let registry = Arc::new(LanguageRegistry::default());
        let resolver = RouteResolver::for_registry(Arc::new(ModelCatalog::opus_mt()), &registry);
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = Arc::new(ModelCache::with_metrics(loader, cache_capacity, metrics.clone()));
        let engine = TranslationEngine::new(
            cache,
            ChunkedTranslator::new(GenerationConfig::default()),
            max_concurrent,
        );

        Self::new(registry, resolver, engine, metrics)
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &TranslationEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<TranslationMetrics> {
        &self.metrics
    }

    pub async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResult, TranslateError> {
        let outcome = self.run(request).await;
        match &outcome {
            Ok(result) => self.metrics.record_translation(result.method),
            Err(e) => {
                self.metrics.record_translation_failure();
                warn!(
                    "✗ {} -> {} failed: {}",
                    request.source,
                    request.target,
                    error_chain(e)
                );
            }
        }
        outcome
    }

    async fn run(&self, request: &TranslationRequest) -> Result<TranslationResult, TranslateError> {
        let route = self.resolver.resolve(request.source, request.target)?;
        let method = route.method();
        info!(
            "Translating {} -> {} ({}, {} chars)",
            request.source,
            request.target,
            method,
            request.text.chars().count()
        );

        let translated = match &route {
            RouteDecision::Same => request.text.clone(),
            RouteDecision::Direct { model } => self.engine.run(model, &request.text).await?,
            RouteDecision::Bridge { first, second } => {
                translate_bridged(&self.engine, &request.text, first, second).await?
            }
        };

        Ok(TranslationResult {
            input: request.text.clone(),
            translated,
            method,
            source_language: self.display(request.source),
            target_language: self.display(request.target),
        })
    }

    fn display(&self, language: Language) -> LanguageDisplay {
        self.registry
            .get(language)
            .map(|config| config.display())
            .unwrap_or(LanguageDisplay {
                name: language.code(),
                flag: "",
            })
    }
}
