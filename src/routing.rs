//! Route resolution: which model(s) translate a language pair.
//!
//! A pair is served by a direct model when one exists. Otherwise, when neither
//! side is the pivot language and both `source → pivot` and `pivot → target`
//! models exist, the pair is bridged through the pivot. There is a single
//! fixed pivot; no multi-hop search is attempted.

use crate::error::TranslateError;
use crate::i18n::{Language, LanguageRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Name of one pretrained translation model (e.g. `Helsinki-NLP/opus-mt-tr-en`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a request was (or will be) translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationMethod {
    Same,
    Direct,
    Bridge,
}

impl TranslationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationMethod::Same => "same",
            TranslationMethod::Direct => "direct",
            TranslationMethod::Bridge => "bridge",
        }
    }
}

impl fmt::Display for TranslationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of route resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Source and target are the same language; no model is needed.
    Same,
    /// One model translates the pair.
    Direct { model: ModelId },
    /// Two models: `first` is source → pivot, `second` is pivot → target.
    Bridge { first: ModelId, second: ModelId },
}

impl RouteDecision {
    pub fn method(&self) -> TranslationMethod {
        match self {
            RouteDecision::Same => TranslationMethod::Same,
            RouteDecision::Direct { .. } => TranslationMethod::Direct,
            RouteDecision::Bridge { .. } => TranslationMethod::Bridge,
        }
    }

    /// Models needed, in the order they run.
    pub fn models(&self) -> Vec<&ModelId> {
        match self {
            RouteDecision::Same => Vec::new(),
            RouteDecision::Direct { model } => vec![model],
            RouteDecision::Bridge { first, second } => vec![first, second],
        }
    }
}

/// Immutable table of direct models keyed by `(source, target)`.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    direct: HashMap<(Language, Language), ModelId>,
}

impl ModelCatalog {
    /// Build a catalog from `(source, target, model)` entries.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Language, Language, ModelId)>,
    {
        Self {
            direct: entries
                .into_iter()
                .map(|(from, to, model)| ((from, to), model))
                .collect(),
        }
    }

    /// Built-in Helsinki-NLP OPUS-MT models.
    ///
    /// English pairs cover all four other languages; Turkish has no direct model
    /// to German, French or Spanish and is bridged through English.
    pub fn opus_mt() -> Self {
        use Language as L;

        let pairs = [
            (L::TURKISH, L::ENGLISH, "Helsinki-NLP/opus-mt-tr-en"),
            (L::ENGLISH, L::TURKISH, "Helsinki-NLP/opus-mt-en-trk"),
            (L::ENGLISH, L::GERMAN, "Helsinki-NLP/opus-mt-en-de"),
            (L::GERMAN, L::ENGLISH, "Helsinki-NLP/opus-mt-de-en"),
            (L::ENGLISH, L::FRENCH, "Helsinki-NLP/opus-mt-en-fr"),
            (L::FRENCH, L::ENGLISH, "Helsinki-NLP/opus-mt-fr-en"),
            (L::ENGLISH, L::SPANISH, "Helsinki-NLP/opus-mt-en-es"),
            (L::SPANISH, L::ENGLISH, "Helsinki-NLP/opus-mt-es-en"),
            (L::GERMAN, L::FRENCH, "Helsinki-NLP/opus-mt-de-fr"),
            (L::FRENCH, L::GERMAN, "Helsinki-NLP/opus-mt-fr-de"),
            (L::GERMAN, L::SPANISH, "Helsinki-NLP/opus-mt-de-es"),
            (L::SPANISH, L::GERMAN, "Helsinki-NLP/opus-mt-es-de"),
            (L::FRENCH, L::SPANISH, "Helsinki-NLP/opus-mt-fr-es"),
            (L::SPANISH, L::FRENCH, "Helsinki-NLP/opus-mt-es-fr"),
        ];

        Self::new(
            pairs
                .into_iter()
                .map(|(from, to, id)| (from, to, ModelId::new(id))),
        )
    }

    /// Direct model for a pair, if one exists.
    pub fn direct(&self, from: Language, to: Language) -> Option<&ModelId> {
        self.direct.get(&(from, to))
    }

    /// All distinct models in the catalog, sorted by id.
    pub fn models(&self) -> Vec<&ModelId> {
        let mut models: Vec<_> = self.direct.values().collect();
        models.sort();
        models.dedup();
        models
    }

    pub fn len(&self) -> usize {
        self.direct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }
}

/// Decides DIRECT, BRIDGE, SAME or unsupported for a language pair.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    catalog: Arc<ModelCatalog>,
    pivot: Language,
}

impl RouteResolver {
    pub fn new(catalog: Arc<ModelCatalog>, pivot: Language) -> Self {
        Self { catalog, pivot }
    }

    /// Resolver using the registry's pivot language.
    pub fn for_registry(catalog: Arc<ModelCatalog>, registry: &LanguageRegistry) -> Self {
        Self::new(catalog, Language::from_static(registry.pivot().code))
    }

    pub fn pivot(&self) -> Language {
        self.pivot
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Resolve the route for `from → to`.
    ///
    /// Direct lookup always wins over bridging.
    pub fn resolve(&self, from: Language, to: Language) -> Result<RouteDecision, TranslateError> {
        if from == to {
            return Ok(RouteDecision::Same);
        }

        if let Some(model) = self.catalog.direct(from, to) {
            debug!("Direct route {} -> {} via {}", from, to, model);
            return Ok(RouteDecision::Direct {
                model: model.clone(),
            });
        }

        if from != self.pivot && to != self.pivot {
            let first = self.catalog.direct(from, self.pivot);
            let second = self.catalog.direct(self.pivot, to);
            if let (Some(first), Some(second)) = (first, second) {
                debug!(
                    "Bridge route {} -> {} -> {} via {} then {}",
                    from, self.pivot, to, first, second
                );
                return Ok(RouteDecision::Bridge {
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }

        Err(TranslateError::UnsupportedPair {
            from: from.code().to_string(),
            to: to.code().to_string(),
        })
    }
}
