//! Error kinds for the translation pipeline.
//!
//! Validation failures are produced at the HTTP boundary before the pipeline
//! runs. Everything else is a `TranslateError` raised by the pipeline itself.
//! The boundary decides which status class each kind maps to.

use crate::routing::ModelId;
use serde::Serialize;
use std::fmt;

/// Which leg of a bridged (pivot) translation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStage {
    /// source → pivot
    First,
    /// pivot → target
    Second,
}

impl fmt::Display for BridgeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeStage::First => write!(f, "source to pivot"),
            BridgeStage::Second => write!(f, "pivot to target"),
        }
    }
}

/// Which side of the request a language code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageRole {
    Source,
    Target,
}

impl fmt::Display for LanguageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageRole::Source => write!(f, "Source"),
            LanguageRole::Target => write!(f, "Target"),
        }
    }
}

/// Request rejected before reaching the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Text must not be empty")]
    EmptyText,

    #[error("Both source and target language must be provided")]
    MissingLanguage,

    #[error("{role} language is not supported: {code}")]
    UnsupportedLanguage { role: LanguageRole, code: String },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

/// Failure inside the translation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    /// Neither a direct model nor a route through the pivot exists.
    #[error("Unsupported language pair: {from} -> {to}")]
    UnsupportedPair { from: String, to: String },

    /// Fetching or building a model failed. Nothing is cached, so the next
    /// request for the same model attempts the load again.
    #[error("Failed to load model {model_id}{}", stage_suffix(.stage))]
    ModelLoad {
        model_id: ModelId,
        stage: Option<BridgeStage>,
        #[source]
        cause: anyhow::Error,
    },

    /// Encoding, generation or decoding failed for some chunk.
    #[error("Translation failed{}", stage_suffix(.stage))]
    Translation {
        stage: Option<BridgeStage>,
        #[source]
        cause: anyhow::Error,
    },
}

impl TranslateError {
    /// True for errors the caller can fix by choosing a different request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TranslateError::UnsupportedPair { .. })
    }

    /// Tag a load or translation failure with the bridge leg it happened in.
    pub fn in_stage(self, leg: BridgeStage) -> Self {
        match self {
            TranslateError::ModelLoad {
                model_id, cause, ..
            } => TranslateError::ModelLoad {
                model_id,
                stage: Some(leg),
                cause,
            },
            TranslateError::Translation { cause, .. } => TranslateError::Translation {
                stage: Some(leg),
                cause,
            },
            other => other,
        }
    }

    /// The bridge leg this error is tagged with, if any.
    pub fn stage(&self) -> Option<BridgeStage> {
        match self {
            TranslateError::ModelLoad { stage, .. } | TranslateError::Translation { stage, .. } => {
                *stage
            }
            TranslateError::UnsupportedPair { .. } => None,
        }
    }
}

/// `err` followed by each of its causes, separated by `: `.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn stage_suffix(stage: &Option<BridgeStage>) -> String {
    match stage {
        Some(leg) => format!(" ({} leg)", leg),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_pair_message() {
        let err = TranslateError::UnsupportedPair {
            from: "tr".to_string(),
            to: "xx".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported language pair: tr -> xx");
        assert!(err.is_client_error());
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn test_model_load_message_includes_model_and_cause() {
        let err = TranslateError::ModelLoad {
            model_id: ModelId::new("Helsinki-NLP/opus-mt-tr-en"),
            stage: None,
            cause: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load model Helsinki-NLP/opus-mt-tr-en"
        );
        assert!(!err.is_client_error());

        let source = std::error::Error::source(&err).expect("cause should be the source");
        assert_eq!(source.to_string(), "connection refused");
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let err = TranslateError::ModelLoad {
            model_id: ModelId::new("m"),
            stage: Some(BridgeStage::First),
            cause: anyhow::anyhow!("status 404").context("Failed to fetch artifacts for m"),
        };
        assert_eq!(
            error_chain(&err),
            "Failed to load model m (source to pivot leg): Failed to fetch artifacts for m: status 404"
        );
    }

    #[test]
    fn test_in_stage_tags_translation_failure() {
        let err = TranslateError::Translation {
            stage: None,
            cause: anyhow::anyhow!("generation failed"),
        }
        .in_stage(BridgeStage::Second);

        assert_eq!(err.stage(), Some(BridgeStage::Second));
        assert_eq!(err.to_string(), "Translation failed (pivot to target leg)");
    }

    #[test]
    fn test_in_stage_leaves_unsupported_pair_alone() {
        let err = TranslateError::UnsupportedPair {
            from: "a".to_string(),
            to: "b".to_string(),
        }
        .in_stage(BridgeStage::First);
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::EmptyText.to_string(), "Text must not be empty");
        let err = ValidationError::UnsupportedLanguage {
            role: LanguageRole::Target,
            code: "xx".to_string(),
        };
        assert_eq!(err.to_string(), "Target language is not supported: xx");
    }

    #[test]
    fn test_bridge_stage_serializes_lowercase() {
        let json = serde_json::to_string(&BridgeStage::First).expect("Should serialize");
        assert_eq!(json, "\"first\"");
    }
}
