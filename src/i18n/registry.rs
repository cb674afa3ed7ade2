//! Language registry: single source of truth for all supported languages.
//!
//! The registry is an immutable table built once at startup and shared by
//! reference (usually inside an `Arc`) with the route resolver and the HTTP
//! handlers. Nothing mutates it after construction.

use crate::i18n::Language;
use serde::Serialize;

/// Configuration for a supported language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "tr"), always lowercase
    pub code: &'static str,

    /// Display name shown to clients (e.g., "Türkçe", "İngilizce")
    pub name: &'static str,

    /// English name of the language, used in logs
    pub english_name: &'static str,

    /// Flag symbol shown next to the name
    pub flag: &'static str,

    /// Whether this is the pivot language bridged translations go through
    /// (exactly one should be true)
    pub is_pivot: bool,

    /// Whether this language is accepted at the boundary
    pub enabled: bool,
}

impl LanguageConfig {
    /// Display metadata returned to clients.
    pub fn display(&self) -> LanguageDisplay {
        LanguageDisplay {
            name: self.name,
            flag: self.flag,
        }
    }
}

/// `{name, flag}` pair attached to translation responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageDisplay {
    pub name: &'static str,
    pub flag: &'static str,
}

/// Table of supported languages.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

impl LanguageRegistry {
    /// Build a registry from an explicit language table.
    ///
    /// # Panics
    /// Panics if the table does not contain exactly one pivot language or has
    /// duplicate codes; both are configuration errors caught at startup.
    pub fn new(languages: Vec<LanguageConfig>) -> Self {
        let pivots = languages.iter().filter(|lang| lang.is_pivot).count();
        match pivots {
            0 => panic!("No pivot language found in registry"),
            1 => {}
            _ => panic!("Multiple pivot languages found in registry"),
        }

        for (i, lang) in languages.iter().enumerate() {
            if languages[..i].iter().any(|other| other.code == lang.code) {
                panic!("Duplicate language code in registry: {}", lang.code);
            }
        }

        Self { languages }
    }

    /// Get a language configuration by its code (exact, lowercase match).
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get the configuration of a validated language.
    ///
    /// Falls back to `None` only when the `Language` came from a different
    /// registry.
    pub fn get(&self, language: Language) -> Option<&LanguageConfig> {
        self.get_by_code(language.code())
    }

    /// Get all enabled languages, in table order.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// The pivot language configuration.
    pub fn pivot(&self) -> &LanguageConfig {
        self.languages
            .iter()
            .find(|lang| lang.is_pivot)
            .expect("registry is constructed with exactly one pivot")
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(default_languages())
    }
}

/// Built-in language table: Turkish, English (pivot), German, French, Spanish.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "tr",
            name: "Türkçe",
            english_name: "Turkish",
            flag: "🇹🇷",
            is_pivot: false,
            enabled: true,
        },
        LanguageConfig {
            code: "en",
            name: "İngilizce",
            english_name: "English",
            flag: "🇬🇧",
            is_pivot: true,
            enabled: true,
        },
        LanguageConfig {
            code: "de",
            name: "Almanca",
            english_name: "German",
            flag: "🇩🇪",
            is_pivot: false,
            enabled: true,
        },
        LanguageConfig {
            code: "fr",
            name: "Fransızca",
            english_name: "French",
            flag: "🇫🇷",
            is_pivot: false,
            enabled: true,
        },
        LanguageConfig {
            code: "es",
            name: "İspanyolca",
            english_name: "Spanish",
            flag: "🇪🇸",
            is_pivot: false,
            enabled: true,
        },
    ]
}
