//! Language type: validated language code.
//!
//! A `Language` can only be obtained by parsing a code against a
//! `LanguageRegistry`, so holding one means the code is supported and enabled.

use crate::error::{LanguageRole, ValidationError};
use crate::i18n::LanguageRegistry;
use std::fmt;

/// A validated language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Language {
    /// ISO 639-1 language code (e.g., "en", "tr")
    code: &'static str,
}

impl Language {
    pub const TURKISH: Language = Language { code: "tr" };
    pub const ENGLISH: Language = Language { code: "en" };
    pub const GERMAN: Language = Language { code: "de" };
    pub const FRENCH: Language = Language { code: "fr" };
    pub const SPANISH: Language = Language { code: "es" };

    /// Parse a language code from a request.
    ///
    /// The code is trimmed and lowercased before lookup.
    ///
    /// # Returns
    /// * `Ok(Language)` if the code is in the registry and enabled
    /// * `Err(ValidationError::UnsupportedLanguage)` otherwise
    pub fn parse(
        code: &str,
        role: LanguageRole,
        registry: &LanguageRegistry,
    ) -> Result<Language, ValidationError> {
        let normalized = code.trim().to_lowercase();

        match registry.get_by_code(&normalized) {
            Some(config) if config.enabled => Ok(Language {
                code: config.code, // Use the static str from the registry
            }),
            _ => Err(ValidationError::UnsupportedLanguage {
                role,
                code: normalized,
            }),
        }
    }

    /// Language for a registry entry, bypassing the enabled check.
    pub(crate) fn from_static(code: &'static str) -> Language {
        Language { code }
    }

    /// Get the ISO 639-1 language code.
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}
