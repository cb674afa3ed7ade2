//! Supported-language registry.
//!
//! # Architecture
//!
//! - `registry`: Immutable table of supported languages and their display metadata
//! - `language`: Validated `Language` type parsed from request codes
//!
//! # Example
//!
//! ```rust,ignore
//! use pivot_translate::i18n::{Language, LanguageRegistry};
//! use pivot_translate::error::LanguageRole;
//!
//! let registry = LanguageRegistry::default();
//! let turkish = Language::parse("TR", LanguageRole::Source, &registry)?;
//! let display = registry.get(turkish).unwrap().display();
//! ```

mod language;
mod registry;

pub use language::Language;
pub use registry::{LanguageConfig, LanguageDisplay, LanguageRegistry};
