//! Text translation between a fixed set of languages with pretrained
//! sequence-to-sequence models.
//!
//! A request is routed to a direct model when one exists for the pair, or
//! bridged through the pivot language (English) with two models otherwise.
//! Models are loaded lazily into a shared cache and long input is translated
//! in fixed-size chunks.

pub mod bridge;
pub mod chunking;
pub mod config;
pub mod error;
pub mod i18n;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod routing;
pub mod security;
pub mod server;
