//! Two-leg translation through the pivot language.

use crate::error::{BridgeStage, TranslateError};
use crate::pipeline::TranslationEngine;
use crate::routing::ModelId;
use tracing::debug;

/// Translate `text` with `first` (source → pivot), then `second` (pivot → target).
///
/// The second model is only loaded once the first leg has succeeded. A failure
/// in either leg aborts the call and is tagged with that leg.
pub async fn translate_bridged(
    engine: &TranslationEngine,
    text: &str,
    first: &ModelId,
    second: &ModelId,
) -> Result<String, TranslateError> {
    let intermediate = engine
        .run(first, text)
        .await
        .map_err(|e| e.in_stage(BridgeStage::First))?;
    debug!("Intermediate text ({}): {}", first, intermediate);

    engine
        .run(second, &intermediate)
        .await
        .map_err(|e| e.in_stage(BridgeStage::Second))
}
