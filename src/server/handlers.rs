use super::AppState;
use crate::error::{error_chain, TranslateError, ValidationError};
use crate::i18n::Language;
use crate::metrics::MetricsReport;
use crate::pipeline::{TranslationRequest, TranslationResult};
use crate::routing::TranslationMethod;
use crate::security::constant_time_compare;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Raw `POST /translate` body. Missing fields are treated as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranslateBody {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    #[serde(flatten)]
    pub result: TranslationResult,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Validation(ValidationError),
    Translate(TranslateError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Translate(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Translate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Invalid or missing API key".to_string(),
            ApiError::Validation(e) => e.to_string(),
            ApiError::Translate(e) => e.to_string(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<TranslateError> for ApiError {
    fn from(e: TranslateError) -> Self {
        ApiError::Translate(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if let ApiError::Translate(e) = &self {
                error!("🔥 Internal translation error: {}", error_chain(e));
            }
        }
        (status, Json(ErrorResponse { error: self.message() })).into_response()
    }
}

pub async fn translate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !constant_time_compare(provided, expected) {
            warn!("Rejected translation request with invalid API key");
            return Err(ApiError::Unauthorized);
        }
    }

    let Json(body) = body.map_err(|rejection| {
        ValidationError::MalformedBody(rejection.body_text())
    })?;

    let service = &state.service;
    let request = TranslationRequest::parse(
        &body.text,
        &body.source_lang,
        &body.target_lang,
        service.registry(),
    )?;

    let result = service.translate(&request).await?;
    info!(
        "✓ {} -> {} via {}",
        request.source, request.target, result.method
    );

    Ok(Json(TranslateResponse {
        result,
        error: None,
    }))
}

#[derive(Debug, Serialize)]
pub struct LanguageInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
    pub pivot: bool,
}

#[derive(Debug, Serialize)]
pub struct PairInfo {
    pub source: &'static str,
    pub target: &'static str,
    pub method: TranslationMethod,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageInfo>,
    pub pairs: Vec<PairInfo>,
}

pub async fn languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    let registry = state.service.registry();
    let resolver = state.service.resolver();
    let enabled = registry.list_enabled();

    let languages = enabled
        .iter()
        .map(|lang| LanguageInfo {
            code: lang.code,
            name: lang.name,
            flag: lang.flag,
            pivot: lang.is_pivot,
        })
        .collect();

    let mut pairs = Vec::new();
    for from in &enabled {
        for to in &enabled {
            if from.code == to.code {
                continue;
            }
            let source = Language::from_static(from.code);
            let target = Language::from_static(to.code);
            if let Ok(route) = resolver.resolve(source, target) {
                pairs.push(PairInfo {
                    source: from.code,
                    target: to.code,
                    method: route.method(),
                });
            }
        }
    }

    Json(LanguagesResponse { languages, pairs })
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsReport> {
    Json(state.service.metrics().report())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
