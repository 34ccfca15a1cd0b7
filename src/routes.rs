//! HTTP surface: health check, prediction upload and localized static lookups.

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::state::SharedState;

pub fn router(state: SharedState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/predict", post(predict_handler))
        .route("/locales-manifest.json", get(locales_manifest))
        .route("/api/disease/:disease_id", get(disease_description))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction: String,
    pub disease_id: String,
    pub suggestion: String,
    pub organic_suggestion: String,
}

async fn health_check(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    match &state.model {
        Some(model) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK".into(),
                message: "Disease classifier API is running and model is loaded.".into(),
                model_device: Some(model.device().to_string()),
                details: None,
            }),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "ERROR".into(),
                message: "Disease classifier API is running, but the model failed to load."
                    .into(),
                model_device: None,
                details: Some("Check the server logs for model loading errors.".into()),
            }),
        ),
    }
}

async fn predict_handler(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let model = state.model.clone().ok_or(AppError::ModelUnavailable)?;

    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected predict request: {}", rejection);
        AppError::BadRequest("No image file provided.".into())
    })?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(read_failed)? {
        if field.name() != Some("file") {
            continue;
        }
        // A `file` field without a filename is a plain form value, not an upload.
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(AppError::BadRequest("No selected file.".into()));
        }
        let data = field.bytes().await.map_err(read_failed)?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, image_data) =
        upload.ok_or_else(|| AppError::BadRequest("No image file provided.".into()))?;
    if image_data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty.".into()));
    }

    let prediction = tokio::task::spawn_blocking(move || model.predict(&image_data))
        .await
        .map_err(|err| {
            error!("Prediction task panicked: {}", err);
            AppError::PredictionFailed
        })?
        .map_err(|err| {
            error!("Prediction failed for {}: {}", file_name, err);
            AppError::PredictionFailed
        })?;

    info!(
        "Predicted {} (class {}) for {}",
        prediction.label, prediction.index, file_name
    );
    Ok(Json(PredictResponse {
        success: true,
        prediction: prediction.label.clone(),
        disease_id: prediction.label,
        suggestion: prediction.suggestion,
        organic_suggestion: prediction.organic_suggestion,
    }))
}

fn read_failed(err: axum::extract::multipart::MultipartError) -> AppError {
    warn!("Failed to read multipart upload: {}", err);
    AppError::BadRequest("Failed to read upload.".into())
}

async fn locales_manifest(State(state): State<SharedState>) -> Result<Response, AppError> {
    let path = state
        .locales
        .manifest_path()
        .await
        .ok_or_else(|| AppError::NotFound("manifest not found".into()))?;
    serve_json_file(&path).await
}

async fn disease_description(
    State(state): State<SharedState>,
    Path(disease_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    // First `lang` wins when the parameter is repeated.
    let lang = params
        .iter()
        .find(|(key, _)| key == "lang")
        .map(|(_, value)| value.as_str());
    let path = state
        .locales
        .disease_description_path(&disease_id, lang)
        .await
        .ok_or_else(|| AppError::NotFound("disease description not found".into()))?;
    serve_json_file(&path).await
}

async fn serve_json_file(path: &std::path::Path) -> Result<Response, AppError> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        error!("Failed to serve {}: {}", path.display(), err);
        AppError::Internal("failed to read file".into())
    })?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response())
}
