use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{SaveImagesRequest, StudioHandler};
use crate::models::NutritionRecord;

const IMAGE_FIELD: &str = "image";
const DEFAULT_UPLOAD_MIME: &str = "image/jpeg";

pub struct AppState {
    pub handler: Arc<StudioHandler>,
}

pub fn create_router(handler: Arc<StudioHandler>, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState { handler });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/gemini-image", post(gemini_image_handler))
        .route("/api/sd-image", post(sd_image_handler))
        .route("/api/save-sd-image", post(save_sd_image_handler))
        .route("/api/save-gemini-image", post(save_gemini_image_handler))
        .route("/api/food-info", post(food_info_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Json<BTreeMap<String, String>> {
    Json(state.handler.chat(&body).await)
}

async fn gemini_image_handler(State(state): State<Arc<AppState>>, body: String) -> String {
    state.handler.gemini_image(&body).await
}

async fn sd_image_handler(State(state): State<Arc<AppState>>, body: String) -> String {
    state.handler.sd_image(&body).await
}

async fn save_sd_image_handler(State(state): State<Arc<AppState>>, body: String) -> String {
    let request: SaveImagesRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            log::error!("❌ Failed to parse save-sd-image payload: {}", e);
            return format!("SD image save failed (ParseError: invalid request body: {})", e);
        }
    };

    state.handler.save_sd_image(&request).await
}

async fn save_gemini_image_handler(State(state): State<Arc<AppState>>, body: String) -> String {
    state.handler.save_gemini_image(&body).await
}

/// Answers an empty list when the upload or the analysis fails.
async fn food_info_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Json<Vec<NutritionRecord>> {
    let (bytes, mime_type) = match read_image_field(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            log::warn!("⚠️ food-info request has no '{}' part", IMAGE_FIELD);
            return Json(Vec::new());
        }
        Err(e) => {
            log::error!("❌ Failed to read food-info upload: {}", e);
            return Json(Vec::new());
        }
    };

    match state.handler.food_info(bytes, &mime_type).await {
        Ok(record) => Json(vec![record]),
        Err(failure) => {
            log::error!("❌ Food info generation failed: {}", failure);
            Json(Vec::new())
        }
    }
}

async fn read_image_field(
    mut multipart: Multipart,
) -> Result<Option<(Vec<u8>, String)>, axum::extract::multipart::MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_UPLOAD_MIME)
            .to_string();
        let bytes = field.bytes().await?;
        return Ok(Some((bytes.to_vec(), mime_type)));
    }
    Ok(None)
}

async fn root_handler() -> &'static str {
    "GenAI Studio - POST /api/chat, /api/gemini-image, /api/sd-image, /api/save-sd-image, /api/save-gemini-image, /api/food-info"
}

async fn health_check() -> &'static str {
    "OK"
}
