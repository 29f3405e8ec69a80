//! # Runtime Configuration Endpoints
//!
//! GET returns the active configuration with the API key redacted; PUT
//! applies a partial update (voice, instructions, frame sizing) that takes
//! effect for the next accepted call. Sessions snapshot their configuration
//! at accept time, so in-flight calls are never reconfigured mid-stream.

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "server": config.server,
        "model": {
            "url": config.model.url,
            "voice": config.model.voice,
            "instructions": config.model.instructions,
            "api_key_configured": !config.model.api_key.is_empty()
        },
        "audio": config.audio
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let json_str = std::str::from_utf8(&body)
        .map_err(|_| AppError::BadRequest("Request body is not UTF-8".to_string()))?;

    let mut config = state.get_config();
    config
        .update_from_json(json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(config)
        .map_err(AppError::ValidationError)?;

    info!("runtime configuration updated");
    Ok(HttpResponse::Ok().json(json!({"status": "updated"})))
}
