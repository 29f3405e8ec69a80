//! # Health and Metrics Endpoints
//!
//! Operational visibility for the bridge: `/health` for liveness probes and
//! `/api/v1/metrics` for the frame and call counters.

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": "voice-bridge-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "calls": {
            "active": metrics.active_calls,
            "total": metrics.total_calls
        },
        "model": {
            "url": config.model.url,
            "voice": config.model.voice,
            "api_key_configured": !config.model.api_key.is_empty()
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "http": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            }
        },
        "calls": {
            "active": metrics.active_calls,
            "total": metrics.total_calls
        },
        "frames": {
            "uplink": metrics.uplink_frames,
            "downlink": metrics.downlink_frames
        }
    }))
}
