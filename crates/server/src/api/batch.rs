//! Batch run endpoints: trigger, status, cancel.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use galleyforge_core::{
    progress::CurrentItem, BatchError, BatchRequest, Role,
};

use super::middleware::AuthIdentity;
use crate::state::AppState;

/// Header carrying the shared batch access key.
pub const ACCESS_KEY_HEADER: &str = "x-batch-access-key";

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Serialize)]
pub struct BatchAccepted {
    pub accepted: bool,
    pub total: usize,
}

/// Status view of the active run. The cancellation token is never
/// exposed here; cancellation is gated by the batch access key.
#[derive(Serialize)]
pub struct BatchStatusResponse {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_requested: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentItem>,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    /// Cancellation token issued to the run. Optional when the caller
    /// presents the batch access key instead.
    #[serde(default)]
    pub token: Option<String>,
}

/// POST /batch - start a batch conversion run.
///
/// Requires the shared batch access key in addition to transport auth,
/// and the manager role. Responds 202 once the run is spawned; progress
/// is observable via GET /batch/status.
pub async fn trigger_batch(
    State(state): State<Arc<AppState>>,
    AuthIdentity(identity): AuthIdentity,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Result<(StatusCode, Json<BatchAccepted>), (StatusCode, Json<ErrorResponse>)> {
    let presented = headers
        .get(ACCESS_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if !state.access_key_validator().validate(presented) {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid or missing batch access key",
        ));
    }

    if let Err(e) = identity.require_role(Role::Manager) {
        return Err(error_response(StatusCode::FORBIDDEN, e.to_string()));
    }

    let orchestrator = match state.orchestrator() {
        Some(orch) => Arc::clone(orch),
        None => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Conversion service not configured",
            ));
        }
    };

    if request.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Batch request contains no items",
        ));
    }

    if state.progress().is_running().await {
        return Err(error_response(
            StatusCode::CONFLICT,
            "A batch run is already in progress",
        ));
    }

    let total = request.len();
    info!(total, user = %identity.user_id, "batch run accepted");

    tokio::spawn(async move {
        match orchestrator.run(&identity, request).await {
            Ok(outcome) => {
                info!(
                    succeeded = outcome.succeeded,
                    failed = outcome.failed,
                    skipped = outcome.skipped,
                    cancelled = outcome.cancelled,
                    "background batch run finished"
                );
            }
            Err(BatchError::AlreadyRunning) => {
                // Lost the race against another trigger between the
                // is_running check and begin().
                info!("batch run rejected, another run started first");
            }
            Err(e) => {
                error!(error = %e, "background batch run failed to start");
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            accepted: true,
            total,
        }),
    ))
}

/// GET /batch/status - progress of the active run, if any.
pub async fn batch_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BatchStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.progress().read().await {
        Ok(Some(snapshot)) => Ok(Json(BatchStatusResponse {
            running: true,
            pid: Some(snapshot.pid),
            total_count: Some(snapshot.total_count),
            processed_count: Some(snapshot.processed_count),
            cancel_requested: Some(snapshot.cancel_requested),
            started_at: Some(snapshot.started_at),
            current: snapshot.current,
        })),
        Ok(None) => Ok(Json(BatchStatusResponse {
            running: false,
            pid: None,
            total_count: None,
            processed_count: None,
            cancel_requested: None,
            started_at: None,
            current: None,
        })),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read progress: {}", e),
        )),
    }
}

/// POST /batch/cancel - request cancellation of the active run.
///
/// Authorized either by the run's cancellation token or by the batch
/// access key that gates triggering. The run stops at the next item
/// boundary, not immediately.
pub async fn cancel_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CancelRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    if !state.progress().is_running().await {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "No batch run in progress",
        ));
    }

    let token = match request.token {
        Some(token) => token,
        None => {
            let presented = headers
                .get(ACCESS_KEY_HEADER)
                .and_then(|v| v.to_str().ok());
            if !state.access_key_validator().validate(presented) {
                return Err(error_response(
                    StatusCode::FORBIDDEN,
                    "Cancellation requires the run token or the batch access key",
                ));
            }
            match state.progress().read().await {
                Ok(Some(snapshot)) => snapshot.cancellation_token,
                Ok(None) => {
                    return Err(error_response(
                        StatusCode::NOT_FOUND,
                        "No batch run in progress",
                    ));
                }
                Err(e) => {
                    return Err(error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Failed to read progress: {}", e),
                    ));
                }
            }
        }
    };

    match state.progress().request_cancel(&token).await {
        Ok(true) => {
            info!("batch cancellation requested");
            Ok(StatusCode::ACCEPTED)
        }
        Ok(false) => Err(error_response(
            StatusCode::FORBIDDEN,
            "Cancellation token does not match",
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to request cancellation: {}", e),
        )),
    }
}
