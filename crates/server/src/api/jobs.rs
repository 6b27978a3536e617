//! Conversion job endpoints: single-file trigger and status lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use galleyforge_core::{
    ots::TargetOperation, tracker::TrackerError, TriggerError, TriggeredJob,
};

use super::batch::ErrorResponse;
use super::middleware::AuthIdentity;
use crate::state::AppState;

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Deserialize)]
pub struct ConvertRequest {
    pub submission_id: String,
    pub submission_file_id: String,
    /// Defaults to XML conversion when omitted.
    #[serde(default)]
    pub target: Option<TargetOperation>,
}

#[derive(Serialize)]
pub struct JobStatusResponse {
    pub tracker_id: String,
    pub submission_file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_job_id: Option<String>,
    pub status_label: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /convert - submit a single file for conversion.
///
/// Returns immediately with a tracker id; the caller polls
/// GET /jobs/{id} for progress.
pub async fn trigger_convert(
    State(state): State<Arc<AppState>>,
    AuthIdentity(identity): AuthIdentity,
    Json(request): Json<ConvertRequest>,
) -> Result<(StatusCode, Json<TriggeredJob>), (StatusCode, Json<ErrorResponse>)> {
    let orchestrator = match state.orchestrator() {
        Some(orch) => orch,
        None => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Conversion service not configured",
            ));
        }
    };

    let target = request.target.unwrap_or(TargetOperation::XmlConversion);
    match orchestrator
        .trigger_conversion(
            &identity,
            &request.submission_id,
            &request.submission_file_id,
            target,
        )
        .await
    {
        Ok(triggered) => Ok((StatusCode::ACCEPTED, Json(triggered))),
        Err(TriggerError::NotFound(what)) => {
            Err(error_response(StatusCode::NOT_FOUND, what))
        }
        Err(TriggerError::Ots(e)) => Err(error_response(
            StatusCode::BAD_GATEWAY,
            format!("Conversion service error: {}", e),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// GET /jobs/{id} - look up a conversion job by tracker id.
///
/// When the job is bound to an external id and the conversion service
/// is configured, the stored label is refreshed with a live poll first.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(tracker_id): Path<String>,
) -> Result<Json<JobStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut record = match state.tracker().lookup(&tracker_id) {
        Ok(record) => record,
        Err(TrackerError::NotFound(id)) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("Job record not found: {}", id),
            ));
        }
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };

    // Refresh from the service; a poll failure falls back to the
    // stored label.
    if let (Some(client), Some(job_id)) = (state.client(), record.external_job_id.clone()) {
        match client.status(&job_id).await {
            Ok(status) => {
                let label = status.label();
                if label != record.status_label {
                    if let Err(e) = state.tracker().update_status(&record.id, label) {
                        warn!(tracker_id = %record.id, error = %e, "failed to persist status label");
                    }
                    record.status_label = label.to_string();
                }
            }
            Err(e) => {
                warn!(tracker_id = %record.id, %job_id, error = %e, "live status poll failed");
            }
        }
    }

    let is_completed = matches!(record.status_label.as_str(), "completed" | "attached");
    Ok(Json(JobStatusResponse {
        tracker_id: record.id,
        submission_file_id: record.submission_file_id,
        external_job_id: record.external_job_id,
        status_label: record.status_label,
        is_completed,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }))
}
