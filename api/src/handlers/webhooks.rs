use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use common::db::repositories::{
    AppointmentRepository, ConsultationRepository, WorkflowRepository,
};
use common::models::{AnalysisOutcome, AppointmentStatus, ExecutionStatus, Workflow, WorkflowExecution};
use common::rate_limit::RateLimiter;
use common::webhook::validate_callback_signature;
use common::telemetry;
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Debug, Deserialize)]
struct AnalysisCallback {
    consultation_id: Uuid,
    execution_id: String,
    #[serde(default)]
    results: AnalysisOutcome,
}

#[derive(Debug, Deserialize)]
struct BookingCallback {
    execution_id: String,
    booking_result: BookingResult,
}

#[derive(Debug, Deserialize)]
struct BookingResult {
    success: bool,
    #[serde(default)]
    appointment_id: Option<Uuid>,
    #[serde(default)]
    emr_appointment_id: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorCallback {
    execution_id: String,
    #[serde(default)]
    error_message: String,
}

/// Minimal view of a callback body used to locate the execution before the
/// full payload is trusted.
#[derive(Debug, Deserialize)]
struct CallbackEnvelope {
    execution_id: String,
}

/// Authenticate an inbound engine callback: locate the execution, enforce
/// the per-workflow rate limit, and verify the HMAC signature over the raw
/// body with the workflow's callback secret.
async fn authenticate_callback(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<(WorkflowExecution, Workflow), ErrorResponse> {
    let envelope: CallbackEnvelope = serde_json::from_slice(body)
        .map_err(|e| ErrorResponse::new("validation_error", format!("Invalid callback payload: {}", e)))?;

    let workflows = WorkflowRepository::new(state.db_pool.clone());

    let execution = workflows
        .find_execution_by_engine_id(&envelope.execution_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up execution");
            ErrorResponse::new("internal_error", "Failed to look up execution")
        })?
        .ok_or_else(|| {
            tracing::warn!(execution_id = %envelope.execution_id, "Unknown execution in callback");
            ErrorResponse::new("not_found", "Execution not found")
        })?;

    let workflow = workflows
        .find_by_id(execution.workflow_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up workflow");
            ErrorResponse::new("internal_error", "Failed to look up workflow")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Workflow not found"))?;

    let rate_limiter = RateLimiter::new(state.redis_client.clone());
    let allowed = rate_limiter
        .check_rate_limit(
            workflow.id,
            state.config.webhooks.rate_limit_max_requests,
            state.config.webhooks.rate_limit_window_seconds,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Rate limit check failed");
            ErrorResponse::new("internal_error", "Failed to check rate limit")
        })?;

    if !allowed {
        return Err(ErrorResponse::new(
            "rate_limit_exceeded",
            "Too many callbacks. Please try again later.",
        ));
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing callback signature header");
            ErrorResponse::new("unauthorized", "X-Webhook-Signature header is required")
        })?;

    let is_valid = validate_callback_signature(body, signature, &workflow.callback_secret)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to validate signature");
            ErrorResponse::new("internal_error", "Failed to validate signature")
        })?;

    if !is_valid {
        tracing::warn!(workflow_id = %workflow.id, "Invalid callback signature");
        return Err(ErrorResponse::new(
            "unauthorized",
            "Callback signature is invalid",
        ));
    }

    Ok((execution, workflow))
}

/// Handle symptom analysis results from the engine
#[tracing::instrument(skip(state, headers, body))]
pub async fn symptom_analysis_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SuccessResponse<serde_json::Value>>, ErrorResponse> {
    let (execution, _workflow) = authenticate_callback(&state, &headers, &body).await?;

    let callback: AnalysisCallback = serde_json::from_slice(&body).map_err(|e| {
        ErrorResponse::new(
            "validation_error",
            format!("Invalid analysis callback: {}", e),
        )
    })?;

    tracing::info!(
        consultation_id = %callback.consultation_id,
        execution_id = %callback.execution_id,
        "Received symptom analysis callback"
    );

    let consultations = ConsultationRepository::new(state.db_pool.clone());
    consultations
        .complete_with_outcome(callback.consultation_id, &callback.results)
        .await
        .map_err(|e| match e {
            common::errors::DatabaseError::NotFound(_) => {
                ErrorResponse::new("not_found", "Consultation not found")
            }
            _ => {
                tracing::error!(error = %e, "Failed to store analysis results");
                ErrorResponse::new("internal_error", "Failed to store analysis results")
            }
        })?;

    let workflows = WorkflowRepository::new(state.db_pool.clone());
    if let Err(e) = workflows
        .finish_execution(
            &execution.engine_execution_id,
            ExecutionStatus::Success,
            serde_json::to_value(&callback.results).ok(),
            None,
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to finish execution record");
    }

    telemetry::record_consultation_completed("engine");

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "status": "success",
        "message": "Results processed successfully"
    }))))
}

/// Handle appointment booking results from the engine
#[tracing::instrument(skip(state, headers, body))]
pub async fn appointment_booking_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SuccessResponse<serde_json::Value>>, ErrorResponse> {
    let (execution, _workflow) = authenticate_callback(&state, &headers, &body).await?;

    let callback: BookingCallback = serde_json::from_slice(&body).map_err(|e| {
        ErrorResponse::new(
            "validation_error",
            format!("Invalid booking callback: {}", e),
        )
    })?;

    tracing::info!(
        execution_id = %callback.execution_id,
        success = callback.booking_result.success,
        "Received appointment booking callback"
    );

    let appointment_id = callback
        .booking_result
        .appointment_id
        .or(execution.appointment_id);

    if let Some(appointment_id) = appointment_id {
        let appointments = AppointmentRepository::new(state.db_pool.clone());
        let mut appointment = appointments
            .find_by_id(appointment_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to load appointment");
                ErrorResponse::new("internal_error", "Failed to load appointment")
            })?
            .ok_or_else(|| ErrorResponse::new("not_found", "Appointment not found"))?;

        if callback.booking_result.success {
            appointment.status = AppointmentStatus::Confirmed;
            if let Some(emr_id) = callback.booking_result.emr_appointment_id {
                appointment.emr_appointment_id = emr_id;
            }
            appointments.update(&appointment).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to confirm appointment");
                ErrorResponse::new("internal_error", "Failed to confirm appointment")
            })?;
            tracing::info!(appointment_id = %appointment_id, "Appointment confirmed");
        }
    }

    let status = if callback.booking_result.success {
        ExecutionStatus::Success
    } else {
        ExecutionStatus::Error
    };

    let workflows = WorkflowRepository::new(state.db_pool.clone());
    if let Err(e) = workflows
        .finish_execution(
            &execution.engine_execution_id,
            status,
            serde_json::to_value(&callback.booking_result.success).ok(),
            callback.booking_result.error_message.as_deref(),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to finish execution record");
    }

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "status": "success",
        "message": "Booking result processed"
    }))))
}

/// Handle workflow failure notifications from the engine
#[tracing::instrument(skip(state, headers, body))]
pub async fn workflow_error_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SuccessResponse<serde_json::Value>>, ErrorResponse> {
    let (execution, _workflow) = authenticate_callback(&state, &headers, &body).await?;

    let callback: ErrorCallback = serde_json::from_slice(&body).map_err(|e| {
        ErrorResponse::new("validation_error", format!("Invalid error callback: {}", e))
    })?;

    tracing::error!(
        execution_id = %callback.execution_id,
        error_message = %callback.error_message,
        "Workflow error reported by engine"
    );

    let workflows = WorkflowRepository::new(state.db_pool.clone());
    workflows
        .finish_execution(
            &execution.engine_execution_id,
            ExecutionStatus::Error,
            None,
            Some(&callback.error_message),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record execution error");
            ErrorResponse::new("internal_error", "Failed to record execution error")
        })?;

    // Propagate the failure to a linked consultation
    if let Some(consultation_id) = execution.consultation_id {
        let consultations = ConsultationRepository::new(state.db_pool.clone());
        if let Err(e) = consultations.mark_error(consultation_id).await {
            tracing::warn!(error = %e, "Failed to mark consultation errored");
        } else {
            telemetry::record_consultation_failed("engine_error");
            tracing::info!(consultation_id = %consultation_id, "Consultation marked as errored");
        }
    }

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "status": "success",
        "message": "Error logged successfully"
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_callback_deserialization() {
        let json = r#"{
            "consultation_id": "550e8400-e29b-41d4-a716-446655440000",
            "execution_id": "exec_42",
            "results": {
                "department_id": "550e8400-e29b-41d4-a716-446655440001",
                "confidence_score": 0.92,
                "urgency_level": "high",
                "icd_codes": ["I20.9"],
                "alternatives": []
            }
        }"#;
        let callback: AnalysisCallback = serde_json::from_str(json).unwrap();
        assert_eq!(callback.execution_id, "exec_42");
        assert_eq!(callback.results.confidence_score, Some(0.92));
    }

    #[test]
    fn test_analysis_callback_results_default_to_empty() {
        let json = r#"{
            "consultation_id": "550e8400-e29b-41d4-a716-446655440000",
            "execution_id": "exec_42"
        }"#;
        let callback: AnalysisCallback = serde_json::from_str(json).unwrap();
        assert!(callback.results.department_id.is_none());
        assert!(callback.results.icd_codes.is_empty());
    }

    #[test]
    fn test_booking_callback_deserialization() {
        let json = r#"{
            "execution_id": "book_42",
            "booking_result": {
                "success": true,
                "appointment_id": "550e8400-e29b-41d4-a716-446655440003",
                "emr_appointment_id": "EMR-777"
            }
        }"#;
        let callback: BookingCallback = serde_json::from_str(json).unwrap();
        assert!(callback.booking_result.success);
        assert_eq!(
            callback.booking_result.emr_appointment_id.as_deref(),
            Some("EMR-777")
        );
    }

    #[test]
    fn test_error_callback_message_defaults_empty() {
        let json = r#"{"execution_id": "exec_42"}"#;
        let callback: ErrorCallback = serde_json::from_str(json).unwrap();
        assert_eq!(callback.error_message, "");
    }
}
