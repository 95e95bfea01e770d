use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use common::db::repositories::{
    ConsultationRepository, DepartmentRepository, UserRepository, WorkflowRepository,
};
use common::engine::{AnalysisRequest, WorkflowEngine};
use common::models::{
    pain_level_in_range, AlternativeDepartment, Consultation, ConsultationFeedback,
    ConsultationStatus, UrgencyLevel, UserClaims, WorkflowKind,
};
use common::{telemetry, triage};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

const MAX_SYMPTOM_LENGTH: usize = 2000;
const MAX_ADDITIONAL_INFO_LENGTH: usize = 1000;

/// Execution id prefix for consultations completed by the local fallback
const LOCAL_EXECUTION_PREFIX: &str = "local_";

#[derive(Debug, Deserialize)]
pub struct AnalyzeSymptomsRequest {
    pub symptoms: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "deserialize_pain_level")]
    pub pain_level: Option<i16>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
}

/// Clients send the pain level as a number, a numeric string, an empty
/// string, or omit it entirely; normalize all of those to `Option<i16>`
/// and enforce the 1-10 scale.
fn deserialize_pain_level<'de, D>(deserializer: D) -> Result<Option<i16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPainLevel {
        Number(i64),
        Text(String),
    }

    let raw = Option::<RawPainLevel>::deserialize(deserializer)?;
    let value = match raw {
        None => return Ok(None),
        Some(RawPainLevel::Number(n)) => n,
        Some(RawPainLevel::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "null" {
                return Ok(None);
            }
            trimmed.parse::<i64>().map_err(|_| {
                serde::de::Error::custom("Pain level must be a valid number between 1 and 10")
            })?
        }
    };

    if !pain_level_in_range(value) {
        return Err(serde::de::Error::custom(
            "Pain level must be between 1 and 10",
        ));
    }

    Ok(Some(value as i16))
}

#[derive(Debug, Serialize)]
pub struct AnalyzeSymptomsResponse {
    pub consultation_id: Uuid,
    pub execution_id: String,
    pub status: ConsultationStatus,
    pub message: String,
    pub estimated_completion_time: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub accuracy_rating: i32,
    pub helpfulness_rating: i32,
    pub speed_rating: i32,
    #[serde(default)]
    pub comments: Option<String>,
    pub would_recommend: bool,
}

fn consultation_repository(state: &AppState) -> ConsultationRepository {
    ConsultationRepository::new(state.db_pool.clone())
}

fn parse_user_id(claims: &UserClaims) -> Result<Uuid, ErrorResponse> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| ErrorResponse::new("unauthorized", "Invalid token subject"))
}

/// Load a consultation the caller is allowed to see: the owning patient, or
/// clinical staff.
async fn load_visible_consultation(
    state: &AppState,
    claims: &UserClaims,
    consultation_id: Uuid,
) -> Result<Consultation, ErrorResponse> {
    let consultation = consultation_repository(state)
        .find_by_id(consultation_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load consultation");
            ErrorResponse::new("internal_error", "Failed to load consultation")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Consultation not found"))?;

    let caller_id = parse_user_id(claims)?;
    if consultation.patient_id != caller_id && !claims.role.is_clinical_staff() {
        return Err(ErrorResponse::new(
            "forbidden",
            "You can only view your own consultations",
        ));
    }

    Ok(consultation)
}

/// Main endpoint for symptom analysis: persists the consultation and
/// triggers the engine's symptom-analysis workflow, falling back to a local
/// keyword analysis in development when the engine is unavailable.
#[tracing::instrument(skip(state, req))]
pub async fn analyze_symptoms(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<AnalyzeSymptomsRequest>,
) -> Result<(StatusCode, Json<SuccessResponse<AnalyzeSymptomsResponse>>), ErrorResponse> {
    let symptoms = req.symptoms.trim();
    if symptoms.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Symptom description is required",
        ));
    }
    if symptoms.len() > MAX_SYMPTOM_LENGTH {
        return Err(ErrorResponse::new(
            "validation_error",
            "Symptom description is too long",
        ));
    }
    if req
        .additional_info
        .as_deref()
        .is_some_and(|info| info.len() > MAX_ADDITIONAL_INFO_LENGTH)
    {
        return Err(ErrorResponse::new(
            "validation_error",
            "Additional info is too long",
        ));
    }

    let patient_id = parse_user_id(&claims)?;
    let patient = UserRepository::new(state.db_pool.clone())
        .find_by_id(patient_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load patient");
            ErrorResponse::new("internal_error", "Failed to load patient")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "User not found"))?;

    let consultation = Consultation::new_analyzing(
        patient_id,
        symptoms.to_string(),
        req.duration.unwrap_or_default(),
        req.pain_level,
        req.additional_info.unwrap_or_default(),
    );

    let repository = consultation_repository(&state);
    repository.create(&consultation).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to create consultation");
        ErrorResponse::new("internal_error", "Failed to create consultation")
    })?;

    let patient_data = serde_json::json!({
        "age": patient.age(Utc::now().date_naive()),
        "gender": patient.gender,
        "medical_history": patient.medical_history,
        "allergies": patient.allergies,
        "current_medications": patient.current_medications,
        "preferred_language": req
            .preferred_language
            .unwrap_or_else(|| patient.preferred_language.clone()),
    });

    let analysis_request = AnalysisRequest {
        consultation_id: consultation.id,
        symptoms: consultation.symptom_description.clone(),
        patient_data,
    };

    let workflows = WorkflowRepository::new(state.db_pool.clone());
    let workflow = workflows
        .find_active_by_kind(WorkflowKind::SymptomAnalysis)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up analysis workflow");
            ErrorResponse::new("internal_error", "Failed to look up analysis workflow")
        })?;

    let trigger_result = match &workflow {
        Some(workflow) => state
            .engine
            .trigger_symptom_analysis(workflow, &analysis_request)
            .await
            .map(|receipt| (workflow.id, receipt)),
        None => Err(common::errors::EngineError::NoActiveWorkflow(
            WorkflowKind::SymptomAnalysis.to_string(),
        )),
    };

    let execution_id = match trigger_result {
        Ok((workflow_id, receipt)) => {
            let execution = common::models::WorkflowExecution::new_running(
                workflow_id,
                receipt.execution_id.clone(),
                receipt.input,
            )
            .for_consultation(consultation.id);

            workflows.create_execution(&execution).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to record workflow execution");
                ErrorResponse::new("internal_error", "Failed to record workflow execution")
            })?;

            telemetry::record_consultation_analyzed("engine");
            receipt.execution_id
        }
        Err(e) => {
            tracing::warn!(
                consultation_id = %consultation.id,
                error = %e,
                "Engine trigger failed"
            );

            if !state.config.engine.allow_fallback {
                repository.mark_error(consultation.id).await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to mark consultation errored");
                    ErrorResponse::new("internal_error", "Failed to update consultation")
                })?;
                telemetry::record_consultation_failed("engine_unavailable");

                return Err(ErrorResponse::new(
                    "engine_unavailable",
                    "Symptom analysis service is temporarily unavailable",
                )
                .with_details(serde_json::json!({
                    "consultation_id": consultation.id,
                    "fallback_recommendation": "Please consult with a healthcare provider",
                })));
            }

            // Development fallback: synthesize a result locally after a
            // simulated processing delay.
            triage::spawn_delayed_fallback(
                state.db_pool.clone(),
                consultation.id,
                consultation.symptom_description.clone(),
                Duration::from_secs(state.config.engine.mock_delay_seconds),
            );

            telemetry::record_consultation_analyzed("fallback");
            format!("{}{}", LOCAL_EXECUTION_PREFIX, consultation.id)
        }
    };

    repository
        .set_execution_id(consultation.id, &execution_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to store execution id");
            ErrorResponse::new("internal_error", "Failed to update consultation")
        })?;

    tracing::info!(
        consultation_id = %consultation.id,
        execution_id = %execution_id,
        "Symptom analysis initiated"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SuccessResponse::new(AnalyzeSymptomsResponse {
            consultation_id: consultation.id,
            execution_id,
            status: ConsultationStatus::Analyzing,
            message: "Symptom analysis initiated successfully".to_string(),
            estimated_completion_time: "30-60 seconds".to_string(),
        })),
    ))
}

/// The caller's consultations, newest first
#[tracing::instrument(skip(state))]
pub async fn list_consultations(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<Consultation>>>, ErrorResponse> {
    let caller_id = parse_user_id(&claims)?;

    let consultations = consultation_repository(&state)
        .find_by_patient(caller_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list consultations");
            ErrorResponse::new("internal_error", "Failed to list consultations")
        })?;

    Ok(Json(SuccessResponse::new(consultations)))
}

/// Consultation detail
#[tracing::instrument(skip(state))]
pub async fn get_consultation(
    State(state): State<AppState>,
    Path(consultation_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Consultation>>, ErrorResponse> {
    let consultation = load_visible_consultation(&state, &claims, consultation_id).await?;
    Ok(Json(SuccessResponse::new(consultation)))
}

fn progress_message(status: ConsultationStatus) -> &'static str {
    match status {
        ConsultationStatus::Initiated => "Analysis request received",
        ConsultationStatus::Analyzing => "Your symptoms are being analyzed...",
        ConsultationStatus::Completed => "Analysis completed successfully",
        ConsultationStatus::Error => "Analysis encountered an error",
        ConsultationStatus::Cancelled => "Analysis was cancelled",
        _ => "Consultation in progress",
    }
}

/// Check analysis progress; while analyzing, poll the engine for a result
/// and fold a finished one into the consultation.
#[tracing::instrument(skip(state))]
pub async fn analysis_status(
    State(state): State<AppState>,
    Path(consultation_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<serde_json::Value>>, ErrorResponse> {
    let mut consultation = load_visible_consultation(&state, &claims, consultation_id).await?;

    let is_engine_execution = !consultation.engine_execution_id.is_empty()
        && !consultation
            .engine_execution_id
            .starts_with(LOCAL_EXECUTION_PREFIX);

    if consultation.status == ConsultationStatus::Analyzing && is_engine_execution {
        match state
            .engine
            .execution_status(&consultation.engine_execution_id)
            .await
        {
            Ok(report) => {
                let repository = consultation_repository(&state);
                let workflows = WorkflowRepository::new(state.db_pool.clone());

                match report.status.as_str() {
                    "success" => {
                        if let Some(outcome) = report.data {
                            repository
                                .complete_with_outcome(consultation.id, &outcome)
                                .await
                                .map_err(|e| {
                                    tracing::error!(error = %e, "Failed to store results");
                                    ErrorResponse::new(
                                        "internal_error",
                                        "Failed to store analysis results",
                                    )
                                })?;
                            let _ = workflows
                                .finish_execution(
                                    &consultation.engine_execution_id,
                                    common::models::ExecutionStatus::Success,
                                    serde_json::to_value(&outcome).ok(),
                                    None,
                                )
                                .await;
                            telemetry::record_consultation_completed("engine");
                        }
                    }
                    "error" => {
                        repository.mark_error(consultation.id).await.map_err(|e| {
                            tracing::error!(error = %e, "Failed to mark consultation errored");
                            ErrorResponse::new("internal_error", "Failed to update consultation")
                        })?;
                        let _ = workflows
                            .finish_execution(
                                &consultation.engine_execution_id,
                                common::models::ExecutionStatus::Error,
                                None,
                                Some("Engine reported execution failure"),
                            )
                            .await;
                        telemetry::record_consultation_failed("engine_error");
                    }
                    _ => {}
                }

                consultation = consultation_repository(&state)
                    .find_by_id(consultation.id)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "Failed to reload consultation");
                        ErrorResponse::new("internal_error", "Failed to reload consultation")
                    })?
                    .ok_or_else(|| ErrorResponse::new("not_found", "Consultation not found"))?;
            }
            Err(e) => {
                // Status polling is best-effort; the callback path still
                // completes the consultation.
                tracing::warn!(
                    consultation_id = %consultation.id,
                    error = %e,
                    "Engine status check failed"
                );
            }
        }
    }

    let analysis_complete = matches!(
        consultation.status,
        ConsultationStatus::Completed | ConsultationStatus::Error
    );

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "consultation_id": consultation.id,
        "status": consultation.status,
        "analysis_complete": analysis_complete,
        "progress_message": progress_message(consultation.status),
        "results_available": consultation.status == ConsultationStatus::Completed,
    }))))
}

/// Detailed analysis results for a completed consultation
#[tracing::instrument(skip(state))]
pub async fn analysis_results(
    State(state): State<AppState>,
    Path(consultation_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<serde_json::Value>>, ErrorResponse> {
    let consultation = load_visible_consultation(&state, &claims, consultation_id).await?;

    if consultation.status != ConsultationStatus::Completed {
        return Err(ErrorResponse::new(
            "validation_error",
            "Analysis not completed yet",
        )
        .with_details(serde_json::json!({"status": consultation.status})));
    }

    let departments = DepartmentRepository::new(state.db_pool.clone());

    let recommended_department = match consultation.recommended_department_id {
        Some(department_id) => departments
            .find_by_id(department_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to load department");
                ErrorResponse::new("internal_error", "Failed to load department")
            })?
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "name": d.name,
                    "description": d.description,
                    "average_wait_time": d.average_wait_time,
                    "urgency_level": d.urgency_level,
                })
            }),
        None => None,
    };

    let urgency_info = consultation
        .urgency_level
        .as_deref()
        .and_then(|raw| UrgencyLevel::from_str(raw).ok())
        .map(|level| level.guidance());

    let alternatives: Vec<AlternativeDepartment> =
        serde_json::from_value(consultation.alternative_departments.clone()).unwrap_or_default();

    let analysis_duration_seconds = consultation
        .analysis_duration()
        .map(|d| d.num_milliseconds() as f64 / 1000.0);

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "id": consultation.id,
        "symptom_description": consultation.symptom_description,
        "symptom_duration": consultation.symptom_duration,
        "pain_level": consultation.pain_level,
        "recommended_department": recommended_department,
        "confidence_score": consultation.confidence_score,
        "urgency_level": consultation.urgency_level,
        "urgency_info": urgency_info,
        "icd_suggestions": consultation.icd_suggestions,
        "alternative_departments": alternatives,
        "analysis_duration_seconds": analysis_duration_seconds,
        "status": consultation.status,
        "created_at": consultation.created_at,
    }))))
}

/// Submit feedback for a consultation; one record per consultation
#[tracing::instrument(skip(state, req))]
pub async fn submit_feedback(
    State(state): State<AppState>,
    Path(consultation_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<SuccessResponse<ConsultationFeedback>>, ErrorResponse> {
    for (name, value) in [
        ("accuracy_rating", req.accuracy_rating),
        ("helpfulness_rating", req.helpfulness_rating),
        ("speed_rating", req.speed_rating),
    ] {
        if !(1..=5).contains(&value) {
            return Err(ErrorResponse::new(
                "validation_error",
                format!("{} must be between 1 and 5", name),
            ));
        }
    }

    let consultation = load_visible_consultation(&state, &claims, consultation_id).await?;

    let caller_id = parse_user_id(&claims)?;
    if consultation.patient_id != caller_id {
        return Err(ErrorResponse::new(
            "forbidden",
            "Only the patient can submit feedback",
        ));
    }

    let repository = consultation_repository(&state);

    let existing = repository.find_feedback(consultation_id).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to check existing feedback");
        ErrorResponse::new("internal_error", "Failed to check existing feedback")
    })?;
    if existing.is_some() {
        return Err(ErrorResponse::new("conflict", "Feedback already submitted"));
    }

    let feedback = ConsultationFeedback {
        consultation_id,
        accuracy_rating: req.accuracy_rating,
        helpfulness_rating: req.helpfulness_rating,
        speed_rating: req.speed_rating,
        comments: req.comments.unwrap_or_default(),
        would_recommend: req.would_recommend,
        created_at: Utc::now(),
    };

    repository
        .create_feedback(&feedback)
        .await
        .map_err(|e| match e {
            common::errors::DatabaseError::DuplicateKey(_) => {
                ErrorResponse::new("conflict", "Feedback already submitted")
            }
            _ => {
                tracing::error!(error = %e, "Failed to store feedback");
                ErrorResponse::new("internal_error", "Failed to store feedback")
            }
        })?;

    Ok(Json(SuccessResponse::new(feedback)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_request(json: &str) -> Result<AnalyzeSymptomsRequest, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn test_pain_level_accepts_number() {
        let req = parse_request(r#"{"symptoms": "fever", "pain_level": 7}"#).unwrap();
        assert_eq!(req.pain_level, Some(7));
    }

    #[test]
    fn test_pain_level_accepts_numeric_string() {
        let req = parse_request(r#"{"symptoms": "fever", "pain_level": "7"}"#).unwrap();
        assert_eq!(req.pain_level, Some(7));
    }

    #[test]
    fn test_pain_level_blank_string_is_none() {
        let req = parse_request(r#"{"symptoms": "fever", "pain_level": "  "}"#).unwrap();
        assert_eq!(req.pain_level, None);
    }

    #[test]
    fn test_pain_level_null_literal_string_is_none() {
        let req = parse_request(r#"{"symptoms": "fever", "pain_level": "null"}"#).unwrap();
        assert_eq!(req.pain_level, None);
    }

    #[test]
    fn test_pain_level_missing_is_none() {
        let req = parse_request(r#"{"symptoms": "fever"}"#).unwrap();
        assert_eq!(req.pain_level, None);
    }

    #[test]
    fn test_pain_level_out_of_range_rejected() {
        assert!(parse_request(r#"{"symptoms": "fever", "pain_level": 11}"#).is_err());
        assert!(parse_request(r#"{"symptoms": "fever", "pain_level": 0}"#).is_err());
        assert!(parse_request(r#"{"symptoms": "fever", "pain_level": "12"}"#).is_err());
    }

    #[test]
    fn test_pain_level_garbage_rejected() {
        assert!(parse_request(r#"{"symptoms": "fever", "pain_level": "severe"}"#).is_err());
    }

    #[test]
    fn test_progress_message_covers_terminal_states() {
        assert_eq!(
            progress_message(ConsultationStatus::Completed),
            "Analysis completed successfully"
        );
        assert_eq!(
            progress_message(ConsultationStatus::Error),
            "Analysis encountered an error"
        );
    }
}
