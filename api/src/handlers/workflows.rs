use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use common::db::repositories::WorkflowRepository;
use common::models::{
    ExecutionStatus, UserClaims, Workflow, WorkflowExecution, WorkflowKind,
};
use common::webhook::generate_callback_secret;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

const DEFAULT_EXECUTION_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct RegisterWorkflowRequest {
    pub name: String,
    pub kind: String,
    pub engine_workflow_id: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub webhook_url: String,
    #[serde(default)]
    pub configuration: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub webhook_url: Option<String>,
    pub is_active: Option<bool>,
    pub configuration: Option<serde_json::Value>,
    /// When true, a fresh callback secret is issued
    #[serde(default)]
    pub rotate_callback_secret: bool,
}

/// Workflow as exposed over the API; the callback secret is returned only
/// at registration and rotation.
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: WorkflowKind,
    pub engine_workflow_id: String,
    pub version: String,
    pub description: String,
    pub is_active: bool,
    pub webhook_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_secret: Option<String>,
}

impl WorkflowResponse {
    fn from_workflow(workflow: &Workflow, include_secret: bool) -> Self {
        Self {
            id: workflow.id,
            name: workflow.name.clone(),
            kind: workflow.kind,
            engine_workflow_id: workflow.engine_workflow_id.clone(),
            version: workflow.version.clone(),
            description: workflow.description.clone(),
            is_active: workflow.is_active,
            webhook_url: workflow.webhook_url.clone(),
            created_at: workflow.created_at,
            callback_secret: include_secret.then(|| workflow.callback_secret.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecutionListQuery {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// List workflow registrations (admin only)
#[tracing::instrument(skip(state))]
pub async fn list_workflows(
    State(state): State<AppState>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<WorkflowResponse>>>, ErrorResponse> {
    let workflows = WorkflowRepository::new(state.db_pool.clone())
        .find_all()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list workflows");
            ErrorResponse::new("internal_error", "Failed to list workflows")
        })?;

    Ok(Json(SuccessResponse::new(
        workflows
            .iter()
            .map(|w| WorkflowResponse::from_workflow(w, false))
            .collect(),
    )))
}

/// Register a workflow hosted on the engine (admin only).
///
/// The generated callback secret is returned once; the engine must be
/// configured to sign callbacks with it.
#[tracing::instrument(skip(state, req))]
pub async fn register_workflow(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<RegisterWorkflowRequest>,
) -> Result<(StatusCode, Json<SuccessResponse<WorkflowResponse>>), ErrorResponse> {
    if req.name.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Name is required"));
    }
    if req.engine_workflow_id.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Engine workflow id is required",
        ));
    }
    if req.webhook_url.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Webhook URL is required",
        ));
    }

    let kind = WorkflowKind::from_str(&req.kind)
        .map_err(|e| ErrorResponse::new("validation_error", e))?;

    let now = Utc::now();
    let workflow = Workflow {
        id: Uuid::new_v4(),
        name: req.name,
        kind,
        engine_workflow_id: req.engine_workflow_id,
        version: req.version,
        description: req.description,
        is_active: true,
        webhook_url: req.webhook_url,
        callback_secret: generate_callback_secret(),
        configuration: req.configuration.unwrap_or_else(|| serde_json::json!({})),
        created_at: now,
        updated_at: now,
    };

    WorkflowRepository::new(state.db_pool.clone())
        .create(&workflow)
        .await
        .map_err(|e| match e {
            common::errors::DatabaseError::DuplicateKey(_) => {
                ErrorResponse::new("conflict", "Engine workflow id already registered")
            }
            _ => {
                tracing::error!(error = %e, "Failed to register workflow");
                ErrorResponse::new("internal_error", "Failed to register workflow")
            }
        })?;

    tracing::info!(
        workflow_id = %workflow.id,
        kind = %workflow.kind,
        registered_by = %claims.username,
        "Workflow registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(WorkflowResponse::from_workflow(
            &workflow, true,
        ))),
    ))
}

/// Update a workflow registration (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<UpdateWorkflowRequest>,
) -> Result<Json<SuccessResponse<WorkflowResponse>>, ErrorResponse> {
    let repository = WorkflowRepository::new(state.db_pool.clone());

    let mut workflow = repository
        .find_by_id(workflow_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get workflow");
            ErrorResponse::new("internal_error", "Failed to get workflow")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Workflow not found"))?;

    if let Some(name) = req.name {
        workflow.name = name;
    }
    if let Some(version) = req.version {
        workflow.version = version;
    }
    if let Some(description) = req.description {
        workflow.description = description;
    }
    if let Some(webhook_url) = req.webhook_url {
        workflow.webhook_url = webhook_url;
    }
    if let Some(is_active) = req.is_active {
        workflow.is_active = is_active;
    }
    if let Some(configuration) = req.configuration {
        workflow.configuration = configuration;
    }

    let rotated = req.rotate_callback_secret;
    if rotated {
        workflow.callback_secret = generate_callback_secret();
    }
    workflow.updated_at = Utc::now();

    repository.update(&workflow).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to update workflow");
        ErrorResponse::new("internal_error", "Failed to update workflow")
    })?;

    tracing::info!(
        workflow_id = %workflow_id,
        updated_by = %claims.username,
        secret_rotated = rotated,
        "Workflow updated"
    );

    Ok(Json(SuccessResponse::new(WorkflowResponse::from_workflow(
        &workflow, rotated,
    ))))
}

/// Execution audit trail (admin only)
#[tracing::instrument(skip(state))]
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionListQuery>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<WorkflowExecution>>>, ErrorResponse> {
    let kind = match query.kind.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            WorkflowKind::from_str(raw).map_err(|e| ErrorResponse::new("validation_error", e))?,
        ),
    };
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            ExecutionStatus::from_str(raw)
                .map_err(|e| ErrorResponse::new("validation_error", e))?,
        ),
    };
    let limit = query.limit.unwrap_or(DEFAULT_EXECUTION_LIMIT).clamp(1, 1000);

    let executions = WorkflowRepository::new(state.db_pool.clone())
        .list_executions(kind, status, limit)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list executions");
            ErrorResponse::new("internal_error", "Failed to list executions")
        })?;

    Ok(Json(SuccessResponse::new(executions)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_deserialization() {
        let json = r#"{
            "name": "Symptom Analysis v2",
            "kind": "symptom_analysis",
            "engine_workflow_id": "wf-123",
            "version": "2.0",
            "webhook_url": "http://engine.local/webhook/abc"
        }"#;
        let req: RegisterWorkflowRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.description, "");
        assert!(req.configuration.is_none());
    }

    #[test]
    fn test_workflow_response_hides_secret_by_default() {
        let workflow = Workflow {
            id: Uuid::new_v4(),
            name: "Booking".into(),
            kind: WorkflowKind::AppointmentBooking,
            engine_workflow_id: "wf-9".into(),
            version: "1".into(),
            description: String::new(),
            is_active: true,
            webhook_url: "http://engine.local/webhook/book".into(),
            callback_secret: "super-secret".into(),
            configuration: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let hidden = WorkflowResponse::from_workflow(&workflow, false);
        assert!(hidden.callback_secret.is_none());
        let json = serde_json::to_string(&hidden).unwrap();
        assert!(!json.contains("super-secret"));

        let shown = WorkflowResponse::from_workflow(&workflow, true);
        assert_eq!(shown.callback_secret.as_deref(), Some("super-secret"));
    }
}
