// HTTP client for the external workflow-automation engine.
//
// Workflows are registered in the database with the webhook URL the engine
// exposes for them; triggering a workflow is a POST to that URL, and results
// come back asynchronously through our /webhooks/engine callbacks.

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::models::{AnalysisOutcome, Workflow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Payload for a symptom-analysis trigger
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub consultation_id: Uuid,
    pub symptoms: String,
    pub patient_data: serde_json::Value,
}

/// Payload for an appointment-booking trigger
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub consultation_id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub department_id: Uuid,
    pub preferred_date: String,
    pub preferred_time: String,
}

/// What the engine acknowledged when a workflow was triggered
#[derive(Debug, Clone)]
pub struct TriggerReceipt {
    pub execution_id: String,
    /// The exact payload sent, kept for the execution audit record
    pub input: serde_json::Value,
    /// Response body, when the engine returned one
    pub output: Option<serde_json::Value>,
}

/// Engine-side view of an execution, as returned by the status endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionReport {
    pub status: String,
    #[serde(default)]
    pub data: Option<AnalysisOutcome>,
}

/// Seam for the workflow engine, mockable in tests
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn trigger_symptom_analysis(
        &self,
        workflow: &Workflow,
        request: &AnalysisRequest,
    ) -> Result<TriggerReceipt, EngineError>;

    async fn trigger_appointment_booking(
        &self,
        workflow: &Workflow,
        request: &BookingRequest,
    ) -> Result<TriggerReceipt, EngineError>;

    async fn trigger_notification(
        &self,
        workflow: &Workflow,
        payload: serde_json::Value,
    ) -> Result<bool, EngineError>;

    async fn execution_status(&self, execution_id: &str) -> Result<ExecutionReport, EngineError>;
}

/// reqwest-based client for the engine
#[derive(Clone)]
pub struct EngineClient {
    trigger_client: Client,
    booking_client: Client,
    status_client: Client,
    config: EngineConfig,
}

impl EngineClient {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let build = |timeout: u64| {
            Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()
                .map_err(|e| {
                    EngineError::Unreachable(format!("Failed to create HTTP client: {}", e))
                })
        };

        Ok(Self {
            trigger_client: build(config.trigger_timeout_seconds)?,
            booking_client: build(config.booking_timeout_seconds)?,
            status_client: build(config.status_timeout_seconds)?,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// URL the engine should POST results back to
    fn callback_url(&self, path: &str) -> String {
        format!(
            "{}/webhooks/engine/{}",
            self.config.callback_base_url.trim_end_matches('/'),
            path
        )
    }

    /// POST a trigger payload to a workflow's webhook URL
    #[tracing::instrument(skip_all, fields(workflow_id = %workflow.id))]
    async fn post_trigger(
        &self,
        client: &Client,
        workflow: &Workflow,
        payload: &serde_json::Value,
        default_execution_id: String,
    ) -> Result<TriggerReceipt, EngineError> {
        let response = client
            .post(&workflow.webhook_url)
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::error!(
                workflow_id = %workflow.id,
                status = %status,
                "Workflow trigger rejected"
            );
            return Err(EngineError::TriggerRejected {
                status: status.as_u16(),
                body,
            });
        }

        let output = serde_json::from_str::<serde_json::Value>(&body).ok();
        let execution_id = output
            .as_ref()
            .and_then(|v| v.get("execution_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(default_execution_id);

        tracing::info!(
            workflow_id = %workflow.id,
            execution_id = %execution_id,
            "Workflow triggered"
        );

        Ok(TriggerReceipt {
            execution_id,
            input: payload.clone(),
            output,
        })
    }
}

#[async_trait]
impl WorkflowEngine for EngineClient {
    #[tracing::instrument(skip(self, workflow, request), fields(consultation_id = %request.consultation_id))]
    async fn trigger_symptom_analysis(
        &self,
        workflow: &Workflow,
        request: &AnalysisRequest,
    ) -> Result<TriggerReceipt, EngineError> {
        let payload = json!({
            "consultation_id": request.consultation_id,
            "symptoms": request.symptoms,
            "patient_data": request.patient_data,
            "timestamp": Utc::now().to_rfc3339(),
            "callback_url": self.callback_url("symptom-analysis"),
        });

        self.post_trigger(
            &self.trigger_client,
            workflow,
            &payload,
            format!("exec_{}", request.consultation_id),
        )
        .await
    }

    #[tracing::instrument(skip(self, workflow, request), fields(appointment_id = %request.appointment_id))]
    async fn trigger_appointment_booking(
        &self,
        workflow: &Workflow,
        request: &BookingRequest,
    ) -> Result<TriggerReceipt, EngineError> {
        let payload = json!({
            "consultation_id": request.consultation_id,
            "appointment_id": request.appointment_id,
            "patient_id": request.patient_id,
            "department_id": request.department_id,
            "preferred_date": request.preferred_date,
            "preferred_time": request.preferred_time,
            "timestamp": Utc::now().to_rfc3339(),
            "callback_url": self.callback_url("appointment-booking"),
        });

        self.post_trigger(
            &self.booking_client,
            workflow,
            &payload,
            format!("book_{}", request.consultation_id),
        )
        .await
    }

    #[tracing::instrument(skip(self, workflow, payload))]
    async fn trigger_notification(
        &self,
        workflow: &Workflow,
        payload: serde_json::Value,
    ) -> Result<bool, EngineError> {
        let body = json!({
            "notification": payload,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self
            .trigger_client
            .post(&workflow.webhook_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    /// Query the engine's execution record directly
    #[tracing::instrument(skip(self))]
    async fn execution_status(&self, execution_id: &str) -> Result<ExecutionReport, EngineError> {
        let url = format!(
            "{}/api/v1/executions/{}",
            self.config.base_url.trim_end_matches('/'),
            execution_id
        );

        let response = self
            .status_client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(EngineError::ExecutionNotFound(execution_id.to_string()));
        }
        if !status.is_success() {
            return Err(EngineError::InvalidResponse(format!(
                "Status endpoint returned {}",
                status
            )));
        }

        let report: ExecutionReport = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("Invalid status payload: {}", e)))?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn test_config() -> EngineConfig {
        EngineConfig {
            base_url: "http://localhost:5678".to_string(),
            api_key: "test-key".to_string(),
            callback_base_url: "http://localhost:8080/".to_string(),
            trigger_timeout_seconds: 5,
            booking_timeout_seconds: 5,
            status_timeout_seconds: 5,
            allow_fallback: true,
            mock_delay_seconds: 0,
        }
    }

    #[test]
    fn test_engine_client_creation() {
        assert!(EngineClient::new(test_config()).is_ok());
    }

    #[test]
    fn test_callback_url_strips_trailing_slash() {
        let client = EngineClient::new(test_config()).unwrap();
        assert_eq!(
            client.callback_url("symptom-analysis"),
            "http://localhost:8080/webhooks/engine/symptom-analysis"
        );
    }

    #[test]
    fn test_analysis_request_serialization() {
        let request = AnalysisRequest {
            consultation_id: Uuid::new_v4(),
            symptoms: "persistent headache".to_string(),
            patient_data: json!({"age": 34, "gender": "female"}),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["symptoms"], "persistent headache");
        assert_eq!(value["patient_data"]["age"], 34);
    }
}
