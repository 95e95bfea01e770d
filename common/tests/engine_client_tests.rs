// Engine client tests against a mock HTTP server

use chrono::Utc;
use common::config::EngineConfig;
use common::engine::{AnalysisRequest, BookingRequest, EngineClient, WorkflowEngine};
use common::errors::EngineError;
use common::models::{Workflow, WorkflowKind};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_config(base_url: &str) -> EngineConfig {
    EngineConfig {
        base_url: base_url.to_string(),
        api_key: "test-api-key".to_string(),
        callback_base_url: "http://localhost:8080".to_string(),
        trigger_timeout_seconds: 5,
        booking_timeout_seconds: 5,
        status_timeout_seconds: 5,
        allow_fallback: true,
        mock_delay_seconds: 0,
    }
}

fn workflow(kind: WorkflowKind, webhook_url: String) -> Workflow {
    Workflow {
        id: Uuid::new_v4(),
        name: "Test Workflow".to_string(),
        kind,
        engine_workflow_id: "wf-test".to_string(),
        version: "1.0".to_string(),
        description: String::new(),
        is_active: true,
        webhook_url,
        callback_secret: "secret".to_string(),
        configuration: json!({}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn trigger_symptom_analysis_returns_engine_execution_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/analysis"))
        .and(bearer_token("test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "execution_id": "exec_777"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = EngineClient::new(engine_config(&server.uri())).unwrap();
    let workflow = workflow(
        WorkflowKind::SymptomAnalysis,
        format!("{}/webhook/analysis", server.uri()),
    );

    let request = AnalysisRequest {
        consultation_id: Uuid::new_v4(),
        symptoms: "chest pain".to_string(),
        patient_data: json!({"age": 40}),
    };

    let receipt = client
        .trigger_symptom_analysis(&workflow, &request)
        .await
        .expect("trigger should succeed");

    assert_eq!(receipt.execution_id, "exec_777");
    assert_eq!(receipt.input["symptoms"], "chest pain");
    assert!(receipt.input["callback_url"]
        .as_str()
        .unwrap()
        .ends_with("/webhooks/engine/symptom-analysis"));
}

#[tokio::test]
async fn trigger_without_execution_id_falls_back_to_derived_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = EngineClient::new(engine_config(&server.uri())).unwrap();
    let workflow = workflow(WorkflowKind::SymptomAnalysis, server.uri());

    let consultation_id = Uuid::new_v4();
    let request = AnalysisRequest {
        consultation_id,
        symptoms: "fever".to_string(),
        patient_data: json!({}),
    };

    let receipt = client
        .trigger_symptom_analysis(&workflow, &request)
        .await
        .unwrap();

    assert_eq!(receipt.execution_id, format!("exec_{}", consultation_id));
}

#[tokio::test]
async fn trigger_rejection_maps_to_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = EngineClient::new(engine_config(&server.uri())).unwrap();
    let workflow = workflow(WorkflowKind::SymptomAnalysis, server.uri());

    let request = AnalysisRequest {
        consultation_id: Uuid::new_v4(),
        symptoms: "fever".to_string(),
        patient_data: json!({}),
    };

    let result = client.trigger_symptom_analysis(&workflow, &request).await;
    assert!(matches!(
        result,
        Err(EngineError::TriggerRejected { status: 500, .. })
    ));
}

#[tokio::test]
async fn booking_trigger_posts_schedule_details() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/booking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "execution_id": "book_42",
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = EngineClient::new(engine_config(&server.uri())).unwrap();
    let workflow = workflow(
        WorkflowKind::AppointmentBooking,
        format!("{}/webhook/booking", server.uri()),
    );

    let request = BookingRequest {
        consultation_id: Uuid::new_v4(),
        appointment_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        department_id: Uuid::new_v4(),
        preferred_date: "2027-03-01".to_string(),
        preferred_time: "10:30".to_string(),
    };

    let receipt = client
        .trigger_appointment_booking(&workflow, &request)
        .await
        .unwrap();

    assert_eq!(receipt.execution_id, "book_42");
    assert_eq!(receipt.input["preferred_time"], "10:30");
}

#[tokio::test]
async fn execution_status_parses_analysis_payload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/executions/exec_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "department_id": Uuid::new_v4(),
                "confidence_score": 0.85,
                "urgency_level": "medium",
                "icd_codes": ["R50.9"],
                "alternatives": []
            }
        })))
        .mount(&server)
        .await;

    let client = EngineClient::new(engine_config(&server.uri())).unwrap();
    let report = client.execution_status("exec_9").await.unwrap();

    assert_eq!(report.status, "success");
    let data = report.data.unwrap();
    assert_eq!(data.confidence_score, Some(0.85));
    assert_eq!(data.urgency_level.as_deref(), Some("medium"));
}

#[tokio::test]
async fn execution_status_missing_execution_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = EngineClient::new(engine_config(&server.uri())).unwrap();
    let result = client.execution_status("exec_missing").await;

    assert!(matches!(result, Err(EngineError::ExecutionNotFound(_))));
}
