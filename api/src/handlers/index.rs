use axum::Json;

/// Service information and endpoint index
#[tracing::instrument]
pub async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "triage-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth",
            "users": "/api/users",
            "symptoms": "/api/symptoms",
            "consultations": "/api/consultations",
            "appointments": "/api/appointments",
            "departments": "/api/departments",
            "healthcare_systems": "/api/healthcare-systems",
            "workflows": "/api/workflows",
            "engine_callbacks": "/webhooks/engine",
        }
    }))
}
